//! Merging an attendee's response into an event component.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::address::normalize_address;
use crate::event::{Attendee, EventComponent, ParticipationStatus};

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// False when the responder was not listed and had to be appended
    pub found_existing: bool,
    /// The responder's entry after the merge
    pub attendee: Attendee,
}

/// RESPONDED-AT form: compact ISO basic, UTC.
pub fn responded_at_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Record `status` for `address` on `component`.
///
/// The first attendee whose address normalizes to the same key gets the new
/// PARTSTAT and RESPONDED-AT, and its RSVP flag is cleared. Later duplicates
/// are left as they are. An unlisted responder is appended with
/// `display_name` as CN. LAST-MODIFIED is set to `now` either way.
pub fn reconcile(
    component: &mut EventComponent,
    address: &str,
    status: ParticipationStatus,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> Reconciliation {
    let key = normalize_address(address);
    let stamp = responded_at_stamp(now);
    component.last_modified = Some(now);

    let matches = component.attendees.iter().filter(|a| a.key() == key).count();
    if matches > 1 {
        warn!(uid = %component.uid, address = %key, matches, "duplicate attendee entries, updating the first");
    }

    if let Some(existing) = component.attendees.iter_mut().find(|a| a.key() == key) {
        existing.status = Some(status);
        existing.responded_at = Some(stamp);
        existing.rsvp = false;

        debug!(uid = %component.uid, address = %key, %status, "updated attendee status");
        return Reconciliation {
            found_existing: true,
            attendee: existing.clone(),
        };
    }

    let mut attendee = Attendee::new(crate::address::strip_scheme(address));
    attendee.name = display_name.filter(|n| !n.is_empty()).map(str::to_string);
    attendee.status = Some(status);
    attendee.responded_at = Some(stamp);
    component.attendees.push(attendee.clone());

    debug!(uid = %component.uid, address = %key, %status, "added unlisted attendee");
    Reconciliation {
        found_existing: false,
        attendee,
    }
}

/// True when `address` already has `status` on `component`.
///
/// Link-driven responses use this to skip the whole pipeline on repeated
/// clicks.
pub fn status_unchanged(
    component: &EventComponent,
    address: &str,
    status: ParticipationStatus,
) -> bool {
    component.attendee_status(address) == Some(status)
}

/// Copy the PARTSTATs of an inbound REPLY component onto the organizer's
/// stored copy of it.
///
/// Nothing is applied when the reply is for a newer SEQUENCE than the one
/// stored. Only listed attendees are updated; their RESPONDED-AT is the
/// reply's LAST-MODIFIED, or `now` when it has none. Returns the updated
/// addresses.
pub fn apply_reply(
    stored: &mut EventComponent,
    reply: &EventComponent,
    now: DateTime<Utc>,
) -> Vec<String> {
    let (stored_seq, reply_seq) = (stored.sequence.unwrap_or(0), reply.sequence.unwrap_or(0));
    if stored_seq < reply_seq {
        debug!(uid = %stored.uid, stored_seq, reply_seq, "reply to a newer revision, not applied");
        return Vec::new();
    }

    let stamp = responded_at_stamp(reply.last_modified.unwrap_or(now));
    let mut updated = Vec::new();
    for incoming in &reply.attendees {
        let Some(status) = incoming.status else {
            continue;
        };
        let key = incoming.key();
        if let Some(existing) = stored.attendees.iter_mut().find(|a| a.key() == key) {
            existing.status = Some(status);
            existing.responded_at = Some(stamp.clone());
            existing.rsvp = false;
            updated.push(existing.email.clone());
        }
    }
    updated
}
