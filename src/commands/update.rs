use anyhow::Result;
use rsvp_core::ParticipationStatus;

use super::{Host, print_outcome};

/// Respond to an event already in the user's calendar.
pub fn run(
    host: &Host,
    user: &str,
    calendar: &str,
    event_id: &str,
    attendee: Option<&str>,
    status: ParticipationStatus,
) -> Result<()> {
    let attendee = attendee.unwrap_or(user);

    println!("{} → {} ({}/{})", attendee, status, calendar, event_id);
    let outcome = host
        .engine()
        .update_appointment(user, calendar, event_id, attendee, status)?;
    print_outcome(&outcome);

    Ok(())
}
