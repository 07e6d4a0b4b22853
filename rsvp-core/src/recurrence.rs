//! Occurrence resolution for recurring series.
//!
//! Finds the exception component for one occurrence of a series, or
//! materializes the master's rules (bounded) and synthesizes the exception.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::debug;

use crate::document::CalendarDocument;
use crate::error::{RsvpError, RsvpResult};
use crate::event::{EventComponent, EventTime, Recurrence};

/// Default bound on materialized occurrences.
pub const DEFAULT_RECURRENCE_LIMIT: u16 = 1000;

/// Outcome of [`resolve_occurrence`]: index of the component in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An exception for the occurrence was already present
    Existing(usize),
    /// A new exception was cloned from the master and appended
    Synthesized(usize),
}

impl Resolution {
    pub fn index(&self) -> usize {
        match self {
            Resolution::Existing(i) | Resolution::Synthesized(i) => *i,
        }
    }
}

/// Locate or synthesize the exception of series `uid` for the occurrence
/// starting at `recurrence_id` (epoch seconds).
///
/// Floating and all-day values are interpreted in `default_tz`. At most
/// `limit` occurrences are materialized; when none matches the document is
/// left untouched and [`RsvpError::OccurrenceNotResolvable`] is returned.
pub fn resolve_occurrence(
    doc: &mut CalendarDocument,
    uid: &str,
    recurrence_id: i64,
    default_tz: Tz,
    limit: u16,
) -> RsvpResult<Resolution> {
    if let Some(index) = doc.exception_index(uid, recurrence_id, default_tz) {
        return Ok(Resolution::Existing(index));
    }

    let not_resolvable = || RsvpError::OccurrenceNotResolvable {
        uid: uid.to_string(),
        recurrence_id,
        limit,
    };

    let master = doc.master(uid).ok_or_else(not_resolvable)?;
    let occurrence =
        find_occurrence(master, recurrence_id, default_tz, limit)?.ok_or_else(not_resolvable)?;

    let exception = synthesize_exception(master, &occurrence, default_tz);
    debug!(uid, recurrence_id, start = %exception.start, "synthesized occurrence exception");

    Ok(Resolution::Synthesized(doc.push(exception)))
}

/// Exclude one occurrence from series `uid`: add an EXDATE to the master and
/// drop any exception for it. Returns false when the occurrence is not
/// among the first `limit` occurrences.
pub fn exclude_occurrence(
    doc: &mut CalendarDocument,
    uid: &str,
    recurrence_id: i64,
    default_tz: Tz,
    limit: u16,
) -> RsvpResult<bool> {
    let Some(master) = doc.master(uid) else {
        return Ok(false);
    };
    let Some(occurrence) = find_occurrence(master, recurrence_id, default_tz, limit)? else {
        return Ok(false);
    };
    let exdate = occurrence_to_event_time(&occurrence, &master.start);

    doc.components
        .retain(|c| !(c.uid == uid && c.recurrence_timestamp(default_tz) == Some(recurrence_id)));

    if let Some(master) = doc.master_mut(uid) {
        master
            .recurrence
            .get_or_insert_with(Recurrence::default)
            .exdates
            .push(exdate);
    }

    Ok(true)
}

/// Walk the master's occurrences in order and return the first one starting
/// at `recurrence_id`.
fn find_occurrence(
    master: &EventComponent,
    recurrence_id: i64,
    default_tz: Tz,
    limit: u16,
) -> RsvpResult<Option<DateTime<rrule::Tz>>> {
    let Some(recurrence) = master.recurrence.as_ref() else {
        return Ok(None);
    };

    let rrule_str = build_rrule_string(&master.start, recurrence, default_tz);
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        RsvpError::Recurrence(format!(
            "Failed to parse RRULE for event '{}': {}",
            master.uid, e
        ))
    })?;

    let result = rrule_set.all(limit);

    Ok(result
        .dates
        .into_iter()
        .find(|occ| occ.timestamp() == recurrence_id))
}

fn synthesize_exception(
    master: &EventComponent,
    occurrence: &DateTime<rrule::Tz>,
    default_tz: Tz,
) -> EventComponent {
    let start = occurrence_to_event_time(occurrence, &master.start);
    let end = master.end.as_ref().map(|end| match (&master.start, end) {
        (EventTime::Date(d_start), EventTime::Date(d_end)) => {
            let days = (*d_end - *d_start).num_days();
            EventTime::Date(occurrence.date_naive() + chrono::Duration::days(days))
        }
        _ => start.shifted(master.duration(default_tz)),
    });

    let mut exception = master.clone();
    exception.strip_recurrence();
    exception.recurrence_id = Some(start.clone());
    exception.start = start;
    exception.end = end;
    exception
}

/// Build an iCalendar-format rule set string for the rrule crate parser.
///
/// Floating and all-day starts are anchored in `default_tz`, so occurrence
/// instants agree with [`EventTime::to_utc_in`].
fn build_rrule_string(start: &EventTime, recurrence: &Recurrence, default_tz: Tz) -> String {
    let mut lines = vec![time_line("DTSTART", start, default_tz)];

    if let Some(ref rrule) = recurrence.rrule {
        let tz = anchor_tz(start, default_tz);
        lines.push(format!("RRULE:{}", normalize_until(rrule, tz)));
    }
    for rdate in &recurrence.rdates {
        lines.push(time_line("RDATE", rdate, default_tz));
    }
    for exdate in &recurrence.exdates {
        lines.push(time_line("EXDATE", exdate, default_tz));
    }

    lines.join("\n")
}

/// Zone the DTSTART line is anchored in.
fn anchor_tz(start: &EventTime, default_tz: Tz) -> Tz {
    match start {
        EventTime::DateTimeZoned { tzid, .. } => tzid.parse::<Tz>().unwrap_or(default_tz),
        _ => default_tz,
    }
}

/// DTSTART is always written as UTC or with a TZID, and UNTIL must then be
/// UTC. A date UNTIL becomes the end of that day in `tz`, a local one is
/// read in `tz`.
fn normalize_until(rrule: &str, tz: Tz) -> String {
    rrule
        .split(';')
        .map(|part| {
            let Some((key, value)) = part.split_once('=') else {
                return part.to_string();
            };
            if !key.eq_ignore_ascii_case("UNTIL") {
                return part.to_string();
            }
            let local = match EventTime::parse_ics(value, None) {
                Some(EventTime::Date(d)) => d.and_hms_opt(23, 59, 59),
                Some(EventTime::DateTimeFloating(dt)) => Some(dt),
                _ => None,
            };
            match local.and_then(|dt| EventTime::DateTimeFloating(dt).to_utc_in(tz)) {
                Some(until) => format!("{}={}", key, until.format("%Y%m%dT%H%M%SZ")),
                None => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn time_line(name: &str, time: &EventTime, default_tz: Tz) -> String {
    match time {
        EventTime::DateTimeUtc(dt) => format!("{}:{}", name, dt.format("%Y%m%dT%H%M%SZ")),
        EventTime::Date(d) => local_line(name, &format!("{}T000000", d.format("%Y%m%d")), default_tz),
        EventTime::DateTimeFloating(dt) => {
            local_line(name, &dt.format("%Y%m%dT%H%M%S").to_string(), default_tz)
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            let tz = tzid.parse::<Tz>().unwrap_or(default_tz);
            local_line(name, &datetime.format("%Y%m%dT%H%M%S").to_string(), tz)
        }
    }
}

fn local_line(name: &str, local: &str, tz: Tz) -> String {
    if tz == chrono_tz::UTC {
        format!("{}:{}Z", name, local)
    } else {
        format!("{};TZID={}:{}", name, tz.name(), local)
    }
}

/// Convert an rrule occurrence back to an EventTime matching the master's variant.
fn occurrence_to_event_time(dt: &DateTime<rrule::Tz>, master_start: &EventTime) -> EventTime {
    match master_start {
        EventTime::Date(_) => EventTime::Date(dt.date_naive()),
        EventTime::DateTimeUtc(_) => EventTime::DateTimeUtc(dt.with_timezone(&Utc)),
        EventTime::DateTimeFloating(_) => EventTime::DateTimeFloating(dt.naive_local()),
        EventTime::DateTimeZoned { tzid, .. } => EventTime::DateTimeZoned {
            datetime: dt.naive_local(),
            tzid: tzid.clone(),
        },
    }
}
