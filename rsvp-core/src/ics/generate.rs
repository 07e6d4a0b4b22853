//! ICS generation.
//!
//! Typed fields go through icalendar's builder. Raw parts of the document are
//! spliced into its output afterwards, exactly as they were read.

use icalendar::{Calendar, Component, EventLike, Property, ValueType};

use super::raw::{content_line, push_folded, quote_param};
use crate::document::CalendarDocument;
use crate::error::{RsvpError, RsvpResult};
use crate::event::{EventComponent, EventTime};

const PRODID: &str = "PRODID:-//rsvp//rsvp-core//EN";

/// Serialize a [`CalendarDocument`] to ICS text.
pub fn generate_ics(doc: &CalendarDocument) -> RsvpResult<String> {
    if doc.components.is_empty() {
        return Err(RsvpError::IcsGenerate(
            "calendar document has no events".to_string(),
        ));
    }

    let mut cal = Calendar::new();

    if let Some(ref method) = doc.method {
        cal.append_property(Property::new("METHOD", method.as_ics_str()));
    }

    for component in &doc.components {
        cal.push(build_vevent(component));
    }
    let cal = cal.done();

    Ok(splice_raw(&cal.to_string(), doc))
}

fn build_vevent(event: &EventComponent) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);

    if let Some(ref summary) = event.summary {
        ics_event.summary(summary);
    }

    // DTSTAMP - required by RFC 5545, use the modification time when known
    let dtstamp = event
        .last_modified
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    if let Some(last_modified) = event.last_modified {
        ics_event.add_property(
            "LAST-MODIFIED",
            last_modified.format("%Y%m%dT%H%M%SZ").to_string(),
        );
    }

    if let Some(seq) = event.sequence {
        ics_event.add_property("SEQUENCE", seq.to_string());
    }

    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    if let Some(ref end) = event.end {
        add_datetime_property(&mut ics_event, "DTEND", end);
    }

    if let Some(ref desc) = event.description {
        ics_event.description(desc);
    }

    if let Some(ref loc) = event.location {
        ics_event.location(loc);
    }

    // Recurrence rules (for master events)
    if let Some(ref recurrence) = event.recurrence {
        if let Some(ref rrule) = recurrence.rrule {
            ics_event.add_property("RRULE", rrule);
        }
        for exdate in &recurrence.exdates {
            add_time_list_property(&mut ics_event, "EXDATE", exdate);
        }
        for rdate in &recurrence.rdates {
            add_time_list_property(&mut ics_event, "RDATE", rdate);
        }
    }

    // RECURRENCE-ID (for occurrence exceptions)
    if let Some(ref recurrence_id) = event.recurrence_id {
        add_datetime_property(&mut ics_event, "RECURRENCE-ID", recurrence_id);
    }

    if let Some(ref org) = event.organizer {
        let mut prop = Property::new("ORGANIZER", format!("mailto:{}", org.email));
        if let Some(ref name) = org.name {
            prop.add_parameter("CN", &quote_param(name));
        }
        for (key, val) in &org.params {
            prop.add_parameter(key, &quote_param(val));
        }
        ics_event.append_property(prop);
    }

    // ATTENDEE (multi-property - can appear multiple times)
    for attendee in &event.attendees {
        let mut prop = Property::new("ATTENDEE", format!("mailto:{}", attendee.email));
        if let Some(ref name) = attendee.name {
            prop.add_parameter("CN", &quote_param(name));
        }
        if let Some(status) = attendee.status {
            prop.add_parameter("PARTSTAT", status.as_ics_str());
        }
        if attendee.rsvp {
            prop.add_parameter("RSVP", "TRUE");
        }
        if let Some(ref responded_at) = attendee.responded_at {
            prop.add_parameter("RESPONDED-AT", responded_at);
        }
        for (key, val) in &attendee.params {
            prop.add_parameter(key, &quote_param(val));
        }
        ics_event.append_multi_property(prop);
    }

    ics_event.done()
}

/// Post-process icalendar's output: our PRODID, no CALSCALE (GREGORIAN is
/// the default), VTIMEZONEs ahead of the first VEVENT, and each component's
/// unmodelled properties and VALARMs before its `END:VEVENT`.
fn splice_raw(ics: &str, doc: &CalendarDocument) -> String {
    let mut out = String::with_capacity(ics.len());
    let mut timezones = Some(&doc.timezones);
    let mut components = doc.components.iter();

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            out.push_str(PRODID);
            out.push_str("\r\n");
            continue;
        }
        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VEVENT" {
            for timezone in timezones.take().into_iter().flatten() {
                for tz_line in &timezone.lines {
                    push_folded(&mut out, tz_line);
                }
            }
        } else if line == "END:VEVENT" {
            if let Some(component) = components.next() {
                for prop in &component.extra_properties {
                    push_folded(&mut out, &content_line(prop));
                }
                for alarm_line in component.alarms.iter().flat_map(|a| &a.lines) {
                    push_folded(&mut out, alarm_line);
                }
            }
        }

        out.push_str(line);
        out.push_str("\r\n");
    }

    out
}

/// Add a datetime property with proper formatting based on EventTime variant
fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    ics_event.append_property(time_property(name, time));
}

/// Add one EXDATE/RDATE value as its own property line
fn add_time_list_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    ics_event.append_multi_property(time_property(name, time));
}

fn time_property(name: &str, time: &EventTime) -> Property {
    let mut prop = Property::new(name, time.to_ics_string());
    match time {
        EventTime::Date(_) => {
            prop.append_parameter(ValueType::Date);
        }
        EventTime::DateTimeZoned { tzid, .. } => {
            prop.add_parameter("TZID", tzid);
        }
        EventTime::DateTimeUtc(_) | EventTime::DateTimeFloating(_) => {}
    }
    prop
}
