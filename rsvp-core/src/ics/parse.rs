//! ICS parsing using the icalendar crate's parser.
//!
//! Typed fields come from icalendar's component tree. Everything else is
//! taken from a content-line scan of the same text, so it keeps its wire form.

use chrono::{DateTime, NaiveDateTime, Utc};
use icalendar::parser::{Component, Property, read_calendar, unfold};

use super::raw::{self, RawEvent};
use crate::document::{CalendarDocument, Method};
use crate::error::{RsvpError, RsvpResult};
use crate::event::{
    Attendee, EventComponent, EventTime, Organizer, ParticipationStatus, RawProperty, Recurrence,
};

/// Properties mapped onto typed [`EventComponent`] fields.
/// DTSTAMP is regenerated on output.
const TYPED_PROPERTIES: &[&str] = &[
    "UID",
    "SUMMARY",
    "DESCRIPTION",
    "LOCATION",
    "DTSTART",
    "DTEND",
    "RRULE",
    "EXDATE",
    "RDATE",
    "RECURRENCE-ID",
    "ORGANIZER",
    "ATTENDEE",
    "LAST-MODIFIED",
    "SEQUENCE",
    "DTSTAMP",
];

/// Parse ICS content into a [`CalendarDocument`].
///
/// Only VEVENT components are kept, plus calendar-level VTIMEZONEs.
/// A VEVENT without UID or DTSTART is an error.
pub fn parse_calendar(content: &str) -> RsvpResult<CalendarDocument> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| RsvpError::IcsParse(e.to_string()))?;
    let mut scanned = raw::scan(&unfolded);

    let method = calendar
        .properties
        .iter()
        .find(|p| p.name == "METHOD")
        .map(|p| Method::from_ics_str(p.val.as_ref()))
        .filter(|m| !m.as_ics_str().is_empty());

    let mut raw_events = std::mem::take(&mut scanned.events).into_iter();
    let components = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(|vevent| parse_vevent(vevent, raw_events.next().unwrap_or_default()))
        .collect::<RsvpResult<Vec<_>>>()?;

    Ok(CalendarDocument {
        method,
        components,
        timezones: scanned.timezones,
    })
}

fn parse_vevent(vevent: &Component, raw: RawEvent) -> RsvpResult<EventComponent> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| RsvpError::IcsParse("VEVENT without UID".to_string()))?;

    let start = vevent
        .find_prop("DTSTART")
        .and_then(event_time)
        .ok_or_else(|| RsvpError::IcsParse(format!("VEVENT '{uid}' has no valid DTSTART")))?;
    let end = vevent.find_prop("DTEND").and_then(event_time);

    let summary = vevent.find_prop("SUMMARY").map(|p| p.val.to_string());
    let description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());
    let sequence = vevent
        .find_prop("SEQUENCE")
        .and_then(|p| p.val.as_ref().trim().parse().ok());
    let last_modified = vevent
        .find_prop("LAST-MODIFIED")
        .and_then(|p| parse_utc_stamp(p.val.as_ref()));

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let exdates = time_list(vevent, "EXDATE");
    let rdates = time_list(vevent, "RDATE");
    let recurrence = (rrule.is_some() || !exdates.is_empty() || !rdates.is_empty()).then(|| {
        Recurrence {
            rrule,
            exdates,
            rdates,
        }
    });

    let recurrence_id = vevent.find_prop("RECURRENCE-ID").and_then(event_time);

    let organizer = vevent.find_prop("ORGANIZER").map(parse_organizer);
    let attendees: Vec<Attendee> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(parse_attendee)
        .collect();

    let alarms = raw
        .components
        .into_iter()
        .filter(|c| c.name == "VALARM")
        .collect();

    let extra_properties: Vec<RawProperty> = raw
        .properties
        .into_iter()
        .filter(|p| {
            let name = p.name.to_ascii_uppercase();
            !TYPED_PROPERTIES.contains(&name.as_str())
        })
        .collect();

    Ok(EventComponent {
        uid,
        summary,
        description,
        location,
        start,
        end,
        recurrence,
        recurrence_id,
        organizer,
        attendees,
        last_modified,
        sequence,
        alarms,
        extra_properties,
    })
}

/// DTSTART, DTEND or RECURRENCE-ID, zoned by its TZID parameter.
fn event_time(prop: &Property) -> Option<EventTime> {
    EventTime::parse_ics(prop.val.as_ref(), param_value(prop, "TZID").as_deref())
}

/// Every value of every `name` property (EXDATE, RDATE). A line may list
/// several comma-separated values; RDATE periods are skipped.
fn time_list(vevent: &Component, name: &str) -> Vec<EventTime> {
    vevent
        .properties
        .iter()
        .filter(|p| p.name == name)
        .flat_map(|p| {
            let tzid = param_value(p, "TZID");
            p.val
                .as_ref()
                .split(',')
                .filter_map(|value| EventTime::parse_ics(value, tzid.as_deref()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `YYYYMMDDTHHMMSSZ` (the trailing Z is optional on input).
fn parse_utc_stamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

fn param_value(prop: &Property, key: &str) -> Option<String> {
    prop.params
        .iter()
        .find(|p| p.key.as_ref().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()))
}

fn raw_params(prop: &Property) -> Vec<(String, String)> {
    prop.params
        .iter()
        .map(|p| {
            let val = p.val.as_ref().map(|v| v.to_string()).unwrap_or_default();
            (p.key.to_string(), val)
        })
        .collect()
}

fn address_value(prop: &Property) -> String {
    crate::address::strip_scheme(prop.val.as_ref()).to_string()
}

/// Parse ORGANIZER property
fn parse_organizer(prop: &Property) -> Organizer {
    let mut organizer = Organizer::new(address_value(prop));
    for (key, val) in raw_params(prop) {
        if key.eq_ignore_ascii_case("CN") {
            organizer.name = Some(val);
        } else {
            organizer.params.push((key, val));
        }
    }
    organizer
}

/// Parse ATTENDEE property
fn parse_attendee(prop: &Property) -> Attendee {
    let mut attendee = Attendee::new(address_value(prop));
    for (key, val) in raw_params(prop) {
        match key.to_ascii_uppercase().as_str() {
            "CN" => attendee.name = Some(val),
            "PARTSTAT" => match ParticipationStatus::from_ics_str(&val) {
                Some(status) => attendee.status = Some(status),
                None => attendee.params.push((key, val)),
            },
            "RSVP" => attendee.rsvp = val.eq_ignore_ascii_case("TRUE"),
            "RESPONDED-AT" => attendee.responded_at = Some(val),
            _ => attendee.params.push((key, val)),
        }
    }
    attendee
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::generate_ics;
    use chrono::{TimeZone, Utc};

    const INVITE: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
METHOD:REQUEST\r\n\
BEGIN:VEVENT\r\n\
UID:E1\r\n\
SUMMARY:Planning\r\n\
DTSTART:20250106T100000Z\r\n\
DTEND:20250106T110000Z\r\n\
ORGANIZER;CN=Alice:mailto:alice@corp.example\r\n\
ATTENDEE;CN=Bob;PARTSTAT=NEEDS-ACTION;RSVP=TRUE;ROLE=REQ-PARTICIPANT:mailto:bob@ext.com\r\n\
ATTENDEE;PARTSTAT=ACCEPTED:mailto:carol@corp.example\r\n\
CATEGORIES:Work\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
DESCRIPTION:Reminder\r\n\
TRIGGER:-PT15M\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_invite() {
        let doc = parse_calendar(INVITE).expect("Should parse");

        assert_eq!(doc.method, Some(Method::Request));
        assert_eq!(doc.components.len(), 1);

        let event = &doc.components[0];
        assert_eq!(event.uid, "E1");
        assert_eq!(event.summary.as_deref(), Some("Planning"));
        assert_eq!(
            event.start,
            EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap())
        );

        let organizer = event.organizer.as_ref().expect("Should have organizer");
        assert_eq!(organizer.email, "alice@corp.example");
        assert_eq!(organizer.name.as_deref(), Some("Alice"));

        assert_eq!(event.attendees.len(), 2);
        let bob = &event.attendees[0];
        assert_eq!(bob.email, "bob@ext.com");
        assert_eq!(bob.status, Some(ParticipationStatus::NeedsAction));
        assert!(bob.rsvp);
        assert_eq!(
            bob.params,
            vec![("ROLE".to_string(), "REQ-PARTICIPANT".to_string())]
        );

        assert_eq!(event.alarms.len(), 1);
        assert_eq!(event.alarms[0].value("TRIGGER"), Some("-PT15M"));
        assert_eq!(event.extra_properties.len(), 1);
        assert_eq!(event.extra_properties[0].name, "CATEGORIES");
    }

    #[test]
    fn test_parse_master_and_exception() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:series-1\r\n\
SUMMARY:Weekly\r\n\
DTSTART;TZID=Europe/Berlin:20250106T100000\r\n\
DTEND;TZID=Europe/Berlin:20250106T110000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO\r\n\
EXDATE;TZID=Europe/Berlin:20250113T100000,20250120T100000\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:series-1\r\n\
SUMMARY:Weekly (moved)\r\n\
RECURRENCE-ID;TZID=Europe/Berlin:20250127T100000\r\n\
DTSTART;TZID=Europe/Berlin:20250127T140000\r\n\
DTEND;TZID=Europe/Berlin:20250127T150000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let doc = parse_calendar(ics).expect("Should parse");

        assert_eq!(doc.method, None);
        assert_eq!(doc.components.len(), 2);

        let master = doc.master("series-1").expect("Should have master");
        let recurrence = master.recurrence.as_ref().expect("Should have recurrence");
        assert_eq!(recurrence.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(recurrence.exdates.len(), 2);

        let exception = &doc.components[1];
        assert!(exception.is_exception());
        assert!(exception.recurrence.is_none());
    }

    #[test]
    fn test_parse_keeps_timezones_and_alarms_verbatim() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Berlin\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19701025T030000\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:E1\r\n\
DTSTART;TZID=Europe/Berlin:20250106T100000\r\n\
X-ALT-DESC;FMTTYPE=text/html:<p>Hi\\, all</p>\r\n\
BEGIN:VALARM\r\n\
ACTION:EMAIL\r\n\
SUMMARY:Heads up\r\n\
ATTENDEE:mailto:bob@ext.com\r\n\
TRIGGER;VALUE=DATE-TIME:20250106T080000Z\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let doc = parse_calendar(ics).expect("Should parse");

        assert_eq!(doc.timezones.len(), 1);
        assert_eq!(doc.timezones[0].value("TZID"), Some("Europe/Berlin"));

        let event = &doc.components[0];
        assert_eq!(event.alarms.len(), 1);
        assert_eq!(event.alarms[0].value("ACTION"), Some("EMAIL"));
        assert_eq!(event.alarms[0].value("TRIGGER"), Some("20250106T080000Z"));
        assert!(event.attendees.is_empty(), "alarm recipients are not attendees");

        assert_eq!(event.extra_properties.len(), 1);
        assert_eq!(event.extra_properties[0].value, "<p>Hi\\, all</p>");
    }

    #[test]
    fn test_parse_rejects_event_without_uid() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20250106T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let err = parse_calendar(ics).unwrap_err();
        assert!(matches!(err, RsvpError::IcsParse(_)), "got {err:?}");
    }

    #[test]
    fn test_responded_at_roundtrip() {
        let mut doc = parse_calendar(INVITE).expect("Should parse");
        doc.components[0].attendees[0].responded_at = Some("20250101T090000Z".to_string());
        doc.components[0].attendees[0].rsvp = false;

        let generated = generate_ics(&doc).expect("Should generate");
        let reparsed = parse_calendar(&generated).expect("Should reparse");

        let bob = reparsed.components[0]
            .find_attendee("bob@ext.com")
            .expect("Bob should survive the round trip");
        assert_eq!(bob.responded_at.as_deref(), Some("20250101T090000Z"));
        assert!(!bob.rsvp);
        assert_eq!(reparsed.components[0].attendees.len(), 2);
        assert_eq!(reparsed.method, Some(Method::Request));
    }
}
