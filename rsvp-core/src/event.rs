//! Scheduling event types.
//!
//! An [`EventComponent`] is one VEVENT of a calendar document: either the
//! master of a series or an exception overriding a single occurrence.
//! Properties the engine does not interpret are kept in `extra_properties`,
//! and sub-components such as VALARM in `alarms`, in their wire form so a
//! parse/generate cycle does not alter them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::address::normalize_address;
use crate::ics::raw::parse_content_line;

/// Attendee participation status (PARTSTAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipationStatus {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

impl ParticipationStatus {
    pub fn from_ics_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => Some(Self::NeedsAction),
            "ACCEPTED" => Some(Self::Accepted),
            "DECLINED" => Some(Self::Declined),
            "TENTATIVE" => Some(Self::Tentative),
            "DELEGATED" => Some(Self::Delegated),
            _ => None,
        }
    }

    /// ACCEPTED, DECLINED or TENTATIVE: the statuses an attendee answers with.
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined | Self::Tentative)
    }

    pub fn as_ics_str(&self) -> &'static str {
        match self {
            Self::NeedsAction => "NEEDS-ACTION",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Tentative => "TENTATIVE",
            Self::Delegated => "DELEGATED",
        }
    }
}

impl FromStr for ParticipationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_ics_str(s).ok_or_else(|| format!("unknown participation status '{s}'"))
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_ics_str())
    }
}

/// A DTSTART/DTEND/RECURRENCE-ID/EXDATE value, preserving its ICS form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// Resolve to an instant.
    ///
    /// Floating times, all-day dates (at midnight) and zoned times whose TZID
    /// is not an IANA name are interpreted in `default_tz`.
    pub fn to_utc_in(&self, default_tz: Tz) -> Option<DateTime<Utc>> {
        match self {
            EventTime::Date(d) => localize(default_tz, d.and_hms_opt(0, 0, 0)?),
            EventTime::DateTimeUtc(dt) => Some(*dt),
            EventTime::DateTimeFloating(dt) => localize(default_tz, *dt),
            EventTime::DateTimeZoned { datetime, tzid } => {
                let tz = tzid.parse::<Tz>().unwrap_or(default_tz);
                localize(tz, *datetime)
            }
        }
    }

    /// Epoch seconds of [`EventTime::to_utc_in`].
    pub fn timestamp_in(&self, default_tz: Tz) -> Option<i64> {
        self.to_utc_in(default_tz).map(|dt| dt.timestamp())
    }

    /// The ICS value text (without parameters).
    pub fn to_ics_string(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::DateTimeUtc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::DateTimeFloating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
            EventTime::DateTimeZoned { datetime, .. } => datetime.format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    /// Parse one ICS date or date-time value.
    ///
    /// Eight digits are a date. A trailing `Z` is UTC and wins over `tzid`;
    /// otherwise `tzid` makes a local time zoned. Periods are rejected.
    pub fn parse_ics(value: &str, tzid: Option<&str>) -> Option<EventTime> {
        let value = value.trim();
        if value.len() == 8 {
            return NaiveDate::parse_from_str(value, "%Y%m%d")
                .ok()
                .map(EventTime::Date);
        }
        if let Some(utc) = value.strip_suffix('Z') {
            return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                .ok()
                .map(|dt| EventTime::DateTimeUtc(dt.and_utc()));
        }
        let datetime = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
        Some(match tzid {
            Some(tzid) => EventTime::DateTimeZoned {
                datetime,
                tzid: tzid.to_string(),
            },
            None => EventTime::DateTimeFloating(datetime),
        })
    }

    /// Shift by a duration, keeping the variant.
    pub fn shifted(&self, by: Duration) -> EventTime {
        match self {
            EventTime::Date(d) => EventTime::Date(*d + Duration::days(by.num_days())),
            EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(*dt + by),
            EventTime::DateTimeFloating(dt) => EventTime::DateTimeFloating(*dt + by),
            EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
                datetime: *datetime + by,
                tzid: tzid.clone(),
            },
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} {}", datetime.format("%Y-%m-%d %H:%M:%S"), tzid)
            }
        }
    }
}

fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Expansion rules of a master event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recurrence {
    /// RRULE value, e.g. `FREQ=WEEKLY;BYDAY=MO`
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
    pub rdates: Vec<EventTime>,
}

/// A property carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProperty {
    pub name: String,
    /// Parameter values without surrounding quotes
    pub params: Vec<(String, String)>,
    /// Value as written on the wire, escapes included
    pub value: String,
}

/// A sub-component (VALARM, VTIMEZONE, ...) kept as its unfolded content
/// lines, `BEGIN` and `END` included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComponent {
    pub name: String,
    pub lines: Vec<String>,
}

impl RawComponent {
    /// Value of the first top-level `name` property.
    pub fn value(&self, name: &str) -> Option<&str> {
        let mut depth = 0usize;
        for line in &self.lines {
            if line.starts_with("BEGIN:") {
                depth += 1;
            } else if line.starts_with("END:") {
                depth = depth.saturating_sub(1);
            } else if depth == 1 {
                let Some(prop) = parse_content_line(line) else {
                    continue;
                };
                if prop.name.eq_ignore_ascii_case(name) {
                    return Some(&line[line.len() - prop.value.len()..]);
                }
            }
        }
        None
    }
}

/// An event attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    /// Address without the `mailto:` scheme
    pub email: String,
    /// Display name (CN)
    pub name: Option<String>,
    /// PARTSTAT
    pub status: Option<ParticipationStatus>,
    /// Pending-response flag (RSVP=TRUE)
    pub rsvp: bool,
    /// RESPONDED-AT, compact UTC form `YYYYMMDDTHHMMSSZ`
    pub responded_at: Option<String>,
    /// Remaining parameters (ROLE, CUTYPE, ...)
    pub params: Vec<(String, String)>,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Attendee {
            email: email.into(),
            name: None,
            status: None,
            rsvp: false,
            responded_at: None,
            params: Vec::new(),
        }
    }

    /// Comparison key for this attendee's address.
    pub fn key(&self) -> String {
        normalize_address(&self.email)
    }
}

/// The event organizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organizer {
    /// Address without the `mailto:` scheme
    pub email: String,
    pub name: Option<String>,
    pub params: Vec<(String, String)>,
}

impl Organizer {
    pub fn new(email: impl Into<String>) -> Self {
        Organizer {
            email: email.into(),
            name: None,
            params: Vec::new(),
        }
    }
}

/// One VEVENT: a series master or an occurrence exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventComponent {
    /// Series identity, shared by the master and its exceptions
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,

    /// RRULE/EXDATE/RDATE (masters only)
    pub recurrence: Option<Recurrence>,
    /// RECURRENCE-ID (exceptions only)
    pub recurrence_id: Option<EventTime>,

    pub organizer: Option<Organizer>,
    pub attendees: Vec<Attendee>,

    /// LAST-MODIFIED
    pub last_modified: Option<DateTime<Utc>>,
    /// SEQUENCE
    pub sequence: Option<i64>,
    /// VALARM sub-components
    pub alarms: Vec<RawComponent>,

    /// Everything else on the VEVENT, in document order
    pub extra_properties: Vec<RawProperty>,
}

impl EventComponent {
    pub fn new(uid: impl Into<String>, start: EventTime) -> Self {
        EventComponent {
            uid: uid.into(),
            summary: None,
            description: None,
            location: None,
            start,
            end: None,
            recurrence: None,
            recurrence_id: None,
            organizer: None,
            attendees: Vec::new(),
            last_modified: None,
            sequence: None,
            alarms: Vec::new(),
            extra_properties: Vec::new(),
        }
    }

    pub fn is_exception(&self) -> bool {
        self.recurrence_id.is_some()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// First attendee whose address normalizes to the same key as `address`.
    pub fn find_attendee(&self, address: &str) -> Option<&Attendee> {
        let key = normalize_address(address);
        self.attendees.iter().find(|a| a.key() == key)
    }

    /// Current PARTSTAT of `address`, if it is listed.
    pub fn attendee_status(&self, address: &str) -> Option<ParticipationStatus> {
        self.find_attendee(address).and_then(|a| a.status)
    }

    /// Epoch seconds of the RECURRENCE-ID, if this is an exception.
    pub fn recurrence_timestamp(&self, default_tz: Tz) -> Option<i64> {
        self.recurrence_id.as_ref()?.timestamp_in(default_tz)
    }

    /// DTEND - DTSTART, zero when either end is missing or unresolvable.
    pub fn duration(&self, default_tz: Tz) -> Duration {
        let end = self.end.as_ref().and_then(|e| e.to_utc_in(default_tz));
        match (self.start.to_utc_in(default_tz), end) {
            (Some(s), Some(e)) => e - s,
            _ => Duration::zero(),
        }
    }

    /// Drop expansion rules; an exception must not define its own.
    pub fn strip_recurrence(&mut self) {
        self.recurrence = None;
        self.extra_properties
            .retain(|p| !matches!(p.name.as_str(), "RRULE" | "EXDATE" | "RDATE" | "EXRULE"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_partstat_parse_is_case_insensitive() {
        assert_eq!(
            ParticipationStatus::from_ics_str("accepted"),
            Some(ParticipationStatus::Accepted)
        );
        assert_eq!(
            "NEEDS-ACTION".parse::<ParticipationStatus>(),
            Ok(ParticipationStatus::NeedsAction)
        );
        assert!("MAYBE".parse::<ParticipationStatus>().is_err());
    }

    #[test]
    fn test_floating_time_uses_default_timezone() {
        let floating = EventTime::DateTimeFloating(naive(2025, 1, 6, 10));
        let berlin: Tz = "Europe/Berlin".parse().unwrap();

        let utc = floating.to_utc_in(berlin).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_zoned_time_ignores_default_timezone() {
        let zoned = EventTime::DateTimeZoned {
            datetime: naive(2025, 7, 1, 10),
            tzid: "America/New_York".to_string(),
        };

        let utc = zoned.to_utc_in(chrono_tz::UTC).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 7, 1, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_unknown_tzid_falls_back_to_default() {
        let zoned = EventTime::DateTimeZoned {
            datetime: naive(2025, 7, 1, 10),
            tzid: "W. Europe Standard Time".to_string(),
        };

        assert_eq!(
            zoned.timestamp_in(chrono_tz::UTC),
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn test_parse_ics_values() {
        assert_eq!(
            EventTime::parse_ics("20250224", Some("Europe/Berlin")),
            Some(EventTime::Date(NaiveDate::from_ymd_opt(2025, 2, 24).unwrap()))
        );
        assert_eq!(
            EventTime::parse_ics("20250106T100000Z", Some("Europe/Berlin")),
            Some(EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap()))
        );
        assert_eq!(
            EventTime::parse_ics("20250106T100000", Some("Europe/Berlin")),
            Some(EventTime::DateTimeZoned {
                datetime: naive(2025, 1, 6, 10),
                tzid: "Europe/Berlin".to_string(),
            })
        );
        assert_eq!(
            EventTime::parse_ics("20250106T100000", None),
            Some(EventTime::DateTimeFloating(naive(2025, 1, 6, 10)))
        );
        assert_eq!(EventTime::parse_ics("20250106T100000Z/PT1H", None), None);
    }

    #[test]
    fn test_raw_component_value_skips_nested() {
        let alarm = RawComponent {
            name: "VALARM".to_string(),
            lines: vec![
                "BEGIN:VALARM".to_string(),
                "ACTION:EMAIL".to_string(),
                "TRIGGER;VALUE=DATE-TIME:20250320T140000Z".to_string(),
                "END:VALARM".to_string(),
            ],
        };

        assert_eq!(alarm.value("action"), Some("EMAIL"));
        assert_eq!(alarm.value("TRIGGER"), Some("20250320T140000Z"));
        assert_eq!(alarm.value("DESCRIPTION"), None);
    }

    #[test]
    fn test_find_attendee_normalizes() {
        let mut event = EventComponent::new(
            "E1",
            EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()),
        );
        let mut bob = Attendee::new("Bob@Ext.com");
        bob.status = Some(ParticipationStatus::Tentative);
        event.attendees.push(bob);

        assert!(event.find_attendee("mailto:bob@ext.com").is_some());
        assert_eq!(
            event.attendee_status("BOB@EXT.COM"),
            Some(ParticipationStatus::Tentative)
        );
        assert!(event.find_attendee("alice@ext.com").is_none());
    }

    #[test]
    fn test_strip_recurrence_removes_raw_rules() {
        let mut event = EventComponent::new("E1", EventTime::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        event.recurrence = Some(Recurrence {
            rrule: Some("FREQ=DAILY".to_string()),
            ..Default::default()
        });
        event.extra_properties.push(RawProperty {
            name: "EXRULE".to_string(),
            params: vec![],
            value: "FREQ=WEEKLY".to_string(),
        });
        event.extra_properties.push(RawProperty {
            name: "CATEGORIES".to_string(),
            params: vec![],
            value: "Work".to_string(),
        });

        event.strip_recurrence();

        assert!(event.recurrence.is_none());
        assert_eq!(event.extra_properties.len(), 1);
        assert_eq!(event.extra_properties[0].name, "CATEGORIES");
    }
}
