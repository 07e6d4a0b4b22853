//! Calendar documents: a METHOD plus the VEVENTs of one or more series.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::event::{EventComponent, RawComponent};

/// iTIP scheduling method (METHOD)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Request,
    Reply,
    Cancel,
    Publish,
    Other(String),
}

impl Method {
    pub fn from_ics_str(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "REQUEST" => Method::Request,
            "REPLY" => Method::Reply,
            "CANCEL" => Method::Cancel,
            "PUBLISH" => Method::Publish,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_ics_str(&self) -> &str {
        match self {
            Method::Request => "REQUEST",
            Method::Reply => "REPLY",
            Method::Cancel => "CANCEL",
            Method::Publish => "PUBLISH",
            Method::Other(other) => other,
        }
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Method::from_ics_str(s))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_ics_str())
    }
}

/// A parsed VCALENDAR.
///
/// Owned by the operation that parsed it. Cloning is deep, so an outbound
/// copy can be rewritten without touching the copy that gets persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalendarDocument {
    pub method: Option<Method>,
    pub components: Vec<EventComponent>,
    /// VTIMEZONE definitions, re-emitted unchanged
    pub timezones: Vec<RawComponent>,
}

impl CalendarDocument {
    pub fn new(method: Option<Method>) -> Self {
        CalendarDocument {
            method,
            components: Vec::new(),
            timezones: Vec::new(),
        }
    }

    /// UID of the series to act on: `hint` when some component carries it,
    /// otherwise the first component's UID.
    pub fn series_uid(&self, hint: Option<&str>) -> Option<String> {
        if let Some(hint) = hint.filter(|h| self.components.iter().any(|c| c.uid == *h)) {
            return Some(hint.to_string());
        }
        self.components.first().map(|c| c.uid.clone())
    }

    /// Index of the master (no RECURRENCE-ID) of series `uid`.
    pub fn master_index(&self, uid: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.uid == uid && !c.is_exception())
    }

    pub fn master(&self, uid: &str) -> Option<&EventComponent> {
        self.master_index(uid).map(|i| &self.components[i])
    }

    pub fn master_mut(&mut self, uid: &str) -> Option<&mut EventComponent> {
        let index = self.master_index(uid)?;
        self.components.get_mut(index)
    }

    /// Index of the exception of series `uid` whose RECURRENCE-ID resolves to
    /// `recurrence_id` (epoch seconds).
    pub fn exception_index(&self, uid: &str, recurrence_id: i64, default_tz: Tz) -> Option<usize> {
        self.components.iter().position(|c| {
            c.uid == uid && c.recurrence_timestamp(default_tz) == Some(recurrence_id)
        })
    }

    pub fn exception(&self, uid: &str, recurrence_id: i64, default_tz: Tz) -> Option<&EventComponent> {
        self.exception_index(uid, recurrence_id, default_tz)
            .map(|i| &self.components[i])
    }

    /// Master of the series, or its first component when the document only
    /// carries exceptions.
    pub fn primary_index(&self, uid: &str) -> Option<usize> {
        self.master_index(uid)
            .or_else(|| self.components.iter().position(|c| c.uid == uid))
    }

    pub fn push(&mut self, component: EventComponent) -> usize {
        self.components.push(component);
        self.components.len() - 1
    }

    /// A document holding only `component`, with the given method.
    pub fn single(method: Option<Method>, component: EventComponent) -> Self {
        CalendarDocument {
            method,
            components: vec![component],
            timezones: Vec::new(),
        }
    }
}
