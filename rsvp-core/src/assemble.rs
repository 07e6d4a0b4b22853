//! Building the outbound reply.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::address::{normalize_address, strip_scheme};
use crate::collaborators::User;
use crate::document::{CalendarDocument, Method};
use crate::error::{RsvpError, RsvpResult};
use crate::event::{EventComponent, EventTime, ParticipationStatus};
use crate::ics::generate_ics;

/// Subject prefixes per response, e.g. `Accepted` in `Accepted: Standup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectLabels {
    pub accepted: String,
    pub declined: String,
    pub tentative: String,
}

impl Default for SubjectLabels {
    fn default() -> Self {
        SubjectLabels {
            accepted: "Accepted".to_string(),
            declined: "Declined".to_string(),
            tentative: "Tentative".to_string(),
        }
    }
}

impl SubjectLabels {
    pub fn prefix(&self, status: ParticipationStatus) -> Option<&str> {
        let label = match status {
            ParticipationStatus::Accepted => &self.accepted,
            ParticipationStatus::Declined => &self.declined,
            ParticipationStatus::Tentative => &self.tentative,
            ParticipationStatus::NeedsAction | ParticipationStatus::Delegated => return None,
        };
        Some(label.as_str()).filter(|l| !l.is_empty())
    }

    /// `<prefix>: <summary>`, or the bare summary when `status` has no label.
    pub fn subject(&self, status: ParticipationStatus, summary: Option<&str>) -> String {
        let summary = summary.unwrap_or_default();
        match self.prefix(status) {
            Some(prefix) => format!("{prefix}: {summary}"),
            None => summary.to_string(),
        }
    }
}

/// Method of the reply: REQUEST becomes REPLY, anything else is kept.
pub fn transition_method(incoming: Option<&Method>) -> Option<Method> {
    match incoming {
        Some(Method::Request) => Some(Method::Reply),
        other => other.cloned(),
    }
}

/// The reply's To address: the component's organizer.
pub fn resolve_recipient(component: &EventComponent) -> RsvpResult<String> {
    component
        .organizer
        .as_ref()
        .map(|o| strip_scheme(&o.email).to_string())
        .filter(|email| !email.is_empty())
        .ok_or_else(|| RsvpError::NoOrganizer(component.uid.clone()))
}

/// Copy of `target` listing only the responder among its attendees.
pub fn reply_component(target: &EventComponent, responder: &str) -> EventComponent {
    let key = normalize_address(responder);
    let mut component = target.clone();
    component.attendees.retain(|a| a.key() == key);
    component
}

/// A reply ready to be handed to a mail transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundReply {
    pub to: String,
    pub subject: String,
    pub method: Option<Method>,
    pub document: CalendarDocument,
}

impl OutboundReply {
    /// Serialized calendar payload.
    pub fn payload(&self) -> RsvpResult<String> {
        generate_ics(&self.document)
    }
}

/// Wrap `component` into a reply addressed to `to`.
pub fn assemble(
    component: EventComponent,
    to: String,
    incoming_method: Option<&Method>,
    status: ParticipationStatus,
    labels: &SubjectLabels,
) -> OutboundReply {
    let method = transition_method(incoming_method);
    let subject = labels.subject(status, component.summary.as_deref());

    OutboundReply {
        to,
        subject,
        document: CalendarDocument::single(method.clone(), component),
        method,
    }
}

/// Short text/html alternative: the subject and the start time, formatted
/// with the user's date and time patterns in the user's timezone.
pub fn html_alternative(reply: &OutboundReply, user: &User) -> String {
    let when = reply
        .document
        .components
        .first()
        .map(|c| format_start(&c.start, user))
        .unwrap_or_default();

    format!(
        "<html><body><p><b>{}</b></p><p>{}</p></body></html>",
        escape_html(&reply.subject),
        escape_html(&when)
    )
}

fn format_start(start: &EventTime, user: &User) -> String {
    let mut out = String::new();
    let written = match start {
        EventTime::Date(date) => write!(out, "{}", date.format(&user.date_format)),
        other => match other.to_utc_in(user.tz()) {
            Some(dt) => {
                let pattern = format!("{} {}", user.date_format, user.time_format);
                write!(out, "{}", dt.with_timezone(&user.tz()).format(&pattern))
            }
            None => Err(std::fmt::Error),
        },
    };

    // Invalid user patterns make chrono's formatter fail
    match written {
        Ok(()) => out,
        Err(_) => start.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
