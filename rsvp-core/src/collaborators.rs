//! Services the engine calls out to.
//!
//! Storage, the user directory and mail transport are owned by the host.
//! Every call is blocking from the engine's point of view and any error is
//! fatal to the current action; the engine never retries.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::address::same_address;
use crate::document::{CalendarDocument, Method};
use crate::error::{RsvpResult, SendError};

fn default_date_format() -> String {
    "%m/%d/%Y".to_string()
}

fn default_time_format() -> String {
    "%I:%M %p".to_string()
}

/// A local user as known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Login address, also the user's calendar address
    pub public_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// IANA name; floating and all-day times are read in this zone
    #[serde(default)]
    pub default_timezone: Option<String>,
    /// strftime pattern for dates
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// strftime pattern for times
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

impl User {
    pub fn new(id: impl Into<String>, public_id: impl Into<String>) -> Self {
        User {
            id: id.into(),
            public_id: public_id.into(),
            name: None,
            default_timezone: None,
            date_format: default_date_format(),
            time_format: default_time_format(),
        }
    }

    /// The user's timezone, UTC when unset or not an IANA name.
    pub fn tz(&self) -> Tz {
        self.default_timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(chrono_tz::UTC)
    }

    /// Display name, falling back to the public id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.public_id)
    }
}

/// A mail account belonging to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

/// The account a user authenticates with: the one matching the public id,
/// else the first.
pub fn primary_account<'a>(user: &User, accounts: &'a [Account]) -> Option<&'a Account> {
    accounts
        .iter()
        .find(|a| same_address(&a.email, &user.public_id))
        .or_else(|| accounts.first())
}

/// A sender identity: address plus optional display name.
#[derive(Debug, Clone, PartialEq)]
pub struct Mailbox {
    pub email: String,
    pub name: Option<String>,
}

/// A fully assembled reply handed to [`MailSender::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Account the message is sent through
    pub account: Account,
    /// Account to send as, when it differs from `account` (relay sending)
    pub send_as: Option<Account>,
    pub from: Mailbox,
    pub to: String,
    pub subject: String,
    /// Serialized calendar document
    pub calendar: String,
    pub method: Option<Method>,
    /// Optional text/html alternative
    pub html: Option<String>,
}

/// Persistent event storage, addressed per user and calendar.
pub trait EventStorage {
    fn get_event(
        &self,
        user: &User,
        calendar_id: &str,
        event_id: &str,
    ) -> RsvpResult<Option<CalendarDocument>>;

    fn update_event_raw(
        &self,
        user: &User,
        calendar_id: &str,
        event_id: &str,
        data: &str,
    ) -> RsvpResult<()>;

    /// Returns false when there was nothing to delete.
    fn delete_event(&self, user: &User, calendar_id: &str, event_id: &str) -> RsvpResult<bool>;

    /// Record `recurrence_id` (epoch seconds) as a deleted occurrence.
    fn mark_occurrence_excluded(
        &self,
        user: &User,
        calendar_id: &str,
        event_id: &str,
        recurrence_id: i64,
    ) -> RsvpResult<bool>;

    /// Calendar link-driven responses are stored in.
    fn default_calendar(&self, user: &User) -> RsvpResult<Option<String>>;
}

/// Users and their mail accounts.
pub trait Directory {
    fn resolve_user(&self, public_id: &str) -> RsvpResult<Option<User>>;

    fn list_accounts_for_user(&self, user_id: &str) -> RsvpResult<Vec<Account>>;
}

/// Mail transport.
pub trait MailSender {
    /// Ok(false) means the transport declined without a specific reason.
    fn send(&self, message: &OutboundMessage) -> Result<bool, SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, email: &str) -> Account {
        Account {
            id: id.to_string(),
            email: email.to_string(),
            friendly_name: None,
        }
    }

    #[test]
    fn test_user_tz_falls_back_to_utc() {
        let mut user = User::new("1", "alice@corp.example");
        assert_eq!(user.tz(), chrono_tz::UTC);

        user.default_timezone = Some("Europe/Berlin".to_string());
        assert_eq!(user.tz(), chrono_tz::Europe::Berlin);

        user.default_timezone = Some("Mars/Olympus".to_string());
        assert_eq!(user.tz(), chrono_tz::UTC);
    }

    #[test]
    fn test_primary_account() {
        let user = User::new("1", "alice@corp.example");
        let accounts = vec![
            account("a", "alice.private@ext.com"),
            account("b", "Alice@Corp.Example"),
        ];

        assert_eq!(primary_account(&user, &accounts).unwrap().id, "b");
        assert_eq!(primary_account(&user, &accounts[..1]).unwrap().id, "a");
        assert!(primary_account(&user, &[]).is_none());
    }

    #[test]
    fn test_display_name() {
        let mut user = User::new("1", "alice@corp.example");
        assert_eq!(user.display_name(), "alice@corp.example");
        user.name = Some("Alice".to_string());
        assert_eq!(user.display_name(), "Alice");
    }
}
