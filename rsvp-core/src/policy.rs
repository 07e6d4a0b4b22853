//! Deciding what a response does to the stored event.

use serde::{Deserialize, Serialize};

use crate::document::Method;
use crate::error::RsvpError;
use crate::event::ParticipationStatus;

/// Which occurrences a response applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ResponseScope {
    /// The event as stored, without per-occurrence resolution (0)
    Single,
    /// One occurrence, identified by a recurrence id (1)
    ThisOnly,
    /// The series from this occurrence on (2)
    #[default]
    ThisAndFuture,
}

impl TryFrom<u8> for ResponseScope {
    type Error = RsvpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResponseScope::Single),
            1 => Ok(ResponseScope::ThisOnly),
            2 => Ok(ResponseScope::ThisAndFuture),
            other => Err(RsvpError::Config(format!("invalid response scope {other}"))),
        }
    }
}

impl From<ResponseScope> for u8 {
    fn from(scope: ResponseScope) -> Self {
        match scope {
            ResponseScope::Single => 0,
            ResponseScope::ThisOnly => 1,
            ResponseScope::ThisAndFuture => 2,
        }
    }
}

/// The single storage call a response results in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageAction {
    /// Nothing is written
    None,
    /// Persist the reconciled document
    UpdateEvent,
    /// Delete the whole event/series
    DeleteEvent,
    /// Mark one occurrence (epoch seconds) as excluded
    ExcludeOccurrence(i64),
}

/// Pick the storage action for a response.
///
/// `occurrence` is the resolved recurrence id when the response targets one
/// occurrence. A decline, or a CANCEL method, removes: the occurrence when
/// scope is [`ResponseScope::ThisOnly`] and one was resolved, otherwise the
/// whole event. Anything else updates.
pub fn decide(
    scope: ResponseScope,
    status: ParticipationStatus,
    method: Option<&Method>,
    occurrence: Option<i64>,
) -> StorageAction {
    let removes = status == ParticipationStatus::Declined || method == Some(&Method::Cancel);

    match (scope, occurrence) {
        (ResponseScope::ThisOnly, Some(recurrence_id)) if removes => {
            StorageAction::ExcludeOccurrence(recurrence_id)
        }
        _ if removes => StorageAction::DeleteEvent,
        _ => StorageAction::UpdateEvent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParticipationStatus::*;

    #[test]
    fn test_this_and_future_decline_deletes() {
        assert_eq!(
            decide(ResponseScope::ThisAndFuture, Declined, Some(&Method::Reply), None),
            StorageAction::DeleteEvent
        );
    }

    #[test]
    fn test_cancel_method_deletes_regardless_of_status() {
        assert_eq!(
            decide(ResponseScope::ThisAndFuture, Accepted, Some(&Method::Cancel), None),
            StorageAction::DeleteEvent
        );
    }

    #[test]
    fn test_accept_updates() {
        for scope in [ResponseScope::Single, ResponseScope::ThisOnly, ResponseScope::ThisAndFuture] {
            assert_eq!(
                decide(scope, Accepted, Some(&Method::Reply), Some(42)),
                StorageAction::UpdateEvent
            );
        }
        assert_eq!(
            decide(ResponseScope::ThisAndFuture, Tentative, None, None),
            StorageAction::UpdateEvent
        );
    }

    #[test]
    fn test_this_only_decline_excludes_occurrence() {
        assert_eq!(
            decide(ResponseScope::ThisOnly, Declined, Some(&Method::Reply), Some(1_736_157_600)),
            StorageAction::ExcludeOccurrence(1_736_157_600)
        );
    }

    #[test]
    fn test_this_only_without_occurrence_deletes_event() {
        assert_eq!(
            decide(ResponseScope::ThisOnly, Declined, Some(&Method::Reply), None),
            StorageAction::DeleteEvent
        );
    }

    #[test]
    fn test_scope_from_number() {
        assert_eq!(ResponseScope::try_from(1).unwrap(), ResponseScope::ThisOnly);
        assert_eq!(u8::from(ResponseScope::ThisAndFuture), 2);
        assert!(ResponseScope::try_from(7).is_err());
        assert_eq!(ResponseScope::default(), ResponseScope::ThisAndFuture);
    }
}
