//! Error types for response reconciliation.

use thiserror::Error;

/// Errors that can occur while reconciling a response or sending the reply.
#[derive(Error, Debug)]
pub enum RsvpError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Cannot send reply for event '{0}': no organizer")]
    NoOrganizer(String),

    #[error("Could not send reply: {0}")]
    MessageSendFailed(#[from] SendError),

    #[error("Occurrence {recurrence_id} of '{uid}' not found within {limit} occurrences")]
    OccurrenceNotResolvable {
        uid: String,
        recurrence_id: i64,
        limit: u16,
    },

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a mail transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    #[error("mail transport rejected the message")]
    Rejected,

    #[error("invalid recipients: {0}")]
    InvalidRecipients(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for reconciliation operations.
pub type RsvpResult<T> = Result<T, RsvpError>;
