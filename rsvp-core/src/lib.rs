//! Attendee response reconciliation for iTIP scheduling.
//!
//! Merges an attendee's ACCEPTED/DECLINED/TENTATIVE response into the right
//! occurrence of a calendar document, decides what storage should do with it,
//! and assembles the reply to the organizer:
//! - `document` / `event` for the calendar data model, `ics` to read and write it
//! - `recurrence` to resolve or synthesize occurrence exceptions
//! - `reconcile`, `policy`, `privacy` and `assemble` for the pipeline steps
//! - `engine` to run them against the `collaborators` the host provides

pub mod address;
pub mod assemble;
pub mod collaborators;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod ics;
pub mod policy;
pub mod privacy;
pub mod reconcile;
pub mod recurrence;

pub use config::EngineConfig;
pub use document::{CalendarDocument, Method};
pub use engine::{
    ActionOutcome, InboundOutcome, InviteLink, LinkOutcome, ReconciliationRequest, ReplyEngine,
};
pub use error::{RsvpError, RsvpResult, SendError};
pub use event::*;
pub use policy::{ResponseScope, StorageAction};
