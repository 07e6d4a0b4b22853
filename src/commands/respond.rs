use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use rsvp_core::{ParticipationStatus, ReconciliationRequest, ResponseScope};

use super::{Host, print_outcome, read_input};

/// Which occurrences a response covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    /// The event as stored
    Single,
    /// Only the occurrence given by --recurrence-id
    ThisOnly,
    /// The whole series
    ThisAndFuture,
}

impl From<Scope> for ResponseScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Single => ResponseScope::Single,
            Scope::ThisOnly => ResponseScope::ThisOnly,
            Scope::ThisAndFuture => ResponseScope::ThisAndFuture,
        }
    }
}

pub struct RespondArgs<'a> {
    pub file: &'a Path,
    pub attendee: &'a str,
    pub status: ParticipationStatus,
    pub user: Option<&'a str>,
    pub calendar: Option<&'a str>,
    pub event_id: Option<&'a str>,
    pub scope: Scope,
    pub recurrence_id: Option<i64>,
    pub external: bool,
}

/// Read an invitation (a file, or stdin for "-") and respond to it.
pub fn run(host: &Host, args: RespondArgs) -> Result<()> {
    let data = read_input(args.file)?;

    let mut request = ReconciliationRequest::new(args.attendee, args.status);
    request.user_id = args.user.map(str::to_string);
    request.calendar_id = args.calendar.map(str::to_string);
    request.event_id = args.event_id.map(str::to_string);
    request.scope = args.scope.into();
    request.recurrence_id = args.recurrence_id;
    request.attendee_external = args.external;

    println!("{} → {}", args.attendee, args.status);
    let outcome = host.engine().appointment_action(&request, &data)?;
    print_outcome(&outcome);

    Ok(())
}
