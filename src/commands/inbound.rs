use std::path::Path;

use anyhow::Result;
use rsvp_core::InboundOutcome;

use super::{Host, read_input};

/// Apply a received REPLY or CANCEL to the organizer's stored event.
pub fn run(
    host: &Host,
    user: &str,
    calendar: &str,
    file: &Path,
    event_id: Option<&str>,
) -> Result<()> {
    let data = read_input(file)?;

    match host
        .engine()
        .process_inbound(user, calendar, event_id, &data)?
    {
        InboundOutcome::Updated { uid, attendees } if attendees.is_empty() => {
            println!("  {uid}: no attendee status taken from the reply")
        }
        InboundOutcome::Updated { uid, attendees } => {
            println!("  {uid}: updated {}", attendees.join(", "))
        }
        InboundOutcome::Deleted { uid, existed: true } => println!("  {uid}: deleted"),
        InboundOutcome::Deleted { uid, existed: false } => println!("  {uid}: was not stored"),
        InboundOutcome::Ignored(method) => println!(
            "  Nothing to do for method {}",
            method.map(|m| m.to_string()).unwrap_or_else(|| "(none)".to_string())
        ),
    }

    Ok(())
}
