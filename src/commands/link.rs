use anyhow::Result;
use rsvp_core::{InviteLink, LinkOutcome};

use super::{Host, print_outcome};

/// Act on an invitation response link.
pub fn run(host: &Host, link: InviteLink) -> Result<()> {
    println!("{} → {} (via link)", link.attendee, link.status);

    match host.engine().respond_from_link(&link)? {
        LinkOutcome::Unchanged => println!("  Already {}, nothing to do", link.status),
        LinkOutcome::Applied(outcome) => print_outcome(&outcome),
    }

    Ok(())
}
