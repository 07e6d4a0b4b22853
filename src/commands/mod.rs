pub mod inbound;
pub mod link;
pub mod respond;
pub mod update;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use rsvp_core::{ActionOutcome, ParticipationStatus, ReplyEngine, StorageAction};

use crate::config::RsvpConfig;
use crate::directory::ConfigDirectory;
use crate::outbox::OutboxMailSender;
use crate::store::FileEventStorage;

/// The collaborators an engine runs against, built once from the config.
pub struct Host {
    pub config: RsvpConfig,
    pub storage: FileEventStorage,
    pub directory: ConfigDirectory,
    pub mailer: OutboxMailSender,
}

impl Host {
    pub fn new(config: RsvpConfig) -> Self {
        let storage = FileEventStorage::new(
            config.store_path(),
            &config.default_calendar,
            config.engine.recurrence_limit,
        );
        let directory = ConfigDirectory::new(config.users.clone());
        let mailer = OutboxMailSender::new(config.outbox_path());

        Host {
            config,
            storage,
            directory,
            mailer,
        }
    }

    pub fn engine(&self) -> ReplyEngine<'_> {
        ReplyEngine::new(
            self.config.engine.clone(),
            &self.storage,
            &self.directory,
            &self.mailer,
        )
    }
}

/// Read a calendar file, or stdin for "-".
pub fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut data = String::new();
        std::io::stdin()
            .read_to_string(&mut data)
            .context("Could not read calendar data from stdin")?;
        return Ok(data);
    }
    std::fs::read_to_string(file).with_context(|| format!("Could not read {}", file.display()))
}

/// Parse a recurrence id given as epoch seconds or an RFC 3339 timestamp.
pub fn parse_recurrence_id(value: &str) -> Result<i64, String> {
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(seconds);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|_| format!("'{value}' is neither epoch seconds nor RFC 3339"))
}

/// Parse a `--status` value. NEEDS-ACTION and DELEGATED are not answers.
pub fn parse_response_status(value: &str) -> Result<ParticipationStatus, String> {
    let status: ParticipationStatus = value.parse()?;
    if status.is_response() {
        Ok(status)
    } else {
        Err(format!("{status} is not a response, use ACCEPTED, DECLINED or TENTATIVE"))
    }
}

pub fn print_outcome(outcome: &ActionOutcome) {
    match outcome.storage {
        StorageAction::None => println!("  {}: nothing stored", outcome.uid),
        StorageAction::UpdateEvent => println!("  {}: updated", outcome.uid),
        StorageAction::DeleteEvent => println!("  {}: deleted", outcome.uid),
        StorageAction::ExcludeOccurrence(rid) => {
            println!("  {}: occurrence {} removed", outcome.uid, rid)
        }
    }

    if !outcome.found_existing {
        println!("  Added as a new attendee");
    }

    match outcome.reply {
        Some(ref reply) => println!("  Reply \"{}\" queued to {}", reply.subject, reply.to),
        None => println!("  No reply sent"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recurrence_id() {
        assert_eq!(parse_recurrence_id("1736762400"), Ok(1736762400));
        assert_eq!(parse_recurrence_id("2025-01-13T10:00:00Z"), Ok(1736762400));
        assert_eq!(parse_recurrence_id("2025-01-13T11:00:00+01:00"), Ok(1736762400));
        assert!(parse_recurrence_id("next monday").is_err());
    }

    #[test]
    fn test_parse_response_status() {
        assert_eq!(parse_response_status("accepted"), Ok(ParticipationStatus::Accepted));
        assert_eq!(parse_response_status("TENTATIVE"), Ok(ParticipationStatus::Tentative));
        assert!(parse_response_status("NEEDS-ACTION").is_err());
        assert!(parse_response_status("DELEGATED").is_err());
        assert!(parse_response_status("MAYBE").is_err());
    }
}
