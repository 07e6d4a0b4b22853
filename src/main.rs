mod commands;
mod config;
mod directory;
mod outbox;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rsvp_core::{InviteLink, ParticipationStatus};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::respond::{RespondArgs, Scope};
use crate::commands::{Host, parse_recurrence_id, parse_response_status};
use crate::config::RsvpConfig;

#[derive(Parser)]
#[command(name = "rsvp")]
#[command(about = "Respond to calendar invitations and reply to their organizers")]
struct Cli {
    /// Config file (defaults to ~/.config/rsvp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Respond to an invitation read from an .ics file
    Respond {
        /// Invitation file, or "-" for stdin
        file: PathBuf,

        /// Responding address
        #[arg(short, long)]
        attendee: String,

        /// ACCEPTED, DECLINED or TENTATIVE
        #[arg(short, long, value_parser = parse_response_status)]
        status: ParticipationStatus,

        /// Act as this user (defaults to the attendee)
        #[arg(short, long)]
        user: Option<String>,

        /// Calendar to store the result in; nothing is stored without one
        #[arg(short, long)]
        calendar: Option<String>,

        /// Stored event id, also picks the series when the file has several
        #[arg(long)]
        event_id: Option<String>,

        #[arg(long, value_enum, default_value_t = Scope::ThisAndFuture)]
        scope: Scope,

        /// Occurrence start, as epoch seconds or RFC 3339
        #[arg(short, long, value_parser = parse_recurrence_id)]
        recurrence_id: Option<i64>,

        /// The attendee has no local account
        #[arg(long)]
        external: bool,
    },
    /// Respond to an event already stored in a user's calendar
    Update {
        /// User whose calendar holds the event
        user: String,
        calendar: String,
        event_id: String,

        #[arg(short, long, value_parser = parse_response_status)]
        status: ParticipationStatus,

        /// Responding address (defaults to the user)
        #[arg(short, long)]
        attendee: Option<String>,
    },
    /// Apply a REPLY or CANCEL received by an organizer to their stored copy
    Inbound {
        /// Organizer whose calendar holds the event
        user: String,
        calendar: String,

        /// Received message, or "-" for stdin
        file: PathBuf,

        /// Stored event id (defaults to the message's UID)
        #[arg(long)]
        event_id: Option<String>,
    },
    /// Act on an invitation response link
    Link {
        /// Organizer whose calendar holds the event
        #[arg(long)]
        organizer: String,

        #[arg(long)]
        attendee: String,

        #[arg(long)]
        calendar: String,

        #[arg(long)]
        event_id: String,

        #[arg(short, long, value_parser = parse_response_status)]
        status: ParticipationStatus,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RsvpConfig::load(cli.config.as_deref())?;
    if config.users.is_empty() {
        anyhow::bail!(
            "No users configured.\n\
            Add a [[users]] table to {}",
            cli.config
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "~/.config/rsvp/config.toml".to_string())
        );
    }
    let host = Host::new(config);

    match cli.command {
        Commands::Respond {
            file,
            attendee,
            status,
            user,
            calendar,
            event_id,
            scope,
            recurrence_id,
            external,
        } => commands::respond::run(
            &host,
            RespondArgs {
                file: &file,
                attendee: &attendee,
                status,
                user: user.as_deref(),
                calendar: calendar.as_deref(),
                event_id: event_id.as_deref(),
                scope,
                recurrence_id,
                external,
            },
        ),
        Commands::Update {
            user,
            calendar,
            event_id,
            status,
            attendee,
        } => commands::update::run(
            &host,
            &user,
            &calendar,
            &event_id,
            attendee.as_deref(),
            status,
        ),
        Commands::Inbound {
            user,
            calendar,
            file,
            event_id,
        } => commands::inbound::run(&host, &user, &calendar, &file, event_id.as_deref()),
        Commands::Link {
            organizer,
            attendee,
            calendar,
            event_id,
            status,
        } => commands::link::run(
            &host,
            InviteLink {
                organizer,
                attendee,
                calendar_id: calendar,
                event_id,
                status,
            },
        ),
    }
}
