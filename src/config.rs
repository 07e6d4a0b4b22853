use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use rsvp_core::EngineConfig;
use rsvp_core::collaborators::{Account, User};
use serde::Deserialize;

static DEFAULT_STORE_DIR: &str = "~/.local/share/rsvp/calendars";
static DEFAULT_OUTBOX_DIR: &str = "~/.local/share/rsvp/outbox";
static DEFAULT_CALENDAR: &str = "default";

fn default_store_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_DIR)
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTBOX_DIR)
}

fn default_calendar() -> String {
    DEFAULT_CALENDAR.to_string()
}

/// Configuration at ~/.config/rsvp/config.toml, overridable with
/// `RSVP_*` environment variables (`RSVP_ENGINE__RECURRENCE_LIMIT=500`).
#[derive(Debug, Clone, Deserialize)]
pub struct RsvpConfig {
    /// Where events are stored, one directory per user and calendar
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Where outgoing replies are written as .eml files
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    /// Calendar used for link responses
    #[serde(default = "default_calendar")]
    pub default_calendar: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// A `[[users]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl UserEntry {
    pub fn to_user(&self) -> User {
        let mut user = User::new(&self.id, &self.email);
        user.name = self.name.clone();
        user.default_timezone = self.timezone.clone();
        if let Some(ref format) = self.date_format {
            user.date_format = format.clone();
        }
        if let Some(ref format) = self.time_format {
            user.time_format = format.clone();
        }
        user
    }

    /// Configured accounts, or one account for the user's own address.
    pub fn accounts(&self) -> Vec<Account> {
        if !self.accounts.is_empty() {
            return self.accounts.clone();
        }
        vec![Account {
            id: format!("{}-main", self.id),
            email: self.email.clone(),
            friendly_name: self.name.clone(),
        }]
    }
}

impl RsvpConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("rsvp");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, or the default location. A missing file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let config: RsvpConfig = Config::builder()
            .add_source(File::from(path.clone()).required(false))
            .add_source(
                Environment::with_prefix("RSVP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Could not read config {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Invalid config {}", path.display()))?;

        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        expand(&self.store_dir)
    }

    pub fn outbox_path(&self) -> PathBuf {
        expand(&self.outbox_dir)
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
