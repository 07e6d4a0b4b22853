//! User directory backed by the `[[users]]` tables of the config file.

use rsvp_core::RsvpResult;
use rsvp_core::address::same_address;
use rsvp_core::collaborators::{Account, Directory, User};

use crate::config::UserEntry;

pub struct ConfigDirectory {
    users: Vec<UserEntry>,
}

impl ConfigDirectory {
    pub fn new(users: Vec<UserEntry>) -> Self {
        ConfigDirectory { users }
    }
}

impl Directory for ConfigDirectory {
    fn resolve_user(&self, public_id: &str) -> RsvpResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| same_address(&u.email, public_id))
            .map(UserEntry::to_user))
    }

    fn list_accounts_for_user(&self, user_id: &str) -> RsvpResult<Vec<Account>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(UserEntry::accounts)
            .unwrap_or_default())
    }
}
