//! Event storage on disk: `<root>/<user>/<calendar>/<event>.ics`.
//!
//! Every path segment is slugified, so ids are free-form.

use std::path::{Path, PathBuf};

use rsvp_core::collaborators::{EventStorage, User};
use rsvp_core::ics::{generate_ics, parse_calendar};
use rsvp_core::recurrence::exclude_occurrence;
use rsvp_core::{CalendarDocument, RsvpResult};
use slug::slugify;
use tracing::debug;

pub struct FileEventStorage {
    root: PathBuf,
    default_calendar: String,
    recurrence_limit: u16,
}

impl FileEventStorage {
    pub fn new(root: impl Into<PathBuf>, default_calendar: &str, recurrence_limit: u16) -> Self {
        FileEventStorage {
            root: root.into(),
            default_calendar: default_calendar.to_string(),
            recurrence_limit,
        }
    }

    pub fn calendar_path(&self, user: &User, calendar_id: &str) -> PathBuf {
        self.root
            .join(slugify(&user.public_id))
            .join(slugify(calendar_id))
    }

    pub fn event_path(&self, user: &User, calendar_id: &str, event_id: &str) -> PathBuf {
        self.calendar_path(user, calendar_id)
            .join(format!("{}.ics", slugify(event_id)))
    }

    /// Store raw calendar data, creating directories as needed.
    pub fn save(&self, user: &User, calendar_id: &str, event_id: &str, data: &str) -> RsvpResult<()> {
        let path = self.event_path(user, calendar_id, event_id);
        write_file(&path, data)
    }

    pub fn load_raw(&self, user: &User, calendar_id: &str, event_id: &str) -> RsvpResult<Option<String>> {
        let path = self.event_path(user, calendar_id, event_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }
}

fn write_file(path: &Path, data: &str) -> RsvpResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, data)?;
    debug!(path = %path.display(), "wrote event");
    Ok(())
}

impl EventStorage for FileEventStorage {
    fn get_event(
        &self,
        user: &User,
        calendar_id: &str,
        event_id: &str,
    ) -> RsvpResult<Option<CalendarDocument>> {
        self.load_raw(user, calendar_id, event_id)?
            .map(|content| parse_calendar(&content))
            .transpose()
    }

    fn update_event_raw(
        &self,
        user: &User,
        calendar_id: &str,
        event_id: &str,
        data: &str,
    ) -> RsvpResult<()> {
        self.save(user, calendar_id, event_id, data)
    }

    fn delete_event(&self, user: &User, calendar_id: &str, event_id: &str) -> RsvpResult<bool> {
        let path = self.event_path(user, calendar_id, event_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        debug!(path = %path.display(), "deleted event");
        Ok(true)
    }

    fn mark_occurrence_excluded(
        &self,
        user: &User,
        calendar_id: &str,
        event_id: &str,
        recurrence_id: i64,
    ) -> RsvpResult<bool> {
        let Some(mut doc) = self.get_event(user, calendar_id, event_id)? else {
            return Ok(false);
        };
        let Some(uid) = doc.series_uid(Some(event_id)) else {
            return Ok(false);
        };

        let excluded =
            exclude_occurrence(&mut doc, &uid, recurrence_id, user.tz(), self.recurrence_limit)?;
        if excluded {
            self.save(user, calendar_id, event_id, &generate_ics(&doc)?)?;
        }
        Ok(excluded)
    }

    fn default_calendar(&self, _user: &User) -> RsvpResult<Option<String>> {
        Ok(Some(self.default_calendar.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEKLY: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:weekly-1\r\n\
DTSTAMP:20250101T000000Z\r\n\
DTSTART:20250106T100000Z\r\n\
DTEND:20250106T110000Z\r\n\
SUMMARY:Standup\r\n\
RRULE:FREQ=WEEKLY;COUNT=10\r\n\
ORGANIZER:mailto:alice@corp.example\r\n\
ATTENDEE;PARTSTAT=ACCEPTED:mailto:bob@corp.example\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn storage(dir: &Path) -> FileEventStorage {
        FileEventStorage::new(dir, "personal", 100)
    }

    #[test]
    fn test_paths_are_slugified() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(dir.path());
        let user = User::new("u-bob", "bob@corp.example");

        let path = store.event_path(&user, "Work Calendar", "E1@host");
        assert!(path.starts_with(dir.path()));
        assert!(path.ends_with("bob-corp-example/work-calendar/e1-host.ics"));
    }

    #[test]
    fn test_update_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(dir.path());
        let user = User::new("u-bob", "bob@corp.example");

        assert!(store.get_event(&user, "personal", "weekly-1").unwrap().is_none());

        store.update_event_raw(&user, "personal", "weekly-1", WEEKLY).unwrap();
        let doc = store.get_event(&user, "personal", "weekly-1").unwrap().unwrap();
        assert_eq!(doc.components.len(), 1);
        assert_eq!(doc.components[0].uid, "weekly-1");

        assert!(store.delete_event(&user, "personal", "weekly-1").unwrap());
        assert!(!store.delete_event(&user, "personal", "weekly-1").unwrap());
    }

    #[test]
    fn test_mark_occurrence_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(dir.path());
        let user = User::new("u-bob", "bob@corp.example");
        store.save(&user, "personal", "weekly-1", WEEKLY).unwrap();

        // 2025-01-13T10:00:00Z, the second occurrence
        let second = 1736762400;
        assert!(store
            .mark_occurrence_excluded(&user, "personal", "weekly-1", second)
            .unwrap());

        let doc = store.get_event(&user, "personal", "weekly-1").unwrap().unwrap();
        let recurrence = doc.components[0].recurrence.as_ref().unwrap();
        assert_eq!(recurrence.exdates.len(), 1);

        // Not an occurrence start
        assert!(!store
            .mark_occurrence_excluded(&user, "personal", "weekly-1", second + 60)
            .unwrap());
        assert!(!store
            .mark_occurrence_excluded(&user, "personal", "missing", second)
            .unwrap());
    }

    #[test]
    fn test_default_calendar() {
        let dir = tempfile::tempdir().unwrap();
        let user = User::new("u-bob", "bob@corp.example");
        assert_eq!(
            storage(dir.path()).default_calendar(&user).unwrap().as_deref(),
            Some("personal")
        );
    }
}
