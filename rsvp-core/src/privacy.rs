//! Address rewriting for replies leaving the organization.
//!
//! Internal attendee addresses are moved to a public-facing domain and the
//! organizer is replaced by a relay identity, so an external recipient never
//! sees directory addresses or real internal display names.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{domain, local_part, normalize_address, strip_scheme};
use crate::event::{EventComponent, Organizer};

/// Internal-domain allowlist and relay settings.
///
/// An empty allowlist disables classification: no address is external and
/// [`PrivacyConfig::rewrite`] leaves components untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Domains considered internal, compared case-insensitively
    pub internal_domains: Vec<String>,
    /// Domain internal attendee addresses are moved to
    pub replacement_domain: Option<String>,
    /// Address that stands in for the organizer
    pub external_relay: Option<String>,
}

impl PrivacyConfig {
    /// Whether classification is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.internal_domains.is_empty()
    }

    /// True when `address` is outside the internal-domain allowlist.
    ///
    /// Without an allowlist, or for an address with no domain, nothing is
    /// external.
    pub fn is_external(&self, address: &str) -> bool {
        if !self.is_configured() {
            return false;
        }
        match domain(address) {
            Some(d) => !self
                .internal_domains
                .iter()
                .any(|internal| internal.trim().eq_ignore_ascii_case(&d)),
            None => false,
        }
    }

    /// The relay address, scheme stripped.
    pub fn relay_address(&self) -> Option<&str> {
        self.external_relay
            .as_deref()
            .map(strip_scheme)
            .filter(|a| !a.is_empty())
    }

    /// Rewrite a component copy bound for an external recipient.
    ///
    /// 1. Internal attendees move to the replacement domain and their CN
    ///    becomes the local part.
    /// 2. The organizer address becomes the relay address.
    /// 3. `friendly_name` (the acting account's display name) becomes the
    ///    organizer CN.
    ///
    /// Steps whose setting is missing are skipped. Returns false when
    /// classification is not configured and nothing was touched.
    pub fn rewrite(&self, component: &mut EventComponent, friendly_name: Option<&str>) -> bool {
        if !self.is_configured() {
            return false;
        }

        if let Some(replacement) = self.replacement_domain.as_deref().filter(|d| !d.is_empty()) {
            for attendee in component
                .attendees
                .iter_mut()
                .filter(|a| !self.is_external(&a.email))
            {
                let local = local_part(&attendee.email).to_string();
                attendee.email = format!("{local}@{replacement}");
                attendee.name = Some(local);
            }
        }

        if let Some(relay) = self.relay_address() {
            let organizer = component
                .organizer
                .get_or_insert_with(|| Organizer::new(relay));
            organizer.email = relay.to_string();
            organizer.name = None;
        }

        if let Some(name) = friendly_name.filter(|n| !n.is_empty()) {
            if let Some(organizer) = component.organizer.as_mut() {
                organizer.name = Some(name.to_string());
            }
        }

        debug!(
            uid = %component.uid,
            organizer = ?component.organizer.as_ref().map(|o| normalize_address(&o.email)),
            "rewrote addresses for external recipient"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attendee, EventTime};
    use chrono::{TimeZone, Utc};

    fn config() -> PrivacyConfig {
        PrivacyConfig {
            internal_domains: vec!["corp.example".to_string()],
            replacement_domain: Some("mail.example.net".to_string()),
            external_relay: Some("mailto:relay@mail.example.net".to_string()),
        }
    }

    fn event() -> EventComponent {
        let mut event = EventComponent::new(
            "E1",
            EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()),
        );
        let mut organizer = Organizer::new("alice@corp.example");
        organizer.name = Some("Alice Internal".to_string());
        event.organizer = Some(organizer);

        let mut carol = Attendee::new("Carol.Smith@Corp.Example");
        carol.name = Some("Carol Smith (Finance)".to_string());
        event.attendees.push(carol);
        let mut bob = Attendee::new("bob@ext.com");
        bob.name = Some("Bob".to_string());
        event.attendees.push(bob);
        event
    }

    #[test]
    fn test_is_external() {
        let config = config();
        assert!(config.is_external("bob@ext.com"));
        assert!(!config.is_external("mailto:alice@CORP.example"));
        assert!(!config.is_external("no-domain"));
    }

    #[test]
    fn test_unconfigured_never_external() {
        let config = PrivacyConfig::default();
        assert!(!config.is_external("bob@ext.com"));
    }

    #[test]
    fn test_rewrite_internal_attendees_and_organizer() {
        let mut event = event();

        assert!(config().rewrite(&mut event, Some("Alice")));

        let carol = &event.attendees[0];
        assert_eq!(carol.email, "Carol.Smith@mail.example.net");
        assert_eq!(carol.name.as_deref(), Some("Carol.Smith"));

        let bob = &event.attendees[1];
        assert_eq!(bob.email, "bob@ext.com", "external attendees keep their address");
        assert_eq!(bob.name.as_deref(), Some("Bob"));

        let organizer = event.organizer.as_ref().unwrap();
        assert_eq!(organizer.email, "relay@mail.example.net");
        assert_eq!(organizer.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_rewrite_without_friendly_name_drops_real_cn() {
        let mut event = event();
        config().rewrite(&mut event, None);

        let organizer = event.organizer.as_ref().unwrap();
        assert_eq!(organizer.email, "relay@mail.example.net");
        assert_eq!(organizer.name, None);
    }

    #[test]
    fn test_rewrite_is_noop_without_configuration() {
        let mut event = event();
        let before = event.clone();

        assert!(!PrivacyConfig::default().rewrite(&mut event, Some("Alice")));
        assert_eq!(event, before);
    }

    #[test]
    fn test_rewrite_skips_missing_settings() {
        let mut event = event();
        let config = PrivacyConfig {
            internal_domains: vec!["corp.example".to_string()],
            ..Default::default()
        };

        config.rewrite(&mut event, Some("Alice"));

        assert_eq!(event.attendees[0].email, "Carol.Smith@Corp.Example");
        let organizer = event.organizer.as_ref().unwrap();
        assert_eq!(organizer.email, "alice@corp.example");
        assert_eq!(organizer.name.as_deref(), Some("Alice"));
    }
}
