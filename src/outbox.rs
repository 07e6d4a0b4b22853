//! Mail transport that writes each reply as an .eml file into a directory,
//! to be picked up by a real mail submission agent.

use std::path::PathBuf;

use mail_builder::MessageBuilder;
use mail_builder::headers::HeaderType;
use mail_builder::headers::address::Address;
use mail_builder::headers::content_type::ContentType;
use mail_builder::mime::{BodyPart, MimePart};
use rsvp_core::SendError;
use rsvp_core::address::same_address;
use rsvp_core::collaborators::{MailSender, OutboundMessage};
use tracing::info;
use uuid::Uuid;

pub struct OutboxMailSender {
    dir: PathBuf,
}

impl OutboxMailSender {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        OutboxMailSender { dir: dir.into() }
    }
}

/// Render `message` as a MIME message: the optional html alternative and
/// the text/calendar part.
pub fn render(message: &OutboundMessage) -> Result<Vec<u8>, SendError> {
    if !message.to.contains('@') {
        return Err(SendError::InvalidRecipients(message.to.clone()));
    }

    let method = message.method.as_ref().map(|m| m.as_ics_str());

    let mut parts = Vec::with_capacity(2);
    if let Some(ref html) = message.html {
        parts.push(MimePart::new(
            ContentType::new("text/html").attribute("charset", "utf-8"),
            BodyPart::Text(html.as_str().into()),
        ));
    }
    let mut calendar_type = ContentType::new("text/calendar");
    if let Some(method) = method {
        calendar_type = calendar_type.attribute("method", method);
    }
    parts.push(MimePart::new(
        calendar_type.attribute("charset", "utf-8"),
        BodyPart::Text(message.calendar.as_str().into()),
    ));

    let mut builder = MessageBuilder::new()
        .from(Address::new_address(
            message.from.name.as_deref(),
            message.from.email.as_str(),
        ))
        .to(message.to.as_str())
        .subject(message.subject.as_str());

    // Relay sending: the account the message is sent through is the Sender
    let sender = message.send_as.as_ref().unwrap_or(&message.account);
    if !same_address(&sender.email, &message.from.email) {
        builder = builder.sender(Address::new_address(
            sender.friendly_name.as_deref(),
            sender.email.as_str(),
        ));
    }
    if let Some(method) = method {
        builder = builder.header("Method", HeaderType::Text(method.into()));
    }

    builder
        .body(MimePart::new(
            ContentType::new("multipart/alternative"),
            BodyPart::Multipart(parts),
        ))
        .write_to_vec()
        .map_err(|e| SendError::Transport(e.to_string()))
}

impl MailSender for OutboxMailSender {
    fn send(&self, message: &OutboundMessage) -> Result<bool, SendError> {
        let bytes = render(message)?;

        std::fs::create_dir_all(&self.dir).map_err(|e| SendError::Transport(e.to_string()))?;
        let path = self.dir.join(format!("{}.eml", Uuid::new_v4()));
        std::fs::write(&path, bytes).map_err(|e| SendError::Transport(e.to_string()))?;

        info!(path = %path.display(), to = %message.to, account = %message.account.id, "queued reply");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_core::Method;
    use rsvp_core::collaborators::{Account, Mailbox};

    fn message() -> OutboundMessage {
        OutboundMessage {
            account: Account {
                id: "bob-main".to_string(),
                email: "bob@corp.example".to_string(),
                friendly_name: Some("Bob Baker".to_string()),
            },
            send_as: None,
            from: Mailbox {
                email: "bob@corp.example".to_string(),
                name: Some("Bob Baker".to_string()),
            },
            to: "alice@corp.example".to_string(),
            subject: "Accepted: Planning".to_string(),
            calendar: "BEGIN:VCALENDAR\r\nMETHOD:REPLY\r\nEND:VCALENDAR\r\n".to_string(),
            method: Some(Method::Reply),
            html: Some("<p>Accepted</p>".to_string()),
        }
    }

    #[test]
    fn test_send_writes_eml() {
        let dir = tempfile::tempdir().unwrap();
        let sender = OutboxMailSender::new(dir.path().join("outbox"));

        assert_eq!(sender.send(&message()), Ok(true));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("outbox"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].extension().is_some_and(|e| e == "eml"));

        let content = std::fs::read_to_string(&entries[0]).unwrap();
        assert!(content.contains("Subject: Accepted: Planning"));
        assert!(content.contains("text/calendar"));
        assert!(content.contains("text/html"));
        assert!(content.contains("METHOD:REPLY"));
        assert!(!content.contains("text/plain"));
        assert!(!content.contains("Sender:"));
    }

    #[test]
    fn test_without_html_only_calendar_part() {
        let mut message = message();
        message.html = None;

        let content = String::from_utf8(render(&message).unwrap()).unwrap();

        assert!(content.contains("text/calendar"));
        assert!(content.contains("method="));
        assert!(!content.contains("text/html"));
        assert!(!content.contains("text/plain"));
    }

    #[test]
    fn test_relay_sets_sender() {
        let mut message = message();
        message.from.email = "relay@mail.example.net".to_string();
        message.send_as = Some(Account {
            id: "relay-main".to_string(),
            email: "relay@mail.example.net".to_string(),
            friendly_name: None,
        });
        let content = String::from_utf8(render(&message).unwrap()).unwrap();
        assert!(!content.contains("Sender:"));

        message.send_as = None;
        let content = String::from_utf8(render(&message).unwrap()).unwrap();
        assert!(content.contains("Sender:"));
    }

    #[test]
    fn test_invalid_recipient() {
        let mut message = message();
        message.to = "nobody".to_string();

        let dir = tempfile::tempdir().unwrap();
        let sender = OutboxMailSender::new(dir.path());
        assert_eq!(
            sender.send(&message),
            Err(SendError::InvalidRecipients("nobody".to_string()))
        );
    }
}
