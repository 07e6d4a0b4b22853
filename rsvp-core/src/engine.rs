//! The response pipeline.
//!
//! Every entry point ends in [`ReplyEngine::appointment_action`]:
//! identity → parse → target component → reconcile → storage → reply.
//! Storage effects are applied before the reply is assembled and are not
//! undone when sending fails.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::address::{same_address, strip_scheme};
use crate::assemble::{
    OutboundReply, assemble, html_alternative, reply_component, resolve_recipient,
    transition_method,
};
use crate::collaborators::{
    Account, Directory, EventStorage, MailSender, Mailbox, OutboundMessage, User, primary_account,
};
use crate::config::EngineConfig;
use crate::document::{CalendarDocument, Method};
use crate::error::{RsvpError, RsvpResult, SendError};
use crate::event::ParticipationStatus;
use crate::ics::{generate_ics, parse_calendar};
use crate::policy::{ResponseScope, StorageAction, decide};
use crate::reconcile::{apply_reply, reconcile, status_unchanged};
use crate::recurrence::resolve_occurrence;

/// One attendee response to act on.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRequest {
    /// Public id of the acting user; `None` acts as the attendee's own account
    pub user_id: Option<String>,
    /// Responding address
    pub attendee: String,
    pub status: ParticipationStatus,
    pub calendar_id: Option<String>,
    /// Stored event id, also used to pick the series in multi-UID payloads
    pub event_id: Option<String>,
    pub scope: ResponseScope,
    /// Occurrence start (epoch seconds) for [`ResponseScope::ThisOnly`]
    pub recurrence_id: Option<i64>,
    /// Triggered by an invitation link
    pub from_link: bool,
    /// The attendee has no local account; nothing is stored
    pub attendee_external: bool,
}

impl ReconciliationRequest {
    pub fn new(attendee: impl Into<String>, status: ParticipationStatus) -> Self {
        ReconciliationRequest {
            user_id: None,
            attendee: attendee.into(),
            status,
            calendar_id: None,
            event_id: None,
            scope: ResponseScope::default(),
            recurrence_id: None,
            from_link: false,
            attendee_external: false,
        }
    }
}

/// The values carried by an invitation response link.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteLink {
    /// Organizer's public id
    pub organizer: String,
    pub attendee: String,
    /// Organizer's calendar holding the event
    pub calendar_id: String,
    pub event_id: String,
    pub status: ParticipationStatus,
}

/// What an action did.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub uid: String,
    /// False when the responder was appended as a new attendee
    pub found_existing: bool,
    pub storage: StorageAction,
    /// The reply that was sent, if any
    pub reply: Option<OutboundReply>,
}

impl ActionOutcome {
    fn skipped(uid: String) -> Self {
        ActionOutcome {
            uid,
            found_existing: false,
            storage: StorageAction::None,
            reply: None,
        }
    }
}

/// What [`ReplyEngine::process_inbound`] did with a received message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    /// A REPLY was merged into the stored copy
    Updated {
        uid: String,
        /// Attendees whose status was taken from the reply
        attendees: Vec<String>,
    },
    /// A CANCEL removed the stored copy
    Deleted { uid: String, existed: bool },
    /// Any other method; nothing was touched
    Ignored(Option<Method>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// The stored status already matched; nothing was done
    Unchanged,
    Applied(ActionOutcome),
}

pub struct ReplyEngine<'a> {
    config: EngineConfig,
    storage: &'a dyn EventStorage,
    directory: &'a dyn Directory,
    mailer: &'a dyn MailSender,
}

impl<'a> ReplyEngine<'a> {
    pub fn new(
        config: EngineConfig,
        storage: &'a dyn EventStorage,
        directory: &'a dyn Directory,
        mailer: &'a dyn MailSender,
    ) -> Self {
        ReplyEngine {
            config,
            storage,
            directory,
            mailer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply `request` to the calendar payload `data` and reply to the
    /// organizer.
    ///
    /// An occurrence that cannot be resolved is a no-op: the outcome carries
    /// [`StorageAction::None`] and no reply. Any error is logged with `data`
    /// attached before it is returned.
    pub fn appointment_action(
        &self,
        request: &ReconciliationRequest,
        data: &str,
    ) -> RsvpResult<ActionOutcome> {
        let result = self.run(request, data);
        if let Err(ref err) = result {
            error!(
                error = %err,
                attendee = %request.attendee,
                status = %request.status,
                document = data,
                "appointment action failed"
            );
        }
        result
    }

    /// Respond to a stored event as if its organizer had sent the invitation
    /// again.
    pub fn update_appointment(
        &self,
        user_id: &str,
        calendar_id: &str,
        event_id: &str,
        attendee: &str,
        status: ParticipationStatus,
    ) -> RsvpResult<ActionOutcome> {
        let user = self.resolve_user(user_id)?;
        let mut doc = self
            .storage
            .get_event(&user, calendar_id, event_id)?
            .ok_or_else(|| RsvpError::EventNotFound(event_id.to_string()))?;
        doc.method = Some(Method::Request);
        let data = generate_ics(&doc)?;

        let mut request = ReconciliationRequest::new(attendee, status);
        request.user_id = Some(user.public_id);
        request.calendar_id = Some(calendar_id.to_string());
        request.event_id = Some(event_id.to_string());
        self.appointment_action(&request, &data)
    }

    /// Handle a click on an invitation response link.
    ///
    /// Skips everything when the organizer's stored copy already has the
    /// requested status, so repeated clicks send one reply. An attendee with
    /// a local account responds as themselves into their default calendar.
    /// Anyone else responds through the organizer's account, and once the
    /// reply is sent their status is recorded in the organizer's copy.
    pub fn respond_from_link(&self, link: &InviteLink) -> RsvpResult<LinkOutcome> {
        let organizer = self.resolve_user(&link.organizer)?;
        let mut doc = self
            .storage
            .get_event(&organizer, &link.calendar_id, &link.event_id)?
            .ok_or_else(|| RsvpError::EventNotFound(link.event_id.clone()))?;

        let uid = doc
            .series_uid(Some(link.event_id.as_str()))
            .ok_or_else(|| RsvpError::EventNotFound(link.event_id.clone()))?;
        let primary = doc
            .primary_index(&uid)
            .ok_or_else(|| RsvpError::EventNotFound(uid.clone()))?;

        if status_unchanged(&doc.components[primary], &link.attendee, link.status) {
            info!(uid = %uid, attendee = %link.attendee, status = %link.status, "status unchanged, skipping");
            return Ok(LinkOutcome::Unchanged);
        }

        doc.method = Some(Method::Request);
        let data = generate_ics(&doc)?;

        let mut request = ReconciliationRequest::new(link.attendee.clone(), link.status);
        request.event_id = Some(link.event_id.clone());
        request.from_link = true;

        match self.directory.resolve_user(strip_scheme(&link.attendee))? {
            Some(attendee) => {
                request.user_id = Some(attendee.public_id);
            }
            None => {
                request.user_id = Some(organizer.public_id.clone());
                request.calendar_id = Some(link.calendar_id.clone());
                request.attendee_external = true;
            }
        }

        let mut outcome = self.appointment_action(&request, &data)?;

        if request.attendee_external && outcome.reply.is_some() {
            reconcile(&mut doc.components[primary], &link.attendee, link.status, None, Utc::now());
            doc.method = None;
            self.storage.update_event_raw(
                &organizer,
                &link.calendar_id,
                &link.event_id,
                &generate_ics(&doc)?,
            )?;
            info!(uid = %uid, attendee = %link.attendee, status = %link.status, "recorded response in organizer's copy");
            outcome.storage = StorageAction::UpdateEvent;
        }

        Ok(LinkOutcome::Applied(outcome))
    }

    /// Apply an iTIP message received by the organizer `user_id` to the copy
    /// of its event stored in `calendar_id`.
    ///
    /// A REPLY merges the responders' statuses (see [`apply_reply`]) and
    /// rewrites the stored copy without METHOD. A CANCEL deletes it. Other
    /// methods are ignored.
    pub fn process_inbound(
        &self,
        user_id: &str,
        calendar_id: &str,
        event_id: Option<&str>,
        data: &str,
    ) -> RsvpResult<InboundOutcome> {
        let user = self.resolve_user(user_id)?;
        let tz = user.tz();
        let inbound = parse_calendar(data)?;
        let uid = inbound
            .series_uid(event_id)
            .ok_or_else(|| RsvpError::IcsParse("calendar has no events".to_string()))?;
        let event_id = event_id.unwrap_or(uid.as_str());

        match inbound.method {
            Some(Method::Reply) => {}
            Some(Method::Cancel) => {
                let existed = self.storage.delete_event(&user, calendar_id, event_id)?;
                info!(uid = %uid, calendar_id, existed, "cancelled event removed");
                return Ok(InboundOutcome::Deleted { uid, existed });
            }
            other => {
                debug!(uid = %uid, method = ?other, "inbound method ignored");
                return Ok(InboundOutcome::Ignored(other));
            }
        }

        let mut stored = self
            .storage
            .get_event(&user, calendar_id, event_id)?
            .ok_or_else(|| RsvpError::EventNotFound(event_id.to_string()))?;
        let now = Utc::now();

        let mut attendees = Vec::new();
        for reply in inbound.components.iter().filter(|c| c.uid == uid) {
            let target = match reply.recurrence_timestamp(tz) {
                Some(recurrence_id) => {
                    match resolve_occurrence(&mut stored, &uid, recurrence_id, tz, self.config.recurrence_limit) {
                        Ok(resolution) => resolution.index(),
                        Err(err @ RsvpError::OccurrenceNotResolvable { .. }) => {
                            warn!(error = %err, "reply for an unknown occurrence skipped");
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
                None => stored
                    .primary_index(&uid)
                    .ok_or_else(|| RsvpError::EventNotFound(uid.clone()))?,
            };
            attendees.extend(apply_reply(&mut stored.components[target], reply, now));
            stored.components[target].last_modified = Some(now);
        }

        stored.method = None;
        self.storage
            .update_event_raw(&user, calendar_id, event_id, &generate_ics(&stored)?)?;
        info!(uid = %uid, calendar_id, ?attendees, "reply merged into stored event");

        Ok(InboundOutcome::Updated { uid, attendees })
    }

    fn run(&self, request: &ReconciliationRequest, data: &str) -> RsvpResult<ActionOutcome> {
        let user = self.resolve_user(
            request
                .user_id
                .as_deref()
                .unwrap_or_else(|| strip_scheme(&request.attendee)),
        )?;
        let tz = user.tz();

        let mut doc = parse_calendar(data)?;
        let uid = doc
            .series_uid(request.event_id.as_deref())
            .ok_or_else(|| RsvpError::IcsParse("calendar has no events".to_string()))?;
        let event_id = request.event_id.clone().unwrap_or_else(|| uid.clone());

        let occurrence = match (request.scope, request.recurrence_id) {
            (ResponseScope::ThisOnly, Some(recurrence_id))
                if targets_occurrence(&doc, &uid, recurrence_id, tz) =>
            {
                match resolve_occurrence(&mut doc, &uid, recurrence_id, tz, self.config.recurrence_limit) {
                    Ok(resolution) => Some((recurrence_id, resolution.index())),
                    Err(err @ RsvpError::OccurrenceNotResolvable { .. }) => {
                        warn!(error = %err, "occurrence not resolvable, nothing to do");
                        return Ok(ActionOutcome::skipped(uid));
                    }
                    Err(err) => return Err(err),
                }
            }
            _ => None,
        };
        let target = match occurrence {
            Some((_, index)) => index,
            None => doc
                .primary_index(&uid)
                .ok_or_else(|| RsvpError::EventNotFound(uid.clone()))?,
        };

        // Unlisted responders get a name only when they are the acting user
        let display_name = same_address(&request.attendee, &user.public_id)
            .then(|| user.display_name().to_string());
        let reconciliation = reconcile(
            &mut doc.components[target],
            &request.attendee,
            request.status,
            display_name.as_deref(),
            Utc::now(),
        );

        let method = transition_method(doc.method.as_ref());

        let storage = match self.storage_calendar(request, &user)? {
            Some(calendar_id) if !request.attendee_external => {
                let action = decide(
                    request.scope,
                    request.status,
                    method.as_ref(),
                    occurrence.map(|(recurrence_id, _)| recurrence_id),
                );
                self.apply_storage(action, &user, &calendar_id, &event_id, &doc, &uid, target)?;
                action
            }
            _ => {
                debug!(uid = %uid, external = request.attendee_external, "storage skipped");
                StorageAction::None
            }
        };

        let reply = self.send_reply(request, &user, &doc, target)?;

        Ok(ActionOutcome {
            uid,
            found_existing: reconciliation.found_existing,
            storage,
            reply: Some(reply),
        })
    }

    fn resolve_user(&self, public_id: &str) -> RsvpResult<User> {
        self.directory
            .resolve_user(public_id)?
            .ok_or_else(|| RsvpError::UserNotFound(public_id.to_string()))
    }

    /// Explicit calendar id, or the user's default for link responses.
    fn storage_calendar(
        &self,
        request: &ReconciliationRequest,
        user: &User,
    ) -> RsvpResult<Option<String>> {
        match request.calendar_id {
            Some(ref id) => Ok(Some(id.clone())),
            None if request.from_link => self.storage.default_calendar(user),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_storage(
        &self,
        action: StorageAction,
        user: &User,
        calendar_id: &str,
        event_id: &str,
        doc: &CalendarDocument,
        uid: &str,
        target: usize,
    ) -> RsvpResult<()> {
        match action {
            StorageAction::None => {}
            StorageAction::DeleteEvent => {
                if !self.storage.delete_event(user, calendar_id, event_id)? {
                    warn!(calendar_id, event_id, "event to delete was not stored");
                }
            }
            StorageAction::ExcludeOccurrence(recurrence_id) => {
                if !self
                    .storage
                    .mark_occurrence_excluded(user, calendar_id, event_id, recurrence_id)?
                {
                    warn!(calendar_id, event_id, recurrence_id, "occurrence to exclude was not stored");
                }
            }
            StorageAction::UpdateEvent => {
                let stored = self.storage.get_event(user, calendar_id, event_id)?;
                let persisted = persisted_variant(doc, uid, target, stored.as_ref());
                let data = generate_ics(&persisted)?;
                self.storage
                    .update_event_raw(user, calendar_id, event_id, &data)?;
            }
        }
        debug!(calendar_id, event_id, ?action, "applied storage action");
        Ok(())
    }

    fn send_reply(
        &self,
        request: &ReconciliationRequest,
        user: &User,
        doc: &CalendarDocument,
        target: usize,
    ) -> RsvpResult<OutboundReply> {
        let to = resolve_recipient(&doc.components[target])?;
        let mut component = reply_component(&doc.components[target], &request.attendee);

        let accounts = self.directory.list_accounts_for_user(&user.id)?;
        let account = sending_account(user, &accounts, &request.attendee)?.clone();

        let external = self.config.privacy.is_external(&to);
        if external {
            self.config
                .privacy
                .rewrite(&mut component, account.friendly_name.as_deref());
        }

        let mut reply = assemble(
            component,
            to,
            doc.method.as_ref(),
            request.status,
            &self.config.subjects,
        );
        reply.document.timezones = doc.timezones.clone();

        // The organizer's account name does not belong to an external responder
        let from_name = (!request.attendee_external)
            .then(|| account.friendly_name.clone())
            .flatten();
        let mut message = OutboundMessage {
            from: Mailbox {
                email: strip_scheme(&request.attendee).to_string(),
                name: from_name,
            },
            account,
            send_as: None,
            to: reply.to.clone(),
            subject: reply.subject.clone(),
            calendar: reply.payload()?,
            method: reply.method.clone(),
            html: Some(html_alternative(&reply, user)),
        };

        if let Some(relay) = self.config.privacy.relay_address().filter(|_| external) {
            message.from.email = relay.to_string();
            message.send_as = self.relay_account(relay)?;
        }

        match self.mailer.send(&message) {
            Ok(true) => {
                info!(to = %message.to, subject = %message.subject, "reply sent");
                Ok(reply)
            }
            Ok(false) => Err(SendError::Rejected.into()),
            Err(err) => Err(err.into()),
        }
    }

    /// The relay user's account for the relay address, when the directory
    /// knows one.
    fn relay_account(&self, relay: &str) -> RsvpResult<Option<Account>> {
        let Some(relay_user) = self.directory.resolve_user(relay)? else {
            return Ok(None);
        };
        Ok(self
            .directory
            .list_accounts_for_user(&relay_user.id)?
            .into_iter()
            .find(|a| same_address(&a.email, relay)))
    }
}

/// ThisOnly responses only resolve an occurrence of a series that has one.
fn targets_occurrence(doc: &CalendarDocument, uid: &str, recurrence_id: i64, tz: chrono_tz::Tz) -> bool {
    doc.exception_index(uid, recurrence_id, tz).is_some()
        || doc.master(uid).is_some_and(|m| m.is_recurring())
}

/// Account a reply goes out through: the user's account for the responding
/// address when someone else responds, else the user's primary account.
fn sending_account<'b>(user: &User, accounts: &'b [Account], attendee: &str) -> RsvpResult<&'b Account> {
    let delegated = (!same_address(&user.public_id, attendee))
        .then(|| accounts.iter().find(|a| same_address(&a.email, attendee)))
        .flatten();

    delegated
        .or_else(|| primary_account(user, accounts))
        .ok_or_else(|| RsvpError::Directory(format!("no mail account for {}", user.public_id)))
}

/// The copy written to storage: no METHOD, and the target carries the
/// alarms of the previously stored event.
fn persisted_variant(
    doc: &CalendarDocument,
    uid: &str,
    target: usize,
    stored: Option<&CalendarDocument>,
) -> CalendarDocument {
    let mut persisted = doc.clone();
    persisted.method = None;

    let stored_primary = stored.and_then(|s| {
        s.primary_index(uid)
            .map(|i| &s.components[i])
            .or_else(|| s.components.first())
    });
    if let Some(previous) = stored_primary {
        persisted.components[target].alarms = previous.alarms.clone();
    }
    persisted
}
