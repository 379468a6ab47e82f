// crates/core/src/session.rs
//! Ticket detail session: loads one ticket, joins the live channel, and
//! reconciles server responses with pushed events.
//!
//! The session exclusively owns its working copy of ticket, comments and
//! attachments. Every mutation is either the initial load, an optimistic
//! append after a confirmed server response, or a deduplicated live event.
//! The id-based dedup makes "response first, echoed event second" and
//! "event first, response second" equivalent in outcome, so no ordering is
//! enforced between the two.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ticketflow_api::TicketsClient;
use ticketflow_live::{LiveChannel, TicketEvent};
use ticketflow_types::{
    Attachment, ClientDecision, EmployeeOption, Role, TicketDetails, UpdateDetailsRequest,
};

use crate::workflow::{self, TicketAction};

/// Client-side upload cap, checked before any network call.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Who is looking at the ticket.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub user_id: i64,
    pub role: Role,
}

/// Observable snapshot of a detail session.
///
/// Per-action in-flight flags and error/success messages mirror the
/// affordances of the detail view; deletes are tracked per attachment id so
/// several can run independently.
#[derive(Debug, Clone, Default)]
pub struct TicketSessionState {
    pub ticket: Option<TicketDetails>,
    pub loading: bool,
    /// Fatal load failure: the session shows this and nothing else works.
    pub error: Option<String>,

    pub attachments: Vec<Attachment>,
    pub attachments_loading: bool,
    pub attachments_error: Option<String>,

    pub adding_comment: bool,
    pub comment_error: Option<String>,

    pub action_loading: bool,
    pub action_error: Option<String>,
    pub action_success: Option<String>,

    pub saving_details: bool,
    pub details_error: Option<String>,
    pub details_success: Option<String>,

    pub uploading: bool,
    pub upload_error: Option<String>,
    pub upload_success: Option<String>,

    pub deleting: HashMap<i64, bool>,
    pub delete_error: Option<String>,
    pub delete_success: Option<String>,
}

/// One open ticket detail view.
pub struct TicketSession {
    client: Arc<TicketsClient>,
    live: LiveChannel,
    viewer: Viewer,
    ticket_id: i64,
    state: Arc<watch::Sender<TicketSessionState>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl TicketSession {
    /// Load the ticket and its attachments concurrently, then join the live
    /// channel and start reconciling events.
    ///
    /// A failed detail fetch is fatal: the session carries the error and no
    /// channel join or event pump is started. A failed attachment fetch
    /// only degrades that sub-area.
    pub async fn open(
        client: Arc<TicketsClient>,
        live: LiveChannel,
        viewer: Viewer,
        ticket_id: i64,
    ) -> Self {
        let (state, _) = watch::channel(TicketSessionState {
            loading: true,
            attachments_loading: true,
            ..TicketSessionState::default()
        });
        let session = Self {
            client,
            live,
            viewer,
            ticket_id,
            state: Arc::new(state),
            pump: Mutex::new(None),
        };

        let (details, attachments) = tokio::join!(
            session.client.ticket_details(ticket_id),
            session.client.attachments(ticket_id),
        );

        let ticket = match details {
            Ok(ticket) => ticket,
            Err(err) => {
                let message = err.user_message("Failed to load ticket details.");
                warn!(ticket_id, "ticket load failed: {message}");
                session.state.send_modify(|s| {
                    s.loading = false;
                    s.attachments_loading = false;
                    s.error = Some(message);
                });
                return session;
            }
        };
        session.state.send_modify(|s| {
            s.loading = false;
            s.ticket = Some(ticket);
        });

        match attachments {
            Ok(mut list) => {
                list.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
                session.state.send_modify(|s| {
                    s.attachments_loading = false;
                    s.attachments = list;
                });
            }
            Err(err) => {
                let message = err.user_message("Error loading attachments.");
                session.state.send_modify(|s| {
                    s.attachments_loading = false;
                    s.attachments_error = Some(message);
                });
            }
        }

        session.live.join(ticket_id);
        let handle = tokio::spawn(pump_events(
            session.live.subscribe(),
            session.state.clone(),
            ticket_id,
        ));
        if let Ok(mut guard) = session.pump.lock() {
            *guard = Some(handle);
        }

        session
    }

    pub fn subscribe(&self) -> watch::Receiver<TicketSessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TicketSessionState {
        self.state.borrow().clone()
    }

    pub fn ticket_id(&self) -> i64 {
        self.ticket_id
    }

    /// Whether `action` is currently legal, evaluated against the freshest
    /// known ticket. Views call this on every render; nothing is cached.
    pub fn can(&self, action: TicketAction) -> bool {
        self.state
            .borrow()
            .ticket
            .as_ref()
            .map(|t| workflow::check(t, self.viewer.role, action).is_ok())
            .unwrap_or(false)
    }

    /// Leave the live channel and stop the event pump.
    pub fn close(&self) {
        self.live.leave(self.ticket_id);
        if let Ok(mut guard) = self.pump.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    fn current_ticket(&self) -> Option<TicketDetails> {
        self.state.borrow().ticket.clone()
    }

    // ── Comments ────────────────────────────────────────────────────────

    /// Add a comment. Empty text and closed tickets are rejected locally,
    /// before any network call.
    pub async fn add_comment(&self, text: &str) {
        let text = text.trim();
        let Some(ticket) = self.current_ticket() else {
            self.state
                .send_modify(|s| s.comment_error = Some("Ticket is not loaded.".into()));
            return;
        };
        if text.is_empty() {
            self.state
                .send_modify(|s| s.comment_error = Some("Comment cannot be empty.".into()));
            return;
        }
        if let Err(denied) = workflow::check(&ticket, self.viewer.role, TicketAction::AddComment) {
            self.state.send_modify(|s| s.comment_error = Some(denied.message));
            return;
        }

        self.state.send_modify(|s| {
            s.adding_comment = true;
            s.comment_error = None;
        });

        match self.client.add_comment(self.ticket_id, text).await {
            Ok(comment) => self.state.send_modify(|s| {
                s.adding_comment = false;
                if let Some(ticket) = s.ticket.as_mut() {
                    // The live channel may have echoed this comment already.
                    if !ticket.comments.iter().any(|c| c.id == comment.id) {
                        ticket.comments.push(comment);
                    }
                }
            }),
            Err(err) => {
                let message = err.user_message("Error while adding comment.");
                self.state.send_modify(|s| {
                    s.adding_comment = false;
                    s.comment_error = Some(message);
                });
            }
        }
    }

    // ── Details editing ─────────────────────────────────────────────────

    /// Save title/description. Only legal while the ticket is New; the
    /// server response is authoritative for what got stored.
    pub async fn save_details(&self, title: &str, description: &str) {
        let Some(ticket) = self.current_ticket() else {
            self.state
                .send_modify(|s| s.details_error = Some("Ticket is not loaded.".into()));
            return;
        };
        if let Err(denied) = workflow::check(&ticket, self.viewer.role, TicketAction::EditDetails) {
            self.state.send_modify(|s| s.details_error = Some(denied.message));
            return;
        }
        let title = title.trim();
        if title.is_empty() {
            self.state
                .send_modify(|s| s.details_error = Some("Title is required.".into()));
            return;
        }

        self.state.send_modify(|s| {
            s.saving_details = true;
            s.details_error = None;
            s.details_success = None;
        });

        let body = UpdateDetailsRequest {
            title: title.to_string(),
            description: Some(description.trim().to_string()),
        };
        match self.client.update_details(self.ticket_id, &body).await {
            Ok(updated) => self.state.send_modify(|s| {
                s.saving_details = false;
                if let Some(ticket) = s.ticket.as_mut() {
                    ticket.title = updated.title;
                    ticket.description = updated.description;
                }
                s.details_success = Some("Ticket details updated.".into());
            }),
            Err(err) => {
                let message = err.user_message("Server error.");
                self.state.send_modify(|s| {
                    s.saving_details = false;
                    s.details_error = Some(message);
                });
            }
        }
    }

    // ── Status transitions ──────────────────────────────────────────────

    /// Employee/Manager: hand the ticket to the client for confirmation.
    pub async fn mark_waiting_client(&self) {
        self.status_action(
            TicketAction::MarkWaitingClient,
            "Ticket is now waiting for client confirmation.",
        )
        .await;
    }

    /// Client: the fix works, close the ticket.
    pub async fn confirm_fix(&self) {
        self.status_action(TicketAction::ConfirmFix, "Thanks! Ticket has been closed.")
            .await;
    }

    /// Client: the fix does not work, send it back.
    pub async fn reject_fix(&self) {
        self.status_action(TicketAction::RejectFix, "Ticket is back in progress.")
            .await;
    }

    async fn status_action(&self, action: TicketAction, success: &str) {
        let Some(ticket) = self.current_ticket() else {
            self.state
                .send_modify(|s| s.action_error = Some("Ticket is not loaded.".into()));
            return;
        };
        if let Err(denied) = workflow::check(&ticket, self.viewer.role, action) {
            self.state.send_modify(|s| s.action_error = Some(denied.message));
            return;
        }

        self.state.send_modify(|s| {
            s.action_loading = true;
            s.action_error = None;
            s.action_success = None;
        });

        let result = match action {
            TicketAction::MarkWaitingClient => {
                self.client.mark_waiting_client(self.ticket_id).await
            }
            TicketAction::ConfirmFix => {
                self.client
                    .client_decision(self.ticket_id, ClientDecision::Confirm)
                    .await
            }
            TicketAction::RejectFix => {
                self.client
                    .client_decision(self.ticket_id, ClientDecision::Reject)
                    .await
            }
            other => {
                warn!(action = %other, "not a status action");
                self.state.send_modify(|s| s.action_loading = false);
                return;
            }
        };

        match result {
            Ok(true) => self.state.send_modify(|s| {
                s.action_loading = false;
                if let (Some(ticket), Some(target)) =
                    (s.ticket.as_mut(), workflow::transition_target(action))
                {
                    ticket.status = target;
                }
                s.action_success = Some(success.to_string());
            }),
            Ok(false) => self.state.send_modify(|s| {
                s.action_loading = false;
                s.action_error = Some("Failed to update ticket.".into());
            }),
            Err(err) => {
                let message = err.user_message("Server error.");
                self.state.send_modify(|s| {
                    s.action_loading = false;
                    s.action_error = Some(message);
                });
            }
        }
    }

    /// Manager: assign the ticket to a support employee. Only offered while
    /// the ticket has no assignee; reassignment is not supported.
    pub async fn assign(&self, employee: &EmployeeOption) {
        let Some(ticket) = self.current_ticket() else {
            self.state
                .send_modify(|s| s.action_error = Some("Ticket is not loaded.".into()));
            return;
        };
        if let Err(denied) = workflow::check(&ticket, self.viewer.role, TicketAction::Assign) {
            self.state.send_modify(|s| s.action_error = Some(denied.message));
            return;
        }

        self.state.send_modify(|s| {
            s.action_loading = true;
            s.action_error = None;
            s.action_success = None;
        });

        match self.client.assign_ticket(self.ticket_id, employee.id).await {
            Ok(true) => {
                let name = employee.name.clone();
                self.state.send_modify(|s| {
                    s.action_loading = false;
                    if let Some(ticket) = s.ticket.as_mut() {
                        ticket.status = ticketflow_types::TicketStatus::InProgress;
                        ticket.assigned_employee_name = Some(name.clone());
                    }
                    s.action_success = Some(format!("Ticket assigned to {name}."));
                });
            }
            Ok(false) => self.state.send_modify(|s| {
                s.action_loading = false;
                s.action_error = Some("Failed to assign ticket.".into());
            }),
            Err(err) => {
                let message = err.user_message("Server error.");
                self.state.send_modify(|s| {
                    s.action_loading = false;
                    s.action_error = Some(message);
                });
            }
        }
    }

    // ── Attachments ─────────────────────────────────────────────────────

    /// Upload a file. Size is capped client-side; the confirmed attachment
    /// is prepended so the newest file stays on top.
    pub async fn upload_attachment(&self, file_name: &str, bytes: Vec<u8>) {
        if file_name.trim().is_empty() {
            self.state
                .send_modify(|s| s.upload_error = Some("Please choose a file first.".into()));
            return;
        }
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            self.state
                .send_modify(|s| s.upload_error = Some("File is too large. Max 10MB.".into()));
            return;
        }

        self.state.send_modify(|s| {
            s.uploading = true;
            s.upload_error = None;
            s.upload_success = None;
        });

        match self
            .client
            .upload_attachment(self.ticket_id, file_name, bytes)
            .await
        {
            Ok(attachment) => self.state.send_modify(|s| {
                s.uploading = false;
                if !s.attachments.iter().any(|a| a.id == attachment.id) {
                    s.attachments.insert(0, attachment);
                }
                s.upload_success = Some("Attachment uploaded successfully.".into());
            }),
            Err(err) => {
                let message = err.user_message("Server error while uploading.");
                self.state.send_modify(|s| {
                    s.uploading = false;
                    s.upload_error = Some(message);
                });
            }
        }
    }

    /// Delete an attachment the viewer uploaded. Unknown ids are a no-op;
    /// a delete already in flight for the same id is not repeated.
    pub async fn delete_attachment(&self, attachment_id: i64) {
        let attachment = {
            let state = self.state.borrow();
            if state.deleting.get(&attachment_id).copied().unwrap_or(false) {
                return;
            }
            let Some(attachment) = state
                .attachments
                .iter()
                .find(|a| a.id == attachment_id)
                .cloned()
            else {
                debug!(attachment_id, "delete requested for unknown attachment");
                return;
            };
            attachment
        };

        if !workflow::can_delete_attachment(&attachment, self.viewer.user_id) {
            self.state.send_modify(|s| {
                s.delete_error = Some("Only the uploader can delete an attachment.".into())
            });
            return;
        }

        self.state.send_modify(|s| {
            s.deleting.insert(attachment_id, true);
            s.delete_error = None;
            s.delete_success = None;
        });

        let result = self
            .client
            .delete_attachment(self.ticket_id, attachment_id)
            .await;

        self.state.send_modify(|s| {
            s.deleting.remove(&attachment_id);
            match &result {
                Ok(true) => {
                    s.attachments.retain(|a| a.id != attachment_id);
                    s.delete_success = Some("Attachment deleted.".into());
                }
                Ok(false) => s.delete_error = Some("Delete failed.".into()),
                Err(err) => {
                    s.delete_error = Some(err.user_message("Server error while deleting."))
                }
            }
        });
    }
}

impl Drop for TicketSession {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.pump.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// Forward live events into the session state until the channel closes.
async fn pump_events(
    mut events: broadcast::Receiver<TicketEvent>,
    state: Arc<watch::Sender<TicketSessionState>>,
    ticket_id: i64,
) {
    loop {
        match events.recv().await {
            Ok(event) => state.send_modify(|s| apply_live_event(s, ticket_id, event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, ticket_id, "live event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Merge one inbound event into local state.
///
/// Added entities are dropped when they belong to another ticket or when an
/// entity with the same id is already present (the echo of an optimistic
/// append). Deletions of absent ids are a no-op.
pub(crate) fn apply_live_event(
    state: &mut TicketSessionState,
    session_ticket: i64,
    event: TicketEvent,
) {
    match event {
        TicketEvent::CommentAdded(comment) => {
            if comment.ticket_id != session_ticket {
                return;
            }
            let Some(ticket) = state.ticket.as_mut() else {
                return;
            };
            if ticket.comments.iter().any(|c| c.id == comment.id) {
                return;
            }
            ticket.comments.push(comment);
        }
        TicketEvent::AttachmentAdded(attachment) => {
            if attachment.ticket_id != session_ticket {
                return;
            }
            if state.attachments.iter().any(|a| a.id == attachment.id) {
                return;
            }
            state.attachments.push(attachment);
        }
        TicketEvent::AttachmentDeleted(attachment_id) => {
            state.attachments.retain(|a| a.id != attachment_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ticketflow_types::{Comment, TicketStatus};

    fn base_state() -> TicketSessionState {
        TicketSessionState {
            ticket: Some(TicketDetails {
                id: 7,
                title: "t".into(),
                description: "d".into(),
                status: TicketStatus::InProgress,
                client_name: "Acme".into(),
                assigned_employee_name: Some("Dana".into()),
                product_name: "Widget".into(),
                created_at: Utc::now(),
                comments: vec![],
                attachments: None,
            }),
            ..TicketSessionState::default()
        }
    }

    fn comment(id: i64, ticket_id: i64) -> Comment {
        Comment {
            id,
            ticket_id,
            text: format!("comment {id}"),
            author_name: None,
            created_at: Utc::now(),
        }
    }

    fn attachment(id: i64, ticket_id: i64) -> Attachment {
        Attachment {
            id,
            ticket_id,
            file_name: format!("file-{id}.txt"),
            file_path: format!("/files/{id}"),
            file_size_in_bytes: 64,
            uploaded_at: Utc::now(),
            uploaded_by_user_id: 3,
            uploaded_by_name: None,
        }
    }

    #[test]
    fn test_optimistic_append_then_echo_keeps_one_copy() {
        let mut state = base_state();

        // Optimistic append from a confirmed server response.
        state
            .ticket
            .as_mut()
            .unwrap()
            .comments
            .push(comment(7, 7));

        // The hub echoes the same comment back.
        apply_live_event(&mut state, 7, TicketEvent::CommentAdded(comment(7, 7)));

        let comments = &state.ticket.as_ref().unwrap().comments;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, 7);
    }

    #[test]
    fn test_event_first_then_duplicate_event_keeps_one_copy() {
        let mut state = base_state();

        apply_live_event(&mut state, 7, TicketEvent::CommentAdded(comment(7, 7)));
        apply_live_event(&mut state, 7, TicketEvent::CommentAdded(comment(7, 7)));

        assert_eq!(state.ticket.as_ref().unwrap().comments.len(), 1);
    }

    #[test]
    fn test_events_for_other_tickets_are_dropped() {
        let mut state = base_state();

        apply_live_event(&mut state, 7, TicketEvent::CommentAdded(comment(1, 8)));
        apply_live_event(&mut state, 7, TicketEvent::AttachmentAdded(attachment(2, 9)));

        assert!(state.ticket.as_ref().unwrap().comments.is_empty());
        assert!(state.attachments.is_empty());
    }

    #[test]
    fn test_new_events_append_in_arrival_order() {
        let mut state = base_state();

        apply_live_event(&mut state, 7, TicketEvent::CommentAdded(comment(1, 7)));
        apply_live_event(&mut state, 7, TicketEvent::CommentAdded(comment(2, 7)));
        apply_live_event(&mut state, 7, TicketEvent::AttachmentAdded(attachment(10, 7)));
        apply_live_event(&mut state, 7, TicketEvent::AttachmentAdded(attachment(11, 7)));

        let ids: Vec<i64> = state
            .ticket
            .as_ref()
            .unwrap()
            .comments
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);

        let att_ids: Vec<i64> = state.attachments.iter().map(|a| a.id).collect();
        assert_eq!(att_ids, vec![10, 11]);
    }

    #[test]
    fn test_deleting_absent_attachment_is_noop() {
        let mut state = base_state();
        state.attachments.push(attachment(10, 7));

        apply_live_event(&mut state, 7, TicketEvent::AttachmentDeleted(999));

        assert_eq!(state.attachments.len(), 1);
    }

    #[test]
    fn test_attachment_delete_event_removes_present_entity() {
        let mut state = base_state();
        state.attachments.push(attachment(10, 7));
        state.attachments.push(attachment(11, 7));

        apply_live_event(&mut state, 7, TicketEvent::AttachmentDeleted(10));

        let ids: Vec<i64> = state.attachments.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![11]);
    }
}
