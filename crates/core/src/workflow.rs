// crates/core/src/workflow.rs
//! Ticket workflow rules: which action is legal for which role in which
//! status.
//!
//! Pure functions only. Callers re-evaluate against the freshest ticket on
//! every render or action attempt; nothing here is cached and nothing here
//! holds state. The transition graph:
//!
//! ```text
//! New --assign(Manager)--> InProgress --waiting(Employee|Manager)--> WaitingClient
//! WaitingClient --confirm(Client)--> Closed
//! WaitingClient --reject(Client)--> InProgress
//! ```

use std::fmt;

use thiserror::Error;
use ticketflow_types::{Attachment, Role, TicketDetails, TicketStatus};

/// Everything a user can ask the workflow to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketAction {
    Assign,
    MarkWaitingClient,
    ConfirmFix,
    RejectFix,
    EditDetails,
    AddComment,
}

impl TicketAction {
    pub const ALL: [TicketAction; 6] = [
        TicketAction::Assign,
        TicketAction::MarkWaitingClient,
        TicketAction::ConfirmFix,
        TicketAction::RejectFix,
        TicketAction::EditDetails,
        TicketAction::AddComment,
    ];
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketAction::Assign => "assign",
            TicketAction::MarkWaitingClient => "mark waiting-client",
            TicketAction::ConfirmFix => "confirm fix",
            TicketAction::RejectFix => "reject fix",
            TicketAction::EditDetails => "edit details",
            TicketAction::AddComment => "add comment",
        };
        f.write_str(name)
    }
}

/// A locally rejected action, with the message the view shows. Produced
/// before any network call happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionDenied {
    pub action: TicketAction,
    pub message: String,
}

impl ActionDenied {
    fn new(action: TicketAction, message: impl Into<String>) -> Self {
        Self {
            action,
            message: message.into(),
        }
    }
}

/// The transition table plus the status-only gates, as a pure predicate.
///
/// Note `ConfirmFix` and `RejectFix` share one legality gate on purpose
/// (both are the client's verdict on a waiting fix); they differ in their
/// target status, see [`transition_target`].
pub fn permits(status: TicketStatus, role: Role, action: TicketAction) -> bool {
    use TicketAction as A;
    use TicketStatus as S;

    match (status, role, action) {
        (S::New, Role::Manager, A::Assign) => true,
        (S::InProgress, Role::Employee | Role::Manager, A::MarkWaitingClient) => true,
        (S::WaitingClient, Role::Client, A::ConfirmFix | A::RejectFix) => true,
        (S::New, _, A::EditDetails) => true,
        (status, _, A::AddComment) => status != S::Closed,
        _ => false,
    }
}

/// The status a successful action moves the ticket to, for actions that
/// transition at all.
pub fn transition_target(action: TicketAction) -> Option<TicketStatus> {
    match action {
        TicketAction::Assign => Some(TicketStatus::InProgress),
        TicketAction::MarkWaitingClient => Some(TicketStatus::WaitingClient),
        TicketAction::ConfirmFix => Some(TicketStatus::Closed),
        TicketAction::RejectFix => Some(TicketStatus::InProgress),
        TicketAction::EditDetails | TicketAction::AddComment => None,
    }
}

/// Full legality check against a concrete ticket. The role/status table
/// decides first; only callers it allows can then trip the gates it can't
/// express, like assignment requiring an unassigned ticket (reassignment
/// is not supported).
pub fn check(ticket: &TicketDetails, role: Role, action: TicketAction) -> Result<(), ActionDenied> {
    if !permits(ticket.status, role, action) {
        let message = match action {
            TicketAction::AddComment => {
                "The ticket is closed. Comments can no longer be added.".to_string()
            }
            TicketAction::EditDetails => {
                "Title and description can only be edited while the ticket is new.".to_string()
            }
            TicketAction::Assign => "Only a manager can assign a new ticket.".to_string(),
            TicketAction::MarkWaitingClient => {
                "Only support staff can mark an in-progress ticket as waiting on the client."
                    .to_string()
            }
            TicketAction::ConfirmFix | TicketAction::RejectFix => {
                "Only the client can respond while the ticket is waiting for confirmation."
                    .to_string()
            }
        };
        return Err(ActionDenied::new(action, message));
    }

    if action == TicketAction::Assign && ticket.assigned_employee_name.is_some() {
        return Err(ActionDenied::new(
            action,
            "Ticket already has an assigned employee.",
        ));
    }

    Ok(())
}

/// Uploader-only rule for attachment deletion. Not status-gated.
pub fn can_delete_attachment(attachment: &Attachment, user_id: i64) -> bool {
    user_id != 0 && attachment.uploaded_by_user_id == user_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const ALL_STATUSES: [TicketStatus; 4] = [
        TicketStatus::New,
        TicketStatus::InProgress,
        TicketStatus::WaitingClient,
        TicketStatus::Closed,
    ];
    const ALL_ROLES: [Role; 3] = [Role::Manager, Role::Employee, Role::Client];

    fn ticket(status: TicketStatus, assignee: Option<&str>) -> TicketDetails {
        TicketDetails {
            id: 1,
            title: "t".into(),
            description: "d".into(),
            status,
            client_name: "Acme".into(),
            assigned_employee_name: assignee.map(str::to_string),
            product_name: "Widget".into(),
            created_at: Utc::now(),
            comments: vec![],
            attachments: None,
        }
    }

    fn attachment(uploader: i64) -> Attachment {
        Attachment {
            id: 9,
            ticket_id: 1,
            file_name: "log.txt".into(),
            file_path: "/files/log.txt".into(),
            file_size_in_bytes: 128,
            uploaded_at: Utc::now(),
            uploaded_by_user_id: uploader,
            uploaded_by_name: None,
        }
    }

    /// The decision for every (status, role, action) triple must match the
    /// transition table exactly.
    #[test]
    fn test_permits_matches_table_exhaustively() {
        for status in ALL_STATUSES {
            for role in ALL_ROLES {
                for action in TicketAction::ALL {
                    let expected = match action {
                        TicketAction::Assign => {
                            status == TicketStatus::New && role == Role::Manager
                        }
                        TicketAction::MarkWaitingClient => {
                            status == TicketStatus::InProgress && role != Role::Client
                        }
                        TicketAction::ConfirmFix | TicketAction::RejectFix => {
                            status == TicketStatus::WaitingClient && role == Role::Client
                        }
                        TicketAction::EditDetails => status == TicketStatus::New,
                        TicketAction::AddComment => status != TicketStatus::Closed,
                    };
                    assert_eq!(
                        permits(status, role, action),
                        expected,
                        "({status}, {role}, {action})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_confirm_and_reject_share_gate_but_not_target() {
        assert_eq!(
            permits(TicketStatus::WaitingClient, Role::Client, TicketAction::ConfirmFix),
            permits(TicketStatus::WaitingClient, Role::Client, TicketAction::RejectFix),
        );
        assert_eq!(
            transition_target(TicketAction::ConfirmFix),
            Some(TicketStatus::Closed)
        );
        assert_eq!(
            transition_target(TicketAction::RejectFix),
            Some(TicketStatus::InProgress)
        );
    }

    #[test]
    fn test_employee_cannot_confirm_fix() {
        assert!(!permits(
            TicketStatus::WaitingClient,
            Role::Employee,
            TicketAction::ConfirmFix
        ));
    }

    #[test]
    fn test_assign_withdrawn_once_assigned() {
        let unassigned = ticket(TicketStatus::New, None);
        assert!(check(&unassigned, Role::Manager, TicketAction::Assign).is_ok());

        let assigned = ticket(TicketStatus::New, Some("Dana"));
        let denied = check(&assigned, Role::Manager, TicketAction::Assign).unwrap_err();
        assert!(denied.message.contains("already"));
    }

    /// The role denial outranks the assignment-state denial: a client
    /// poking at an assigned ticket learns nothing about its assignee.
    #[test]
    fn test_role_denial_precedes_already_assigned() {
        let assigned = ticket(TicketStatus::New, Some("Dana"));

        let denied = check(&assigned, Role::Client, TicketAction::Assign).unwrap_err();
        assert_eq!(denied.message, "Only a manager can assign a new ticket.");

        let denied = check(&assigned, Role::Employee, TicketAction::Assign).unwrap_err();
        assert_eq!(denied.message, "Only a manager can assign a new ticket.");
    }

    #[test]
    fn test_comment_denied_on_closed_with_stable_message() {
        let closed = ticket(TicketStatus::Closed, Some("Dana"));
        let first = check(&closed, Role::Client, TicketAction::AddComment).unwrap_err();
        let second = check(&closed, Role::Client, TicketAction::AddComment).unwrap_err();
        assert_eq!(first, second);
        assert!(first.message.contains("closed"));
    }

    #[test]
    fn test_edit_details_only_while_new() {
        let fresh = ticket(TicketStatus::New, None);
        assert!(check(&fresh, Role::Client, TicketAction::EditDetails).is_ok());

        for status in [
            TicketStatus::InProgress,
            TicketStatus::WaitingClient,
            TicketStatus::Closed,
        ] {
            let t = ticket(status, None);
            assert!(check(&t, Role::Client, TicketAction::EditDetails).is_err());
        }
    }

    #[test]
    fn test_attachment_delete_is_uploader_only() {
        let a = attachment(12);
        assert!(can_delete_attachment(&a, 12));
        assert!(!can_delete_attachment(&a, 13));
        assert!(!can_delete_attachment(&a, 0));
    }
}
