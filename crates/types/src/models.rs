// crates/types/src/models.rs
//! Ticket domain model: tickets, comments, attachments and the lookup
//! options used when assigning or creating tickets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a ticket.
///
/// Serialized as the backend's integer codes. The order of the variants is
/// not meaningful — legal transitions come from the workflow table, never
/// from comparing codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TicketStatus {
    New,
    InProgress,
    WaitingClient,
    Closed,
}

/// Raised when the backend sends a status code we don't know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ticket status code: {0}")]
pub struct UnknownStatus(pub u8);

impl From<TicketStatus> for u8 {
    fn from(status: TicketStatus) -> u8 {
        match status {
            TicketStatus::New => 0,
            TicketStatus::InProgress => 1,
            TicketStatus::WaitingClient => 2,
            TicketStatus::Closed => 3,
        }
    }
}

impl TryFrom<u8> for TicketStatus {
    type Error = UnknownStatus;

    fn try_from(code: u8) -> Result<Self, UnknownStatus> {
        match code {
            0 => Ok(TicketStatus::New),
            1 => Ok(TicketStatus::InProgress),
            2 => Ok(TicketStatus::WaitingClient),
            3 => Ok(TicketStatus::Closed),
            other => Err(UnknownStatus(other)),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketStatus::New => "New",
            TicketStatus::InProgress => "InProgress",
            TicketStatus::WaitingClient => "WaitingClient",
            TicketStatus::Closed => "Closed",
        };
        f.write_str(name)
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(TicketStatus::New),
            "inprogress" | "in-progress" => Ok(TicketStatus::InProgress),
            "waitingclient" | "waiting-client" => Ok(TicketStatus::WaitingClient),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// Who the caller is, as far as the workflow rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Manager,
    Employee,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Manager => "Manager",
            Role::Employee => "Employee",
            Role::Client => "Client",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manager" | "admin" => Ok(Role::Manager),
            "employee" | "support" => Ok(Role::Employee),
            "client" => Ok(Role::Client),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A ticket as returned by the paged list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub assigned_employee_name: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

/// A ticket as returned by the detail endpoint, with its comments embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetails {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub client_name: String,
    #[serde(default)]
    pub assigned_employee_name: Option<String>,
    pub product_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}

/// A single ticket comment. Append-only: never edited or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub ticket_id: i64,
    pub text: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A file attached to a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i64,
    pub ticket_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size_in_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by_user_id: i64,
    #[serde(default)]
    pub uploaded_by_name: Option<String>,
}

/// Assignment candidate lookup row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeOption {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

/// Assignment suggestion from the backend's AI helper.
///
/// `suggested_employee_id` is null when the model could not pick anyone;
/// `is_fallback` marks suggestions produced by the non-AI fallback path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAssignSuggestion {
    #[serde(default)]
    pub suggested_employee_id: Option<i64>,
    #[serde(default)]
    pub suggested_employee_name: Option<String>,
    pub confidence: f64,
    pub reason: String,
    pub is_fallback: bool,
    #[serde(default)]
    pub warning: Option<String>,
}

/// Product lookup row used when a client files a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub id: i64,
    pub name: String,
}

/// Body for `PUT /tickets/{id}/details`. Editable only while status = New.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetailsRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body for `POST /tickets/client`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub product_id: i64,
}

/// A client's verdict on a fix waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientDecision {
    Confirm,
    Reject,
}
