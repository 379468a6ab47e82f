// crates/api/src/client.rs
//! Stateless request/response wrapper around the ticket REST endpoints.
//!
//! One method per server capability. Every response is the uniform
//! `{data, msgError, errorCode}` envelope; unwrapping (and the 401 →
//! clear-token interceptor behavior) happens in one place here so no
//! caller can trust a payload without both checks.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use ticketflow_types::{
    AiAssignSuggestion, ApiEnvelope, Attachment, ClientDecision, Comment, CreateTicketRequest,
    EmployeeOption, PageEnvelope, ProductOption, Role, Ticket, TicketDetails, TicketQuery,
    TokenStore, UpdateDetailsRequest,
};

use crate::error::ApiError;

/// One page of tickets plus the total matching count.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    pub total_count: i64,
}

/// HTTP client for the ticket backend.
///
/// Cheap to clone; holds one pooled `reqwest::Client`. Stateless beyond the
/// shared [`TokenStore`]: no caching, no retries, no deduplication.
#[derive(Debug, Clone)]
pub struct TicketsClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

impl TicketsClient {
    pub fn new(base_url: impl Into<String>, tokens: TokenStore) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach the bearer credential (when present), send, and unwrap the
    /// response envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("401 from ticket backend, clearing stored credential");
            self.tokens.clear();
            return Err(ApiError::Unauthorized);
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        envelope.into_result(fallback).map_err(Into::into)
    }

    /// Same as [`send`](Self::send) for list calls carrying a totalCount.
    async fn send_paged<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<(T, i64), ApiError> {
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("401 from ticket backend, clearing stored credential");
            self.tokens.clear();
            return Err(ApiError::Unauthorized);
        }

        let envelope: PageEnvelope<T> = response.json().await?;
        envelope.into_result(fallback).map_err(Into::into)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.get() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // ── Tickets list ────────────────────────────────────────────────────

    /// Role-scoped paged list. Managers see the admin view, employees their
    /// assigned tickets, clients their own.
    pub async fn list_tickets(
        &self,
        scope: Role,
        query: &TicketQuery,
    ) -> Result<TicketPage, ApiError> {
        let path = match scope {
            Role::Manager => "/tickets/admin",
            Role::Employee => "/tickets/employee",
            Role::Client => "/tickets/client",
        };

        let mut params: Vec<(&str, String)> = vec![
            ("pageNumber", query.page_number.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if let Some(term) = query.search() {
            params.push(("searchTerm", term.to_string()));
        }
        if let Some(status) = query.status {
            params.push(("status", u8::from(status).to_string()));
        }
        if let Some(id) = query.client_id.filter(|id| *id != 0) {
            params.push(("clientId", id.to_string()));
        }
        if let Some(id) = query.assigned_employee_id.filter(|id| *id != 0) {
            params.push(("assignedEmployeeId", id.to_string()));
        }
        if let Some(id) = query.product_id.filter(|id| *id != 0) {
            params.push(("productId", id.to_string()));
        }

        debug!(scope = %scope, page = query.page_number, "loading tickets");
        let request = self.http.get(self.url(path)).query(&params);
        let (tickets, total_count): (Vec<Ticket>, i64) =
            self.send_paged(request, "Failed to load tickets.").await?;

        // Older backends omit totalCount on single-page results.
        let total_count = if total_count == 0 && !tickets.is_empty() {
            tickets.len() as i64
        } else {
            total_count
        };

        Ok(TicketPage {
            tickets,
            total_count,
        })
    }

    // ── Ticket detail ───────────────────────────────────────────────────

    pub async fn ticket_details(&self, ticket_id: i64) -> Result<TicketDetails, ApiError> {
        let request = self.http.get(self.url(&format!("/tickets/{ticket_id}")));
        self.send(request, "Failed to load ticket details.").await
    }

    /// Update title/description. Only legal while the ticket is New; the
    /// server is the authority and echoes the updated details back.
    pub async fn update_details(
        &self,
        ticket_id: i64,
        body: &UpdateDetailsRequest,
    ) -> Result<TicketDetails, ApiError> {
        let request = self
            .http
            .put(self.url(&format!("/tickets/{ticket_id}/details")))
            .json(body);
        self.send(request, "Failed to update ticket details.").await
    }

    // ── Comments ────────────────────────────────────────────────────────

    pub async fn add_comment(&self, ticket_id: i64, text: &str) -> Result<Comment, ApiError> {
        let request = self
            .http
            .post(self.url(&format!("/tickets/{ticket_id}/comments")))
            .json(&json!({ "commentText": text }));
        self.send(request, "Failed to add comment.").await
    }

    // ── Status transitions ──────────────────────────────────────────────

    pub async fn mark_waiting_client(&self, ticket_id: i64) -> Result<bool, ApiError> {
        let request = self
            .http
            .put(self.url(&format!("/tickets/{ticket_id}/waiting-client")))
            .json(&json!({}));
        self.send(request, "Failed to update status.").await
    }

    pub async fn client_decision(
        &self,
        ticket_id: i64,
        decision: ClientDecision,
    ) -> Result<bool, ApiError> {
        let request = self
            .http
            .put(self.url(&format!("/tickets/{ticket_id}/client-decision")))
            .json(&json!({ "action": decision }));
        self.send(request, "Failed to update ticket.").await
    }

    pub async fn assign_ticket(&self, ticket_id: i64, employee_id: i64) -> Result<bool, ApiError> {
        let request = self
            .http
            .put(self.url(&format!("/tickets/{ticket_id}/assign")))
            .json(&json!({ "employeeId": employee_id }));
        self.send(request, "Failed to assign ticket.").await
    }

    /// Ask the backend for an AI assignment suggestion. Empty POST body;
    /// the suggestion itself may still carry a null employee id.
    pub async fn ai_assign_suggest(&self, ticket_id: i64) -> Result<AiAssignSuggestion, ApiError> {
        let request = self
            .http
            .post(self.url(&format!("/tickets/{ticket_id}/ai-assign-suggest")))
            .json(&json!({}));
        self.send(request, "AI request failed.").await
    }

    // ── Lookups ─────────────────────────────────────────────────────────

    pub async fn support_employees(&self) -> Result<Vec<EmployeeOption>, ApiError> {
        let request = self.http.get(self.url("/users/support-employees"));
        self.send(request, "Failed to load employees.").await
    }

    pub async fn active_products(&self) -> Result<Vec<ProductOption>, ApiError> {
        let request = self.http.get(self.url("/products/active"));
        self.send(request, "Failed to load products.").await
    }

    // ── Ticket creation ─────────────────────────────────────────────────

    /// File a new ticket as a client. Returns the new ticket id.
    pub async fn create_client_ticket(&self, body: &CreateTicketRequest) -> Result<i64, ApiError> {
        let request = self.http.post(self.url("/tickets/client")).json(body);
        self.send(request, "Failed to create ticket.").await
    }

    // ── Attachments ─────────────────────────────────────────────────────

    pub async fn attachments(&self, ticket_id: i64) -> Result<Vec<Attachment>, ApiError> {
        let request = self
            .http
            .get(self.url(&format!("/tickets/{ticket_id}/attachments")));
        self.send(request, "Failed to load attachments.").await
    }

    pub async fn upload_attachment(
        &self,
        ticket_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .http
            .post(self.url(&format!("/tickets/{ticket_id}/attachments")))
            .multipart(form);
        self.send(request, "Upload failed.").await
    }

    pub async fn delete_attachment(
        &self,
        ticket_id: i64,
        attachment_id: i64,
    ) -> Result<bool, ApiError> {
        let request = self
            .http
            .delete(self.url(&format!("/tickets/{ticket_id}/attachments/{attachment_id}")));
        self.send(request, "Delete failed.").await
    }
}
