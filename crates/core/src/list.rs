// crates/core/src/list.rs
//! Paginated, filterable ticket list as observable state.
//!
//! A reload always replaces the whole collection — there is no incremental
//! merge. Overlapping reloads are not deduplicated; the last response to
//! arrive wins. Callers that need fresher guarantees gate input on
//! `loading`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use ticketflow_api::{ApiError, TicketsClient};
use ticketflow_types::{Role, Ticket, TicketQuery, TicketStatus};

/// Observable snapshot of the list view.
#[derive(Debug, Clone, Default)]
pub struct TicketListState {
    pub tickets: Vec<Ticket>,
    pub total_count: i64,
    pub loading: bool,
    pub error: Option<String>,
    pub query: TicketQuery,
}

/// Role-scoped ticket list view-model.
pub struct TicketList {
    client: Arc<TicketsClient>,
    scope: Role,
    state: watch::Sender<TicketListState>,
}

impl TicketList {
    pub fn new(client: Arc<TicketsClient>, scope: Role) -> Self {
        let (state, _) = watch::channel(TicketListState::default());
        Self {
            client,
            scope,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TicketListState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TicketListState {
        self.state.borrow().clone()
    }

    /// Replace all filter fields and reload.
    ///
    /// When anything other than pagination changed, the page number resets
    /// to 1; a pure page move keeps its page. Exactly one list request is
    /// issued; on completion the ticket collection is replaced wholesale.
    pub async fn query(&self, mut next: TicketQuery) {
        let previous = self.state.borrow().query.clone();
        if !previous.same_filters(&next) {
            next.page_number = 1;
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            s.query = next.clone();
        });

        debug!(scope = %self.scope, page = next.page_number, "reloading ticket list");
        match self.client.list_tickets(self.scope, &next).await {
            Ok(page) => self.state.send_modify(|s| {
                s.loading = false;
                s.tickets = page.tickets;
                s.total_count = page.total_count;
            }),
            Err(err) => self.state.send_modify(|s| {
                s.loading = false;
                s.tickets = Vec::new();
                s.total_count = 0;
                s.error = Some(list_error_message(&err));
            }),
        }
    }

    /// Move to `page_number`, keeping the current filters.
    pub async fn set_page(&self, page_number: u32) {
        let mut next = self.state.borrow().query.clone();
        next.page_number = page_number;
        self.query(next).await;
    }

    /// Change the free-text search term (resets to page 1).
    pub async fn search(&self, term: impl Into<String>) {
        let mut next = self.state.borrow().query.clone();
        let term = term.into();
        next.search_term = (!term.trim().is_empty()).then_some(term);
        self.query(next).await;
    }

    /// Change the status filter (resets to page 1).
    pub async fn filter_status(&self, status: Option<TicketStatus>) {
        let mut next = self.state.borrow().query.clone();
        next.status = status;
        self.query(next).await;
    }

    /// Re-issue the current query unchanged.
    pub async fn refresh(&self) {
        let next = self.state.borrow().query.clone();
        self.query(next).await;
    }
}

fn list_error_message(err: &ApiError) -> String {
    err.user_message("Error loading tickets. Please try again.")
}
