// crates/types/src/query.rs
//! Paged/filterable ticket list query.

use serde::{Deserialize, Serialize};

use crate::models::TicketStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Filters for the role-scoped ticket list endpoints.
///
/// Only non-empty / non-zero filters become query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    pub page_number: u32,
    pub page_size: u32,
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub assigned_employee_id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<i64>,
}

impl Default for TicketQuery {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search_term: None,
            status: None,
            client_id: None,
            assigned_employee_id: None,
            product_id: None,
        }
    }
}

impl TicketQuery {
    pub fn page(page_number: u32) -> Self {
        Self {
            page_number,
            ..Self::default()
        }
    }

    /// The search term with surrounding whitespace stripped, if any remains.
    pub fn search(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// True when everything except pagination matches.
    ///
    /// A change in any filter resets the page number to 1; a pure page move
    /// does not.
    pub fn same_filters(&self, other: &Self) -> bool {
        self.search() == other.search()
            && self.status == other.status
            && self.client_id == other.client_id
            && self.assigned_employee_id == other.assigned_employee_id
            && self.product_id == other.product_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_trims_and_drops_empty() {
        let mut q = TicketQuery::default();
        assert_eq!(q.search(), None);

        q.search_term = Some("   ".into());
        assert_eq!(q.search(), None);

        q.search_term = Some("  printer ".into());
        assert_eq!(q.search(), Some("printer"));
    }

    #[test]
    fn test_same_filters_ignores_pagination() {
        let a = TicketQuery::default();
        let b = TicketQuery {
            page_number: 4,
            page_size: 25,
            ..TicketQuery::default()
        };
        assert!(a.same_filters(&b));
    }

    #[test]
    fn test_same_filters_sees_status_change() {
        let a = TicketQuery::default();
        let b = TicketQuery {
            status: Some(TicketStatus::Closed),
            ..TicketQuery::default()
        };
        assert!(!a.same_filters(&b));
    }
}
