//! Shared domain model and wire types for the ticketflow client crates.
//!
//! Everything here mirrors the backend's JSON shapes (camelCase fields,
//! integer status codes, the `{data, msgError, errorCode}` envelope). No
//! behavior lives in this crate beyond envelope unwrapping and a few
//! parsing helpers.

pub mod auth;
pub mod envelope;
pub mod models;
pub mod query;

pub use auth::TokenStore;
pub use envelope::{ApiEnvelope, EnvelopeError, PageEnvelope};
pub use models::{
    AiAssignSuggestion, Attachment, ClientDecision, Comment, CreateTicketRequest, EmployeeOption,
    ProductOption, Role, Ticket, TicketDetails, TicketStatus, UpdateDetailsRequest,
};
pub use query::TicketQuery;
