//! Ticket Repository Client — thin reqwest wrapper around the ticket CRUD,
//! comment, attachment, assignment and lookup endpoints.

pub mod client;
pub mod error;

pub use client::{TicketPage, TicketsClient};
pub use error::ApiError;
