// crates/core/src/lib.rs
//! View-model layer: the ticket list, the ticket detail session, and the
//! workflow rules both consult.

pub mod list;
pub mod session;
pub mod workflow;

pub use list::{TicketList, TicketListState};
pub use session::{TicketSession, TicketSessionState, Viewer, MAX_UPLOAD_BYTES};
pub use workflow::{ActionDenied, TicketAction};
