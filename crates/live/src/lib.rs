//! Live Update Channel — persistent WebSocket connection to the ticket hub
//! delivering comment/attachment events to ticket detail sessions.

pub mod channel;
pub mod protocol;

pub use channel::{LiveChannel, LiveConfig};
pub use protocol::{ClientMessage, TicketEvent};
