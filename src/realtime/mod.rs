pub mod handler;
pub mod hub;
pub mod topics;
pub mod types;

pub use handler::ws_handler;
pub use hub::{ConnectionSender, HubHandle};
pub use types::{ClientMessage, ServerMessage};
