//! Local HTTP surface for the kiosk renderer: current view, camera feed and
//! operator input.

mod handlers;
mod server;

pub use handlers::parse_operator_command;
pub use server::{ServerState, StatusServer, StatusServerBuilder};
