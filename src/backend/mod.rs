mod client;
mod mock;
pub mod normalize;
mod types;

pub use client::{HttpBackend, KioskBackend, SYNC_OVERLAY_MESSAGE};
pub use mock::{BackendCall, MockBackend};
pub use types::*;
