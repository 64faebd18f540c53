mod navigator;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use navigator::Navigator;
pub use orchestrator::KioskOrchestrator;
pub use types::{ComponentState, ShutdownReason};
