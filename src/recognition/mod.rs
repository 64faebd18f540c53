//! Recognition signals and their debouncing.

mod signal;
mod stabilizer;
mod unrecognized;
#[cfg(test)]
mod tests;

pub use crate::backend::{RecognitionSignal, RecognitionStatus, SubjectKind};
pub use signal::{matched_identity, select_candidate, Identity, StudentObservation};
pub use stabilizer::{StabilizedSignal, Stabilizer};
pub use unrecognized::UnrecognizedDetector;
