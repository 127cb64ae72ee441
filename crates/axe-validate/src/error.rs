//! Validation errors

use crate::types::ValidationLevel;

/// Errors raised by the validation gate itself
///
/// A failing *check* is a result, not an error; these cover misuse of the
/// gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The scope lacks data this level needs
    #[error("validation scope incomplete for {level} level: {missing}")]
    IncompleteScope {
        /// Level that was requested
        level: ValidationLevel,
        /// What the scope was missing
        missing: String,
    },
}
