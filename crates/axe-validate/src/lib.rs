//! Hierarchical validation
//!
//! Four escalating levels of consistency checking — atom, task, milestone,
//! plan — dispatched through a [`LevelValidator`] trait with one
//! implementation per level. Validation only reports: it never retries, and
//! the run coordinator decides what an invalid result triggers.

pub mod error;
pub mod gate;
pub mod levels;
pub mod scope;
pub mod types;

pub use error::ValidationError;
pub use gate::{LevelValidator, ValidationGate};
pub use scope::ValidationScope;
pub use types::{Severity, ValidationLevel, ValidationResult, Violation};
