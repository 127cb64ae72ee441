//! Task decomposition
//!
//! Splits one task's source payload into an ordered set of atomic units,
//! each annotated with the context needed to act on it independently and an
//! atomicity score. Decomposition failures are contained to the task: an
//! unparsable payload contributes zero atoms and the rest of the plan
//! continues.

pub mod context;
pub mod decomposer;
pub mod error;
pub mod provider;
pub mod score;
pub mod split;

pub use decomposer::AtomDecomposer;
pub use error::{ContextError, DecompositionError};
pub use provider::ContextProvider;
