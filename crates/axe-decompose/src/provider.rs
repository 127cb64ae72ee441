//! Context/retrieval collaborator contract

use crate::error::ContextError;
use axe_atom::TaskSpec;

/// Supplies example snippets to enrich an atom's injected context
///
/// Best-effort: a failure degrades context quality but never aborts
/// decomposition.
#[async_trait::async_trait]
pub trait ContextProvider: Send + Sync {
    /// Retrieve example snippets relevant to one fragment of a task
    async fn examples_for(
        &self,
        task: &TaskSpec,
        fragment: &str,
    ) -> Result<Vec<String>, ContextError>;
}
