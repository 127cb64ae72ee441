//! Decomposition and context-retrieval errors

/// Task decomposition errors
///
/// A failing task contributes zero atoms; the plan continues without it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompositionError {
    /// Payload is empty or whitespace-only
    #[error("payload is empty")]
    EmptyPayload,

    /// Payload cannot be parsed into fragments
    #[error("unparsable payload: {0}")]
    UnparsablePayload(String),

    /// Recursive splitting exceeded the depth cap
    #[error("decomposition recursion depth exceeded")]
    RecursionDepthExceeded,
}

/// Context-retrieval errors (best-effort collaborator)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The retrieval collaborator is unreachable or failed
    #[error("context retrieval failed: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DecompositionError::UnparsablePayload("unbalanced '}'".to_string());
        assert!(err.to_string().contains("unparsable payload"));
        assert!(ContextError::Unavailable("timeout".to_string())
            .to_string()
            .contains("context retrieval failed"));
    }
}
