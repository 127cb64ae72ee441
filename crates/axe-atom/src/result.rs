//! Execution attempt results and the append-only result log
//!
//! Every attempt, successful or not, appends one [`AtomResult`]. The log is
//! hash-chained: each entry commits to its predecessor, so retry-policy
//! decisions and audits can trust that history was never truncated or
//! rewritten.

use crate::ids::AtomId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Outcome of a single execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Attempt produced usable output
    Succeeded,
    /// Attempt failed
    Failed,
}

/// Record of one execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomResult {
    /// Atom the attempt belongs to
    pub atom_id: AtomId,
    /// Attempt number (1-based)
    pub attempt: u32,
    /// Outcome of the attempt
    pub outcome: AttemptOutcome,
    /// Produced output, if any
    pub output: Option<String>,
    /// Error detail, if the attempt failed
    pub error: Option<String>,
    /// Attempt duration in milliseconds
    pub duration_ms: u64,
    /// When the attempt finished
    pub recorded_at: DateTime<Utc>,
    /// Hash of the previous log entry
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

impl AtomResult {
    /// Create a successful attempt record (hashes are set on append)
    #[must_use]
    pub fn succeeded(atom_id: AtomId, attempt: u32, output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            atom_id,
            attempt,
            outcome: AttemptOutcome::Succeeded,
            output: Some(output.into()),
            error: None,
            duration_ms,
            recorded_at: Utc::now(),
            prev_hash: [0u8; 32],
            hash: [0u8; 32],
        }
    }

    /// Create a failed attempt record (hashes are set on append)
    #[must_use]
    pub fn failed(atom_id: AtomId, attempt: u32, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            atom_id,
            attempt,
            outcome: AttemptOutcome::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms,
            recorded_at: Utc::now(),
            prev_hash: [0u8; 32],
            hash: [0u8; 32],
        }
    }
}

/// Result log errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResultLogError {
    /// The hash chain does not verify
    #[error("result log integrity violation")]
    IntegrityViolation,
}

/// Append-only, hash-chained attempt history for a whole run
#[derive(Debug, Default)]
pub struct ResultLog {
    inner: Mutex<Vec<AtomResult>>,
}

impl ResultLog {
    /// Create an empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result, chaining it to the current head
    pub fn append(&self, mut result: AtomResult) -> AtomResult {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map(|r| r.hash).unwrap_or([0u8; 32]);
        result.prev_hash = prev_hash;
        result.hash = compute_hash(&result);
        guard.push(result.clone());
        result
    }

    /// Snapshot of every recorded result
    #[must_use]
    pub fn results(&self) -> Vec<AtomResult> {
        self.inner.lock().clone()
    }

    /// Attempt history of one atom, in append order
    #[must_use]
    pub fn for_atom(&self, atom_id: AtomId) -> Vec<AtomResult> {
        self.inner
            .lock()
            .iter()
            .filter(|r| r.atom_id == atom_id)
            .cloned()
            .collect()
    }

    /// Number of recorded attempts
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Hex rendering of the chain head, for audit reports
    #[must_use]
    pub fn chain_head(&self) -> Option<String> {
        self.inner.lock().last().map(|r| hex::encode(r.hash))
    }

    /// Verify the whole chain
    pub fn verify_integrity(&self) -> Result<(), ResultLogError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for r in guard.iter() {
            if r.prev_hash != prev {
                return Err(ResultLogError::IntegrityViolation);
            }
            if r.hash != compute_hash(r) {
                return Err(ResultLogError::IntegrityViolation);
            }
            prev = r.hash;
        }
        Ok(())
    }
}

fn compute_hash(result: &AtomResult) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(result.atom_id.0.to_bytes());
    hasher.update(result.attempt.to_le_bytes());
    hasher.update([matches!(result.outcome, AttemptOutcome::Succeeded) as u8]);
    hasher.update(result.output.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(result.error.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(result.duration_ms.to_le_bytes());
    hasher.update(result.recorded_at.timestamp_micros().to_le_bytes());
    hasher.update(result.prev_hash);
    hasher.finalize().into()
}
