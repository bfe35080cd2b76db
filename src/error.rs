//! Crate-wide error taxonomy.
//!
//! Two outcomes that look like errors deliberately are not:
//!
//! - A collector returning `None` is *unavailability*, not failure — the
//!   source is excluded from fusion with zero weight.
//! - A gate denial is a *policy* outcome carried in
//!   [`GateDecision`](crate::privacy::GateDecision); callers branch on `ok`,
//!   they never unwind for a normal suppress/degrade decision.
//!
//! Everything here is locally recoverable except [`VibeError::Validation`],
//! which indicates a caller bug at the publish boundary.

use thiserror::Error;

/// Errors surfaced by the inference and publish path.
#[derive(Debug, Error)]
pub enum VibeError {
    /// Every signal source was excluded this cycle; the engine refuses to
    /// produce (and the pipeline refuses to publish) a meaningless vector.
    #[error("insufficient signal: all collectors unavailable")]
    InsufficientSignal,

    /// Malformed payload at the publish boundary. Rejected before any
    /// network call is made.
    #[error("validation failed for {field}: {reason}")]
    Validation {
        /// The payload field that failed validation.
        field: &'static str,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// The publisher returned a 429-class response. Not fatal — the caller
    /// backs off for `retry_after_secs` and retries.
    #[error("rate limited by publisher (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Backoff hint from the server, if one was provided.
        retry_after_secs: Option<u64>,
    },

    /// Transient network failure at the publish boundary. Retried by the
    /// caller with backoff, never silently dropped.
    #[error("network failure: {0}")]
    Network(String),

    /// A persisted queue snapshot could not be decoded.
    #[error("queue snapshot decode failed: {0}")]
    SnapshotDecode(#[from] serde_json::Error),

    /// A persisted queue snapshot was written by a newer format version.
    #[error("queue snapshot version {found} is newer than supported version {supported}")]
    SnapshotVersion {
        /// Version found in the snapshot.
        found: u16,
        /// Newest version this build understands.
        supported: u16,
    },
}

impl VibeError {
    /// `true` for failures the caller is expected to retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VibeError::RateLimited { .. } | VibeError::Network(_))
    }
}
