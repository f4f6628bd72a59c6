//! Engine error handling
//!
//! Adapter implementations report failures as `anyhow::Error`; those are
//! folded into this typed taxonomy at the engine boundary so callers can
//! distinguish the failure modes that matter to them. No failure in this
//! crate is fatal to the process.

use thiserror::Error;

/// Engine error taxonomy surfaced to callers
#[derive(Error, Debug)]
pub enum EngineError {
    /// No identity is available; all writes are blocked.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A local store read, write, or batch failed. The in-memory view is
    /// left at its pre-mutation value for the failed operation.
    #[error("Local store failure: {0}")]
    LocalStore(String),

    /// A remote push failed after the local write succeeded. Local state
    /// is retained as the source of truth until the next snapshot.
    #[error("Remote push failed: {0}")]
    RemotePush(String),

    /// Opening the remote subscription failed; the last-known local cache
    /// stays visible.
    #[error("Remote subscription failed: {0}")]
    RemoteSubscription(String),

    /// Input rejected before any store interaction.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub(crate) fn local_store(err: anyhow::Error) -> Self {
        Self::LocalStore(format!("{err:#}"))
    }

    pub(crate) fn remote_push(err: anyhow::Error) -> Self {
        Self::RemotePush(format!("{err:#}"))
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Validation("empty name".to_string());
        assert_eq!(err.to_string(), "Validation error: empty name");

        let err = EngineError::NotAuthenticated;
        assert_eq!(err.to_string(), "Not authenticated");
    }

    #[test]
    fn test_anyhow_context_is_preserved() {
        let inner = anyhow::anyhow!("disk full").context("failed to flush");
        let err = EngineError::local_store(inner);
        let text = err.to_string();
        assert!(text.contains("failed to flush"));
        assert!(text.contains("disk full"));
    }
}
