//! Audit errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit directory could not be created.
    #[error("failed to initialize audit logger: {0}")]
    InitializationFailed(String),

    #[error("cannot encode audit event: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("audit log I/O failed: {0}")]
    IoError(#[from] std::io::Error),
}
