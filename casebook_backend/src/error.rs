use thiserror::Error;

/// Failure kinds surfaced by the services. Every variant is scoped to the
/// single request that produced it.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller is not allowed to perform the operation. Not retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Input rejected before any write was attempted.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Backing store failure; the caller may retry.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Rejects blank identifiers and text fields with a descriptive message.
pub(crate) fn require_non_empty(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} may not be empty")));
    }
    Ok(())
}
