use providers::ProviderError;
use thiserror::Error;

/// Failure taxonomy for core operations. Stage failures are recorded on the
/// entity row as `(kind, message)` and surfaced to the caller; nothing is
/// retried inside the core.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error("precondition not met: {0}")]
    Precondition(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{resource} with id '{id}' not found")]
    NotFound { resource: &'static str, id: String },
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl MatchError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        MatchError::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Stable string form recorded in the entity's `last_error_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::ExternalService(_) => "external_service",
            MatchError::Precondition(_) => "precondition",
            MatchError::Validation(_) => "validation",
            MatchError::NotFound { .. } => "not_found",
            MatchError::Storage(_) => "storage",
        }
    }
}

impl From<ProviderError> for MatchError {
    fn from(err: ProviderError) -> Self {
        MatchError::ExternalService(err.to_string())
    }
}
