use crate::billing::{CatalogError, PersistenceError, SourceError};

/// The main error type for the entitlement engine
///
/// Entitlement queries are total and never produce one of these. Errors come
/// from configuration, input validation, catalog construction, and the
/// storage and source adapters.
#[derive(Debug, thiserror::Error)]
pub enum EntitlementsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidInput {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid plan catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl EntitlementsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(e) => e.is_retryable(),
            Self::Source(e) => e.is_retryable(),
            Self::Config(_) | Self::InvalidInput { .. } | Self::Catalog(_) => false,
        }
    }

    /// Whether the error was caused by the caller's input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

/// Result type alias using EntitlementsError
pub type Result<T> = std::result::Result<T, EntitlementsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = EntitlementsError::InvalidInput {
            field: "account_id",
            value: "org?1".to_string(),
            reason: "account_id contains invalid characters".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid account_id 'org?1': account_id contains invalid characters"
        );
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_persistence_error() {
        let err: EntitlementsError = PersistenceError::Unavailable {
            message: "disk full".to_string(),
        }
        .into();
        assert!(matches!(err, EntitlementsError::Persistence(_)));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Storage unavailable: disk full");
    }

    #[test]
    fn test_from_source_error() {
        let err: EntitlementsError = SourceError::InvalidRecord {
            account_id: "org_1".to_string(),
            message: "missing tier".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_from_catalog_error() {
        let err: EntitlementsError = CatalogError::Empty.into();
        assert_eq!(err.to_string(), "Invalid plan catalog: Plan catalog is empty");
    }
}
