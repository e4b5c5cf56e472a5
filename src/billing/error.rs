//! Billing-specific error types.
//!
//! The entitlement queries themselves never fail. Errors only arise at the
//! edges: building a catalog, writing state to local storage, and fetching
//! the authoritative subscription record.

use std::fmt;

use super::overrides::AccountType;
use super::plans::{BillingPeriod, PlanId};

/// A catalog that violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog defines no plans.
    Empty,
    /// Two adjacent plans are not in strictly ascending tier order.
    TierOrder { lower: PlanId, upper: PlanId },
    /// A discounted price exceeds the equivalent monthly total.
    Pricing { plan: PlanId, period: BillingPeriod },
    /// An override patch names a plan the catalog does not define.
    UnknownOverridePlan { account_type: AccountType, plan: PlanId },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Plan catalog is empty"),
            Self::TierOrder { lower, upper } => {
                write!(f, "Plan '{}' must have a lower tier than '{}'", lower, upper)
            }
            Self::Pricing { plan, period } => {
                write!(f, "Plan '{}' {} price exceeds the monthly equivalent", plan, period)
            }
            Self::UnknownOverridePlan { account_type, plan } => {
                write!(f, "Override for {} references unknown plan '{}'", account_type, plan)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Failure writing or reading subscription state in local storage.
///
/// The in-memory state stays authoritative when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The underlying storage could not be read or written.
    Io { key: String, message: String },
    /// State could not be serialized.
    Serialization { message: String },
    /// A stored document exists but cannot be decoded.
    Corrupt { key: String, message: String },
    /// The store is not reachable at all.
    Unavailable { message: String },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { key, message } => write!(f, "Storage I/O error for '{}': {}", key, message),
            Self::Serialization { message } => {
                write!(f, "Failed to serialize subscription state: {}", message)
            }
            Self::Corrupt { key, message } => {
                write!(f, "Stored subscription '{}' is corrupt: {}", key, message)
            }
            Self::Unavailable { message } => write!(f, "Storage unavailable: {}", message),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl PersistenceError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Unavailable { .. })
    }
}

/// Failure fetching the authoritative subscription record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached.
    Unavailable { message: String },
    /// The source returned a record that cannot be interpreted.
    InvalidRecord { account_id: String, message: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { message } => {
                write!(f, "Subscription source unavailable: {}", message)
            }
            Self::InvalidRecord { account_id, message } => {
                write!(f, "Invalid subscription record for '{}': {}", account_id, message)
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Whether retrying the same fetch may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatalogError::TierOrder {
            lower: PlanId::Basic,
            upper: PlanId::Start,
        };
        assert_eq!(err.to_string(), "Plan 'basic' must have a lower tier than 'start'");

        let err = PersistenceError::Corrupt {
            key: "acme:org_1:subscription".to_string(),
            message: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Stored subscription 'acme:org_1:subscription' is corrupt: expected value"
        );
    }

    #[test]
    fn test_error_classification() {
        let err = PersistenceError::Unavailable {
            message: "disk detached".to_string(),
        };
        assert!(err.is_retryable());

        let err = PersistenceError::Serialization {
            message: "bad".to_string(),
        };
        assert!(!err.is_retryable());

        let err = SourceError::InvalidRecord {
            account_id: "org_1".to_string(),
            message: "missing tier".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(SourceError::Unavailable { message: String::new() }.is_retryable());
    }
}
