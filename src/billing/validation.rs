//! Input validation for storage scopes and promo codes.
//!
//! Account ids and tenants end up inside storage keys and file names, so
//! they are restricted to a conservative character set.

use crate::error::{EntitlementsError, Result};

/// Maximum length for account ids and tenants.
const MAX_ID_LENGTH: usize = 256;

/// Maximum length accepted for a promo code before lookup.
const MAX_PROMO_CODE_LENGTH: usize = 64;

/// Validate an account id.
///
/// Account ids must:
/// - Not be empty
/// - Not exceed 256 characters
/// - Contain only alphanumeric characters, underscores, and hyphens
///
/// # Errors
///
/// Returns `EntitlementsError::InvalidInput` if validation fails.
pub fn validate_account_id(id: &str) -> Result<()> {
    validate_identifier("account_id", id)
}

/// Validate a tenant scope. Same rules as [`validate_account_id`].
///
/// # Errors
///
/// Returns `EntitlementsError::InvalidInput` if validation fails.
pub fn validate_tenant(tenant: &str) -> Result<()> {
    validate_identifier("tenant", tenant)
}

fn validate_identifier(field: &'static str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EntitlementsError::InvalidInput {
            field,
            value: String::new(),
            reason: format!("{} cannot be empty", field),
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(EntitlementsError::InvalidInput {
            field,
            value: truncate_for_error(id),
            reason: format!("{} exceeds maximum length of {}", field, MAX_ID_LENGTH),
        });
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(EntitlementsError::InvalidInput {
            field,
            value: sanitize_for_error(id),
            reason: format!(
                "{} contains invalid characters (only alphanumeric, underscore, and hyphen allowed)",
                field
            ),
        });
    }

    Ok(())
}

/// Normalize a promo code for lookup: trim surrounding whitespace and
/// uppercase. Overlong input is cut so it can never match a real code.
#[must_use]
pub fn normalize_promo_code(code: &str) -> String {
    code.trim()
        .chars()
        .take(MAX_PROMO_CODE_LENGTH + 1)
        .collect::<String>()
        .to_uppercase()
}

/// Truncate a string for error messages.
fn truncate_for_error(s: &str) -> String {
    if s.chars().count() <= 50 {
        s.to_string()
    } else {
        let head: String = s.chars().take(47).collect();
        format!("{}...", head)
    }
}

/// Sanitize a string for error messages to prevent log injection.
fn sanitize_for_error(s: &str) -> String {
    let sanitized: String = s
        .chars()
        .take(50)
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '?' })
        .collect();

    if s.chars().count() > 50 {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account_id_valid() {
        assert!(validate_account_id("org_123").is_ok());
        assert!(validate_account_id("user-456").is_ok());
        assert!(validate_account_id("ABC123").is_ok());
        assert!(validate_account_id("a").is_ok());
    }

    #[test]
    fn test_validate_account_id_empty() {
        assert!(validate_account_id("").is_err());
        assert!(validate_tenant("").is_err());
    }

    #[test]
    fn test_validate_account_id_too_long() {
        let long_id = "a".repeat(300);
        let err = validate_account_id(&long_id).unwrap_err();
        match err {
            EntitlementsError::InvalidInput { field, value, .. } => {
                assert_eq!(field, "account_id");
                assert_eq!(value.len(), 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_account_id_invalid_chars() {
        assert!(validate_account_id("org<script>").is_err());
        assert!(validate_account_id("org 123").is_err());
        assert!(validate_account_id("../etc/passwd").is_err());
        assert!(validate_account_id("org\n123").is_err());
        assert!(validate_tenant("acme:prod").is_err());
    }

    #[test]
    fn test_sanitize_for_error() {
        assert_eq!(sanitize_for_error("org<x>"), "org?x?");
    }

    #[test]
    fn test_normalize_promo_code() {
        assert_eq!(normalize_promo_code("  strefex30\n"), "STREFEX30");
        assert_eq!(normalize_promo_code("Extend7"), "EXTEND7");
        assert_eq!(normalize_promo_code(""), "");
        assert_eq!(normalize_promo_code(&"x".repeat(500)).len(), MAX_PROMO_CODE_LENGTH + 1);
    }
}
