/// Get environment variable with STREFEX_ prefix, falling back to unprefixed version
///
/// Checks `STREFEX_{key}` first, then `{key}`.
///
/// # Examples
///
/// ```rust
/// use strefex_entitlements::utils::get_env_with_prefix;
///
/// // Checks STREFEX_BUYER_TRIAL_DAYS first, then BUYER_TRIAL_DAYS
/// let days = get_env_with_prefix("BUYER_TRIAL_DAYS");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("STREFEX_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("STREFEX_ENV_TEST_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("STREFEX_ENV_TEST_VAR");
        }

        unsafe {
            std::env::set_var("ENV_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_FALLBACK_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("ENV_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_NON_EXISTENT_VAR"), None);
    }
}
