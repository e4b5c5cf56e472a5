//! Strefex entitlements - subscription tiers and feature gating
//!
//! Decides, for one account at one instant, whether a feature is enabled,
//! whether the account has reached a tier, and how much of a metered
//! resource it may still allocate.
//!
//! # Features
//!
//! - **Plan catalog**: five ordered plans with prices per billing period
//! - **Account types**: buyer and service-provider limit overrides
//! - **Trials and promo codes**: with lazy downgrade when a trial lapses
//! - **Local persistence**: in-memory and JSON-file stores
//! - **Reconciliation**: merge the backend's authoritative record on restore
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strefex_entitlements::billing::{AccountType, EntitlementsManager, StoreScope, open_store};
//! use strefex_entitlements::ConfigBuilder;
//!
//! #[tokio::main]
//! async fn main() -> strefex_entitlements::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     strefex_entitlements::init_tracing_with_config(&config);
//!
//!     let scope = StoreScope::new(&config.storage.tenant, "org_123")?;
//!     let mut account = EntitlementsManager::builder(scope, open_store(&config.storage))
//!         .trial_config(config.trial)
//!         .restore(AccountType::Seller)
//!         .await;
//!
//!     if account.within_limit("maxProjects", 2).await {
//!         // create the project
//!     }
//!     Ok(())
//! }
//! ```

pub mod billing;
mod config;
mod error;
pub mod testing;
pub mod utils;

// Re-exports for public API
pub use config::{Config, ConfigBuilder, LoggingConfig, StorageBackend, StorageConfig, TrialConfig};
pub use error::{EntitlementsError, Result};
pub use testing::{SubscriptionFixture, fake};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// Call once, early in `main`.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "strefex::billing=debug")
/// - `STREFEX_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    install(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);
    // A subscriber may already be installed, e.g. by a test harness.
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        tracing::debug!(target: "strefex::billing", error = %e, "Tracing already initialized");
    }
}
