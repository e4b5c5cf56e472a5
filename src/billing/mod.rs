//! Subscription tiers and feature entitlements.
//!
//! Resolves what an account may do from its plan, account type, trial window
//! and dynamic overrides, and moves the account between subscription states.
//!
//! # Example
//!
//! ```rust,no_run
//! use strefex_entitlements::billing::{
//!     AccountType, EntitlementsManager, InMemorySubscriptionStore, StoreScope,
//! };
//!
//! # async fn run() -> strefex_entitlements::Result<()> {
//! let scope = StoreScope::new("acme", "org_123")?;
//! let mut account = EntitlementsManager::builder(scope, InMemorySubscriptionStore::new())
//!     .restore(AccountType::Buyer)
//!     .await;
//!
//! if !account.has_feature("rfqManagement").await {
//!     // show upgrade prompt
//! }
//!
//! if account.apply_promo_code("STREFEX60").await? {
//!     println!("{} trial days left", account.trial_days_left());
//! }
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod clock;
pub mod entitlements;
pub mod error;
pub mod overrides;
pub mod plans;
pub mod promo;
pub mod reconcile;
pub mod storage;
pub mod subscription;
pub mod validation;

// Catalog exports
pub use plans::{
    BillingPeriod, LimitCheck, LimitKey, LimitValue, Plan, PlanBuilder, PlanCatalog,
    PlanCatalogBuilder, PlanId, PlanLimits,
};
pub use overrides::{AccountType, OverrideTables};
pub use promo::{PromoGrant, PromoTable};

// State exports
pub use subscription::{SubscriptionState, SubscriptionStatus};

// Evaluation exports
pub use entitlements::{
    AccessContext, BASELINE_FEATURES, EntitlementsManager, EntitlementsManagerBuilder, Evaluation,
    Outcome, Query, evaluate, expire_if_lapsed,
};

// Storage and reconciliation exports
pub use reconcile::{AuthoritativeSubscription, SubscriptionSource, reconcile};
pub use storage::{
    FileSubscriptionStore, InMemorySubscriptionStore, StoreScope, SubscriptionStore, open_store,
};

pub use audit::{
    BillingAuditEvent, BillingAuditLogger, DowngradeReason, NoOpAuditLogger, TracingAuditLogger,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CatalogError, PersistenceError, SourceError};
pub use validation::{normalize_promo_code, validate_account_id, validate_tenant};
