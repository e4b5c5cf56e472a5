//! Test fixtures and doubles for subscription state.
//!
//! This module provides helpers for creating test data in a consistent way.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::billing::{
    AccountType, BillingAuditEvent, BillingAuditLogger, BillingPeriod, PersistenceError, PlanId,
    StoreScope, SubscriptionState, SubscriptionStatus, SubscriptionStore,
};

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake account id that passes validation
    pub fn account_id() -> String {
        format!("acct_{}", Uuid::new_v4().simple())
    }

    /// Generate a fake tenant
    pub fn tenant() -> String {
        format!("tenant_{}", &Uuid::new_v4().simple().to_string()[..8])
    }

    /// A fresh scope with a fake tenant and account id
    pub fn scope() -> StoreScope {
        match StoreScope::new(tenant(), account_id()) {
            Ok(scope) => scope,
            Err(e) => panic!("generated scope failed validation: {e}"),
        }
    }
}

/// Builder for subscription states in tests.
///
/// Defaults to an active, monthly subscription on the account type's
/// registration plan (basic for buyers, start for everyone else).
#[derive(Debug, Clone)]
#[must_use]
pub struct SubscriptionFixture {
    state: SubscriptionState,
}

impl SubscriptionFixture {
    pub fn new(account_type: AccountType) -> Self {
        let plan = match account_type {
            AccountType::Buyer => PlanId::Basic,
            AccountType::Seller | AccountType::ServiceProvider => PlanId::Start,
        };
        Self {
            state: SubscriptionState::new(plan, account_type),
        }
    }

    pub fn seller() -> Self {
        Self::new(AccountType::Seller)
    }

    pub fn buyer() -> Self {
        Self::new(AccountType::Buyer)
    }

    pub fn service_provider() -> Self {
        Self::new(AccountType::ServiceProvider)
    }

    pub fn plan(mut self, plan: PlanId) -> Self {
        self.state.plan_id = plan;
        self
    }

    pub fn status(mut self, status: SubscriptionStatus) -> Self {
        self.state.status = status;
        self
    }

    /// Active with no trial deadline.
    pub fn active(mut self) -> Self {
        self.state.status = SubscriptionStatus::Active;
        self.state.trial_ends_at = None;
        self
    }

    /// Trialing until `ends_at`, which may already be in the past.
    pub fn trial_ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.state.status = SubscriptionStatus::Trialing;
        self.state.trial_ends_at = Some(ends_at);
        self
    }

    pub fn billing_period(mut self, period: BillingPeriod) -> Self {
        self.state.billing_period = period;
        self
    }

    pub fn override_flag(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.state.overrides.insert(key.into(), enabled);
        self
    }

    pub fn overrides(mut self, overrides: BTreeMap<String, bool>) -> Self {
        self.state.overrides = overrides;
        self
    }

    pub fn promo_code(mut self, code: impl Into<String>) -> Self {
        self.state.promo_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn build(self) -> SubscriptionState {
        self.state
    }
}

/// Audit logger that captures events. Clones share the captured list.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLogger {
    events: Arc<Mutex<Vec<BillingAuditEvent>>>,
}

impl RecordingAuditLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<BillingAuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

impl BillingAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        self.events.lock().await.push(event);
    }
}

/// A store whose every operation fails as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSubscriptionStore;

impl FailingSubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn error() -> PersistenceError {
        PersistenceError::Unavailable {
            message: "store offline".to_string(),
        }
    }
}

#[async_trait]
impl SubscriptionStore for FailingSubscriptionStore {
    async fn load(&self, _scope: &StoreScope) -> Result<Option<SubscriptionState>, PersistenceError> {
        Err(Self::error())
    }

    async fn save(&self, _scope: &StoreScope, _state: &SubscriptionState) -> Result<(), PersistenceError> {
        Err(Self::error())
    }

    async fn remove(&self, _scope: &StoreScope) -> Result<(), PersistenceError> {
        Err(Self::error())
    }
}
