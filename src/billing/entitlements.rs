//! Entitlements and feature gating.
//!
//! [`evaluate`] is the pure core: it takes the account's state, the catalog,
//! the caller's access context and "now", and answers one [`Query`]. When the
//! state claims a trial whose deadline has passed, the answer is computed
//! against the downgraded state and that state is handed back in
//! [`Evaluation::transition`] for the caller to adopt.
//!
//! [`EntitlementsManager`] binds one account's state to a store, a clock and
//! an audit logger, adopts transitions, and writes every change through.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::audit::{BillingAuditEvent, BillingAuditLogger, DowngradeReason, TracingAuditLogger};
use super::clock::{Clock, SystemClock};
use super::error::{PersistenceError, SourceError};
use super::overrides::AccountType;
use super::plans::{BillingPeriod, LimitCheck, LimitKey, Plan, PlanCatalog, PlanId, PlanLimits};
use super::promo::PromoTable;
use super::reconcile::{SubscriptionSource, reconcile};
use super::storage::{StoreScope, SubscriptionStore};
use super::subscription::SubscriptionState;
use crate::config::TrialConfig;

/// Features a locked account (trial expired or canceled) keeps.
pub const BASELINE_FEATURES: [LimitKey; 2] = [LimitKey::Dashboard, LimitKey::CompanyProfile];

/// Who is asking.
///
/// Supplied by the session layer; the evaluator never looks it up itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessContext {
    /// Platform superadmin. Bypasses every check.
    pub super_admin: bool,
}

impl AccessContext {
    /// A regular user session.
    #[must_use]
    pub fn user() -> Self {
        Self { super_admin: false }
    }

    #[must_use]
    pub fn super_admin() -> Self {
        Self { super_admin: true }
    }
}

/// An entitlement question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query<'a> {
    /// Is the feature with this key enabled?
    Feature(&'a str),
    /// Is the account at or above this tier level?
    Tier(u8),
    /// May one more unit of this resource be allocated, given current usage?
    Limit(&'a str, u64),
}

/// The answer to a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Granted,
    Denied,
    Limit(LimitCheck),
}

impl Outcome {
    fn from_bool(granted: bool) -> Self {
        if granted { Self::Granted } else { Self::Denied }
    }

    /// Whether the query is satisfied.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        match self {
            Self::Granted => true,
            Self::Denied => false,
            Self::Limit(check) => check.is_allowed(),
        }
    }
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Evaluation {
    pub outcome: Outcome,
    /// The state the account must move to. Set only when the trial lapsed.
    pub transition: Option<SubscriptionState>,
}

impl Evaluation {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allowed()
    }
}

/// The downgraded state, if `state` claims a trial that ended at or before `now`.
#[must_use]
pub fn expire_if_lapsed(state: &SubscriptionState, now: DateTime<Utc>) -> Option<SubscriptionState> {
    if !state.trial_lapsed(now) {
        return None;
    }
    let mut next = state.clone();
    next.downgrade();
    Some(next)
}

/// Answer `query` for `state` at `now`.
///
/// Total: unknown feature keys are denied, unknown limit keys are unlimited,
/// and unknown plans have already resolved to the free plan.
pub fn evaluate(
    state: &SubscriptionState,
    catalog: &PlanCatalog,
    access: AccessContext,
    now: DateTime<Utc>,
    query: Query<'_>,
) -> Evaluation {
    if access.super_admin {
        let outcome = match query {
            Query::Feature(_) | Query::Tier(_) => Outcome::Granted,
            Query::Limit(..) => Outcome::Limit(LimitCheck::Unlimited),
        };
        return Evaluation { outcome, transition: None };
    }

    let transition = expire_if_lapsed(state, now);
    let current = transition.as_ref().unwrap_or(state);

    let outcome = match query {
        Query::Feature(key) => Outcome::from_bool(feature_enabled(current, catalog, key)),
        Query::Tier(required) => Outcome::from_bool(tier_reached(current, catalog, required)),
        Query::Limit(key, count) => Outcome::Limit(limit_check(current, catalog, key, count)),
    };

    Evaluation { outcome, transition }
}

/// Feature decision for a state that is already current.
fn feature_enabled(state: &SubscriptionState, catalog: &PlanCatalog, key: &str) -> bool {
    if state.status.is_locked() {
        return LimitKey::parse(key).is_some_and(|k| BASELINE_FEATURES.contains(&k));
    }

    if let Some(&enabled) = state.overrides.get(key) {
        return enabled;
    }

    let Some(key) = LimitKey::parse(key) else {
        return false;
    };
    catalog
        .effective_limits(state.plan_id, state.account_type)
        .get(key)
        .is_some_and(|value| value.is_granted())
}

fn tier_reached(state: &SubscriptionState, catalog: &PlanCatalog, required: u8) -> bool {
    let level = if state.status.is_locked() {
        catalog.free_plan().tier
    } else {
        catalog.tier_level(state.plan_id)
    };
    level >= required
}

fn limit_check(state: &SubscriptionState, catalog: &PlanCatalog, key: &str, current: u64) -> LimitCheck {
    let Some(key) = LimitKey::parse(key) else {
        return LimitCheck::Unlimited;
    };
    catalog
        .effective_limits(state.plan_id, state.account_type)
        .check(key, current)
}

/// Entitlements manager for one account.
///
/// Queries take `&mut self` because a lapsed trial is downgraded on the
/// spot. The in-memory state is authoritative: transitions always apply,
/// and the returned `Result` only reports whether the write-through to the
/// store succeeded.
pub struct EntitlementsManager<S, C = SystemClock, A = TracingAuditLogger> {
    state: SubscriptionState,
    scope: StoreScope,
    catalog: Arc<PlanCatalog>,
    promos: Arc<PromoTable>,
    trial: TrialConfig,
    access: AccessContext,
    store: S,
    clock: C,
    audit: A,
}

impl<S: SubscriptionStore> EntitlementsManager<S, SystemClock, TracingAuditLogger> {
    /// Create a builder with the Strefex catalog, wall-clock time and
    /// tracing audit logs.
    pub fn builder(scope: StoreScope, store: S) -> EntitlementsManagerBuilder<S> {
        EntitlementsManagerBuilder {
            scope,
            store,
            clock: SystemClock,
            audit: TracingAuditLogger,
            catalog: Arc::new(PlanCatalog::default()),
            promos: Arc::new(PromoTable::strefex()),
            trial: TrialConfig::default(),
            access: AccessContext::default(),
        }
    }
}

impl<S, C, A> EntitlementsManager<S, C, A>
where
    S: SubscriptionStore,
    C: Clock,
    A: BillingAuditLogger,
{
    /// Create a manager around an explicit state, using the Strefex catalog
    /// and promo table.
    pub fn new(scope: StoreScope, state: SubscriptionState, store: S, clock: C, audit: A) -> Self {
        Self {
            state,
            scope,
            catalog: Arc::new(PlanCatalog::default()),
            promos: Arc::new(PromoTable::strefex()),
            trial: TrialConfig::default(),
            access: AccessContext::default(),
            store,
            clock,
            audit,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    #[must_use]
    pub fn scope(&self) -> &StoreScope {
        &self.scope
    }

    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn access(&self) -> AccessContext {
        self.access
    }

    /// Replace the access context, e.g. after the session's role changes.
    pub fn set_access(&mut self, access: AccessContext) {
        self.access = access;
    }

    // Queries

    /// Answer a query, adopting and persisting any expiry downgrade first.
    pub async fn evaluate(&mut self, query: Query<'_>) -> Outcome {
        let now = self.clock.now();
        let evaluation = evaluate(&self.state, &self.catalog, self.access, now, query);

        if let Some(next) = evaluation.transition {
            tracing::debug!(
                target: "strefex::billing",
                account_id = %self.scope.account_id(),
                "Trial lapsed, downgrading before answering"
            );
            let from_plan = self.state.plan_id;
            self.state = next;
            self.audit_downgrade(from_plan, DowngradeReason::TrialExpired).await;
            // Queries never fail; the write error is already logged.
            let _ = self.persist("expire_trial").await;
        }

        evaluation.outcome
    }

    /// Whether a feature is enabled.
    pub async fn has_feature(&mut self, feature: &str) -> bool {
        self.evaluate(Query::Feature(feature)).await.is_allowed()
    }

    /// Whether the account is at or above a tier level.
    pub async fn has_tier(&mut self, required: u8) -> bool {
        self.evaluate(Query::Tier(required)).await.is_allowed()
    }

    /// Whether one more unit may be allocated. `current` is the usage so far.
    pub async fn within_limit(&mut self, limit: &str, current: u64) -> bool {
        self.check_limit(limit, current).await.is_allowed()
    }

    /// Detailed limit check.
    pub async fn check_limit(&mut self, limit: &str, current: u64) -> LimitCheck {
        match self.evaluate(Query::Limit(limit, current)).await {
            Outcome::Limit(check) => check,
            Outcome::Granted => LimitCheck::Unlimited,
            Outcome::Denied => LimitCheck::AtLimit { current, max: 0 },
        }
    }

    /// Whether a trial is running. Read-only: never downgrades.
    #[must_use]
    pub fn is_trial(&self) -> bool {
        self.state.is_trial(self.clock.now())
    }

    /// Whole days left in the trial, rounded up.
    #[must_use]
    pub fn trial_days_left(&self) -> u32 {
        self.state.trial_days_left(self.clock.now())
    }

    /// Effective limits for the current plan and account type.
    #[must_use]
    pub fn effective_limits(&self) -> PlanLimits {
        self.catalog
            .effective_limits(self.state.plan_id, self.state.account_type)
    }

    /// Plans this account may choose from.
    #[must_use]
    pub fn available_plans(&self) -> Vec<&Plan> {
        self.catalog.plans_for_account_type(self.state.account_type)
    }

    /// List price of the current plan for the current billing period.
    #[must_use]
    pub fn current_price(&self) -> u64 {
        let plan = self.catalog.plan(self.state.plan_id);
        self.catalog.plan_price(plan, self.state.billing_period)
    }

    // Transitions

    /// Start a full-access trial on the top plan.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the trial is started regardless.
    pub async fn start_trial(&mut self) -> Result<(), PersistenceError> {
        let days = self.trial.general_trial_days;
        self.state.start_trial(self.clock.now(), days);
        self.log_transition("start_trial");
        self.audit
            .log(BillingAuditEvent::TrialStarted {
                account_id: self.account_id(),
                plan_id: self.state.plan_id.to_string(),
                days,
            })
            .await;
        self.persist("start_trial").await
    }

    /// Start a basic-plan buyer trial. `None` uses the configured buyer
    /// trial length.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the trial is started regardless.
    pub async fn start_buyer_trial(&mut self, days: Option<u32>) -> Result<(), PersistenceError> {
        let days = days.unwrap_or(self.trial.buyer_trial_days);
        self.state.start_buyer_trial(self.clock.now(), days);
        self.log_transition("start_buyer_trial");
        self.audit
            .log(BillingAuditEvent::TrialStarted {
                account_id: self.account_id(),
                plan_id: self.state.plan_id.to_string(),
                days,
            })
            .await;
        self.persist("start_buyer_trial").await
    }

    /// Extend the trial by `extra_days`.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the trial is extended regardless.
    pub async fn extend_trial(&mut self, extra_days: u32) -> Result<(), PersistenceError> {
        let now = self.clock.now();
        self.state.extend_trial(now, extra_days);
        self.log_transition("extend_trial");
        self.audit
            .log(BillingAuditEvent::TrialExtended {
                account_id: self.account_id(),
                extra_days,
                days_left: self.state.trial_days_left(now),
            })
            .await;
        self.persist("extend_trial").await
    }

    /// Redeem a promo code. `Ok(false)` means the code is unknown and nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the code is applied regardless.
    pub async fn apply_promo_code(&mut self, code: &str) -> Result<bool, PersistenceError> {
        let applied = self
            .state
            .apply_promo_code(&self.promos, code, self.clock.now());

        if !applied {
            tracing::debug!(
                target: "strefex::billing",
                account_id = %self.scope.account_id(),
                "Promo code rejected"
            );
            self.audit
                .log(BillingAuditEvent::PromoRejected {
                    account_id: self.account_id(),
                    code: code.trim().chars().take(64).collect(),
                })
                .await;
            return Ok(false);
        }

        self.log_transition("apply_promo_code");
        self.audit
            .log(BillingAuditEvent::PromoApplied {
                account_id: self.account_id(),
                code: self.state.promo_code.clone().unwrap_or_default(),
                plan_id: self.state.plan_id.to_string(),
            })
            .await;
        self.persist("apply_promo_code").await?;
        Ok(true)
    }

    /// Fall back to the account type's floor plan.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the downgrade applies regardless.
    pub async fn downgrade(&mut self) -> Result<(), PersistenceError> {
        let from_plan = self.state.plan_id;
        self.state.downgrade();
        self.log_transition("downgrade");
        self.audit_downgrade(from_plan, DowngradeReason::Requested).await;
        self.persist("downgrade").await
    }

    /// Set the plan directly, e.g. after checkout completes.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the plan is set regardless.
    pub async fn set_plan(&mut self, plan: PlanId) -> Result<(), PersistenceError> {
        let from_plan = std::mem::replace(&mut self.state.plan_id, plan);
        self.log_transition("set_plan");
        self.audit
            .log(BillingAuditEvent::PlanChanged {
                account_id: self.account_id(),
                from_plan: from_plan.to_string(),
                to_plan: plan.to_string(),
            })
            .await;
        self.persist("set_plan").await
    }

    /// # Errors
    ///
    /// Returns the write-through failure; the account type is set regardless.
    pub async fn set_account_type(&mut self, account_type: AccountType) -> Result<(), PersistenceError> {
        let from = std::mem::replace(&mut self.state.account_type, account_type);
        self.log_transition("set_account_type");
        self.audit
            .log(BillingAuditEvent::AccountTypeChanged {
                account_id: self.account_id(),
                from: from.to_string(),
                to: account_type.to_string(),
            })
            .await;
        self.persist("set_account_type").await
    }

    /// # Errors
    ///
    /// Returns the write-through failure; the period is set regardless.
    pub async fn set_billing_period(&mut self, period: BillingPeriod) -> Result<(), PersistenceError> {
        let from = std::mem::replace(&mut self.state.billing_period, period);
        self.log_transition("set_billing_period");
        self.audit
            .log(BillingAuditEvent::BillingPeriodChanged {
                account_id: self.account_id(),
                from: from.to_string(),
                to: period.to_string(),
            })
            .await;
        self.persist("set_billing_period").await
    }

    /// Replace the backend-supplied feature overrides.
    ///
    /// # Errors
    ///
    /// Returns the write-through failure; the overrides apply regardless.
    pub async fn set_overrides(&mut self, overrides: BTreeMap<String, bool>) -> Result<(), PersistenceError> {
        let count = overrides.len();
        self.state.overrides = overrides;
        self.log_transition("set_overrides");
        self.audit
            .log(BillingAuditEvent::OverridesReplaced {
                account_id: self.account_id(),
                count,
            })
            .await;
        self.persist("set_overrides").await
    }

    /// Pull the authoritative record and merge it into local state.
    ///
    /// Returns whether the local state changed. On a fetch error the local
    /// state is kept and the error is returned for the caller to log or
    /// retry. A failed write-through is logged but does not fail the sync.
    ///
    /// # Errors
    ///
    /// Returns the source's error when the record cannot be fetched.
    pub async fn reconcile_from<R>(&mut self, source: &R, domain: &str) -> Result<bool, SourceError>
    where
        R: SubscriptionSource + ?Sized,
    {
        let record = match source.fetch(self.scope.account_id(), domain).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(false),
            Err(e) => {
                tracing::warn!(
                    target: "strefex::billing",
                    account_id = %self.scope.account_id(),
                    domain = %domain,
                    error = %e,
                    "Failed to fetch authoritative subscription, keeping local state"
                );
                return Err(e);
            }
        };

        let merged = reconcile(&self.state, &record, &self.trial);
        let changed = merged != self.state;
        self.state = merged;

        self.audit
            .log(BillingAuditEvent::Reconciled {
                account_id: self.account_id(),
                plan_id: self.state.plan_id.to_string(),
                status: self.state.status.to_string(),
                changed,
            })
            .await;

        if changed {
            // Reconciliation still applies; the write error is already logged.
            let _ = self.persist("reconcile").await;
        }
        Ok(changed)
    }

    fn account_id(&self) -> String {
        self.scope.account_id().to_string()
    }

    fn log_transition(&self, operation: &'static str) {
        tracing::debug!(
            target: "strefex::billing",
            account_id = %self.scope.account_id(),
            operation,
            plan_id = %self.state.plan_id,
            status = %self.state.status,
            "Subscription state changed"
        );
    }

    async fn audit_downgrade(&self, from_plan: PlanId, reason: DowngradeReason) {
        self.audit
            .log(BillingAuditEvent::Downgraded {
                account_id: self.account_id(),
                from_plan: from_plan.to_string(),
                to_plan: self.state.plan_id.to_string(),
                reason,
            })
            .await;
    }

    async fn persist(&self, operation: &'static str) -> Result<(), PersistenceError> {
        self.store.save(&self.scope, &self.state).await.inspect_err(|e| {
            tracing::warn!(
                target: "strefex::billing",
                key = %self.scope.key(),
                operation,
                error = %e,
                retryable = e.is_retryable(),
                "Failed to persist subscription state"
            );
        })
    }
}

/// Builder for [`EntitlementsManager`].
#[must_use = "builder does nothing until you call build() or restore()"]
pub struct EntitlementsManagerBuilder<S, C = SystemClock, A = TracingAuditLogger> {
    scope: StoreScope,
    store: S,
    clock: C,
    audit: A,
    catalog: Arc<PlanCatalog>,
    promos: Arc<PromoTable>,
    trial: TrialConfig,
    access: AccessContext,
}

impl<S, C, A> EntitlementsManagerBuilder<S, C, A>
where
    S: SubscriptionStore,
    C: Clock,
    A: BillingAuditLogger,
{
    pub fn clock<C2: Clock>(self, clock: C2) -> EntitlementsManagerBuilder<S, C2, A> {
        EntitlementsManagerBuilder {
            scope: self.scope,
            store: self.store,
            clock,
            audit: self.audit,
            catalog: self.catalog,
            promos: self.promos,
            trial: self.trial,
            access: self.access,
        }
    }

    pub fn audit<A2: BillingAuditLogger>(self, audit: A2) -> EntitlementsManagerBuilder<S, C, A2> {
        EntitlementsManagerBuilder {
            scope: self.scope,
            store: self.store,
            clock: self.clock,
            audit,
            catalog: self.catalog,
            promos: self.promos,
            trial: self.trial,
            access: self.access,
        }
    }

    pub fn catalog(mut self, catalog: Arc<PlanCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn promos(mut self, promos: Arc<PromoTable>) -> Self {
        self.promos = promos;
        self
    }

    pub fn trial_config(mut self, trial: TrialConfig) -> Self {
        self.trial = trial;
        self
    }

    pub fn access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }

    /// Build around an explicit state.
    pub fn build(self, state: SubscriptionState) -> EntitlementsManager<S, C, A> {
        EntitlementsManager {
            state,
            scope: self.scope,
            catalog: self.catalog,
            promos: self.promos,
            trial: self.trial,
            access: self.access,
            store: self.store,
            clock: self.clock,
            audit: self.audit,
        }
    }

    /// Build from whatever the store holds for the scope.
    ///
    /// A missing record becomes the registration default for `account_type`,
    /// which is then written back. A record that cannot be loaded, corrupt or
    /// unreachable, restores the account type's floor with no trial and
    /// leaves the store untouched.
    pub async fn restore(self, account_type: AccountType) -> EntitlementsManager<S, C, A> {
        match self.store.load(&self.scope).await {
            Ok(Some(state)) => self.build(state),
            Ok(None) => {
                let state = SubscriptionState::registration(account_type, self.clock.now(), &self.trial);
                let manager = self.build(state);
                // The write error is already logged.
                let _ = manager.persist("restore").await;
                manager
            }
            Err(e) => {
                tracing::warn!(
                    target: "strefex::billing",
                    key = %self.scope.key(),
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to load subscription state, restoring account floor"
                );
                self.build(SubscriptionState::floor(account_type))
            }
        }
    }

    /// [`restore`](Self::restore), then reconcile against the authoritative
    /// record. A fetch failure keeps the restored state.
    pub async fn restore_from<R>(
        self,
        account_type: AccountType,
        source: &R,
        domain: &str,
    ) -> EntitlementsManager<S, C, A>
    where
        R: SubscriptionSource + ?Sized,
    {
        let mut manager = self.restore(account_type).await;
        // Fetch failures are logged by reconcile_from.
        let _ = manager.reconcile_from(source, domain).await;
        manager
    }
}
