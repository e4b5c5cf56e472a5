//! Account types and account-type limit overrides.
//!
//! Buyers and service providers see the same plans as sellers but with some
//! limits patched. A patch replaces whole values key by key; it never merges
//! deeper than that.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::plans::{LimitKey, LimitValue, PlanCatalog, PlanId, PlanLimits};

/// Classification of the subscribing account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Seller,
    Buyer,
    ServiceProvider,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [
        AccountType::Seller,
        AccountType::Buyer,
        AccountType::ServiceProvider,
    ];

    /// Parse an account type. Accepts snake, kebab and camel case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "seller" => Some(Self::Seller),
            "buyer" => Some(Self::Buyer),
            "service_provider" | "service-provider" | "serviceProvider" => {
                Some(Self::ServiceProvider)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "seller",
            Self::Buyer => "buyer",
            Self::ServiceProvider => "service_provider",
        }
    }

    /// Executive summaries are a buyer-only feature.
    #[must_use]
    pub fn sees_executive_summary(&self) -> bool {
        matches!(self, Self::Buyer)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per account type, a partial limits patch for each plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTables {
    tables: BTreeMap<AccountType, BTreeMap<PlanId, PlanLimits>>,
}

impl OverrideTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patch, replacing any earlier patch for the same pair.
    pub fn insert(&mut self, account_type: AccountType, plan: PlanId, patch: PlanLimits) {
        self.tables
            .entry(account_type)
            .or_default()
            .insert(plan, patch);
    }

    #[must_use]
    pub fn patch(&self, account_type: AccountType, plan: PlanId) -> Option<&PlanLimits> {
        self.tables.get(&account_type)?.get(&plan)
    }

    /// Every (account type, plan) pair that carries a patch.
    pub fn patched_plans(&self) -> impl Iterator<Item = (AccountType, PlanId)> + '_ {
        self.tables
            .iter()
            .flat_map(|(account_type, plans)| plans.keys().map(move |plan| (*account_type, *plan)))
    }

    /// The Strefex override tables.
    #[must_use]
    pub fn strefex() -> Self {
        use LimitKey::*;
        use LimitValue::{Count, Flag, Unlimited};

        let mut tables = Self::new();

        // Buyers work across industries through RFQs rather than projects.
        tables.insert(
            AccountType::Buyer,
            PlanId::Basic,
            PlanLimits::new()
                .with(SupplierSearch, Flag(true))
                .with(MultipleIndustries, Flag(false))
                .with(MaxIndustries, Count(1))
                .with(MaxRfqsPerMonth, Count(25)),
        );
        tables.insert(
            AccountType::Buyer,
            PlanId::Standard,
            PlanLimits::new()
                .with(ExecutiveSummary, Flag(true))
                .with(MaxIndustries, Count(5))
                .with(MaxRfqsPerMonth, Count(100)),
        );
        tables.insert(
            AccountType::Buyer,
            PlanId::Premium,
            PlanLimits::new()
                .with(MaxIndustries, Unlimited)
                .with(MaxRfqsPerMonth, Unlimited),
        );
        tables.insert(
            AccountType::Buyer,
            PlanId::Enterprise,
            PlanLimits::new().with(MaxUsers, Unlimited),
        );

        let provider_quotas = [
            (PlanId::Start, Count(5)),
            (PlanId::Basic, Count(25)),
            (PlanId::Standard, Count(100)),
            (PlanId::Premium, Unlimited),
            (PlanId::Enterprise, Unlimited),
        ];
        for (plan, quota) in provider_quotas {
            tables.insert(
                AccountType::ServiceProvider,
                plan,
                PlanLimits::new()
                    .with(ServiceRequests, Flag(true))
                    .with(MaxServiceRequests, quota),
            );
        }

        tables
    }
}

impl PlanCatalog {
    /// Effective limits of a plan for an account type.
    ///
    /// Starts from the plan's own limits, merges the account type's patch for
    /// that plan over them, then hides the executive summary from every
    /// account type except buyers. Deterministic and free of side effects.
    #[must_use]
    pub fn effective_limits(&self, plan: PlanId, account_type: AccountType) -> PlanLimits {
        let plan = self.plan(plan);
        let mut limits = plan.limits.clone();

        if let Some(patch) = self.overrides.patch(account_type, plan.id) {
            limits.merge(patch);
        }

        if !account_type.sees_executive_summary() {
            limits.set(LimitKey::ExecutiveSummary, LimitValue::Flag(false));
        }

        limits
    }

    /// [`effective_limits`](Self::effective_limits) for a wire plan id.
    /// Unknown ids resolve to the free plan.
    #[must_use]
    pub fn effective_limits_by_id(&self, plan_id: &str, account_type: AccountType) -> PlanLimits {
        let plan = self.get_plan_by_id(plan_id).id;
        self.effective_limits(plan, account_type)
    }

    /// The override tables this catalog applies.
    #[must_use]
    pub fn overrides(&self) -> &OverrideTables {
        &self.overrides
    }
}
