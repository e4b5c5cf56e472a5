//! Plan catalog and tier ordering.
//!
//! The catalog is a static table of plans, each carrying a tier, list prices
//! per billing period and a map of limits. Limits cover both boolean feature
//! flags (`dashboard`, `auditManagement`, ...) and numeric quotas
//! (`maxProjects`, ...).
//!
//! # Example
//!
//! ```rust
//! use strefex_entitlements::billing::{BillingPeriod, LimitKey, LimitValue, PlanCatalog, PlanId};
//!
//! let catalog = PlanCatalog::default();
//!
//! let start = catalog.get_plan_by_id("start");
//! assert_eq!(start.limits.get(LimitKey::MaxProjects), Some(LimitValue::Count(3)));
//!
//! // Unknown ids fall back to the free plan.
//! assert_eq!(catalog.get_plan_by_id("platinum").id, PlanId::Start);
//!
//! let basic = catalog.plan(PlanId::Basic);
//! assert_eq!(catalog.plan_price(basic, BillingPeriod::Annual), 49_000);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CatalogError;
use super::overrides::{AccountType, OverrideTables};

/// Identifier of a plan in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    /// Free plan.
    Start,
    Basic,
    Standard,
    Premium,
    Enterprise,
}

impl PlanId {
    /// All plan ids in ascending tier order.
    pub const ALL: [PlanId; 5] = [
        PlanId::Start,
        PlanId::Basic,
        PlanId::Standard,
        PlanId::Premium,
        PlanId::Enterprise,
    ];

    /// Parse a plan id. Matching is case-insensitive; `free` is accepted as
    /// an alias for `start`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "free" => Some(Self::Start),
            "basic" => Some(Self::Basic),
            "standard" => Some(Self::Standard),
            "premium" => Some(Self::Premium),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing period a subscription is paid for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    #[default]
    Monthly,
    Annual,
    Triennial,
}

impl BillingPeriod {
    /// Parse a billing period, defaulting to monthly for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "yearly" | "year" => Self::Annual,
            "triennial" | "3y" | "three_years" => Self::Triennial,
            _ => Self::Monthly,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
            Self::Triennial => "triennial",
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of limit keys a plan can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitKey {
    // Feature flags
    Dashboard,
    CompanyProfile,
    SupplierSearch,
    RfqManagement,
    MultipleIndustries,
    AuditManagement,
    ComplianceTracking,
    Analytics,
    ExecutiveSummary,
    ApiAccess,
    PrioritySupport,
    CustomBranding,
    TeamManagement,
    ServiceRequests,

    // Quotas
    MaxProjects,
    MaxUsers,
    MaxIndustries,
    MaxRfqsPerMonth,
    MaxDocuments,
    MaxServiceRequests,
}

impl LimitKey {
    pub const ALL: [LimitKey; 20] = [
        LimitKey::Dashboard,
        LimitKey::CompanyProfile,
        LimitKey::SupplierSearch,
        LimitKey::RfqManagement,
        LimitKey::MultipleIndustries,
        LimitKey::AuditManagement,
        LimitKey::ComplianceTracking,
        LimitKey::Analytics,
        LimitKey::ExecutiveSummary,
        LimitKey::ApiAccess,
        LimitKey::PrioritySupport,
        LimitKey::CustomBranding,
        LimitKey::TeamManagement,
        LimitKey::ServiceRequests,
        LimitKey::MaxProjects,
        LimitKey::MaxUsers,
        LimitKey::MaxIndustries,
        LimitKey::MaxRfqsPerMonth,
        LimitKey::MaxDocuments,
        LimitKey::MaxServiceRequests,
    ];

    /// Parse the wire name of a limit key (e.g. `"maxProjects"`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::CompanyProfile => "companyProfile",
            Self::SupplierSearch => "supplierSearch",
            Self::RfqManagement => "rfqManagement",
            Self::MultipleIndustries => "multipleIndustries",
            Self::AuditManagement => "auditManagement",
            Self::ComplianceTracking => "complianceTracking",
            Self::Analytics => "analytics",
            Self::ExecutiveSummary => "executiveSummary",
            Self::ApiAccess => "apiAccess",
            Self::PrioritySupport => "prioritySupport",
            Self::CustomBranding => "customBranding",
            Self::TeamManagement => "teamManagement",
            Self::ServiceRequests => "serviceRequests",
            Self::MaxProjects => "maxProjects",
            Self::MaxUsers => "maxUsers",
            Self::MaxIndustries => "maxIndustries",
            Self::MaxRfqsPerMonth => "maxRfqsPerMonth",
            Self::MaxDocuments => "maxDocuments",
            Self::MaxServiceRequests => "maxServiceRequests",
        }
    }

    /// Whether this key is a numeric quota rather than a feature flag.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            Self::MaxProjects
                | Self::MaxUsers
                | Self::MaxIndustries
                | Self::MaxRfqsPerMonth
                | Self::MaxDocuments
                | Self::MaxServiceRequests
        )
    }
}

impl fmt::Display for LimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a single limit.
///
/// Serializes as a JSON boolean, a number, or `null` for [`LimitValue::Unlimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitValue {
    Flag(bool),
    Count(u32),
    /// No finite bound. Every capacity check against it succeeds.
    Unlimited,
}

impl LimitValue {
    /// Whether the value grants the feature it names.
    ///
    /// Quotas grant when non-zero; `Unlimited` always grants.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        match self {
            Self::Flag(enabled) => *enabled,
            Self::Count(n) => *n > 0,
            Self::Unlimited => true,
        }
    }

    /// Check current usage against this value as a capacity ceiling.
    ///
    /// A disabled flag has zero capacity; an enabled flag has no bound.
    #[must_use]
    pub fn check(&self, current: u64) -> LimitCheck {
        let max = match self {
            Self::Unlimited | Self::Flag(true) => return LimitCheck::Unlimited,
            Self::Flag(false) => 0,
            Self::Count(n) => u64::from(*n),
        };

        if current < max {
            LimitCheck::WithinLimit { current, max }
        } else {
            LimitCheck::AtLimit { current, max }
        }
    }
}

/// Result of checking a resource limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LimitCheck {
    /// No limit on this resource.
    Unlimited,
    /// Usage is within the limit.
    WithinLimit { current: u64, max: u64 },
    /// Usage has reached or exceeded the limit.
    AtLimit { current: u64, max: u64 },
}

impl LimitCheck {
    /// Check if usage is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Unlimited | Self::WithinLimit { .. })
    }

    /// Check if at or over limit.
    #[must_use]
    pub fn is_at_limit(&self) -> bool {
        matches!(self, Self::AtLimit { .. })
    }
}

/// A map of limit keys to values.
///
/// Used both for a plan's full limits and for partial override patches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanLimits {
    values: BTreeMap<LimitKey, LimitValue>,
}

impl PlanLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: LimitKey) -> Option<LimitValue> {
        self.values.get(&key).copied()
    }

    pub fn set(&mut self, key: LimitKey, value: LimitValue) {
        self.values.insert(key, value);
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: LimitKey, value: LimitValue) -> Self {
        self.set(key, value);
        self
    }

    /// Overwrite every key present in `patch`. Keys absent from the patch keep
    /// their current value.
    pub fn merge(&mut self, patch: &PlanLimits) {
        self.values.extend(patch.values.iter().map(|(k, v)| (*k, *v)));
    }

    #[must_use]
    pub fn contains(&self, key: LimitKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = LimitKey> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LimitKey, LimitValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check usage of `key` against these limits. Absent keys are unlimited.
    #[must_use]
    pub fn check(&self, key: LimitKey, current: u64) -> LimitCheck {
        self.get(key)
            .map_or(LimitCheck::Unlimited, |value| value.check(current))
    }
}

impl FromIterator<(LimitKey, LimitValue)> for PlanLimits {
    fn from_iter<I: IntoIterator<Item = (LimitKey, LimitValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A single plan in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    /// Ordinal rank; 0 is the free plan.
    pub tier: u8,
    pub name: String,
    /// Monthly list price in minor units.
    pub price_cents: u64,
    /// Price for a year, when the plan is sold annually.
    pub annual_price_cents: Option<u64>,
    /// Price for three years, when the plan is sold triennially.
    pub triennial_price_cents: Option<u64>,
    /// Excluded from the buyer catalog.
    pub seller_only: bool,
    pub limits: PlanLimits,
}

impl Plan {
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

/// The plan catalog, ordered by ascending tier.
///
/// Holds the account-type override tables alongside the plans so a single
/// value describes everything limit resolution needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
    pub(crate) overrides: OverrideTables,
}

impl PlanCatalog {
    /// Create a builder for constructing a catalog.
    #[must_use]
    pub fn builder() -> PlanCatalogBuilder {
        PlanCatalogBuilder::default()
    }

    /// Get a plan by its wire id, falling back to the lowest tier plan when
    /// the id is not recognized.
    #[must_use]
    pub fn get_plan_by_id(&self, id: &str) -> &Plan {
        match PlanId::parse(id) {
            Some(plan_id) => self.plan(plan_id),
            None => self.free_plan(),
        }
    }

    /// Get a plan, falling back to the lowest tier plan when the catalog does
    /// not define it.
    #[must_use]
    pub fn plan(&self, id: PlanId) -> &Plan {
        self.plans
            .iter()
            .find(|p| p.id == id)
            .unwrap_or_else(|| self.free_plan())
    }

    /// The lowest tier plan.
    #[must_use]
    pub fn free_plan(&self) -> &Plan {
        // Non-empty and sorted, guaranteed by construction.
        &self.plans[0]
    }

    /// Plans offered to an account type, in ascending tier order.
    ///
    /// Buyers never see seller-only plans.
    #[must_use]
    pub fn plans_for_account_type(&self, account_type: AccountType) -> Vec<&Plan> {
        self.plans
            .iter()
            .filter(|p| account_type != AccountType::Buyer || !p.seller_only)
            .collect()
    }

    /// Price of a plan for a billing period.
    ///
    /// Falls back to the monthly price when the plan is not sold for the
    /// requested period. Prices are plan-level and do not vary by account type.
    #[must_use]
    pub fn plan_price(&self, plan: &Plan, period: BillingPeriod) -> u64 {
        match period {
            BillingPeriod::Triennial => plan.triennial_price_cents.unwrap_or(plan.price_cents),
            BillingPeriod::Annual => plan.annual_price_cents.unwrap_or(plan.price_cents),
            BillingPeriod::Monthly => plan.price_cents,
        }
    }

    /// Tier level of a plan.
    #[must_use]
    pub fn tier_level(&self, id: PlanId) -> u8 {
        self.plan(id).tier
    }

    /// All plans in ascending tier order.
    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Check catalog invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: tiers must be strictly ascending,
    /// discounted prices may not exceed the equivalent monthly total, and
    /// override patches may only name plans the catalog defines.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.plans.is_empty() {
            return Err(CatalogError::Empty);
        }

        for pair in self.plans.windows(2) {
            if pair[0].tier >= pair[1].tier {
                return Err(CatalogError::TierOrder {
                    lower: pair[0].id,
                    upper: pair[1].id,
                });
            }
        }

        for plan in &self.plans {
            if let Some(annual) = plan.annual_price_cents {
                if annual > plan.price_cents.saturating_mul(12) {
                    return Err(CatalogError::Pricing {
                        plan: plan.id,
                        period: BillingPeriod::Annual,
                    });
                }
            }
            if let Some(triennial) = plan.triennial_price_cents {
                if triennial > plan.price_cents.saturating_mul(36) {
                    return Err(CatalogError::Pricing {
                        plan: plan.id,
                        period: BillingPeriod::Triennial,
                    });
                }
            }
        }

        for (account_type, plan_id) in self.overrides.patched_plans() {
            if !self.plans.iter().any(|p| p.id == plan_id) {
                return Err(CatalogError::UnknownOverridePlan {
                    account_type,
                    plan: plan_id,
                });
            }
        }

        Ok(())
    }
}

impl Default for PlanCatalog {
    /// The Strefex plan catalog.
    fn default() -> Self {
        Self {
            plans: strefex_plans(),
            overrides: OverrideTables::strefex(),
        }
    }
}

/// Builder for a plan catalog.
#[derive(Debug, Default)]
#[must_use = "builder does nothing until you call build()"]
pub struct PlanCatalogBuilder {
    plans: Vec<Plan>,
    overrides: OverrideTables,
}

impl PlanCatalogBuilder {
    /// Start defining a plan.
    pub fn plan(self, id: PlanId) -> PlanBuilder {
        PlanBuilder {
            parent: self,
            plan: Plan {
                id,
                tier: 0,
                name: id.as_str().to_string(),
                price_cents: 0,
                annual_price_cents: None,
                triennial_price_cents: None,
                seller_only: false,
                limits: PlanLimits::default(),
            },
        }
    }

    /// Register an override patch for an account type.
    pub fn override_limits(mut self, account_type: AccountType, plan: PlanId, patch: PlanLimits) -> Self {
        self.overrides.insert(account_type, plan, patch);
        self
    }

    /// Build and validate the catalog. Plans are ordered by tier.
    ///
    /// # Errors
    ///
    /// See [`PlanCatalog::validate`].
    pub fn build(mut self) -> Result<PlanCatalog, CatalogError> {
        self.plans.sort_by_key(|p| p.tier);
        let catalog = PlanCatalog {
            plans: self.plans,
            overrides: self.overrides,
        };
        catalog.validate()?;
        Ok(catalog)
    }
}

/// Builder for a single plan.
#[derive(Debug)]
#[must_use = "call done() to add the plan to the catalog"]
pub struct PlanBuilder {
    parent: PlanCatalogBuilder,
    plan: Plan,
}

impl PlanBuilder {
    pub fn tier(mut self, tier: u8) -> Self {
        self.plan.tier = tier;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.plan.name = name.to_string();
        self
    }

    /// Monthly price in minor units.
    pub fn price_cents(mut self, cents: u64) -> Self {
        self.plan.price_cents = cents;
        self
    }

    pub fn annual_price_cents(mut self, cents: u64) -> Self {
        self.plan.annual_price_cents = Some(cents);
        self
    }

    pub fn triennial_price_cents(mut self, cents: u64) -> Self {
        self.plan.triennial_price_cents = Some(cents);
        self
    }

    pub fn seller_only(mut self) -> Self {
        self.plan.seller_only = true;
        self
    }

    /// Enable or disable a feature flag.
    pub fn flag(mut self, key: LimitKey, enabled: bool) -> Self {
        self.plan.limits.set(key, LimitValue::Flag(enabled));
        self
    }

    /// Enable several feature flags at once.
    pub fn features<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = LimitKey>,
    {
        for key in keys {
            self.plan.limits.set(key, LimitValue::Flag(true));
        }
        self
    }

    /// Set a finite quota.
    pub fn quota(mut self, key: LimitKey, max: u32) -> Self {
        self.plan.limits.set(key, LimitValue::Count(max));
        self
    }

    pub fn unlimited(mut self, key: LimitKey) -> Self {
        self.plan.limits.set(key, LimitValue::Unlimited);
        self
    }

    /// Finish defining this plan and return to the catalog builder.
    pub fn done(self) -> PlanCatalogBuilder {
        let mut parent = self.parent;
        parent.plans.retain(|p| p.id != self.plan.id);
        parent.plans.push(self.plan);
        parent
    }
}

fn flags(enabled: &[LimitKey], disabled: &[LimitKey]) -> PlanLimits {
    enabled
        .iter()
        .map(|k| (*k, LimitValue::Flag(true)))
        .chain(disabled.iter().map(|k| (*k, LimitValue::Flag(false))))
        .collect()
}

fn strefex_plans() -> Vec<Plan> {
    use LimitKey::*;
    use LimitValue::{Count, Unlimited};

    let start = flags(
        &[Dashboard, CompanyProfile, SupplierSearch],
        &[
            RfqManagement,
            MultipleIndustries,
            AuditManagement,
            ComplianceTracking,
            Analytics,
            ExecutiveSummary,
            ApiAccess,
            PrioritySupport,
            CustomBranding,
            TeamManagement,
            ServiceRequests,
        ],
    )
    .with(MaxProjects, Count(3))
    .with(MaxUsers, Count(1))
    .with(MaxIndustries, Count(1))
    .with(MaxRfqsPerMonth, Count(0))
    .with(MaxDocuments, Count(10))
    .with(MaxServiceRequests, Count(0));

    let mut basic = start.clone();
    basic.merge(
        &flags(&[RfqManagement, TeamManagement], &[])
            .with(MaxProjects, Count(10))
            .with(MaxUsers, Count(3))
            .with(MaxRfqsPerMonth, Count(10))
            .with(MaxDocuments, Count(100)),
    );

    let mut standard = basic.clone();
    standard.merge(
        &flags(&[MultipleIndustries, ComplianceTracking, Analytics], &[])
            .with(MaxProjects, Count(25))
            .with(MaxUsers, Count(10))
            .with(MaxIndustries, Count(3))
            .with(MaxRfqsPerMonth, Count(50))
            .with(MaxDocuments, Count(500)),
    );

    let mut premium = standard.clone();
    premium.merge(
        &flags(&[AuditManagement, ExecutiveSummary, PrioritySupport], &[])
            .with(MaxProjects, Count(100))
            .with(MaxUsers, Count(25))
            .with(MaxIndustries, Count(10))
            .with(MaxRfqsPerMonth, Unlimited)
            .with(MaxDocuments, Count(5_000)),
    );

    let mut enterprise = premium.clone();
    enterprise.merge(
        &flags(&[ApiAccess, CustomBranding], &[])
            .with(MaxProjects, Unlimited)
            .with(MaxUsers, Unlimited)
            .with(MaxIndustries, Unlimited)
            .with(MaxDocuments, Unlimited),
    );

    vec![
        Plan {
            id: PlanId::Start,
            tier: 0,
            name: "Start".to_string(),
            price_cents: 0,
            annual_price_cents: None,
            triennial_price_cents: None,
            seller_only: true,
            limits: start,
        },
        Plan {
            id: PlanId::Basic,
            tier: 1,
            name: "Basic".to_string(),
            price_cents: 4_900,
            annual_price_cents: Some(49_000),
            triennial_price_cents: Some(132_300),
            seller_only: false,
            limits: basic,
        },
        Plan {
            id: PlanId::Standard,
            tier: 2,
            name: "Standard".to_string(),
            price_cents: 9_900,
            annual_price_cents: Some(99_000),
            triennial_price_cents: Some(267_300),
            seller_only: false,
            limits: standard,
        },
        Plan {
            id: PlanId::Premium,
            tier: 3,
            name: "Premium".to_string(),
            price_cents: 19_900,
            annual_price_cents: Some(199_000),
            triennial_price_cents: Some(537_300),
            seller_only: false,
            limits: premium,
        },
        Plan {
            id: PlanId::Enterprise,
            tier: 4,
            name: "Enterprise".to_string(),
            price_cents: 39_900,
            annual_price_cents: Some(399_000),
            triennial_price_cents: None,
            seller_only: false,
            limits: enterprise,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.validate(), Ok(()));
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_every_plan_defines_every_key() {
        let catalog = PlanCatalog::default();
        for plan in catalog.iter() {
            for key in LimitKey::ALL {
                assert!(plan.limits.contains(key), "{} is missing {}", plan.id, key);
            }
        }
    }

    #[test]
    fn test_tier_ordering() {
        let catalog = PlanCatalog::default();
        let levels: Vec<u8> = PlanId::ALL.iter().map(|id| catalog.tier_level(*id)).collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
        assert!(catalog.tier_level(PlanId::Start) < catalog.tier_level(PlanId::Basic));
        assert!(catalog.tier_level(PlanId::Premium) < catalog.tier_level(PlanId::Enterprise));
    }

    #[test]
    fn test_unknown_plan_falls_back_to_free() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.get_plan_by_id("gold").id, PlanId::Start);
        assert_eq!(catalog.get_plan_by_id("").id, PlanId::Start);
        assert_eq!(catalog.get_plan_by_id("Premium").id, PlanId::Premium);
        assert_eq!(catalog.get_plan_by_id("free").id, PlanId::Start);
    }

    #[test]
    fn test_buyer_catalog_excludes_seller_only() {
        let catalog = PlanCatalog::default();

        let buyer = catalog.plans_for_account_type(AccountType::Buyer);
        assert!(buyer.iter().all(|p| !p.seller_only));
        assert_eq!(buyer[0].id, PlanId::Basic);

        let seller = catalog.plans_for_account_type(AccountType::Seller);
        assert_eq!(seller.len(), 5);
        assert_eq!(seller[0].id, PlanId::Start);

        let provider = catalog.plans_for_account_type(AccountType::ServiceProvider);
        assert_eq!(provider.len(), 5);
    }

    #[test]
    fn test_plan_price_by_period() {
        let catalog = PlanCatalog::default();

        let basic = catalog.plan(PlanId::Basic);
        assert_eq!(catalog.plan_price(basic, BillingPeriod::Monthly), 4_900);
        assert_eq!(catalog.plan_price(basic, BillingPeriod::Annual), 49_000);
        assert_eq!(catalog.plan_price(basic, BillingPeriod::Triennial), 132_300);

        // Enterprise is not sold triennially.
        let enterprise = catalog.plan(PlanId::Enterprise);
        assert_eq!(catalog.plan_price(enterprise, BillingPeriod::Triennial), 39_900);

        let start = catalog.plan(PlanId::Start);
        assert_eq!(catalog.plan_price(start, BillingPeriod::Annual), 0);
        assert!(start.is_free());
    }

    #[test]
    fn test_discounts_never_exceed_monthly_total() {
        let catalog = PlanCatalog::default();
        for plan in catalog.iter() {
            let monthly = plan.price_cents;
            assert!(catalog.plan_price(plan, BillingPeriod::Annual) <= monthly * 12);
            assert!(catalog.plan_price(plan, BillingPeriod::Triennial) <= monthly * 36);
        }
    }

    #[test]
    fn test_limit_value_check() {
        assert_eq!(LimitValue::Count(3).check(2), LimitCheck::WithinLimit { current: 2, max: 3 });
        assert_eq!(LimitValue::Count(3).check(3), LimitCheck::AtLimit { current: 3, max: 3 });
        assert_eq!(LimitValue::Unlimited.check(u64::MAX), LimitCheck::Unlimited);
        assert!(LimitValue::Flag(true).check(1_000).is_allowed());
        assert!(LimitValue::Flag(false).check(0).is_at_limit());
    }

    #[test]
    fn test_limit_value_granted() {
        assert!(LimitValue::Flag(true).is_granted());
        assert!(!LimitValue::Flag(false).is_granted());
        assert!(!LimitValue::Count(0).is_granted());
        assert!(LimitValue::Count(1).is_granted());
        assert!(LimitValue::Unlimited.is_granted());
    }

    #[test]
    fn test_limits_merge_overwrites_per_key() {
        let mut base = PlanLimits::new()
            .with(LimitKey::MaxProjects, LimitValue::Count(3))
            .with(LimitKey::Analytics, LimitValue::Flag(false));
        let patch = PlanLimits::new().with(LimitKey::MaxProjects, LimitValue::Unlimited);

        base.merge(&patch);
        assert_eq!(base.get(LimitKey::MaxProjects), Some(LimitValue::Unlimited));
        assert_eq!(base.get(LimitKey::Analytics), Some(LimitValue::Flag(false)));
    }

    #[test]
    fn test_limits_json_shape() {
        let limits = PlanLimits::new()
            .with(LimitKey::MaxProjects, LimitValue::Count(3))
            .with(LimitKey::Dashboard, LimitValue::Flag(true))
            .with(LimitKey::MaxUsers, LimitValue::Unlimited);

        let json = serde_json::to_value(&limits).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"dashboard": true, "maxProjects": 3, "maxUsers": null})
        );

        let back: PlanLimits = serde_json::from_value(json).unwrap();
        assert_eq!(back, limits);
    }

    #[test]
    fn test_limit_key_parse() {
        assert_eq!(LimitKey::parse("maxProjects"), Some(LimitKey::MaxProjects));
        assert_eq!(LimitKey::parse("executiveSummary"), Some(LimitKey::ExecutiveSummary));
        assert_eq!(LimitKey::parse("max_projects"), None);
        assert!(LimitKey::MaxDocuments.is_quota());
        assert!(!LimitKey::Dashboard.is_quota());
    }

    #[test]
    fn test_builder_orders_by_tier() {
        let catalog = PlanCatalog::builder()
            .plan(PlanId::Premium)
            .tier(2)
            .price_cents(100)
            .done()
            .plan(PlanId::Start)
            .tier(0)
            .quota(LimitKey::MaxProjects, 1)
            .done()
            .build()
            .unwrap();

        let ids: Vec<PlanId> = catalog.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PlanId::Start, PlanId::Premium]);
        // Basic is not defined here, so lookups fall back to the free plan.
        assert_eq!(catalog.plan(PlanId::Basic).id, PlanId::Start);
    }

    #[test]
    fn test_builder_rejects_invalid_catalogs() {
        assert_eq!(PlanCatalog::builder().build(), Err(CatalogError::Empty));

        let duplicate_tier = PlanCatalog::builder()
            .plan(PlanId::Start)
            .tier(1)
            .done()
            .plan(PlanId::Basic)
            .tier(1)
            .done()
            .build();
        assert!(matches!(duplicate_tier, Err(CatalogError::TierOrder { .. })));

        let overpriced = PlanCatalog::builder()
            .plan(PlanId::Basic)
            .price_cents(100)
            .annual_price_cents(1_300)
            .done()
            .build();
        assert_eq!(
            overpriced,
            Err(CatalogError::Pricing {
                plan: PlanId::Basic,
                period: BillingPeriod::Annual
            })
        );

        let orphan_override = PlanCatalog::builder()
            .plan(PlanId::Start)
            .done()
            .override_limits(AccountType::Buyer, PlanId::Basic, PlanLimits::new())
            .build();
        assert!(matches!(
            orphan_override,
            Err(CatalogError::UnknownOverridePlan { .. })
        ));
    }

    #[test]
    fn test_billing_period_parse() {
        assert_eq!(BillingPeriod::parse("annual"), BillingPeriod::Annual);
        assert_eq!(BillingPeriod::parse("yearly"), BillingPeriod::Annual);
        assert_eq!(BillingPeriod::parse("triennial"), BillingPeriod::Triennial);
        assert_eq!(BillingPeriod::parse("weekly"), BillingPeriod::Monthly);
        assert_eq!(BillingPeriod::Triennial.as_str(), "triennial");
    }
}
