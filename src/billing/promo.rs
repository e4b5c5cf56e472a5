//! Promo codes.
//!
//! A promo code maps to a grant: an optional trial length and an optional
//! plan. Codes are matched after trimming and uppercasing.

use std::collections::HashMap;

use super::plans::PlanId;
use super::validation::normalize_promo_code;

/// What redeeming a promo code grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoGrant {
    /// Trial length in days. `None` leaves the trial deadline and status alone.
    pub trial_days: Option<u32>,
    /// Plan to switch to. `None` keeps the current plan.
    pub plan: Option<PlanId>,
}

impl PromoGrant {
    #[must_use]
    pub fn trial(days: u32, plan: PlanId) -> Self {
        Self {
            trial_days: Some(days),
            plan: Some(plan),
        }
    }

    /// Whether redeeming this grant starts a trial.
    #[must_use]
    pub fn grants_trial(&self) -> bool {
        self.trial_days.is_some()
    }
}

/// The promo codes a deployment honours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromoTable {
    grants: HashMap<String, PromoGrant>,
}

impl PromoTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The Strefex promo codes.
    #[must_use]
    pub fn strefex() -> Self {
        Self::new()
            .with("STREFEX30", PromoGrant::trial(30, PlanId::Basic))
            .with("STREFEX60", PromoGrant::trial(60, PlanId::Basic))
            .with("STREFEXPRO", PromoGrant::trial(14, PlanId::Premium))
            .with(
                "EXTEND7",
                PromoGrant {
                    trial_days: Some(7),
                    plan: None,
                },
            )
            .with(
                "FOUNDINGMEMBER",
                PromoGrant {
                    trial_days: None,
                    plan: Some(PlanId::Standard),
                },
            )
    }

    /// Add a code. The code is normalized before insertion.
    #[must_use]
    pub fn with(mut self, code: &str, grant: PromoGrant) -> Self {
        self.grants.insert(normalize_promo_code(code), grant);
        self
    }

    /// Look up a code, returning the normalized code with its grant.
    #[must_use]
    pub fn resolve(&self, code: &str) -> Option<(String, PromoGrant)> {
        let normalized = normalize_promo_code(code);
        self.grants
            .get(&normalized)
            .map(|grant| (normalized, *grant))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_normalizes() {
        let table = PromoTable::strefex();
        let (code, grant) = table.resolve("  strefex30 ").unwrap();
        assert_eq!(code, "STREFEX30");
        assert_eq!(grant, PromoGrant::trial(30, PlanId::Basic));
    }

    #[test]
    fn test_resolve_unknown() {
        let table = PromoTable::strefex();
        assert!(table.resolve("BOGUS").is_none());
        assert!(table.resolve("").is_none());
    }

    #[test]
    fn test_partial_grants() {
        let table = PromoTable::strefex();

        let (_, extend) = table.resolve("extend7").unwrap();
        assert!(extend.grants_trial());
        assert_eq!(extend.plan, None);

        let (_, founding) = table.resolve("FoundingMember").unwrap();
        assert!(!founding.grants_trial());
        assert_eq!(founding.plan, Some(PlanId::Standard));
    }
}
