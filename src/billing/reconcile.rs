//! Reconciliation against the authoritative subscription record.
//!
//! The backend owns `{tier, status, created_at}` per `(account_id, domain)`.
//! Local state is a projection of that record plus fields the backend does
//! not track. On restore the record wins for plan, status, and trial window.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::SourceError;
use super::overrides::AccountType;
use super::plans::PlanId;
use super::subscription::{SubscriptionState, SubscriptionStatus};
use crate::config::TrialConfig;

/// The backend's view of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeSubscription {
    /// Plan id as the backend spells it.
    pub tier: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Where authoritative records come from.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Fetch the record for an account within a domain. `Ok(None)` means the
    /// backend has no record yet.
    async fn fetch(
        &self,
        account_id: &str,
        domain: &str,
    ) -> Result<Option<AuthoritativeSubscription>, SourceError>;
}

/// Merge an authoritative record into local state.
///
/// Unknown tiers resolve to the free plan and unknown statuses to canceled,
/// so a record the client cannot read never grants more than it should.
/// While trialing, the deadline is capped at `created_at` plus the trial
/// length for the account type.
/// Account type, billing period, overrides and promo code are local-only.
#[must_use]
pub fn reconcile(
    local: &SubscriptionState,
    record: &AuthoritativeSubscription,
    trial: &TrialConfig,
) -> SubscriptionState {
    let plan_id = PlanId::parse(&record.tier).unwrap_or_else(|| {
        tracing::warn!(
            target: "strefex::billing",
            tier = %record.tier,
            "Unknown tier in authoritative record, using free plan"
        );
        PlanId::Start
    });

    let status = SubscriptionStatus::parse(&record.status).unwrap_or_else(|| {
        tracing::warn!(
            target: "strefex::billing",
            status = %record.status,
            "Unknown status in authoritative record, treating as canceled"
        );
        SubscriptionStatus::Canceled
    });

    let trial_ends_at = if status == SubscriptionStatus::Trialing {
        let days = match local.account_type {
            AccountType::Buyer => trial.buyer_trial_days,
            AccountType::Seller | AccountType::ServiceProvider => trial.general_trial_days,
        };
        // The local deadline may be earlier, never later.
        let limit = record.created_at + Duration::days(i64::from(days));
        Some(local.trial_ends_at.map_or(limit, |end| end.min(limit)))
    } else {
        None
    };

    SubscriptionState {
        plan_id,
        status,
        trial_ends_at,
        ..local.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::plans::BillingPeriod;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    fn record(tier: &str, status: &str) -> AuthoritativeSubscription {
        AuthoritativeSubscription {
            tier: tier.to_string(),
            status: status.to_string(),
            created_at: created(),
        }
    }

    #[test]
    fn test_record_wins_for_plan_and_status() {
        let mut local = SubscriptionState::new(PlanId::Enterprise, AccountType::Seller);
        local.billing_period = BillingPeriod::Annual;
        local.overrides.insert("apiAccess".to_string(), true);

        let merged = reconcile(&local, &record("standard", "past_due"), &TrialConfig::default());

        assert_eq!(merged.plan_id, PlanId::Standard);
        assert_eq!(merged.status, SubscriptionStatus::PastDue);
        assert_eq!(merged.trial_ends_at, None);
        assert_eq!(merged.billing_period, BillingPeriod::Annual);
        assert_eq!(merged.overrides.get("apiAccess"), Some(&true));
    }

    #[test]
    fn test_unknown_values_never_grant_more() {
        let local = SubscriptionState::new(PlanId::Premium, AccountType::Seller);
        let merged = reconcile(&local, &record("platinum", "paused"), &TrialConfig::default());

        assert_eq!(merged.plan_id, PlanId::Start);
        assert_eq!(merged.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn test_trialing_keeps_local_deadline() {
        let deadline = created() + Duration::days(3);
        let local = SubscriptionState {
            status: SubscriptionStatus::Trialing,
            trial_ends_at: Some(deadline),
            ..SubscriptionState::new(PlanId::Basic, AccountType::Buyer)
        };

        let merged = reconcile(&local, &record("basic", "trialing"), &TrialConfig::default());
        assert_eq!(merged.trial_ends_at, Some(deadline));
    }

    #[test]
    fn test_trialing_caps_tampered_local_deadline() {
        let local = SubscriptionState {
            status: SubscriptionStatus::Trialing,
            trial_ends_at: Some(created() + Duration::days(3650)),
            ..SubscriptionState::new(PlanId::Basic, AccountType::Buyer)
        };

        let merged = reconcile(&local, &record("basic", "trialing"), &TrialConfig::default());
        assert_eq!(merged.trial_ends_at, Some(created() + Duration::days(30)));

        let later = created() + Duration::days(90);
        assert!(!merged.is_trial(later));
        assert!(merged.trial_lapsed(later));
    }

    #[test]
    fn test_trialing_derives_deadline_from_created_at() {
        let trial = TrialConfig::default();

        let buyer = SubscriptionState::new(PlanId::Basic, AccountType::Buyer);
        let merged = reconcile(&buyer, &record("basic", "trialing"), &trial);
        assert_eq!(merged.trial_ends_at, Some(created() + Duration::days(30)));

        let seller = SubscriptionState::new(PlanId::Start, AccountType::Seller);
        let merged = reconcile(&seller, &record("enterprise", "trialing"), &trial);
        assert_eq!(merged.trial_ends_at, Some(created() + Duration::days(14)));
        assert_eq!(merged.plan_id, PlanId::Enterprise);
    }

    #[test]
    fn test_non_trialing_clears_deadline() {
        let local = SubscriptionState {
            status: SubscriptionStatus::Trialing,
            trial_ends_at: Some(created()),
            ..SubscriptionState::new(PlanId::Basic, AccountType::Buyer)
        };
        let merged = reconcile(&local, &record("basic", "active"), &TrialConfig::default());
        assert_eq!(merged.trial_ends_at, None);
        assert_eq!(merged.status, SubscriptionStatus::Active);
    }
}
