//! Subscription state and its transitions.
//!
//! [`SubscriptionState`] is the per-account record the evaluator reads. The
//! transition methods here are plain in-memory mutations that take "now" as
//! an argument; writing the result through to storage is the job of
//! [`EntitlementsManager`](super::entitlements::EntitlementsManager).
//!
//! ```text
//!              start_trial / start_buyer_trial / promo
//!   active ─────────────────────────────────────────────► trialing
//!     ▲                                                      │
//!     │ downgrade (seller, service provider)                 │ deadline passes
//!     └──────────────────────────────────────────────────────┤
//!                                                            ▼
//!                                    downgrade (buyer) ► trial_expired
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::overrides::AccountType;
use super::plans::{BillingPeriod, PlanId};
use super::promo::PromoTable;
use crate::config::TrialConfig;

const SECONDS_PER_DAY: i64 = 86_400;

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active and paid (or on the free plan).
    Active,
    /// Subscription is in a trial period.
    Trialing,
    /// Payment failed, subscription still usable.
    PastDue,
    /// Subscription has been canceled.
    Canceled,
    /// A trial ran out and nothing replaced it.
    TrialExpired,
}

impl SubscriptionStatus {
    #[must_use]
    pub fn parse(status: &str) -> Option<Self> {
        match status.trim() {
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trialing),
            "past_due" => Some(Self::PastDue),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "trial_expired" => Some(Self::TrialExpired),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::TrialExpired => "trial_expired",
        }
    }

    /// Whether the status restricts the account to baseline features,
    /// regardless of plan.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::TrialExpired | Self::Canceled)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account's subscription.
///
/// Serialized as camelCase JSON for local persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    /// Unknown plan ids resolve to the free plan.
    #[serde(deserialize_with = "plan_or_free")]
    pub plan_id: PlanId,
    pub account_type: AccountType,
    pub status: SubscriptionStatus,
    /// Set whenever `status` is trialing.
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub billing_period: BillingPeriod,
    /// Backend-supplied feature flags. They win over plan-derived values.
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
    /// Last promo code redeemed, normalized.
    #[serde(default)]
    pub promo_code: Option<String>,
}

impl SubscriptionState {
    /// An active, monthly subscription with no trial or overrides.
    #[must_use]
    pub fn new(plan_id: PlanId, account_type: AccountType) -> Self {
        Self {
            plan_id,
            account_type,
            status: SubscriptionStatus::Active,
            trial_ends_at: None,
            billing_period: BillingPeriod::Monthly,
            overrides: BTreeMap::new(),
            promo_code: None,
        }
    }

    /// The state an account starts with at registration.
    ///
    /// Buyers get an automatic trial of the basic plan; everyone else starts
    /// active on the free plan.
    #[must_use]
    pub fn registration(account_type: AccountType, now: DateTime<Utc>, trial: &TrialConfig) -> Self {
        match account_type {
            AccountType::Buyer => {
                let mut state = Self::new(PlanId::Basic, AccountType::Buyer);
                state.start_buyer_trial(now, trial.buyer_trial_days);
                state
            }
            other => Self::new(PlanId::Start, other),
        }
    }

    /// The account type's floor, with no trial.
    ///
    /// Used when a stored record exists but cannot be read, so nothing is
    /// granted that the record might not allow.
    #[must_use]
    pub fn floor(account_type: AccountType) -> Self {
        let mut state = Self::new(PlanId::Start, account_type);
        state.downgrade();
        state
    }

    /// Whether a trial is running at `now`. Read-only: never downgrades.
    #[must_use]
    pub fn is_trial(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_ends_at.is_some_and(|end| end > now)
    }

    /// Whole days left in the trial, rounded up. Zero when not trialing.
    #[must_use]
    pub fn trial_days_left(&self, now: DateTime<Utc>) -> u32 {
        if !self.is_trial(now) {
            return 0;
        }
        let Some(end) = self.trial_ends_at else {
            return 0;
        };

        let seconds = (end - now).num_seconds().max(0);
        let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Whether the state claims a trial that is no longer running.
    ///
    /// A trialing state without a deadline counts as lapsed.
    #[must_use]
    pub fn trial_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_ends_at.is_none_or(|end| end <= now)
    }

    /// Full-access trial on the top plan.
    pub fn start_trial(&mut self, now: DateTime<Utc>, days: u32) {
        self.plan_id = PlanId::Enterprise;
        self.status = SubscriptionStatus::Trialing;
        self.trial_ends_at = Some(now + days_to_duration(days));
    }

    /// Basic-plan trial for buyers. Converts the account to a buyer.
    pub fn start_buyer_trial(&mut self, now: DateTime<Utc>, days: u32) {
        self.plan_id = PlanId::Basic;
        self.account_type = AccountType::Buyer;
        self.status = SubscriptionStatus::Trialing;
        self.trial_ends_at = Some(now + days_to_duration(days));
    }

    /// Extend the trial by `extra_days`.
    ///
    /// Counts from the current deadline while it is still ahead, otherwise
    /// from now.
    pub fn extend_trial(&mut self, now: DateTime<Utc>, extra_days: u32) {
        let base = match self.trial_ends_at {
            Some(end) if end > now => end,
            _ => now,
        };
        self.trial_ends_at = Some(base + days_to_duration(extra_days));
        self.status = SubscriptionStatus::Trialing;
    }

    /// Redeem a promo code.
    ///
    /// Returns `false` and leaves the state untouched when the code is not in
    /// the table.
    pub fn apply_promo_code(&mut self, promos: &PromoTable, code: &str, now: DateTime<Utc>) -> bool {
        let Some((normalized, grant)) = promos.resolve(code) else {
            return false;
        };

        if let Some(plan) = grant.plan {
            self.plan_id = plan;
        }
        if let Some(days) = grant.trial_days {
            self.trial_ends_at = Some(now + days_to_duration(days));
            self.status = SubscriptionStatus::Trialing;
        }
        self.promo_code = Some(normalized);
        true
    }

    /// Fall back to the account type's floor.
    ///
    /// Buyers land on basic with `trial_expired`; everyone else lands on the
    /// free plan, active. Trial, overrides and promo are cleared and billing
    /// returns to monthly.
    pub fn downgrade(&mut self) {
        match self.account_type {
            AccountType::Buyer => {
                self.plan_id = PlanId::Basic;
                self.status = SubscriptionStatus::TrialExpired;
            }
            AccountType::Seller | AccountType::ServiceProvider => {
                self.plan_id = PlanId::Start;
                self.status = SubscriptionStatus::Active;
            }
        }
        self.trial_ends_at = None;
        self.overrides.clear();
        self.promo_code = None;
        self.billing_period = BillingPeriod::Monthly;
    }
}

fn plan_or_free<'de, D>(deserializer: D) -> Result<PlanId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(PlanId::parse(&raw).unwrap_or(PlanId::Start))
}

fn days_to_duration(days: u32) -> Duration {
    Duration::days(i64::from(days))
}
