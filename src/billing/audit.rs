//! Audit logging for subscription transitions.
//!
//! Every state-changing operation on an account emits one
//! [`BillingAuditEvent`]. Plug in a [`BillingAuditLogger`] to route them to
//! your compliance store; [`TracingAuditLogger`] writes them to the log.

use std::fmt;

/// Why an account was downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowngradeReason {
    /// A query found the trial deadline in the past.
    TrialExpired,
    /// The caller asked for it.
    Requested,
}

impl DowngradeReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrialExpired => "trial_expired",
            Self::Requested => "requested",
        }
    }
}

impl fmt::Display for DowngradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit event types for subscription transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAuditEvent {
    /// A trial was started.
    TrialStarted {
        account_id: String,
        plan_id: String,
        days: u32,
    },
    /// A trial was extended.
    TrialExtended {
        account_id: String,
        extra_days: u32,
        days_left: u32,
    },
    /// A promo code was redeemed.
    PromoApplied {
        account_id: String,
        code: String,
        plan_id: String,
    },
    /// A promo code did not match any grant.
    PromoRejected { account_id: String, code: String },
    /// The account fell back to its floor plan.
    Downgraded {
        account_id: String,
        from_plan: String,
        to_plan: String,
        reason: DowngradeReason,
    },
    /// The plan was set directly.
    PlanChanged {
        account_id: String,
        from_plan: String,
        to_plan: String,
    },
    /// The account type was set directly.
    AccountTypeChanged {
        account_id: String,
        from: String,
        to: String,
    },
    /// The billing period was set directly.
    BillingPeriodChanged {
        account_id: String,
        from: String,
        to: String,
    },
    /// The dynamic override map was replaced.
    OverridesReplaced { account_id: String, count: usize },
    /// Local state was reconciled against the authoritative record.
    Reconciled {
        account_id: String,
        plan_id: String,
        status: String,
        changed: bool,
    },
}

impl fmt::Display for BillingAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrialStarted { account_id, plan_id, days } => {
                write!(f, "Trial started: account={}, plan={}, days={}", account_id, plan_id, days)
            }
            Self::TrialExtended { account_id, extra_days, days_left } => {
                write!(f, "Trial extended: account={}, extra_days={}, days_left={}", account_id, extra_days, days_left)
            }
            Self::PromoApplied { account_id, code, plan_id } => {
                write!(f, "Promo applied: account={}, code={}, plan={}", account_id, code, plan_id)
            }
            Self::PromoRejected { account_id, code } => {
                write!(f, "Promo rejected: account={}, code={}", account_id, code)
            }
            Self::Downgraded { account_id, from_plan, to_plan, reason } => {
                write!(f, "Downgraded: account={}, from={}, to={}, reason={}", account_id, from_plan, to_plan, reason)
            }
            Self::PlanChanged { account_id, from_plan, to_plan } => {
                write!(f, "Plan changed: account={}, from={}, to={}", account_id, from_plan, to_plan)
            }
            Self::AccountTypeChanged { account_id, from, to } => {
                write!(f, "Account type changed: account={}, from={}, to={}", account_id, from, to)
            }
            Self::BillingPeriodChanged { account_id, from, to } => {
                write!(f, "Billing period changed: account={}, from={}, to={}", account_id, from, to)
            }
            Self::OverridesReplaced { account_id, count } => {
                write!(f, "Overrides replaced: account={}, count={}", account_id, count)
            }
            Self::Reconciled { account_id, plan_id, status, changed } => {
                write!(f, "Reconciled: account={}, plan={}, status={}, changed={}", account_id, plan_id, status, changed)
            }
        }
    }
}

/// Trait for audit logging backends.
///
/// Implement this trait to integrate with your logging system (e.g., database,
/// external service, file-based logging).
#[allow(async_fn_in_trait)]
pub trait BillingAuditLogger: Send + Sync {
    /// Log an audit event.
    ///
    /// Implementations should handle failures themselves; a transition never
    /// waits on or fails because of auditing.
    async fn log(&self, event: BillingAuditEvent);
}

/// No-op audit logger that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl BillingAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: BillingAuditEvent) {}
}

/// Tracing-based audit logger.
///
/// Logs audit events using the `tracing` crate at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl BillingAuditLogger for TracingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        tracing::info!(
            target: "billing::audit",
            event_type = %event_kind(&event),
            "{}", event
        );
    }
}

/// Get the event kind as a string for structured logging.
#[must_use]
pub fn event_kind(event: &BillingAuditEvent) -> &'static str {
    match event {
        BillingAuditEvent::TrialStarted { .. } => "trial_started",
        BillingAuditEvent::TrialExtended { .. } => "trial_extended",
        BillingAuditEvent::PromoApplied { .. } => "promo_applied",
        BillingAuditEvent::PromoRejected { .. } => "promo_rejected",
        BillingAuditEvent::Downgraded { .. } => "downgraded",
        BillingAuditEvent::PlanChanged { .. } => "plan_changed",
        BillingAuditEvent::AccountTypeChanged { .. } => "account_type_changed",
        BillingAuditEvent::BillingPeriodChanged { .. } => "billing_period_changed",
        BillingAuditEvent::OverridesReplaced { .. } => "overrides_replaced",
        BillingAuditEvent::Reconciled { .. } => "reconciled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingAuditLogger;

    #[tokio::test]
    async fn test_noop_logger() {
        let logger = NoOpAuditLogger;
        logger
            .log(BillingAuditEvent::PromoRejected {
                account_id: "org_123".to_string(),
                code: "BOGUS".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_recording_logger() {
        let logger = RecordingAuditLogger::new();

        logger
            .log(BillingAuditEvent::TrialStarted {
                account_id: "org_123".to_string(),
                plan_id: "enterprise".to_string(),
                days: 14,
            })
            .await;
        logger
            .log(BillingAuditEvent::Downgraded {
                account_id: "org_123".to_string(),
                from_plan: "enterprise".to_string(),
                to_plan: "start".to_string(),
                reason: DowngradeReason::TrialExpired,
            })
            .await;

        let events = logger.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], BillingAuditEvent::TrialStarted { .. }));
        assert!(matches!(
            events[1],
            BillingAuditEvent::Downgraded { reason: DowngradeReason::TrialExpired, .. }
        ));
    }

    #[test]
    fn test_event_display() {
        let event = BillingAuditEvent::Downgraded {
            account_id: "org_123".to_string(),
            from_plan: "basic".to_string(),
            to_plan: "basic".to_string(),
            reason: DowngradeReason::TrialExpired,
        };
        let display = event.to_string();
        assert!(display.contains("org_123"));
        assert!(display.contains("reason=trial_expired"));
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(
            event_kind(&BillingAuditEvent::OverridesReplaced {
                account_id: String::new(),
                count: 0,
            }),
            "overrides_replaced"
        );
        assert_eq!(
            event_kind(&BillingAuditEvent::PromoApplied {
                account_id: String::new(),
                code: String::new(),
                plan_id: String::new(),
            }),
            "promo_applied"
        );
    }
}
