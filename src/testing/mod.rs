//! Testing utilities for code built on the entitlement engine
//!
//! This module provides:
//! - A fluent builder for subscription states
//! - Fake identifiers that pass validation
//! - An audit logger that records events and a store that always fails
//!
//! Pair these with [`FixedClock`](crate::billing::FixedClock) to drive trial
//! deadlines deterministically.
//!
//! # Example
//!
//! ```rust
//! use strefex_entitlements::billing::{PlanId, SubscriptionStatus};
//! use strefex_entitlements::testing::SubscriptionFixture;
//!
//! let state = SubscriptionFixture::seller().plan(PlanId::Premium).build();
//! assert_eq!(state.status, SubscriptionStatus::Active);
//! ```

mod fixtures;

pub use fixtures::{FailingSubscriptionStore, RecordingAuditLogger, SubscriptionFixture, fake};
