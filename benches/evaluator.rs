use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use strefex_entitlements::billing::{
    AccessContext, AccountType, EntitlementsManager, FixedClock, InMemorySubscriptionStore,
    NoOpAuditLogger, PlanCatalog, PlanId, Query, evaluate,
};
use strefex_entitlements::testing::{SubscriptionFixture, fake};

fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let catalog = PlanCatalog::default();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let active = SubscriptionFixture::buyer().plan(PlanId::Standard).build();
    let lapsed = SubscriptionFixture::buyer()
        .trial_ends_at(now - Duration::days(1))
        .build();

    group.bench_function("feature", |b| {
        b.iter(|| {
            evaluate(
                black_box(&active),
                &catalog,
                AccessContext::user(),
                now,
                Query::Feature(black_box("executiveSummary")),
            )
        });
    });

    group.bench_function("limit", |b| {
        b.iter(|| {
            evaluate(
                black_box(&active),
                &catalog,
                AccessContext::user(),
                now,
                Query::Limit(black_box("maxRfqsPerMonth"), 42),
            )
        });
    });

    group.bench_function("feature_with_expiry", |b| {
        b.iter(|| {
            evaluate(
                black_box(&lapsed),
                &catalog,
                AccessContext::user(),
                now,
                Query::Feature(black_box("rfqManagement")),
            )
        });
    });

    group.finish();
}

fn benchmark_effective_limits(c: &mut Criterion) {
    let catalog = PlanCatalog::default();

    c.bench_function("effective_limits", |b| {
        b.iter(|| catalog.effective_limits(black_box(PlanId::Premium), black_box(AccountType::ServiceProvider)));
    });
}

fn benchmark_manager(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut account = EntitlementsManager::new(
        fake::scope(),
        SubscriptionFixture::seller().plan(PlanId::Premium).build(),
        InMemorySubscriptionStore::new(),
        FixedClock::new(now),
        NoOpAuditLogger,
    );

    c.bench_function("manager_has_feature", |b| {
        b.iter(|| rt.block_on(account.has_feature(black_box("analytics"))));
    });
}

criterion_group!(benches, benchmark_evaluate, benchmark_effective_limits, benchmark_manager);
criterion_main!(benches);
