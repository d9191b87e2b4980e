use chrono::{TimeDelta, TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use electricity_orders::clock::{FixedClock, SequentialIds};
use electricity_orders::orders::{MarketType, OrderCreate, OrderType};
use electricity_orders::repository::InMemoryOrderRepository;
use electricity_orders::service::OrderService;
use electricity_orders::time::align_to_next_quarter;
use std::hint::black_box;
use std::sync::Arc;

fn bench_align(c: &mut Criterion) {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let stamps: Vec<_> = (0..1_440).map(|m| base + TimeDelta::minutes(m)).collect();
    c.bench_function("align a day of minutes", |b| {
        b.iter(|| {
            for ts in &stamps {
                black_box(align_to_next_quarter(black_box(*ts)));
            }
        })
    });
}

fn bench_create(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 13, 36, 0).unwrap();
    let svc = OrderService::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(FixedClock::new(now)),
        Arc::new(SequentialIds::new("bench")),
    );
    c.bench_function("create intraday order", |b| {
        b.iter(|| {
            let input = OrderCreate::new(OrderType::Buy, Some(MarketType::Intraday), 1.0);
            black_box(svc.create(input).unwrap());
        })
    });
}

criterion_group!(benches, bench_align, bench_create);
criterion_main!(benches);
