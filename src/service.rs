//! Business rules for electricity orders.
//!
//! The service owns the trading-window rules, independent of storage:
//! - window starts align forward to the next quarter-hour
//! - default windows depend on the market (DAH vs Intra-Day)
//! - an update whose window already ended is reset to `[now, now + 15m)`
//!
//! Input is expected to be validated already (see [`OrderCreate::validate`]).

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::{
    clock::{Clock, IdGenerator, SystemClock, UuidGenerator},
    errors::{OrderError, OrderResult},
    orders::{MarketType, Order, OrderCreate, OrderUpdate, ProductType},
    repository::OrderRepository,
    time::{QUARTER_HOUR_MS, align_millis, align_to_next_quarter, is_quarter_aligned, to_epoch_millis},
};

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    // serializes create/update/delete
    write_lock: Mutex<()>,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            repo,
            clock,
            ids,
            write_lock: Mutex::new(()),
        }
    }

    /// Wall clock and random uuids.
    pub fn with_system_defaults(repo: Arc<dyn OrderRepository>) -> Self {
        Self::new(repo, Arc::new(SystemClock), Arc::new(UuidGenerator))
    }

    /// Create an order, filling in and aligning its trading window.
    pub fn create(&self, input: OrderCreate) -> OrderResult<Order> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();

        let (start, end) = match (input.start, input.end) {
            (None, None) => default_window(input.market_type, now),
            (Some(start), end) => {
                let start = align_millis(start).ok_or(OrderError::InvalidTimestamp(start))?;
                (start, end_after(start, end))
            }
            // Only an end: the start still comes from the market default, and
            // the caller's end is kept when it lies after that start rather
            // than being replaced by the default end.
            (None, Some(end)) => {
                let (start, _) = default_window(input.market_type, now);
                (start, end_after(start, Some(end)))
            }
        };

        let order = Order {
            id: self.ids.next_id(),
            order_type: input.order_type,
            product_type: ProductType::Electricity,
            market_type: input.market_type,
            quantity: input.quantity,
            created: to_epoch_millis(&now),
            start,
            end,
        };
        let order = self.repo.create(order)?;
        tracing::info!(id = %order.id, start = order.start, end = order.end, "order created");
        Ok(order)
    }

    pub fn list(&self) -> OrderResult<Vec<Order>> {
        Ok(self.repo.list()?)
    }

    pub fn get(&self, id: &str) -> OrderResult<Option<Order>> {
        Ok(self.repo.get(id)?)
    }

    /// Merge `patch` into the stored order and reconcile its window.
    ///
    /// `Ok(None)` when no order has this id.
    pub fn update(&self, id: &str, patch: OrderUpdate) -> OrderResult<Option<Order>> {
        let _guard = self.write_lock.lock();
        let Some(existing) = self.repo.get(id)? else {
            return Ok(None);
        };
        let now_ms = to_epoch_millis(&self.clock.now());

        let mut start = patch.start.unwrap_or(existing.start);
        let mut end = patch.end.unwrap_or(existing.end);

        if end < now_ms {
            tracing::debug!(%id, end, now_ms, "window already ended, resetting to now");
            start = now_ms;
            end = now_ms + QUARTER_HOUR_MS;
        } else {
            // a start already on a boundary is kept as is
            if !is_quarter_aligned(start) {
                start = align_millis(start).ok_or(OrderError::InvalidTimestamp(start))?;
            }
            end = end_after(start, Some(end));
        }

        let order = Order {
            id: existing.id,
            order_type: patch.order_type.unwrap_or(existing.order_type),
            product_type: ProductType::Electricity,
            market_type: patch.market_type.or(existing.market_type),
            quantity: patch.quantity.unwrap_or(existing.quantity),
            created: existing.created,
            start,
            end,
        };
        let updated = self.repo.update(id, order)?;
        match &updated {
            Some(o) => tracing::info!(%id, start = o.start, end = o.end, "order updated"),
            None => tracing::warn!(%id, "order vanished during update"),
        }
        Ok(updated)
    }

    /// `true` if the order existed.
    pub fn delete(&self, id: &str) -> OrderResult<bool> {
        let _guard = self.write_lock.lock();
        let existed = self.repo.delete(id)?;
        if existed {
            tracing::info!(%id, "order deleted");
        }
        Ok(existed)
    }
}

/// Default `[start, end)` when the caller gave neither bound.
///
/// DAH starts on tomorrow's first quarter (00:15 UTC), everything else on the
/// next quarter after `now`. Both last one quarter-hour.
pub fn default_window(market: Option<MarketType>, now: DateTime<Utc>) -> (i64, i64) {
    let base = match market {
        Some(MarketType::Dah) => (now.date_naive() + TimeDelta::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc(),
        Some(MarketType::Intraday) | None => now,
    };
    let start = to_epoch_millis(&align_to_next_quarter(base));
    tracing::debug!(?market, start, "default window");
    (start, start + QUARTER_HOUR_MS)
}

/// `end` if it lies strictly after `start`, else one quarter-hour past it.
fn end_after(start: i64, end: Option<i64>) -> i64 {
    match end {
        Some(end) if end > start => end,
        _ => start + QUARTER_HOUR_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{FixedClock, SequentialIds},
        orders::OrderType,
        repository::InMemoryOrderRepository,
        time::from_epoch_millis,
    };
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn ms(ts: DateTime<Utc>) -> i64 {
        to_epoch_millis(&ts)
    }

    fn service_at(now: DateTime<Utc>) -> (OrderService, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(now));
        let svc = OrderService::new(
            Arc::new(InMemoryOrderRepository::new()),
            clock.clone(),
            Arc::new(SequentialIds::new("ord")),
        );
        (svc, clock)
    }

    fn intraday(quantity: f64) -> OrderCreate {
        OrderCreate::new(OrderType::Buy, Some(MarketType::Intraday), quantity)
    }

    #[test]
    fn intraday_default_window_is_next_quarter() {
        let now = utc(2024, 5, 1, 13, 36, 21);
        let (svc, _) = service_at(now);
        let order = svc.create(intraday(1.0)).unwrap();

        assert_eq!(order.id, "ord-1");
        assert_eq!(order.created, ms(now));
        assert_eq!(order.start, ms(utc(2024, 5, 1, 13, 45, 0)));
        assert_eq!(order.end - order.start, QUARTER_HOUR_MS);
        assert_eq!(order.product_type, ProductType::Electricity);
    }

    #[test]
    fn missing_market_type_behaves_like_intraday() {
        let now = utc(2024, 5, 1, 23, 52, 0);
        let (svc, _) = service_at(now);
        let order = svc
            .create(OrderCreate::new(OrderType::Sell, None, 2.0))
            .unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 2, 0, 0, 0)));
        assert_eq!(order.end, ms(utc(2024, 5, 2, 0, 15, 0)));
        assert_eq!(order.market_type, None);
    }

    #[test]
    fn dah_default_window_is_tomorrow_first_quarter() {
        for now in [
            utc(2024, 5, 1, 0, 0, 0),
            utc(2024, 5, 1, 13, 36, 0),
            utc(2024, 5, 1, 23, 59, 59),
        ] {
            let (svc, _) = service_at(now);
            let order = svc
                .create(OrderCreate::new(OrderType::Buy, Some(MarketType::Dah), 1.0))
                .unwrap();
            assert_eq!(order.start, ms(utc(2024, 5, 2, 0, 15, 0)));
            assert_eq!(order.end - order.start, QUARTER_HOUR_MS);
        }

        // month and year boundaries
        let (svc, _) = service_at(utc(2024, 12, 31, 18, 0, 0));
        let order = svc
            .create(OrderCreate::new(OrderType::Buy, Some(MarketType::Dah), 1.0))
            .unwrap();
        assert_eq!(order.start, ms(utc(2025, 1, 1, 0, 15, 0)));
    }

    #[test]
    fn start_equal_to_end_gets_a_full_quarter() {
        let now = utc(2024, 5, 1, 10, 7, 30);
        let (svc, _) = service_at(now);
        let order = svc
            .create(intraday(2.5).with_window(Some(ms(now)), Some(ms(now))))
            .unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 1, 10, 15, 0)));
        assert_eq!(order.end - order.start, QUARTER_HOUR_MS);
    }

    #[test]
    fn supplied_start_is_aligned_and_later_end_kept() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 0, 0));
        let start = ms(utc(2024, 5, 3, 9, 20, 0));
        let end = ms(utc(2024, 5, 3, 11, 0, 0));
        let order = svc
            .create(intraday(1.0).with_window(Some(start), Some(end)))
            .unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 3, 9, 30, 0)));
        assert_eq!(order.end, end);
    }

    #[test]
    fn supplied_start_on_boundary_still_moves_forward() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 0, 0));
        let start = ms(utc(2024, 5, 3, 9, 30, 0));
        let order = svc.create(intraday(1.0).with_window(Some(start), None)).unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 3, 9, 45, 0)));
        assert_eq!(order.end, ms(utc(2024, 5, 3, 10, 0, 0)));
    }

    #[test]
    fn end_overtaken_by_alignment_is_recomputed() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 0, 0));
        let start = ms(utc(2024, 5, 3, 9, 20, 0));
        let end = ms(utc(2024, 5, 3, 9, 25, 0));
        let order = svc
            .create(intraday(1.0).with_window(Some(start), Some(end)))
            .unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 3, 9, 30, 0)));
        assert_eq!(order.end, ms(utc(2024, 5, 3, 9, 45, 0)));
    }

    #[test]
    fn only_end_uses_default_start() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let far = ms(utc(2024, 5, 1, 12, 0, 0));
        let order = svc.create(intraday(1.0).with_window(None, Some(far))).unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 1, 8, 15, 0)));
        assert_eq!(order.end, far);

        let early = ms(utc(2024, 5, 1, 8, 10, 0));
        let order = svc.create(intraday(1.0).with_window(None, Some(early))).unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 1, 8, 15, 0)));
        assert_eq!(order.end, ms(utc(2024, 5, 1, 8, 30, 0)));
    }

    #[test]
    fn create_rejects_unrepresentable_start() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let err = svc
            .create(intraday(1.0).with_window(Some(i64::MAX), None))
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTimestamp(i64::MAX)));
        assert!(svc.list().unwrap().is_empty());
    }

    #[test]
    fn start_at_chrono_max_is_rejected_without_panicking() {
        let max_ms = ms(DateTime::<Utc>::MAX_UTC);
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));

        let err = svc
            .create(intraday(1.0).with_window(Some(max_ms), None))
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTimestamp(s) if s == max_ms));
        assert!(svc.list().unwrap().is_empty());

        let order = svc.create(intraday(1.0)).unwrap();
        let patch = OrderUpdate {
            start: Some(max_ms),
            end: Some(max_ms),
            ..Default::default()
        };
        let err = svc.update(&order.id, patch).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTimestamp(s) if s == max_ms));
        assert_eq!(svc.get(&order.id).unwrap(), Some(order));
    }

    #[test]
    fn ids_are_unique_across_deletes() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let a = svc.create(intraday(1.0)).unwrap();
        assert!(svc.delete(&a.id).unwrap());
        let b = svc.create(intraday(1.0)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn update_with_past_end_resets_window_to_now() {
        let t0 = utc(2024, 5, 1, 8, 5, 0);
        let (svc, clock) = service_at(t0);
        let order = svc.create(intraday(1.0)).unwrap();

        let now = t0 + TimeDelta::hours(3) + TimeDelta::seconds(7);
        clock.set(now);
        let patch = OrderUpdate {
            start: Some(ms(utc(2024, 5, 1, 20, 0, 0))),
            end: Some(ms(t0 - TimeDelta::hours(1))),
            ..Default::default()
        };
        let updated = svc.update(&order.id, patch).unwrap().unwrap();
        assert_eq!(updated.start, ms(now));
        assert_eq!(updated.end, ms(now) + QUARTER_HOUR_MS);
        assert_eq!(updated.created, order.created);
        assert_eq!(updated.id, order.id);
    }

    #[test]
    fn update_of_expired_stored_window_resets_too() {
        let t0 = utc(2024, 5, 1, 8, 5, 0);
        let (svc, clock) = service_at(t0);
        let order = svc.create(intraday(1.0)).unwrap();

        clock.advance(TimeDelta::hours(2));
        let patch = OrderUpdate {
            quantity: Some(4.0),
            ..Default::default()
        };
        let updated = svc.update(&order.id, patch).unwrap().unwrap();
        assert_eq!(updated.quantity, 4.0);
        assert_eq!(updated.start, ms(t0 + TimeDelta::hours(2)));
        assert_eq!(updated.end - updated.start, QUARTER_HOUR_MS);
    }

    #[test]
    fn update_merges_fields_and_keeps_aligned_start() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let order = svc.create(intraday(1.0)).unwrap();
        assert_eq!(order.start, ms(utc(2024, 5, 1, 8, 15, 0)));

        let patch = OrderUpdate {
            order_type: Some(OrderType::Sell),
            market_type: Some(MarketType::Dah),
            ..Default::default()
        };
        let updated = svc.update(&order.id, patch).unwrap().unwrap();
        assert_eq!(updated.order_type, OrderType::Sell);
        assert_eq!(updated.market_type, Some(MarketType::Dah));
        assert_eq!(updated.quantity, 1.0);
        assert_eq!(updated.start, order.start);
        assert_eq!(updated.end, order.end);
        assert_eq!(svc.get(&order.id).unwrap(), Some(updated));
    }

    #[test]
    fn update_with_only_end_keeps_stored_start() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let order = svc.create(intraday(1.0)).unwrap();

        let far = ms(utc(2024, 5, 4, 0, 0, 0));
        let patch = OrderUpdate {
            end: Some(far),
            ..Default::default()
        };
        let updated = svc.update(&order.id, patch).unwrap().unwrap();
        assert_eq!(updated.start, order.start);
        assert_eq!(updated.end, far);
    }

    #[test]
    fn update_aligns_unaligned_start_and_fixes_end() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let order = svc.create(intraday(1.0)).unwrap();

        let patch = OrderUpdate {
            start: Some(ms(utc(2024, 5, 1, 9, 46, 10))),
            end: Some(ms(utc(2024, 5, 1, 9, 50, 0))),
            ..Default::default()
        };
        let updated = svc.update(&order.id, patch).unwrap().unwrap();
        assert_eq!(updated.start, ms(utc(2024, 5, 1, 10, 0, 0)));
        assert_eq!(updated.end, ms(utc(2024, 5, 1, 10, 15, 0)));
    }

    #[test]
    fn update_unknown_id_creates_nothing() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        let patch = OrderUpdate {
            quantity: Some(3.0),
            ..Default::default()
        };
        assert_eq!(svc.update("missing", patch).unwrap(), None);
        assert!(svc.get("missing").unwrap().is_none());
        assert!(svc.list().unwrap().is_empty());
    }

    #[test]
    fn delete_reports_existence_once() {
        let (svc, _) = service_at(utc(2024, 5, 1, 8, 5, 0));
        assert!(!svc.delete("missing").unwrap());
        let order = svc.create(intraday(1.0)).unwrap();
        assert!(svc.delete(&order.id).unwrap());
        assert!(!svc.delete(&order.id).unwrap());
        assert!(svc.get(&order.id).unwrap().is_none());
    }

    #[test]
    fn window_invariant_holds_over_input_grid() {
        let now = utc(2024, 5, 1, 12, 7, 0);
        let (svc, clock) = service_at(now);
        let base = ms(now);
        let offsets = [-7_200_000, -60_000, 0, 1, 59_999, 900_000, 5_400_000];

        let mut created = Vec::new();
        for market in [None, Some(MarketType::Dah), Some(MarketType::Intraday)] {
            let mut windows: Vec<(Option<i64>, Option<i64>)> = vec![(None, None)];
            for s in offsets {
                windows.push((Some(base + s), None));
                windows.push((None, Some(base + s)));
                for e in offsets {
                    windows.push((Some(base + s), Some(base + e)));
                }
            }
            for (start, end) in windows {
                let input = OrderCreate::new(OrderType::Buy, market, 1.0).with_window(start, end);
                let order = svc.create(input).unwrap();
                assert!(order.end > order.start, "{order:?}");
                assert!(is_quarter_aligned(order.start), "{order:?}");
                created.push(order);
            }
        }

        clock.advance(TimeDelta::minutes(40));
        for order in created.iter().take(40) {
            for (s, e) in [(None, None), (Some(base), Some(base)), (None, Some(base + 1))] {
                let patch = OrderUpdate {
                    start: s,
                    end: e,
                    ..Default::default()
                };
                let updated = svc.update(&order.id, patch).unwrap().unwrap();
                assert!(updated.end > updated.start, "{updated:?}");
                assert!(from_epoch_millis(updated.start).is_some());
            }
        }
    }
}
