//! Matching engine core
//!
//! Per-discipline dispatch and the crossing algorithm. A single mutex over
//! the dual book gives each processing pass atomic, serialized access to
//! both sides; stop-loss conversion, fill-or-kill feasibility, and the
//! subsequent crossing all run under one guard.

use std::sync::{Arc, Mutex};
use tracing::debug;
use types::clock;
use types::confirmation::Confirmation;
use types::errors::EngineError;
use types::order::{Order, OrderStatus, OrderType, Side};

use crate::book::Book;
use crate::matching::crossing;
use crate::matching::executor::{build_confirmation, FillRecorder};
use crate::telemetry::EngineTelemetry;

/// Price-time priority matching engine for a single instrument
pub struct MatchingEngine {
    book: Mutex<Book>,
    telemetry: Arc<EngineTelemetry>,
}

/// Depth view of both sides, best levels first
#[derive(Debug, Clone, PartialEq)]
pub struct BookSnapshot {
    pub bids: Vec<(f64, u64)>,
    pub asks: Vec<(f64, u64)>,
}

impl MatchingEngine {
    /// Create an engine with an empty book
    pub fn new() -> Self {
        Self {
            book: Mutex::new(Book::new()),
            telemetry: Arc::new(EngineTelemetry::new()),
        }
    }

    /// Process one order to completion and build its confirmation
    ///
    /// Every outcome is a confirmation; `Err` is reserved for resource
    /// failure (a poisoned book lock), on which the calling worker should
    /// exit its loop.
    pub fn process(&self, order: &mut Order) -> Result<Confirmation, EngineError> {
        let mut fills = FillRecorder::new();

        if order.order_type == OrderType::Cancel {
            // ID-based removal is not performed; cancels are confirmed
            // without touching the book, including for unknown ids.
            order.status = OrderStatus::Cancelled;
        } else {
            let mut book = self.book.lock().map_err(|_| EngineError::BookPoisoned)?;
            match order.order_type {
                OrderType::StopLoss => {
                    Self::convert_stop(&book, order);
                    Self::match_market_limit(&mut book, order, &mut fills);
                }
                OrderType::Market | OrderType::Limit => {
                    Self::match_market_limit(&mut book, order, &mut fills);
                }
                OrderType::Ioc => Self::match_ioc(&mut book, order, &mut fills),
                OrderType::Fok => Self::match_fok(&mut book, order, &mut fills),
                OrderType::Cancel => unreachable!("cancel handled without the lock"),
            }
        }

        let latency_ns = clock::monotonic_ns().saturating_sub(order.recv_timestamp_ns);
        self.telemetry.record(latency_ns);

        Ok(build_confirmation(order, &fills))
    }

    /// Shared telemetry counters
    pub fn telemetry(&self) -> Arc<EngineTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Best bid price
    pub fn best_bid(&self) -> Result<Option<f64>, EngineError> {
        let book = self.book.lock().map_err(|_| EngineError::BookPoisoned)?;
        Ok(book.best_bid())
    }

    /// Best ask price
    pub fn best_ask(&self) -> Result<Option<f64>, EngineError> {
        let book = self.book.lock().map_err(|_| EngineError::BookPoisoned)?;
        Ok(book.best_ask())
    }

    /// Depth snapshot of both sides (top `depth` levels each)
    pub fn depth_snapshot(&self, depth: usize) -> Result<BookSnapshot, EngineError> {
        let book = self.book.lock().map_err(|_| EngineError::BookPoisoned)?;
        Ok(BookSnapshot {
            bids: book.bids.depth_snapshot(depth),
            asks: book.asks.depth_snapshot(depth),
        })
    }

    /// Resting order counts as (bids, asks)
    pub fn resting_orders(&self) -> Result<(usize, usize), EngineError> {
        let book = self.book.lock().map_err(|_| EngineError::BookPoisoned)?;
        Ok((book.bids.order_count(), book.asks.order_count()))
    }

    /// Rewrite a stop order into the discipline it triggers as
    ///
    /// Buy stops trigger when the best ask has fallen to the stop price or
    /// through it; sell stops when the best bid has risen to it. Untriggered
    /// stops become limit orders at the stop price. Runs under the same
    /// guard as the execution that follows, so the observed top cannot move
    /// in between.
    fn convert_stop(book: &Book, order: &mut Order) {
        match order.side {
            Side::Buy => {
                let best_ask = book.best_ask().unwrap_or(f64::INFINITY);
                if best_ask <= order.stop_price {
                    order.order_type = OrderType::Market;
                } else {
                    order.order_type = OrderType::Limit;
                    order.price = order.stop_price;
                }
            }
            Side::Sell => {
                let best_bid = book.best_bid().unwrap_or(0.0);
                if best_bid >= order.stop_price {
                    order.order_type = OrderType::Market;
                } else {
                    order.order_type = OrderType::Limit;
                    order.price = order.stop_price;
                }
            }
        }
        debug!(
            order_id = %order.order_id,
            triggered_as = %order.order_type,
            stop_price = order.stop_price,
            "stop order converted"
        );
    }

    /// Market/limit path: cross, then rest or finalize the remainder
    fn match_market_limit(book: &mut Book, order: &mut Order, fills: &mut FillRecorder) {
        Self::cross(book, order, fills);

        if order.remaining_quantity == 0 {
            order.status = OrderStatus::Executed;
        } else if order.order_type == OrderType::Limit {
            order.status = if fills.any() {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::Open
            };
            book.rest(order.clone());
        } else {
            // Market remainders never rest.
            order.status = if fills.any() {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::Rejected
            };
        }
    }

    /// Immediate-or-cancel: one crossing pass, remainder cancelled
    fn match_ioc(book: &mut Book, order: &mut Order, fills: &mut FillRecorder) {
        Self::cross(book, order, fills);

        order.status = if fills.quantity() == order.quantity {
            OrderStatus::Executed
        } else if fills.any() {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::IocNoFill
        };
        order.remaining_quantity = 0;
    }

    /// Fill-or-kill: feasibility scan, then all-or-nothing execution
    ///
    /// The scan and the crossing share one lock acquisition, so the
    /// liquidity it observed cannot be taken in between.
    fn match_fok(book: &mut Book, order: &mut Order, fills: &mut FillRecorder) {
        let limit = crossing::effective_price(order);
        let needed = order.remaining_quantity;
        let available = match order.side {
            Side::Buy => book.asks.fillable_quantity(limit, needed),
            Side::Sell => book.bids.fillable_quantity(limit, needed),
        };

        if available >= needed {
            Self::cross(book, order, fills);
            debug_assert_eq!(
                order.remaining_quantity, 0,
                "feasible fill-or-kill must consume its full quantity"
            );
            order.status = OrderStatus::Executed;
        } else {
            order.status = OrderStatus::FokNoFill;
        }
    }

    /// Crossing loop: trade against the opposite side's best levels while
    /// the effective price crosses and quantity remains
    ///
    /// Trades execute at the resting price. Resting remainders are
    /// decremented in place at the front of their level, keeping their
    /// original time priority.
    fn cross(book: &mut Book, taker: &mut Order, fills: &mut FillRecorder) {
        let effective = crossing::effective_price(taker);

        match taker.side {
            Side::Buy => {
                while taker.remaining_quantity > 0 {
                    let Some((ask_price, _)) = book.asks.best() else {
                        break;
                    };
                    if !crossing::buy_crosses(effective, ask_price) {
                        break;
                    }
                    let maker_remaining = book
                        .asks
                        .front_order()
                        .expect("non-empty side has a front order")
                        .remaining_quantity;
                    let traded = taker.remaining_quantity.min(maker_remaining);
                    book.asks.fill_best(traded);
                    taker.fill(traded);
                    fills.record(traded, ask_price);
                }
            }
            Side::Sell => {
                while taker.remaining_quantity > 0 {
                    let Some((bid_price, _)) = book.bids.best() else {
                        break;
                    };
                    if !crossing::sell_crosses(effective, bid_price) {
                        break;
                    }
                    let maker_remaining = book
                        .bids
                        .front_order()
                        .expect("non-empty side has a front order")
                        .remaining_quantity;
                    let traded = taker.remaining_quantity.min(maker_remaining);
                    book.bids.fill_best(traded);
                    taker.fill(traded);
                    fills.record(traded, bid_price);
                }
            }
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use types::ids::OrderId;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn order(id: u64, order_type: OrderType, side: Side, price: f64, qty: u64) -> Order {
        // Receive timestamps follow the id so FIFO expectations are explicit.
        Order::new(OrderId::new(id), order_type, side, price, qty, id, addr())
    }

    fn process(engine: &MatchingEngine, mut o: Order) -> Confirmation {
        engine.process(&mut o).unwrap()
    }

    #[test]
    fn test_limit_buy_rests_on_empty_book() {
        let engine = MatchingEngine::new();

        let c = process(&engine, order(1, OrderType::Limit, Side::Buy, 50.0, 100));

        assert_eq!(c.status, OrderStatus::Open);
        assert_eq!(c.filled_quantity, 0);
        assert_eq!(c.remaining_quantity, 100);
        assert_eq!(c.average_price, 0.0);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.bids, vec![(50.0, 100)]);
        assert!(snap.asks.is_empty());
        assert_eq!(engine.best_bid().unwrap(), Some(50.0));
        assert_eq!(engine.best_ask().unwrap(), None);
    }

    #[test]
    fn test_crossing_sell_fills_at_resting_price() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Buy, 50.0, 100));

        // Sell at 49 against the resting 50 bid: price improvement to the
        // aggressor, trade executes at 50.
        let c = process(&engine, order(2, OrderType::Limit, Side::Sell, 49.0, 50));

        assert_eq!(c.status, OrderStatus::Executed);
        assert_eq!(c.filled_quantity, 50);
        assert_eq!(c.remaining_quantity, 0);
        assert_eq!(c.average_price, 50.0);

        // The resting bid is partially filled and keeps its place.
        let book = engine.book.lock().unwrap();
        let front = book.bids.front_order().unwrap();
        assert_eq!(front.order_id, OrderId::new(1));
        assert_eq!(front.remaining_quantity, 50);
        assert_eq!(front.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_market_buy_fills_against_best_ask() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 51.0, 100));

        let c = process(&engine, order(11, OrderType::Market, Side::Buy, 0.0, 50));

        assert_eq!(c.status, OrderStatus::Executed);
        assert_eq!(c.filled_quantity, 50);
        assert_eq!(c.average_price, 51.0);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.asks, vec![(51.0, 50)]);
    }

    #[test]
    fn test_market_remainder_never_rests() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 10));

        let c = process(&engine, order(2, OrderType::Market, Side::Buy, 0.0, 30));

        assert_eq!(c.status, OrderStatus::PartiallyFilled);
        assert_eq!(c.filled_quantity, 10);
        assert_eq!(c.remaining_quantity, 20);

        let (bids, asks) = engine.resting_orders().unwrap();
        assert_eq!((bids, asks), (0, 0));
    }

    #[test]
    fn test_market_no_liquidity_is_rejected() {
        let engine = MatchingEngine::new();

        let c = process(&engine, order(1, OrderType::Market, Side::Buy, 0.0, 30));

        assert_eq!(c.status, OrderStatus::Rejected);
        assert_eq!(c.filled_quantity, 0);
        assert_eq!(c.remaining_quantity, 30);
    }

    #[test]
    fn test_limit_partial_fill_rests_remainder() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 40));

        let c = process(&engine, order(2, OrderType::Limit, Side::Buy, 50.0, 100));

        assert_eq!(c.status, OrderStatus::PartiallyFilled);
        assert_eq!(c.filled_quantity, 40);
        assert_eq!(c.remaining_quantity, 60);
        assert_eq!(c.average_price, 50.0);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.bids, vec![(50.0, 60)]);
        assert!(snap.asks.is_empty());
    }

    #[test]
    fn test_same_price_fifo_priority() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 100.0, 50));
        process(&engine, order(2, OrderType::Limit, Side::Sell, 100.0, 40));

        // Crossing buy consumes order 1 fully, then part of order 2.
        let c = process(&engine, order(10, OrderType::Limit, Side::Buy, 100.0, 70));
        assert_eq!(c.filled_quantity, 70);

        let book = engine.book.lock().unwrap();
        let front = book.asks.front_order().unwrap();
        assert_eq!(front.order_id, OrderId::new(2));
        assert_eq!(front.remaining_quantity, 20);
    }

    #[test]
    fn test_cancel_confirms_without_touching_book() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Buy, 50.0, 100));

        let before = engine.depth_snapshot(10).unwrap();
        let c = process(&engine, order(99, OrderType::Cancel, Side::Buy, 0.0, 10));

        assert_eq!(c.status, OrderStatus::Cancelled);
        assert_eq!(c.filled_quantity, 0);
        assert_eq!(engine.depth_snapshot(10).unwrap(), before);

        // Cancels for absent ids are idempotent on the book.
        let c2 = process(&engine, order(99, OrderType::Cancel, Side::Buy, 0.0, 10));
        assert_eq!(c2.status, OrderStatus::Cancelled);
        assert_eq!(engine.depth_snapshot(10).unwrap(), before);
    }

    #[test]
    fn test_stop_buy_triggers_as_market() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 100.0, 50));

        // Best ask 100 <= stop 101: triggers immediately as a market buy.
        let stop = order(21, OrderType::StopLoss, Side::Buy, 0.0, 30).with_stop_price(101.0);
        let c = process(&engine, stop);

        assert_eq!(c.status, OrderStatus::Executed);
        assert_eq!(c.filled_quantity, 30);
        assert_eq!(c.average_price, 100.0);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.asks, vec![(100.0, 20)]);
    }

    #[test]
    fn test_stop_buy_untriggered_rests_as_limit_at_stop() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 100.0, 50));

        // Best ask 100 > stop 99: becomes a limit buy at the stop price.
        let stop = order(22, OrderType::StopLoss, Side::Buy, 0.0, 30).with_stop_price(99.0);
        let c = process(&engine, stop);

        assert_eq!(c.status, OrderStatus::Open);
        assert_eq!(c.filled_quantity, 0);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.bids, vec![(99.0, 30)]);
        assert_eq!(snap.asks, vec![(100.0, 50)]);
    }

    #[test]
    fn test_stop_sell_triggers_against_bid() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Buy, 100.0, 50));

        // Best bid 100 >= stop 99: triggers as a market sell.
        let stop = order(23, OrderType::StopLoss, Side::Sell, 0.0, 20).with_stop_price(99.0);
        let c = process(&engine, stop);

        assert_eq!(c.status, OrderStatus::Executed);
        assert_eq!(c.average_price, 100.0);
    }

    #[test]
    fn test_ioc_no_cross_reports_no_fill() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 10));

        let c = process(&engine, order(31, OrderType::Ioc, Side::Buy, 49.0, 5));

        assert_eq!(c.status, OrderStatus::IocNoFill);
        assert_eq!(c.filled_quantity, 0);
        assert_eq!(c.remaining_quantity, 0);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.asks, vec![(50.0, 10)]);
    }

    #[test]
    fn test_ioc_partial_fill_cancels_remainder() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 10));

        let c = process(&engine, order(32, OrderType::Ioc, Side::Buy, 50.0, 20));

        assert_eq!(c.status, OrderStatus::PartiallyFilled);
        assert_eq!(c.filled_quantity, 10);
        assert_eq!(c.remaining_quantity, 0);
        assert_eq!(c.average_price, 50.0);

        // Nothing rested on either side.
        assert_eq!(engine.resting_orders().unwrap(), (0, 0));
    }

    #[test]
    fn test_ioc_full_fill_is_executed() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 30));

        let c = process(&engine, order(33, OrderType::Ioc, Side::Buy, 50.0, 20));

        assert_eq!(c.status, OrderStatus::Executed);
        assert_eq!(c.filled_quantity, 20);
    }

    #[test]
    fn test_fok_insufficient_liquidity_leaves_book_untouched() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 10));

        let before = engine.depth_snapshot(10).unwrap();
        let c = process(&engine, order(41, OrderType::Fok, Side::Buy, 50.0, 20));

        assert_eq!(c.status, OrderStatus::FokNoFill);
        assert_eq!(c.filled_quantity, 0);
        assert_eq!(c.remaining_quantity, 20);
        assert_eq!(engine.depth_snapshot(10).unwrap(), before);

        // Processing the same kill twice is idempotent and yields an
        // identical confirmation.
        let c2 = process(&engine, order(41, OrderType::Fok, Side::Buy, 50.0, 20));
        assert_eq!(c2, c);
        assert_eq!(engine.depth_snapshot(10).unwrap(), before);
    }

    #[test]
    fn test_fok_feasible_executes_across_levels() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 10));
        process(&engine, order(2, OrderType::Limit, Side::Sell, 51.0, 20));

        let c = process(&engine, order(42, OrderType::Fok, Side::Buy, 51.0, 25));

        assert_eq!(c.status, OrderStatus::Executed);
        assert_eq!(c.filled_quantity, 25);
        assert_eq!(c.remaining_quantity, 0);
        // (10*50 + 15*51) / 25
        assert!((c.average_price - 50.6).abs() < 1e-9);

        let snap = engine.depth_snapshot(10).unwrap();
        assert_eq!(snap.asks, vec![(51.0, 5)]);
    }

    #[test]
    fn test_fok_ignores_levels_beyond_limit() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 10));
        process(&engine, order(2, OrderType::Limit, Side::Sell, 52.0, 20));

        // Liquidity at or under 51 is only 10; the 52 level must not count.
        let c = process(&engine, order(43, OrderType::Fok, Side::Buy, 51.0, 15));

        assert_eq!(c.status, OrderStatus::FokNoFill);
        assert_eq!(engine.depth_snapshot(10).unwrap().asks, vec![(50.0, 10), (52.0, 20)]);
    }

    #[test]
    fn test_quantity_conservation_through_crossing() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 100));

        let c = process(&engine, order(2, OrderType::Limit, Side::Buy, 50.0, 60));

        assert_eq!(c.filled_quantity + c.remaining_quantity, 60);
        let book = engine.book.lock().unwrap();
        assert_eq!(book.asks.total_quantity(), 40);
        assert_eq!(c.filled_quantity + book.asks.total_quantity(), 100);
    }

    #[test]
    fn test_resting_orders_stay_within_bounds() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Sell, 50.0, 100));
        process(&engine, order(2, OrderType::Limit, Side::Buy, 50.0, 60));

        let book = engine.book.lock().unwrap();
        let front = book.asks.front_order().unwrap();
        assert!(front.remaining_quantity > 0);
        assert!(front.remaining_quantity <= front.quantity);
        assert!(!front.status.is_terminal());
    }

    #[test]
    fn test_telemetry_counts_every_pass() {
        let engine = MatchingEngine::new();
        process(&engine, order(1, OrderType::Limit, Side::Buy, 50.0, 10));
        process(&engine, order(2, OrderType::Cancel, Side::Buy, 0.0, 0));
        process(&engine, order(3, OrderType::Market, Side::Sell, 0.0, 5));

        let snap = engine.telemetry().snapshot();
        assert_eq!(snap.orders_processed, 3);
        assert!(snap.min_latency_ns <= snap.avg_latency_ns());
        assert!(snap.avg_latency_ns() <= snap.max_latency_ns);
    }
}
