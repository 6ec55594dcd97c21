//! Crossing detection logic
//!
//! Determines when an aggressor can trade against a resting price. The
//! comparisons here are strict on the arithmetic price; only the book's
//! FIFO tie-break uses the tolerance equivalence.

use types::order::{Order, OrderType, Side};

/// Effective price used by the matching comparator
///
/// Market orders cross any opposite price: +inf for buys, 0 for sells.
/// Every other discipline matches at its limit price.
pub fn effective_price(order: &Order) -> f64 {
    match (order.order_type, order.side) {
        (OrderType::Market, Side::Buy) => f64::INFINITY,
        (OrderType::Market, Side::Sell) => 0.0,
        _ => order.price,
    }
}

/// Check if a buy at `effective` crosses a resting ask price
pub fn buy_crosses(effective: f64, ask_price: f64) -> bool {
    !(effective < ask_price)
}

/// Check if a sell at `effective` crosses a resting bid price
pub fn sell_crosses(effective: f64, bid_price: f64) -> bool {
    !(bid_price < effective)
}
