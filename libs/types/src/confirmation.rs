//! Per-order execution confirmations
//!
//! Every successfully dequeued order produces exactly one confirmation,
//! whatever its outcome: fills, rejections, and liquidity failures are all
//! reported through the status field rather than as errors.

use crate::ids::OrderId;
use crate::order::OrderStatus;
use std::net::SocketAddr;

/// Outcome of one processing pass, addressed back to the originator
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_quantity: u64,
    pub remaining_quantity: u64,
    /// Quantity-weighted price across fills; 0.0 when nothing traded
    pub average_price: f64,
    /// Return address copied from the inbound order
    pub reply_to: SocketAddr,
}

impl Confirmation {
    /// Build a rejection for an order that never reached the engine
    /// (unknown discipline or side at the boundary)
    pub fn rejected(order_id: OrderId, reply_to: SocketAddr) -> Self {
        Self {
            order_id,
            status: OrderStatus::Rejected,
            filled_quantity: 0,
            remaining_quantity: 0,
            average_price: 0.0,
            reply_to,
        }
    }
}
