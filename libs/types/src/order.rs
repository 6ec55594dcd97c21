//! Order lifecycle types
//!
//! The order record carries an immutable identity (id, discipline, side,
//! prices, original quantity) plus the mutable execution state the matching
//! engine drives (remaining quantity, status).

use crate::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Error returned when a wire string is not a recognized side
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown side")]
pub struct ParseSideError;

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(ParseSideError),
        }
    }
}

/// Order discipline: how the order interacts with the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Execute immediately at best available prices, never rest
    Market,
    /// Execute at the limit price or better; remainder rests on the book
    Limit,
    /// Cancel request; confirmed without touching the book
    Cancel,
    /// Converts to market or limit once the stop price is reached
    #[serde(rename = "stop-loss")]
    StopLoss,
    /// Immediate-or-cancel: match what is possible now, cancel the rest
    Ioc,
    /// Fill-or-kill: execute the full quantity immediately or not at all
    Fok,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Cancel => "cancel",
            OrderType::StopLoss => "stop-loss",
            OrderType::Ioc => "ioc",
            OrderType::Fok => "fok",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a wire string is not a recognized discipline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order type")]
pub struct ParseOrderTypeError;

impl FromStr for OrderType {
    type Err = ParseOrderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            "cancel" => Ok(OrderType::Cancel),
            "stop-loss" => Ok(OrderType::StopLoss),
            "ioc" => Ok(OrderType::Ioc),
            "fok" => Ok(OrderType::Fok),
            _ => Err(ParseOrderTypeError),
        }
    }
}

/// Order status after (or during) a processing pass
///
/// `Open` and `PartiallyFilled` are the only non-terminal states, and only
/// for limit orders resting on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Resting on the book, nothing traded yet
    Open,
    /// Fully filled (terminal)
    Executed,
    /// Some quantity traded; terminal for the aggressor's pass, non-terminal
    /// for a resting order
    PartiallyFilled,
    /// Cancelled (terminal)
    Cancelled,
    /// Failed validation, or a market order that found no liquidity (terminal)
    Rejected,
    /// Immediate-or-cancel order that traded nothing (terminal)
    IocNoFill,
    /// Fill-or-kill order that could not be filled in full (terminal)
    FokNoFill,
}

impl OrderStatus {
    /// Check if the status is terminal for a resting order
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Open => "open",
            OrderStatus::Executed => "executed",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::IocNoFill => "ioc_no_fill",
            OrderStatus::FokNoFill => "fok_no_fill",
        };
        write!(f, "{s}")
    }
}

/// Complete order record
///
/// Stamped with a monotonic receive timestamp and the sender's return
/// address at the ingest boundary. `remaining_quantity` starts equal to
/// `quantity` and only ever decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub order_type: OrderType,
    pub side: Side,
    /// Limit price; ignored for market orders
    pub price: f64,
    /// Trigger price; meaningful only for stop-loss orders
    pub stop_price: f64,
    pub quantity: u64,
    pub remaining_quantity: u64,
    pub status: OrderStatus,
    /// Monotonic nanoseconds stamped when the datagram was received
    pub recv_timestamp_ns: u64,
    /// Return address for the confirmation
    pub reply_to: SocketAddr,
}

impl Order {
    /// Create a new order awaiting processing
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        order_type: OrderType,
        side: Side,
        price: f64,
        quantity: u64,
        recv_timestamp_ns: u64,
        reply_to: SocketAddr,
    ) -> Self {
        Self {
            order_id,
            order_type,
            side,
            price,
            stop_price: 0.0,
            quantity,
            remaining_quantity: quantity,
            status: OrderStatus::Open,
            recv_timestamp_ns,
            reply_to,
        }
    }

    /// Set the stop trigger price (stop-loss orders)
    pub fn with_stop_price(mut self, stop_price: f64) -> Self {
        self.stop_price = stop_price;
        self
    }

    /// Quantity filled so far
    pub fn filled_quantity(&self) -> u64 {
        self.quantity - self.remaining_quantity
    }

    /// Check the quantity invariant: filled + remaining = total
    pub fn check_invariant(&self) -> bool {
        self.remaining_quantity <= self.quantity
    }

    /// Check if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Apply a fill, decrementing the remainder and advancing the status
    ///
    /// # Panics
    /// Panics if the fill is zero or exceeds the remaining quantity; both
    /// indicate a matching bug, not an input error.
    pub fn fill(&mut self, traded: u64) {
        assert!(traded > 0, "fill of zero quantity");
        assert!(
            traded <= self.remaining_quantity,
            "fill would exceed remaining quantity"
        );

        self.remaining_quantity -= traded;
        self.status = if self.remaining_quantity == 0 {
            OrderStatus::Executed
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}
