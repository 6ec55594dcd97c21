//! JSON datagram messages exchanged between client and server
//!
//! The discipline and side travel as raw strings so that an unrecognized
//! value can still be rejected with the order id intact; typed enums would
//! fail the whole payload before the id is known.

use crate::confirmation::Confirmation;
use crate::order::OrderStatus;
use serde::{Deserialize, Serialize};

/// Inbound order datagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: u64,
    #[serde(rename = "type")]
    pub order_type: String,
    pub action: String,
    pub price: f64,
    pub quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<f64>,
}

/// Outbound confirmation datagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationMessage {
    pub order_id: u64,
    pub status: OrderStatus,
    pub filled_quantity: u64,
    pub remaining_quantity: u64,
    pub average_price: f64,
}

impl From<&Confirmation> for ConfirmationMessage {
    fn from(c: &Confirmation) -> Self {
        Self {
            order_id: c.order_id.as_u64(),
            status: c.status,
            filled_quantity: c.filled_quantity,
            remaining_quantity: c.remaining_quantity,
            average_price: c.average_price,
        }
    }
}
