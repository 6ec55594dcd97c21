//! Datagram codec
//!
//! Decodes inbound JSON order datagrams into engine order records, stamping
//! the receive timestamp and return address, and encodes confirmations for
//! the trip back. An unrecognized discipline or side keeps the order id, so
//! the sender still gets a rejection it can correlate.

use std::net::SocketAddr;
use thiserror::Error;
use types::clock;
use types::confirmation::Confirmation;
use types::ids::OrderId;
use types::order::Order;
use types::wire::{ConfirmationMessage, OrderRequest};

/// Failures decoding an inbound datagram
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed order payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("order {order_id}: unknown order type {value:?}")]
    UnknownType { order_id: u64, value: String },

    #[error("order {order_id}: unknown side {value:?}")]
    UnknownSide { order_id: u64, value: String },
}

impl DecodeError {
    /// Rejection confirmation for errors where the order id survived
    /// decoding; malformed payloads have nothing to correlate with.
    pub fn rejection(&self, reply_to: SocketAddr) -> Option<Confirmation> {
        match self {
            DecodeError::Malformed(_) => None,
            DecodeError::UnknownType { order_id, .. }
            | DecodeError::UnknownSide { order_id, .. } => {
                Some(Confirmation::rejected(OrderId::new(*order_id), reply_to))
            }
        }
    }
}

/// Decode one datagram into an order, stamping receive time and sender
pub fn decode_order(payload: &[u8], reply_to: SocketAddr) -> Result<Order, DecodeError> {
    let request: OrderRequest = serde_json::from_slice(payload)?;
    let recv_timestamp_ns = clock::monotonic_ns();

    let order_type = request
        .order_type
        .parse()
        .map_err(|_| DecodeError::UnknownType {
            order_id: request.order_id,
            value: request.order_type.clone(),
        })?;
    let side = request.action.parse().map_err(|_| DecodeError::UnknownSide {
        order_id: request.order_id,
        value: request.action.clone(),
    })?;

    let mut order = Order::new(
        OrderId::new(request.order_id),
        order_type,
        side,
        request.price,
        request.quantity,
        recv_timestamp_ns,
        reply_to,
    );
    if let Some(stop_price) = request.stop_price {
        order.stop_price = stop_price;
    }
    Ok(order)
}

/// Encode a confirmation for the wire
pub fn encode_confirmation(confirmation: &Confirmation) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&ConfirmationMessage::from(confirmation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::order::{OrderStatus, OrderType, Side};

    fn from_addr() -> SocketAddr {
        "10.0.0.7:41000".parse().unwrap()
    }

    #[test]
    fn test_decode_limit_order() {
        let payload =
            br#"{"order_id":1,"type":"limit","action":"buy","price":50.0,"quantity":100}"#;
        let order = decode_order(payload, from_addr()).unwrap();

        assert_eq!(order.order_id, OrderId::new(1));
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, 50.0);
        assert_eq!(order.quantity, 100);
        assert_eq!(order.remaining_quantity, 100);
        assert_eq!(order.reply_to, from_addr());
        assert!(order.recv_timestamp_ns > 0);
    }

    #[test]
    fn test_decode_stop_order_carries_stop_price() {
        let payload = br#"{"order_id":21,"type":"stop-loss","action":"buy","price":0.0,"quantity":30,"stop_price":101.0}"#;
        let order = decode_order(payload, from_addr()).unwrap();

        assert_eq!(order.order_type, OrderType::StopLoss);
        assert_eq!(order.stop_price, 101.0);
    }

    #[test]
    fn test_unknown_type_rejects_with_id() {
        let payload =
            br#"{"order_id":9,"type":"iceberg","action":"buy","price":50.0,"quantity":10}"#;
        let err = decode_order(payload, from_addr()).unwrap_err();

        let rejection = err.rejection(from_addr()).unwrap();
        assert_eq!(rejection.order_id, OrderId::new(9));
        assert_eq!(rejection.status, OrderStatus::Rejected);
    }

    #[test]
    fn test_unknown_side_rejects_with_id() {
        let payload =
            br#"{"order_id":10,"type":"limit","action":"hold","price":50.0,"quantity":10}"#;
        let err = decode_order(payload, from_addr()).unwrap_err();

        assert!(matches!(err, DecodeError::UnknownSide { order_id: 10, .. }));
        assert!(err.rejection(from_addr()).is_some());
    }

    #[test]
    fn test_malformed_payload_has_no_rejection() {
        let err = decode_order(b"not json", from_addr()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.rejection(from_addr()).is_none());
    }

    #[test]
    fn test_encode_confirmation() {
        let confirmation = Confirmation {
            order_id: OrderId::new(2),
            status: OrderStatus::Executed,
            filled_quantity: 50,
            remaining_quantity: 0,
            average_price: 50.0,
            reply_to: from_addr(),
        };

        let bytes = encode_confirmation(&confirmation).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"order_id\":2"));
        assert!(text.contains("\"status\":\"executed\""));
    }
}
