//! Error taxonomy
//!
//! Rejections and liquidity failures are confirmation statuses, not errors;
//! only resource failures that should stop a worker loop surface here.

use thiserror::Error;

/// Failures that terminate processing rather than produce a confirmation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("order book mutex poisoned")]
    BookPoisoned,

    #[error("pipeline queue closed")]
    QueueClosed,
}
