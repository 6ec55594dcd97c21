//! Matching engine
//!
//! Price-time priority matching over a dual in-memory book, fed by a
//! concurrent ingest → match → confirm pipeline.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced (better price first, FIFO within
//!   a price level, receive timestamps never refreshed)
//! - Every dequeued order yields exactly one confirmation
//! - Conservation of quantity: a trade removes the same amount from both
//!   sides, and `filled + remaining` always equals the original quantity
//! - A single book mutex makes each crossing pass atomic over both sides

pub mod book;
pub mod engine;
pub mod matching;
pub mod pipeline;
pub mod telemetry;

pub use engine::MatchingEngine;
pub use pipeline::{Pipeline, PipelineConfig};
pub use telemetry::{EngineTelemetry, TelemetrySnapshot};
