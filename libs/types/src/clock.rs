//! Process-wide monotonic clock
//!
//! Receive timestamps and latency samples both come from this clock, so
//! `now - recv` is always meaningful. Readings are nanoseconds since the
//! first call in the process; wall-clock time never leaks in, so the value
//! cannot jump backwards.

use std::sync::OnceLock;
use std::time::Instant;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Current monotonic reading in nanoseconds
pub fn monotonic_ns() -> u64 {
    let anchor = ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as u64
}
