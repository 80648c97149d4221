use std::time::Instant;

use once_cell::sync::Lazy;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic millisecond tick counter used to stamp every enqueued record.
///
/// Counts from the first call in this process and wraps at `u32::MAX`
/// (roughly 49 days), the same way a 32-bit tick count does.
pub fn tick_count() -> u32 {
    EPOCH.elapsed().as_millis() as u32
}

/// Milliseconds elapsed between two tick values, wrap-safe.
pub fn ticks_between(earlier: u32, later: u32) -> u32 {
    later.wrapping_sub(earlier)
}
