use std::time::{Duration, Instant};

/// Logs the running total since `start` and the time spent in `l_step` since the
/// previous call. Returns the new running total.
pub(crate) fn trace(l_type: &str, l_step: &str, start: Instant, prev_elapsed: Duration) -> Duration {
    let elapsed = start.elapsed();
    log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, elapsed, l_step, elapsed.saturating_sub(prev_elapsed));
    elapsed
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.
}
