use std::time::{Duration, Instant};

/// Tracks politeness state for one origin during a run
///
/// Request slots are handed out in order: each reservation pushes the
/// origin's next allowed time forward by the delay, so concurrent workers
/// targeting the same origin stay spaced even if they reserve at once.
#[derive(Debug, Clone, Default)]
pub struct OriginState {
    /// Number of requests reserved against this origin in the current run
    pub request_count: u32,

    /// Earliest instant the next request may start (absent means now)
    pub next_allowed: Option<Instant>,
}

impl OriginState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        match self.next_allowed {
            Some(next) if next > now => Some(next - now),
            _ => None,
        }
    }

    /// Reserves the next request slot
    ///
    /// # Arguments
    ///
    /// * `now` - The current time instant
    /// * `delay` - Minimum spacing between request starts on this origin
    ///
    /// # Returns
    ///
    /// The instant at which the caller may send its request.
    pub fn reserve(&mut self, now: Instant, delay: Duration) -> Instant {
        let slot = match self.next_allowed {
            Some(next) if next > now => next,
            _ => now,
        };
        // An unrepresentable instant leaves the slot where it is
        self.next_allowed = Some(slot.checked_add(delay).unwrap_or(slot));
        self.request_count += 1;
        slot
    }

    /// Pushes the next allowed time out after a 429
    pub fn back_off(&mut self, now: Instant, wait: Duration) {
        let Some(until) = now.checked_add(wait) else {
            return;
        };
        if self.next_allowed.map_or(true, |next| next < until) {
            self.next_allowed = Some(until);
        }
    }
}
