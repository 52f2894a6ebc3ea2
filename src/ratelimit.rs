// Copyright (C) 2026 the project contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-client rate limiting (§4.2, §4.3, §5).
//!
//! Two shapes are needed: a simple minimum-inter-request-interval limiter
//! for the Library Client, and the fuller per-minute-budget/burst/backoff
//! limiter for the Catalog Client. Both hold their state behind a mutex so
//! concurrent callers serialize on the wait, not on the whole client.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum inter-request interval, enforced per process (§4.2).
pub struct IntervalLimiter {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(interval_seconds.max(0.0)),
            last_request: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

/// The Catalog Client's rate limiter: a per-minute request budget, a burst
/// counter that triggers a sleep equal to the current backoff, and an
/// exponential backoff on 429 that decays toward baseline after a quiet
/// minute. Exact algorithm per SPEC_FULL.md §4.3.
pub struct CatalogRateLimiter {
    rate_limit_interval: Duration,
    requests_per_minute: f64,
    burst_size: u32,
    backoff_multiplier: f64,
    max_backoff: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    last_request_time: Option<Instant>,
    minute_start: Instant,
    requests_this_minute: f64,
    burst_counter: u32,
    current_backoff: Duration,
}

impl CatalogRateLimiter {
    pub fn new(
        rate_limit_interval_seconds: f64,
        requests_per_minute: f64,
        burst_size: u32,
        backoff_multiplier: f64,
        max_backoff_seconds: f64,
    ) -> Self {
        let rate_limit_interval = Duration::from_secs_f64(rate_limit_interval_seconds.max(0.0));
        Self {
            rate_limit_interval,
            requests_per_minute,
            burst_size,
            backoff_multiplier,
            max_backoff: Duration::from_secs_f64(max_backoff_seconds.max(0.0)),
            state: Mutex::new(LimiterState {
                last_request_time: None,
                minute_start: Instant::now(),
                requests_this_minute: 0.0,
                burst_counter: 0,
                current_backoff: rate_limit_interval,
            }),
        }
    }

    /// Called before every request attempt; sleeps as needed per §4.3.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if now.duration_since(state.minute_start) >= Duration::from_secs(60) {
            state.minute_start = now;
            state.requests_this_minute = 0.0;
            let decayed = state.current_backoff.as_secs_f64() / self.backoff_multiplier;
            state.current_backoff =
                Duration::from_secs_f64(decayed.max(self.rate_limit_interval.as_secs_f64()));
        }

        if state.requests_this_minute >= self.requests_per_minute {
            let elapsed_in_minute = now.duration_since(state.minute_start);
            let remainder = Duration::from_secs(60).saturating_sub(elapsed_in_minute);
            if !remainder.is_zero() {
                tokio::time::sleep(remainder).await;
            }
            state.minute_start = Instant::now();
            state.requests_this_minute = 0.0;
        }

        state.burst_counter += 1;
        if state.burst_counter >= self.burst_size {
            state.burst_counter = 0;
            tokio::time::sleep(state.current_backoff).await;
        } else if let Some(last) = state.last_request_time {
            let elapsed = last.elapsed();
            if elapsed < self.rate_limit_interval {
                tokio::time::sleep(self.rate_limit_interval - elapsed).await;
            }
        }

        state.last_request_time = Some(Instant::now());
        state.requests_this_minute += 1.0;
    }

    /// Called on a 429 response: escalates the backoff and sleeps it.
    pub async fn handle_rate_limit_error(&self) -> Duration {
        let mut state = self.state.lock().await;
        let escalated = state.current_backoff.as_secs_f64() * self.backoff_multiplier;
        state.current_backoff =
            Duration::from_secs_f64(escalated.min(self.max_backoff.as_secs_f64()));
        let sleep_for = state.current_backoff;
        drop(state);
        tokio::time::sleep(sleep_for).await;
        sleep_for
    }

    #[cfg(test)]
    pub(crate) async fn current_backoff_secs(&self) -> f64 {
        self.state.lock().await.current_backoff.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn backoff_escalates_and_caps_at_max() {
        let limiter = CatalogRateLimiter::new(0.5, 20.0, 5, 2.0, 60.0);
        assert_eq!(limiter.current_backoff_secs().await, 0.5);

        limiter.handle_rate_limit_error().await;
        assert_eq!(limiter.current_backoff_secs().await, 1.0);

        for _ in 0..10 {
            limiter.handle_rate_limit_error().await;
        }
        assert_eq!(limiter.current_backoff_secs().await, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_limiter_spaces_requests() {
        let limiter = IntervalLimiter::new(0.1);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
