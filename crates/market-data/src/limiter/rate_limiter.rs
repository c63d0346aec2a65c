//! Multi-window rate limiter with concurrency throttling.
//!
//! Gates every upstream call behind three rolling quota windows
//! (minute/hour/day) and a bounded concurrency pool. A denied permit is
//! backpressure, not an error: the caller translates it into a
//! rate-limit-exceeded outcome.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::quota::{QuotaWindow, WindowKind};
use crate::config::{BackoffStrategy, RateLimitConfig};

/// Mutable limiter state behind the mutex.
#[derive(Debug)]
struct LimiterState {
    minute: QuotaWindow,
    hour: QuotaWindow,
    day: QuotaWindow,
    consecutive_errors: u32,
    last_request_at: Option<Instant>,
    last_error_at: Option<DateTime<Utc>>,
    total_requests: u64,
    total_errors: u64,
    total_delays: u64,
}

impl LimiterState {
    fn roll_windows(&mut self, now: DateTime<Utc>) {
        self.minute.roll(now);
        self.hour.roll(now);
        self.day.roll(now);
    }
}

/// Concurrency slot held for the duration of one upstream call.
///
/// Dropping the permit releases the slot and decrements the active-request
/// count on every exit path, so release happens exactly once per successful
/// acquisition.
pub struct RequestPermit<'a> {
    limiter: &'a RateLimiter,
    _permit: SemaphorePermit<'a>,
}

impl Drop for RequestPermit<'_> {
    fn drop(&mut self) {
        self.limiter.active_requests.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serializable snapshot of limiter state for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct RateLimiterStats {
    /// Requests recorded since construction
    pub total_requests: u64,
    /// Failed requests recorded since construction
    pub total_errors: u64,
    /// Times an inter-request delay was actually slept
    pub total_delays: u64,
    /// Requests in the current day window
    pub daily_requests: u32,
    /// Day window limit
    pub daily_limit: u32,
    /// Requests in the current hour window
    pub hourly_requests: u32,
    /// Hour window limit
    pub hourly_limit: u32,
    /// Requests in the current minute window
    pub minute_requests: u32,
    /// Minute window limit
    pub minute_limit: u32,
    /// Permits currently outstanding
    pub active_requests: usize,
    /// Concurrency pool size
    pub max_concurrent_requests: usize,
    /// Consecutive failures since the last success
    pub consecutive_errors: u32,
    /// Time of the last recorded failure
    pub last_error_at: Option<DateTime<Utc>>,
    /// Configured minimum inter-request delay in seconds
    pub delay_between_requests_secs: f64,
    /// Configured delay strategy
    pub strategy: &'static str,
}

/// Rate limiter for upstream provider requests.
///
/// Counters and the semaphore are shared across all concurrent fetches in
/// the process; all mutation goes through the acquire/record API. Window
/// resets are cooperative - checked on every `acquire_permit` call, no
/// background timer.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
    semaphore: Semaphore,
    active_requests: AtomicUsize,
}

impl RateLimiter {
    /// Create a rate limiter from configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Utc::now();
        let state = LimiterState {
            minute: QuotaWindow::new(WindowKind::Minute, config.minute_limit, now),
            hour: QuotaWindow::new(WindowKind::Hour, config.hourly_limit, now),
            day: QuotaWindow::new(WindowKind::Day, config.daily_limit, now),
            consecutive_errors: 0,
            last_request_at: None,
            last_error_at: None,
            total_requests: 0,
            total_errors: 0,
            total_delays: 0,
        };
        Self {
            semaphore: Semaphore::new(config.max_concurrent_requests),
            state: Mutex::new(state),
            active_requests: AtomicUsize::new(0),
            config,
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// The worst case of recovering is slightly incorrect rate accounting,
    /// which is better than panicking.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Acquire a permit for one upstream request.
    ///
    /// Returns `None` without blocking further when any quota window is at
    /// its limit. Otherwise waits for a concurrency slot and returns a
    /// guard that must live across the full upstream round trip.
    pub async fn acquire_permit(&self) -> Option<RequestPermit<'_>> {
        {
            let mut state = self.lock_state();
            state.roll_windows(Utc::now());

            for window in [&state.day, &state.hour, &state.minute] {
                if window.is_exhausted() {
                    warn!(
                        "{} limit reached: {}/{}",
                        window.kind.as_str(),
                        window.count,
                        window.limit
                    );
                    return None;
                }
            }
        }

        // Semaphore wait happens outside the state lock
        let permit = self.semaphore.acquire().await.ok()?;
        self.active_requests.fetch_add(1, Ordering::SeqCst);
        Some(RequestPermit {
            limiter: self,
            _permit: permit,
        })
    }

    /// Compute the inter-request delay to apply, if any.
    fn compute_delay(&self, elapsed: Option<Duration>, consecutive_errors: u32) -> Option<Duration> {
        let base = self.config.delay_between_requests;
        match elapsed {
            Some(elapsed) if elapsed < base => {
                let mut delay = base - elapsed;
                if self.config.strategy == BackoffStrategy::ExponentialBackoff
                    && consecutive_errors > 0
                {
                    // Exponent capped at 5 to bound sleep growth
                    let factor = self
                        .config
                        .backoff_multiplier
                        .powi(consecutive_errors.min(5) as i32);
                    delay = Duration::from_secs_f64(delay.as_secs_f64() * factor);
                }
                Some(delay)
            }
            _ => None,
        }
    }

    /// Sleep out the minimum inter-request delay if the last request was
    /// too recent. Under exponential backoff the delay grows with
    /// consecutive failures.
    pub async fn wait_if_needed(&self) {
        let delay = {
            let state = self.lock_state();
            let elapsed = state.last_request_at.map(|t| t.elapsed());
            self.compute_delay(elapsed, state.consecutive_errors)
        };

        if let Some(delay) = delay {
            debug!("Rate limiting delay: {:.2}s", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
            self.lock_state().total_delays += 1;
        }

        self.lock_state().last_request_at = Some(Instant::now());
    }

    /// Record one request attempt in every window.
    ///
    /// Counters increment unconditionally; success resets the consecutive
    /// error streak, failure extends it.
    pub fn record_request(&self, success: bool) {
        let mut state = self.lock_state();
        let now = Utc::now();
        state.roll_windows(now);

        state.total_requests += 1;
        state.minute.record();
        state.hour.record();
        state.day.record();

        if success {
            state.consecutive_errors = 0;
        } else {
            state.total_errors += 1;
            state.consecutive_errors += 1;
            state.last_error_at = Some(now);
        }
    }

    /// Number of permits currently outstanding.
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::SeqCst)
    }

    /// Snapshot of counters and configuration for diagnostics.
    pub fn statistics(&self) -> RateLimiterStats {
        let mut state = self.lock_state();
        state.roll_windows(Utc::now());

        RateLimiterStats {
            total_requests: state.total_requests,
            total_errors: state.total_errors,
            total_delays: state.total_delays,
            daily_requests: state.day.count,
            daily_limit: state.day.limit,
            hourly_requests: state.hour.count,
            hourly_limit: state.hour.limit,
            minute_requests: state.minute.count,
            minute_limit: state.minute.limit,
            active_requests: self.active_requests(),
            max_concurrent_requests: self.config.max_concurrent_requests,
            consecutive_errors: state.consecutive_errors,
            last_error_at: state.last_error_at,
            delay_between_requests_secs: self.config.delay_between_requests.as_secs_f64(),
            strategy: self.config.strategy.as_str(),
        }
    }

    /// Health signal: false when daily or hourly utilization exceeds 95%
    /// or the consecutive error streak passed 10.
    pub fn is_healthy(&self) -> bool {
        let mut state = self.lock_state();
        state.roll_windows(Utc::now());

        if state.day.utilization() > 0.95 || state.hour.utilization() > 0.95 {
            return false;
        }
        state.consecutive_errors <= 10
    }
}
