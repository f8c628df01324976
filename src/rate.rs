//! Request pacing.
//!
//! One controller is shared by all workers of a group; access to the pacing
//! state goes through a single mutex with O(1) critical sections. Sleeps
//! happen outside the lock.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RatePolicy;

const SECOND: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct RateState {
    current_qps: u64,
    issued_this_second: u64,
    second_start: Instant,
    last_ramp: Instant,
}

/// Gates calls so that at most `current_qps` are issued per second, evolving
/// the target according to the configured [`RatePolicy`].
#[derive(Debug)]
pub struct RateController {
    policy: RatePolicy,
    state: Option<Mutex<RateState>>,
}

impl RateController {
    pub fn new(policy: RatePolicy) -> RateController {
        let state = match &policy {
            RatePolicy::None => None,
            RatePolicy::Fixed(q) => Some(*q),
            RatePolicy::Linear { start, .. } => Some(*start),
            RatePolicy::Exponential { start, .. } => Some(*start),
        }
        .map(|initial| {
            let now = Instant::now();
            Mutex::new(RateState {
                current_qps: initial,
                issued_this_second: 0,
                second_start: now,
                last_ramp: now,
            })
        });
        RateController { policy, state }
    }

    /// Suspend until the next call is permitted; the permit is consumed on
    /// return. Never fails, and cancellation mid-sleep leaves no permit
    /// consumed.
    pub async fn await_slot(&self) {
        let Some(state) = &self.state else {
            return;
        };
        loop {
            let wake = {
                let mut s = state.lock();
                let now = Instant::now();
                if now.duration_since(s.second_start) >= SECOND {
                    // After a stall the window restarts at `now`: no
                    // catch-up burst for missed seconds.
                    s.second_start = now;
                    s.issued_this_second = 0;
                }
                self.apply_ramp(&mut s, now);
                if s.issued_this_second < s.current_qps {
                    s.issued_this_second += 1;
                    return;
                }
                s.second_start + SECOND
            };
            tokio::time::sleep_until(wake).await;
        }
    }

    /// Current target rate, with any due ramp steps applied.
    pub fn current_qps(&self) -> u64 {
        match &self.state {
            None => u64::MAX,
            Some(state) => {
                let mut s = state.lock();
                let now = Instant::now();
                self.apply_ramp(&mut s, now);
                s.current_qps
            }
        }
    }

    /// Advance the ramp once per elapsed interval. The clamp into the span
    /// of `start..end` is applied after each update, never before.
    fn apply_ramp(&self, s: &mut RateState, now: Instant) {
        let (lo, hi, interval) = match self.policy {
            RatePolicy::Linear {
                start,
                end,
                interval,
                ..
            }
            | RatePolicy::Exponential {
                start,
                end,
                interval,
                ..
            } => (start.min(end), start.max(end), interval),
            _ => return,
        };

        while now.duration_since(s.last_ramp) >= interval {
            s.current_qps = match self.policy {
                RatePolicy::Linear { step, .. } => {
                    (s.current_qps as i64).saturating_add(step).max(0) as u64
                }
                RatePolicy::Exponential { factor, .. } => {
                    (s.current_qps as f64 * factor).round() as u64
                }
                _ => unreachable!(),
            }
            .clamp(lo, hi);
            s.last_ramp += interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn none_policy_never_gates() {
        let controller = RateController::new(RatePolicy::None);
        let before = Instant::now();
        for _ in 0..10_000 {
            controller.await_slot().await;
        }
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_rate_blocks_after_budget() {
        let controller = RateController::new(RatePolicy::Fixed(5));
        let start = Instant::now();
        for _ in 0..5 {
            controller.await_slot().await;
        }
        assert_eq!(Instant::now(), start);

        // The sixth permit only arrives in the next second window.
        controller.await_slot().await;
        assert!(Instant::now().duration_since(start) >= SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn linear_ramp_steps_and_clamps() {
        let controller = RateController::new(RatePolicy::Linear {
            start: 100,
            end: 1000,
            step: 100,
            interval: SECOND,
        });
        assert_eq!(controller.current_qps(), 100);
        for k in 1..=9 {
            advance(SECOND).await;
            assert_eq!(controller.current_qps(), 100 + 100 * k);
        }
        // Past the endpoint the target stays clamped.
        advance(SECOND * 5).await;
        assert_eq!(controller.current_qps(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn linear_ramp_down() {
        let controller = RateController::new(RatePolicy::Linear {
            start: 500,
            end: 100,
            step: -200,
            interval: SECOND,
        });
        advance(SECOND).await;
        assert_eq!(controller.current_qps(), 300);
        advance(SECOND).await;
        assert_eq!(controller.current_qps(), 100);
        advance(SECOND).await;
        assert_eq!(controller.current_qps(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_ramp_doubles_and_clamps() {
        let controller = RateController::new(RatePolicy::Exponential {
            start: 100,
            end: 1600,
            factor: 2.0,
            interval: SECOND,
        });
        let expected = [200, 400, 800, 1600, 1600, 1600];
        for qps in expected {
            advance(SECOND).await;
            assert_eq!(controller.current_qps(), qps);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stall_applies_every_elapsed_interval() {
        let controller = RateController::new(RatePolicy::Linear {
            start: 100,
            end: 1000,
            step: 100,
            interval: SECOND,
        });
        advance(SECOND * 4).await;
        assert_eq!(controller.current_qps(), 500);
    }
}
