//! Rest timer implementation.
//!
//! The timer is bound to a wall-clock end time fixed at start, never to a
//! tick count: remaining time is always `end_time - now`, so suspending and
//! resuming the process yields a correct value purely by recomputation,
//! with no drift accumulation. The caller drives `tick()` periodically and
//! passes `now` explicitly; every decision is a wall-clock comparison.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds-remaining marks at which a signal fires, highest first.
pub const SIGNAL_THRESHOLDS: [u32; 5] = [10, 5, 3, 2, 1];

/// Discrete output of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RestSignal {
    /// Crossed a countdown threshold (haptic/visual cue).
    Threshold { remaining_secs: u32 },
    /// The countdown reached zero. Delivered exactly once per timer.
    Completed,
}

/// Countdown bound to an absolute end time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestTimer {
    /// Identity used to key the scheduled local notification.
    id: String,
    end_time: DateTime<Utc>,
    total_secs: u32,
    /// Thresholds already fired while armed.
    fired: Vec<u32>,
    /// Set once the completion signal has been delivered (naturally or via
    /// skip); guards against double invocation when both race.
    done: bool,
}

impl RestTimer {
    /// Start a countdown of `duration_secs`, fixing `end_time = now +
    /// duration`.
    pub fn start(duration_secs: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            end_time: now + Duration::seconds(i64::from(duration_secs)),
            total_secs: duration_secs,
            fired: Vec::new(),
            done: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute completion instant; notification schedulers key off this.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whole seconds remaining, recomputed from wall clock. Zero once the
    /// end time has passed.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        let ms = (self.end_time - now).num_milliseconds();
        if ms <= 0 {
            return 0;
        }
        (ms as u64).div_ceil(1000) as u32
    }

    /// 0.0 .. 1.0 progress for UI rendering.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.total_secs == 0 {
            return 1.0;
        }
        let fraction = 1.0 - f64::from(self.remaining_secs(now)) / f64::from(self.total_secs);
        fraction.clamp(0.0, 1.0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Call periodically. Emits at most one threshold signal per crossing
    /// and the completion signal exactly once.
    ///
    /// Recomputing the same remaining second twice (a resume from suspension
    /// often does) never re-fires a threshold.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<RestSignal> {
        if self.done {
            return Vec::new();
        }
        let remaining = self.remaining_secs(now);
        if remaining == 0 {
            self.done = true;
            return vec![RestSignal::Completed];
        }

        // A long suspension can cross several thresholds at once; all are
        // marked fired but only the current band's signal is emitted.
        let mut lowest_crossed = None;
        for threshold in SIGNAL_THRESHOLDS {
            if remaining <= threshold && !self.fired.contains(&threshold) {
                self.fired.push(threshold);
                lowest_crossed = Some(threshold);
            }
        }
        lowest_crossed
            .map(|threshold| {
                vec![RestSignal::Threshold {
                    remaining_secs: threshold,
                }]
            })
            .unwrap_or_default()
    }

    /// Extend the end time in place; the timer is not restarted and nothing
    /// fires at the moment of extension. Thresholds the countdown will
    /// cross again become eligible to fire again.
    pub fn add_time(&mut self, secs: u32, now: DateTime<Utc>) {
        if self.done {
            return;
        }
        self.end_time += Duration::seconds(i64::from(secs));
        self.total_secs += secs;
        let remaining = self.remaining_secs(now);
        self.fired.retain(|&t| t >= remaining);
    }

    /// End the timer early. Returns true exactly once; a skip racing the
    /// natural completion is swallowed by the idempotency flag.
    pub fn skip(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.done = true;
        true
    }
}
