//! Seam for the host platform's local-notification capability.
//!
//! The rest timer asks for a single notification at its completion instant
//! and cancels it by timer identity when the end time moves or the timer
//! ends early. The actual delivery mechanism lives outside this crate.

use chrono::{DateTime, Utc};

/// Schedules and cancels absolute-time local notifications.
pub trait NotificationScheduler: Send + Sync {
    /// Schedule a notification at `fire_at`, keyed by `timer_id`.
    /// Rescheduling an already-scheduled id replaces the previous request.
    fn schedule(&self, timer_id: &str, fire_at: DateTime<Utc>);

    /// Cancel the notification scheduled under `timer_id`, if any.
    fn cancel(&self, timer_id: &str);
}

/// No-op scheduler for headless hosts and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl NotificationScheduler for NoopScheduler {
    fn schedule(&self, _timer_id: &str, _fire_at: DateTime<Utc>) {}

    fn cancel(&self, _timer_id: &str) {}
}
