//! Adaptive refresh scheduling.
//!
//! The scheduler is a one-state machine ("waiting") with a rescheduling
//! transition: every `schedule` call cancels any pending timer, computes the
//! interval from the snapshot, and arms a single one-shot timer. Exactly one
//! timer is outstanding at any time, so ticks never overlap.
//!
//! # Invariants
//!
//! - **SCH-001**: `interval_for` output is always one of the four canonical
//!   intervals; rules are evaluated top-to-bottom, first match wins.
//! - **SCH-002**: `schedule` atomically replaces the pending timer
//!   (cancel-then-arm); `cancel` is idempotent and safe with no timer armed.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::signal::SignalSnapshot;

// ─── Decision table constants ───────────────────────────────────────────────

/// Stationary device with a dark screen: back off hard.
pub const INTERVAL_IDLE: Duration = Duration::from_millis(300_000);
/// High-energy venue: state changes fast, refresh fast.
pub const INTERVAL_HIGH_ENERGY: Duration = Duration::from_millis(30_000);
/// Walking pace.
pub const INTERVAL_WALKING: Duration = Duration::from_millis(60_000);
/// Vehicle speed: GPS churn is not worth the cost.
pub const INTERVAL_VEHICLE: Duration = Duration::from_millis(120_000);
/// Fallback when no other rule matches.
pub const INTERVAL_DEFAULT: Duration = Duration::from_millis(60_000);

/// Speed below which the device counts as stationary (m/s).
const IDLE_SPEED_MPS: f32 = 0.3;
/// Screen-on ratio below which the device counts as idle.
const IDLE_SCREEN_RATIO: f32 = 0.1;
/// Speed at or above which movement counts as vehicle (m/s).
const VEHICLE_SPEED_MPS: f32 = 3.0;

/// Pure decision table over the snapshot (SCH-001).
///
/// Rules, in order:
/// 1. speed < 0.3 m/s AND screen-on < 0.1 → 300 s (idle)
/// 2. venue ∈ {nightclub, gym} → 30 s
/// 3. 0.3 ≤ speed < 3 m/s → 60 s (walking)
/// 4. speed ≥ 3 m/s → 120 s (vehicle)
/// 5. otherwise → 60 s
///
/// A rule whose reading is absent from the snapshot does not match.
pub fn interval_for(snapshot: &SignalSnapshot) -> Duration {
    if let (Some(speed), Some(screen)) = (snapshot.speed_mps(), snapshot.screen_on_ratio()) {
        if speed < IDLE_SPEED_MPS && screen < IDLE_SCREEN_RATIO {
            return INTERVAL_IDLE;
        }
    }
    if let Some(venue) = snapshot.venue_type() {
        if venue.is_high_energy() {
            return INTERVAL_HIGH_ENERGY;
        }
    }
    if let Some(speed) = snapshot.speed_mps() {
        if (IDLE_SPEED_MPS..VEHICLE_SPEED_MPS).contains(&speed) {
            return INTERVAL_WALKING;
        }
        if speed >= VEHICLE_SPEED_MPS {
            return INTERVAL_VEHICLE;
        }
    }
    INTERVAL_DEFAULT
}

// ─── Scheduler ──────────────────────────────────────────────────────────────

/// Owns the single outstanding refresh timer (SCH-002).
pub struct AdaptiveScheduler {
    pending: Option<JoinHandle<()>>,
    current_interval: Option<Duration>,
}

impl AdaptiveScheduler {
    /// Scheduler with no timer armed.
    pub fn new() -> Self {
        Self {
            pending: None,
            current_interval: None,
        }
    }

    /// Cancel any pending timer, compute the interval for `snapshot`, and
    /// arm a one-shot timer that invokes `next` (SCH-002).
    pub fn schedule<F>(&mut self, next: F, snapshot: &SignalSnapshot)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let interval = interval_for(snapshot);
        self.current_interval = Some(interval);
        tracing::debug!(interval_ms = interval.as_millis() as u64, "arming refresh timer");
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            next();
        }));
    }

    /// Abort the pending timer, if any. Idempotent (SCH-002).
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// `true` while a timer is armed and has not yet fired or been
    /// cancelled.
    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// The interval computed by the most recent `schedule` call.
    pub fn current_interval(&self) -> Option<Duration> {
        self.current_interval
    }
}

impl Default for AdaptiveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AdaptiveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
