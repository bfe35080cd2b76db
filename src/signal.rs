//! Typed signal readings and the per-cycle [`SignalSnapshot`].
//!
//! A snapshot is an immutable bundle of the latest reading from each
//! collector. It is built fresh on every scheduler tick and never mutated
//! after construction — downstream components (engine, scheduler) only read
//! it.
//!
//! # Invariants
//!
//! - **SIG-001**: an absent reading (`None`) means the source is *excluded*
//!   from fusion, never treated as a zero measurement.
//! - **SIG-002**: `quality` on every reading is bounded [0.0, 1.0].

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

// ─── Venue taxonomy ─────────────────────────────────────────────────────────

/// Closed venue taxonomy the venue collector reports against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueType {
    /// Fitness venue — high-energy context.
    Gym,
    /// Nightlife venue — high-energy context.
    Nightclub,
    /// Bar or pub.
    Bar,
    /// Cafe or coffee shop.
    Cafe,
    /// Park or outdoor public space.
    Park,
    /// Transit hub or in-transit location.
    Transit,
    /// Anything the platform could not classify further.
    Other,
}

impl VenueType {
    /// Venues where state changes fast enough to justify aggressive
    /// re-inference (see the scheduler decision table).
    pub fn is_high_energy(&self) -> bool {
        matches!(self, VenueType::Gym | VenueType::Nightclub)
    }
}

// ─── Per-source readings ────────────────────────────────────────────────────

/// Time-of-day context. Always available — derived from the injected clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalReading {
    /// Local hour of day [0, 23].
    pub hour_of_day: u8,
    /// Day of week, 0 = Monday … 6 = Sunday.
    pub day_of_week: u8,
    /// `true` for Saturday and Sunday.
    pub is_weekend: bool,
}

impl TemporalReading {
    /// Derive a temporal reading from a Unix epoch millisecond timestamp.
    ///
    /// Out-of-range timestamps fall back to the epoch rather than failing —
    /// the temporal source is always available by contract.
    pub fn from_epoch_ms(epoch_ms: i64) -> Self {
        let dt = DateTime::<Utc>::from_timestamp_millis(epoch_ms)
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap_or_default());
        let weekday = dt.weekday();
        Self {
            hour_of_day: dt.hour() as u8,
            day_of_week: weekday.num_days_from_monday() as u8,
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }

    /// `true` for late-evening / night hours (21:00–03:59).
    pub fn is_night(&self) -> bool {
        self.hour_of_day >= 21 || self.hour_of_day < 4
    }
}

/// Latest movement reading from the platform location source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementReading {
    /// Ground speed in metres per second, non-negative.
    pub speed_mps: f32,
    /// Confidence in this reading [0.0, 1.0].
    pub quality: f32,
}

/// Latest device-usage reading (screen activity).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceUsageReading {
    /// Fraction of the sampling window the screen was on [0.0, 1.0].
    pub screen_on_ratio: f32,
    /// Confidence in this reading [0.0, 1.0].
    pub quality: f32,
}

/// Latest venue reading from the platform place source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VenueReading {
    /// Classified venue type.
    pub venue_type: VenueType,
    /// Continuous minutes spent at this venue.
    pub dwell_minutes: u32,
    /// Confidence in this reading [0.0, 1.0].
    pub quality: f32,
}

/// One collected reading, tagged by source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SignalReading {
    /// Reading from the temporal collector.
    Temporal(TemporalReading),
    /// Reading from the movement collector.
    Movement(MovementReading),
    /// Reading from the device-usage collector.
    Device(DeviceUsageReading),
    /// Reading from the venue collector.
    Venue(VenueReading),
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// Immutable bundle of the latest reading from each collector (SIG-001).
///
/// Built fresh on each scheduler tick by
/// [`collect_snapshot`](crate::collector::collect_snapshot); every field
/// except the timestamp is optional because any source — including temporal,
/// in pathological setups — may have been excluded this cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    /// Time-of-day context, absent only if no temporal collector ran.
    pub temporal: Option<TemporalReading>,
    /// Movement reading, absent when the source is unavailable.
    pub movement: Option<MovementReading>,
    /// Device-usage reading, absent when the source is unavailable.
    pub device: Option<DeviceUsageReading>,
    /// Venue reading, absent when the source is unavailable.
    pub venue: Option<VenueReading>,
    /// Unix epoch milliseconds at which the snapshot was assembled.
    pub taken_at_ms: i64,
}

impl SignalSnapshot {
    /// Construct an empty snapshot stamped at `taken_at_ms`.
    pub fn empty(taken_at_ms: i64) -> Self {
        Self {
            temporal: None,
            movement: None,
            device: None,
            venue: None,
            taken_at_ms,
        }
    }

    /// Fold one collected reading into the snapshot (used by the builder).
    pub(crate) fn absorb(&mut self, reading: SignalReading) {
        match reading {
            SignalReading::Temporal(r) => self.temporal = Some(r),
            SignalReading::Movement(r) => self.movement = Some(r),
            SignalReading::Device(r) => self.device = Some(r),
            SignalReading::Venue(r) => self.venue = Some(r),
        }
    }

    /// `true` if at least one source produced a reading this cycle.
    pub fn has_any_signal(&self) -> bool {
        self.temporal.is_some()
            || self.movement.is_some()
            || self.device.is_some()
            || self.venue.is_some()
    }

    /// Ground speed in m/s, if the movement source was available.
    pub fn speed_mps(&self) -> Option<f32> {
        self.movement.map(|m| m.speed_mps)
    }

    /// Screen-on ratio [0,1], if the device source was available.
    pub fn screen_on_ratio(&self) -> Option<f32> {
        self.device.map(|d| d.screen_on_ratio)
    }

    /// Venue type, if the venue source was available.
    pub fn venue_type(&self) -> Option<VenueType> {
        self.venue.map(|v| v.venue_type)
    }
}
