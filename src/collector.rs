//! Signal collectors and the platform sensor boundary.
//!
//! Every collector follows the same contract:
//!
//! - `is_available()` — cheap capability probe.
//! - `collect()` — async; returns `None` on *any* failure (denied permission,
//!   unsupported platform, sensor error). Never errors, never panics.
//! - `quality()` — confidence in the most recent reading, [0.0, 1.0].
//!
//! The temporal collector is always available and always quality 1.0. The
//! other three wrap an injected [`PlatformSensors`] boundary so the core
//! never touches a platform API directly.
//!
//! # Invariants
//!
//! - **COL-001**: `collect()` never propagates an error; unavailability is
//!   `None` and the source is excluded from fusion (SIG-001).
//! - **COL-002**: a collector that does not resolve within the snapshot
//!   deadline counts as unavailable for that cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::signal::{
    DeviceUsageReading, MovementReading, SignalReading, SignalSnapshot, TemporalReading,
    VenueReading, VenueType,
};

/// Default per-collector deadline when assembling a snapshot (COL-002).
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(2);

// ─── Platform boundary ──────────────────────────────────────────────────────

/// Platform sensor boundary injected at the edge.
///
/// Each method returns `None` when the underlying capability is denied or
/// unsupported. Implementations live outside the core (mobile shims, test
/// fakes); the core only ever sees this trait.
#[async_trait]
pub trait PlatformSensors: Send + Sync {
    /// Current ground speed in m/s, if location permission is granted.
    async fn speed_mps(&self) -> Option<f32>;

    /// Screen-on ratio over the platform's sampling window, if usage stats
    /// are accessible.
    async fn screen_on_ratio(&self) -> Option<f32>;

    /// Current classified venue and dwell minutes, if place data is
    /// available.
    async fn current_venue(&self) -> Option<(VenueType, u32)>;
}

// ─── Collector contract ─────────────────────────────────────────────────────

/// One source of signal for the inference pipeline.
#[async_trait]
pub trait SignalCollector: Send + Sync {
    /// Stable source name, used in logs.
    fn name(&self) -> &'static str;

    /// `true` if this source can currently produce readings.
    fn is_available(&self) -> bool;

    /// Take one reading. `None` means "exclude this source this cycle"
    /// (COL-001) — never an error.
    async fn collect(&mut self) -> Option<SignalReading>;

    /// Confidence in the most recent reading [0.0, 1.0]. 0.0 until the
    /// first successful `collect()`.
    fn quality(&self) -> f32;
}

// ─── Temporal ───────────────────────────────────────────────────────────────

/// Time-of-day collector. Always available, always quality 1.0.
pub struct TemporalCollector {
    clock: Arc<dyn Clock>,
}

impl TemporalCollector {
    /// Build a temporal collector over the injected clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl SignalCollector for TemporalCollector {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn collect(&mut self) -> Option<SignalReading> {
        Some(SignalReading::Temporal(TemporalReading::from_epoch_ms(
            self.clock.now_ms(),
        )))
    }

    fn quality(&self) -> f32 {
        1.0
    }
}

// ─── Movement ───────────────────────────────────────────────────────────────

/// Movement collector over the platform location source.
pub struct MovementCollector {
    platform: Arc<dyn PlatformSensors>,
    base_quality: f32,
    last_quality: f32,
}

impl MovementCollector {
    /// Build a movement collector. `base_quality` is the confidence assigned
    /// to a successful platform read.
    pub fn new(platform: Arc<dyn PlatformSensors>, base_quality: f32) -> Self {
        Self {
            platform,
            base_quality: base_quality.clamp(0.0, 1.0),
            last_quality: 0.0,
        }
    }
}

#[async_trait]
impl SignalCollector for MovementCollector {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn is_available(&self) -> bool {
        true // availability is only known at read time; collect() reports it
    }

    async fn collect(&mut self) -> Option<SignalReading> {
        match self.platform.speed_mps().await {
            Some(speed) if speed.is_finite() && speed >= 0.0 => {
                self.last_quality = self.base_quality;
                Some(SignalReading::Movement(MovementReading {
                    speed_mps: speed,
                    quality: self.base_quality,
                }))
            }
            _ => {
                self.last_quality = 0.0;
                None
            }
        }
    }

    fn quality(&self) -> f32 {
        self.last_quality
    }
}

// ─── Device usage ───────────────────────────────────────────────────────────

/// Device-usage collector over the platform usage-stats source.
pub struct DeviceUsageCollector {
    platform: Arc<dyn PlatformSensors>,
    base_quality: f32,
    last_quality: f32,
}

impl DeviceUsageCollector {
    /// Build a device-usage collector with the given read confidence.
    pub fn new(platform: Arc<dyn PlatformSensors>, base_quality: f32) -> Self {
        Self {
            platform,
            base_quality: base_quality.clamp(0.0, 1.0),
            last_quality: 0.0,
        }
    }
}

#[async_trait]
impl SignalCollector for DeviceUsageCollector {
    fn name(&self) -> &'static str {
        "device_usage"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn collect(&mut self) -> Option<SignalReading> {
        match self.platform.screen_on_ratio().await {
            Some(ratio) if ratio.is_finite() => {
                self.last_quality = self.base_quality;
                Some(SignalReading::Device(DeviceUsageReading {
                    screen_on_ratio: ratio.clamp(0.0, 1.0),
                    quality: self.base_quality,
                }))
            }
            _ => {
                self.last_quality = 0.0;
                None
            }
        }
    }

    fn quality(&self) -> f32 {
        self.last_quality
    }
}

// ─── Venue ──────────────────────────────────────────────────────────────────

/// Venue collector over the platform place source.
pub struct VenueCollector {
    platform: Arc<dyn PlatformSensors>,
    base_quality: f32,
    last_quality: f32,
}

impl VenueCollector {
    /// Build a venue collector with the given read confidence.
    pub fn new(platform: Arc<dyn PlatformSensors>, base_quality: f32) -> Self {
        Self {
            platform,
            base_quality: base_quality.clamp(0.0, 1.0),
            last_quality: 0.0,
        }
    }
}

#[async_trait]
impl SignalCollector for VenueCollector {
    fn name(&self) -> &'static str {
        "venue"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn collect(&mut self) -> Option<SignalReading> {
        match self.platform.current_venue().await {
            Some((venue_type, dwell_minutes)) => {
                self.last_quality = self.base_quality;
                Some(SignalReading::Venue(VenueReading {
                    venue_type,
                    dwell_minutes,
                    quality: self.base_quality,
                }))
            }
            None => {
                self.last_quality = 0.0;
                None
            }
        }
    }

    fn quality(&self) -> f32 {
        self.last_quality
    }
}

// ─── Snapshot assembly ──────────────────────────────────────────────────────

/// Assemble a fresh [`SignalSnapshot`] from every collector.
///
/// Each collector gets at most `timeout` to resolve (COL-002); one that does
/// not is excluded for this cycle exactly as if it had returned `None`.
pub async fn collect_snapshot(
    collectors: &mut [Box<dyn SignalCollector>],
    clock: &dyn Clock,
    timeout: Duration,
) -> SignalSnapshot {
    let mut snapshot = SignalSnapshot::empty(clock.now_ms());
    for collector in collectors.iter_mut() {
        if !collector.is_available() {
            tracing::debug!(source = collector.name(), "collector unavailable, excluded");
            continue;
        }
        match tokio::time::timeout(timeout, collector.collect()).await {
            Ok(Some(reading)) => snapshot.absorb(reading),
            Ok(None) => {
                tracing::debug!(source = collector.name(), "collector returned no reading");
            }
            Err(_) => {
                tracing::debug!(
                    source = collector.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "collector timed out, excluded"
                );
            }
        }
    }
    snapshot
}
