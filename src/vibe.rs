//! Vibe categories, the normalized [`VibeVector`], and the fusion engine.
//!
//! # Invariants
//!
//! - **VIB-001**: after any mutating call, weights sum to 1.0 within
//!   floating-point tolerance — or to 0.0 only in the degenerate no-signal
//!   case, which the engine refuses to emit.
//! - **VIB-002**: `adjust` clamps the touched weight to `[0, cap]` *before*
//!   renormalization, so no single signal can dominate past the cap
//!   regardless of delta magnitude.
//! - **VIB-003**: the weight table is data, not a model — rule constants
//!   only, swappable wholesale.

use serde::{Deserialize, Serialize};

use crate::error::VibeError;
use crate::signal::{SignalSnapshot, VenueType};

/// Number of categories in the closed vibe set.
pub const VIBE_CATEGORY_COUNT: usize = 6;

/// Sum tolerance for the VIB-001 normalization invariant.
pub const NORMALIZATION_TOLERANCE: f32 = 1e-4;

// ─── Categories ─────────────────────────────────────────────────────────────

/// Closed set of vibe categories. The set is fixed at compile time; the
/// vector representation depends on it being closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibeCategory {
    /// Low-key, resting, unhurried.
    Chill,
    /// Seeking or enjoying company.
    Social,
    /// High energy, peak activity.
    Hype,
    /// In motion, transitioning between contexts.
    Flowing,
    /// Exploring, browsing, open to novelty.
    Curious,
    /// Deliberately alone.
    Solo,
}

impl VibeCategory {
    /// All categories in vector index order.
    pub const ALL: [VibeCategory; VIBE_CATEGORY_COUNT] = [
        VibeCategory::Chill,
        VibeCategory::Social,
        VibeCategory::Hype,
        VibeCategory::Flowing,
        VibeCategory::Curious,
        VibeCategory::Solo,
    ];

    /// Index of this category within [`VibeVector`] weights.
    pub fn index(&self) -> usize {
        match self {
            VibeCategory::Chill => 0,
            VibeCategory::Social => 1,
            VibeCategory::Hype => 2,
            VibeCategory::Flowing => 3,
            VibeCategory::Curious => 4,
            VibeCategory::Solo => 5,
        }
    }
}

// ─── Vector ─────────────────────────────────────────────────────────────────

/// Probability distribution over the closed vibe set (VIB-001).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VibeVector {
    weights: [f32; VIBE_CATEGORY_COUNT],
}

impl VibeVector {
    /// The uniform distribution — the cold-start prior.
    pub fn uniform() -> Self {
        Self {
            weights: [1.0 / VIBE_CATEGORY_COUNT as f32; VIBE_CATEGORY_COUNT],
        }
    }

    /// The all-zero degenerate vector. Exists only as a working state during
    /// fusion; it is never published (VIB-001).
    pub fn zero() -> Self {
        Self {
            weights: [0.0; VIBE_CATEGORY_COUNT],
        }
    }

    /// Weight for one category.
    pub fn get(&self, category: VibeCategory) -> f32 {
        self.weights[category.index()]
    }

    /// Sum of all weights (1.0 after normalization, 0.0 when degenerate).
    pub fn total(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// `true` when every weight is zero — the no-signal case.
    pub fn is_degenerate(&self) -> bool {
        self.total() <= f32::EPSILON
    }

    /// Add `delta` to one category's weight, clamp it to `[0, cap]`
    /// (VIB-002), then renormalize the whole vector (VIB-001).
    pub fn adjust(&mut self, category: VibeCategory, delta: f32, cap: f32) {
        let idx = category.index();
        self.weights[idx] = (self.weights[idx] + delta).clamp(0.0, cap.max(0.0));
        self.renormalize();
    }

    /// Rescale so weights sum to 1.0. No-op on the degenerate vector.
    pub fn renormalize(&mut self) {
        let total = self.total();
        if total > f32::EPSILON {
            for w in self.weights.iter_mut() {
                *w /= total;
            }
        }
    }

    /// The highest-weighted category and its weight, or `None` when
    /// degenerate.
    pub fn dominant(&self) -> Option<(VibeCategory, f32)> {
        if self.is_degenerate() {
            return None;
        }
        let mut best = VibeCategory::ALL[0];
        let mut best_w = self.weights[0];
        for &cat in &VibeCategory::ALL[1..] {
            let w = self.weights[cat.index()];
            if w > best_w {
                best = cat;
                best_w = w;
            }
        }
        Some((best, best_w))
    }

    /// Blend `other` into this vector: `self = self*(1-alpha) + other*alpha`,
    /// renormalized. Used to carry the last-known vector as a prior.
    pub fn blend(&mut self, other: &VibeVector, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        for (w, o) in self.weights.iter_mut().zip(other.weights.iter()) {
            *w = *w * (1.0 - alpha) + o * alpha;
        }
        self.renormalize();
    }
}

// ─── Weight table ───────────────────────────────────────────────────────────

/// Rule constants for signal fusion (VIB-003).
///
/// Every delta is scaled by the reading's quality before being applied, so a
/// low-confidence source nudges the vector less than a confident one.
#[derive(Clone, Debug)]
pub struct WeightTable {
    /// Speed at or above which movement reads as vehicle/high energy (m/s).
    pub fast_speed_mps: f32,
    /// Speed band lower bound for walking (m/s).
    pub walk_speed_mps: f32,
    /// Boost applied to Hype and Flowing at fast speed.
    pub fast_boost: f32,
    /// Boost applied to Flowing while walking.
    pub walk_boost: f32,
    /// Screen-on ratio at or above which the device counts as heavily used.
    pub heavy_screen_ratio: f32,
    /// Boost applied to Social for heavy night-time screen use.
    pub night_screen_boost: f32,
    /// Screen-on ratio below which the device counts as idle.
    pub idle_screen_ratio: f32,
    /// Speed below which movement counts as stationary (m/s).
    pub idle_speed_mps: f32,
    /// Boost applied to Chill when stationary with an idle screen.
    pub idle_boost: f32,
    /// Minimum dwell before a venue influences the vector (minutes).
    pub venue_dwell_minutes: u32,
    /// Boost applied to the categories matching the current venue.
    pub venue_boost: f32,
    /// Boost applied to Social on weekend nights.
    pub weekend_night_boost: f32,
    /// Per-adjustment weight cap (VIB-002).
    pub cap: f32,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            fast_speed_mps: 3.0,
            walk_speed_mps: 0.5,
            fast_boost: 0.30,
            walk_boost: 0.15,
            heavy_screen_ratio: 0.6,
            night_screen_boost: 0.25,
            idle_screen_ratio: 0.1,
            idle_speed_mps: 0.3,
            idle_boost: 0.20,
            venue_dwell_minutes: 10,
            venue_boost: 0.30,
            weekend_night_boost: 0.10,
            cap: 1.0,
        }
    }
}

impl WeightTable {
    /// Categories boosted by dwelling at `venue`.
    fn venue_categories(venue: VenueType) -> &'static [VibeCategory] {
        match venue {
            VenueType::Gym => &[VibeCategory::Hype],
            VenueType::Nightclub => &[VibeCategory::Hype, VibeCategory::Social],
            VenueType::Bar => &[VibeCategory::Social],
            VenueType::Cafe => &[VibeCategory::Chill, VibeCategory::Curious],
            VenueType::Park => &[VibeCategory::Flowing, VibeCategory::Chill],
            VenueType::Transit => &[VibeCategory::Flowing],
            VenueType::Other => &[],
        }
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Prior used as the starting point of each fusion cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prior {
    /// Start every cycle from the uniform distribution.
    Uniform,
    /// Blend the previous cycle's vector into the uniform prior; cold start
    /// falls back to uniform.
    LastKnown,
}

/// Fuses a [`SignalSnapshot`] into a [`VibeVector`].
pub struct VibeEngine {
    table: WeightTable,
    prior: Prior,
    /// Blend weight of the last-known vector when `prior` is `LastKnown`.
    prior_alpha: f32,
    last: Option<VibeVector>,
}

impl VibeEngine {
    /// Engine with the default weight table and last-known prior.
    pub fn new() -> Self {
        Self::with_table(WeightTable::default(), Prior::LastKnown)
    }

    /// Engine with an explicit weight table and prior policy.
    pub fn with_table(table: WeightTable, prior: Prior) -> Self {
        Self {
            table,
            prior,
            prior_alpha: 0.5,
            last: None,
        }
    }

    /// The vector produced by the most recent successful `evaluate`.
    pub fn last_vector(&self) -> Option<&VibeVector> {
        self.last.as_ref()
    }

    /// Fuse the snapshot into a normalized vibe vector.
    ///
    /// Returns [`VibeError::InsufficientSignal`] when every source was
    /// excluded — a degenerate vector is never emitted (VIB-001).
    pub fn evaluate(&mut self, snapshot: &SignalSnapshot) -> Result<VibeVector, VibeError> {
        if !snapshot.has_any_signal() {
            return Err(VibeError::InsufficientSignal);
        }

        let mut vec = match self.prior {
            Prior::Uniform => VibeVector::uniform(),
            Prior::LastKnown => match &self.last {
                Some(last) => {
                    let mut v = VibeVector::uniform();
                    v.blend(last, self.prior_alpha);
                    v
                }
                None => VibeVector::uniform(),
            },
        };

        self.apply_movement(&mut vec, snapshot);
        self.apply_device(&mut vec, snapshot);
        self.apply_venue(&mut vec, snapshot);
        self.apply_temporal(&mut vec, snapshot);

        if vec.is_degenerate() {
            return Err(VibeError::InsufficientSignal);
        }
        vec.renormalize();
        self.last = Some(vec.clone());
        Ok(vec)
    }

    fn apply_movement(&self, vec: &mut VibeVector, snapshot: &SignalSnapshot) {
        let Some(movement) = snapshot.movement else {
            return;
        };
        let t = &self.table;
        let q = movement.quality.clamp(0.0, 1.0);
        if movement.speed_mps >= t.fast_speed_mps {
            vec.adjust(VibeCategory::Hype, t.fast_boost * q, t.cap);
            vec.adjust(VibeCategory::Flowing, t.fast_boost * q, t.cap);
        } else if movement.speed_mps >= t.walk_speed_mps {
            vec.adjust(VibeCategory::Flowing, t.walk_boost * q, t.cap);
        }
    }

    fn apply_device(&self, vec: &mut VibeVector, snapshot: &SignalSnapshot) {
        let Some(device) = snapshot.device else {
            return;
        };
        let t = &self.table;
        let q = device.quality.clamp(0.0, 1.0);

        let night = snapshot.temporal.map(|tr| tr.is_night()).unwrap_or(false);
        if device.screen_on_ratio >= t.heavy_screen_ratio && night {
            vec.adjust(VibeCategory::Social, t.night_screen_boost * q, t.cap);
        }

        let stationary = snapshot
            .movement
            .map(|m| m.speed_mps < t.idle_speed_mps)
            .unwrap_or(false);
        if device.screen_on_ratio < t.idle_screen_ratio && stationary {
            vec.adjust(VibeCategory::Chill, t.idle_boost * q, t.cap);
        }
    }

    fn apply_venue(&self, vec: &mut VibeVector, snapshot: &SignalSnapshot) {
        let Some(venue) = snapshot.venue else {
            return;
        };
        let t = &self.table;
        if venue.dwell_minutes < t.venue_dwell_minutes {
            return;
        }
        let q = venue.quality.clamp(0.0, 1.0);
        for &cat in WeightTable::venue_categories(venue.venue_type) {
            vec.adjust(cat, t.venue_boost * q, t.cap);
        }
    }

    fn apply_temporal(&self, vec: &mut VibeVector, snapshot: &SignalSnapshot) {
        let Some(temporal) = snapshot.temporal else {
            return;
        };
        if temporal.is_weekend && temporal.is_night() {
            vec.adjust(
                VibeCategory::Social,
                self.table.weekend_night_boost,
                self.table.cap,
            );
        }
    }
}

impl Default for VibeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{
        DeviceUsageReading, MovementReading, SignalSnapshot, TemporalReading, VenueReading,
    };

    fn assert_normalized(vec: &VibeVector) {
        let total = vec.total();
        assert!(
            (total - 1.0).abs() < NORMALIZATION_TOLERANCE,
            "weights should sum to 1, got {total}"
        );
    }

    fn snapshot_with(
        movement: Option<f32>,
        screen: Option<f32>,
        venue: Option<(VenueType, u32)>,
        temporal: Option<TemporalReading>,
    ) -> SignalSnapshot {
        SignalSnapshot {
            temporal,
            movement: movement.map(|speed_mps| MovementReading {
                speed_mps,
                quality: 1.0,
            }),
            device: screen.map(|screen_on_ratio| DeviceUsageReading {
                screen_on_ratio,
                quality: 1.0,
            }),
            venue: venue.map(|(venue_type, dwell_minutes)| VenueReading {
                venue_type,
                dwell_minutes,
                quality: 1.0,
            }),
            taken_at_ms: 0,
        }
    }

    fn saturday_night() -> TemporalReading {
        TemporalReading {
            hour_of_day: 23,
            day_of_week: 5,
            is_weekend: true,
        }
    }

    fn weekday_noon() -> TemporalReading {
        TemporalReading {
            hour_of_day: 12,
            day_of_week: 2,
            is_weekend: false,
        }
    }

    // ── VibeVector ────────────────────────────────────────────────────────

    #[test]
    fn test_uniform_is_normalized() {
        assert_normalized(&VibeVector::uniform());
    }

    #[test]
    fn test_adjust_keeps_sum_at_one() {
        // VIB-001 over an arbitrary mutation sequence.
        let mut vec = VibeVector::uniform();
        vec.adjust(VibeCategory::Hype, 0.4, 1.0);
        assert_normalized(&vec);
        vec.adjust(VibeCategory::Chill, -0.9, 1.0);
        assert_normalized(&vec);
        vec.adjust(VibeCategory::Social, 5.0, 1.0);
        assert_normalized(&vec);
    }

    #[test]
    fn test_adjust_cap_limits_dominance() {
        // VIB-002: a huge delta cannot push one weight past cap before
        // normalization, so the category cannot fully dominate.
        let mut vec = VibeVector::uniform();
        vec.adjust(VibeCategory::Hype, 100.0, 0.5);
        // Pre-normalization: hype = 0.5, five others ≈ 0.1667 each.
        let hype = vec.get(VibeCategory::Hype);
        assert!(hype < 0.4, "hype={hype} should stay well below 1.0");
        assert_normalized(&vec);
    }

    #[test]
    fn test_zero_vector_is_degenerate_and_stable() {
        let mut vec = VibeVector::zero();
        assert!(vec.is_degenerate());
        vec.renormalize(); // no-op by contract
        assert!(vec.is_degenerate());
        assert_eq!(vec.dominant(), None);
    }

    #[test]
    fn test_adjust_from_zero_recovers() {
        let mut vec = VibeVector::zero();
        vec.adjust(VibeCategory::Solo, 0.3, 1.0);
        assert_normalized(&vec);
        assert_eq!(vec.dominant().map(|(c, _)| c), Some(VibeCategory::Solo));
    }

    #[test]
    fn test_blend_stays_normalized() {
        let mut a = VibeVector::uniform();
        let mut b = VibeVector::uniform();
        b.adjust(VibeCategory::Hype, 0.8, 1.0);
        a.blend(&b, 0.5);
        assert_normalized(&a);
        assert!(a.get(VibeCategory::Hype) > 1.0 / VIBE_CATEGORY_COUNT as f32);
    }

    // ── VibeEngine ────────────────────────────────────────────────────────

    #[test]
    fn test_empty_snapshot_is_insufficient_signal() {
        let mut engine = VibeEngine::new();
        let snapshot = SignalSnapshot::empty(0);
        assert!(matches!(
            engine.evaluate(&snapshot),
            Err(VibeError::InsufficientSignal)
        ));
        assert!(engine.last_vector().is_none());
    }

    #[test]
    fn test_fast_movement_boosts_hype_and_flowing() {
        let mut engine = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let snapshot = snapshot_with(Some(4.5), None, None, Some(weekday_noon()));
        let vec = engine.evaluate(&snapshot).unwrap();
        assert_normalized(&vec);
        let baseline = 1.0 / VIBE_CATEGORY_COUNT as f32;
        assert!(vec.get(VibeCategory::Hype) > baseline);
        assert!(vec.get(VibeCategory::Flowing) > baseline);
        assert!(vec.get(VibeCategory::Chill) < baseline);
    }

    #[test]
    fn test_night_screen_boosts_social() {
        let mut engine = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let night = snapshot_with(None, Some(0.8), None, Some(saturday_night()));
        let vec = engine.evaluate(&night).unwrap();
        let baseline = 1.0 / VIBE_CATEGORY_COUNT as f32;
        assert!(vec.get(VibeCategory::Social) > baseline);

        // Same screen use at noon: no social boost from the device rule.
        let mut engine = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let noon = snapshot_with(None, Some(0.8), None, Some(weekday_noon()));
        let vec = engine.evaluate(&noon).unwrap();
        assert!((vec.get(VibeCategory::Social) - baseline).abs() < 1e-5);
    }

    #[test]
    fn test_long_gym_dwell_boosts_hype() {
        let mut engine = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let snapshot = snapshot_with(
            Some(0.1),
            None,
            Some((VenueType::Gym, 45)),
            Some(weekday_noon()),
        );
        let vec = engine.evaluate(&snapshot).unwrap();
        assert_eq!(vec.dominant().map(|(c, _)| c), Some(VibeCategory::Hype));
    }

    #[test]
    fn test_short_dwell_has_no_venue_effect() {
        let mut engine = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let snapshot = snapshot_with(None, None, Some((VenueType::Gym, 3)), Some(weekday_noon()));
        let vec = engine.evaluate(&snapshot).unwrap();
        let baseline = 1.0 / VIBE_CATEGORY_COUNT as f32;
        assert!((vec.get(VibeCategory::Hype) - baseline).abs() < 1e-5);
    }

    #[test]
    fn test_idle_device_and_stationary_boosts_chill() {
        let mut engine = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let snapshot = snapshot_with(Some(0.0), Some(0.05), None, Some(weekday_noon()));
        let vec = engine.evaluate(&snapshot).unwrap();
        assert_eq!(vec.dominant().map(|(c, _)| c), Some(VibeCategory::Chill));
    }

    #[test]
    fn test_quality_scales_the_delta() {
        let mut confident = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);
        let mut doubtful = VibeEngine::with_table(WeightTable::default(), Prior::Uniform);

        let mut high_q = snapshot_with(Some(4.5), None, None, None);
        let mut low_q = high_q.clone();
        high_q.movement.as_mut().unwrap().quality = 1.0;
        low_q.movement.as_mut().unwrap().quality = 0.2;

        let strong = confident.evaluate(&high_q).unwrap();
        let weak = doubtful.evaluate(&low_q).unwrap();
        assert!(strong.get(VibeCategory::Hype) > weak.get(VibeCategory::Hype));
    }

    #[test]
    fn test_last_known_prior_carries_over() {
        let mut engine = VibeEngine::new(); // Prior::LastKnown
        let gym = snapshot_with(None, None, Some((VenueType::Gym, 45)), Some(weekday_noon()));
        let first = engine.evaluate(&gym).unwrap();
        assert!(first.get(VibeCategory::Hype) > 1.0 / VIBE_CATEGORY_COUNT as f32);

        // Next cycle with only temporal signal: hype persists above uniform
        // through the prior blend.
        let quiet = snapshot_with(None, None, None, Some(weekday_noon()));
        let second = engine.evaluate(&quiet).unwrap();
        assert!(second.get(VibeCategory::Hype) > 1.0 / VIBE_CATEGORY_COUNT as f32);
    }
}
