//! Group cohesion estimation from member energy signals.
//!
//! Cohesion and fragmentation risk are deliberately *not* complementary:
//! risk uses a steeper slope (×1.5 on variance) than cohesion's collapse
//! (variance/0.25), so risk triggers early while cohesion is still holding —
//! a separate early-warning channel for callers.
//!
//! # Invariants
//!
//! - **COH-001**: the empty group is maximally fragmented by definition —
//!   `{energy: 0, cohesion: 0, fragmentation_risk: 1}`.
//! - **COH-002**: all outputs bounded [0.0, 1.0]; the estimate is symmetric
//!   under permutation of its input.

use serde::{Deserialize, Serialize};

/// Variance at which cohesion reaches zero. 0.25 is the maximum variance of
/// values spread across the unit interval.
const VARIANCE_FLOOR: f32 = 0.25;

/// Slope applied to variance for the fragmentation-risk channel.
const FRAGMENTATION_SLOPE: f32 = 1.5;

/// One group participant's signal. Ephemeral — supplied per computation,
/// never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberSignal {
    /// Current energy level [0.0, 1.0].
    pub energy: f32,
    /// Optional style/affinity axis [0.0, 1.0]; unused by the energy-variance
    /// estimate but carried for callers that cluster on it.
    pub style: Option<f32>,
}

impl MemberSignal {
    /// Member with an energy reading and no style axis.
    pub fn energy(energy: f32) -> Self {
        Self {
            energy,
            style: None,
        }
    }
}

/// Derived cohesion scores. Recomputed on demand, never cached here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cohesion {
    /// Mean member energy.
    pub energy: f32,
    /// How aligned the group's energies are [0.0, 1.0].
    pub cohesion: f32,
    /// Early-warning fragmentation channel [0.0, 1.0] (steeper slope than
    /// `1 - cohesion`).
    pub fragmentation_risk: f32,
}

/// Estimate group cohesion from member energy signals.
///
/// `mean` and population variance over energies, then:
/// `cohesion = clamp01(1 - variance/0.25)`,
/// `fragmentation_risk = clamp01(variance * 1.5)`.
pub fn estimate_cohesion(members: &[MemberSignal]) -> Cohesion {
    if members.is_empty() {
        // COH-001: no group, maximally fragmented.
        return Cohesion {
            energy: 0.0,
            cohesion: 0.0,
            fragmentation_risk: 1.0,
        };
    }

    let n = members.len() as f32;
    let mean = members.iter().map(|m| m.energy).sum::<f32>() / n;
    let variance = members
        .iter()
        .map(|m| {
            let d = m.energy - mean;
            d * d
        })
        .sum::<f32>()
        / n;

    Cohesion {
        energy: mean,
        cohesion: (1.0 - variance / VARIANCE_FLOOR).clamp(0.0, 1.0),
        fragmentation_risk: (variance * FRAGMENTATION_SLOPE).clamp(0.0, 1.0),
    }
}
