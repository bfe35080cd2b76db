//! Predictability gate for group coordination actions.
//!
//! Given each member's distribution of a scalar (arrival-time or position
//! offsets, normalized to the unit interval), decides whether the group's
//! behaviour is predictable enough to justify a merge/rally/convergence
//! suggestion.
//!
//! # Invariants
//!
//! - **PRD-001**: `spread` is monotonic in member divergence — more divergent
//!   members never produce a smaller spread.
//! - **PRD-002**: `ok = spread ≤ ω* AND gain ≥ τ`; when not ok the fallback
//!   is `Partition` for excess spread, `RelaxConstraints` for low gain.
//! - **PRD-003**: confidence reflects distance to the thresholds — decisions
//!   near either boundary are `Low` and callers use that to keep the
//!   suggestion off the screen.

use serde::{Deserialize, Serialize};

/// Default spread ceiling ω*.
pub const DEFAULT_OMEGA_STAR: f32 = 0.35;

/// Default minimum coordination gain τ.
pub const DEFAULT_TAU: f32 = 0.15;

/// Worst-case spread for unit-interval inputs; anchors the gain estimate.
const WORST_CASE_SPREAD: f32 = 1.0;

/// Fraction of a threshold that counts as "near the boundary" (PRD-003).
const NEAR_BAND_FRACTION: f32 = 0.25;

/// Fraction of a threshold both margins must clear for high confidence.
const WIDE_BAND_FRACTION: f32 = 0.5;

/// Suggested recovery when the gate says no (PRD-002).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Members are too divergent — split into subgroups.
    Partition,
    /// Spread is fine but the gain is too small — widen the time/radius
    /// window instead.
    RelaxConstraints,
}

/// How far the decision sits from the thresholds (PRD-003).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Both margins are wide; safe to surface to users.
    High,
    /// Neither near a boundary nor comfortably clear of both.
    Medium,
    /// Within the near-band of either threshold.
    Low,
}

/// Outcome of one predictability check. Created per request, never cached.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictabilityResult {
    /// `true` if the group is predictable enough to act on.
    pub ok: bool,
    /// Mean pairwise divergence between member distributions.
    pub spread: f32,
    /// Estimated reduction in coordination uncertainty from acting together.
    pub gain: f32,
    /// Suggested recovery when `ok` is false.
    pub fallback: Option<Fallback>,
    /// Boundary-sensitivity classification.
    pub confidence: Confidence,
}

/// Run the predictability gate over per-member scalar distributions.
///
/// `spread` is the mean pairwise absolute difference of per-member means
/// (PRD-001); `gain = 1 - spread / worst-case`. Members with empty
/// distributions are ignored; fewer than two usable members is maximally
/// unpredictable.
pub fn predictability_gate(
    member_dists: &[Vec<f32>],
    omega_star: f32,
    tau: f32,
) -> PredictabilityResult {
    let means: Vec<f32> = member_dists
        .iter()
        .filter(|d| !d.is_empty())
        .map(|d| d.iter().sum::<f32>() / d.len() as f32)
        .collect();

    if means.len() < 2 {
        return PredictabilityResult {
            ok: false,
            spread: WORST_CASE_SPREAD,
            gain: 0.0,
            fallback: Some(Fallback::Partition),
            confidence: Confidence::Low,
        };
    }

    let mut pair_count = 0u32;
    let mut pair_sum = 0.0f32;
    for i in 0..means.len() {
        for j in (i + 1)..means.len() {
            pair_sum += (means[i] - means[j]).abs();
            pair_count += 1;
        }
    }
    let spread = pair_sum / pair_count as f32;
    let gain = (1.0 - spread / WORST_CASE_SPREAD).clamp(0.0, 1.0);

    let ok = spread <= omega_star && gain >= tau;
    let fallback = if ok {
        None
    } else if spread > omega_star {
        Some(Fallback::Partition)
    } else {
        Some(Fallback::RelaxConstraints)
    };

    let spread_margin = (spread - omega_star).abs();
    let gain_margin = (gain - tau).abs();
    let confidence = if spread_margin < omega_star * NEAR_BAND_FRACTION
        || gain_margin < tau * NEAR_BAND_FRACTION
    {
        Confidence::Low
    } else if spread_margin >= omega_star * WIDE_BAND_FRACTION
        && gain_margin >= tau * WIDE_BAND_FRACTION
    {
        Confidence::High
    } else {
        Confidence::Medium
    };

    PredictabilityResult {
        ok,
        spread,
        gain,
        fallback,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(dists: &[Vec<f32>]) -> PredictabilityResult {
        predictability_gate(dists, DEFAULT_OMEGA_STAR, DEFAULT_TAU)
    }

    #[test]
    fn test_aligned_members_pass() {
        let r = gate(&[vec![0.50, 0.52], vec![0.49, 0.51], vec![0.50]]);
        assert!(r.ok, "spread={} gain={}", r.spread, r.gain);
        assert!(r.spread < 0.05);
        assert_eq!(r.fallback, None);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn test_divergent_members_partition() {
        // Means 0.1 and 0.9: spread 0.8 > ω*.
        let r = gate(&[vec![0.1], vec![0.9]]);
        assert!(!r.ok);
        assert_eq!(r.fallback, Some(Fallback::Partition));
        assert!((r.spread - 0.8).abs() < 1e-5);
        assert!((r.gain - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_spread_is_monotonic_in_divergence() {
        // PRD-001: widening one member's offset never shrinks the spread.
        let close = gate(&[vec![0.4], vec![0.5], vec![0.6]]);
        let wide = gate(&[vec![0.2], vec![0.5], vec![0.8]]);
        assert!(wide.spread > close.spread);
    }

    #[test]
    fn test_low_gain_relaxes_constraints() {
        // Spread under a permissive ω* but gain below a demanding τ.
        let r = predictability_gate(&[vec![0.1], vec![0.5]], 0.5, 0.9);
        assert!(!r.ok);
        assert!(r.spread <= 0.5);
        assert_eq!(r.fallback, Some(Fallback::RelaxConstraints));
    }

    #[test]
    fn test_near_threshold_is_low_confidence() {
        // Means 0.2 and 0.5: spread 0.3, within 25% of ω* = 0.35.
        let r = gate(&[vec![0.2], vec![0.5]]);
        assert_eq!(r.confidence, Confidence::Low);
    }

    #[test]
    fn test_single_member_is_unpredictable() {
        let r = gate(&[vec![0.5]]);
        assert!(!r.ok);
        assert_eq!(r.fallback, Some(Fallback::Partition));
        assert_eq!(r.confidence, Confidence::Low);
        assert_eq!(r.gain, 0.0);
    }

    #[test]
    fn test_empty_distributions_are_ignored() {
        // Two usable members plus one empty: behaves like the pair alone.
        let with_empty = gate(&[vec![0.4], vec![], vec![0.6]]);
        let pair = gate(&[vec![0.4], vec![0.6]]);
        assert_eq!(with_empty.spread, pair.spread);

        // All empty: degenerate.
        let r = gate(&[vec![], vec![]]);
        assert!(!r.ok);
        assert_eq!(r.fallback, Some(Fallback::Partition));
    }

    #[test]
    fn test_ok_decision_thresholds_exact() {
        // PRD-002 at the boundary: spread exactly ω* still passes.
        // 0.25 and 0.5 are exactly representable, so spread == ω* precisely.
        let r = predictability_gate(&[vec![0.25], vec![0.5]], 0.25, 0.15);
        assert_eq!(r.spread, 0.25);
        assert!(r.ok);
        // Confidence must be Low right at the threshold.
        assert_eq!(r.confidence, Confidence::Low);
    }
}
