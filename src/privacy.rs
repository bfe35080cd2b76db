//! Rank-time privacy gate — the terminal checkpoint before anything leaves
//! the device.
//!
//! The gate runs three ordered checks (staleness, cohort floor, epsilon
//! budget), degrades fidelity as they fail, and mints an audit receipt for
//! every decision. Denials are policy outcomes, not errors.
//!
//! # Invariants
//!
//! - **PRV-001**: `ok == true` ⟺ `degrade ∈ {Full, Category}`;
//!   `ok == false` ⟺ `degrade ∈ {Binary, Suppress}`.
//! - **PRV-002**: every call mints a fresh receipt — identical requests give
//!   identical decisions but distinct receipts (idempotent decision,
//!   non-idempotent receipt).
//! - **PRV-003**: the epsilon ledger is mutated under a mutex; concurrent
//!   decisions can never collectively overspend the budget. Cost is charged
//!   only for decisions that permit disclosure.
//! - **PRV-004**: `with_gate` never starts the wrapped work on a denial, and
//!   dropping the composed future before completion drops the un-started or
//!   in-flight work with it.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::audit::{AuditSink, GateEvent, TracingAuditSink};
use crate::clock::Clock;

// ─── Envelopes ──────────────────────────────────────────────────────────────

/// Named privacy policy profile. Immutable; selected by the caller per
/// request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyEnvelope {
    /// Tightest profile: fresh data, large cohorts, small budget.
    Strict,
    /// Everyday profile.
    Balanced,
    /// Loosest profile, still gated.
    Permissive,
}

impl PrivacyEnvelope {
    /// All envelopes, in ledger index order.
    pub const ALL: [PrivacyEnvelope; 3] = [
        PrivacyEnvelope::Strict,
        PrivacyEnvelope::Balanced,
        PrivacyEnvelope::Permissive,
    ];

    fn index(&self) -> usize {
        match self {
            PrivacyEnvelope::Strict => 0,
            PrivacyEnvelope::Balanced => 1,
            PrivacyEnvelope::Permissive => 2,
        }
    }
}

/// Calibration constants for one envelope. These are tuning parameters, not
/// ground truth — hosts adjust them against real data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopePolicy {
    /// Newest feature timestamp may be at most this old.
    pub freshness_window_ms: i64,
    /// Minimum cohort size for any fidelity above binary (k-anonymity
    /// floor).
    pub cohort_floor: u32,
    /// Ceiling on cumulative epsilon spend.
    pub epsilon_ceiling: f64,
}

impl EnvelopePolicy {
    /// Default policy table: strict 60 s / 20 / 1.0, balanced 5 min / 8 /
    /// 4.0, permissive 30 min / 3 / 16.0.
    pub fn defaults(envelope: PrivacyEnvelope) -> Self {
        match envelope {
            PrivacyEnvelope::Strict => Self {
                freshness_window_ms: 60_000,
                cohort_floor: 20,
                epsilon_ceiling: 1.0,
            },
            PrivacyEnvelope::Balanced => Self {
                freshness_window_ms: 300_000,
                cohort_floor: 8,
                epsilon_ceiling: 4.0,
            },
            PrivacyEnvelope::Permissive => Self {
                freshness_window_ms: 1_800_000,
                cohort_floor: 3,
                epsilon_ceiling: 16.0,
            },
        }
    }
}

// ─── Decisions ──────────────────────────────────────────────────────────────

/// Fidelity level the gate allows. Ordered from least to most restrictive,
/// so `max` picks the stricter of two modes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DegradeMode {
    /// Publish as-is.
    Full,
    /// Bucketed/coarsened output only.
    Category,
    /// Present/absent bit only; pairs with `ok: false` (PRV-001).
    Binary,
    /// Nothing leaves the device.
    Suppress,
}

impl DegradeMode {
    /// One step stricter (saturating at `Suppress`).
    pub fn stepped_down(self) -> Self {
        match self {
            DegradeMode::Full => DegradeMode::Category,
            DegradeMode::Category => DegradeMode::Binary,
            DegradeMode::Binary | DegradeMode::Suppress => DegradeMode::Suppress,
        }
    }

    /// The stricter of two modes.
    pub fn stricter(self, other: Self) -> Self {
        self.max(other)
    }
}

/// Outcome of one gate call (PRV-001, PRV-002). Created per request, never
/// cached by the gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    /// `true` when the result may be published (at `degrade` fidelity).
    pub ok: bool,
    /// Allowed fidelity.
    pub degrade: DegradeMode,
    /// Fresh audit receipt for this decision.
    pub receipt_id: String,
    /// Why the gate degraded or denied, when it did.
    pub reason: Option<String>,
}

/// Inputs to one gate decision.
#[derive(Clone, Debug, PartialEq)]
pub struct GateRequest {
    /// Policy profile to decide under.
    pub envelope: PrivacyEnvelope,
    /// Unix epoch ms of every feature that contributed to the result.
    pub feature_timestamps: Vec<i64>,
    /// Number of similar users the aggregate covers; `None` when unknown.
    pub cohort_size: Option<u32>,
    /// Privacy budget this disclosure would consume.
    pub epsilon_cost: f64,
}

// ─── Gate ───────────────────────────────────────────────────────────────────

/// The rank-time privacy gate. Owns the per-envelope epsilon ledger
/// (PRV-003) and the audit sink.
pub struct RankTimeGate {
    clock: Arc<dyn Clock>,
    policies: [EnvelopePolicy; 3],
    spent: Mutex<[f64; 3]>,
    sink: Arc<dyn AuditSink>,
}

impl RankTimeGate {
    /// Gate with the default policy table and the tracing audit sink.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_sink(clock, Arc::new(TracingAuditSink))
    }

    /// Gate with the default policy table and an explicit audit sink.
    pub fn with_sink(clock: Arc<dyn Clock>, sink: Arc<dyn AuditSink>) -> Self {
        let policies = [
            EnvelopePolicy::defaults(PrivacyEnvelope::Strict),
            EnvelopePolicy::defaults(PrivacyEnvelope::Balanced),
            EnvelopePolicy::defaults(PrivacyEnvelope::Permissive),
        ];
        Self {
            clock,
            policies,
            spent: Mutex::new([0.0; 3]),
            sink,
        }
    }

    /// Replace one envelope's policy constants (calibration hook).
    pub fn set_policy(&mut self, envelope: PrivacyEnvelope, policy: EnvelopePolicy) {
        self.policies[envelope.index()] = policy;
    }

    /// The policy currently in force for `envelope`.
    pub fn policy(&self, envelope: PrivacyEnvelope) -> EnvelopePolicy {
        self.policies[envelope.index()]
    }

    /// Unspent epsilon budget for `envelope`.
    pub async fn epsilon_remaining(&self, envelope: PrivacyEnvelope) -> f64 {
        let spent = self.spent.lock().await;
        (self.policy(envelope).epsilon_ceiling - spent[envelope.index()]).max(0.0)
    }

    /// Reset one envelope's spend to zero. Budget windows are rotated by the
    /// host application.
    pub async fn reset_budget(&self, envelope: PrivacyEnvelope) {
        let mut spent = self.spent.lock().await;
        spent[envelope.index()] = 0.0;
    }

    /// Decide whether (and at what fidelity) the described result may be
    /// published. Mints a fresh receipt and records it on the audit sink —
    /// for denials exactly as for approvals (PRV-002).
    pub async fn decide(&self, request: &GateRequest) -> GateDecision {
        let policy = self.policy(request.envelope);
        let mut ok = true;
        let mut degrade = DegradeMode::Full;
        let mut reason: Option<String> = None;

        // 1. Staleness: newest contributing feature inside the freshness
        //    window, else degrade one level. No timestamps counts as stale.
        let now = self.clock.now_ms();
        let newest = request.feature_timestamps.iter().copied().max();
        let stale = match newest {
            Some(ts) => now.saturating_sub(ts) > policy.freshness_window_ms,
            None => true,
        };
        if stale {
            degrade = degrade.stepped_down();
            reason = Some("stale_features".to_string());
        }

        // 2. Cohort floor (k-anonymity). Unknown or tiny cohorts cannot be
        //    published above the present/absent bit.
        let hard_floor = policy.cohort_floor.div_ceil(2);
        match request.cohort_size {
            Some(size) if size >= policy.cohort_floor => {}
            Some(size) if size >= hard_floor => {
                degrade = degrade.stricter(DegradeMode::Category);
                reason = Some("cohort_below_floor".to_string());
            }
            _ => {
                ok = false;
                degrade = degrade.stricter(DegradeMode::Binary);
                reason = Some("cohort_too_small".to_string());
            }
        }

        // 3. Epsilon budget. Checked and charged only while the decision
        //    still permits disclosure — a denial spends nothing (PRV-003).
        if ok {
            let idx = request.envelope.index();
            let mut spent = self.spent.lock().await;
            if spent[idx] + request.epsilon_cost > policy.epsilon_ceiling {
                ok = false;
                degrade = DegradeMode::Suppress;
                reason = Some("epsilon_budget_exhausted".to_string());
            } else {
                spent[idx] += request.epsilon_cost;
            }
        }

        let decision = GateDecision {
            ok,
            degrade,
            receipt_id: Uuid::new_v4().to_string(),
            reason,
        };
        debug_assert!(
            decision.ok
                == matches!(decision.degrade, DegradeMode::Full | DegradeMode::Category),
            "PRV-001 pairing violated"
        );
        self.sink.record(&GateEvent {
            event: "gate_decision",
            envelope: request.envelope,
            receipt_id: decision.receipt_id.clone(),
            degrade: decision.degrade,
            reason: decision.reason.clone(),
        });
        decision
    }
}

// ─── Composition helper ─────────────────────────────────────────────────────

/// Result of running work through [`with_gate`].
#[derive(Clone, Debug, PartialEq)]
pub struct GateOutcome<T> {
    /// The gate's decision, receipt included.
    pub decision: GateDecision,
    /// The work's output — present only when the gate said ok.
    pub data: Option<T>,
}

/// Run `work` behind the gate (PRV-004).
///
/// The gate decides first; only on `ok` is `work` invoked, receiving the
/// allowed [`DegradeMode`] so it can adapt fidelity. On a denial the work is
/// never constructed, let alone started — the gate is a circuit breaker, not
/// an advisory flag. Cancellation propagates by ordinary future-drop
/// semantics: nothing here is spawned.
pub async fn with_gate<T, F, Fut>(
    gate: &RankTimeGate,
    request: &GateRequest,
    work: F,
) -> GateOutcome<T>
where
    F: FnOnce(DegradeMode) -> Fut,
    Fut: Future<Output = T>,
{
    let decision = gate.decide(request).await;
    if !decision.ok {
        return GateOutcome {
            decision,
            data: None,
        };
    }
    let data = work(decision.degrade).await;
    GateOutcome {
        decision,
        data: Some(data),
    }
}
