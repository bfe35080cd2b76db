//! Gate receipt log — the audit trail proving a publish was checked.
//!
//! Every gate decision, approval or denial, is emitted as one [`GateEvent`]
//! through an [`AuditSink`]. The default sink writes a structured tracing
//! event; tests use [`MemoryAuditSink`] to assert on the trail.

use std::sync::Mutex;

use serde::Serialize;

use crate::privacy::{DegradeMode, PrivacyEnvelope};

/// One entry in the gate receipt log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GateEvent {
    /// Event name; currently always `"gate_decision"`.
    pub event: &'static str,
    /// Envelope the decision was made under.
    pub envelope: PrivacyEnvelope,
    /// Receipt minted for this decision. Never reused.
    pub receipt_id: String,
    /// Fidelity the gate allowed.
    pub degrade: DegradeMode,
    /// Denial/degrade reason, when there is one.
    pub reason: Option<String>,
}

/// Observability sink for gate decisions.
pub trait AuditSink: Send + Sync {
    /// Record one decision. Must be called for denials as well as approvals.
    fn record(&self, event: &GateEvent);
}

/// Default sink: structured `tracing` events under the
/// `vibe_core::audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &GateEvent) {
        tracing::info!(
            target: "vibe_core::audit",
            event = event.event,
            envelope = ?event.envelope,
            receipt_id = %event.receipt_id,
            degrade = ?event.degrade,
            reason = event.reason.as_deref().unwrap_or(""),
            "gate decision"
        );
    }
}

/// In-memory sink for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<GateEvent>>,
}

impl MemoryAuditSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded trail, oldest first.
    pub fn events(&self) -> Vec<GateEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &GateEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
