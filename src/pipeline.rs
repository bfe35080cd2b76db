//! The presence pipeline — explicit context object wiring the whole stack.
//!
//! One pipeline instance owns its collectors, engine, scheduler, gate,
//! preference queue, and publisher; there is no global state, so tests
//! construct isolated instances. Downstream interest is served by a typed
//! broadcast channel instead of an ambient event bus.
//!
//! Data flows strictly downward: collect → fuse → (gate → publish) →
//! reschedule. Nothing above the gate may reach the network boundary, and a
//! gate denial is terminal for the cycle — there is no bypass path.
//!
//! # Invariants
//!
//! - **PIP-001**: the publisher is only ever invoked from inside
//!   [`with_gate`]; a denial means no network call this cycle.
//! - **PIP-002**: a rate-limit hint is honoured — no publish attempt is made
//!   before the backoff expires.
//! - **PIP-003**: every cycle ends by rearming the scheduler from the fresh
//!   snapshot, whether or not inference or publish succeeded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::collector::{collect_snapshot, SignalCollector, DEFAULT_COLLECT_TIMEOUT};
use crate::error::VibeError;
use crate::privacy::{
    with_gate, DegradeMode, GateDecision, GateRequest, PrivacyEnvelope, RankTimeGate,
};
use crate::publish::{PresencePayload, PresencePublisher, Visibility};
use crate::queue::{PreferenceQueue, PreferenceSignal};
use crate::scheduler::AdaptiveScheduler;
use crate::signal::SignalSnapshot;
use crate::vibe::{VibeEngine, VibeVector};

/// Backoff applied when the publisher rate-limits without a hint.
const DEFAULT_BACKOFF_SECS: u64 = 60;

// ─── Events ─────────────────────────────────────────────────────────────────

/// Typed pipeline notifications, broadcast to any number of subscribers.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// A fusion cycle produced a fresh vector.
    VibeUpdated {
        /// The normalized vector for this cycle.
        vector: VibeVector,
    },
    /// The cycle produced no vector (insufficient signal).
    CycleSkipped {
        /// Why the cycle was skipped.
        reason: String,
    },
    /// The privacy gate ruled on a publish attempt.
    GateDecided {
        /// Receipt minted for the decision.
        receipt_id: String,
        /// Whether publishing was allowed.
        ok: bool,
        /// Fidelity the gate allowed.
        degrade: DegradeMode,
    },
    /// A gated payload was accepted by the publisher.
    PresencePublished {
        /// Receipt of the approving gate decision.
        receipt_id: String,
    },
    /// Publish skipped because a rate-limit backoff is still in force.
    PublishDeferred {
        /// Epoch ms until which publishing stays paused.
        until_ms: i64,
    },
    /// The publisher failed after gate approval.
    PublishFailed {
        /// `true` for rate-limit/network failures the caller should retry.
        retryable: bool,
        /// Failure description.
        reason: String,
    },
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// Pipeline construction parameters.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Privacy envelope every publish is gated under.
    pub envelope: PrivacyEnvelope,
    /// Per-collector deadline when assembling snapshots.
    pub collect_timeout: Duration,
    /// Broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            envelope: PrivacyEnvelope::Balanced,
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
            event_capacity: 64,
        }
    }
}

/// One publish request accompanying a cycle.
#[derive(Clone, Debug)]
pub struct PublishIntent {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Audience for the presence.
    pub visibility: Visibility,
    /// Venue anchor, if any.
    pub venue_id: Option<Uuid>,
    /// Cohort size backing the aggregate, if known.
    pub cohort_size: Option<u32>,
    /// Privacy budget this publish consumes.
    pub epsilon_cost: f64,
}

/// What one `run_cycle` call did.
#[derive(Debug)]
pub struct CycleReport {
    /// The snapshot assembled this cycle.
    pub snapshot: SignalSnapshot,
    /// The fused vector, absent on insufficient signal.
    pub vector: Option<VibeVector>,
    /// The gate's ruling, when a publish was attempted.
    pub gate: Option<GateDecision>,
    /// Refresh interval armed for the next cycle.
    pub interval: Duration,
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

/// Explicit context object owning one device session's inference stack.
pub struct PresencePipeline {
    collectors: Vec<Box<dyn SignalCollector>>,
    engine: VibeEngine,
    scheduler: AdaptiveScheduler,
    gate: RankTimeGate,
    queue: PreferenceQueue,
    publisher: Arc<dyn PresencePublisher>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    events: broadcast::Sender<PipelineEvent>,
    tick_tx: mpsc::UnboundedSender<()>,
    tick_rx: mpsc::UnboundedReceiver<()>,
    backoff_until_ms: Option<i64>,
}

impl PresencePipeline {
    /// Assemble a pipeline from its injected parts.
    pub fn new(
        collectors: Vec<Box<dyn SignalCollector>>,
        engine: VibeEngine,
        gate: RankTimeGate,
        publisher: Arc<dyn PresencePublisher>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        Self {
            collectors,
            engine,
            scheduler: AdaptiveScheduler::new(),
            gate,
            queue: PreferenceQueue::new(),
            publisher,
            clock,
            config,
            events,
            tick_tx,
            tick_rx,
            backoff_until_ms: None,
        }
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Run one inference cycle: collect, fuse, optionally publish through
    /// the gate, then rearm the refresh timer (PIP-003).
    ///
    /// Returns `Err` only for a malformed publish intent
    /// ([`VibeError::Validation`]); insufficient signal and publish failures
    /// are recoverable, reported in the [`CycleReport`] and on the event
    /// channel.
    pub async fn run_cycle(
        &mut self,
        intent: Option<PublishIntent>,
    ) -> Result<CycleReport, VibeError> {
        let snapshot = collect_snapshot(
            &mut self.collectors,
            self.clock.as_ref(),
            self.config.collect_timeout,
        )
        .await;

        let vector = match self.engine.evaluate(&snapshot) {
            Ok(vector) => {
                self.emit(PipelineEvent::VibeUpdated {
                    vector: vector.clone(),
                });
                Some(vector)
            }
            Err(VibeError::InsufficientSignal) => {
                self.emit(PipelineEvent::CycleSkipped {
                    reason: "insufficient_signal".to_string(),
                });
                None
            }
            Err(other) => return Err(other),
        };

        let gate = match (&vector, intent) {
            (Some(vector), Some(intent)) => {
                let vector = vector.clone();
                self.publish_gated(&vector, intent, &snapshot).await?
            }
            _ => None,
        };

        let interval = self.arm_next(&snapshot);
        Ok(CycleReport {
            snapshot,
            vector,
            gate,
            interval,
        })
    }

    /// Wait until the armed refresh timer fires. The host loop alternates
    /// `run_cycle` and `tick_due`.
    pub async fn tick_due(&mut self) {
        let _ = self.tick_rx.recv().await;
    }

    /// Cancel the pending refresh timer, if any.
    pub fn cancel_refresh(&mut self) {
        self.scheduler.cancel();
    }

    /// Interval computed by the most recent cycle.
    pub fn current_interval(&self) -> Option<Duration> {
        self.scheduler.current_interval()
    }

    /// Record one preference decision event.
    pub fn record_preference(&mut self, signal: PreferenceSignal) {
        self.queue.push(signal);
    }

    /// Drain up to `max` queued preference signals, oldest first. Pass
    /// [`DRAIN_BATCH`](crate::queue::DRAIN_BATCH) for the standard upload
    /// batch.
    pub fn drain_preferences(&mut self, max: usize) -> Vec<PreferenceSignal> {
        self.queue.drain_batch(max)
    }

    /// Number of queued preference signals.
    pub fn queued_preferences(&self) -> usize {
        self.queue.len()
    }

    /// Shared access to the gate for maintenance (budget rotation).
    pub fn gate(&self) -> &RankTimeGate {
        &self.gate
    }

    // ── Internals ─────────────────────────────────────────────────────────

    async fn publish_gated(
        &mut self,
        vector: &VibeVector,
        intent: PublishIntent,
        snapshot: &SignalSnapshot,
    ) -> Result<Option<GateDecision>, VibeError> {
        // Backoff first: a deferred publish must not spend gate budget
        // (PIP-002).
        let now = self.clock.now_ms();
        if let Some(until) = self.backoff_until_ms {
            if now < until {
                self.emit(PipelineEvent::PublishDeferred { until_ms: until });
                return Ok(None);
            }
            self.backoff_until_ms = None;
        }

        let Some((vibe, _)) = vector.dominant() else {
            return Ok(None);
        };
        let payload = PresencePayload {
            lat: intent.lat,
            lng: intent.lng,
            vibe,
            visibility: intent.visibility,
            venue_id: intent.venue_id,
        };
        // Reject malformed payloads before the gate and before the network
        // (PUB-001) — an invalid request must not spend epsilon either.
        payload.validate()?;

        let request = GateRequest {
            envelope: self.config.envelope,
            feature_timestamps: vec![snapshot.taken_at_ms],
            cohort_size: intent.cohort_size,
            epsilon_cost: intent.epsilon_cost,
        };

        let publisher = self.publisher.clone();
        let outcome = with_gate(&self.gate, &request, |degrade| {
            let payload = payload.clone();
            async move {
                match payload.at_fidelity(degrade) {
                    Some(gated) => publisher.publish(&gated).await,
                    // Unreachable under PRV-001: ok pairs with Full/Category.
                    None => Ok(()),
                }
            }
        })
        .await;

        self.emit(PipelineEvent::GateDecided {
            receipt_id: outcome.decision.receipt_id.clone(),
            ok: outcome.decision.ok,
            degrade: outcome.decision.degrade,
        });

        match outcome.data {
            Some(Ok(())) => {
                self.emit(PipelineEvent::PresencePublished {
                    receipt_id: outcome.decision.receipt_id.clone(),
                });
            }
            Some(Err(VibeError::RateLimited { retry_after_secs })) => {
                let secs = retry_after_secs.unwrap_or(DEFAULT_BACKOFF_SECS);
                let until = now + (secs as i64) * 1000;
                self.backoff_until_ms = Some(until);
                tracing::warn!(retry_after_secs = secs, "publisher rate limited, backing off");
                self.emit(PipelineEvent::PublishFailed {
                    retryable: true,
                    reason: "rate_limit".to_string(),
                });
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "presence publish failed");
                self.emit(PipelineEvent::PublishFailed {
                    retryable: err.is_retryable(),
                    reason: err.to_string(),
                });
            }
            None => {} // gate denial: terminal for this cycle (PIP-001)
        }

        Ok(Some(outcome.decision))
    }

    fn arm_next(&mut self, snapshot: &SignalSnapshot) -> Duration {
        let tick_tx = self.tick_tx.clone();
        self.scheduler.schedule(
            move || {
                let _ = tick_tx.send(());
            },
            snapshot,
        );
        // schedule() always records the interval it armed.
        self.scheduler
            .current_interval()
            .unwrap_or(crate::scheduler::INTERVAL_DEFAULT)
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine; events are best-effort observability.
        let _ = self.events.send(event);
    }
}
