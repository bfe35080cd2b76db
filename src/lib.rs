//! # vibe-core
//!
//! On-device vibe inference: continuously infer a user's social/activity
//! state from noisy local signals, adapt how often to re-infer under
//! power/cost constraints, score whether a *group* of such inferences is
//! coherent enough to act on, and run everything through a rank-time privacy
//! gate before a single byte leaves the device.
//!
//! ## The pipeline
//!
//! ```text
//! Collectors → SignalSnapshot → VibeEngine → VibeVector
//!      ↑              │
//! PlatformSensors     └→ AdaptiveScheduler (refresh interval)
//!
//! MemberSignals → estimate_cohesion ──────────┐
//! member distributions → predictability_gate ─┤
//!                                             ↓
//!                RankTimeGate (staleness / cohort / ε-budget)
//!                                             ↓ ok
//!                      PresencePublisher (network boundary)
//! ```
//!
//! Data flows strictly downward; nothing above the gate may call the
//! network boundary, and a gate denial is terminal for the cycle.
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`signal`] | [`SignalSnapshot`], [`VenueType`] | Typed readings, per-cycle immutable snapshot |
//! | [`collector`] | [`SignalCollector`], [`PlatformSensors`] | Async sources with timeout; unavailability is exclusion, not zero |
//! | [`vibe`] | [`VibeVector`], [`VibeEngine`] | Fusion into a normalized distribution over the closed vibe set |
//! | [`scheduler`] | [`AdaptiveScheduler`] | Decision-table refresh interval, one outstanding timer |
//! | [`cohesion`] | [`estimate_cohesion`] | Variance-based group cohesion and fragmentation risk |
//! | [`predictability`] | [`predictability_gate`] | Spread/gain thresholds with boundary-sensitive confidence |
//! | [`privacy`] | [`RankTimeGate`], [`with_gate`] | The terminal checkpoint: envelopes, degrade modes, ε-budget, receipts |
//! | [`audit`] | [`AuditSink`] | Receipt log for every gate decision, denials included |
//! | [`queue`] | [`PreferenceQueue`] | Capped append-only decision log with versioned snapshots |
//! | [`publish`] | [`PresencePublisher`] | Payload validation and the network seam |
//! | [`pipeline`] | [`PresencePipeline`] | Explicit context object wiring one device session |
//!
//! [`SignalSnapshot`]: signal::SignalSnapshot
//! [`VenueType`]: signal::VenueType
//! [`SignalCollector`]: collector::SignalCollector
//! [`PlatformSensors`]: collector::PlatformSensors
//! [`VibeVector`]: vibe::VibeVector
//! [`VibeEngine`]: vibe::VibeEngine
//! [`AdaptiveScheduler`]: scheduler::AdaptiveScheduler
//! [`estimate_cohesion`]: cohesion::estimate_cohesion
//! [`predictability_gate`]: predictability::predictability_gate
//! [`RankTimeGate`]: privacy::RankTimeGate
//! [`with_gate`]: privacy::with_gate
//! [`AuditSink`]: audit::AuditSink
//! [`PreferenceQueue`]: queue::PreferenceQueue
//! [`PresencePublisher`]: publish::PresencePublisher
//! [`PresencePipeline`]: pipeline::PresencePipeline

#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod audit;
pub mod clock;
pub mod cohesion;
pub mod collector;
pub mod error;
pub mod pipeline;
pub mod predictability;
pub mod privacy;
pub mod publish;
pub mod queue;
pub mod scheduler;
pub mod signal;
pub mod vibe;

pub use error::VibeError;
