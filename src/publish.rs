//! Presence publish boundary — payload validation and the network seam.
//!
//! The publisher itself lives outside the core (Supabase shim, test fake);
//! the core validates the payload, applies the gate's degrade mode, and
//! interprets the publisher's failure modes. Validation happens *before*
//! any network call.
//!
//! # Invariants
//!
//! - **PUB-001**: coordinates and vibe are validated locally; a malformed
//!   payload never reaches the network.
//! - **PUB-002**: a 429-class response surfaces as
//!   [`VibeError::RateLimited`] with the caller-visible backoff hint, never
//!   as a hard failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VibeError;
use crate::privacy::DegradeMode;
use crate::vibe::VibeCategory;

/// Who may see the published presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Anyone on the map.
    Public,
    /// Friends only.
    Friends,
}

/// Coordinate precision (decimal places) kept under `Category` degrade —
/// roughly 1.1 km of positional blur.
const CATEGORY_COORD_DECIMALS: i32 = 2;

/// The payload accepted by the presence network boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// Latitude in degrees, [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, [-180, 180].
    pub lng: f64,
    /// Dominant vibe category at publish time.
    pub vibe: VibeCategory,
    /// Audience for this presence.
    pub visibility: Visibility,
    /// Venue the presence is anchored to, if any.
    pub venue_id: Option<Uuid>,
}

impl PresencePayload {
    /// Validate coordinates (PUB-001). Call before any network activity.
    pub fn validate(&self) -> Result<(), VibeError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(VibeError::Validation {
                field: "lat",
                reason: format!("{} outside [-90, 90]", self.lat),
            });
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(VibeError::Validation {
                field: "lng",
                reason: format!("{} outside [-180, 180]", self.lng),
            });
        }
        Ok(())
    }

    /// Apply a gate degrade mode to this payload.
    ///
    /// `Full` passes through; `Category` coarsens coordinates and drops the
    /// venue anchor; `Binary` and `Suppress` yield nothing — a payload at
    /// those fidelities never leaves the device.
    pub fn at_fidelity(&self, degrade: DegradeMode) -> Option<PresencePayload> {
        match degrade {
            DegradeMode::Full => Some(self.clone()),
            DegradeMode::Category => {
                let scale = 10f64.powi(CATEGORY_COORD_DECIMALS);
                Some(PresencePayload {
                    lat: (self.lat * scale).round() / scale,
                    lng: (self.lng * scale).round() / scale,
                    vibe: self.vibe,
                    visibility: self.visibility,
                    venue_id: None,
                })
            }
            DegradeMode::Binary | DegradeMode::Suppress => None,
        }
    }
}

/// The presence network boundary.
///
/// `Ok(())` means the presence was accepted. Failure modes are the two
/// retryable errors: [`VibeError::RateLimited`] (PUB-002) and
/// [`VibeError::Network`].
#[async_trait]
pub trait PresencePublisher: Send + Sync {
    /// Publish one validated, gated payload.
    async fn publish(&self, payload: &PresencePayload) -> Result<(), VibeError>;
}
