//! Client-side tracking state for one order: reconciles room events against
//! a local fallback simulation so the view keeps moving even when the feed
//! goes quiet. A protocol-sourced position always beats a simulated one.

use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::order::{GeoPoint, OrderStatus};
use crate::realtime::protocol::ClientEvent;

/// Default coordinate when geolocation is denied or unavailable (Pune).
pub const FALLBACK_POSITION: GeoPoint = GeoPoint {
    lat: 18.5204,
    lng: 73.8567,
};

const COURIER_SPEED_KMH: f64 = 25.0;
const SIMULATION_STEP: f64 = 0.04;
const DEFAULT_ETA_MINUTES: u32 = 15;
const MIN_ETA_MINUTES: u32 = 1;

/// Where the displayed partner marker comes from. `Live` is protocol truth;
/// `Simulated` exists only for UI continuity and never overrides `Live`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartnerPosition {
    Unknown,
    Live(GeoPoint),
    Simulated(GeoPoint),
}

impl PartnerPosition {
    pub fn coord(&self) -> Option<GeoPoint> {
        match self {
            PartnerPosition::Unknown => None,
            PartnerPosition::Live(c) | PartnerPosition::Simulated(c) => Some(*c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Subscribed,
    Closed,
}

/// One viewer's subscription state for one order.
#[derive(Debug)]
pub struct TrackingSession {
    order_id: Uuid,
    destination: GeoPoint,
    status: OrderStatus,
    phase: SessionPhase,
    position: PartnerPosition,
    eta_minutes: u32,
    degraded: bool,
    live_since_last_tick: bool,
}

impl TrackingSession {
    pub fn new(order_id: Uuid, destination: GeoPoint, initial_status: OrderStatus) -> Self {
        Self {
            order_id,
            destination,
            status: initial_status,
            phase: SessionPhase::Connecting,
            position: PartnerPosition::Unknown,
            eta_minutes: DEFAULT_ETA_MINUTES,
            degraded: false,
            live_since_last_tick: false,
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn position(&self) -> PartnerPosition {
        self.position
    }

    pub fn eta_minutes(&self) -> u32 {
        self.eta_minutes
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// The room-join message this session sends right after the initial
    /// snapshot read.
    pub fn join_event(&self) -> ClientEvent {
        ClientEvent::JoinOrder {
            order_id: self.order_id,
        }
    }

    /// Builds the position sample a partner-role session publishes on its
    /// sampling timer.
    pub fn location_event(&self, latitude: f64, longitude: f64) -> ClientEvent {
        ClientEvent::UpdateLocation {
            order_id: self.order_id,
            latitude,
            longitude,
        }
    }

    pub fn subscribed(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Subscribed;
        }
    }

    /// Applies a protocol-sourced partner position. Overrides any simulated
    /// position; the displayed ETA never increases between real updates and
    /// never drops below one minute.
    pub fn apply_location(&mut self, latitude: f64, longitude: f64) {
        if self.phase != SessionPhase::Subscribed || self.status.is_terminal() {
            return;
        }

        let coord = GeoPoint {
            lat: latitude,
            lng: longitude,
        };
        self.position = PartnerPosition::Live(coord);
        self.live_since_last_tick = true;

        let estimate = estimate_eta_minutes(coord, self.destination);
        self.eta_minutes = estimate.min(self.eta_minutes).max(MIN_ETA_MINUTES);
    }

    /// Status from the room is authoritative. A terminal status stops the
    /// simulation for good.
    pub fn apply_status(&mut self, status: OrderStatus) {
        self.status = status;
    }

    /// Advances the fallback simulation one step: moves the marker a small
    /// fraction of the remaining way toward the destination. Skipped when a
    /// live fix arrived since the previous tick, when the order is done, or
    /// when the session is not subscribed.
    pub fn tick_simulation(&mut self) {
        if self.phase != SessionPhase::Subscribed || self.status.is_terminal() {
            return;
        }
        if self.live_since_last_tick {
            self.live_since_last_tick = false;
            return;
        }

        let current = self.position.coord().unwrap_or(FALLBACK_POSITION);
        let next = GeoPoint {
            lat: current.lat + (self.destination.lat - current.lat) * SIMULATION_STEP,
            lng: current.lng + (self.destination.lng - current.lng) * SIMULATION_STEP,
        };

        self.position = PartnerPosition::Simulated(next);
        self.eta_minutes = self.eta_minutes.saturating_sub(1).max(MIN_ETA_MINUTES);
    }

    /// Geolocation denied or transport gone: pin the marker to a fixed
    /// fallback and keep rendering instead of failing.
    pub fn degrade(&mut self, fallback: GeoPoint) {
        self.degraded = true;
        if self.position == PartnerPosition::Unknown {
            self.position = PartnerPosition::Simulated(fallback);
        }
    }

    /// Unconditional and idempotent; the caller must also leave the room
    /// and cancel its simulation timer.
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }
}

/// Travel-time heuristic from the partner's position to the destination at
/// an assumed city courier speed. Never below one minute.
pub fn estimate_eta_minutes(from: GeoPoint, to: GeoPoint) -> u32 {
    let km = haversine_km(from, to);
    let minutes = (km / COURIER_SPEED_KMH * 60.0).ceil() as u32;
    minutes.max(MIN_ETA_MINUTES)
}
