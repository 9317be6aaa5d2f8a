use serde::{Deserialize, Serialize};

/// Durable snapshot written after every accepted pulse and on clean detach.
/// Stands in for "the host's entity-state snapshot" that spec §4.5 restores
/// the Energy entity from — see SPEC_FULL.md §1.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub kwh: f64,
    pub latest_forecast_kwh: i64,
    pub kwh_at_month_start_impulses: u64,
    pub last_month_checked: u32,
    pub month_start_timestamp: f64,
}

/// Attach/subscribe lifecycle of the coordinator (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Unattached,
    AttachedNotSubscribed,
    AttachedSubscribed,
    Detaching,
}

/// Read-only snapshot fanned out to the three entities and the HTTP surface
/// after every coordinator-owned state mutation.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedState {
    pub attach_state_label: &'static str,
    pub total_impulses: u64,
    pub kwh: f64,
    pub power_kw: f64,
    pub forecast_kwh: i64,
    pub kwh_at_month_start_impulses: u64,
    pub last_month_checked: u32,
    pub month_start_timestamp: f64,
    /// Seconds since epoch of the most recent accepted pulse, if any.
    pub last_impulse_time: Option<f64>,
}

impl AttachState {
    pub fn label(self) -> &'static str {
        match self {
            AttachState::Unattached => "unattached",
            AttachState::AttachedNotSubscribed => "attached_not_subscribed",
            AttachState::AttachedSubscribed => "attached_subscribed",
            AttachState::Detaching => "detaching",
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, AttachState::AttachedSubscribed)
    }
}
