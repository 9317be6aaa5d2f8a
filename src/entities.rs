use serde::Serialize;
use tokio::sync::watch;

use crate::models::state::PublishedState;

/// Static metadata shared by all three entities (spec §4.8, §6): device
/// identity, unique-id prefix, manufacturer/model/sw_version.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: (String,),
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: &'static str,
}

impl DeviceInfo {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            identifiers: (device_id.to_string(),),
            manufacturer: "OneMeter",
            model: "S10 impulse gateway bridge",
            sw_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnergyEntity {
    pub unique_id: String,
    pub unit: &'static str,
    pub device_class: &'static str,
    pub state_class: &'static str,
    pub available: bool,
    pub value_kwh: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerEntity {
    pub unique_id: String,
    pub unit: &'static str,
    pub device_class: &'static str,
    pub state_class: &'static str,
    pub available: bool,
    pub value_kw: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastEntity {
    pub unique_id: String,
    pub unit: &'static str,
    pub state_class: &'static str,
    pub available: bool,
    pub value_kwh: i64,
    pub kwh_at_month_start_imp: u64,
    pub last_month_checked: u32,
    pub month_start_timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub device: DeviceInfo,
    pub energy: EnergyEntity,
    pub power: PowerEntity,
    pub forecast: ForecastEntity,
}

/// Read-only projection over the coordinator's published state (spec §4.8).
/// Entities never mutate state; they only observe the latest `PublishedState`
/// snapshot and apply their own unit/availability presentation.
#[derive(Clone)]
pub struct EntityViews {
    device_id: String,
    published: watch::Receiver<PublishedState>,
}

impl EntityViews {
    pub fn new(device_id: String, published: watch::Receiver<PublishedState>) -> Self {
        Self { device_id, published }
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        let state = self.published.borrow();
        let available = state.attach_state_label == "attached_subscribed";

        EntitySnapshot {
            device: DeviceInfo::for_device(&self.device_id),
            energy: EnergyEntity {
                unique_id: format!("{}_energy_kwh", self.device_id),
                unit: "kWh",
                device_class: "energy",
                state_class: "total-increasing",
                available,
                value_kwh: state.kwh,
            },
            power: PowerEntity {
                unique_id: format!("{}_power_kw", self.device_id),
                unit: "kW",
                device_class: "power",
                state_class: "measurement",
                available,
                value_kw: state.power_kw,
            },
            forecast: ForecastEntity {
                unique_id: format!("{}_monthly_forecast_kwh", self.device_id),
                unit: "kWh",
                state_class: "measurement",
                available,
                value_kwh: state.forecast_kwh,
                kwh_at_month_start_imp: state.kwh_at_month_start_impulses,
                last_month_checked: state.last_month_checked,
                month_start_timestamp: state.month_start_timestamp,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::state::AttachState;

    fn published(attach: AttachState) -> PublishedState {
        PublishedState {
            attach_state_label: attach.label(),
            total_impulses: 1,
            kwh: 0.001,
            power_kw: 0.0,
            forecast_kwh: 0,
            kwh_at_month_start_impulses: 0,
            last_month_checked: 1,
            month_start_timestamp: 0.0,
            last_impulse_time: None,
        }
    }

    #[test]
    fn entities_are_unavailable_when_not_subscribed() {
        let (_tx, rx) = watch::channel(published(AttachState::AttachedNotSubscribed));
        let views = EntityViews::new("om9613".into(), rx);
        let snap = views.snapshot();
        assert!(!snap.energy.available);
        assert!(!snap.power.available);
        assert!(!snap.forecast.available);
    }

    #[test]
    fn entities_are_available_once_subscribed() {
        let (_tx, rx) = watch::channel(published(AttachState::AttachedSubscribed));
        let views = EntityViews::new("om9613".into(), rx);
        let snap = views.snapshot();
        assert!(snap.energy.available);
        assert_eq!(snap.energy.unique_id, "om9613_energy_kwh");
        assert_eq!(snap.power.unique_id, "om9613_power_kw");
        assert_eq!(snap.forecast.unique_id, "om9613_monthly_forecast_kwh");
    }
}
