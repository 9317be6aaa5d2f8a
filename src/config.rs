use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

fn default_device_id() -> String {
    "om9613".into()
}
fn default_target_mac() -> String {
    "E58D81019613".into()
}
fn default_subscribe_topic() -> String {
    "onemeter/s10/v1".into()
}
fn default_impulses_per_kwh() -> i64 {
    1000
}
fn default_max_power_kw() -> f64 {
    20.0
}
fn default_power_average_window() -> u32 {
    2
}
fn default_power_timeout_seconds() -> u64 {
    300
}
fn default_forecast_tick_seconds() -> u64 {
    3600
}
fn default_snapshot_path() -> String {
    "onemeter_state.json".into()
}
fn default_http_port() -> u16 {
    8090
}
fn default_broker_port() -> u16 {
    1883
}

/// Immutable per-session configuration. Loaded once at startup from a JSON
/// file; there is no runtime reconfiguration (that lives in the out-of-scope
/// wizard/options-editor UI).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default = "default_target_mac")]
    pub target_mac: String,
    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,
    #[serde(default = "default_impulses_per_kwh")]
    pub impulses_per_kwh: i64,
    #[serde(default = "default_max_power_kw")]
    pub max_power_kw: f64,
    #[serde(default = "default_power_average_window")]
    pub power_average_window: u32,
    #[serde(default = "default_power_timeout_seconds")]
    pub power_timeout_seconds: u64,
    #[serde(default)]
    pub initial_kwh: f64,
    #[serde(default)]
    pub monthly_usage_kwh: f64,

    // Ambient (broker connection, snapshot, HTTP surface) — carry no core semantics.
    pub broker_host: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_forecast_tick_seconds")]
    pub forecast_tick_seconds: u64,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Config {
    pub fn load(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| AppError::ConfigParse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Mirrors the wizard's two-step validation (spec §6) as a programmatic check.
    pub fn validate(&self) -> AppResult<()> {
        if self.impulses_per_kwh <= 0 {
            return Err(AppError::InvalidImpulses(self.impulses_per_kwh));
        }
        if self.max_power_kw <= 0.0 {
            return Err(AppError::InvalidMaxPower(self.max_power_kw));
        }
        if self.power_average_window == 0 {
            return Err(AppError::InvalidPowerAverageWindow(self.power_average_window));
        }
        if self.power_timeout_seconds == 0 {
            return Err(AppError::InvalidPowerTimeout(self.power_timeout_seconds));
        }
        let mac = self.target_mac.trim();
        if mac.len() != 12 || !mac.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::InvalidMac(self.target_mac.clone()));
        }
        Ok(())
    }

    pub fn client_id_or_default(&self) -> String {
        if self.client_id.is_empty() {
            format!("onemeter-bridge-{}", uuid::Uuid::new_v4())
        } else {
            self.client_id.clone()
        }
    }

    pub fn state_topic(&self) -> String {
        format!("onemeter/energy/{}/state", self.device_id)
    }

    pub fn status_topic(&self) -> String {
        format!("onemeter/energy/{}/status", self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            device_id: "om9613".into(),
            target_mac: "E58D81019613".into(),
            subscribe_topic: "onemeter/s10/v1".into(),
            impulses_per_kwh: 1000,
            max_power_kw: 20.0,
            power_average_window: 2,
            power_timeout_seconds: 300,
            initial_kwh: 0.0,
            monthly_usage_kwh: 0.0,
            broker_host: "localhost".into(),
            broker_port: 1883,
            username: None,
            password: None,
            client_id: String::new(),
            forecast_tick_seconds: 3600,
            snapshot_path: "onemeter_state.json".into(),
            http_port: 8090,
        }
    }

    #[test]
    fn rejects_non_positive_impulses_per_kwh() {
        let mut cfg = base_config();
        cfg.impulses_per_kwh = 0;
        assert!(matches!(cfg.validate(), Err(AppError::InvalidImpulses(0))));
    }

    #[test]
    fn rejects_malformed_mac() {
        let mut cfg = base_config();
        cfg.target_mac = "not-a-mac".into();
        assert!(matches!(cfg.validate(), Err(AppError::InvalidMac(_))));
    }

    #[test]
    fn accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }
}
