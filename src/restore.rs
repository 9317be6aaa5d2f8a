use chrono::{Datelike, TimeZone, Utc};
use tracing::warn;

use crate::config::Config;
use crate::models::state::Snapshot;
use crate::util::round_to_i64;

/// Result of the state-restorer (spec §4.5): the seeded counter and the
/// month-baseline fields the `ForecastEngine` should start from.
pub struct RestoredState {
    pub total_impulses: u64,
    pub kwh_at_month_start_impulses: u64,
    pub last_month_checked: u32,
    pub month_start_timestamp: f64,
}

/// Reads the last snapshot (the local stand-in for "the host's entity-state
/// snapshot", SPEC_FULL.md §1) and falls back to the configured seed values
/// when absent or unparseable.
pub fn restore(config: &Config) -> RestoredState {
    let restored_kwh = match std::fs::read_to_string(&config.snapshot_path) {
        Ok(content) => match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) => snapshot.kwh,
            Err(e) => {
                warn!(error = %e, path = %config.snapshot_path, "snapshot unparseable, falling back to initial_kwh");
                config.initial_kwh
            }
        },
        Err(_) => config.initial_kwh,
    };

    let total_impulses = round_to_i64(restored_kwh * config.impulses_per_kwh as f64).max(0) as u64;
    let month_baseline_offset =
        round_to_i64(config.monthly_usage_kwh * config.impulses_per_kwh as f64).max(0) as u64;
    let kwh_at_month_start_impulses = total_impulses.saturating_sub(month_baseline_offset);

    let now = Utc::now();
    let month_start_timestamp = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
        .timestamp() as f64;

    RestoredState {
        total_impulses,
        kwh_at_month_start_impulses,
        last_month_checked: now.month(),
        month_start_timestamp,
    }
}

/// Persists the durable snapshot after an accepted pulse or on clean detach.
pub async fn save(path: &str, snapshot: &Snapshot) {
    match serde_json::to_vec_pretty(snapshot) {
        Ok(bytes) => {
            if let Err(e) = tokio::fs::write(path, bytes).await {
                tracing::error!(error = %e, path, "failed to write state snapshot");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize state snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_config(snapshot_path: String) -> Config {
        Config {
            device_id: "om9613".into(),
            target_mac: "E58D81019613".into(),
            subscribe_topic: "onemeter/s10/v1".into(),
            impulses_per_kwh: 1000,
            max_power_kw: 20.0,
            power_average_window: 2,
            power_timeout_seconds: 300,
            initial_kwh: 5.0,
            monthly_usage_kwh: 2.0,
            broker_host: "localhost".into(),
            broker_port: 1883,
            username: None,
            password: None,
            client_id: String::new(),
            forecast_tick_seconds: 3600,
            snapshot_path,
            http_port: 8090,
        }
    }

    #[test]
    fn falls_back_to_initial_kwh_when_snapshot_missing() {
        let cfg = test_config("/tmp/onemeter_bridge_test_missing_snapshot.json".into());
        let restored = restore(&cfg);
        assert_eq!(restored.total_impulses, 5000);
        assert_eq!(restored.kwh_at_month_start_impulses, 3000);
    }

    #[test]
    fn restores_from_existing_snapshot() {
        let path = "/tmp/onemeter_bridge_test_existing_snapshot.json";
        let snapshot = Snapshot {
            kwh: 12.5,
            latest_forecast_kwh: 40,
            kwh_at_month_start_impulses: 10_000,
            last_month_checked: 7,
            month_start_timestamp: 1_700_000_000.0,
        };
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(serde_json::to_string(&snapshot).unwrap().as_bytes()).unwrap();

        let cfg = test_config(path.into());
        let restored = restore(&cfg);
        assert_eq!(restored.total_impulses, 12_500);
        std::fs::remove_file(path).ok();
    }
}
