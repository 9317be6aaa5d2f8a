use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::util::round_to_i64;

const ELAPSED_DAYS_EPS: f64 = 0.01;

fn to_datetime(t: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(t.floor() as i64, 0).single().unwrap_or_else(Utc::now)
}

fn days_in_month(year: i32, month: u32) -> f64 {
    let next_month_first = if month == 12 {
        Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()
    } else {
        Utc.with_ymd_and_hms(year, month + 1, 1, 0, 0, 0).single()
    }
    .expect("valid month arithmetic");
    let this_month_first = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("valid month");
    (next_month_first - this_month_first).num_days() as f64
}

/// Month-to-date forecast engine (spec §4.4): maintains a month-baseline
/// counter and a month-start anchor, projects end-of-month consumption by
/// linear extrapolation, and resets on month boundary.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    pub kwh_at_month_start_impulses: u64,
    pub last_month_checked: u32,
    pub month_start_timestamp: f64,
    pub latest_forecast_kwh: i64,
}

impl ForecastEngine {
    pub fn new(
        kwh_at_month_start_impulses: u64,
        last_month_checked: u32,
        month_start_timestamp: f64,
    ) -> Self {
        Self {
            kwh_at_month_start_impulses,
            last_month_checked,
            month_start_timestamp,
            latest_forecast_kwh: 0,
        }
    }

    /// Recomputes the forecast at time `t` given the current cumulative
    /// impulse counter. Called on every accepted pulse and on the periodic
    /// tick (spec §4.4, §4.7).
    pub fn recompute(&mut self, t: f64, total_impulses: u64, impulses_per_kwh: i64) {
        let dt = to_datetime(t);
        let m_now = dt.month();

        if m_now != self.last_month_checked {
            self.kwh_at_month_start_impulses = total_impulses;
            self.last_month_checked = m_now;
            self.month_start_timestamp = t;
        } else if self.kwh_at_month_start_impulses == 0 && total_impulses > 0 {
            self.kwh_at_month_start_impulses = total_impulses;
            self.month_start_timestamp = t;
        }

        let used_kwh =
            (total_impulses.saturating_sub(self.kwh_at_month_start_impulses)) as f64 / impulses_per_kwh as f64;
        let elapsed_days = ((t - self.month_start_timestamp) / 86400.0).max(0.0);

        let forecast_kwh = if elapsed_days > ELAPSED_DAYS_EPS && used_kwh > 0.0 && m_now == self.last_month_checked {
            (used_kwh / elapsed_days) * days_in_month(dt.year(), m_now)
        } else {
            0.0
        };

        self.latest_forecast_kwh = round_to_i64(forecast_kwh).max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> f64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap().timestamp() as f64
    }

    #[test]
    fn forecast_is_zero_immediately_after_month_start() {
        let mut engine = ForecastEngine::new(0, 10, 0.0);
        let t = ts(2026, 11, 1, 0, 0, 0);
        engine.recompute(t, 123_457, 1000);
        assert_eq!(engine.latest_forecast_kwh, 0);
        assert_eq!(engine.kwh_at_month_start_impulses, 123_457);
        assert_eq!(engine.last_month_checked, 11);
    }

    #[test]
    fn month_rollover_sets_baseline_to_triggering_pulse() {
        let mut engine = ForecastEngine::new(100_000, 10, ts(2026, 10, 1, 0, 0, 0));
        let t = ts(2026, 11, 1, 0, 0, 0);
        engine.recompute(t, 123_457, 1000);
        assert_eq!(engine.kwh_at_month_start_impulses, 123_457);
        assert_eq!(engine.last_month_checked, 11);
        assert_eq!(engine.month_start_timestamp, t);
    }

    #[test]
    fn forecast_extrapolates_linearly_within_month() {
        // 10 days into a 30-day month, used 100 kWh → forecast ~300 kWh.
        // Baseline must be non-zero going in, else the step-2 bootstrap reseed
        // (kwh_at_month_start_impulses == 0) would fire on this same pulse and
        // zero out the forecast instead of extrapolating.
        let month_start = ts(2026, 4, 1, 0, 0, 0);
        let mut engine = ForecastEngine::new(100_000, 4, month_start);
        let t = month_start + 10.0 * 86400.0;
        engine.recompute(t, 200_000, 1000);
        assert_eq!(engine.latest_forecast_kwh, 300);
    }

    #[test]
    fn forecast_never_negative() {
        let mut engine = ForecastEngine::new(0, 4, ts(2026, 4, 1, 0, 0, 0));
        engine.recompute(ts(2026, 4, 1, 0, 0, 0), 0, 1000);
        assert!(engine.latest_forecast_kwh >= 0);
    }

    #[test]
    fn restart_bootstrap_seeds_baseline_only_when_zero() {
        let mut engine = ForecastEngine::new(0, 4, 0.0);
        let t = ts(2026, 4, 5, 0, 0, 0);
        engine.recompute(t, 500, 1000);
        assert_eq!(engine.kwh_at_month_start_impulses, 500);
        assert_eq!(engine.month_start_timestamp, t);

        // A later pulse in the same month must not reseed the baseline again.
        let t2 = t + 86400.0;
        engine.recompute(t2, 600, 1000);
        assert_eq!(engine.kwh_at_month_start_impulses, 500);
        assert_eq!(engine.month_start_timestamp, t);
    }
}
