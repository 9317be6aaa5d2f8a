/// Rounds to 3 decimal places, matching the entity/publish rounding rule
/// used throughout spec §4 (kWh, power_kw).
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Banker's-indifferent round-to-nearest-integer used for forecast_kwh and
/// the restorer's impulse reconstruction (spec §4.4 step 6, §4.5 step 2).
pub fn round_to_i64(x: f64) -> i64 {
    x.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_three_decimals() {
        assert_eq!(round3(0.0016), 0.002);
        assert_eq!(round3(3.6), 3.6);
        assert_eq!(round3(20.0001), 20.0);
    }
}
