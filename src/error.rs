use thiserror::Error;

/// Errors surfaced at process boundaries: config load and validation.
/// Per-pulse decode/publish errors are handled locally inside the coordinator
/// and never propagate here — one bad message must not be able to produce an
/// `AppError` that kills the subscription task. MQTT connection failures are
/// handled by `rumqttc`'s own event-loop reconnection (see `mqtt.rs`) rather
/// than surfaced through this enum.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid_impulses: impulses_per_kwh must be a positive integer, got {0}")]
    InvalidImpulses(i64),

    #[error("invalid_max_power: max_power_kw must be positive, got {0}")]
    InvalidMaxPower(f64),

    #[error("invalid_power_average_window: power_average_window must be positive, got {0}")]
    InvalidPowerAverageWindow(u32),

    #[error("invalid_power_timeout: power_timeout_seconds must be positive, got {0}")]
    InvalidPowerTimeout(u64),

    #[error("invalid_mac: target_mac must be exactly 12 hex characters, got {0:?}")]
    InvalidMac(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
