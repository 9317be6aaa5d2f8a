use serde::{Deserialize, Serialize};

/// Inbound device-list envelope published by the impulse-counting gateway.
/// Unknown fields on each device record (voltage, firmware version, etc.)
/// are intentionally ignored — only `mac` and `ts` matter to this pipeline.
#[derive(Debug, Deserialize)]
pub struct DeviceListFrame {
    #[serde(default)]
    pub dev_list: Vec<DeviceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRecord {
    pub mac: String,
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Consolidated processed-state message republished to `onemeter/energy/{device_id}/state`.
#[derive(Debug, Clone, Serialize)]
pub struct StateMessage {
    pub timestamp: String,
    pub impulses: u64,
    pub kwh: f64,
    pub power_kw: f64,
    pub forecast_kwh: i64,
}
