use serde::{ Serialize, Deserialize };

pub const UNAVAILABLE: &str = "N/A";
pub const CONNECTION_ERROR: &str = "Connection Error";
pub const NORMAL_LABEL: &str = "Normal";

/// Sensor snapshot sent to `/predict`. Field names match the model's feature columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(rename = "Engine_RPM")]
    pub engine_rpm: f64,
    #[serde(rename = "Coolant_Temp_C")]
    pub coolant_temp_c: f64,
    #[serde(rename = "Battery_Voltage_V")]
    pub battery_voltage_v: f64,
    #[serde(rename = "Brake_Temp_C")]
    pub brake_temp_c: f64,
    #[serde(rename = "Vehicle_Speed_KPH")]
    pub vehicle_speed_kph: f64,
    #[serde(rename = "Short_Term_Fuel_Trim_Percent")]
    pub short_term_fuel_trim_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub prediction: String,
    pub confidence: String,
}

impl StatusReport {
    pub fn new(prediction: impl Into<String>, confidence: impl Into<String>) -> Self {
        Self {
            prediction: prediction.into(),
            confidence: confidence.into(),
        }
    }

    /// Placeholder shown before the first poll completes.
    pub fn unavailable() -> Self {
        Self::new(UNAVAILABLE, UNAVAILABLE)
    }

    pub fn connection_error() -> Self {
        Self::new(CONNECTION_ERROR, "0")
    }

    pub fn is_normal(&self) -> bool {
        self.prediction == NORMAL_LABEL
    }
}

impl Default for StatusReport {
    fn default() -> Self {
        Self::unavailable()
    }
}
