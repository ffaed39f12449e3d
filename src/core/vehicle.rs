//! Vehicle and charge-state models

use serde::{Deserialize, Serialize};

/// Connectivity state reported by the Fleet API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VehicleState {
    Online,
    Asleep,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl VehicleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleState::Online => "online",
            VehicleState::Asleep => "asleep",
            VehicleState::Offline => "offline",
            VehicleState::Unknown => "unknown",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, VehicleState::Online)
    }
}

impl std::fmt::Display for VehicleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vehicle associated with an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: VehicleState,
    #[serde(skip)]
    pub charge_state: Option<ChargeState>,
}

impl Vehicle {
    pub fn new(vin: impl Into<String>, display_name: impl Into<String>, state: VehicleState) -> Self {
        Self {
            vin: vin.into(),
            display_name: Some(display_name.into()),
            state,
            charge_state: None,
        }
    }

    /// Display name, falling back to the VIN for unnamed vehicles
    pub fn name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.vin,
        }
    }
}

/// Snapshot of the charge subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeState {
    #[serde(default)]
    pub charging_state: Option<String>,
    pub battery_level: u8,
    /// Miles
    pub est_battery_range: f64,
    /// Milliseconds since the epoch, as reported by the vehicle
    pub timestamp: i64,
}

impl ChargeState {
    /// Human readable observation time
    pub fn observed_at(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}
