//! Time-series points derived from charge-state observations

use std::collections::BTreeMap;

use super::{ChargeState, Vehicle};

pub const SERIES_STATE: &str = "state";
pub const SERIES_EST_BATTERY_RANGE: &str = "est_battery_range";
pub const SERIES_CHARGING_STATE: &str = "charging_state";

/// Field name used for every series
pub const VALUE_FIELD: &str = "value";

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// One point for the metrics sink
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub series: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub tags: BTreeMap<String, String>,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

impl MetricPoint {
    fn single(series: &str, value: FieldValue, tags: &BTreeMap<String, String>, timestamp: i64) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(VALUE_FIELD.to_string(), value);
        Self {
            series: series.to_string(),
            fields,
            tags: tags.clone(),
            timestamp,
        }
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.fields.get(VALUE_FIELD)
    }
}

/// Replace apostrophes, which the sink cannot store in tag values
pub fn normalize_tag(value: &str) -> String {
    value.replace(['\'', '\u{2019}'], "_")
}

/// Build the points for one observation.
///
/// All points share the vehicle tags and the telemetry timestamp; the
/// `charging_state` point is only emitted when the vehicle reports one.
pub fn build_points(vehicle: &Vehicle, charge: &ChargeState) -> Vec<MetricPoint> {
    let mut tags = BTreeMap::new();
    tags.insert("display_name".to_string(), normalize_tag(vehicle.name()));

    let mut points = vec![
        MetricPoint::single(SERIES_STATE, vehicle.state.as_str().into(), &tags, charge.timestamp),
        MetricPoint::single(
            SERIES_EST_BATTERY_RANGE,
            charge.est_battery_range.into(),
            &tags,
            charge.timestamp,
        ),
    ];

    if let Some(charging_state) = charge.charging_state.as_deref() {
        points.push(MetricPoint::single(
            SERIES_CHARGING_STATE,
            charging_state.into(),
            &tags,
            charge.timestamp,
        ));
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VehicleState;

    fn charge(charging_state: Option<&str>) -> ChargeState {
        ChargeState {
            charging_state: charging_state.map(String::from),
            battery_level: 72,
            est_battery_range: 210.5,
            timestamp: 1_700_000_000_000,
        }
    }

    fn find<'a>(points: &'a [MetricPoint], series: &str) -> &'a MetricPoint {
        points
            .iter()
            .find(|p| p.series == series)
            .unwrap_or_else(|| panic!("missing series {series}"))
    }

    #[test]
    fn test_points_for_charging_vehicle() {
        let vehicle = Vehicle::new("VIN1", "Lightning's Car", VehicleState::Online);
        let points = build_points(&vehicle, &charge(Some("Charging")));

        assert_eq!(points.len(), 3);
        assert_eq!(find(&points, "state").value(), Some(&FieldValue::Text("online".into())));
        assert_eq!(
            find(&points, "est_battery_range").value(),
            Some(&FieldValue::Float(210.5))
        );
        assert_eq!(
            find(&points, "charging_state").value(),
            Some(&FieldValue::Text("Charging".into()))
        );

        for point in &points {
            assert_eq!(point.tags.get("display_name").map(String::as_str), Some("Lightning_s_Car"));
            assert_eq!(point.timestamp, 1_700_000_000_000);
        }
    }

    #[test]
    fn test_missing_charging_state_emits_two_points() {
        let vehicle = Vehicle::new("VIN1", "Lightning's Car", VehicleState::Online);
        let points = build_points(&vehicle, &charge(None));

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.series != "charging_state"));
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("Bob's 'Model' 3"), "Bob_s _Model_ 3");
        assert_eq!(normalize_tag("Bob\u{2019}s"), "Bob_s");
        assert_eq!(normalize_tag("Plain"), "Plain");
    }

    #[test]
    fn test_unnamed_vehicle_tagged_by_vin() {
        let mut vehicle = Vehicle::new("VIN9", "", VehicleState::Online);
        vehicle.display_name = None;
        let points = build_points(&vehicle, &charge(None));
        assert_eq!(points[0].tags["display_name"], "VIN9");
    }
}
