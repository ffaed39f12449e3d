//! Fleet API vehicle queries
//!
//! Listing vehicles and reading a vehicle's state are cheap and never wake a
//! sleeping car. Reading the charge state is expensive and will wake it, so
//! callers only ask for it once the vehicle is confirmed online.

use async_trait::async_trait;
use serde_json::Value;

use super::read_json;
use crate::core::{ApiError, ChargeState, Vehicle, VehicleState};

/// HTTP status the Fleet API uses for "vehicle unavailable"
const VEHICLE_UNAVAILABLE: u16 = 408;

/// Account → vehicle → state/telemetry queries, all bearer-authenticated
#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// Vehicles visible to the token's owner (identity and state only)
    async fn list_vehicles(&self, token: &str) -> Result<Vec<Vehicle>, ApiError>;

    /// Lightweight connectivity state
    async fn fetch_state(&self, token: &str, vehicle: &Vehicle) -> Result<VehicleState, ApiError>;

    /// Full charge state, or `None` when the vehicle cannot be queried right now
    async fn fetch_charge_state(&self, token: &str, vehicle: &Vehicle) -> Result<Option<ChargeState>, ApiError>;
}

/// HTTP implementation of [`VehicleApi`]
pub struct FleetApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl FleetApiClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn vehicle_url(&self, vehicle: &Vehicle) -> String {
        format!("{}/api/1/vehicles/{}", self.base_url, vehicle.vin)
    }

    async fn get(&self, url: &str, token: &str) -> Result<reqwest::Response, ApiError> {
        tracing::debug!("GET {}", url);
        Ok(self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?)
    }
}

#[async_trait]
impl VehicleApi for FleetApiClient {
    async fn list_vehicles(&self, token: &str) -> Result<Vec<Vehicle>, ApiError> {
        let url = format!("{}/api/1/vehicles", self.base_url);
        let json = read_json(self.get(&url, token).await?).await?;
        let list = response_field(json)?;
        serde_json::from_value(list).map_err(|e| ApiError::Parse(format!("vehicle list: {}", e)))
    }

    async fn fetch_state(&self, token: &str, vehicle: &Vehicle) -> Result<VehicleState, ApiError> {
        let json = read_json(self.get(&self.vehicle_url(vehicle), token).await?).await?;
        let response = response_field(json)?;
        Ok(response
            .get("state")
            .cloned()
            .and_then(|s| serde_json::from_value(s).ok())
            .unwrap_or_default())
    }

    async fn fetch_charge_state(&self, token: &str, vehicle: &Vehicle) -> Result<Option<ChargeState>, ApiError> {
        let url = format!("{}/vehicle_data?endpoints=charge_state", self.vehicle_url(vehicle));
        let response = self.get(&url, token).await?;

        if response.status().as_u16() == VEHICLE_UNAVAILABLE {
            tracing::debug!("{} reported unavailable", vehicle.name());
            return Ok(None);
        }

        let json = read_json(response).await?;
        match response_field(json)?.get("charge_state") {
            Some(Value::Null) | None => Ok(None),
            Some(charge) => serde_json::from_value(charge.clone())
                .map(Some)
                .map_err(|e| ApiError::Parse(format!("charge_state: {}", e))),
        }
    }
}

/// Unwrap the `response` member of the Fleet API envelope
fn response_field(mut json: Value) -> Result<Value, ApiError> {
    match json.get_mut("response").map(Value::take) {
        Some(Value::Null) | None => Err(ApiError::Parse("missing response field".to_string())),
        Some(value) => Ok(value),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vehicle() -> Vehicle {
        Vehicle::new("5YJ3E1EA7KF000001", "Lightning's Car", VehicleState::Unknown)
    }

    #[tokio::test]
    async fn test_list_vehicles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": [
                    {"id": 1, "vin": "VIN1", "display_name": "One", "state": "online"},
                    {"id": 2, "vin": "VIN2", "display_name": null, "state": "asleep"}
                ],
                "count": 2
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        let vehicles = api.list_vehicles("access-1").await.unwrap();

        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[0].name(), "One");
        assert_eq!(vehicles[0].state, VehicleState::Online);
        assert_eq!(vehicles[1].name(), "VIN2");
        assert_eq!(vehicles[1].state, VehicleState::Asleep);
    }

    #[tokio::test]
    async fn test_expired_token_is_authorization_fault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "response": null,
                "error": "token expired (401)",
                "error_description": ""
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        let err = api.list_vehicles("stale").await.unwrap_err();
        assert!(err.is_authorization());
    }

    #[tokio::test]
    async fn test_envelope_error_with_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": null,
                "error": "invalid bearer token"
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        assert!(api.list_vehicles("bad").await.unwrap_err().is_authorization());
    }

    #[tokio::test]
    async fn test_gateway_timeout_is_transport_fault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        assert!(api.fetch_state("t", &vehicle()).await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_fault() {
        let api = FleetApiClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert!(api.list_vehicles("t").await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_fetch_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/5YJ3E1EA7KF000001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"vin": "5YJ3E1EA7KF000001", "state": "offline"}
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        assert_eq!(api.fetch_state("t", &vehicle()).await.unwrap(), VehicleState::Offline);
    }

    #[tokio::test]
    async fn test_fetch_charge_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/5YJ3E1EA7KF000001/vehicle_data"))
            .and(query_param("endpoints", "charge_state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "vin": "5YJ3E1EA7KF000001",
                    "charge_state": {
                        "battery_level": 72,
                        "charging_state": "Charging",
                        "est_battery_range": 210.5,
                        "timestamp": 1700000000000i64
                    }
                }
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        let charge = api.fetch_charge_state("t", &vehicle()).await.unwrap().unwrap();
        assert_eq!(charge.battery_level, 72);
        assert_eq!(charge.timestamp, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_unavailable_vehicle_has_no_charge_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/5YJ3E1EA7KF000001/vehicle_data"))
            .respond_with(ResponseTemplate::new(408).set_body_json(serde_json::json!({
                "response": null,
                "error": "vehicle unavailable: vehicle is offline or asleep"
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        assert!(api.fetch_charge_state("t", &vehicle()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_null_charge_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/5YJ3E1EA7KF000001/vehicle_data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"vin": "5YJ3E1EA7KF000001", "charge_state": null}
            })))
            .mount(&server)
            .await;

        let api = FleetApiClient::new(reqwest::Client::new(), &server.uri());
        assert!(api.fetch_charge_state("t", &vehicle()).await.unwrap().is_none());
    }
}
