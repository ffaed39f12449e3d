//! Vehicle cloud clients
//!
//! - `auth`: OAuth2 token lifecycle (partner registration, user authorization, refresh)
//! - `api`: account → vehicle → state/telemetry queries

pub mod api;
pub mod auth;

pub use api::{FleetApiClient, VehicleApi};
pub use auth::{AuthConfig, AuthEndpoint, FleetAuthClient, TokenLifecycle, TokenResponse};

use std::time::Duration;

use crate::core::ApiError;

/// Shared HTTP client for every outbound call
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .user_agent(concat!("tesla-recorder/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read a JSON body, mapping HTTP status and envelope `error` fields to faults
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::from_status(status.as_u16(), &body));
    }

    let json: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;

    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ApiError::from_envelope(&message));
    }

    Ok(json)
}
