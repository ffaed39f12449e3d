//! OAuth2 token lifecycle for the vehicle cloud
//!
//! Three grants are involved:
//! - client credentials, once per application, to obtain the partner token
//!   used for partner-account registration
//! - authorization code, once per account, pasted back by a human
//! - refresh token, whenever the Fleet API rejects an access token
//!
//! Token validity is never checked up front. Callers use the stored access
//! token, and on an authorization fault call [`TokenLifecycle::refresh`] and
//! restart their unit of work.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::read_json;
use crate::core::{Account, ApiError, CredentialStore, Credentials, RetryPolicy, TRANSPORT_FAULTS};
use crate::settings::Settings;

/// Scopes requested for the partner (client credentials) token
pub const PARTNER_SCOPES: &str = "openid vehicle_device_data vehicle_cmds vehicle_charging_cmds";

/// Scopes requested when a user authorizes the application
pub const USER_SCOPES: &str = "openid offline_access vehicle_device_data";

/// Token endpoint response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    fn access_token(&self) -> Result<String, ApiError> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(ApiError::MissingToken)
    }
}

/// Raw OAuth and registration calls
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<TokenResponse, ApiError>;

    async fn register_partner(&self, partner_token: &str, domain: &str) -> Result<(), ApiError>;

    async fn exchange_code(
        &self,
        credentials: &Credentials,
        partner_token: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ApiError>;

    async fn refresh_grant(&self, client_id: &str, refresh_token: &str) -> Result<TokenResponse, ApiError>;
}

/// HTTP implementation of [`AuthEndpoint`]
pub struct FleetAuthClient {
    client: reqwest::Client,
    auth_url: String,
    partner_auth_url: String,
    fleet_api_url: String,
}

impl FleetAuthClient {
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            client,
            auth_url: settings.auth_url.trim_end_matches('/').to_string(),
            partner_auth_url: settings.partner_auth_url.trim_end_matches('/').to_string(),
            fleet_api_url: settings.fleet_api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_token(
        &self,
        base: &str,
        params: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> Result<TokenResponse, ApiError> {
        let mut request = self
            .client
            .post(format!("{}/token", base))
            .header("Accept", "application/json")
            .form(params);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let json = read_json(request.send().await?).await?;
        serde_json::from_value(json).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AuthEndpoint for FleetAuthClient {
    async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<TokenResponse, ApiError> {
        tracing::debug!("Requesting partner token");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", scope),
            ("audience", self.fleet_api_url.as_str()),
        ];
        self.post_token(&self.partner_auth_url, &params, None).await
    }

    async fn register_partner(&self, partner_token: &str, domain: &str) -> Result<(), ApiError> {
        tracing::debug!("Registering partner account for {}", domain);
        let response = self
            .client
            .post(format!("{}/api/1/partner_accounts", self.fleet_api_url))
            .bearer_auth(partner_token)
            .json(&serde_json::json!({ "domain": domain }))
            .send()
            .await?;
        read_json(response).await.map(|_| ())
    }

    async fn exchange_code(
        &self,
        credentials: &Credentials,
        partner_token: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ApiError> {
        tracing::debug!("Exchanging authorization code");
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("audience", self.fleet_api_url.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        self.post_token(&self.auth_url, &params, Some(partner_token)).await
    }

    async fn refresh_grant(&self, client_id: &str, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        tracing::debug!("Refreshing access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
        ];
        self.post_token(&self.auth_url, &params, None).await
    }
}

/// Parameters for the interactive authorization flow
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub authorize_url: String,
    pub redirect_uri: String,
    pub scopes: String,
}

impl AuthConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            authorize_url: format!("{}/authorize", settings.auth_url.trim_end_matches('/')),
            redirect_uri: settings.redirect_uri.clone(),
            scopes: settings.scopes.clone(),
        }
    }
}

/// Obtains, authorizes and refreshes tokens, persisting every change
pub struct TokenLifecycle {
    endpoint: Arc<dyn AuthEndpoint>,
    store: Arc<dyn CredentialStore>,
    retry: RetryPolicy,
    config: AuthConfig,
}

impl TokenLifecycle {
    pub fn new(
        endpoint: Arc<dyn AuthEndpoint>,
        store: Arc<dyn CredentialStore>,
        retry: RetryPolicy,
        config: AuthConfig,
    ) -> Self {
        Self {
            endpoint,
            store,
            retry,
            config,
        }
    }

    /// Obtain the partner token and register the application's domain
    pub async fn register(&self, credentials: &mut Credentials) -> Result<(), ApiError> {
        let response = {
            let creds = &*credentials;
            self.retry
                .execute(TRANSPORT_FAULTS, |_| {
                    self.endpoint
                        .client_credentials(&creds.client_id, &creds.client_secret, PARTNER_SCOPES)
                })
                .await?
        };
        let partner_token = response.access_token()?;

        credentials.partner_token = Some(partner_token.clone());
        self.store.save(credentials)?;
        tracing::info!("Obtained partner token");

        let domain = credentials.domain.clone();
        self.retry
            .execute(TRANSPORT_FAULTS, |_| {
                self.endpoint.register_partner(&partner_token, &domain)
            })
            .await?;
        tracing::info!("Registered partner account for {}", domain);

        Ok(())
    }

    /// URL the user must visit to grant access
    pub fn authorization_url(&self, credentials: &Credentials, state: &str) -> Result<Url, ApiError> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", self.config.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| ApiError::Parse(format!("authorize URL: {}", e)))
    }

    /// Finish the authorization flow from the redirected callback URL
    pub async fn authorize(
        &self,
        credentials: &mut Credentials,
        username: &str,
        callback_url: &str,
        expected_state: Option<&str>,
    ) -> Result<(), ApiError> {
        let code = extract_code(callback_url, expected_state)?;
        let partner_token = credentials
            .partner_token
            .clone()
            .ok_or(ApiError::NotRegistered)?;

        let response = {
            let creds = &*credentials;
            self.retry
                .execute(TRANSPORT_FAULTS, |_| {
                    self.endpoint.exchange_code(
                        creds,
                        &partner_token,
                        &code,
                        &self.config.redirect_uri,
                    )
                })
                .await?
        };

        let access_token = response.access_token()?;
        let refresh_token = response.refresh_token.clone().unwrap_or_default();
        if refresh_token.is_empty() {
            tracing::warn!("No refresh token returned for {}; check the offline_access scope", username);
        }

        credentials.upsert_tokens(username, access_token, refresh_token);
        self.store.save(credentials)?;
        tracing::info!("Authorized {}", username);

        Ok(())
    }

    /// Exchange the stored refresh token for a new pair and persist it
    pub async fn refresh(&self, credentials: &mut Credentials, username: &str) -> Result<(), ApiError> {
        let refresh_token = credentials
            .account(username)
            .map(|a| a.refresh_token.clone())
            .ok_or_else(|| ApiError::UnknownAccount(username.to_string()))?;
        if refresh_token.is_empty() {
            return Err(ApiError::MissingToken);
        }

        let client_id = credentials.client_id.clone();
        let response = self
            .retry
            .execute(TRANSPORT_FAULTS, |_| {
                self.endpoint.refresh_grant(&client_id, &refresh_token)
            })
            .await?;

        let access_token = response.access_token()?;
        let next_refresh = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or(refresh_token);

        credentials.upsert_tokens(username, access_token, next_refresh);
        self.store.save(credentials)?;
        tracing::info!("Refreshed tokens for {}", username);

        Ok(())
    }

    /// Bearer token for the account; never validates or refreshes
    pub fn current_token<'a>(&self, account: &'a Account) -> &'a str {
        &account.access_token
    }
}

/// Pull the `code` parameter out of a pasted redirect URL
pub fn extract_code(callback_url: &str, expected_state: Option<&str>) -> Result<String, ApiError> {
    let url = Url::parse(callback_url.trim())
        .map_err(|e| ApiError::InvalidCallback(format!("{}: {}", callback_url.trim(), e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(ApiError::InvalidCallback(format!("authorization denied: {}", value))),
            _ => {}
        }
    }

    if let (Some(expected), Some(actual)) = (expected_state, state.as_deref()) {
        if expected != actual {
            return Err(ApiError::InvalidCallback("state parameter mismatch".to_string()));
        }
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::InvalidCallback("missing code parameter".to_string()))
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted endpoint; each call pops the next queued result
    #[derive(Default)]
    pub struct FakeAuthEndpoint {
        pub client_credentials: Mutex<VecDeque<Result<TokenResponse, ApiError>>>,
        pub register: Mutex<VecDeque<Result<(), ApiError>>>,
        pub exchange: Mutex<VecDeque<Result<TokenResponse, ApiError>>>,
        pub refresh: Mutex<VecDeque<Result<TokenResponse, ApiError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    pub fn tokens(access: &str, refresh: &str) -> TokenResponse {
        TokenResponse {
            access_token: Some(access.to_string()),
            refresh_token: Some(refresh.to_string()),
            expires_in: Some(28800),
            token_type: Some("Bearer".to_string()),
        }
    }

    impl FakeAuthEndpoint {
        pub fn with_refresh(results: Vec<Result<TokenResponse, ApiError>>) -> Self {
            let fake = Self::default();
            *fake.refresh.lock().unwrap() = results.into();
            fake
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn pop<T>(queue: &Mutex<VecDeque<Result<T, ApiError>>>) -> Result<T, ApiError> {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Http { status: 500, message: "unscripted call".into() }))
        }
    }

    #[async_trait]
    impl AuthEndpoint for FakeAuthEndpoint {
        async fn client_credentials(&self, client_id: &str, _: &str, scope: &str) -> Result<TokenResponse, ApiError> {
            self.calls.lock().unwrap().push(format!("client_credentials:{}:{}", client_id, scope));
            Self::pop(&self.client_credentials)
        }

        async fn register_partner(&self, partner_token: &str, domain: &str) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("register:{}:{}", partner_token, domain));
            Self::pop(&self.register)
        }

        async fn exchange_code(
            &self,
            _: &Credentials,
            partner_token: &str,
            code: &str,
            _: &str,
        ) -> Result<TokenResponse, ApiError> {
            self.calls.lock().unwrap().push(format!("exchange:{}:{}", partner_token, code));
            Self::pop(&self.exchange)
        }

        async fn refresh_grant(&self, _: &str, refresh_token: &str) -> Result<TokenResponse, ApiError> {
            self.calls.lock().unwrap().push(format!("refresh:{}", refresh_token));
            Self::pop(&self.refresh)
        }
    }
}
