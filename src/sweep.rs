//! One full pass over every account and vehicle
//!
//! Accounts and vehicles are isolated failure domains. Each level returns a
//! tagged outcome to its caller, which decides whether to continue, refresh
//! credentials and restart the account once, or give up on that branch.

use crate::core::{build_points, ApiError, Credentials, RetryPolicy, Vehicle, TRANSPORT_FAULTS};
use crate::fleet::{TokenLifecycle, VehicleApi};
use crate::sink::MetricsSink;

/// Result of sweeping one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    Completed {
        vehicles_recorded: usize,
        vehicles_skipped: usize,
    },
    /// Transport faults outlasted the retry budget
    SkippedTransient,
    /// Authorization failed again after one refresh
    SkippedAuthExpired,
    Fatal(String),
}

impl AccountOutcome {
    fn label(&self) -> &'static str {
        match self {
            AccountOutcome::Completed { .. } => "completed",
            AccountOutcome::SkippedTransient => "unreachable",
            AccountOutcome::SkippedAuthExpired => "auth expired",
            AccountOutcome::Fatal(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleOutcome {
    Recorded,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    pub username: String,
    pub outcome: AccountOutcome,
}

/// Per-account outcomes of a sweep, in account order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub accounts: Vec<AccountReport>,
}

impl SweepReport {
    pub fn outcome(&self, username: &str) -> Option<&AccountOutcome> {
        self.accounts
            .iter()
            .find(|a| a.username == username)
            .map(|a| &a.outcome)
    }

    pub fn vehicles_recorded(&self) -> usize {
        self.accounts
            .iter()
            .map(|a| match a.outcome {
                AccountOutcome::Completed { vehicles_recorded, .. } => vehicles_recorded,
                _ => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> String {
        if self.accounts.is_empty() {
            return "sweep finished: no accounts configured".to_string();
        }
        let parts: Vec<String> = self
            .accounts
            .iter()
            .map(|a| format!("{} {}", a.username, a.outcome.label()))
            .collect();
        format!(
            "sweep finished: {} vehicle(s) recorded; {}",
            self.vehicles_recorded(),
            parts.join(", ")
        )
    }
}

pub struct SweepOrchestrator<'a> {
    api: &'a dyn VehicleApi,
    tokens: &'a TokenLifecycle,
    sink: &'a dyn MetricsSink,
    retry: RetryPolicy,
    dry_run: bool,
}

impl<'a> SweepOrchestrator<'a> {
    pub fn new(
        api: &'a dyn VehicleApi,
        tokens: &'a TokenLifecycle,
        sink: &'a dyn MetricsSink,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            tokens,
            sink,
            retry,
            dry_run: false,
        }
    }

    /// Fetch and log everything but never write to the sink
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sweep every account in order. Never fails; problems are reported per account.
    pub async fn run(&self, credentials: &mut Credentials) -> SweepReport {
        let mut report = SweepReport::default();
        for username in credentials.usernames() {
            let outcome = self.sweep_account(credentials, &username).await;
            report.accounts.push(AccountReport { username, outcome });
        }
        tracing::info!("{}", report.summary());
        report
    }

    async fn sweep_account(&self, credentials: &mut Credentials, username: &str) -> AccountOutcome {
        let mut refreshed = false;
        loop {
            let token = match credentials.account(username) {
                Some(account) if account.is_authorized() => self.tokens.current_token(account).to_string(),
                _ => {
                    tracing::error!("account {} has no tokens; run `tesla-recorder authorize`", username);
                    return AccountOutcome::Fatal(ApiError::MissingToken.to_string());
                }
            };

            let err = match self.poll_account(&token).await {
                Ok((vehicles_recorded, vehicles_skipped)) => {
                    return AccountOutcome::Completed {
                        vehicles_recorded,
                        vehicles_skipped,
                    }
                }
                Err(e) => e,
            };

            if err.is_authorization() {
                if refreshed {
                    tracing::error!("account {} still unauthorized after refresh: {}", username, err);
                    return AccountOutcome::SkippedAuthExpired;
                }
                refreshed = true;
                tracing::info!("account {} token rejected, refreshing", username);
                if let Err(e) = self.tokens.refresh(credentials, username).await {
                    if e.is_transport() {
                        tracing::info!(error = %e, "account {} unreachable", username);
                        return AccountOutcome::SkippedTransient;
                    }
                    tracing::error!("account {} token refresh failed: {}", username, e);
                    return AccountOutcome::SkippedAuthExpired;
                }
                continue;
            }

            if err.is_transport() {
                tracing::info!(error = %err, "account {} unreachable", username);
                return AccountOutcome::SkippedTransient;
            }

            tracing::error!("account {} failed: {}", username, err);
            return AccountOutcome::Fatal(err.to_string());
        }
    }

    /// Poll every vehicle of one account. Only authorization faults escape
    /// past a single vehicle, since they invalidate the whole account's work.
    async fn poll_account(&self, token: &str) -> Result<(usize, usize), ApiError> {
        let vehicles = self
            .retry
            .execute(TRANSPORT_FAULTS, |_| self.api.list_vehicles(token))
            .await?;
        tracing::debug!("found {} vehicle(s)", vehicles.len());

        let mut recorded = 0;
        let mut skipped = 0;
        for mut vehicle in vehicles {
            match self.poll_vehicle(token, &mut vehicle).await {
                Ok(VehicleOutcome::Recorded) => recorded += 1,
                Ok(VehicleOutcome::Skipped) => skipped += 1,
                Err(e) if e.is_authorization() => return Err(e),
                Err(e) if e.is_transport() => {
                    tracing::info!(error = %e, "{} unreachable, skipping", vehicle.name());
                    skipped += 1;
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", vehicle.name(), e);
                    skipped += 1;
                }
            }
        }
        Ok((recorded, skipped))
    }

    async fn poll_vehicle(&self, token: &str, vehicle: &mut Vehicle) -> Result<VehicleOutcome, ApiError> {
        let state = {
            let current = &*vehicle;
            self.retry
                .execute(TRANSPORT_FAULTS, |_| self.api.fetch_state(token, current))
                .await?
        };
        vehicle.state = state;

        // Anything but online would be woken up by the data request
        if !state.is_online() {
            tracing::info!("{} is {}, skipping", vehicle.name(), state);
            return Ok(VehicleOutcome::Skipped);
        }

        let charge = {
            let current = &*vehicle;
            self.retry
                .execute(TRANSPORT_FAULTS, |_| self.api.fetch_charge_state(token, current))
                .await?
        };
        let Some(charge) = charge else {
            tracing::warn!("{} cannot be queried", vehicle.name());
            return Ok(VehicleOutcome::Skipped);
        };

        tracing::info!(
            observed_at = %charge.observed_at(),
            "{} is {} with a SOC of {}% and an estimate range of {} miles timestamp {}",
            vehicle.name(),
            charge.charging_state.as_deref().unwrap_or("unknown"),
            charge.battery_level,
            charge.est_battery_range,
            charge.timestamp
        );

        let points = build_points(vehicle, &charge);
        vehicle.charge_state = Some(charge);

        if !self.dry_run {
            self.retry
                .execute(TRANSPORT_FAULTS, |_| self.sink.write_points(&points))
                .await
                .map_err(sink_fault)?;
        }
        Ok(VehicleOutcome::Recorded)
    }
}

/// Sink faults stay at vehicle level; only the vehicle token restarts an account.
fn sink_fault(e: ApiError) -> ApiError {
    if e.is_authorization() {
        ApiError::Http {
            status: 401,
            message: format!("metrics sink rejected write: {}", e),
        }
    } else {
        e
    }
}
