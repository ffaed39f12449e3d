//! CLI module - command-line interface
//!
//! - `tesla-recorder record-status` - sweep every account and record charge state
//! - `tesla-recorder register` - obtain the partner token and register the domain
//! - `tesla-recorder authorize` - interactive OAuth bootstrap for one account
//! - `tesla-recorder config` - inspect and validate configuration

pub mod authorize;
pub mod config;
pub mod record_status;
pub mod register;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::core::{ApiError, CredentialError, CredentialStore, FileCredentialStore};
use crate::fleet::{self, AuthConfig, FleetAuthClient, TokenLifecycle};
use crate::settings::Settings;

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const AUTH_FAILURE: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
}

/// tesla-recorder - Record Tesla charge state into InfluxDB
///
/// Meant to be run periodically by a scheduler; each invocation performs one
/// sweep over every configured account.
#[derive(Parser, Debug)]
#[command(name = "tesla-recorder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable logs (JSON)
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Log to stderr instead of the log file
    #[arg(long = "no-log-file", global = true)]
    pub no_log_file: bool,

    /// Log file (default: ~/.log/tesla.log)
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    /// Credentials file (default: ~/.credentials/tesla.json)
    #[arg(long, global = true, env = "TESLA_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Settings file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record the charge state of every online vehicle
    RecordStatus(record_status::RecordStatusArgs),

    /// Obtain a partner token and register the application domain
    Register,

    /// Authorize an account through the browser
    Authorize(authorize::AuthorizeArgs),

    /// Configuration utilities
    Config(config::ConfigArgs),
}

impl Cli {
    /// Log destination after applying `--no-log-file` and settings
    pub fn log_destination(&self, settings: &Settings) -> Option<PathBuf> {
        if self.no_log_file {
            return None;
        }
        self.log_file.clone().or_else(|| settings.log_file_path())
    }
}

/// Settings and paths resolved once per invocation
pub struct CommandContext {
    pub settings: Settings,
    pub settings_path: Option<PathBuf>,
    pub credentials_path: PathBuf,
}

impl CommandContext {
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let settings_path = cli.settings.clone().or_else(Settings::settings_path);
        let settings = match &settings_path {
            Some(path) => Settings::load_from(path)?,
            None => Settings::default(),
        };

        let credentials_path = match cli.credentials.clone().or_else(|| settings.credentials_path.clone()) {
            Some(path) => path,
            None => FileCredentialStore::default_path()?,
        };

        Ok(Self {
            settings,
            settings_path,
            credentials_path,
        })
    }

    pub fn credential_store(&self) -> Arc<FileCredentialStore> {
        Arc::new(FileCredentialStore::with_path(self.credentials_path.clone()))
    }

    pub fn http_client(&self) -> reqwest::Client {
        fleet::http_client(self.settings.request_timeout())
    }

    pub fn token_lifecycle(&self, client: reqwest::Client, store: Arc<dyn CredentialStore>) -> TokenLifecycle {
        TokenLifecycle::new(
            Arc::new(FleetAuthClient::new(client, &self.settings)),
            store,
            self.settings.retry_policy(),
            AuthConfig::from_settings(&self.settings),
        )
    }
}

/// Categorize an error into the appropriate exit code
pub fn categorize_error(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<CredentialError>().is_some() {
        return exit_codes::CONFIG_ERROR;
    }

    match e.downcast_ref::<ApiError>() {
        Some(ApiError::Credentials(_)) => exit_codes::CONFIG_ERROR,
        Some(
            ApiError::MissingToken
            | ApiError::NotRegistered
            | ApiError::UnknownAccount(_)
            | ApiError::InvalidCallback(_),
        ) => exit_codes::AUTH_FAILURE,
        Some(api) if api.is_authorization() => exit_codes::AUTH_FAILURE,
        _ => exit_codes::UNEXPECTED_FAILURE,
    }
}
