//! Application and per-account OAuth credentials
//!
//! The whole record is loaded at the start of a command, mutated in place when
//! tokens change, and written back through a [`CredentialStore`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Errors that can occur with credential storage
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// A vehicle-owner account and its current token pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl Account {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_token: String::new(),
            refresh_token: String::new(),
        }
    }

    /// Whether the account has completed the authorization bootstrap
    pub fn is_authorized(&self) -> bool {
        !self.access_token.is_empty()
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .finish()
    }
}

/// Application credentials plus the ordered list of accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_token: Option<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            domain: domain.into(),
            partner_token: None,
            accounts: Vec::new(),
        }
    }

    pub fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username == username)
    }

    pub fn account_mut(&mut self, username: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.username == username)
    }

    /// Store a token pair for `username`, replacing any existing pair
    pub fn upsert_tokens(&mut self, username: &str, access_token: String, refresh_token: String) {
        if let Some(account) = self.account_mut(username) {
            account.access_token = access_token;
            account.refresh_token = refresh_token;
            return;
        }
        self.accounts.push(Account {
            username: username.to_string(),
            access_token,
            refresh_token,
        });
    }

    /// Account usernames in configured order
    pub fn usernames(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.username.clone()).collect()
    }
}

/// Load/persist access to the credential record
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Credentials, CredentialError>;

    /// Replace the stored record; must never leave a partially written file
    fn save(&self, credentials: &Credentials) -> Result<(), CredentialError>;
}

/// JSON file backed credential store
pub struct FileCredentialStore {
    file_path: PathBuf,
}

impl FileCredentialStore {
    pub fn with_path(path: PathBuf) -> Self {
        Self { file_path: path }
    }

    /// `~/.credentials/tesla.json`
    pub fn default_path() -> Result<PathBuf, CredentialError> {
        dirs::home_dir()
            .map(|home| home.join(".credentials").join("tesla.json"))
            .ok_or(CredentialError::NoHomeDir)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.file_path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Credentials, CredentialError> {
        let data = fs::read_to_string(&self.file_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.temp_path();
        {
            let mut file = open_private(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.file_path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Mask a token for display (show first 4 and last 4 chars)
pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.len() > 12 && trimmed.is_char_boundary(4) && trimmed.is_char_boundary(trimmed.len() - 4) {
        format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
    } else {
        "****".to_string()
    }
}
