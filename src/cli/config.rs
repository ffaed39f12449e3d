//! Config command implementation
//!
//! Utilities for validating and inspecting configuration.

use clap::{Parser, Subcommand};

use super::CommandContext;
use crate::core::{mask_token, CredentialStore, Credentials, FileCredentialStore};

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate settings and credentials
    Validate,
    /// Dump the effective settings to stdout
    Dump {
        /// Output format: toml or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

/// Run the config command
pub async fn run(ctx: &CommandContext, args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(ctx),
        ConfigCommand::Dump { format } => dump_config(ctx, &format),
        ConfigCommand::Path => show_paths(ctx),
    }
}

/// Validate configuration files
fn validate_config(ctx: &CommandContext) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // Settings were already parsed while resolving the context
    print!("Checking settings... ");
    match &ctx.settings_path {
        Some(path) if path.exists() => println!("OK"),
        Some(_) => {
            println!("NOT FOUND (using defaults)");
            warnings.push("settings: File does not exist, using defaults".to_string());
        }
        None => {
            println!("SKIP");
            warnings.push("settings: Could not determine config path".to_string());
        }
    }

    for (name, url) in [
        ("auth_url", &ctx.settings.auth_url),
        ("partner_auth_url", &ctx.settings.partner_auth_url),
        ("fleet_api_url", &ctx.settings.fleet_api_url),
        ("redirect_uri", &ctx.settings.redirect_uri),
        ("influx_url", &ctx.settings.influx_url),
    ] {
        if let Err(e) = url::Url::parse(url) {
            errors.push(format!("settings: {} is not a valid URL ({}): {}", name, e, url));
        }
    }

    print!("Checking credentials... ");
    let store = FileCredentialStore::with_path(ctx.credentials_path.clone());
    match store.load() {
        Ok(credentials) => {
            let problems = credential_problems(&credentials);
            if problems.is_empty() {
                println!("OK");
            } else {
                println!("INCOMPLETE");
                warnings.extend(problems);
            }
        }
        Err(e) => {
            println!("INVALID");
            errors.push(format!("{}: {}", ctx.credentials_path.display(), e));
        }
    }

    // Print summary
    println!();
    if errors.is_empty() && warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for w in &warnings {
                println!("  - {}", w);
            }
        }
        if !errors.is_empty() {
            println!("Errors:");
            for e in &errors {
                println!("  - {}", e);
            }
            anyhow::bail!("Configuration validation failed with {} error(s).", errors.len());
        }
    }

    Ok(())
}

/// Bootstrap steps still missing from a credential record
fn credential_problems(credentials: &Credentials) -> Vec<String> {
    let mut problems = Vec::new();
    if credentials.client_id.is_empty() || credentials.client_secret.is_empty() {
        problems.push("credentials: client_id and client_secret are required".to_string());
    }
    if credentials.partner_token.is_none() {
        problems.push("credentials: no partner token, run `tesla-recorder register`".to_string());
    }
    if credentials.accounts.is_empty() {
        problems.push("credentials: no accounts, run `tesla-recorder authorize`".to_string());
    }
    for account in credentials.accounts.iter().filter(|a| !a.is_authorized()) {
        problems.push(format!("credentials: {} has no access token", account.username));
    }
    problems
}

/// Dump configuration to stdout
fn dump_config(ctx: &CommandContext, format: &str) -> anyhow::Result<()> {
    match format.to_lowercase().as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&ctx.settings)?),
        "toml" => println!("{}", toml::to_string_pretty(&ctx.settings)?),
        _ => anyhow::bail!("Unknown format '{}'. Supported formats: toml, json", format),
    }
    Ok(())
}

/// Show configuration file paths
fn show_paths(ctx: &CommandContext) -> anyhow::Result<()> {
    println!("Configuration paths:");

    match &ctx.settings_path {
        Some(path) => {
            let exists = if path.exists() { "" } else { " (not found)" };
            println!("  Settings:    {}{}", path.display(), exists);
        }
        None => println!("  Settings:    (could not determine path)"),
    }

    let exists = if ctx.credentials_path.exists() { "" } else { " (not found)" };
    println!("  Credentials: {}{}", ctx.credentials_path.display(), exists);

    if let Some(log) = ctx.settings.log_file_path() {
        println!("  Log file:    {}", log.display());
    }

    if let Ok(credentials) = FileCredentialStore::with_path(ctx.credentials_path.clone()).load() {
        println!();
        println!("Accounts:");
        for account in &credentials.accounts {
            println!("  {} ({})", account.username, mask_token(&account.access_token));
        }
    }

    Ok(())
}
