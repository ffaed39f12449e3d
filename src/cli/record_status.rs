//! Record-status command implementation

use clap::Args;

use super::CommandContext;
use crate::core::CredentialStore;
use crate::fleet::FleetApiClient;
use crate::sink::InfluxSink;
use crate::sweep::SweepOrchestrator;

/// Arguments for the record-status command
#[derive(Args, Debug, Default)]
pub struct RecordStatusArgs {
    /// Fetch and log everything but write nothing to InfluxDB
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

/// Run one sweep. Per-account failures are logged, never returned.
pub async fn run(ctx: &CommandContext, args: RecordStatusArgs) -> anyhow::Result<()> {
    let store = ctx.credential_store();
    let mut credentials = store.load()?;

    let client = ctx.http_client();
    let tokens = ctx.token_lifecycle(client.clone(), store);
    let api = FleetApiClient::new(client.clone(), &ctx.settings.fleet_api_url);
    let sink = InfluxSink::new(client, &ctx.settings.influx_url, &ctx.settings.influx_database);

    tracing::info!(dry_run = args.dry_run, "recording to {}", ctx.settings.influx_database);

    SweepOrchestrator::new(&api, &tokens, &sink, ctx.settings.retry_policy())
        .with_dry_run(args.dry_run)
        .run(&mut credentials)
        .await;

    Ok(())
}
