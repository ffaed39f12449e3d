//! Register command implementation

use super::CommandContext;
use crate::core::CredentialStore;

/// Obtain the partner token and register the application domain
pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let store = ctx.credential_store();
    let mut credentials = store.load()?;

    let tokens = ctx.token_lifecycle(ctx.http_client(), store);
    tokens.register(&mut credentials).await?;

    println!("Registered {} with the Fleet API.", credentials.domain);
    println!("Next: tesla-recorder authorize --username <account>");
    Ok(())
}
