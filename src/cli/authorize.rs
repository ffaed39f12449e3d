//! Authorize command implementation
//!
//! Three-legged OAuth bootstrap: the user signs in through the browser and
//! pastes the redirected URL back into the terminal.

use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::CommandContext;
use crate::core::CredentialStore;

/// Arguments for the authorize command
#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    /// Account the tokens belong to (usually the Tesla login email)
    #[arg(short, long)]
    pub username: String,

    /// Print the URL without trying to open a browser
    #[arg(long = "no-browser")]
    pub no_browser: bool,
}

/// Run the authorize command
pub async fn run(ctx: &CommandContext, args: AuthorizeArgs) -> anyhow::Result<()> {
    let store = ctx.credential_store();
    let mut credentials = store.load()?;
    let tokens = ctx.token_lifecycle(ctx.http_client(), store);

    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = tokens.authorization_url(&credentials, &state)?;

    println!("Sign in to authorize {}:", args.username);
    println!();
    println!("  {}", url);
    println!();
    if !args.no_browser {
        if let Err(e) = open::that(url.as_str()) {
            tracing::debug!("Could not open browser: {}", e);
        }
    }
    println!("Paste the URL you were redirected to:");

    let callback = read_callback(&mut BufReader::new(tokio::io::stdin())).await?;
    tokens
        .authorize(&mut credentials, &args.username, &callback, Some(&state))
        .await?;

    println!("Authorized {}.", args.username);
    Ok(())
}

/// First non-empty line of input
async fn read_callback<R: AsyncBufRead + Unpin>(reader: &mut R) -> anyhow::Result<String> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            anyhow::bail!("No callback URL entered");
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}
