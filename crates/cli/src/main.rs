use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_kernel::settings::Settings;

/// Operator tools for the Shelf book-tracking service.
#[derive(Debug, Parser)]
#[command(name = "shelf-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load configuration exactly as the server does and report the result.
    CheckConfig,
    /// Sign an access token for local testing with the configured secret.
    MintToken {
        /// Caller identity placed in the `sub` claim.
        #[arg(long)]
        user_id: String,
        /// Token lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load Shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::CheckConfig => {
            tracing::info!(
                env = ?settings.environment,
                platform = %settings.platform.url,
                table = %settings.platform.table,
                "configuration ok"
            );
            println!(
                "configuration ok: platform {} table {} listening on {}:{}",
                settings.platform.url,
                settings.platform.table,
                settings.server.host,
                settings.server.port
            );
        }
        Command::MintToken { user_id, ttl_secs } => {
            let token = shelf_authz::issue_token(
                &settings.platform.jwt_secret,
                &settings.platform.audience,
                &user_id,
                Duration::from_secs(ttl_secs),
            )
            .with_context(|| format!("failed to mint token for '{}'", user_id))?;
            println!("{}", token);
        }
    }

    Ok(())
}
