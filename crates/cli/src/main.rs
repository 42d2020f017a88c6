//! CertPrep CLI - Database migrations and support tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! certprep-cli migrate
//!
//! # Delete expired webhook ledger rows
//! certprep-cli ledger prune
//!
//! # Grant or revoke a purchased certification by hand
//! certprep-cli entitlement grant --user auth0|abc123 --certification saa-c03
//! certprep-cli entitlement revoke --user auth0|abc123 --certification saa-c03
//! ```
//!
//! # Environment Variables
//!
//! - `CERTPREP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "certprep-cli")]
#[command(author, version, about = "CertPrep CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Maintain the Stripe webhook idempotency ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
    /// Adjust a user's purchased certifications
    Entitlement {
        #[command(subcommand)]
        action: EntitlementAction,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Delete ledger rows whose expiry has passed
    Prune,
}

#[derive(Subcommand)]
enum EntitlementAction {
    /// Add a certification to the user's purchases
    Grant {
        /// Identity-provider subject of the user
        #[arg(short, long)]
        user: String,

        /// Certification code, e.g. `saa-c03`
        #[arg(short, long)]
        certification: String,
    },
    /// Remove a certification from the user's purchases
    Revoke {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        certification: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Ledger { action } => match action {
            LedgerAction::Prune => commands::ledger::prune().await?,
        },
        Commands::Entitlement { action } => match action {
            EntitlementAction::Grant {
                user,
                certification,
            } => commands::entitlement::grant(&user, &certification).await?,
            EntitlementAction::Revoke {
                user,
                certification,
            } => commands::entitlement::revoke(&user, &certification).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_entitlement_grant() {
        let cli = Cli::try_parse_from([
            "certprep-cli",
            "entitlement",
            "grant",
            "--user",
            "auth0|abc123",
            "--certification",
            "saa-c03",
        ])
        .map_err(|e| e.to_string());

        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Entitlement {
                action: EntitlementAction::Grant { .. }
            })
        ));
    }
}
