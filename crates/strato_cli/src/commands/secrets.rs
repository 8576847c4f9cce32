//! Secrets command - Manage encrypted, environment-scoped secrets.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use strato_crypto::PublicKey;
use strato_secrets::SecretsStore;

#[derive(Args)]
pub struct SecretsArgs {
    /// Path to the secrets descriptor file
    #[arg(short, long, default_value = "secrets.yaml")]
    file: PathBuf,

    #[command(subcommand)]
    command: SecretsCommand,
}

#[derive(Subcommand)]
enum SecretsCommand {
    /// Add or replace a secret (value read from stdin)
    Add {
        /// Secret name
        name: String,

        /// Scope to one environment instead of the shared values
        #[arg(short, long)]
        environment: Option<String>,

        /// Path to the stack's public key
        #[arg(short, long)]
        key: PathBuf,
    },

    /// List secret names grouped by scope
    List,

    /// Delete a secret
    Delete {
        /// Secret name
        name: String,

        /// Scope to one environment instead of the shared values
        #[arg(short, long)]
        environment: Option<String>,
    },
}

pub async fn execute(args: SecretsArgs) -> Result<()> {
    let store = SecretsStore::new(&args.file);

    match args.command {
        SecretsCommand::Add {
            name,
            environment,
            key,
        } => {
            let material = std::fs::read_to_string(&key)
                .with_context(|| format!("reading public key {}", key.display()))?;
            let public_key = PublicKey::parse(material.trim())?;

            let mut plaintext = String::new();
            std::io::stdin()
                .read_to_string(&mut plaintext)
                .context("reading secret value from stdin")?;
            let plaintext = plaintext.trim_end_matches('\n');

            store.add_secret(&name, plaintext, environment.as_deref(), &public_key)?;
            info!(secret = %name, "Secret stored");
            match environment {
                Some(env) => println!("✅ Added secret '{name}' for environment '{env}'"),
                None => println!("✅ Added shared secret '{name}'"),
            }
        }

        SecretsCommand::List => {
            let listing = store.list_secrets()?;
            if listing.shared.is_empty() && listing.environments.is_empty() {
                println!("No secrets in {}", args.file.display());
                return Ok(());
            }
            if !listing.shared.is_empty() {
                println!("Shared:");
                for name in &listing.shared {
                    println!("  - {name}");
                }
            }
            for (environment, names) in &listing.environments {
                println!("{environment}:");
                for name in names {
                    println!("  - {name}");
                }
            }
        }

        SecretsCommand::Delete { name, environment } => {
            store.delete_secret(&name, environment.as_deref())?;
            match environment {
                Some(env) => println!("🗑️  Deleted secret '{name}' from environment '{env}'"),
                None => println!("🗑️  Deleted shared secret '{name}'"),
            }
        }
    }

    Ok(())
}
