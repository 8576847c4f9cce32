//! CLI command definitions.
//!
//! Each subcommand maps to one operator workflow: key management, secret
//! management, and deploy/preview driving.

use clap::{Parser, Subcommand};

pub mod deploy;
pub mod keys;
pub mod secrets;

/// strato - cloud-agnostic stack deployment
#[derive(Parser)]
#[command(name = "strato")]
#[command(version, about = "strato - cloud-agnostic stack deployment")]
#[command(long_about = r#"
strato resolves stack configuration (secrets, placeholders, cross-stack
resource bindings) and drives deploys through a recoverable state machine.

WORKFLOWS:
  keys     → Generate encryption keypairs for a stack
  secrets  → Add, list, delete encrypted, environment-scoped secrets
  deploy   → Run one deploy (parent stacks must be deployed first)
  preview  → Dry-run a deploy: resolve everything, provision nothing

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Deploy aborted
  4 - Template/placeholder error
  5 - Secret or crypto error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an encryption keypair
    Keys(keys::KeysArgs),

    /// Manage encrypted, environment-scoped secrets
    Secrets(secrets::SecretsArgs),

    /// Deploy one stack to one environment
    Deploy(deploy::DeployArgs),

    /// Dry-run a deploy without provisioning
    Preview(deploy::DeployArgs),
}
