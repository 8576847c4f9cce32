//! Keys command - Generate encryption keypairs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use strato_crypto::{encode_private_key, generate_curve_keypair, generate_rsa_keypair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyFamily {
    /// RSA-OAEP (2048 bits minimum)
    Rsa,
    /// X25519 + ChaCha20-Poly1305
    Curve,
}

#[derive(Args)]
pub struct KeysArgs {
    /// Key family to generate
    #[arg(long, value_enum, default_value = "curve")]
    family: KeyFamily,

    /// RSA key size in bits
    #[arg(long, default_value_t = 2048)]
    bits: usize,

    /// Directory the key files are written into
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Base name for the key files
    #[arg(long, default_value = "stack")]
    name: String,
}

pub async fn execute(args: KeysArgs) -> Result<()> {
    let (public_key, private_key) = match args.family {
        KeyFamily::Rsa => {
            info!("Generating {}-bit RSA keypair", args.bits);
            generate_rsa_keypair(args.bits)?
        }
        KeyFamily::Curve => {
            info!("Generating X25519 keypair");
            generate_curve_keypair()
        }
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let public_path = args.out.join(format!("{}.pub", args.name));
    let private_path = args.out.join(format!("{}.key", args.name));

    std::fs::write(&public_path, public_key.encode()?)?;
    std::fs::write(&private_path, encode_private_key(&private_key)?)?;

    println!("🔑 Wrote public key:  {}", public_path.display());
    println!("🔒 Wrote private key: {}", private_path.display());
    println!("   Keep the private key out of version control.");

    Ok(())
}
