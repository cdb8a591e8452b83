// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod keys;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// ECTSM key management CLI
#[derive(Parser, Debug)]
#[command(name = "ectsm-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Key tools for the ECT secure transport", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new secp256k1 key pair
    Keygen,

    /// Derive the public key from a private key
    PublicKey(keys::PublicKeyArgs),

    /// ECIES-wrap a message for a public key
    Wrap(keys::WrapArgs),

    /// ECIES-unwrap a ciphertext with a private key
    Unwrap(keys::UnwrapArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = match cli.command {
        Commands::Keygen => keys::keygen(),
        Commands::PublicKey(args) => keys::public_key(args)?,
        Commands::Wrap(args) => keys::wrap(args)?,
        Commands::Unwrap(args) => keys::unwrap(args)?,
    };
    println!("{}", output);
    Ok(())
}
