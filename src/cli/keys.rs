// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::Args;

use crate::crypto::keys::PRIVATE_KEY_ENV;
use crate::crypto::{ecies, public_key_from_base64, KeyPair};

/// Arguments for public-key command
#[derive(Args, Debug)]
pub struct PublicKeyArgs {
    /// Base64 private key (can also be set via ECTSM_PRIVATE_KEY env var)
    #[arg(long, env = PRIVATE_KEY_ENV)]
    pub private_key: String,
}

/// Arguments for wrap command
#[derive(Args, Debug)]
pub struct WrapArgs {
    /// Base64 uncompressed public key of the recipient
    #[arg(long)]
    pub public_key: String,

    /// UTF-8 message to wrap
    #[arg(long)]
    pub message: String,
}

/// Arguments for unwrap command
#[derive(Args, Debug)]
pub struct UnwrapArgs {
    /// Base64 private key (can also be set via ECTSM_PRIVATE_KEY env var)
    #[arg(long, env = PRIVATE_KEY_ENV)]
    pub private_key: String,

    /// Base64 ECIES ciphertext
    #[arg(long)]
    pub ciphertext: String,
}

pub fn keygen() -> String {
    let pair = KeyPair::generate();
    format!(
        "private_key: {}\npublic_key:  {}",
        pair.private_key_base64(),
        pair.public_key_base64()
    )
}

pub fn public_key(args: PublicKeyArgs) -> Result<String> {
    let pair = KeyPair::from_private_base64(args.private_key.trim())
        .context("Invalid private key")?;
    Ok(pair.public_key_base64())
}

pub fn wrap(args: WrapArgs) -> Result<String> {
    let public = public_key_from_base64(args.public_key.trim()).context("Invalid public key")?;
    let ciphertext = ecies::wrap(&public, args.message.as_bytes())?;
    Ok(STANDARD.encode(ciphertext))
}

pub fn unwrap(args: UnwrapArgs) -> Result<String> {
    let pair = KeyPair::from_private_base64(args.private_key.trim())
        .context("Invalid private key")?;
    let ciphertext = STANDARD
        .decode(args.ciphertext.trim())
        .context("Ciphertext is not valid base64")?;
    let plaintext = ecies::unwrap_with(&pair, &ciphertext)?;
    Ok(String::from_utf8_lossy(&plaintext).into_owned())
}
