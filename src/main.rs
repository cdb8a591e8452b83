// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use ectsm::{
    config::{log_filter, ServerConfig},
    crypto::KeyPair,
    server::{demo, http, EctServer},
};
use std::{env, sync::Arc};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging from RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    println!("🚀 Starting ECTSM demo server...\n");
    println!("📦 BUILD VERSION: {}", ectsm::version::VERSION);
    println!("📅 Build Date: {}", ectsm::version::BUILD_DATE);
    println!();

    let mut config = match env::var("ECTSM_CONFIG") {
        Ok(path) => {
            let mut config = ServerConfig::from_file(&path)?;
            config.apply_env()?;
            config
        }
        Err(_) => ServerConfig::from_env()?,
    };

    if config.private_key.is_none() {
        warn!("ECTSM_PRIVATE_KEY not set; generating an ephemeral key pair for this run");
        config.private_key = Some(KeyPair::generate().private_key_base64());
    }

    let server = Arc::new(EctServer::from_config(&config)?);
    println!("🔑 Public key: {}", server.public_key_base64());
    println!("🌐 Listening on http://{}", config.listen_addr);

    http::serve(server, demo::routes(), &config.listen_addr).await
}
