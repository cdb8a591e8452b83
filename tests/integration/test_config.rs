// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration file tests

use super::common::spawn_server;
use ectsm::config::{ClientConfig, ProtocolConfig, ServerConfig};
use ectsm::crypto::KeyPair;
use ectsm::protocol::{BodyEncoding, HeaderNames};
use ectsm::{EctClient, EctServer, RequestOptions};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_client_config_from_file() {
    let protocol = ProtocolConfig {
        header_names: HeaderNames::legacy_ecttimestamp(),
        body_encoding: BodyEncoding::Base64,
        ..ProtocolConfig::default()
    };
    let server = spawn_server(protocol).await;

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
info_url = "{}"
request_timeout_secs = 5
token = "usertoken"

[protocol]
body_encoding = "base64"

[protocol.header_names]
key = "ecs"
time = "ecttimestamp"
token = "authorization"
"#,
        server.url("/ectminfo")
    )
    .unwrap();

    let config = ClientConfig::from_file(file.path()).unwrap();
    assert_eq!(config.request_timeout(), Duration::from_secs(5));

    let client = EctClient::connect(config).await.unwrap();
    let response = client
        .get(&server.url("/test/whoami"), RequestOptions::new())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.text(), "usertoken");
}

#[tokio::test]
async fn test_server_config_from_file() {
    let pair = KeyPair::generate();
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
listen_addr = "127.0.0.1:0"
private_key = "{}"
cache_ttl_secs = 60
sweep_interval_secs = 10
"#,
        pair.private_key_base64()
    )
    .unwrap();

    let config = ServerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.cache_ttl(), Duration::from_secs(60));

    let server = EctServer::from_config(&config).unwrap();
    assert_eq!(server.public_key_base64(), pair.public_key_base64());
    assert_eq!(server.cache().ttl(), Duration::from_secs(60));
}

#[test]
fn test_missing_config_file() {
    assert!(ServerConfig::from_file("/definitely/not/here.toml").is_err());
}
