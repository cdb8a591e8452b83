// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server Engine Tests
//!
//! Drives `EctServer` with header fields built the way a client would,
//! without any HTTP in between.

use base64::{engine::general_purpose::STANDARD, Engine};
use ectsm::config::ProtocolConfig;
use ectsm::crypto::{ecies, KeyPair, SessionKey};
use ectsm::protocol::{unix_now, BodyEncoding, HeaderFields};
use ectsm::{EctError, EctServer};
use serde_json::json;

struct TestClient {
    key: SessionKey,
    wrapped: String,
}

impl TestClient {
    fn for_server(pair: &KeyPair) -> Self {
        let key = SessionKey::generate();
        let wrapped = STANDARD.encode(ecies::wrap(pair.public_key(), key.as_bytes()).unwrap());
        Self { key, wrapped }
    }

    fn header(&self, server: &EctServer, token: Option<&[u8]>) -> HeaderFields {
        server
            .header_codec()
            .build_request_header(&self.key, Some(&self.wrapped), token)
            .unwrap()
    }
}

#[tokio::test]
async fn test_handle_get_with_token() {
    let pair = KeyPair::generate();
    let server = EctServer::new(pair.clone(), ProtocolConfig::default());
    let client = TestClient::for_server(&pair);

    let context = server
        .handle_get(&client.header(&server, Some(b"usertoken")))
        .await
        .unwrap();

    assert_eq!(context.session_key, client.key);
    assert_eq!(context.token_str(), Some("usertoken"));
    assert_eq!(context.wrapped_key, client.wrapped);
}

#[tokio::test]
async fn test_handle_post_and_respond() {
    let pair = KeyPair::generate();
    for encoding in [BodyEncoding::Raw, BodyEncoding::Base64] {
        let protocol = ProtocolConfig {
            body_encoding: encoding,
            ..ProtocolConfig::default()
        };
        let server = EctServer::new(pair.clone(), protocol);
        let client = TestClient::for_server(&pair);

        let body = server
            .body_codec()
            .encrypt_json(&client.key, &json!({"Name": "ectsm", "Count": 3}))
            .unwrap();
        let (context, plaintext) = server
            .handle_post(&client.header(&server, None), &body)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(value["Name"], "ectsm");
        assert_eq!(context.token, None);

        let response = server
            .respond_json(&context.session_key, &json!({"Status": 0}))
            .unwrap();
        assert_eq!(response.content_type, encoding.content_type());

        let verified = server
            .header_codec()
            .parse_and_verify(&response.headers, &client.key, 180)
            .unwrap();
        assert!((verified.timestamp - unix_now()).abs() <= 1);

        let reply: serde_json::Value = server
            .body_codec()
            .decrypt_json(&client.key, &response.body)
            .unwrap();
        assert_eq!(reply["Status"], 0);
    }
}

#[tokio::test]
async fn test_session_is_cached_across_requests() {
    let pair = KeyPair::generate();
    let server = EctServer::new(pair.clone(), ProtocolConfig::default());
    let client = TestClient::for_server(&pair);

    for _ in 0..5 {
        server.handle_get(&client.header(&server, None)).await.unwrap();
    }

    let stats = server.cache().stats();
    assert_eq!(stats.unwraps, 1);
    assert_eq!(stats.hits, 4);
}

#[tokio::test]
async fn test_missing_wrapped_key_rejected() {
    let pair = KeyPair::generate();
    let server = EctServer::new(pair, ProtocolConfig::default());

    let fields = server
        .header_codec()
        .build_request_header(&SessionKey::generate(), None, None)
        .unwrap();

    let err = server.handle_get(&fields).await.unwrap_err();
    assert!(matches!(err, EctError::InvalidHeader { ref field } if field == "ectm_key"));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_wrapped_for_other_server_rejected() {
    let server = EctServer::new(KeyPair::generate(), ProtocolConfig::default());
    let client = TestClient::for_server(&KeyPair::generate());

    let err = server
        .handle_get(&client.header(&server, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EctError::SessionEstablish(_)));
    assert!(server.cache().is_empty().await);
}

#[tokio::test]
async fn test_replayed_header_outside_window() {
    let pair = KeyPair::generate();
    let server = EctServer::new(pair.clone(), ProtocolConfig::default());
    let client = TestClient::for_server(&pair);

    let fields = client.header(&server, None);
    let err = server
        .verify_request_at(&fields, unix_now() + 181)
        .await
        .unwrap_err();
    assert!(matches!(err, EctError::Replay(_)));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_truncated_body_rejected_after_header_passes() {
    let pair = KeyPair::generate();
    let server = EctServer::new(pair.clone(), ProtocolConfig::default());
    let client = TestClient::for_server(&pair);

    let body = server.body_codec().encrypt_body(&client.key, b"hello").unwrap();
    let err = server
        .handle_post(&client.header(&server, None), &body[..body.len() - 2])
        .await
        .unwrap_err();
    assert!(matches!(err, EctError::Crypto(_)));
}
