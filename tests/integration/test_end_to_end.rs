// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end Tests
//!
//! A real `EctClient` talking to a real axum server over loopback.

use super::common::spawn_server;
use ectsm::config::ProtocolConfig;
use ectsm::crypto::IvMode;
use ectsm::protocol::BodyEncoding;
use ectsm::server::demo::DemoResult;
use ectsm::{ClientState, EctClient, EctError, RequestOptions};
use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NewOrder {
    item: String,
    quantity: u32,
}

#[tokio::test]
async fn test_get_with_user_token() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();
    assert_eq!(client.state(), ClientState::Ready);

    client.set_user_token("usertoken").await;

    let response = client
        .get(&server.url("/test/whoami"), RequestOptions::new())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.text(), "usertoken");

    let response = client
        .get(&server.url("/test/get"), RequestOptions::new())
        .await
        .unwrap();
    let result: DemoResult = response.json().unwrap();
    assert_eq!(result.status, 0);
    assert_eq!(result.msg, "get success");
}

#[tokio::test]
async fn test_post_struct() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let order = NewOrder {
        item: "widget".to_string(),
        quantity: 2,
    };
    let response = client
        .post_json(&server.url("/test/post"), &order, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let result: DemoResult = response.json().unwrap();
    assert_eq!(result.status, 0);
    assert_eq!(result.msg, "post success");
    assert_eq!(result.data, None);
}

#[tokio::test]
async fn test_per_request_token_overrides_default() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();
    client.set_user_token("default-token").await;

    let response = client
        .get(
            &server.url("/test/whoami"),
            RequestOptions::new().with_token("override"),
        )
        .await
        .unwrap();
    assert_eq!(response.text(), "override");

    client.clear_user_token().await;
    let response = client
        .get(&server.url("/test/whoami"), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.text(), "");
}

#[tokio::test]
async fn test_base64_body_and_random_iv() {
    let protocol = ProtocolConfig {
        body_encoding: BodyEncoding::Base64,
        iv_mode: IvMode::RandomPrefix,
        ..ProtocolConfig::default()
    };
    let server = spawn_server(protocol).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let payload = vec![0u8, 1, 2, 250, 251, 252];
    let response = client
        .post(&server.url("/test/echo"), &payload, RequestOptions::new())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.body, payload);
}

#[tokio::test]
async fn test_non_200_returned_raw() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let response = client
        .get(&server.url("/test/forbidden"), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.status, 403);
    assert!(!response.decrypted);
    assert!(!response.is_success());
    assert_eq!(response.text(), "forbidden");
}

#[tokio::test]
async fn test_session_for_other_server_rejected() {
    let first = spawn_server(ProtocolConfig::default()).await;
    let second = spawn_server(ProtocolConfig::default()).await;

    // Session wrapped for the first server's key, sent to the second
    let client = EctClient::connect(first.client_config()).await.unwrap();
    let response = client
        .get(&second.url("/test/get"), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 400);
    assert!(!response.decrypted);
    assert_eq!(response.text(), "request rejected");
    assert!(second.server.cache().is_empty().await);
}

#[tokio::test]
async fn test_request_timeout() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let result = client
        .get(
            &server.url("/test/slow"),
            RequestOptions::new().with_timeout(Duration::from_millis(200)),
        )
        .await;
    assert!(matches!(result, Err(EctError::Timeout(_))));

    // A timed-out call leaves the session usable
    assert_eq!(client.state(), ClientState::Ready);
    let response = client
        .get(&server.url("/test/get"), RequestOptions::new())
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_concurrent_calls_share_one_session() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let url = server.url("/test/get");
    let calls = (0..10).map(|_| client.get(&url, RequestOptions::new()));
    for response in join_all(calls).await {
        assert!(response.unwrap().is_success());
    }

    let stats = server.server.cache().stats();
    assert_eq!(stats.unwraps, 1, "One unwrap for the whole client session");
    assert_eq!(server.server.cache().len().await, 1);
}

#[tokio::test]
async fn test_closed_client() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();
    client.close();

    let result = client
        .get(&server.url("/test/get"), RequestOptions::new())
        .await;
    assert!(matches!(result, Err(EctError::SessionClosed)));
}

#[tokio::test]
async fn test_stale_response_timestamp_rejected() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let result = client
        .get(&server.url("/test/stale"), RequestOptions::new())
        .await;
    assert!(matches!(result, Err(EctError::Replay(_))), "{:?}", result);

    // The session survives a rejected response
    assert_eq!(client.state(), ClientState::Ready);
}

#[tokio::test]
async fn test_response_without_timestamp_rejected() {
    let server = spawn_server(ProtocolConfig::default()).await;
    let client = EctClient::connect(server.client_config()).await.unwrap();

    let result = client
        .get(&server.url("/test/unstamped"), RequestOptions::new())
        .await;
    match result {
        Err(EctError::InvalidHeader { field }) => assert_eq!(field, "ectm_time"),
        other => panic!("expected missing ectm_time, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cors_exposes_ect_headers() {
    let server = spawn_server(ProtocolConfig::default()).await;

    let response = reqwest::Client::new()
        .get(server.url("/ectminfo"))
        .header("Origin", "http://example.test")
        .send()
        .await
        .unwrap();

    let exposed = response
        .headers()
        .get("access-control-expose-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    assert!(exposed.contains("ectm_time"), "exposed: {}", exposed);
    assert!(exposed.contains("ectm_key"));
}
