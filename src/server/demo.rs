// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Demo endpoints served by the `ectsm` binary and used by the end-to-end tests

use super::http::{EctReply, EctRequest};
use super::EctServer;
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const GET_PATH: &str = "/test/get";
pub const POST_PATH: &str = "/test/post";

/// Envelope returned by the demo endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DemoResult {
    pub status: i32,
    pub msg: String,
    pub data: Option<serde_json::Value>,
}

impl DemoResult {
    fn success(msg: &str) -> Self {
        Self {
            status: 0,
            msg: msg.to_string(),
            data: None,
        }
    }
}

pub fn routes() -> Router<Arc<EctServer>> {
    Router::new()
        .route(GET_PATH, get(test_get))
        .route(POST_PATH, post(test_post))
}

async fn test_get(request: EctRequest) -> EctReply {
    info!(has_token = request.token_str().is_some(), "demo GET");
    request.reply_json(&DemoResult::success("get success"))
}

async fn test_post(request: EctRequest) -> EctReply {
    info!(
        has_token = request.token_str().is_some(),
        body_len = request.body.len(),
        "demo POST"
    );
    request.reply_json(&DemoResult::success("post success"))
}
