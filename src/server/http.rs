// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Axum adapter for the ECT server
//!
//! - `GET /ectminfo` serves the server clock and public key
//! - `EctRequest` extractor resolves the session, verifies the header and
//!   decrypts the body before the handler runs
//! - `EctReply` encrypts the handler's payload and stamps the response header

use super::{EctServer, EncryptedResponse, RequestContext, ServerInfo};
use crate::crypto::SessionKey;
use crate::error::{EctError, Result};
use crate::protocol::{HeaderFields, HeaderNames, INFO_PATH};
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRef, FromRequest, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, ExposeHeaders};
use tower_http::trace::TraceLayer;

/// Bootstrap endpoint handler
pub async fn info_handler(State(server): State<Arc<EctServer>>) -> Json<ServerInfo> {
    Json(server.info())
}

/// Add the bootstrap route, CORS and tracing to an application router
pub fn router(server: Arc<EctServer>, app: Router<Arc<EctServer>>) -> Router {
    let cors = cors_layer(server.header_codec().names());
    app.route(INFO_PATH, get(info_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Bind and serve until the listener fails
pub async fn serve(server: Arc<EctServer>, app: Router<Arc<EctServer>>, addr: &str) -> anyhow::Result<()> {
    let addr = addr.parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("ECT server listening on {}", addr);

    axum::serve(listener, router(server, app)).await?;
    Ok(())
}

/// CORS policy exposing the ECT header names so browser clients can read them
pub fn cors_layer(names: &HeaderNames) -> CorsLayer {
    let exposed: Vec<HeaderName> = names
        .all()
        .into_iter()
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(ExposeHeaders::list(exposed))
}

/// Verified, decrypted request
pub struct EctRequest {
    pub context: RequestContext,
    /// Decrypted body; empty for bodiless requests
    pub body: Vec<u8>,
    server: Arc<EctServer>,
}

impl EctRequest {
    pub fn session_key(&self) -> &SessionKey {
        &self.context.session_key
    }

    pub fn token_str(&self) -> Option<&str> {
        self.context.token_str()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Encrypt a raw payload for the response
    pub fn reply(&self, payload: &[u8]) -> EctReply {
        EctReply(self.server.respond(&self.context.session_key, payload))
    }

    pub fn reply_json<T: Serialize>(&self, value: &T) -> EctReply {
        EctReply(self.server.respond_json(&self.context.session_key, value))
    }
}

#[async_trait]
impl<S> FromRequest<S> for EctRequest
where
    Arc<EctServer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = EctRejection;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let server = Arc::<EctServer>::from_ref(state);
        let fields = header_fields(req.headers(), server.header_codec().names());

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| EctError::InvalidBody(e.body_text()))?;

        let (context, body) = if body.is_empty() {
            (server.handle_get(&fields).await?, Vec::new())
        } else {
            server.handle_post(&fields, &body).await?
        };

        Ok(Self {
            context,
            body,
            server,
        })
    }
}

/// Encrypted response produced by `EctRequest::reply`
pub struct EctReply(Result<EncryptedResponse>);

impl IntoResponse for EctReply {
    fn into_response(self) -> Response {
        let response = match self.0 {
            Ok(response) => response,
            Err(e) => return EctRejection(e).into_response(),
        };

        let mut headers = HeaderMap::new();
        for (name, value) in response.headers.iter() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(response.content_type),
        );

        (StatusCode::OK, headers, response.body).into_response()
    }
}

/// Rejection for requests that fail verification
///
/// The response body never says which crypto stage failed.
#[derive(Debug)]
pub struct EctRejection(pub EctError);

impl From<EctError> for EctRejection {
    fn from(err: EctError) -> Self {
        Self(err)
    }
}

impl IntoResponse for EctRejection {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_security_event() {
            tracing::warn!(target: "ectsm::security", kind = self.0.kind(), "ECT request rejected");
        } else {
            tracing::warn!(kind = self.0.kind(), error = %self.0, "ECT request failed");
        }

        let message = match status {
            StatusCode::UNAUTHORIZED => "request expired",
            StatusCode::BAD_REQUEST => "request rejected",
            _ => "internal error",
        };
        (status, message).into_response()
    }
}

fn header_fields(map: &HeaderMap, names: &HeaderNames) -> HeaderFields {
    names
        .all()
        .into_iter()
        .filter_map(|name| {
            map.get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name, v.to_string()))
        })
        .collect()
}
