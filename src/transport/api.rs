//! Client-facing API
//!
//! `GET /api?key=<key>` resolves a key through one group and returns the raw
//! value.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, Request, StatusCode};
use tracing::debug;

use super::server::{error_status, respond, text, Handler, HttpResponse};
use crate::group::Group;

/// Front end for one group
#[derive(Debug, Clone)]
pub struct ApiHandler {
    group: Arc<Group>,
}

impl ApiHandler {
    pub fn new(group: Arc<Group>) -> Self {
        Self { group }
    }
}

#[async_trait]
impl Handler for ApiHandler {
    async fn handle(&self, req: Request<()>) -> HttpResponse {
        match (req.method(), req.uri().path()) {
            (&Method::GET, "/api") => {}
            (_, "/healthz") => return text(StatusCode::OK, "ok"),
            (_, "/api") => return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
            _ => return text(StatusCode::NOT_FOUND, "not found"),
        }

        let Some(key) = req.uri().query().and_then(|q| query_param(q, "key")) else {
            return text(StatusCode::BAD_REQUEST, "missing key parameter");
        };

        debug!(group = %self.group.name(), key = %key, "api request");
        match self.group.get(&key).await {
            Ok(value) => respond(StatusCode::OK, "application/octet-stream", value.to_bytes()),
            Err(err) => text(error_status(&err), err.to_string()),
        }
    }
}

/// Decoded value of `name` in a form-encoded query string
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k != name {
            return None;
        }
        urlencoding::decode(&v.replace('+', " "))
            .ok()
            .map(|v| v.into_owned())
    })
}

// =============================================================================
// Tests
// =============================================================================
