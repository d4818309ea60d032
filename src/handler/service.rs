//! Hyper service entry point
//!
//! Aggregates the inbound request, hands it to the dispatcher and writes the
//! access log. A panic inside dispatch is answered with `500`.

use futures_util::FutureExt;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::{IF_NONE_MATCH, REFERER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::handler::dispatcher::{ConnectionInfo, InboundRequest};
use crate::http::{build_500_response, is_keep_alive, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    connection: ConnectionInfo,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    // Whole request is aggregated before dispatch; oversized or broken
    // bodies mark the request as undecodable
    let limit = usize::try_from(state.config.http.max_request_size).unwrap_or(usize::MAX);
    let decoded = Limited::new(body, limit).collect().await.is_ok();

    let mut request = inbound_from_parts(&parts, decoded);
    // Persistence needs both the client and the server configuration
    request.keep_alive &= state.config.performance.keep_alive;

    let response =
        guard_dispatch(state.dispatcher.dispatch(&request, &connection), &request).await;

    if state.config.logging.access_log {
        let entry = access_entry(&parts, &connection, &response, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Run `dispatch`, answering a panic inside it with `500`
pub async fn guard_dispatch<F>(dispatch: F, request: &InboundRequest) -> Response<ResponseBody>
where
    F: Future<Output = Response<ResponseBody>>,
{
    AssertUnwindSafe(dispatch)
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            logger::log_error(&format!(
                "Request handler panicked: {} {}",
                request.method, request.uri
            ));
            build_500_response()
        })
}

/// Extract what the dispatcher needs from the request head
pub fn inbound_from_parts(parts: &Parts, decoded: bool) -> InboundRequest {
    InboundRequest {
        method: parts.method.clone(),
        // Absolute-form targets are reduced to their path and query
        uri: parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.to_string(), ToString::to_string),
        keep_alive: is_keep_alive(parts.version, &parts.headers),
        decoded,
        if_none_match: header_string(parts, IF_NONE_MATCH),
    }
}

fn header_string(parts: &Parts, name: hyper::header::HeaderName) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn access_entry(
    parts: &Parts,
    connection: &ConnectionInfo,
    response: &Response<ResponseBody>,
    started: Instant,
) -> AccessLogEntry {
    let remote = connection
        .peer_addr
        .map_or_else(|| "-".to_string(), |addr| addr.ip().to_string());
    let mut entry = AccessLogEntry::new(remote, parts.method.to_string(), parts.uri.to_string());
    entry.http_version = format!("{:?}", parts.version).trim_start_matches("HTTP/").to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .headers()
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    entry.referer = header_string(parts, REFERER);
    entry.user_agent = header_string(parts, USER_AGENT);
    entry.encrypted = connection.encrypted;
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}
