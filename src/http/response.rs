//! HTTP response building module
//!
//! Provides builders for the responses the file server emits, decoupled from
//! request dispatch.

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{ALLOW, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use hyper::{Response, StatusCode};
use std::io;

/// Body type of every response
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build a plain-text failure response
///
/// `keep_alive` adds `Connection: keep-alive`; without it the connection is
/// closed once the response is flushed.
pub fn build_error_response(status: StatusCode, keep_alive: bool) -> Response<ResponseBody> {
    let message = format!("Failure: {status}\r\n");
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=UTF-8")
        .header(CONTENT_LENGTH, message.len());

    if status == StatusCode::METHOD_NOT_ALLOWED {
        builder = builder.header(ALLOW, "GET, HEAD");
    }
    builder = builder.header(CONNECTION, connection_value(keep_alive));

    builder.body(full_body(message)).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        fallback(status)
    })
}

/// Build 500 Internal Server Error; the connection is always closed
pub fn build_500_response() -> Response<ResponseBody> {
    build_error_response(StatusCode::INTERNAL_SERVER_ERROR, false)
}

/// Build the 200 response carrying a file body
///
/// `Content-Length` is the length observed when the file was inspected.
pub fn build_file_response(
    len: u64,
    etag: Option<&str>,
    keep_alive: bool,
    body: ResponseBody,
) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_LENGTH, len);
    if let Some(etag) = etag {
        builder = builder.header(ETAG, etag);
    }
    if keep_alive {
        builder = builder.header(CONNECTION, "keep-alive");
    }

    builder.body(body).unwrap_or_else(|e| {
        log_build_error("200", &e);
        build_500_response()
    })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str, keep_alive: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, etag);
    if keep_alive {
        builder = builder.header(CONNECTION, "keep-alive");
    }

    builder.body(empty_body()).unwrap_or_else(|e| {
        log_build_error("304", &e);
        build_500_response()
    })
}

const fn connection_value(keep_alive: bool) -> &'static str {
    if keep_alive {
        "keep-alive"
    } else {
        "close"
    }
}

fn fallback(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
