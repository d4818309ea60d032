//! Request dispatch
//!
//! Runs one request through the file-serving pipeline:
//! decode check, method check, path resolution, existence and open checks,
//! header building, then body transfer. Every failure maps to a status code;
//! unexpected faults become `500` and close the connection.

use http_body_util::BodyExt;
use hyper::{Method, Response, StatusCode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;

use crate::error::DispatchError;
use crate::handler::file::ResolvedFile;
use crate::handler::resolver;
use crate::http::response::empty_body;
use crate::http::{
    build_304_response, build_500_response, build_error_response, build_file_response,
    check_etag_match, EtagGenerator, LoggingObserver, ResponseBody, TransferPlan,
};
use crate::logger;

/// The parts of an inbound request the pipeline consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw, still percent-encoded request target
    pub uri: String,
    /// Persistent connection negotiated by the client
    pub keep_alive: bool,
    /// Whether the request was framed and aggregated successfully
    pub decoded: bool,
    pub if_none_match: Option<String>,
}

impl InboundRequest {
    /// A well-formed request with no conditional headers
    pub fn new(method: Method, uri: impl Into<String>, keep_alive: bool) -> Self {
        Self {
            method,
            uri: uri.into(),
            keep_alive,
            decoded: true,
            if_none_match: None,
        }
    }
}

/// Transport facts about the connection a request arrived on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub peer_addr: Option<SocketAddr>,
    pub encrypted: bool,
}

/// Serves files below one base directory
pub struct RequestDispatcher {
    base_dir: PathBuf,
    etag: Option<EtagGenerator>,
    conditional: bool,
}

impl RequestDispatcher {
    /// `base_dir` must already be absolute
    pub const fn new(base_dir: PathBuf, etag: Option<EtagGenerator>, conditional: bool) -> Self {
        Self {
            base_dir,
            etag,
            conditional,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Produce the response for `request`
    pub async fn dispatch(
        &self,
        request: &InboundRequest,
        connection: &ConnectionInfo,
    ) -> Response<ResponseBody> {
        match self.serve(request, connection).await {
            Ok(response) => response,
            Err(fault) => {
                logger::log_error(&format!("{} {}: {fault}", request.method, request.uri));
                build_500_response()
            }
        }
    }

    async fn serve(
        &self,
        request: &InboundRequest,
        connection: &ConnectionInfo,
    ) -> Result<Response<ResponseBody>, DispatchError> {
        let keep_alive = request.keep_alive;

        if !request.decoded {
            logger::log_warning(&format!("Malformed request for '{}'", request.uri));
            return Ok(build_error_response(StatusCode::BAD_REQUEST, keep_alive));
        }

        let is_head = request.method == Method::HEAD;
        if request.method != Method::GET && !is_head {
            logger::log_warning(&format!("Method not allowed: {}", request.method));
            return Ok(build_error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                keep_alive,
            ));
        }

        let path = match resolver::resolve(&request.uri, &self.base_dir) {
            Ok(path) => path,
            Err(reason) => {
                logger::log_warning(&format!("Rejected path '{}': {reason}", request.uri));
                return Ok(build_error_response(StatusCode::FORBIDDEN, keep_alive));
            }
        };

        let file = ResolvedFile::inspect(path).await;
        if !file.is_visible() {
            return Ok(build_error_response(StatusCode::NOT_FOUND, keep_alive));
        }

        // Unopenable is reported exactly like missing
        let Some(handle) = open_for_read(&file).await else {
            return Ok(build_error_response(StatusCode::NOT_FOUND, keep_alive));
        };

        let etag = match &self.etag {
            Some(generator) => Some(generator.generate_etag(&file).await.map_err(|source| {
                DispatchError::Etag {
                    path: file.path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        if let Some(etag) = etag.as_deref() {
            if self.conditional && check_etag_match(request.if_none_match.as_deref(), etag) {
                return Ok(build_304_response(etag, keep_alive));
            }
        }

        let body = if is_head {
            empty_body()
        } else {
            let plan = TransferPlan::plan(connection.encrypted);
            let observer = Arc::new(LoggingObserver::new(transfer_label(request, connection)));
            plan.open_body(handle, file.len, observer)
                .await
                .map_err(|source| DispatchError::Transfer {
                    path: file.path.clone(),
                    source,
                })?
                .boxed_unsync()
        };

        Ok(build_file_response(
            file.len,
            etag.as_deref(),
            keep_alive,
            body,
        ))
    }
}

/// Open a regular file for reading, `None` if that is not possible
async fn open_for_read(file: &ResolvedFile) -> Option<File> {
    if !file.is_file {
        return None;
    }
    File::open(&file.path).await.ok()
}

fn transfer_label(request: &InboundRequest, connection: &ConnectionInfo) -> String {
    match connection.peer_addr {
        Some(peer) => format!("[{peer}] {}", request.uri),
        None => format!("[-] {}", request.uri),
    }
}
