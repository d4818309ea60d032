//! Connection persistence negotiation

use hyper::header::{HeaderMap, CONNECTION};
use hyper::Version;

/// Whether the client asked to keep the connection open
///
/// HTTP/1.1 is persistent unless `Connection: close` is sent; HTTP/1.0 only
/// with an explicit `Connection: keep-alive`.
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let has_token = |token: &str| {
        headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    };

    if has_token("close") {
        return false;
    }
    match version {
        Version::HTTP_10 | Version::HTTP_09 => has_token("keep-alive"),
        _ => true,
    }
}
