//! Request path resolution
//!
//! Turns a raw request target into a path confined to the base download
//! folder. Validation is purely lexical: ambiguous paths are rejected rather
//! than normalized, and the filesystem is never consulted.

use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use thiserror::Error;

/// Characters never accepted in a request path
const INSECURE_CHARS: &[char] = &['<', '>', '&', '"'];

/// Reason a request path was rejected
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    #[error("request path is not valid percent-encoded UTF-8")]
    BadEncoding,
    #[error("request path is empty or does not start with '/'")]
    NotAbsolute,
    #[error("request path contains a dot segment")]
    Traversal,
    #[error("request path contains an insecure character")]
    InsecureCharacter,
}

/// Resolve `raw_uri` against `base_dir`
///
/// The query string and fragment are ignored. On success the returned path
/// is `base_dir` joined with normal segments only, so it always stays below
/// `base_dir`. Whether the file exists is left to the caller.
///
/// Only `%XX` escapes are decoded; `+` stays a literal plus, not a space as
/// in form decoding.
pub fn resolve(raw_uri: &str, base_dir: &Path) -> Result<PathBuf, ResolveError> {
    let target = raw_uri.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode(target)?;

    if !decoded.starts_with('/') {
        return Err(ResolveError::NotAbsolute);
    }

    let native = decoded.replace('/', MAIN_SEPARATOR_STR);
    if has_dot_segment(&native) {
        return Err(ResolveError::Traversal);
    }
    if native.contains(INSECURE_CHARS) {
        return Err(ResolveError::InsecureCharacter);
    }

    let relative = Path::new(native.trim_start_matches(MAIN_SEPARATOR));
    let mut resolved = base_dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            // Drive prefixes, roots and anything else that could re-anchor the join
            _ => return Err(ResolveError::Traversal),
        }
    }
    Ok(resolved)
}

/// Percent-decode as UTF-8, rejecting malformed escapes
fn percent_decode(raw: &str) -> Result<String, ResolveError> {
    let bytes = raw.as_bytes();
    let malformed = raw.match_indices('%').any(|(i, _)| {
        !bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(ResolveError::BadEncoding);
    }

    percent_decode_str(raw)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| ResolveError::BadEncoding)
}

/// A `.` touching a separator, or at either end of the path
fn has_dot_segment(path: &str) -> bool {
    let sep_dot = format!("{MAIN_SEPARATOR}.");
    let dot_sep = format!(".{MAIN_SEPARATOR}");
    path.contains(&sep_dot) || path.contains(&dot_sep) || path.starts_with('.') || path.ends_with('.')
}
