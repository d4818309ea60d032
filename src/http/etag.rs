//! Entity tag generation
//!
//! Two generators, chosen once at startup:
//! - weak: derived from name, size and modification time, no content read
//! - strong: digest of the full file content
//!
//! Also provides `If-None-Match` matching for conditional requests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::Digest;
use std::io::{self, Read};
use std::path::Path;

use crate::config::EtagConfig;
use crate::error::StartupError;
use crate::handler::ResolvedFile;

/// Read buffer used while digesting file content
const DIGEST_BUFFER_SIZE: usize = 8192;

/// Digest algorithm used by strong etags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Parse an algorithm name (case-insensitive, `SHA` means SHA-1)
    pub fn from_name(name: &str) -> Result<Self, StartupError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            _ => Err(StartupError::UnknownDigestAlgorithm(name.to_string())),
        }
    }

    /// Digest everything `reader` yields
    ///
    /// The hasher lives only for this call.
    pub fn digest_reader(self, reader: impl Read) -> io::Result<Vec<u8>> {
        match self {
            Self::Md5 => digest_with::<md5::Md5>(reader),
            Self::Sha1 => digest_with::<sha1::Sha1>(reader),
            Self::Sha256 => digest_with::<sha2::Sha256>(reader),
            Self::Sha384 => digest_with::<sha2::Sha384>(reader),
            Self::Sha512 => digest_with::<sha2::Sha512>(reader),
        }
    }
}

fn digest_with<D: Digest>(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buf = [0u8; DIGEST_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(hasher.finalize().to_vec())
}

/// Entity tag strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtagGenerator {
    Weak,
    Strong(DigestAlgorithm),
}

impl EtagGenerator {
    /// Build the configured generator, `None` when etags are disabled
    pub fn from_config(config: &EtagConfig) -> Result<Option<Self>, StartupError> {
        if !config.enabled {
            return Ok(None);
        }
        match config.kind.trim().to_ascii_lowercase().as_str() {
            "weak" => Ok(Some(Self::Weak)),
            "strong" => Ok(Some(Self::Strong(DigestAlgorithm::from_name(
                &config.algorithm,
            )?))),
            _ => Err(StartupError::UnknownEtagKind(config.kind.clone())),
        }
    }

    /// Compute the etag of `file`
    ///
    /// Strong etags read the whole file on the blocking pool.
    pub async fn generate_etag(&self, file: &ResolvedFile) -> io::Result<String> {
        match *self {
            Self::Weak => Ok(weak_etag(&file.name(), file.len, file.modified_millis)),
            Self::Strong(algorithm) => {
                let path = file.path.clone();
                tokio::task::spawn_blocking(move || strong_etag(&path, algorithm))
                    .await
                    .map_err(io::Error::other)?
            }
        }
    }
}

/// Polynomial hash (base 31) over the UTF-16 code units of `name`
///
/// Arithmetic is signed 64-bit and wraps on overflow.
pub fn name_hash(name: &str) -> i64 {
    name.encode_utf16()
        .fold(0i64, |hash, unit| hash.wrapping_mul(31).wrapping_add(i64::from(unit)))
}

/// `W/"<b64(mtime ^ h)><b64(len ^ h)>"`, each value base64-encoded as its
/// signed decimal text
pub fn weak_etag(name: &str, len: u64, modified_millis: i64) -> String {
    let hash = name_hash(name);
    // Lengths beyond i64::MAX wrap like the signed hash does
    #[allow(clippy::cast_possible_wrap)]
    let len = len as i64;

    let mut etag = String::with_capacity(64);
    etag.push_str("W/\"");
    STANDARD.encode_string((modified_millis ^ hash).to_string(), &mut etag);
    STANDARD.encode_string((len ^ hash).to_string(), &mut etag);
    etag.push('"');
    etag
}

/// `"<UPPERCASE HEX DIGEST>"` of the file content
pub fn strong_etag(path: &Path, algorithm: DigestAlgorithm) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    let digest = algorithm.digest_reader(file)?;
    Ok(format!("\"{}\"", hex::encode_upper(digest)))
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Uses weak comparison: `W/"x"` and `"x"` are equal.
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = opaque_tag(etag);
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || (!candidate.is_empty() && opaque_tag(candidate) == ours)
        })
    })
}

fn opaque_tag(etag: &str) -> &str {
    etag.strip_prefix("W/").unwrap_or(etag)
}
