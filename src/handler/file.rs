//! Per-request view of a resolved file
//!
//! Re-read from the filesystem on every request so responses always reflect
//! the current state of the file.

use std::borrow::Cow;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata snapshot of the file a request resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub exists: bool,
    pub hidden: bool,
    pub is_file: bool,
    /// Byte length at inspection time
    pub len: u64,
    /// Last modification, milliseconds since the Unix epoch (0 when unknown)
    pub modified_millis: i64,
}

impl ResolvedFile {
    /// Stat `path`; a failing stat is reported as a missing file
    pub async fn inspect(path: PathBuf) -> Self {
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Self::from_metadata(path, &metadata),
            Err(_) => Self::missing(path),
        }
    }

    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let hidden = is_hidden(&path, metadata);
        Self {
            exists: true,
            hidden,
            is_file: metadata.is_file(),
            len: metadata.len(),
            modified_millis: metadata.modified().map_or(0, epoch_millis),
            path,
        }
    }

    pub const fn missing(path: PathBuf) -> Self {
        Self {
            path,
            exists: false,
            hidden: false,
            is_file: false,
            len: 0,
            modified_millis: 0,
        }
    }

    /// Final path component, or an empty string for a bare root
    pub fn name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map_or(Cow::Borrowed(""), |name| name.to_string_lossy())
    }

    /// Missing and hidden files are indistinguishable to clients
    pub const fn is_visible(&self) -> bool {
        self.exists && !self.hidden
    }
}

/// Signed milliseconds relative to the Unix epoch
fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}

#[cfg(unix)]
fn is_hidden(path: &Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

#[cfg(windows)]
fn is_hidden(_path: &Path, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(any(unix, windows)))]
fn is_hidden(_path: &Path, _metadata: &Metadata) -> bool {
    false
}
