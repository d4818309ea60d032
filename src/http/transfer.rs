//! File body transfer
//!
//! Plaintext connections get the whole file handed to the transport in as
//! few reads as possible: a file up to `WHOLE_FILE_BUFFER` bytes goes out as
//! a single frame. TLS connections must encrypt every byte in user space, so
//! the file is streamed in fixed-size chunks instead. Both paths yield the
//! same bytes and completion signals, and a file truncated mid-transfer ends
//! the body with an error instead of taking the process down.

use bytes::Bytes;
use futures_util::Stream;
use hyper::body::{Body, Frame, SizeHint};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, Take};
use tokio_util::io::ReaderStream;

use crate::logger;

/// Chunk size for streamed transfers
pub const CHUNK_SIZE: usize = 8192;

/// Read buffer for whole-file transfers
pub const WHOLE_FILE_BUFFER: usize = 2 * 1024 * 1024;

/// How a response body is moved to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    /// Whole file handed to the transport in large reads
    ZeroCopyWhole,
    /// File read and sent in `chunk_size` pieces
    ChunkedStream { chunk_size: usize },
}

impl TransferPlan {
    /// Choose the plan for a connection
    pub const fn plan(connection_is_encrypted: bool) -> Self {
        if connection_is_encrypted {
            Self::ChunkedStream {
                chunk_size: CHUNK_SIZE,
            }
        } else {
            Self::ZeroCopyWhole
        }
    }

    /// Build the body sending the first `len` bytes of `file`
    pub async fn open_body(
        self,
        file: File,
        len: u64,
        observer: Arc<dyn TransferObserver>,
    ) -> io::Result<FileBody> {
        let capacity = match self {
            Self::ZeroCopyWhole => {
                // A file that shrank since inspection fails before any header is sent
                if file.metadata().await?.len() < len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file shrank before transfer",
                    ));
                }
                usize::try_from(len).map_or(WHOLE_FILE_BUFFER, |n| n.clamp(1, WHOLE_FILE_BUFFER))
            }
            Self::ChunkedStream { chunk_size } => chunk_size,
        };
        let source = ReaderStream::with_capacity(file.take(len), capacity);

        Ok(FileBody {
            source,
            sent: 0,
            total: len,
            observer,
            finished: false,
        })
    }
}

/// Final state of a transfer, reported once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every byte was handed to the transport
    Complete { bytes: u64 },
    /// Reading the file failed
    Failed { bytes: u64, error: String },
    /// The body was dropped before completion (peer went away)
    Aborted { bytes: u64 },
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { bytes } => write!(f, "complete ({bytes} bytes)"),
            Self::Failed { bytes, error } => write!(f, "failed after {bytes} bytes: {error}"),
            Self::Aborted { bytes } => write!(f, "aborted after {bytes} bytes"),
        }
    }
}

/// Listener for transfer lifecycle events
///
/// Purely observational: a panicking observer is logged and ignored.
pub trait TransferObserver: Send + Sync {
    /// `total` is `None` when the size is not known up front
    fn on_progress(&self, progress: u64, total: Option<u64>);

    fn on_complete(&self, outcome: &TransferOutcome);
}

/// Observer writing progress and completion to the server log
pub struct LoggingObserver {
    label: String,
}

impl LoggingObserver {
    pub const fn new(label: String) -> Self {
        Self { label }
    }
}

impl TransferObserver for LoggingObserver {
    fn on_progress(&self, progress: u64, total: Option<u64>) {
        logger::log_transfer_progress(&self.label, progress, total);
    }

    fn on_complete(&self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Complete { .. } => {
                logger::log_debug(&format!("{} Transfer {outcome}", self.label));
            }
            TransferOutcome::Failed { .. } => {
                logger::log_error(&format!("{} Transfer {outcome}", self.label));
            }
            TransferOutcome::Aborted { .. } => {
                logger::log_warning(&format!("{} Transfer {outcome}", self.label));
            }
        }
    }
}

/// Response body streaming one file
pub struct FileBody {
    source: ReaderStream<Take<File>>,
    sent: u64,
    total: u64,
    observer: Arc<dyn TransferObserver>,
    finished: bool,
}

impl FileBody {
    fn notify(&self, event: impl FnOnce(&dyn TransferObserver)) {
        let observer = self.observer.as_ref();
        if panic::catch_unwind(AssertUnwindSafe(|| event(observer))).is_err() {
            logger::log_warning("Transfer observer panicked; transfer continues");
        }
    }

    fn finish(&mut self, outcome: &TransferOutcome) {
        self.finished = true;
        self.notify(|observer| observer.on_complete(outcome));
    }
}

impl Body for FileBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.source).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(bytes))) => {
                this.sent += bytes.len() as u64;
                let (sent, total) = (this.sent, this.total);
                this.notify(|observer| observer.on_progress(sent, Some(total)));
                // The frame carrying the last byte terminates the body
                if sent >= total {
                    this.finish(&TransferOutcome::Complete { bytes: sent });
                }
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Err(error))) => {
                this.finish(&TransferOutcome::Failed {
                    bytes: this.sent,
                    error: error.to_string(),
                });
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) if this.sent < this.total => {
                let error = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended after {} of {} bytes", this.sent, this.total),
                );
                this.finish(&TransferOutcome::Failed {
                    bytes: this.sent,
                    error: error.to_string(),
                });
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.finish(&TransferOutcome::Complete { bytes: this.sent });
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.total.saturating_sub(self.sent))
    }
}

impl Drop for FileBody {
    fn drop(&mut self) {
        if !self.finished {
            let outcome = TransferOutcome::Aborted { bytes: self.sent };
            self.finish(&outcome);
        }
    }
}
