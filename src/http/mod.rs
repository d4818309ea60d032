//! HTTP protocol layer module
//!
//! Entity tags, connection persistence, response builders and body transfer,
//! decoupled from request dispatch.

pub mod etag;
pub mod keep_alive;
pub mod response;
pub mod transfer;

// Re-export commonly used types
pub use etag::{check_etag_match, DigestAlgorithm, EtagGenerator};
pub use keep_alive::is_keep_alive;
pub use response::{
    build_304_response, build_500_response, build_error_response, build_file_response,
    ResponseBody,
};
pub use transfer::{
    FileBody, LoggingObserver, TransferObserver, TransferOutcome, TransferPlan, CHUNK_SIZE,
};
