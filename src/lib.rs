//! DOSE: a static file delivery server
//!
//! Serves files from a single base download folder over HTTP/1.1, with
//! optional TLS. Request paths are validated against traversal before any
//! filesystem access, responses carry weak or strong entity tags, and file
//! bodies go out zero-copy on plaintext connections or in fixed-size chunks
//! on encrypted ones.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
