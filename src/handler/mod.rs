//! Request handler module
//!
//! Path resolution, per-request file inspection, the dispatch pipeline and
//! the hyper service that feeds it.

pub mod dispatcher;
pub mod file;
pub mod resolver;
pub mod service;

// Re-export main entry points
pub use dispatcher::{ConnectionInfo, InboundRequest, RequestDispatcher};
pub use file::ResolvedFile;
pub use resolver::{resolve, ResolveError};
pub use service::handle_request;
