// Server module entry
// Listener setup, TLS, connection serving and the accept loop

pub mod connection;
pub mod listener;
pub mod signal;
pub mod tls;

// `loop` is a keyword, so the module is named server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_listener;
pub use server_loop::{run_server, SHUTDOWN_GRACE_PERIOD};
pub use signal::start_signal_handler;
