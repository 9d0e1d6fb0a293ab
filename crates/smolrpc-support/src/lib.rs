//! Ambient stack for the three `smolrpc` service binaries: JSON config
//! loading, the SIGINT/SIGHUP/SIGTERM shutdown signal, and tracing setup.
//! None of this is part of the RPC framework itself — see `smolrpc-rpc`.

mod config;
mod shutdown;
mod tracing_init;

pub use config::{Config, ConfigError};
pub use shutdown::wait_for_shutdown_signal;
pub use tracing_init::init_tracing;

/// Exit code for a clean shutdown triggered by a signal.
pub const EXIT_OK: i32 = 0;
/// Exit code for a configuration-file error or an unusable listen/broker
/// address.
pub const EXIT_CONFIG_ERROR: i32 = 1;
