use tracing_subscriber::EnvFilter;

/// Stderr, no ANSI timestamps beyond what `RUST_LOG` requests; `info` unless
/// overridden. Shared by all three service binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
