use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique unix-socket path under the system temp dir, removed by the
/// `Server` on `stop()` but cleaned up here too in case a test panics
/// before that.
pub fn temp_socket_path(label: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "smolrpc-test-{label}-{}-{}.sock",
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_file(&path);
    path.to_string_lossy().into_owned()
}
