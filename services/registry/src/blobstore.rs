use std::path::{Path, PathBuf};

use smolrpc_core::Byte;

/// A content-addressed blob store rooted at a data directory: each
/// `(data_class, id)` pair maps to one file at
/// `<data_dir>/<data_class>/<id>`. Grounded on the original's `registry`
/// type, whose header exposes `store`/`retrieve` but leaves the storage
/// layout itself unspecified.
#[derive(Clone)]
pub struct Registry {
    data_dir: PathBuf,
}

impl Registry {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Registry {
            data_dir: data_dir.into(),
        }
    }

    fn blob_path(&self, data_class: &str, id: u64) -> PathBuf {
        self.data_dir.join(data_class).join(id.to_string())
    }

    /// Writes the blob, creating the data class's directory if needed.
    /// Returns `false` on any I/O failure rather than propagating it — the
    /// original's `registry_impl::store` catches a failed write and
    /// reports it as a plain `false`, not a protocol-level error.
    pub fn store(&self, data_class: &str, id: u64, data: Vec<Byte>) -> bool {
        let path = self.blob_path(data_class, id);
        let Some(parent) = path.parent() else {
            return false;
        };
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
        let bytes: Vec<u8> = data.into_iter().map(|b| b.0).collect();
        std::fs::write(&path, bytes).is_ok()
    }

    pub fn retrieve(&self, data_class: &str, id: u64) -> Option<Vec<Byte>> {
        let path = self.blob_path(data_class, id);
        let bytes = std::fs::read(path).ok()?;
        Some(bytes.into_iter().map(Byte).collect())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
