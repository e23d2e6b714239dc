//! Request-scoped scratch directory.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Exclusive temporary directory for one request.
///
/// The directory and everything in it is removed when the handle is dropped,
/// whether the request succeeded, failed, panicked or was cancelled mid-await.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a uniquely named directory under `root`, creating `root` first if needed.
    pub async fn allocate(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new().prefix("req-").tempdir_in(root)?;
        tracing::debug!(path = %dir.path().display(), "Workspace allocated");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `data` to `name` inside the workspace.
    pub async fn write(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.file(name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Delete the workspace now and report failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
