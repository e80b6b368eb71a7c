use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resolves skill-relative paths to text.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when nothing exists at `path`.
    async fn read(&self, path: &Path) -> std::io::Result<Option<String>>;

    /// Where `path` lives, for error messages.
    fn locate(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Reads documents from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, path: &Path) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.root.join(path)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn locate(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}
