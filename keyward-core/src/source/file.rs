//! Policy text from a local file

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{PolicySource, SourceError};

/// Reads the whole policy file on every fetch
#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PolicySource for FilePolicySource {
    async fn fetch(&self) -> Result<String, SourceError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
