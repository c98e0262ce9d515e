use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::debug;

use goalflow_core::error::Result;
use goalflow_core::traits::ModelWriter;

/// Writes model files into a fixed directory, creating it on demand.
pub struct FsModelWriter {
    dir: PathBuf,
}

impl FsModelWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keep only the final path component so names cannot escape the directory.
fn file_name_for(suggested: &str) -> String {
    Path::new(suggested)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("model.sql")
        .to_string()
}

impl ModelWriter for FsModelWriter {
    fn persist<'a>(
        &'a self,
        content: &'a str,
        suggested_name: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.dir).await?;
            let path = self.dir.join(file_name_for(suggested_name));
            debug!(path = %path.display(), "Writing model file");
            tokio::fs::write(&path, content).await?;
            Ok(path)
        })
    }
}
