//! Sink that mirrors object keys as files under a local directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::Sink;
use crate::config::{FileCollisionAction, SinkConfig};
use crate::error::SinkError;
use crate::store::ByteStream;
use crate::types::FileDescriptor;
use crate::utils::{get_unique_path, key_to_relative_path};

/// Writes each object to `root/<key segments>`
///
/// Bodies are streamed into a `.part` file next to the destination and
/// renamed into place once complete, so a failed transfer never leaves a
/// truncated file under the final name.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    root: PathBuf,
    delimiter: String,
    collision: FileCollisionAction,
}

impl DirectorySink {
    /// Create a sink rooted at `root`, splitting keys on "/"
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            delimiter: "/".to_string(),
            collision: FileCollisionAction::default(),
        }
    }

    /// Create a sink from the `sink` section of the configuration
    pub fn from_config(config: &SinkConfig, delimiter: &str) -> Self {
        Self {
            root: config.output_dir.clone(),
            delimiter: delimiter.to_string(),
            collision: config.file_collision,
        }
    }

    /// Split keys on a different delimiter
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Set the collision policy
    pub fn with_collision(mut self, collision: FileCollisionAction) -> Self {
        self.collision = collision;
        self
    }

    /// Output root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for `key`, before collision handling
    pub fn path_for(&self, key: &str) -> Result<PathBuf, SinkError> {
        Ok(self.root.join(key_to_relative_path(key, &self.delimiter)?))
    }
}

#[async_trait::async_trait]
impl Sink for DirectorySink {
    async fn write(&self, file: &FileDescriptor, mut body: ByteStream) -> Result<u64, SinkError> {
        let dest = self.path_for(&file.key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let dest = get_unique_path(&dest, self.collision)?;
        let part = part_path(&dest);

        let result = async {
            let mut out = tokio::fs::File::create(&part).await?;
            let mut written = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(SinkError::Stream)?;
                out.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            out.flush().await?;
            out.sync_all().await?;
            drop(out);
            tokio::fs::rename(&part, &dest).await?;
            Ok::<_, SinkError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                tracing::debug!(key = %file.key, path = %dest.display(), bytes = written, "Wrote object");
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
