//! Rules from a file on the local filesystem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;
use parking_lot::Mutex;

use crate::error::{Result, SynonymError};
use crate::synonym::builder::RawRules;
use crate::synonym::parser::RuleDialect;

/// A rule file, polled by modification time.
#[derive(Debug)]
pub struct LocalFileSource {
    path: PathBuf,
    dialect: RuleDialect,
    last_modified: Mutex<SystemTime>,
}

impl LocalFileSource {
    /// Open `path`, recording its current modification time.
    pub async fn open<P: Into<PathBuf>>(path: P, dialect: RuleDialect) -> Result<Self> {
        let path = path.into();
        let modified = modified_time(&path).await?;
        Ok(LocalFileSource {
            path,
            dialect,
            last_modified: Mutex::new(modified),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's mtime, if it moved past the recorded one. Nothing is
    /// recorded until [`LocalFileSource::acknowledge`].
    pub async fn poll_change(&self) -> Result<Option<SystemTime>> {
        let modified = modified_time(&self.path).await?;
        if modified > *self.last_modified.lock() {
            debug!(
                "synonym file {} modified since last load",
                self.path.display()
            );
            Ok(Some(modified))
        } else {
            Ok(None)
        }
    }

    pub fn acknowledge(&self, modified: SystemTime) {
        let mut last = self.last_modified.lock();
        if modified > *last {
            *last = modified;
        }
    }

    pub async fn read_rules(&self) -> Result<RawRules> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SynonymError::source_unavailable(format!(
                "failed to read synonym file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(RawRules::new(text, self.dialect))
    }
}

async fn modified_time(path: &Path) -> Result<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|metadata| metadata.modified())
        .map_err(|e| {
            SynonymError::source_unavailable(format!(
                "failed to stat synonym file {}: {e}",
                path.display()
            ))
        })
}
