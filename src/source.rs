//! Rule sources.
//!
//! A [`RuleSource`] is one of a closed set of backends, each able to say
//! whether its rules changed since the last check and to read the full rule
//! text:
//!
//! - [`LocalFileSource`] - a file, polled by modification time
//! - [`RemoteDocumentSource`] - an HTTP(S) document, polled with conditional `HEAD`
//! - [`TableSource`] - rows of a relational table, polled by `max(update_time)`

use std::time::SystemTime;

use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::error::Result;
use crate::synonym::builder::RawRules;

pub mod database;
pub mod descriptor;
pub mod local;
pub mod remote;

pub use database::TableSource;
pub use descriptor::{RowShape, RuleSourceDescriptor, SourceLocation, TableLocation};
pub use local::LocalFileSource;
pub use remote::{RemoteDocumentSource, Validators};

/// A change a source reported that has not been loaded yet.
///
/// Polling again keeps reporting it until it is handed back through
/// [`RuleSource::acknowledge`], so a reload that failed to read the rules is
/// retried on the next tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingChange {
    Modified(SystemTime),
    Validators(Validators),
    UpdatedAt(NaiveDateTime),
}

/// An opened rule source.
#[derive(Debug)]
pub enum RuleSource {
    LocalFile(LocalFileSource),
    RemoteDocument(RemoteDocumentSource),
    RelationalTable(TableSource),
}

impl RuleSource {
    /// Open the source a descriptor points at.
    pub async fn open(descriptor: &RuleSourceDescriptor) -> Result<Self> {
        let dialect = descriptor.dialect;
        Ok(match &descriptor.location {
            SourceLocation::LocalFile { path } => {
                RuleSource::LocalFile(LocalFileSource::open(path.clone(), dialect).await?)
            }
            SourceLocation::RemoteDocument { url } => {
                RuleSource::RemoteDocument(RemoteDocumentSource::open(url.clone(), dialect).await?)
            }
            SourceLocation::RelationalTable(table) => {
                RuleSource::RelationalTable(TableSource::open(table.clone(), dialect).await?)
            }
        })
    }

    /// Whether the rules changed since the last check, recording the change
    /// as seen.
    ///
    /// Never fails: a source that cannot be probed is logged and reported
    /// as unchanged.
    pub async fn is_stale(&self) -> bool {
        match self.check_stale().await {
            Ok(stale) => stale,
            Err(e) => {
                warn!("failed to check synonym source {} for changes: {e}", self.describe());
                false
            }
        }
    }

    /// Like [`RuleSource::is_stale`], but reports probe failures.
    pub async fn check_stale(&self) -> Result<bool> {
        match self.poll_change().await? {
            Some(change) => {
                self.acknowledge(change);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The change since the last acknowledged one, without recording it.
    pub async fn poll_change(&self) -> Result<Option<PendingChange>> {
        Ok(match self {
            RuleSource::LocalFile(source) => {
                source.poll_change().await?.map(PendingChange::Modified)
            }
            RuleSource::RemoteDocument(source) => {
                source.poll_change().await?.map(PendingChange::Validators)
            }
            RuleSource::RelationalTable(source) => {
                source.poll_change().await?.map(PendingChange::UpdatedAt)
            }
        })
    }

    /// Record `change` as loaded.
    pub fn acknowledge(&self, change: PendingChange) {
        match (self, change) {
            (RuleSource::LocalFile(source), PendingChange::Modified(modified)) => {
                source.acknowledge(modified)
            }
            (RuleSource::RemoteDocument(source), PendingChange::Validators(validators)) => {
                source.acknowledge(validators)
            }
            (RuleSource::RelationalTable(source), PendingChange::UpdatedAt(update_time)) => {
                source.acknowledge(update_time)
            }
            (_, change) => debug!(
                "ignoring {change:?} acknowledged on synonym source {}",
                self.describe()
            ),
        }
    }

    /// Read the complete rule text.
    pub async fn read_rules(&self) -> Result<RawRules> {
        match self {
            RuleSource::LocalFile(source) => source.read_rules().await,
            RuleSource::RemoteDocument(source) => source.read_rules().await,
            RuleSource::RelationalTable(source) => source.read_rules().await,
        }
    }

    /// Release held resources. Tables hold no connection between
    /// operations and files no handle, so only logging happens here.
    pub async fn close(&self) {
        debug!("closing synonym source {}", self.describe());
    }

    /// Human-readable location, for logs.
    pub fn describe(&self) -> String {
        match self {
            RuleSource::LocalFile(source) => source.path().display().to_string(),
            RuleSource::RemoteDocument(source) => source.url().to_string(),
            RuleSource::RelationalTable(source) => {
                format!("{}:{}", source.location().url, source.location().table)
            }
        }
    }
}
