//! One synonym filter's reload step.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::error::Result;
use crate::source::{RuleSource, RuleSourceDescriptor};
use crate::synonym::builder::MapBuilder;
use crate::synonym::map::SynonymMap;
use crate::synonym::registry::PublishedSynonyms;

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The source reported no change.
    Unchanged,
    /// A new map was published.
    Reloaded { consumers: usize },
    /// Reading or building failed; the previous map stays.
    Failed,
    /// The monitor was closed or its factories are gone; nothing published.
    Discarded,
}

/// What a monitor's maps are built from.
///
/// Two factories of one filter share published state only while their
/// definitions are equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorSpec {
    pub descriptor: RuleSourceDescriptor,
    pub expand: bool,
    pub lenient: bool,
    /// Tokenizer name followed by the names of the filters rule terms pass.
    pub chain: Vec<String>,
}

/// Polls one rule source and publishes rebuilt maps to one published state.
///
/// Holds the published state weakly: once every factory handing it out is
/// dropped, ticks become no-ops and the scheduler forgets the monitor.
pub struct Monitor {
    filter_name: String,
    spec: MonitorSpec,
    source: RuleSource,
    builder: MapBuilder,
    target: Weak<PublishedSynonyms>,
    closed: AtomicBool,
    publish_gate: Mutex<()>,
}

impl Monitor {
    pub fn new<S: Into<String>>(
        filter_name: S,
        spec: MonitorSpec,
        source: RuleSource,
        builder: MapBuilder,
        target: &Arc<PublishedSynonyms>,
    ) -> Self {
        Monitor {
            filter_name: filter_name.into(),
            spec,
            source,
            builder,
            target: Arc::downgrade(target),
            closed: AtomicBool::new(false),
            publish_gate: Mutex::new(()),
        }
    }

    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }

    pub fn spec(&self) -> &MonitorSpec {
        &self.spec
    }

    pub fn source(&self) -> &RuleSource {
        &self.source
    }

    /// The published state, if a factory still holds it.
    pub fn target(&self) -> Option<Arc<PublishedSynonyms>> {
        self.target.upgrade()
    }

    /// Whether ticks can still publish.
    pub fn is_attached(&self) -> bool {
        !self.is_closed() && self.target.strong_count() > 0
    }

    /// Stop publishing. A rebuild already running finishes but is dropped;
    /// once this returns no further map is published.
    pub fn close(&self) {
        let _gate = self.publish_gate.lock();
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Read the rules and build a map off the async workers.
    pub async fn rebuild(&self) -> Result<SynonymMap> {
        let rules = self.source.read_rules().await?;
        self.builder.build_blocking(rules).await
    }

    /// Check the source and, if it changed, rebuild and publish.
    ///
    /// The change is recorded as seen only once it is published, or once
    /// its rules were read and rejected. A source that could not be read is
    /// tried again on the next tick.
    pub async fn tick(&self) -> TickOutcome {
        if !self.is_attached() {
            return TickOutcome::Discarded;
        }
        let change = match self.source.poll_change().await {
            Ok(Some(change)) => change,
            Ok(None) => {
                debug!("synonym source {} unchanged", self.source.describe());
                return TickOutcome::Unchanged;
            }
            Err(e) => {
                warn!(
                    "failed to check synonym source {} for changes: {e}",
                    self.source.describe()
                );
                return TickOutcome::Unchanged;
            }
        };

        info!(
            "synonym source {} changed, reloading filter {}",
            self.source.describe(),
            self.filter_name
        );

        let map = match self.rebuild().await {
            Ok(map) => map,
            Err(e) if e.is_fatal() => {
                warn!(
                    "rejected new synonyms for filter {}, keeping previous rules: {e}",
                    self.filter_name
                );
                self.source.acknowledge(change);
                return TickOutcome::Failed;
            }
            Err(e) => {
                warn!(
                    "failed to reload synonyms for filter {}, keeping previous rules until the next tick: {e}",
                    self.filter_name
                );
                return TickOutcome::Failed;
            }
        };

        let _gate = self.publish_gate.lock();
        if self.is_closed() {
            debug!(
                "filter {} closed during reload, discarding new synonyms",
                self.filter_name
            );
            return TickOutcome::Discarded;
        }
        let Some(target) = self.target.upgrade() else {
            return TickOutcome::Discarded;
        };

        let entries = map.len();
        let consumers = target.publish(Arc::new(map));
        self.source.acknowledge(change);
        info!(
            "reloaded {entries} synonym entries for filter {} into {consumers} live filters",
            self.filter_name
        );
        TickOutcome::Reloaded { consumers }
    }

    pub(crate) async fn close_source(&self) {
        self.source.close().await;
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("filter_name", &self.filter_name)
            .field("spec", &self.spec)
            .field("source", &self.source.describe())
            .field("builder", &self.builder)
            .field("attached", &self.is_attached())
            .finish()
    }
}
