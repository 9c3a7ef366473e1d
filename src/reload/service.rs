//! Process-scoped scheduler running one reload timer per pipeline.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Result;
use crate::reload::monitor::{Monitor, TickOutcome};
use crate::synonym::registry::PublishedSynonyms;

/// Configuration for the reload service's own runtime.
#[derive(Debug, Clone)]
pub struct ReloadServiceConfig {
    /// Number of worker threads.
    pub worker_threads: usize,

    /// Worker threads are named `<prefix>-<n>`.
    pub thread_name_prefix: String,
}

impl Default for ReloadServiceConfig {
    fn default() -> Self {
        ReloadServiceConfig {
            worker_threads: 1,
            thread_name_prefix: "monitor-synonym".to_string(),
        }
    }
}

/// Lifecycle of a pipeline identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No timer is registered: none ever was, every filter of the pipeline
    /// was dropped, or it was closed and re-created since.
    Unmonitored,
    /// A timer is running.
    Monitoring,
    /// The timer was cancelled by [`ReloadService::close_pipeline`].
    Closed,
}

/// Statistics about reload ticks.
#[derive(Debug, Clone, Default)]
pub struct ReloadStats {
    /// Monitor ticks run.
    pub ticks: u64,

    /// Ticks that published a new map.
    pub reloads: u64,

    /// Ticks whose rebuild failed.
    pub failures: u64,

    /// Rebuilt maps dropped because their monitor was closed or detached.
    pub discarded: u64,
}

impl ReloadStats {
    fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Unchanged => {}
            TickOutcome::Reloaded { .. } => self.reloads += 1,
            TickOutcome::Failed => self.failures += 1,
            TickOutcome::Discarded => self.discarded += 1,
        }
    }
}

type Monitors = Arc<Mutex<Vec<Arc<Monitor>>>>;

/// Closed pipeline ids remembered for [`ReloadService::state`].
const CLOSED_HISTORY: usize = 1024;

/// A running timer and the monitors it ticks.
struct ScheduledTaskHandle {
    generation: u64,
    period: Duration,
    monitors: Monitors,
    cancel: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

#[derive(Default)]
struct Schedule {
    tasks: HashMap<String, ScheduledTaskHandle>,
    /// Most recently closed last.
    closed: VecDeque<String>,
    generations: u64,
}

impl Schedule {
    fn forget_closed(&mut self, pipeline_id: &str) {
        self.closed.retain(|id| id != pipeline_id);
    }

    fn remember_closed(&mut self, pipeline_id: &str) {
        self.forget_closed(pipeline_id);
        if self.closed.len() == CLOSED_HISTORY {
            self.closed.pop_front();
        }
        self.closed.push_back(pipeline_id.to_string());
    }
}

/// Runs reload timers, at most one per pipeline identifier.
///
/// Create one per process and share it with every factory as an
/// `Arc<ReloadService>`. The service either owns a small multi-thread runtime
/// or borrows the host's through [`ReloadService::with_handle`].
pub struct ReloadService {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    schedule: Arc<Mutex<Schedule>>,
    stats: Arc<Mutex<ReloadStats>>,
}

impl ReloadService {
    /// Start a service on its own runtime.
    pub fn new(config: ReloadServiceConfig) -> Result<Self> {
        let prefix = config.thread_name_prefix;
        let counter = AtomicUsize::new(0);
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name_fn(move || {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                format!("{prefix}-{n}")
            })
            .enable_all()
            .build()?;

        let handle = runtime.handle().clone();
        Ok(ReloadService {
            runtime: Mutex::new(Some(runtime)),
            handle,
            schedule: Arc::new(Mutex::new(Schedule::default())),
            stats: Arc::new(Mutex::new(ReloadStats::default())),
        })
    }

    /// Run timers on an existing runtime.
    pub fn with_handle(handle: Handle) -> Self {
        ReloadService {
            runtime: Mutex::new(None),
            handle,
            schedule: Arc::new(Mutex::new(Schedule::default())),
            stats: Arc::new(Mutex::new(ReloadStats::default())),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Drive `future` to completion from synchronous code.
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Attach `monitor` to the timer for `pipeline_id`, starting the timer if
    /// the pipeline has none.
    ///
    /// A pipeline already monitored keeps its timer and period. If a live
    /// monitor with the same filter name and an equal [`MonitorSpec`] is
    /// already attached, the new one is dropped and the existing published
    /// state is returned, so every factory of one filter shares one map. A
    /// live monitor with the same name but a different spec is closed and
    /// replaced. Otherwise `published` is returned.
    ///
    /// [`MonitorSpec`]: crate::reload::MonitorSpec
    pub fn monitor(
        &self,
        pipeline_id: &str,
        period: Duration,
        published: Arc<PublishedSynonyms>,
        monitor: Monitor,
    ) -> Arc<PublishedSynonyms> {
        let mut schedule = self.schedule.lock();

        if let Some(task) = schedule.tasks.get(pipeline_id) {
            let mut monitors = task.monitors.lock();
            if let Some(index) = monitors.iter().position(|existing| {
                existing.filter_name() == monitor.filter_name() && existing.is_attached()
            }) {
                let existing = &monitors[index];
                if existing.spec() == monitor.spec()
                    && let Some(target) = existing.target()
                {
                    debug!(
                        "filter {} joins existing synonym state of pipeline {pipeline_id}",
                        monitor.filter_name()
                    );
                    return target;
                }

                info!(
                    "filter {} of pipeline {pipeline_id} was redefined, replacing its synonym source",
                    monitor.filter_name()
                );
                existing.close();
                monitors.remove(index);
            }

            if task.period != period {
                debug!(
                    "pipeline {pipeline_id} already polls every {:?}, ignoring {period:?} for filter {}",
                    task.period,
                    monitor.filter_name()
                );
            }
            monitors.push(Arc::new(monitor));
            return published;
        }

        schedule.forget_closed(pipeline_id);
        schedule.generations += 1;
        let generation = schedule.generations;
        info!(
            "start monitoring synonyms for pipeline {pipeline_id} every {}s",
            period.as_secs_f64()
        );

        let monitors: Monitors = Arc::new(Mutex::new(vec![Arc::new(monitor)]));
        let (cancel, cancelled) = watch::channel(false);
        let task = self.spawn_timer(
            pipeline_id.to_string(),
            generation,
            period,
            Arc::clone(&monitors),
            cancelled,
        );

        schedule.tasks.insert(
            pipeline_id.to_string(),
            ScheduledTaskHandle {
                generation,
                period,
                monitors,
                cancel,
                _task: task,
            },
        );
        published
    }

    fn spawn_timer(
        &self,
        pipeline_id: String,
        generation: u64,
        period: Duration,
        monitors: Monitors,
        mut cancelled: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);
        let schedule = Arc::clone(&self.schedule);

        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => break,
                    _ = ticker.tick() => {}
                }

                let current: Vec<Arc<Monitor>> = monitors.lock().clone();
                for monitor in &current {
                    let outcome = monitor.tick().await;
                    stats.lock().record(outcome);
                }

                // Under the schedule lock, so no monitor joins a timer that
                // is about to stop.
                let (detached, idle) = {
                    let mut schedule = schedule.lock();
                    let mut attached = monitors.lock();
                    let (keep, detached): (Vec<_>, Vec<_>) =
                        attached.drain(..).partition(|monitor| monitor.is_attached());
                    *attached = keep;

                    let idle = attached.is_empty();
                    if idle
                        && schedule
                            .tasks
                            .get(&pipeline_id)
                            .is_some_and(|task| task.generation == generation)
                    {
                        schedule.tasks.remove(&pipeline_id);
                    }
                    (detached, idle)
                };
                for monitor in &detached {
                    monitor.close_source().await;
                }
                if idle {
                    info!("every synonym filter of pipeline {pipeline_id} is gone, stopping its timer");
                    break;
                }
            }

            let remaining = std::mem::take(&mut *monitors.lock());
            for monitor in &remaining {
                monitor.close_source().await;
            }
            debug!("synonym timer for pipeline {pipeline_id} stopped");
        })
    }

    /// Cancel the timer of `pipeline_id`.
    ///
    /// A rebuild in flight completes but is not published. Returns `false`
    /// when the pipeline had no timer.
    pub fn close_pipeline(&self, pipeline_id: &str) -> bool {
        let mut schedule = self.schedule.lock();
        let Some(task) = schedule.tasks.remove(pipeline_id) else {
            return false;
        };

        for monitor in task.monitors.lock().iter() {
            monitor.close();
        }
        // The receiver is gone once the timer has already exited.
        let _ = task.cancel.send(true);
        schedule.remember_closed(pipeline_id);

        info!("stopped monitoring synonyms for pipeline {pipeline_id}");
        true
    }

    pub fn state(&self, pipeline_id: &str) -> MonitorState {
        let schedule = self.schedule.lock();
        if schedule.tasks.contains_key(pipeline_id) {
            MonitorState::Monitoring
        } else if schedule.closed.iter().any(|id| id == pipeline_id) {
            MonitorState::Closed
        } else {
            MonitorState::Unmonitored
        }
    }

    /// Number of pipelines with a running timer.
    pub fn monitored_pipelines(&self) -> usize {
        self.schedule.lock().tasks.len()
    }

    /// Number of monitors attached to the timer of `pipeline_id`.
    pub fn monitors_of(&self, pipeline_id: &str) -> usize {
        self.schedule
            .lock()
            .tasks
            .get(pipeline_id)
            .map(|task| task.monitors.lock().len())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> ReloadStats {
        self.stats.lock().clone()
    }

    /// Close every pipeline and stop the owned runtime, if any.
    pub fn shutdown(&self) {
        let pipelines: Vec<String> = self.schedule.lock().tasks.keys().cloned().collect();
        for pipeline_id in pipelines {
            self.close_pipeline(&pipeline_id);
        }

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for ReloadService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ReloadService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadService")
            .field("owns_runtime", &self.runtime.lock().is_some())
            .field("monitored_pipelines", &self.monitored_pipelines())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::PipelineAnalyzer;
    use crate::analysis::tokenizer::WhitespaceTokenizer;
    use crate::reload::MonitorSpec;
    use crate::source::{RuleSource, RuleSourceDescriptor};
    use crate::synonym::builder::MapBuilder;
    use crate::synonym::map::SynonymMap;
    use crate::synonym::parser::RuleDialect;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn monitor(service: &ReloadService, path: &Path, name: &str) -> (Arc<PublishedSynonyms>, Monitor) {
        let descriptor = RuleSourceDescriptor::local_file(path, RuleDialect::Solr);
        let source = service.block_on(RuleSource::open(&descriptor)).unwrap();
        let builder = MapBuilder::new(Arc::new(PipelineAnalyzer::new(Arc::new(
            WhitespaceTokenizer::new(),
        ))));
        let spec = MonitorSpec {
            descriptor,
            expand: true,
            lenient: false,
            chain: vec!["whitespace".to_string()],
        };
        let published = Arc::new(PublishedSynonyms::new(SynonymMap::empty()));
        let monitor = Monitor::new(name, spec, source, builder, &published);
        (published, monitor)
    }

    #[test]
    fn test_single_timer_per_pipeline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "big, large\n").unwrap();

        let service = ReloadService::new(ReloadServiceConfig::default()).unwrap();
        let period = Duration::from_secs(60);
        assert_eq!(service.state("index-a"), MonitorState::Unmonitored);

        let (first, m1) = monitor(&service, &path, "synonyms");
        let kept = service.monitor("index-a", period, Arc::clone(&first), m1);
        assert!(Arc::ptr_eq(&kept, &first));

        // Same filter name joins the existing state.
        let (second, m2) = monitor(&service, &path, "synonyms");
        let joined = service.monitor("index-a", period, second, m2);
        assert!(Arc::ptr_eq(&joined, &first));

        // A different filter shares the timer.
        let (other, m3) = monitor(&service, &path, "brand_synonyms");
        let kept = service.monitor("index-a", period, Arc::clone(&other), m3);
        assert!(Arc::ptr_eq(&kept, &other));

        assert_eq!(service.monitored_pipelines(), 1);
        assert_eq!(service.monitors_of("index-a"), 2);
        assert_eq!(service.state("index-a"), MonitorState::Monitoring);

        // Same filter name, different source: the old monitor is replaced.
        let moved = dir.path().join("moved.txt");
        fs::write(&moved, "big, huge\n").unwrap();
        let (redefined, m4) = monitor(&service, &moved, "synonyms");
        let kept = service.monitor("index-a", period, Arc::clone(&redefined), m4);
        assert!(Arc::ptr_eq(&kept, &redefined));
        assert_eq!(service.monitors_of("index-a"), 2);
    }

    #[test]
    fn test_closed_history_is_bounded() {
        let mut schedule = Schedule::default();
        for n in 0..CLOSED_HISTORY + 10 {
            schedule.remember_closed(&format!("index-{n}"));
        }
        schedule.remember_closed("index-20");

        assert_eq!(schedule.closed.len(), CLOSED_HISTORY);
        assert!(!schedule.closed.iter().any(|id| id == "index-0"));
        assert_eq!(schedule.closed.back().map(String::as_str), Some("index-20"));

        schedule.forget_closed("index-20");
        assert_eq!(schedule.closed.len(), CLOSED_HISTORY - 1);
    }

    #[test]
    fn test_close_pipeline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "big, large\n").unwrap();

        let service = ReloadService::new(ReloadServiceConfig::default()).unwrap();
        let (published, m) = monitor(&service, &path, "synonyms");
        service.monitor("index-a", Duration::from_secs(60), published, m);

        assert!(!service.close_pipeline("index-b"));
        assert!(service.close_pipeline("index-a"));
        assert!(!service.close_pipeline("index-a"));
        assert_eq!(service.state("index-a"), MonitorState::Closed);
        assert_eq!(service.monitored_pipelines(), 0);

        // A new pipeline with the same id starts over.
        let (published, m) = monitor(&service, &path, "synonyms");
        service.monitor("index-a", Duration::from_secs(60), published, m);
        assert_eq!(service.state("index-a"), MonitorState::Monitoring);
    }
}
