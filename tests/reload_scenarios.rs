use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tempfile::{Builder, TempDir};

use dynamic_synonym::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use dynamic_synonym::analysis::token_filter::{Filter, LowercaseFilter, TokenFilterFactory};
use dynamic_synonym::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
use dynamic_synonym::config::SynonymSettings;
use dynamic_synonym::factory::{ChainAwareSynonymFilterFactory, SynonymFilterFactory};
use dynamic_synonym::reload::{MonitorState, ReloadService, ReloadServiceConfig};

const TICK: Duration = Duration::from_millis(100);

fn rules_file(dir: &TempDir, name: &str, rules: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, rules).unwrap();
    path
}

/// Rewrite `path` and push its mtime forward so the change is always seen.
fn rewrite(path: &Path, rules: &str, bump_secs: u64) {
    fs::write(path, rules).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
        .unwrap();
}

fn wait_for<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

fn service() -> Arc<ReloadService> {
    Arc::new(ReloadService::new(ReloadServiceConfig::default()).unwrap())
}

fn chain() -> (Arc<dyn Tokenizer>, Vec<Arc<dyn Filter>>) {
    (
        Arc::new(WhitespaceTokenizer::new()),
        vec![Arc::new(LowercaseFilter::new())],
    )
}

fn settings_for(path: &Path) -> SynonymSettings {
    SynonymSettings {
        synonyms_path: Some(path.display().to_string()),
        ..Default::default()
    }
}

fn specialize(
    service: &Arc<ReloadService>,
    pipeline: &str,
    name: &str,
    settings: &SynonymSettings,
) -> ChainAwareSynonymFilterFactory {
    let factory = SynonymFilterFactory::new(name, pipeline, settings, Arc::clone(service))
        .unwrap()
        .with_interval(TICK);
    let (tokenizer, filters) = chain();
    factory.chain_aware(tokenizer, &filters).unwrap()
}

fn analyze(specialized: &ChainAwareSynonymFilterFactory, text: &str) -> Vec<String> {
    let (tokenizer, filters) = chain();
    let mut analyzer = PipelineAnalyzer::new(tokenizer);
    for filter in filters {
        analyzer = analyzer.add_filter(filter);
    }
    specialized
        .create(analyzer.analyze(text).unwrap())
        .map(|token| token.text)
        .collect()
}

#[test]
fn test_expand_equivalence_group() {
    let dir = Builder::new().prefix("test_expand").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large, huge\n");
    let service = service();

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    assert_eq!(analyze(&specialized, "big"), vec!["big", "large", "huge"]);
    let map = specialized.current_map();
    assert_eq!(map.synonyms_of("large"), vec!["big", "huge"]);
    assert_eq!(map.synonyms_of("huge"), vec!["big", "large"]);

    let unexpanded = SynonymSettings {
        expand: false,
        ..settings_for(&path)
    };
    let specialized = specialize(&service, "index-b", "synonyms", &unexpanded);
    assert_eq!(analyze(&specialized, "huge"), vec!["big"]);
    assert_eq!(analyze(&specialized, "big"), vec!["big"]);
}

#[test]
fn test_directional_multi_word_output() {
    let dir = Builder::new().prefix("test_directional").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "ny => new york\n");
    let service = service();

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    assert_eq!(analyze(&specialized, "visit NY"), vec!["visit", "new", "york"]);
    assert_eq!(analyze(&specialized, "new york"), vec!["new", "york"]);
    assert!(specialized.current_map().synonyms_of("new york").is_empty());
}

#[test]
fn test_malformed_line_fails_strict_initial_build() {
    let dir = Builder::new().prefix("test_initial").tempdir().unwrap();
    let rules = "big, large\nfoo => bar => baz\nny => new york\n";
    let path = rules_file(&dir, "synonyms.txt", rules);
    let service = service();
    let (tokenizer, filters) = chain();

    let strict = SynonymFilterFactory::new(
        "synonyms",
        "index-a",
        &settings_for(&path),
        Arc::clone(&service),
    )
    .unwrap();
    assert!(strict.chain_aware(Arc::clone(&tokenizer), &filters).is_err());
    assert_eq!(service.state("index-a"), MonitorState::Unmonitored);

    let settings = SynonymSettings {
        lenient: true,
        ..settings_for(&path)
    };
    let specialized = specialize(&service, "index-a", "synonyms", &settings);
    let map = specialized.current_map();
    assert_eq!(map.synonyms_of("big"), vec!["large"]);
    assert_eq!(map.synonyms_of("ny"), vec!["new york"]);
}

#[test]
fn test_reload_reaches_live_filters() {
    let dir = Builder::new().prefix("test_reload").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large\n");
    let service = service();

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    let filter = specialized.new_filter();
    assert_eq!(filter.current_map().synonyms_of("big"), vec!["large"]);
    assert_eq!(specialized.published().consumers().len(), 1);

    rewrite(&path, "big, large, huge\n", 5);
    assert!(wait_for(Duration::from_secs(5), || {
        filter.current_map().synonyms_of("big") == vec!["large", "huge"]
    }));
    assert_eq!(
        specialized.current_map().synonyms_of("big"),
        vec!["large", "huge"]
    );
    assert!(service.stats().reloads >= 1);

    drop(filter);
    assert!(specialized.published().consumers().is_empty());
}

#[test]
fn test_unchanged_source_publishes_nothing() {
    let dir = Builder::new().prefix("test_unchanged").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large\n");
    let service = service();

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    let before = specialized.current_map();

    assert!(wait_for(Duration::from_secs(5), || service.stats().ticks >= 3));
    assert!(Arc::ptr_eq(&before, &specialized.current_map()));
    assert_eq!(specialized.published().version(), 0);
}

#[test]
fn test_strict_reload_failure_keeps_previous_map() {
    let dir = Builder::new().prefix("test_strict").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large\n");
    let service = service();

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    let before = specialized.current_map();

    rewrite(&path, "big, large\nfoo => bar => baz\n", 5);
    assert!(wait_for(Duration::from_secs(5), || service.stats().failures >= 1));
    assert!(Arc::ptr_eq(&before, &specialized.current_map()));
    assert_eq!(service.state("index-a"), MonitorState::Monitoring);
}

#[test]
fn test_lenient_reload_skips_bad_line() {
    let dir = Builder::new().prefix("test_lenient").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large\n");
    let service = service();
    let settings = SynonymSettings {
        lenient: true,
        ..settings_for(&path)
    };

    let specialized = specialize(&service, "index-a", "synonyms", &settings);

    rewrite(&path, "big, large\nfoo => bar => baz\nny => new york\n", 5);
    assert!(wait_for(Duration::from_secs(5), || {
        !specialized.current_map().synonyms_of("ny").is_empty()
    }));

    let map = specialized.current_map();
    assert_eq!(map.synonyms_of("ny"), vec!["new york"]);
    assert_eq!(map.synonyms_of("big"), vec!["large"]);
    assert!(map.synonyms_of("foo").is_empty());
}

#[test]
fn test_concurrent_factories_share_one_timer_and_map() {
    let dir = Builder::new().prefix("test_concurrent").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large\n");
    let service = service();
    let settings = settings_for(&path);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let settings = settings.clone();
            thread::spawn(move || specialize(&service, "index-a", "synonyms", &settings))
        })
        .collect();
    let factories: Vec<ChainAwareSynonymFilterFactory> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(service.monitored_pipelines(), 1);
    assert_eq!(service.monitors_of("index-a"), 1);
    for factory in &factories[1..] {
        assert!(Arc::ptr_eq(factory.published(), factories[0].published()));
    }

    rewrite(&path, "big, huge\n", 5);
    assert!(wait_for(Duration::from_secs(5), || {
        factories[0].current_map().synonyms_of("big") == vec!["huge"]
    }));
    for factory in &factories {
        assert_eq!(factory.current_map().synonyms_of("big"), vec!["huge"]);
    }
}

#[test]
fn test_closing_one_pipeline_leaves_others_running() {
    let dir = Builder::new().prefix("test_close").tempdir().unwrap();
    let path_x = rules_file(&dir, "x.txt", "big, large\n");
    let path_y = rules_file(&dir, "y.txt", "big, large\n");
    let service = service();

    let x = specialize(&service, "index-x", "synonyms", &settings_for(&path_x));
    let y = specialize(&service, "index-y", "synonyms", &settings_for(&path_y));
    assert_eq!(service.monitored_pipelines(), 2);

    assert!(service.close_pipeline("index-x"));
    assert_eq!(service.state("index-x"), MonitorState::Closed);
    assert_eq!(service.state("index-y"), MonitorState::Monitoring);

    rewrite(&path_x, "big, huge\n", 5);
    rewrite(&path_y, "big, huge\n", 5);

    assert!(wait_for(Duration::from_secs(5), || {
        y.current_map().synonyms_of("big") == vec!["huge"]
    }));
    thread::sleep(TICK * 3);
    assert_eq!(x.current_map().synonyms_of("big"), vec!["large"]);
    assert_eq!(x.published().version(), 0);
}

#[test]
fn test_distinct_filters_share_pipeline_timer() {
    let dir = Builder::new().prefix("test_distinct").tempdir().unwrap();
    let general = rules_file(&dir, "general.txt", "big, large\n");
    let brands = rules_file(&dir, "brands.txt", "coke => coca cola\n");
    let service = service();

    let a = specialize(&service, "index-a", "synonyms", &settings_for(&general));
    let b = specialize(&service, "index-a", "brand_synonyms", &settings_for(&brands));

    assert_eq!(service.monitored_pipelines(), 1);
    assert_eq!(service.monitors_of("index-a"), 2);
    assert!(!Arc::ptr_eq(a.published(), b.published()));

    rewrite(&brands, "coke => coca cola\npepsi => pepsi cola\n", 5);
    assert!(wait_for(Duration::from_secs(5), || {
        !b.current_map().synonyms_of("pepsi").is_empty()
    }));
    assert_eq!(a.current_map().synonyms_of("big"), vec!["large"]);
}

#[test]
fn test_redefined_filter_serves_its_own_source() {
    let dir = Builder::new().prefix("test_redefined").tempdir().unwrap();
    let first_rules = rules_file(&dir, "a.txt", "big, large\n");
    let second_rules = rules_file(&dir, "b.txt", "tv, television\n");
    let service = service();

    let first = specialize(&service, "index-a", "synonyms", &settings_for(&first_rules));
    let second = specialize(&service, "index-a", "synonyms", &settings_for(&second_rules));

    assert!(!Arc::ptr_eq(first.published(), second.published()));
    assert_eq!(second.current_map().synonyms_of("tv"), vec!["television"]);
    assert!(second.current_map().synonyms_of("big").is_empty());
    assert_eq!(service.monitors_of("index-a"), 1);

    // Only the new source is polled from now on.
    rewrite(&first_rules, "big, huge\n", 5);
    rewrite(&second_rules, "tv, telly\n", 5);
    assert!(wait_for(Duration::from_secs(5), || {
        second.current_map().synonyms_of("tv") == vec!["telly"]
    }));
    thread::sleep(TICK * 3);
    assert_eq!(first.current_map().synonyms_of("big"), vec!["large"]);

    // Unchanged settings still join.
    let again = specialize(&service, "index-a", "synonyms", &settings_for(&second_rules));
    assert!(Arc::ptr_eq(again.published(), second.published()));

    let lenient = SynonymSettings {
        lenient: true,
        ..settings_for(&second_rules)
    };
    let relaxed = specialize(&service, "index-a", "synonyms", &lenient);
    assert!(!Arc::ptr_eq(relaxed.published(), second.published()));
}

#[test]
fn test_timer_stops_once_every_filter_is_dropped() {
    let dir = Builder::new().prefix("test_detached").tempdir().unwrap();
    let path = rules_file(&dir, "synonyms.txt", "big, large\n");
    let service = service();

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    assert_eq!(service.state("index-a"), MonitorState::Monitoring);

    drop(specialized);
    assert!(wait_for(Duration::from_secs(5), || {
        service.monitored_pipelines() == 0
    }));
    assert_eq!(service.state("index-a"), MonitorState::Unmonitored);

    let specialized = specialize(&service, "index-a", "synonyms", &settings_for(&path));
    assert_eq!(service.state("index-a"), MonitorState::Monitoring);
    assert_eq!(specialized.current_map().synonyms_of("big"), vec!["large"]);
}
