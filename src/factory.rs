//! Host-facing factory for dynamic synonym filters.
//!
//! A host builds one [`SynonymFilterFactory`] per filter definition, then
//! specializes it for the analysis chain it sits in:
//!
//! ```text
//! SynonymFilterFactory::new(settings)        validate settings
//!         │
//!         ▼ chain_aware(tokenizer, filters)  build initial map, start polling
//! ChainAwareSynonymFilterFactory
//!         │
//!         ▼ create(stream) / filter()        one consumer per stream
//! ```
//!
//! Rule terms are analyzed with the same tokenizer and preceding filters as
//! the text the filter will see.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::analysis::analyzer::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::{
    DynamicSynonymFilter, Filter, SynonymTokenStream, TokenFilterFactory,
};
use crate::analysis::tokenizer::Tokenizer;
use crate::config::SynonymSettings;
use crate::error::Result;
use crate::reload::{Monitor, MonitorSpec, ReloadService};
use crate::source::{RuleSource, RuleSourceDescriptor};
use crate::synonym::builder::MapBuilder;
use crate::synonym::map::SynonymMap;
use crate::synonym::registry::PublishedSynonyms;

/// A validated dynamic synonym filter definition.
///
/// It cannot filter anything until [`SynonymFilterFactory::chain_aware`]
/// has tied it to an analysis chain.
pub struct SynonymFilterFactory {
    name: String,
    pipeline_id: String,
    descriptor: RuleSourceDescriptor,
    expand: bool,
    lenient: bool,
    interval: Duration,
    service: Arc<ReloadService>,
}

impl SynonymFilterFactory {
    /// Validate `settings` for the filter `name` of pipeline `pipeline_id`.
    pub fn new<N, P>(
        name: N,
        pipeline_id: P,
        settings: &SynonymSettings,
        service: Arc<ReloadService>,
    ) -> Result<Self>
    where
        N: Into<String>,
        P: Into<String>,
    {
        let descriptor = settings.validate()?;
        settings.warn_deprecated();

        Ok(SynonymFilterFactory {
            name: name.into(),
            pipeline_id: pipeline_id.into(),
            descriptor,
            expand: settings.expand,
            lenient: settings.lenient,
            interval: settings.interval(),
            service,
        })
    }

    /// Override the poll period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn descriptor(&self) -> &RuleSourceDescriptor {
        &self.descriptor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Specialize for a chain, blocking until the initial map is built.
    ///
    /// Must not be called from inside an async context; use
    /// [`SynonymFilterFactory::chain_aware_async`] there.
    pub fn chain_aware(
        &self,
        tokenizer: Arc<dyn Tokenizer>,
        previous_filters: &[Arc<dyn Filter>],
    ) -> Result<ChainAwareSynonymFilterFactory> {
        self.service
            .block_on(self.chain_aware_async(tokenizer, previous_filters))
    }

    /// Specialize for a chain.
    ///
    /// Builds the initial map from the source; any failure here is returned
    /// and nothing is scheduled. On success the source is handed to the
    /// reload service under this factory's pipeline id.
    pub async fn chain_aware_async(
        &self,
        tokenizer: Arc<dyn Tokenizer>,
        previous_filters: &[Arc<dyn Filter>],
    ) -> Result<ChainAwareSynonymFilterFactory> {
        let mut chain = vec![tokenizer.name().to_string()];
        let mut analyzer =
            PipelineAnalyzer::new(tokenizer).with_name(format!("{}_rules", self.name));
        for filter in previous_filters {
            if filter.name() != DynamicSynonymFilter::NAME {
                chain.push(filter.name().to_string());
                analyzer = analyzer.add_filter(Arc::clone(filter));
            }
        }

        let builder = MapBuilder::new(Arc::new(analyzer))
            .with_expand(self.expand)
            .with_lenient(self.lenient);

        let source = RuleSource::open(&self.descriptor).await?;
        let rules = source.read_rules().await?;
        let map = builder.build_blocking(rules).await?;
        info!(
            "loaded {} synonym entries for filter {} from {}",
            map.len(),
            self.name,
            source.describe()
        );

        let published = Arc::new(PublishedSynonyms::new(map));
        let spec = MonitorSpec {
            descriptor: self.descriptor.clone(),
            expand: self.expand,
            lenient: self.lenient,
            chain,
        };
        let monitor = Monitor::new(self.name.clone(), spec, source, builder, &published);
        let published = self
            .service
            .monitor(&self.pipeline_id, self.interval, published, monitor);

        Ok(ChainAwareSynonymFilterFactory {
            name: self.name.clone(),
            pipeline_id: self.pipeline_id.clone(),
            published,
        })
    }
}

impl TokenFilterFactory for SynonymFilterFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, _tokens: TokenStream) -> TokenStream {
        panic!(
            "synonym filter factory {} is not tied to an analysis chain; \
             call chain_aware to specialize this factory for an analysis chain first",
            self.name
        )
    }
}

impl fmt::Debug for SynonymFilterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynonymFilterFactory")
            .field("name", &self.name)
            .field("pipeline_id", &self.pipeline_id)
            .field("descriptor", &self.descriptor)
            .field("expand", &self.expand)
            .field("lenient", &self.lenient)
            .field("interval", &self.interval)
            .finish()
    }
}

/// A synonym filter factory bound to an analysis chain and a live map.
#[derive(Clone, Debug)]
pub struct ChainAwareSynonymFilterFactory {
    name: String,
    pipeline_id: String,
    published: Arc<PublishedSynonyms>,
}

impl ChainAwareSynonymFilterFactory {
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// The map new streams start from.
    pub fn current_map(&self) -> Arc<SynonymMap> {
        self.published.current()
    }

    pub fn published(&self) -> &Arc<PublishedSynonyms> {
        &self.published
    }

    /// A long-lived filter that follows every reload.
    pub fn new_filter(&self) -> DynamicSynonymFilter {
        DynamicSynonymFilter::attached(&self.published)
    }

    /// [`ChainAwareSynonymFilterFactory::new_filter`] for use in a
    /// [`PipelineAnalyzer`].
    pub fn filter(&self) -> Arc<dyn Filter> {
        Arc::new(self.new_filter())
    }
}

impl TokenFilterFactory for ChainAwareSynonymFilterFactory {
    fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `tokens`, unless no rules are configured right now.
    fn create(&self, tokens: TokenStream) -> TokenStream {
        if self.published.current().is_empty() {
            return tokens;
        }
        let (slot, registration) = self.published.attach();
        Box::new(SynonymTokenStream::new(tokens, slot).with_registration(registration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;
    use crate::analysis::token_filter::LowercaseFilter;
    use crate::analysis::tokenizer::WhitespaceTokenizer;
    use crate::reload::ReloadServiceConfig;
    use std::fs;
    use tempfile::TempDir;

    fn service() -> Arc<ReloadService> {
        Arc::new(ReloadService::new(ReloadServiceConfig::default()).unwrap())
    }

    fn settings(path: &std::path::Path) -> SynonymSettings {
        SynonymSettings {
            synonyms_path: Some(path.display().to_string()),
            ..Default::default()
        }
    }

    fn chain() -> (Arc<dyn Tokenizer>, Vec<Arc<dyn Filter>>) {
        (
            Arc::new(WhitespaceTokenizer::new()),
            vec![Arc::new(LowercaseFilter::new())],
        )
    }

    #[test]
    fn test_invalid_settings_fail_construction() {
        let result =
            SynonymFilterFactory::new("synonyms", "index-a", &SynonymSettings::default(), service());
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "call chain_aware")]
    fn test_unspecialized_create_panics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "big, large\n").unwrap();

        let factory =
            SynonymFilterFactory::new("synonyms", "index-a", &settings(&path), service()).unwrap();
        let _ = factory.create(Box::new(vec![Token::new("big", 0)].into_iter()));
    }

    #[test]
    fn test_chain_aware_analyzes_rules_with_chain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "Big, LARGE\n").unwrap();

        let service = service();
        let factory =
            SynonymFilterFactory::new("synonyms", "index-a", &settings(&path), Arc::clone(&service))
                .unwrap();
        let (tokenizer, filters) = chain();
        let specialized = factory.chain_aware(tokenizer, &filters).unwrap();

        assert_eq!(specialized.current_map().synonyms_of("big"), vec!["large"]);

        let tokens: Vec<String> = specialized
            .create(Box::new(vec![Token::new("big", 0)].into_iter()))
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["big", "large"]);
        assert_eq!(specialized.published().consumers().len(), 0);
    }

    #[test]
    fn test_initial_build_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "a => b => c\n").unwrap();

        let service = service();
        let factory =
            SynonymFilterFactory::new("synonyms", "index-a", &settings(&path), Arc::clone(&service))
                .unwrap();
        let (tokenizer, filters) = chain();

        assert!(factory.chain_aware(tokenizer, &filters).is_err());
        assert_eq!(service.monitored_pipelines(), 0);
    }

    #[test]
    fn test_empty_rules_leave_stream_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "# no rules yet\n").unwrap();

        let factory =
            SynonymFilterFactory::new("synonyms", "index-a", &settings(&path), service()).unwrap();
        let (tokenizer, filters) = chain();
        let specialized = factory.chain_aware(tokenizer, &filters).unwrap();

        let tokens: Vec<String> = specialized
            .create(Box::new(vec![Token::new("big", 0)].into_iter()))
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["big"]);
        assert!(specialized.published().consumers().is_empty());
    }
}
