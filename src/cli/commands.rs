//! Command implementations for the dynamic-synonym CLI.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use serde_json::json;

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::analysis::token::Token;
use crate::analysis::token_filter::{Filter, LowercaseFilter};
use crate::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
use crate::cli::args::*;
use crate::error::{Result, SynonymError};
use crate::factory::SynonymFilterFactory;
use crate::reload::{ReloadService, ReloadServiceConfig};
use crate::source::RuleSource;
use crate::synonym::builder::MapBuilder;

/// Execute a CLI command.
pub fn execute_command(args: DynamicSynonymArgs) -> Result<()> {
    match &args.command {
        Command::Check(check_args) => check_rules(check_args, &args),
        Command::Analyze(analyze_args) => analyze_text(analyze_args, &args),
    }
}

fn default_chain() -> (Arc<dyn Tokenizer>, Vec<Arc<dyn Filter>>) {
    (
        Arc::new(WhitespaceTokenizer::new()),
        vec![Arc::new(LowercaseFilter::new())],
    )
}

/// Load the rules once, without scheduling reloads.
fn check_rules(args: &CheckArgs, cli_args: &DynamicSynonymArgs) -> Result<()> {
    let settings = args.source.to_settings()?;
    let descriptor = settings.validate()?;
    settings.warn_deprecated();

    let (tokenizer, filters) = default_chain();
    let mut analyzer = PipelineAnalyzer::new(tokenizer);
    for filter in filters {
        analyzer = analyzer.add_filter(filter);
    }
    let builder = MapBuilder::new(Arc::new(analyzer))
        .with_expand(settings.expand)
        .with_lenient(settings.lenient);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (source_name, map) = runtime.block_on(async {
        let source = RuleSource::open(&descriptor).await?;
        let rules = source.read_rules().await?;
        let map = builder.build(&rules)?;
        source.close().await;
        Ok::<_, SynonymError>((source.describe(), map))
    })?;

    match cli_args.output_format {
        OutputFormat::Human => {
            if cli_args.verbosity() > 0 {
                println!("Source: {source_name}");
                println!("Dialect: {}", descriptor.dialect);
                println!("Entries: {}", map.len());
                println!("Longest input: {} tokens", map.max_input_length());
            }
            for phrase in &args.lookups {
                let synonyms = map.synonyms_of(&phrase.to_lowercase());
                if synonyms.is_empty() {
                    println!("{phrase}: (no synonyms)");
                } else {
                    println!("{phrase}: {}", synonyms.join(", "));
                }
            }
        }
        OutputFormat::Json => {
            let lookups: serde_json::Map<String, serde_json::Value> = args
                .lookups
                .iter()
                .map(|phrase| (phrase.clone(), json!(map.synonyms_of(&phrase.to_lowercase()))))
                .collect();
            let report = json!({
                "source": source_name,
                "dialect": descriptor.dialect,
                "entries": map.len(),
                "max_input_length": map.max_input_length(),
                "lookups": lookups,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Analyze stdin line by line while the rules reload in the background.
fn analyze_text(args: &AnalyzeArgs, cli_args: &DynamicSynonymArgs) -> Result<()> {
    let settings = args.source.to_settings()?;
    let service = Arc::new(ReloadService::new(ReloadServiceConfig::default())?);
    let factory = SynonymFilterFactory::new(
        args.filter_name.clone(),
        args.pipeline.clone(),
        &settings,
        Arc::clone(&service),
    )?;

    let (tokenizer, filters) = default_chain();
    let specialized = factory.chain_aware(Arc::clone(&tokenizer), &filters)?;

    let mut analyzer = PipelineAnalyzer::new(tokenizer).with_name(args.filter_name.clone());
    for filter in filters {
        analyzer = analyzer.add_filter(filter);
    }
    let analyzer = analyzer.add_filter(specialized.filter());

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        let tokens: Vec<Token> = analyzer.analyze(&line)?.collect();
        write_tokens(&mut stdout, &tokens, cli_args)?;
    }

    service.close_pipeline(&args.pipeline);
    Ok(())
}

fn write_tokens<W: Write>(out: &mut W, tokens: &[Token], cli_args: &DynamicSynonymArgs) -> Result<()> {
    match cli_args.output_format {
        OutputFormat::Human => {
            let rendered: Vec<String> = tokens
                .iter()
                .map(|token| {
                    if cli_args.verbosity() > 1 {
                        format!(
                            "{}@{}+{}/{}",
                            token.text,
                            token.position,
                            token.position_increment,
                            token.position_length
                        )
                    } else {
                        token.text.clone()
                    }
                })
                .collect();
            writeln!(out, "{}", rendered.join(" "))?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string(tokens)?)?;
        }
    }
    out.flush()?;
    Ok(())
}
