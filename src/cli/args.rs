//! Command line argument parsing for the dynamic-synonym CLI using clap.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::SynonymSettings;
use crate::error::Result;

/// dynamic-synonym - Check and apply hot-reloadable synonym rules
#[derive(Parser, Debug, Clone)]
#[command(name = "dynamic-synonym")]
#[command(about = "Check and apply hot-reloadable synonym rules")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct DynamicSynonymArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl DynamicSynonymArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the rules once and report what they compile to
    Check(CheckArgs),

    /// Run stdin lines through a whitespace + lowercase + synonym chain,
    /// reloading rules in the background
    Analyze(AnalyzeArgs),
}

/// Where the rules come from and how to compile them.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Filter settings as a JSON file; flags below override it
    #[arg(long, value_name = "SETTINGS_FILE")]
    pub settings: Option<PathBuf>,

    /// Local rule file or http(s) URL
    #[arg(long, value_name = "PATH_OR_URL")]
    pub synonyms_path: Option<String>,

    /// Database URL (sqlite://, postgres://, mysql://)
    #[arg(long)]
    pub db_url: Option<String>,

    /// Database user
    #[arg(long)]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DYNAMIC_SYNONYM_DB_PASS", hide_env_values = true)]
    pub db_pass: Option<String>,

    /// Rule table
    #[arg(long)]
    pub db_table: Option<String>,

    /// Row type filter (`all` for every row)
    #[arg(long)]
    pub dic_type: Option<String>,

    /// Row layout: inline or multi_line
    #[arg(long)]
    pub dic_style: Option<String>,

    /// Rule syntax: solr or wordnet
    #[arg(long)]
    pub rules_format: Option<String>,

    /// Poll period in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Map equivalence groups to their first term only
    #[arg(long)]
    pub no_expand: bool,

    /// Skip malformed rules instead of failing
    #[arg(long)]
    pub lenient: bool,
}

impl SourceArgs {
    /// Merge the settings file, if any, with the flags.
    pub fn to_settings(&self) -> Result<SynonymSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings file {}", path.display()))?;
                let mut settings = SynonymSettings::from_json(&json)?;
                if settings.config_dir.is_none() {
                    settings.config_dir = path.parent().map(PathBuf::from);
                }
                settings
            }
            None => SynonymSettings::default(),
        };

        let overrides = [
            (&mut settings.synonyms_path, &self.synonyms_path),
            (&mut settings.db_url, &self.db_url),
            (&mut settings.db_user, &self.db_user),
            (&mut settings.db_pass, &self.db_pass),
            (&mut settings.db_table, &self.db_table),
        ];
        for (target, value) in overrides {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        if let Some(dic_type) = &self.dic_type {
            settings.dic_type.clone_from(dic_type);
        }
        if let Some(dic_style) = &self.dic_style {
            settings.dic_style.clone_from(dic_style);
        }
        if let Some(format) = &self.rules_format {
            settings.format.clone_from(format);
        }
        if let Some(interval) = self.interval {
            settings.interval = interval;
        }
        if self.no_expand {
            settings.expand = false;
        }
        if self.lenient {
            settings.lenient = true;
        }

        Ok(settings)
    }
}

/// Arguments for checking rules
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Phrases to look up in the compiled map
    #[arg(long = "lookup", value_name = "PHRASE")]
    pub lookups: Vec<String>,
}

/// Arguments for analyzing text
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Pipeline identifier the reload timer is registered under
    #[arg(long, default_value = "cli")]
    pub pipeline: String,

    /// Filter name
    #[arg(long, default_value = "synonyms")]
    pub filter_name: String,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
