//! Filter settings.
//!
//! Settings are read from the JSON object a host attaches to a synonym
//! filter definition:
//!
//! ```
//! use dynamic_synonym::config::SynonymSettings;
//!
//! let settings = SynonymSettings::from_json(r#"{
//!     "synonyms_path": "analysis/synonyms.txt",
//!     "interval": 30,
//!     "lenient": true
//! }"#).unwrap();
//!
//! assert_eq!(settings.interval, 30);
//! assert!(settings.expand);
//! assert!(settings.validate().is_ok());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynonymError};
use crate::source::database::validate_table_name;
use crate::source::{RowShape, RuleSourceDescriptor, TableLocation};
use crate::synonym::parser::RuleDialect;

/// Default poll period, in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Settings of one dynamic synonym filter.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynonymSettings {
    /// Local path or `http(s)://` URL of the rule file.
    pub synonyms_path: Option<String>,

    /// Connection URL of a relational rule table.
    pub db_url: Option<String>,
    pub db_user: Option<String>,
    pub db_pass: Option<String>,
    pub db_table: Option<String>,

    /// Row filter on the `type` column; `all` selects every row.
    pub dic_type: String,

    /// `inline` or `multi_line`.
    pub dic_style: String,

    /// `solr` (also the empty string) or `wordnet`.
    pub format: String,

    /// Poll period in seconds.
    pub interval: u64,

    /// Expand equivalence groups to every member.
    pub expand: bool,

    /// Skip malformed rules instead of failing.
    pub lenient: bool,

    /// Deprecated; accepted and ignored.
    pub ignore_case: Option<bool>,

    /// Directory relative `synonyms_path` values resolve against.
    pub config_dir: Option<PathBuf>,
}

impl Default for SynonymSettings {
    fn default() -> Self {
        SynonymSettings {
            synonyms_path: None,
            db_url: None,
            db_user: None,
            db_pass: None,
            db_table: None,
            dic_type: "all".to_string(),
            dic_style: "inline".to_string(),
            format: String::new(),
            interval: DEFAULT_INTERVAL_SECS,
            expand: true,
            lenient: false,
            ignore_case: None,
            config_dir: None,
        }
    }
}

impl SynonymSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn dialect(&self) -> RuleDialect {
        RuleDialect::from_format(&self.format)
    }

    /// Log a warning for every deprecated setting present.
    pub fn warn_deprecated(&self) {
        if self.ignore_case.is_some() {
            warn!(
                "the `ignore_case` option on the dynamic synonym filter is deprecated; \
                 instead insert a lowercase filter in the filter chain before the synonym filter"
            );
        }
    }

    /// Check the settings and describe the rule source they select.
    ///
    /// `synonyms_path` wins when both it and `db_url` are set.
    pub fn validate(&self) -> Result<RuleSourceDescriptor> {
        if self.interval == 0 {
            return Err(SynonymError::config("`interval` must be at least one second"));
        }
        let dialect = self.dialect();

        if let Some(path) = non_empty(&self.synonyms_path) {
            if path.starts_with("http://") || path.starts_with("https://") {
                return Ok(RuleSourceDescriptor::remote_document(path, dialect));
            }
            return Ok(RuleSourceDescriptor::local_file(
                self.resolve_path(path),
                dialect,
            ));
        }

        if let Some(url) = non_empty(&self.db_url) {
            let table = non_empty(&self.db_table).ok_or_else(|| {
                SynonymError::config("`db_table` is required when `db_url` is set")
            })?;
            validate_table_name(table)?;

            let dic_type = match self.dic_type.trim() {
                "" => "all".to_string(),
                other => other.to_string(),
            };
            let location = TableLocation {
                url: url.to_string(),
                user: non_empty(&self.db_user).map(str::to_string),
                password: non_empty(&self.db_pass).map(str::to_string),
                table: table.to_string(),
                dic_type,
                style: self.dic_style.parse::<RowShape>()?,
            };
            return Ok(RuleSourceDescriptor::relational_table(location, dialect));
        }

        Err(SynonymError::config(
            "dynamic synonym requires either `synonyms_path` or `db_url` to be configured",
        ))
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        match &self.config_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }
}

impl fmt::Debug for SynonymSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynonymSettings")
            .field("synonyms_path", &self.synonyms_path)
            .field("db_url", &self.db_url)
            .field("db_user", &self.db_user)
            .field("db_pass", &self.db_pass.as_ref().map(|_| "***"))
            .field("db_table", &self.db_table)
            .field("dic_type", &self.dic_type)
            .field("dic_style", &self.dic_style)
            .field("format", &self.format)
            .field("interval", &self.interval)
            .field("expand", &self.expand)
            .field("lenient", &self.lenient)
            .field("ignore_case", &self.ignore_case)
            .field("config_dir", &self.config_dir)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
