//! Where rules come from.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynonymError};
use crate::synonym::parser::RuleDialect;

/// Layout of rule rows in a relational table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowShape {
    /// One complete rule per row, in a `words` column.
    #[default]
    Inline,
    /// `(main_word, keyword)` rows grouped by `main_word` into one rule.
    MultiLine,
}

impl FromStr for RowShape {
    type Err = SynonymError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "inline" => Ok(RowShape::Inline),
            "multi_line" => Ok(RowShape::MultiLine),
            other => Err(SynonymError::config(format!(
                "unknown dic_style '{other}', expected 'inline' or 'multi_line'"
            ))),
        }
    }
}

impl fmt::Display for RowShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowShape::Inline => write!(f, "inline"),
            RowShape::MultiLine => write!(f, "multi_line"),
        }
    }
}

/// Connection and row-selection settings for a relational source.
#[derive(Clone, PartialEq, Eq)]
pub struct TableLocation {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub table: String,
    /// Row filter on the `type` column; `all` disables it.
    pub dic_type: String,
    pub style: RowShape,
}

impl TableLocation {
    /// Whether rows are filtered by `type`.
    pub fn filters_type(&self) -> bool {
        !self.dic_type.is_empty() && self.dic_type != "all"
    }
}

impl fmt::Debug for TableLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLocation")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .field("dic_type", &self.dic_type)
            .field("style", &self.style)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocation {
    LocalFile { path: PathBuf },
    RemoteDocument { url: String },
    RelationalTable(TableLocation),
}

/// Everything needed to open a rule source. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSourceDescriptor {
    pub location: SourceLocation,
    pub dialect: RuleDialect,
}

impl RuleSourceDescriptor {
    pub fn local_file<P: Into<PathBuf>>(path: P, dialect: RuleDialect) -> Self {
        RuleSourceDescriptor {
            location: SourceLocation::LocalFile { path: path.into() },
            dialect,
        }
    }

    pub fn remote_document<S: Into<String>>(url: S, dialect: RuleDialect) -> Self {
        RuleSourceDescriptor {
            location: SourceLocation::RemoteDocument { url: url.into() },
            dialect,
        }
    }

    pub fn relational_table(table: TableLocation, dialect: RuleDialect) -> Self {
        RuleSourceDescriptor {
            location: SourceLocation::RelationalTable(table),
            dialect,
        }
    }
}
