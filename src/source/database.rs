//! Rules stored as rows of a relational table.
//!
//! Supports any backend `sqlx::any` has a driver for (SQLite, PostgreSQL,
//! MySQL). Every operation opens its own connection and closes it before
//! returning, whether it succeeded or not.
//!
//! Expected columns:
//!
//! | column | used for |
//! |---|---|
//! | `status` | `0` marks an active row |
//! | `type` | row filter, unless the configured type is `all` |
//! | `update_time` | freshness; any date/time, text timestamp or integer epoch seconds column |
//! | `words` | one complete rule (`inline`) |
//! | `main_word`, `keyword` | grouped into one rule per main word (`multi_line`) |

use std::sync::Once;

use chrono::{DateTime, NaiveDateTime};
use log::debug;
use parking_lot::Mutex;
use regex::Regex;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row};
use url::Url;

use crate::error::{Result, SynonymError};
use crate::source::descriptor::{RowShape, TableLocation};
use crate::synonym::builder::RawRules;
use crate::synonym::parser::RuleDialect;

static INSTALL_DRIVERS: Once = Once::new();

/// Last `max(update_time)` seen for the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UpdateMark {
    Unobserved,
    Seen(Option<NaiveDateTime>),
}

/// A table of rules polled by its newest `update_time`.
#[derive(Debug)]
pub struct TableSource {
    location: TableLocation,
    connect_url: String,
    dialect: RuleDialect,
    mark: Mutex<UpdateMark>,
}

impl TableSource {
    pub async fn open(location: TableLocation, dialect: RuleDialect) -> Result<Self> {
        validate_table_name(&location.table)?;
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let connect_url = connect_url(&location)?;
        Ok(TableSource {
            location,
            connect_url,
            dialect,
            mark: Mutex::new(UpdateMark::Unobserved),
        })
    }

    pub fn location(&self) -> &TableLocation {
        &self.location
    }

    /// The newest `update_time`, if it moved past the recorded one.
    ///
    /// The first poll only records the current value. Later changes are
    /// recorded by [`TableSource::acknowledge`].
    pub async fn poll_change(&self) -> Result<Option<NaiveDateTime>> {
        let current = self.max_update_time().await?;

        let mut mark = self.mark.lock();
        match *mark {
            UpdateMark::Unobserved => {
                *mark = UpdateMark::Seen(current);
                Ok(None)
            }
            UpdateMark::Seen(previous) if current > previous => Ok(current),
            UpdateMark::Seen(_) => Ok(None),
        }
    }

    pub fn acknowledge(&self, update_time: NaiveDateTime) {
        let mut mark = self.mark.lock();
        let newer = match *mark {
            UpdateMark::Unobserved => true,
            UpdateMark::Seen(previous) => Some(update_time) > previous,
        };
        if newer {
            *mark = UpdateMark::Seen(Some(update_time));
        }
    }

    pub async fn read_rules(&self) -> Result<RawRules> {
        let lines = match self.location.style {
            RowShape::Inline => {
                let rows = self.query("words").await?;
                rows.iter()
                    .filter_map(|row| text_column(row, "words").transpose())
                    .collect::<Result<Vec<String>>>()?
            }
            RowShape::MultiLine => {
                let rows = self.query("main_word, keyword").await?;
                let mut pairs = Vec::with_capacity(rows.len());
                for row in &rows {
                    let main_word = text_column(row, "main_word")?.unwrap_or_default();
                    if let Some(keyword) = text_column(row, "keyword")? {
                        pairs.push((main_word, keyword));
                    }
                }
                group_by_main_word(pairs)
            }
        };

        let mut text = String::new();
        for line in lines {
            text.push_str(&line);
            text.push('\n');
        }
        Ok(RawRules::new(text, self.dialect))
    }

    async fn max_update_time(&self) -> Result<Option<NaiveDateTime>> {
        let rows = self.query(newest_update_column(&self.location.url)).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let value: Option<String> = row.try_get("update_time").map_err(|e| {
            SynonymError::source_unavailable(format!("unreadable update_time: {e}"))
        })?;
        value.map(|s| parse_timestamp(&s)).transpose()
    }

    /// Select `columns` from active rows on a fresh connection, closing it
    /// afterwards.
    async fn query(&self, columns: &str) -> Result<Vec<AnyRow>> {
        let sql = self.select(columns);
        debug!("synonym sql: {sql}");

        let mut conn = AnyConnection::connect(&self.connect_url).await.map_err(|e| {
            SynonymError::source_unavailable(format!(
                "failed to connect to synonym table {}: {e}",
                self.location.table
            ))
        })?;

        let mut query = sqlx::query(&sql);
        if self.location.filters_type() {
            query = query.bind(self.location.dic_type.as_str());
        }
        let result = query.fetch_all(&mut conn).await;

        if let Err(e) = conn.close().await {
            debug!("closing synonym database connection failed: {e}");
        }

        result.map_err(|e| {
            SynonymError::source_unavailable(format!(
                "query on synonym table {} failed: {e}",
                self.location.table
            ))
        })
    }

    fn select(&self, columns: &str) -> String {
        let mut sql = format!(
            "select {columns} from {} where status = 0",
            self.location.table
        );
        if self.location.filters_type() {
            sql.push_str(" and type = ");
            sql.push_str(placeholder(&self.location.url));
        }
        sql
    }
}

fn text_column(row: &AnyRow, column: &str) -> Result<Option<String>> {
    let value: Option<String> = row.try_get(column).map_err(|e| {
        SynonymError::source_unavailable(format!("unreadable column {column}: {e}"))
    })?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// One comma-joined line per main word, in order of first appearance.
fn group_by_main_word(pairs: Vec<(String, String)>) -> Vec<String> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for (main_word, keyword) in pairs {
        match groups.iter_mut().find(|(word, _)| *word == main_word) {
            Some((_, keywords)) => keywords.push(keyword),
            None => groups.push((main_word, vec![keyword])),
        }
    }
    groups
        .into_iter()
        .map(|(_, keywords)| keywords.join(","))
        .collect()
}

/// Accepts what a text cast of a date/time or integer column yields on the
/// supported backends.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0)
            .map(|time| time.naive_utc())
            .ok_or_else(|| {
                SynonymError::source_unavailable(format!("update_time {seconds} out of range"))
            });
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(time);
        }
    }
    // Postgres renders timestamptz as `2024-03-01 10:00:00+00`.
    if let Ok(time) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(time.naive_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.naive_utc())
        .map_err(|_| SynonymError::source_unavailable(format!("unrecognized update_time '{value}'")))
}

fn is_postgres(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

fn placeholder(url: &str) -> &'static str {
    if is_postgres(url) { "$1" } else { "?" }
}

/// `sqlx::any` decodes no date/time types, so the newest `update_time` is
/// fetched as text. `char` is a one-character type on Postgres.
fn newest_update_column(url: &str) -> &'static str {
    if is_postgres(url) {
        "cast(max(update_time) as text) as update_time"
    } else {
        "cast(max(update_time) as char) as update_time"
    }
}

pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    let pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .map_err(|e| SynonymError::other(e.to_string()))?;
    if pattern.is_match(table) {
        Ok(())
    } else {
        Err(SynonymError::config(format!(
            "db_table '{table}' is not a plain table name"
        )))
    }
}

/// Fold the configured user and password into the connection URL.
///
/// URLs without a host (such as SQLite files) are used unchanged.
fn connect_url(location: &TableLocation) -> Result<String> {
    if location.user.is_none() && location.password.is_none() {
        return Ok(location.url.clone());
    }

    let mut url = Url::parse(&location.url)
        .map_err(|e| SynonymError::config(format!("invalid db_url: {e}")))?;
    if !url.has_host() {
        return Ok(location.url.clone());
    }

    if let Some(user) = &location.user {
        url.set_username(user)
            .map_err(|_| SynonymError::config("db_user cannot be applied to db_url"))?;
    }
    if let Some(password) = &location.password {
        url.set_password(Some(password))
            .map_err(|_| SynonymError::config("db_pass cannot be applied to db_url"))?;
    }
    Ok(url.to_string())
}
