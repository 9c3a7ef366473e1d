//! Rules served over HTTP(S).

use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use reqwest::header::{ETAG, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};

use crate::error::{Result, SynonymError};
use crate::synonym::builder::RawRules;
use crate::synonym::parser::RuleDialect;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Change markers a server reports for a document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validators {
    last_modified: Option<String>,
    etag: Option<String>,
}

impl Validators {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Validators {
            last_modified: header(LAST_MODIFIED),
            etag: header(ETAG),
        }
    }
}

/// A rule document polled with conditional `HEAD` requests.
#[derive(Debug)]
pub struct RemoteDocumentSource {
    url: String,
    dialect: RuleDialect,
    client: Client,
    validators: Mutex<Validators>,
}

impl RemoteDocumentSource {
    /// Create the client and record the document's current validators.
    ///
    /// An unreachable server does not fail here; the initial read reports it.
    pub async fn open<S: Into<String>>(url: S, dialect: RuleDialect) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SynonymError::other(format!("failed to build HTTP client: {e}")))?;

        let source = RemoteDocumentSource {
            url: url.into(),
            dialect,
            client,
            validators: Mutex::new(Validators::default()),
        };

        match source.client.head(&source.url).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                *source.validators.lock() = Validators::from_headers(response.headers());
            }
            Ok(response) => warn!(
                "HEAD {} returned {} while opening synonym source",
                source.url,
                response.status()
            ),
            Err(e) => warn!("HEAD {} failed while opening synonym source: {e}", source.url),
        }

        Ok(source)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The server's validators, if they differ from the last loaded ones.
    /// Nothing is recorded until [`RemoteDocumentSource::acknowledge`].
    pub async fn poll_change(&self) -> Result<Option<Validators>> {
        let known = self.validators.lock().clone();

        let mut request = self.client.head(&self.url);
        if let Some(last_modified) = &known.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }
        if let Some(etag) = &known.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(|e| {
            SynonymError::source_unavailable(format!("HEAD {} failed: {e}", self.url))
        })?;

        match response.status() {
            StatusCode::OK => {
                let current = Validators::from_headers(response.headers());
                if current != known {
                    debug!("synonym document {} changed: {current:?}", self.url);
                    Ok(Some(current))
                } else {
                    Ok(None)
                }
            }
            StatusCode::NOT_MODIFIED => Ok(None),
            status => {
                warn!("HEAD {} returned unexpected status {status}", self.url);
                Ok(None)
            }
        }
    }

    pub fn acknowledge(&self, validators: Validators) {
        *self.validators.lock() = validators;
    }

    pub async fn read_rules(&self) -> Result<RawRules> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            SynonymError::source_unavailable(format!("GET {} failed: {e}", self.url))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SynonymError::source_unavailable(format!(
                "GET {} returned {status}",
                self.url
            )));
        }

        let text = response.text().await.map_err(|e| {
            SynonymError::source_unavailable(format!("failed to read body of {}: {e}", self.url))
        })?;
        Ok(RawRules::new(text, self.dialect))
    }
}
