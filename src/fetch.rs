//! Data fetcher: reads every dimension table needed to enumerate the site.
//!
//! Two sources are provided: the PostgREST endpoint in front of the content
//! database, and a JSON dataset file with the same shape as [`SiteData`].
//! [`fetch_with_retry`] wraps either one in the shared retry policy. A partial
//! dataset is never returned; any table failing fails the whole attempt.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::model::{Dimension, SiteData};
use crate::retry::RetryPolicy;

/// Characters of an error response body kept in [`FetchError::Status`]
const ERROR_BODY_CHARS: usize = 300;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Environment variable {0} is not set; it is required to reach the content store")]
    MissingCredential(String),

    #[error("Invalid content store URL '{0}'")]
    InvalidEndpoint(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request for table '{table}' failed: {source}")]
    Transport {
        table: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Table '{table}' returned HTTP {status}: {body}")]
    Status {
        table: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to decode rows from table '{table}': {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read dataset {path}: {source}")]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset {path}: {source}")]
    DatasetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Query errors are transient; configuration and dataset errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. } | FetchError::Status { .. } | FetchError::Decode { .. }
        )
    }
}

/// Anything that can produce the full [`SiteData`] bundle.
pub trait SiteDataSource {
    /// Human readable description for logs
    fn describe(&self) -> String;

    fn fetch(&self) -> impl Future<Output = Result<SiteData, FetchError>> + Send;
}

/// Column selection and filter for one table
#[derive(Debug, Clone, Copy)]
struct TableQuery {
    dimension: Dimension,
    select: &'static str,
    filter: Option<(&'static str, &'static str)>,
}

impl TableQuery {
    const fn plain(dimension: Dimension) -> Self {
        Self {
            dimension,
            select: "slug",
            filter: None,
        }
    }

    fn for_dimension(dimension: Dimension) -> Self {
        match dimension {
            Dimension::Companies => Self {
                dimension,
                select: "slug,updated_at",
                filter: Some(("indexable", "eq.true")),
            },
            Dimension::ContentPages => Self {
                dimension,
                select: "slug,category,updated_at,framework:pseo_frameworks(slug)",
                filter: None,
            },
            Dimension::Tools => Self {
                dimension,
                select: "slug",
                filter: Some(("is_active", "eq.true")),
            },
            other => Self::plain(other),
        }
    }
}

/// Reads tables from a PostgREST (Supabase) endpoint, page by page.
#[derive(Debug, Clone)]
pub struct PostgrestSource {
    client: reqwest::Client,
    rest_base: String,
    key: String,
    page_size: usize,
}

impl PostgrestSource {
    /// `endpoint` is the project URL (e.g. `https://abc.supabase.co`).
    pub fn new(endpoint: &str, key: &str, page_size: usize, timeout: Duration) -> Result<Self, FetchError> {
        let parsed = url::Url::parse(endpoint.trim())
            .map_err(|_| FetchError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            rest_base: format!("{}/rest/v1", endpoint.trim().trim_end_matches('/')),
            key: key.to_string(),
            page_size: page_size.max(1),
        })
    }

    /// Build from the environment variables named in the store config.
    pub fn from_env(config: &StoreConfig) -> Result<Self, FetchError> {
        let endpoint = std::env::var(&config.url_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| FetchError::MissingCredential(config.url_env.clone()))?;
        let key = std::env::var(&config.key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| FetchError::MissingCredential(config.key_env.clone()))?;

        Self::new(
            &endpoint,
            &key,
            config.page_size,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
        offset: usize,
    ) -> Result<Vec<T>, FetchError> {
        let table = query.dimension.table();
        let url = format!("{}/{}", self.rest_base, table);

        let mut params: Vec<(&str, String)> = vec![
            ("select", query.select.to_string()),
            ("order", "slug.asc".to_string()),
            ("limit", self.page_size.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some((column, expr)) = query.filter {
            params.push((column, expr.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport { table, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport { table, source })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                table,
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|source| FetchError::Decode { table, source })
    }

    /// Read every row of a table, following pages until an empty one.
    ///
    /// A page shorter than `page_size` is not treated as the end: the server
    /// may cap rows per response below the requested limit.
    async fn fetch_table<T: DeserializeOwned>(&self, dimension: Dimension) -> Result<Vec<T>, FetchError> {
        let query = TableQuery::for_dimension(dimension);
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let page: Vec<T> = self.fetch_page(&query, offset).await?;
            let fetched = page.len();
            debug!("{}: fetched {} rows at offset {}", dimension.table(), fetched, offset);

            if fetched == 0 {
                break;
            }
            rows.extend(page);
            offset += fetched;
        }

        Ok(rows)
    }
}

impl SiteDataSource for PostgrestSource {
    fn describe(&self) -> String {
        format!("content store at {}", self.rest_base)
    }

    async fn fetch(&self) -> Result<SiteData, FetchError> {
        let (companies, migrations, pseo_pages, frameworks, decisions, industries, roles, locations, tools) =
            tokio::try_join!(
                self.fetch_table(Dimension::Companies),
                self.fetch_table(Dimension::Migrations),
                self.fetch_table(Dimension::ContentPages),
                self.fetch_table(Dimension::Frameworks),
                self.fetch_table(Dimension::Decisions),
                self.fetch_table(Dimension::Industries),
                self.fetch_table(Dimension::Roles),
                self.fetch_table(Dimension::Locations),
                self.fetch_table(Dimension::Tools),
            )?;

        Ok(SiteData {
            companies,
            migrations,
            pseo_pages,
            frameworks,
            decisions,
            industries,
            roles,
            locations,
            tools,
        })
    }
}

/// Reads the bundle from a JSON file shaped like [`SiteData`].
#[derive(Debug, Clone)]
pub struct JsonDatasetSource {
    path: PathBuf,
}

impl JsonDatasetSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SiteDataSource for JsonDatasetSource {
    fn describe(&self) -> String {
        format!("dataset file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<SiteData, FetchError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::DatasetIo {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| FetchError::DatasetParse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Fetch the full bundle, retrying transient failures under `policy`.
pub async fn fetch_with_retry<S: SiteDataSource>(source: &S, policy: &RetryPolicy) -> Result<SiteData, FetchError> {
    info!("Fetching site data from {}", source.describe());

    let outcome = policy
        .run(
            |attempt| {
                if attempt > 1 {
                    warn!("Retrying site data fetch (attempt {}/{})", attempt, policy.max_attempts);
                }
                source.fetch()
            },
            FetchError::is_retryable,
        )
        .await;

    match &outcome.result {
        Ok(data) => {
            let counts: Vec<String> = Dimension::ALL
                .iter()
                .map(|d| format!("{}={}", d.table(), data.count(*d)))
                .collect();
            info!("Fetched site data in {} attempt(s): {}", outcome.attempts, counts.join(", "));
        }
        Err(e) => warn!("Site data fetch failed after {} attempt(s): {}", outcome.attempts, e),
    }

    outcome.result
}
