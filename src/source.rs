//! Corpus Sources
//!
//! Startup-only fetchers for the raw verse text. A location starting with
//! `http://` or `https://` is downloaded; anything else is read from disk.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::corpus::{Language, LanguageSource};

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Something that yields a corpus text blob
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Human-readable location for logs
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<String>;
}

/// Plain HTTP GET of a static file
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CorpusSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String> {
        debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}", self.url, status);
        }

        response
            .text()
            .await
            .with_context(|| format!("reading body of {}", self.url))
    }
}

/// Local text file
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CorpusSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))
    }
}

/// Build an HTTP client with the fetch timeout applied
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .context("building HTTP client")
}

/// Pick a source for a location string
pub fn source_for(location: &str, client: &reqwest::Client) -> Box<dyn CorpusSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpSource::new(client.clone(), location))
    } else {
        Box::new(FileSource::new(location))
    }
}

/// Where one language's texts come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageLocation {
    pub language: Language,
    pub full: String,
    pub short: Option<String>,
}

/// Fetch every configured language. Any failure aborts.
pub async fn fetch_all(locations: &[LanguageLocation]) -> Result<Vec<LanguageSource>> {
    let client = http_client()?;
    let mut sources = Vec::with_capacity(locations.len());

    for loc in locations {
        let full_source = source_for(&loc.full, &client);
        let full = full_source
            .fetch()
            .await
            .with_context(|| format!("fetching {} text", loc.language))?;
        info!("Fetched {} text: {} bytes from {}", loc.language, full.len(), full_source.describe());

        let mut source = LanguageSource::new(loc.language, full);
        if let Some(short_location) = &loc.short {
            let short_source = source_for(short_location, &client);
            let short = short_source
                .fetch()
                .await
                .with_context(|| format!("fetching {} short text", loc.language))?;
            info!(
                "Fetched {} short text: {} bytes from {}",
                loc.language,
                short.len(),
                short_source.describe()
            );
            source = source.with_short(short);
        }
        sources.push(source);
    }

    Ok(sources)
}
