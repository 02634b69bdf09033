//! Canned site served from memory for the end-to-end tests.

use async_trait::async_trait;
use bytes::Bytes;
use catalog_harvester::{BinaryBody, Fetcher, Result, ScraperError};
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    assets: HashMap<String, (Option<String>, Vec<u8>)>,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_asset(mut self, url: &str, content_type: Option<&str>, body: &[u8]) -> Self {
        self.assets
            .insert(url.to_string(), (content_type.map(str::to_string), body.to_vec()));
        self
    }
}

fn not_found(url: &Url) -> ScraperError {
    ScraperError::HttpStatus {
        url: url.to_string(),
        status: 404,
    }
}

#[async_trait]
impl Fetcher for StaticSite {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        tokio::task::yield_now().await;
        self.pages.get(url.as_str()).cloned().ok_or_else(|| not_found(url))
    }

    async fn open_binary(&self, url: &Url) -> Result<Box<dyn BinaryBody>> {
        tokio::task::yield_now().await;
        let (content_type, body) = self
            .assets
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| not_found(url))?;
        Ok(Box::new(WholeBody {
            content_type,
            body: Some(Bytes::from(body)),
        }))
    }
}

/// Hands the whole asset over as a single chunk.
struct WholeBody {
    content_type: Option<String>,
    body: Option<Bytes>,
}

#[async_trait]
impl BinaryBody for WholeBody {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.body.take())
    }
}
