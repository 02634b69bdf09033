//! Content fetching: the HTTP client used by every stage.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use url::Url;

use crate::config::HttpSettings;
use crate::error::{Result, ScraperError};

/// Source of documents and binary assets.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a document and returns its decoded text.
    async fn fetch_page(&self, url: &Url) -> Result<String>;

    /// Starts a binary download; the body is pulled chunk by chunk.
    async fn open_binary(&self, url: &Url) -> Result<Box<dyn BinaryBody>>;
}

/// A binary response whose body has not been read yet.
#[async_trait]
pub trait BinaryBody: Send {
    fn content_type(&self) -> Option<&str>;

    /// Next chunk of the body, `None` once it is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// `reqwest`-backed fetcher sharing one connection pool for the whole run.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&settings.accept_language)
                .map_err(|e| ScraperError::InvalidHeader(format!("{}: {}", settings.accept_language, e)))?,
        );

        let mut client_builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers);

        if let Some(proxy_url) = &settings.proxy {
            log::debug!("Using proxy: {}", proxy_url);
            client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: client_builder.build()?,
        })
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        log::debug!("Fetching: {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn open_binary(&self, url: &Url) -> Result<Box<dyn BinaryBody>> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(Box::new(HttpBody {
            response,
            content_type,
        }))
    }
}

struct HttpBody {
    response: reqwest::Response,
    content_type: Option<String>,
}

#[async_trait]
impl BinaryBody for HttpBody {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.response.chunk().await?)
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryFetcher;
