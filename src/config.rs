//! Run configuration and the constant field values stamped on every product.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{Result, ScraperError};

pub const BASE_URL: &str = "https://visterma.ru";
pub const CATALOG_URL: &str = "https://visterma.ru/catalog/prochee-Weishaupt/?SHOWALL_1=1";
pub const DATASET_FILE: &str = "visterma_products.csv";
pub const IMAGE_DIR: &str = "Фото категория N";
pub const MAX_WORKERS: usize = 10;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Values every harvested product carries regardless of its page content.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDefaults {
    pub id: u32,
    pub kind: String,
    pub published: u8,
    pub visibility: String,
    pub in_stock: u8,
    pub base_price: u32,
    pub categories: String,
    /// Used when a product page has no `h1`.
    pub title_placeholder: String,
    /// Used when the brand block cannot be read.
    pub manufacturer_placeholder: String,
}

impl Default for ProductDefaults {
    fn default() -> Self {
        Self {
            id: 5000,
            kind: "simple".to_string(),
            published: 1,
            visibility: "visible".to_string(),
            in_stock: 1,
            base_price: 0,
            categories: String::new(),
            title_placeholder: "Нет названия".to_string(),
            manufacturer_placeholder: "Нет информации".to_string(),
        }
    }
}

/// HTTP identity used for every request of a run.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Origin that relative links and canonical image paths are resolved against.
    pub base_url: Url,
    pub catalog_url: Url,
    pub dataset_path: PathBuf,
    pub image_dir: PathBuf,
    /// Upper bound on concurrently processed product pages.
    pub workers: usize,
    pub json_dump: Option<PathBuf>,
    pub http: HttpSettings,
    pub defaults: ProductDefaults,
}

impl Config {
    pub fn new(base_url: &str, catalog_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_url(base_url)?,
            catalog_url: parse_url(catalog_url)?,
            dataset_path: PathBuf::from(DATASET_FILE),
            image_dir: PathBuf::from(IMAGE_DIR),
            workers: MAX_WORKERS,
            json_dump: None,
            http: HttpSettings::default(),
            defaults: ProductDefaults::default(),
        })
    }

    /// Worker bound clamped to at least one task.
    pub fn worker_bound(&self) -> usize {
        self.workers.max(1)
    }
}

pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", raw, e)))
}
