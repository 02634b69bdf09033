//! Concurrent image harvesting.
//!
//! Every product is handled by an independent task (page fetch, image lookup,
//! streamed download). At most `workers` tasks run at once. Successful tasks
//! record `title -> filename` in a shared [`ImageLedger`]; the ledger can only
//! be read back by consuming it, which happens after the pool has drained.

use futures::stream::{self, StreamExt};
use scraper::Html;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use url::Url;

use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::fetch::Fetcher;
use crate::image::{image_extension, resolve_image_url};
use crate::links::ProductRef;
use crate::product::extract_title;
use crate::slug::slugify;

/// A downloaded image and the product title it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub product_title: String,
    pub stored_filename: String,
}

/// Title -> filename map written concurrently by download tasks.
#[derive(Debug, Default)]
pub struct ImageLedger {
    entries: Mutex<HashMap<String, String>>,
}

impl ImageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry for the record's title.
    pub async fn record(&self, record: ImageRecord) {
        let mut entries = self.entries.lock().await;
        if let Some(previous) = entries.insert(record.product_title.clone(), record.stored_filename) {
            log::warn!(
                "Title '{}' downloaded twice, replacing {}",
                record.product_title,
                previous
            );
        }
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.entries.into_inner()
    }
}

/// One lock per target file, so tasks whose file names collide write one
/// after another instead of interleaving chunks.
#[derive(Debug, Default)]
struct FileLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileLocks {
    async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub attempted: usize,
    pub downloaded: usize,
    /// Product title -> stored filename.
    pub images: HashMap<String, String>,
}

/// Downloads the main image of every product into `config.image_dir`.
/// Individual failures are logged and skipped.
pub async fn download_images(
    fetcher: &dyn Fetcher,
    products: &[ProductRef],
    config: &Config,
) -> Result<DownloadReport> {
    tokio::fs::create_dir_all(&config.image_dir).await?;
    log::info!(
        "🖼️  Downloading images for {} products into {} ({} workers)",
        products.len(),
        config.image_dir.display(),
        config.worker_bound()
    );

    let ledger = ImageLedger::new();
    let locks = FileLocks::default();
    let outcomes: Vec<bool> = stream::iter(products)
        .map(|product| {
            let ledger = &ledger;
            let locks = &locks;
            async move {
                match store_product_image(fetcher, product, config, locks).await {
                    Ok(record) => {
                        log::info!("Downloaded: {} -> {}", record.product_title, record.stored_filename);
                        ledger.record(record).await;
                        true
                    }
                    Err(ScraperError::NoImage(title)) => {
                        log::warn!("No image found for: {}", title);
                        false
                    }
                    Err(e) => {
                        log::error!("Failed to download image for {}: {}", product.url, e);
                        false
                    }
                }
            }
        })
        .buffer_unordered(config.worker_bound())
        .collect()
        .await;

    let report = DownloadReport {
        attempted: outcomes.len(),
        downloaded: outcomes.iter().filter(|ok| **ok).count(),
        images: ledger.into_inner(),
    };
    log::info!("✅ Downloaded {}/{} images", report.downloaded, report.attempted);
    Ok(report)
}

async fn store_product_image(
    fetcher: &dyn Fetcher,
    product: &ProductRef,
    config: &Config,
    locks: &FileLocks,
) -> Result<ImageRecord> {
    let html = fetcher.fetch_page(&product.url).await?;
    let (title, image_url) = locate_image(&html, &product.url, &config.base_url)?;
    let image_url = image_url.ok_or_else(|| ScraperError::NoImage(title.clone()))?;

    let stem = file_stem(&title, &product.url);
    let stored_filename = save_image(fetcher, &image_url, &stem, &config.image_dir, locks).await?;
    Ok(ImageRecord {
        product_title: title,
        stored_filename,
    })
}

/// Product title (or the URL slug when the page has none) and image URL.
fn locate_image(html: &str, page_url: &Url, base: &Url) -> Result<(String, Option<Url>)> {
    let document = Html::parse_document(html);
    let title = match extract_title(&document)? {
        Some(title) => title,
        None => url_slug(page_url),
    };
    let image_url = resolve_image_url(&document, base)?;
    Ok((title, image_url))
}

/// Last non-empty path segment of a product URL.
fn url_slug(url: &Url) -> String {
    url.path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or("product")
        .to_string()
}

fn file_stem(title: &str, page_url: &Url) -> String {
    let stem = slugify(title);
    if stem.is_empty() {
        slugify(&url_slug(page_url))
    } else {
        stem
    }
}

/// Streams an image to `dir/{stem}{ext}` and returns the file name.
async fn save_image(
    fetcher: &dyn Fetcher,
    url: &Url,
    stem: &str,
    dir: &Path,
    locks: &FileLocks,
) -> Result<String> {
    let mut body = fetcher.open_binary(url).await?;
    let filename = format!("{}{}", stem, image_extension(url, body.content_type()));
    let path = dir.join(&filename);
    let _guard = locks.lock(&path).await;

    let written = async {
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = body.next_chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok::<(), ScraperError>(())
    }
    .await;

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&path).await {
            log::debug!("Could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(e);
    }
    Ok(filename)
}
