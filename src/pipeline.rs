//! Stage orchestration: discovery, product export, image download and
//! reconciliation.

use futures::stream::{self, StreamExt};
use scraper::Html;
use std::path::Path;

use crate::config::Config;
use crate::dataset::{reconcile_file, write_products, ReconcileReport};
use crate::download::{download_images, DownloadReport};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::links::{discover_products, ProductRef};
use crate::product::{extract_manufacturer, parse_product, Product};

#[derive(Debug, Default)]
pub struct RunSummary {
    pub discovered: usize,
    pub products: usize,
    pub images: Option<DownloadReport>,
    pub reconcile: Option<ReconcileReport>,
}

/// Manufacturer blurb from the brand tab of a product page, or the
/// configured placeholder when it cannot be read.
pub async fn fetch_manufacturer(fetcher: &dyn Fetcher, product: &ProductRef, config: &Config) -> String {
    let blurb = match fetcher.fetch_page(&product.url).await {
        Ok(html) => extract_manufacturer(&Html::parse_document(&html)),
        Err(e) => Err(e),
    };
    blurb.unwrap_or_else(|e| {
        log::warn!("Could not read manufacturer info from {}: {}", product.url, e);
        config.defaults.manufacturer_placeholder.clone()
    })
}

/// Fetches and parses every product page, keeping catalog order. Pages that
/// fail are logged and left out.
pub async fn harvest_products(
    fetcher: &dyn Fetcher,
    products: &[ProductRef],
    config: &Config,
) -> Result<Vec<Product>> {
    let Some(first) = products.first() else {
        return Ok(Vec::new());
    };
    let manufacturer = fetch_manufacturer(fetcher, first, config).await;
    let total = products.len();

    let parsed: Vec<Option<Product>> = stream::iter(products.iter().enumerate())
        .map(|(index, product)| {
            let manufacturer = manufacturer.as_str();
            async move {
                log::debug!("Processing product {}/{}: {}", index + 1, total, product.url);
                let parsed = match fetcher.fetch_page(&product.url).await {
                    Ok(html) => parse_product(&html, manufacturer, &config.defaults),
                    Err(e) => Err(e),
                };
                match parsed {
                    Ok(record) => Some(record),
                    Err(e) => {
                        log::error!("Failed to parse {}: {}", product.url, e);
                        None
                    }
                }
            }
        })
        .buffered(config.worker_bound())
        .collect()
        .await;

    let harvested: Vec<Product> = parsed.into_iter().flatten().collect();
    log::info!("Parsed {}/{} products", harvested.len(), total);
    Ok(harvested)
}

fn write_json(path: &Path, products: &[Product]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(products)?)?;
    log::info!("💾 JSON saved to: {}", path.display());
    Ok(())
}

/// Product stage: parses the given products and writes the dataset (and the
/// optional JSON dump).
pub async fn export_products(
    fetcher: &dyn Fetcher,
    products: &[ProductRef],
    config: &Config,
) -> Result<Vec<Product>> {
    let harvested = harvest_products(fetcher, products, config).await?;
    write_products(&config.dataset_path, &harvested)?;
    if let Some(json_path) = &config.json_dump {
        write_json(json_path, &harvested)?;
    }
    Ok(harvested)
}

/// Image stage: downloads every image, then merges the filenames into the
/// existing dataset once all downloads have finished.
pub async fn export_images(
    fetcher: &dyn Fetcher,
    products: &[ProductRef],
    config: &Config,
) -> Result<(DownloadReport, ReconcileReport)> {
    let downloads = download_images(fetcher, products, config).await?;
    let reconcile = reconcile_file(&config.dataset_path, &downloads.images)?;
    if !reconcile.unmatched.is_empty() {
        log::warn!(
            "{} downloaded images had no matching product row",
            reconcile.unmatched.len()
        );
    }
    Ok((downloads, reconcile))
}

pub async fn run_products(fetcher: &dyn Fetcher, config: &Config) -> Result<RunSummary> {
    let refs = discover_products(fetcher, &config.catalog_url, &config.base_url).await?;
    let products = export_products(fetcher, &refs, config).await?;
    Ok(RunSummary {
        discovered: refs.len(),
        products: products.len(),
        ..RunSummary::default()
    })
}

pub async fn run_images(fetcher: &dyn Fetcher, config: &Config) -> Result<RunSummary> {
    let refs = discover_products(fetcher, &config.catalog_url, &config.base_url).await?;
    let (downloads, reconcile) = export_images(fetcher, &refs, config).await?;
    Ok(RunSummary {
        discovered: refs.len(),
        images: Some(downloads),
        reconcile: Some(reconcile),
        ..RunSummary::default()
    })
}

/// Full run: one catalog discovery feeding both stages.
pub async fn run_all(fetcher: &dyn Fetcher, config: &Config) -> Result<RunSummary> {
    let refs = discover_products(fetcher, &config.catalog_url, &config.base_url).await?;
    let products = export_products(fetcher, &refs, config).await?;
    let (downloads, reconcile) = export_images(fetcher, &refs, config).await?;
    Ok(RunSummary {
        discovered: refs.len(),
        products: products.len(),
        images: Some(downloads),
        reconcile: Some(reconcile),
    })
}
