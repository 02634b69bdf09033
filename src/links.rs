//! Product discovery on the catalog listing page.

use scraper::Html;
use url::Url;

use crate::dom::selector;
use crate::error::{Result, ScraperError};
use crate::fetch::Fetcher;

/// Cards of the catalog grid, narrowest wrapper that holds the product link.
const PRODUCT_CARD: &str =
    ".catalog-section .product-item-list-col-3 .row .c-4 .product-item-container .psk064";
const PRODUCT_LINK: &str = "a.psk024";

/// A product page discovered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub url: Url,
}

/// Product links in listing order, resolved against `base`. Duplicates are kept.
pub fn extract_product_links(document: &Html, base: &Url) -> Result<Vec<ProductRef>> {
    let card_selector = selector(PRODUCT_CARD)?;
    let link_selector = selector(PRODUCT_LINK)?;

    let refs = document
        .select(&card_selector)
        .filter_map(|card| {
            let href = card.select(&link_selector).next()?.value().attr("href")?;
            match base.join(href) {
                Ok(url) => Some(ProductRef { url }),
                Err(e) => {
                    log::warn!("Skipping unresolvable product link '{}': {}", href, e);
                    None
                }
            }
        })
        .collect();
    Ok(refs)
}

/// Fetches the catalog and lists its products. An empty catalog is an error:
/// there is nothing for the rest of the run to do.
pub async fn discover_products(
    fetcher: &dyn Fetcher,
    catalog_url: &Url,
    base: &Url,
) -> Result<Vec<ProductRef>> {
    log::info!("📋 Collecting product links from {}", catalog_url);
    let html = fetcher.fetch_page(catalog_url).await?;
    let refs = extract_product_links(&Html::parse_document(&html), base)?;

    if refs.is_empty() {
        return Err(ScraperError::NoProducts(catalog_url.to_string()));
    }
    log::info!("Found {} products", refs.len());
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    const CATALOG: &str = "https://visterma.ru/catalog/prochee-Weishaupt/?SHOWALL_1=1";

    fn card(href: &str) -> String {
        format!(
            r#"<div class="c-4"><div class="product-item-container"><div class="psk064">
                 <a class="image" href="/img">img</a><a class="psk024" href="{}">name</a>
               </div></div></div>"#,
            href
        )
    }

    fn listing(cards: &[String]) -> String {
        format!(
            r#"<html><body><div class="catalog-section"><div class="product-item-list-col-3">
                 <div class="row">{}</div></div></div>
                 <div class="psk064"><a class="psk024" href="/outside/">stray</a></div>
               </body></html>"#,
            cards.join("")
        )
    }

    fn base() -> Url {
        Url::parse("https://visterma.ru").unwrap()
    }

    #[test]
    fn extracts_links_in_order_and_keeps_duplicates() {
        let html = listing(&[
            card("/catalog/a/"),
            card("https://visterma.ru/catalog/b/"),
            card("/catalog/a/"),
        ]);
        let refs = extract_product_links(&Html::parse_document(&html), &base()).unwrap();
        let urls: Vec<&str> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://visterma.ru/catalog/a/",
                "https://visterma.ru/catalog/b/",
                "https://visterma.ru/catalog/a/",
            ]
        );
    }

    #[test]
    fn cards_without_marked_link_are_skipped() {
        let html = listing(&[r#"<div class="c-4"><div class="product-item-container"><div class="psk064"><a href="/x/">x</a></div></div></div>"#.to_string()]);
        let refs = extract_product_links(&Html::parse_document(&html), &base()).unwrap();
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_is_fatal() {
        let fetcher = MemoryFetcher::new().with_page(CATALOG, &listing(&[]));
        let err = discover_products(&fetcher, &Url::parse(CATALOG).unwrap(), &base())
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::NoProducts(_)));
    }

    #[tokio::test]
    async fn catalog_fetch_failure_is_reported() {
        let fetcher = MemoryFetcher::new();
        let err = discover_products(&fetcher, &Url::parse(CATALOG).unwrap(), &base())
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn discovers_products_from_fetched_catalog() {
        let fetcher = MemoryFetcher::new().with_page(CATALOG, &listing(&[card("/catalog/a/")]));
        let refs = discover_products(&fetcher, &Url::parse(CATALOG).unwrap(), &base())
            .await
            .unwrap();
        assert_eq!(refs.len(), 1);
    }
}
