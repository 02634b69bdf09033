use catalog_harvester::config::{Config, BASE_URL, CATALOG_URL};
use catalog_harvester::dataset::{Dataset, IMAGE_COLUMN, TITLE_COLUMN};
use catalog_harvester::pipeline::{run_all, run_images, run_products};
use catalog_harvester::ScraperError;
use std::path::Path;

mod support;

use support::StaticSite;

fn catalog(hrefs: &[&str]) -> String {
    let cards: String = hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<div class="c-4"><div class="product-item-container"><div class="psk064">
                     <a class="psk024" href="{}">card</a></div></div></div>"#,
                href
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="catalog-section"><div class="product-item-list-col-3">
             <div class="row">{}</div></div></div></body></html>"#,
        cards
    )
}

fn product_page(title: &str, sku: &str, image: Option<&str>) -> String {
    let slide = image
        .map(|src| {
            format!(
                r#"<div class="product-item-detail-slider-image active"><img src="{}"></div>"#,
                src
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body>
            <h1>{title}</h1>
            {slide}
            <ul>
              <li id="desc"><div><p>Надёжная горелка <b>{title}</b>.</p>
                <p>Описание<br>Звоните в ВИСТЕРМА</p>
                <p>Компания «Вистерма» — дилер.</p><p>Хвост</p></div></li>
              <li id="char">
                <dl class="psk072"><dt>Артикул:</dt><dd>{sku}</dd></dl>
                <dl class="psk072"><dt>Мощность:</dt><dd>10кВт</dd></dl>
              </li>
              <li id="brand"><p>Weishaupt</p></li>
            </ul>
        </body></html>"#
    )
}

fn fixture() -> StaticSite {
    StaticSite::new()
        .with_page(
            CATALOG_URL,
            &catalog(&["/catalog/wl5/", "/catalog/wg10/", "/catalog/qra2/"]),
        )
        .with_page(
            "https://visterma.ru/catalog/wl5/",
            &product_page(
                "Горелка WL5",
                "W-1",
                Some("/upload/resize_cache/medialibrary/a1b/600_600_1/wl5.jpg"),
            ),
        )
        .with_asset(
            "https://visterma.ru/upload/medialibrary/a1b/wl5.jpg",
            Some("image/jpeg"),
            b"wl5-bytes",
        )
        .with_page(
            "https://visterma.ru/catalog/wg10/",
            &product_page("Горелка WG10", "W-2", Some("/upload/medialibrary/c2d/wg10")),
        )
        .with_asset(
            "https://visterma.ru/upload/medialibrary/c2d/wg10",
            Some("image/png"),
            b"wg10-bytes",
        )
        .with_page(
            "https://visterma.ru/catalog/qra2/",
            &product_page("Датчик QRA2", "Q-3", None),
        )
}

fn config(dir: &Path) -> Config {
    let mut config = Config::new(BASE_URL, CATALOG_URL).unwrap();
    config.dataset_path = dir.join("products.csv");
    config.image_dir = dir.join("images");
    config.json_dump = Some(dir.join("products.json"));
    config.workers = 2;
    config
}

fn column(dataset: &Dataset, name: &str) -> usize {
    dataset.headers.iter().position(|h| h == name).unwrap()
}

#[tokio::test]
async fn full_run_exports_products_and_images() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let summary = run_all(&fixture(), &config).await.unwrap();
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.products, 3);
    let images = summary.images.unwrap();
    assert_eq!(images.downloaded, 2);
    assert_eq!(summary.reconcile.unwrap().rows_updated, 2);

    let dataset = Dataset::load(&config.dataset_path).unwrap();
    assert_eq!(dataset.rows.len(), 3);
    let title = column(&dataset, TITLE_COLUMN);
    let image = column(&dataset, IMAGE_COLUMN);

    let rows: Vec<(&str, &str)> = dataset
        .rows
        .iter()
        .map(|row| (row[title].as_str(), row[image].as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Горелка WL5", "gorelka_wl5.jpg"),
            ("Горелка WG10", "gorelka_wg10.png"),
            ("Датчик QRA2", ""),
        ]
    );

    let first = &dataset.rows[0];
    assert_eq!(first[2], "W-1");
    assert_eq!(first[6], "Надёжная горелка Горелка WL5.");
    let description = &first[7];
    assert!(description.starts_with("<p>Надёжная горелка Горелка WL5.</p>"));
    assert!(description.ends_with("<p>Описание</p>"));
    assert!(!description.contains("Вистерма"));
    assert!(!description.contains("ВИСТЕРМА"));
    assert!(!description.contains("Хвост"));
    assert_eq!(first[12], "Мощность");
    assert_eq!(first[13], "10кВт");

    let stored = std::fs::read(config.image_dir.join("gorelka_wl5.jpg")).unwrap();
    assert_eq!(stored, b"wl5-bytes");
    assert!(config.image_dir.join("gorelka_wg10.png").exists());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("products.json")).unwrap())
            .unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(3));
    assert_eq!(json[0]["manufacturer"], "<p>Weishaupt</p>");
}

#[tokio::test]
async fn image_stage_updates_existing_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let fetcher = fixture();

    run_products(&fetcher, &config).await.unwrap();
    let before = Dataset::load(&config.dataset_path).unwrap();
    let image = column(&before, IMAGE_COLUMN);
    assert!(before.rows.iter().all(|row| row[image].is_empty()));

    let summary = run_images(&fetcher, &config).await.unwrap();
    assert!(summary.reconcile.unwrap().unmatched.is_empty());
    let after = Dataset::load(&config.dataset_path).unwrap();
    assert_eq!(after.rows[1][image], "gorelka_wg10.png");
}

#[tokio::test]
async fn empty_catalog_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let fetcher = StaticSite::new().with_page(CATALOG_URL, &catalog(&[]));

    let err = run_all(&fetcher, &config).await.unwrap_err();
    assert!(matches!(err, ScraperError::NoProducts(_)));
    assert!(!config.dataset_path.exists());
}
