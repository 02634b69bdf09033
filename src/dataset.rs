//! The tabular product export and the pass that fills in image filenames.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, ScraperError};
use crate::product::{Product, MAX_ATTRIBUTES};

pub const TITLE_COLUMN: &str = "Имя";
pub const IMAGE_COLUMN: &str = "Изображения";

const BASE_COLUMNS: [&str; 12] = [
    "ID",
    "Тип",
    "Артикул",
    TITLE_COLUMN,
    "Опубликован",
    "Видимость в каталоге",
    "Краткое описание",
    "Описание",
    "Наличие",
    "Базовая цена",
    "Категории",
    IMAGE_COLUMN,
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column names: the fixed product columns, then four per attribute slot.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for slot in 1..=MAX_ATTRIBUTES {
        columns.push(format!("Название атрибута {}", slot));
        columns.push(format!("Значения атрибутов {}", slot));
        columns.push(format!("Видимость атрибута {}", slot));
        columns.push(format!("Глобальный атрибут {}", slot));
    }
    columns
}

pub fn product_row(product: &Product) -> Vec<String> {
    let mut row = vec![
        product.id.to_string(),
        product.kind.clone(),
        product.sku.clone(),
        product.title.clone(),
        product.published.to_string(),
        product.visibility.clone(),
        product.short_description.clone(),
        product.description.clone(),
        product.in_stock.to_string(),
        product.base_price.to_string(),
        product.categories.clone(),
        product.image.clone(),
    ];
    for slot in 0..MAX_ATTRIBUTES {
        match product.attributes.get(slot) {
            Some(attribute) => row.extend([
                attribute.name.clone(),
                attribute.value.clone(),
                attribute.visible.to_string(),
                attribute.global.to_string(),
            ]),
            None => row.extend(std::iter::repeat(String::new()).take(4)),
        }
    }
    row
}

/// Outcome of merging downloaded images into the dataset.
#[derive(Debug, Default, PartialEq)]
pub struct ReconcileReport {
    /// Image records that matched at least one row.
    pub updated: usize,
    /// Rows whose image cell was written.
    pub rows_updated: usize,
    /// Titles of downloaded images with no matching row, sorted.
    pub unmatched: Vec<String>,
}

/// Product table as headers plus string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn from_products(products: &[Product]) -> Self {
        Self {
            headers: header(),
            rows: products.iter().map(product_row).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content);
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self { headers, rows })
    }

    /// Writes the table as UTF-8 CSV with a BOM so spreadsheet tools pick the
    /// right encoding.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ScraperError::MissingColumn(name.to_string()))
    }

    /// Sets the image cell of every row whose title equals a downloaded
    /// product's title. Rows sharing a title all receive the same file.
    pub fn reconcile(&mut self, images: &HashMap<String, String>) -> Result<ReconcileReport> {
        let title_column = self.column(TITLE_COLUMN)?;
        let image_column = self.column(IMAGE_COLUMN)?;

        let mut titles: Vec<&String> = images.keys().collect();
        titles.sort();

        let mut report = ReconcileReport::default();
        for title in titles {
            let filename = &images[title];
            let mut matched = 0;
            for row in self
                .rows
                .iter_mut()
                .filter(|row| row.get(title_column) == Some(title))
            {
                if row.len() <= image_column {
                    row.resize(image_column + 1, String::new());
                }
                row[image_column] = filename.clone();
                matched += 1;
            }

            if matched > 0 {
                log::debug!("Updated: {} -> {}", title, filename);
                report.updated += 1;
                report.rows_updated += matched;
            } else {
                log::warn!("Not found in dataset: {}", title);
                report.unmatched.push(title.clone());
            }
        }
        Ok(report)
    }
}

/// Writes the product export.
pub fn write_products(path: &Path, products: &[Product]) -> Result<()> {
    Dataset::from_products(products).save(path)?;
    log::info!("💾 Saved {} products to {}", products.len(), path.display());
    Ok(())
}

/// Loads the export at `path`, fills in image filenames and rewrites it in place.
pub fn reconcile_file(path: &Path, images: &HashMap<String, String>) -> Result<ReconcileReport> {
    if images.is_empty() {
        log::warn!("No downloaded images to merge into {}", path.display());
        return Ok(ReconcileReport::default());
    }

    let mut dataset = Dataset::load(path)?;
    let report = dataset.reconcile(images)?;
    dataset.save(path)?;

    log::info!(
        "💾 Dataset updated: {}/{} images matched",
        report.updated,
        images.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductDefaults;
    use crate::product::{Attribute, Characteristics};

    fn product(title: &str, attributes: usize) -> Product {
        let defaults = ProductDefaults::default();
        Product {
            id: defaults.id,
            kind: defaults.kind,
            sku: "W-1".to_string(),
            title: title.to_string(),
            published: defaults.published,
            visibility: defaults.visibility,
            short_description: "Коротко, \"в кавычках\"".to_string(),
            description: "<p>Описание\nв две строки</p>".to_string(),
            in_stock: defaults.in_stock,
            base_price: defaults.base_price,
            categories: defaults.categories,
            image: String::new(),
            manufacturer: String::new(),
            characteristics: Characteristics::default(),
            attributes: (0..attributes)
                .map(|i| Attribute {
                    name: format!("Параметр {}", i),
                    value: i.to_string(),
                    visible: 1,
                    global: 0,
                })
                .collect(),
        }
    }

    fn images(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(t, f)| (t.to_string(), f.to_string()))
            .collect()
    }

    #[test]
    fn header_has_seven_attribute_slots() {
        let columns = header();
        assert_eq!(columns.len(), 12 + 7 * 4);
        assert_eq!(columns[3], "Имя");
        assert_eq!(columns[11], "Изображения");
        assert_eq!(columns[12], "Название атрибута 1");
        assert_eq!(columns.last().map(String::as_str), Some("Глобальный атрибут 7"));
    }

    #[test]
    fn unused_attribute_slots_are_empty() {
        let row = product_row(&product("A", 2));
        assert_eq!(row.len(), header().len());
        assert_eq!(&row[12..16], ["Параметр 0", "0", "1", "0"]);
        assert_eq!(&row[16..20], ["Параметр 1", "1", "1", "0"]);
        assert!(row[20..].iter().all(String::is_empty));
        assert_eq!(&row[..4], ["5000", "simple", "W-1", "A"]);
    }

    #[test]
    fn saved_dataset_loads_back_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        write_products(&path, &[product("Горелка", 1), product("Клапан", 0)]).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(UTF8_BOM));

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.headers, header());
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.rows[0][7], "<p>Описание\nв две строки</p>");
        assert_eq!(dataset.rows[1][3], "Клапан");
    }

    #[test]
    fn reconcile_sets_images_and_reports_misses() {
        let mut dataset = Dataset::from_products(&[
            product("Горелка", 0),
            product("Клапан", 0),
            product("Горелка", 0),
        ]);
        let report = dataset
            .reconcile(&images(&[
                ("Горелка", "gorelka.jpg"),
                ("Датчик", "datchik.png"),
            ]))
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.rows_updated, 2);
        assert_eq!(report.unmatched, vec!["Датчик".to_string()]);
        assert_eq!(dataset.rows[0][11], "gorelka.jpg");
        assert_eq!(dataset.rows[1][11], "");
        assert_eq!(dataset.rows[2][11], "gorelka.jpg");
    }

    #[test]
    fn reconcile_requires_title_and_image_columns() {
        let mut dataset = Dataset {
            headers: vec!["ID".to_string(), TITLE_COLUMN.to_string()],
            rows: vec![],
        };
        let err = dataset.reconcile(&images(&[("A", "a.jpg")])).unwrap_err();
        assert!(matches!(err, ScraperError::MissingColumn(c) if c == IMAGE_COLUMN));
    }

    #[test]
    fn reconcile_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        write_products(&path, &[product("Горелка", 3)]).unwrap();

        let report = reconcile_file(&path, &images(&[("Горелка", "gorelka.jpg")])).unwrap();
        assert_eq!(report.updated, 1);

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.rows[0][11], "gorelka.jpg");
        assert_eq!(dataset.rows[0][12], "Параметр 0");
    }

    #[test]
    fn reconcile_file_without_images_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        let report = reconcile_file(&path, &HashMap::new()).unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert!(!path.exists());
    }
}
