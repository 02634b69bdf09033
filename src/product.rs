//! Product page extraction into the canonical [`Product`] record.

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::config::ProductDefaults;
use crate::dom::{collapse_whitespace, element_text, selector};
use crate::error::Result;
use crate::sanitize::sanitize_block;

pub const SKU_LABEL: &str = "Артикул";
const NAME_LABEL: &str = "Название";
pub const MAX_ATTRIBUTES: usize = 7;
const SHORT_DESCRIPTION_LIMIT: usize = 150;
const ELLIPSIS: &str = "...";

const TITLE: &str = "h1";
const DESCRIPTION_BLOCK: &str = "li#desc";
const BRAND_BLOCK: &str = "li#brand";
const CHARACTERISTIC_PAIR: &str = "li#char dl.psk072";

/// Labelled technical values in page order. Re-inserting a label replaces its
/// value but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    entries: Vec<(String, String)>,
}

impl Characteristics {
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub visible: u8,
    pub global: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub kind: String,
    pub sku: String,
    pub title: String,
    pub published: u8,
    pub visibility: String,
    pub short_description: String,
    pub description: String,
    pub in_stock: u8,
    pub base_price: u32,
    pub categories: String,
    /// Stored image filename, filled in by reconciliation.
    pub image: String,
    pub manufacturer: String,
    pub characteristics: Characteristics,
    pub attributes: Vec<Attribute>,
}

/// Text of the first `h1`, if present and non-blank.
pub fn extract_title(document: &Html) -> Result<Option<String>> {
    let title_selector = selector(TITLE)?;
    Ok(document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|title| !title.is_empty()))
}

pub fn extract_characteristics(document: &Html) -> Result<Characteristics> {
    let pair_selector = selector(CHARACTERISTIC_PAIR)?;
    let label_selector = selector("dt")?;
    let value_selector = selector("dd")?;

    let mut characteristics = Characteristics::default();
    for pair in document.select(&pair_selector) {
        let label = pair.select(&label_selector).next().map(element_text);
        let value = pair.select(&value_selector).next().map(element_text);
        match (label, value) {
            (Some(label), Some(value)) => {
                let label = label.trim_end_matches(':').trim_end().to_string();
                characteristics.insert(label, value);
            }
            _ => log::debug!("Skipping characteristic without label/value pair"),
        }
    }
    Ok(characteristics)
}

/// Attribute columns: the leading characteristics, minus the SKU and name rows.
pub fn attributes_from(characteristics: &Characteristics) -> Vec<Attribute> {
    characteristics
        .iter()
        .take(MAX_ATTRIBUTES)
        .filter(|(label, _)| {
            let label = label.to_lowercase();
            label != SKU_LABEL.to_lowercase() && label != NAME_LABEL.to_lowercase()
        })
        .map(|(name, value)| Attribute {
            name: name.to_string(),
            value: value.to_string(),
            visible: 1,
            global: 0,
        })
        .collect()
}

/// Teaser text: the first paragraph of the description, or its whole text
/// clipped to 150 characters when there are no paragraphs.
pub fn short_description(description_html: &str) -> Result<String> {
    if description_html.trim().is_empty() {
        return Ok(String::new());
    }
    let fragment = Html::parse_fragment(description_html);
    let paragraph_selector = selector("p")?;

    if let Some(paragraph) = fragment.select(&paragraph_selector).next() {
        return Ok(collapse_whitespace(&element_text(paragraph)));
    }

    let text = collapse_whitespace(&element_text(fragment.root_element()));
    if text.chars().count() > SHORT_DESCRIPTION_LIMIT {
        let clipped: String = text
            .chars()
            .take(SHORT_DESCRIPTION_LIMIT - ELLIPSIS.len())
            .collect();
        return Ok(format!("{}{}", clipped, ELLIPSIS));
    }
    Ok(text)
}

/// Sanitized manufacturer blurb from a product page's brand tab.
pub fn extract_manufacturer(document: &Html) -> Result<String> {
    let brand_selector = selector(BRAND_BLOCK)?;
    Ok(sanitize_block(document.select(&brand_selector).next()))
}

/// Builds the product record for one page.
pub fn parse_product(html: &str, manufacturer: &str, defaults: &ProductDefaults) -> Result<Product> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)?.unwrap_or_else(|| defaults.title_placeholder.clone());

    let description_selector = selector(DESCRIPTION_BLOCK)?;
    let description = sanitize_block(document.select(&description_selector).next());
    let short_description = short_description(&description)?;

    let characteristics = extract_characteristics(&document)?;
    let sku = characteristics.get(SKU_LABEL).unwrap_or_default().to_string();
    let attributes = attributes_from(&characteristics);

    log::debug!(
        "Parsed '{}': {} characteristics, {} attributes",
        title,
        characteristics.len(),
        attributes.len()
    );

    Ok(Product {
        id: defaults.id,
        kind: defaults.kind.clone(),
        sku,
        title,
        published: defaults.published,
        visibility: defaults.visibility.clone(),
        short_description,
        description,
        in_stock: defaults.in_stock,
        base_price: defaults.base_price,
        categories: defaults.categories.clone(),
        image: String::new(),
        manufacturer: manufacturer.to_string(),
        characteristics,
        attributes,
    })
}
