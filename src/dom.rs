//! Small helpers shared by the page extractors.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::error::{Result, ScraperError};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Compiles a CSS selector, reporting the offending source on failure.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScraperError::InvalidSelector(format!("{}: {}", css, e)))
}

/// All descendant text of an element, trimmed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Replaces every run of whitespace with a single space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}
