use thiserror::Error;

/// Custom error types for the harvesting pipeline
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No product links found in catalog {0}")]
    NoProducts(String),
    #[error("No image found for product: {0}")]
    NoImage(String),
    #[error("Dataset has no column named '{0}'")]
    MissingColumn(String),
    #[error("Markup nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
