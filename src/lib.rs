//! Catalog harvesting: product discovery, page extraction, markup
//! sanitizing, image download and dataset reconciliation.

pub mod config;
pub mod dataset;
pub mod dom;
pub mod download;
pub mod error;
pub mod fetch;
pub mod image;
pub mod links;
pub mod pipeline;
pub mod product;
pub mod sanitize;
pub mod slug;

pub use config::Config;
pub use error::{Result, ScraperError};
pub use fetch::{BinaryBody, Fetcher, HttpFetcher};
pub use links::ProductRef;
pub use product::Product;
