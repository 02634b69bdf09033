//! Locating the primary product image and turning it into a downloadable URL.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

use crate::dom::selector;
use crate::error::Result;

const ACTIVE_SLIDE_IMAGE: &str = "div.product-item-detail-slider-image.active img";
const RESIZE_MARKER: &str = "resize_cache";
const MEDIA_SEGMENT: &str = "medialibrary";

static STYLE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(["']?(.*?)["']?\)"#).unwrap());

/// Finds the image shown in the active slide, preferring `src` over an inline
/// `background` style. Returns `Ok(None)` when the page has no usable image.
pub fn resolve_image_url(document: &Html, base: &Url) -> Result<Option<Url>> {
    let image_selector = selector(ACTIVE_SLIDE_IMAGE)?;
    let Some(img) = document.select(&image_selector).next() else {
        return Ok(None);
    };

    let from_src = img
        .value()
        .attr("src")
        .filter(|src| !src.trim().is_empty())
        .and_then(|src| base.join(src.trim()).ok());

    let resolved = from_src.or_else(|| {
        img.value()
            .attr("style")
            .and_then(url_from_style)
            .and_then(|raw| base.join(&raw).ok())
    });

    Ok(resolved.map(|url| canonical_image_url(&url, base)))
}

/// First `url(...)` reference inside an inline style.
pub fn url_from_style(style: &str) -> Option<String> {
    STYLE_URL
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|raw| !raw.is_empty())
}

/// Rewrites a resized-cache URL to the original media-library file. URLs that
/// are not cached, or whose layout is not recognized, come back unchanged.
pub fn canonical_image_url(url: &Url, base: &Url) -> Url {
    if !url.as_str().contains(RESIZE_MARKER) {
        return url.clone();
    }

    let segments: Vec<&str> = url.path().split('/').collect();
    let rewritten = segments
        .iter()
        .position(|segment| *segment == MEDIA_SEGMENT)
        .filter(|&index| index + 2 < segments.len())
        .and_then(|index| {
            let folder = segments[index + 1];
            let file = segments[segments.len() - 1];
            let origin = base.as_str().trim_end_matches('/');
            Url::parse(&format!("{}/upload/{}/{}/{}", origin, MEDIA_SEGMENT, folder, file)).ok()
        });

    match rewritten {
        Some(canonical) => canonical,
        None => {
            log::warn!("Could not rewrite cached image URL, keeping it: {}", url);
            url.clone()
        }
    }
}

/// File extension (with leading dot) for a downloaded image: the URL's own
/// suffix when it has one, otherwise a guess from the content type.
pub fn image_extension(url: &Url, content_type: Option<&str>) -> String {
    let file = url.path().rsplit('/').next().unwrap_or_default();
    if let Some((stem, ext)) = file.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() {
            return format!(".{}", ext);
        }
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let ext = if content_type.contains("jpeg") || content_type.contains("jpg") {
        ".jpg"
    } else if content_type.contains("png") {
        ".png"
    } else if content_type.contains("gif") {
        ".gif"
    } else if content_type.contains("webp") {
        ".webp"
    } else {
        ".jpg"
    };
    ext.to_string()
}
