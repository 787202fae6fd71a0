//! Open Graph lookup for link cards.
//!
//! Meta tags are found by pattern matching over the raw HTML; the page is
//! never parsed into a DOM. Only matched attribute values go through the
//! HTML parser, to resolve character references.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use crate::error::BotError;
use crate::formats::LinkPreview;

const MAX_IMAGE_BYTES: usize = 1_000_000;

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("META_TAG_RE should compile"));
static META_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("META_ATTR_RE should compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct PreviewResolver {
    http: reqwest::blocking::Client,
}

impl PreviewResolver {
    pub fn new(http: reqwest::blocking::Client) -> Self {
        Self { http }
    }

    pub fn resolve(&self, url: &Url) -> Result<LinkPreview, BotError> {
        let html = self
            .http
            .get(url.clone())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|err| BotError::fetch(url.as_str(), err))?;

        let preview = parse_open_graph(&html);
        tracing::debug!(
            url = %url,
            title = ?preview.title,
            image = ?preview.image_url,
            "resolved link preview"
        );
        Ok(preview)
    }

    /// Downloads the card thumbnail named by `og:image`.
    pub fn fetch_image(&self, image_url: &str) -> Result<ImageData, BotError> {
        let response = self
            .http
            .get(image_url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| BotError::fetch(image_url, err))?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_owned());

        let bytes = response
            .bytes()
            .map_err(|err| BotError::fetch(image_url, err))?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(BotError::fetch(
                image_url,
                format!("image is {} bytes (limit {MAX_IMAGE_BYTES})", bytes.len()),
            ));
        }

        Ok(ImageData {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

pub fn parse_open_graph(html: &str) -> LinkPreview {
    LinkPreview {
        image_url: og_property(html, "og:image"),
        title: og_property(html, "og:title"),
    }
}

/// `content` of the first `<meta property="{name}">` tag.
fn og_property(html: &str, name: &str) -> Option<String> {
    for tag in META_TAG_RE.find_iter(html) {
        let mut property = None;
        let mut content = None;
        for caps in META_ATTR_RE.captures_iter(tag.as_str()) {
            let Some(key) = caps.get(1) else {
                continue;
            };
            let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            match key.as_str().to_ascii_lowercase().as_str() {
                "property" => property = value,
                "content" => content = value,
                _ => {}
            }
        }
        if property.is_some_and(|p| p.eq_ignore_ascii_case(name))
            && let Some(content) = content.filter(|c| !c.trim().is_empty())
        {
            return Some(decode_entities(content.trim()));
        }
    }
    None
}

/// Character references in an attribute value, resolved by the HTML parser.
fn decode_entities(value: &str) -> String {
    Html::parse_fragment(value)
        .root_element()
        .text()
        .collect()
}
