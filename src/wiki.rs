use std::time::Duration;

use chrono::{Datelike as _, NaiveDate};
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::error::BotError;
use crate::formats::ApiResponse;

pub const HTTP_USER_AGENT: &str = "wotd-poster/0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFormat {
    /// Rendered HTML with section headings flattened.
    Html,
    /// Plain text with `== heading ==` section markers.
    WikiText,
}

/// Read side of the wiki: page extracts and random headwords.
pub trait WikiSource {
    /// Fails with [`BotError::NotFound`] when the page is missing or has no
    /// extract.
    fn fetch_extract(&self, title: &str, format: ExtractFormat) -> Result<String, BotError>;

    /// Title of a random main-namespace page.
    fn random_title(&self) -> Result<String, BotError>;
}

#[derive(Debug, Clone)]
pub struct WiktionaryClient {
    http: reqwest::blocking::Client,
    api_url: Url,
}

impl WiktionaryClient {
    pub fn new(http: reqwest::blocking::Client, api_url: Url) -> Self {
        Self { http, api_url }
    }

    fn query(&self, params: &[(&str, &str)]) -> Result<ApiResponse, BotError> {
        let target = self.api_url.as_str();
        let response = self
            .http
            .get(self.api_url.clone())
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| BotError::fetch(target, err))?;
        response
            .json::<ApiResponse>()
            .map_err(|err| BotError::fetch(target, format!("decode response: {err}")))
    }
}

impl WikiSource for WiktionaryClient {
    fn fetch_extract(&self, title: &str, format: ExtractFormat) -> Result<String, BotError> {
        let mut params = vec![
            ("action", "query"),
            ("prop", "extracts"),
            ("titles", title),
            ("format", "json"),
        ];
        match format {
            ExtractFormat::Html => params.push(("exsectionformat", "plain")),
            ExtractFormat::WikiText => {
                params.push(("explaintext", "1"));
                params.push(("exsectionformat", "wiki"));
            }
        }

        let response = self.query(&params)?;
        match response.first_extract() {
            Some(extract) => {
                tracing::debug!(title, bytes = extract.len(), "fetched extract");
                Ok(extract.to_owned())
            }
            None => Err(BotError::NotFound {
                title: title.to_owned(),
            }),
        }
    }

    fn random_title(&self) -> Result<String, BotError> {
        let response = self.query(&[
            ("action", "query"),
            ("list", "random"),
            ("rnnamespace", "0"),
            ("rnlimit", "1"),
            ("format", "json"),
        ])?;
        response
            .random_title()
            .map(str::to_owned)
            .ok_or_else(|| BotError::NotFound {
                title: "<random>".to_owned(),
            })
    }
}

pub fn build_http_client() -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(20))
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers({
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                USER_AGENT,
                reqwest::header::HeaderValue::from_static(HTTP_USER_AGENT),
            );
            headers
        })
        .build()
}

/// `<template>/<year>/<MM>/<DD>`, e.g. `Modèle:Entrée du jour/2024/03/05`.
pub fn day_page_title(template: &str, year: i32, month: u32, day: u32) -> String {
    format!("{template}/{year}/{month:02}/{day:02}")
}

/// Fetches today's curated entry page, retrying once with the same month and
/// day in `fallback_year` when today's page does not exist.
///
/// Returns the page title that answered together with its HTML extract.
pub fn fetch_day_entry(
    source: &dyn WikiSource,
    template: &str,
    today: NaiveDate,
    fallback_year: i32,
) -> Result<(String, String), BotError> {
    let page = day_page_title(template, today.year(), today.month(), today.day());
    tracing::info!(page = %page, "looking up entry of the day");
    match source.fetch_extract(&page, ExtractFormat::Html) {
        Ok(extract) => Ok((page, extract)),
        Err(BotError::NotFound { .. }) => {
            let fallback = day_page_title(template, fallback_year, today.month(), today.day());
            tracing::info!(
                page = %page,
                fallback = %fallback,
                "entry of the day missing; trying fallback year"
            );
            let extract = source.fetch_extract(&fallback, ExtractFormat::Html)?;
            Ok((fallback, extract))
        }
        Err(err) => Err(err),
    }
}

/// Article URL for `title` under the wiki's `/wiki/` base.
pub fn article_url(wiki_base: &Url, title: &str) -> anyhow::Result<Url> {
    let mut url = wiki_base.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("wiki base url cannot be a base: {wiki_base}"))?
        .pop_if_empty()
        .push(&title.replace(' ', "_"));
    Ok(url)
}
