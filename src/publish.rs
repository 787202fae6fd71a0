//! Outbound side: rich-text posts with optional link cards, published to a
//! Bluesky personal data server over XRPC.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Credentials;
use crate::error::BotError;
use crate::preview::ImageData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link { text: String, uri: String },
}

/// Post text assembled from plain and link segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    segments: Vec<Segment>,
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new().text(text)
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Text(text.into()));
        self
    }

    #[must_use]
    pub fn link(mut self, text: impl Into<String>, uri: impl Into<String>) -> Self {
        self.segments.push(Segment::Link {
            text: text.into(),
            uri: uri.into(),
        });
        self
    }

    pub fn as_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) | Segment::Link { text, .. } => text.as_str(),
            })
            .collect()
    }

    /// Link facets addressed by UTF-8 byte offsets into [`RichText::as_text`].
    pub fn facets(&self) -> Vec<Facet> {
        let mut facets = Vec::new();
        let mut offset = 0usize;
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => offset += text.len(),
                Segment::Link { text, uri } => {
                    facets.push(Facet {
                        index: ByteSlice {
                            byte_start: offset,
                            byte_end: offset + text.len(),
                        },
                        features: vec![FacetFeature::Link { uri: uri.clone() }],
                    });
                    offset += text.len();
                }
            }
        }
        facets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
}

/// Opaque blob reference returned by the server after an upload.
pub type BlobRef = serde_json::Value;

/// Link card shown under the post.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEmbed {
    pub title: String,
    pub description: String,
    pub uri: String,
    pub thumb: Option<BlobRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub text: RichText,
    pub embed: Option<ExternalEmbed>,
}

pub trait Publisher {
    fn upload_blob(&mut self, image: &ImageData) -> Result<BlobRef, BotError>;
    fn send_post(&mut self, post: &Post) -> Result<(), BotError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

/// Publisher backed by the AT protocol XRPC endpoints. Logs in on first use.
pub struct BlueskyPublisher {
    http: reqwest::blocking::Client,
    pds_url: Url,
    credentials: Credentials,
    session: Option<Session>,
}

impl BlueskyPublisher {
    pub fn new(http: reqwest::blocking::Client, pds_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            pds_url,
            credentials,
            session: None,
        }
    }

    fn endpoint(&self, nsid: &str) -> String {
        let base = self.pds_url.as_str().trim_end_matches('/');
        format!("{base}/xrpc/{nsid}")
    }

    fn session(&mut self) -> Result<&Session, BotError> {
        if self.session.is_none() {
            let endpoint = self.endpoint("com.atproto.server.createSession");
            let body = serde_json::json!({
                "identifier": self.credentials.handle,
                "password": self.credentials.password,
            });
            let response = self.http.post(&endpoint).json(&body).send();
            let session: Session = read_json(response, &endpoint)?;
            tracing::info!(handle = %self.credentials.handle, "connected to bluesky");
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| BotError::publish("no bluesky session"))
    }
}

impl Publisher for BlueskyPublisher {
    fn upload_blob(&mut self, image: &ImageData) -> Result<BlobRef, BotError> {
        let endpoint = self.endpoint("com.atproto.repo.uploadBlob");
        let token = self.session()?.access_jwt.clone();
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, image.mime_type.as_str())
            .body(image.bytes.clone())
            .send();

        #[derive(Deserialize)]
        struct UploadBlobOutput {
            blob: BlobRef,
        }
        let output: UploadBlobOutput = read_json(response, &endpoint)?;
        tracing::debug!(bytes = image.bytes.len(), "uploaded thumbnail blob");
        Ok(output.blob)
    }

    fn send_post(&mut self, post: &Post) -> Result<(), BotError> {
        let endpoint = self.endpoint("com.atproto.repo.createRecord");
        let session = self.session()?;
        let token = session.access_jwt.clone();
        let body = serde_json::json!({
            "repo": session.did,
            "collection": "app.bsky.feed.post",
            "record": post_record(post, chrono::Utc::now()),
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .json(&body)
            .send();
        let created: serde_json::Value = read_json(response, &endpoint)?;
        tracing::info!(
            uri = created.get("uri").and_then(|v| v.as_str()).unwrap_or(""),
            "post created"
        );
        Ok(())
    }
}

/// `app.bsky.feed.post` record for `post`.
pub fn post_record(post: &Post, created_at: chrono::DateTime<chrono::Utc>) -> serde_json::Value {
    let mut record = serde_json::json!({
        "$type": "app.bsky.feed.post",
        "text": post.text.as_text(),
        "createdAt": created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    });

    let facets = post.text.facets();
    if !facets.is_empty()
        && let Some(obj) = record.as_object_mut()
    {
        obj.insert("facets".to_owned(), serde_json::json!(facets));
    }

    if let Some(embed) = &post.embed
        && let Some(obj) = record.as_object_mut()
    {
        let mut external = serde_json::json!({
            "uri": embed.uri,
            "title": embed.title,
            "description": embed.description,
        });
        if let Some(thumb) = &embed.thumb
            && let Some(ext) = external.as_object_mut()
        {
            ext.insert("thumb".to_owned(), thumb.clone());
        }
        obj.insert(
            "embed".to_owned(),
            serde_json::json!({
                "$type": "app.bsky.embed.external",
                "external": external,
            }),
        );
    }

    record
}

fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Result<reqwest::blocking::Response>,
    endpoint: &str,
) -> Result<T, BotError> {
    let response = response.map_err(|err| BotError::publish(format!("POST {endpoint}: {err}")))?;
    let status = response.status();
    let raw = response
        .text()
        .map_err(|err| BotError::publish(format!("read {endpoint} response: {err}")))?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or(raw);
        return Err(BotError::publish(format!("{endpoint} ({status}): {message}")));
    }
    serde_json::from_str(&raw)
        .map_err(|err| BotError::publish(format!("parse {endpoint} response: {err}")))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("message")?.as_str()?;
    match value.get("error").and_then(|v| v.as_str()) {
        Some(error) => Some(format!("{error}: {message}")),
        None => Some(message.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn facets_use_utf8_byte_offsets() {
        let text = RichText::new()
            .text("📚 été\n")
            .text("Plus d'info: ")
            .link("pomme", "https://fr.wiktionary.org/wiki/pomme");
        assert_eq!(text.as_text(), "📚 été\nPlus d'info: pomme");

        let facets = text.facets();
        assert_eq!(facets.len(), 1);
        let start = "📚 été\nPlus d'info: ".len();
        assert_eq!(
            facets[0].index,
            ByteSlice {
                byte_start: start,
                byte_end: start + 5,
            }
        );
        assert_eq!(&text.as_text()[start..start + 5], "pomme");
    }

    #[test]
    fn facet_serializes_with_lexicon_names() -> anyhow::Result<()> {
        let facets = RichText::new().link("x", "https://x.test").facets();
        let value = serde_json::to_value(&facets)?;
        assert_eq!(
            value,
            serde_json::json!([{
                "index": { "byteStart": 0, "byteEnd": 1 },
                "features": [{ "$type": "app.bsky.richtext.facet#link", "uri": "https://x.test" }],
            }])
        );
        Ok(())
    }

    #[test]
    fn record_carries_external_embed() -> anyhow::Result<()> {
        let created_at = chrono::Utc
            .with_ymd_and_hms(2026, 3, 5, 10, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("valid timestamp"))?;
        let post = Post {
            text: RichText::plain("hello"),
            embed: Some(ExternalEmbed {
                title: "pomme — Wiktionnaire".to_owned(),
                description: "Nom commun".to_owned(),
                uri: "https://fr.wiktionary.org/wiki/pomme".to_owned(),
                thumb: Some(serde_json::json!({ "$type": "blob", "size": 3 })),
            }),
        };
        let record = post_record(&post, created_at);
        assert_eq!(record["text"], "hello");
        assert_eq!(record["createdAt"], "2026-03-05T10:00:00.000Z");
        assert!(record.get("facets").is_none());
        assert_eq!(record["embed"]["$type"], "app.bsky.embed.external");
        assert_eq!(record["embed"]["external"]["title"], "pomme — Wiktionnaire");
        assert_eq!(record["embed"]["external"]["thumb"]["size"], 3);
        Ok(())
    }

    #[test]
    fn xrpc_error_body_is_summarized() {
        let raw = r#"{"error":"RateLimitExceeded","message":"slow down"}"#;
        assert_eq!(
            parse_error_message(raw).as_deref(),
            Some("RateLimitExceeded: slow down")
        );
        assert_eq!(parse_error_message("not json"), None);
    }
}
