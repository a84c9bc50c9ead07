//! reqwest-backed feed client.

use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::header::{CACHE_CONTROL, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::dates::parse_publish_date;
use super::{CacheTokens, FeedClient, FeedItem, FeedOutcome, FetchError, FetchResult};
use crate::utils::now_millis;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireFeed {
    #[serde(default)]
    items: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    #[serde(default)]
    title: String,
    pub_date: Option<String>,
    date: Option<String>,
    audio_url: Option<String>,
    enclosure: Option<WireEnclosure>,
}

#[derive(Debug, Deserialize)]
struct WireEnclosure {
    url: Option<String>,
}

impl WireItem {
    fn into_item(self, offset: FixedOffset) -> Option<FeedItem> {
        let raw_date = self.pub_date.as_deref().or(self.date.as_deref());
        let Some(published_at) = raw_date.and_then(|d| parse_publish_date(d, offset)) else {
            log::warn!(
                "[Feed] Dropping {:?}: unparseable publish date {:?}",
                self.title,
                raw_date
            );
            return None;
        };

        let audio_url = self
            .audio_url
            .or_else(|| self.enclosure.and_then(|e| e.url))
            .unwrap_or_default();

        Some(FeedItem {
            title: self.title,
            published_at,
            audio_url,
        })
    }
}

/// Decodes a feed body into normalised items.
fn decode_items(body: &[u8], offset: FixedOffset) -> FetchResult<Vec<FeedItem>> {
    let feed: WireFeed =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    Ok(feed
        .items
        .into_iter()
        .filter_map(|item| item.into_item(offset))
        .collect())
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches the broadcast feed over HTTP with conditional caching.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    client: Client,
    url: Url,
    offset: FixedOffset,
}

impl HttpFeedClient {
    /// Creates a client for `feed_url`.
    ///
    /// `offset` is the timezone naive publish dates are read in.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the URL does not parse.
    pub fn new(client: Client, feed_url: &str, offset: FixedOffset) -> FetchResult<Self> {
        let url = Url::parse(feed_url)
            .map_err(|e| FetchError::Http(format!("invalid feed URL {feed_url}: {e}")))?;
        Ok(Self {
            client,
            url,
            offset,
        })
    }

    /// The feed location.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch(&self, tokens: &CacheTokens, force_bypass: bool) -> FetchResult<FeedOutcome> {
        let mut url = self.url.clone();
        let mut request;

        if force_bypass {
            url.query_pairs_mut()
                .append_pair("_", &now_millis().to_string());
            request = self.client.get(url).header(CACHE_CONTROL, "no-cache");
        } else {
            request = self.client.get(url);
            if let Some(etag) = &tokens.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &tokens.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        log::debug!(
            "[Feed] GET {} (bypass: {}, validators: {})",
            self.url,
            force_bypass,
            !tokens.is_empty()
        );

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            log::debug!("[Feed] Not modified");
            return Ok(FeedOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let fresh_tokens = CacheTokens {
            etag: header_string(&response, ETAG),
            last_modified: header_string(&response, LAST_MODIFIED),
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;
        let items = decode_items(&body, self.offset)?;

        log::info!("[Feed] Fetched {} item(s)", items.len());

        Ok(FeedOutcome::Fresh {
            items,
            tokens: fresh_tokens,
        })
    }
}
