//! Broadcast metadata feed.
//!
//! The [`FeedClient`] trait is the seam between the station and the network.
//! [`HttpFeedClient`] is the production implementation; tests substitute
//! scripted clients.

pub mod dates;
mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::clock::local_date;
use crate::slots::{slot_for_title, slot_index, Slot};
use crate::store::Broadcast;

pub use http::HttpFeedClient;

/// One feed entry after date normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub audio_url: String,
}

/// HTTP validators remembered between fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheTokens {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheTokens {
    /// Returns true when no validator is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The server confirmed the cached copy is still current.
    NotModified,
    /// New content, along with the validators to send next time.
    Fresh {
        items: Vec<FeedItem>,
        tokens: CacheTokens,
    },
}

/// Errors raised while fetching the feed.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum FetchError {
    /// The request never produced a response.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("Feed returned HTTP {0}")]
    Status(u16),

    /// The body could not be decoded.
    #[error("Malformed feed: {0}")]
    Malformed(String),
}

/// Convenient Result alias for feed operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Source of broadcast metadata.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetches the feed.
    ///
    /// Sends `tokens` as validators unless `force_bypass` is set, in which
    /// case any intermediate cache must be skipped.
    async fn fetch(&self, tokens: &CacheTokens, force_bypass: bool) -> FetchResult<FeedOutcome>;
}

/// Converts feed items into today's broadcasts.
///
/// Items are matched to slots by title, and anything whose local publish date
/// is not `today` is dropped. When several items map to the same slot the
/// most recently published one wins; on equal timestamps the first one seen
/// is kept. The result is in slot order.
#[must_use]
pub fn broadcasts_for_day(
    items: &[FeedItem],
    slots: &[Slot],
    today: NaiveDate,
    offset: FixedOffset,
) -> Vec<Broadcast> {
    let mut picked: HashMap<&str, &FeedItem> = HashMap::new();

    for item in items {
        let Some(slot) = slot_for_title(&item.title, slots) else {
            log::trace!("[Feed] No slot in title {:?}", item.title);
            continue;
        };
        if local_date(item.published_at, offset) != today {
            continue;
        }
        match picked.get(slot.label.as_str()) {
            Some(existing) if existing.published_at >= item.published_at => {}
            _ => {
                picked.insert(slot.label.as_str(), item);
            }
        }
    }

    let mut broadcasts: Vec<Broadcast> = picked
        .into_iter()
        .map(|(label, item)| Broadcast {
            slot_label: label.to_string(),
            title: item.title.clone(),
            published_at: item.published_at,
            audio_url: item.audio_url.clone(),
        })
        .collect();
    broadcasts.sort_by_key(|b| slot_index(&b.slot_label, slots));
    broadcasts
}
