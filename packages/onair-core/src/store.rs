//! Day-scoped broadcast store.
//!
//! Holds today's known broadcasts, at most one per slot. The store owns day
//! rollover detection and the merge policy; nothing else mutates it.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::slots::Slot;

/// A broadcast matched to a slot for the current day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    /// Label of the slot this broadcast belongs to.
    pub slot_label: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    /// Audio location; may be empty if the feed omitted it.
    pub audio_url: String,
}

impl Broadcast {
    /// Returns true when the broadcast can actually be played.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }
}

/// Collaborator told to drop playback state when the day rolls over.
pub trait DayResetListener {
    /// Clears any playback that refers to the previous day's broadcasts.
    fn on_day_reset(&mut self);
}

/// Read-only view of the store handed to presenters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub date: NaiveDate,
    /// Known broadcasts in slot order.
    pub broadcasts: Vec<Broadcast>,
    /// Slot label of the most recently published broadcast.
    pub latest: Option<String>,
}

/// Today's broadcasts keyed by slot label.
#[derive(Debug, Clone)]
pub struct BroadcastStore {
    date: NaiveDate,
    slots: Vec<Slot>,
    entries: HashMap<String, Broadcast>,
}

impl BroadcastStore {
    /// Creates an empty store for `today` over the given slot set.
    #[must_use]
    pub fn new(today: NaiveDate, slots: Vec<Slot>) -> Self {
        Self {
            date: today,
            slots,
            entries: HashMap::new(),
        }
    }

    /// The day the store currently describes.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The configured slot set, in order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Empties the store if `today` differs from the stored date.
    ///
    /// On rollover the listener is told to clear playback before the new date
    /// is stored. Returns whether a reset happened.
    pub fn reset_if_day_changed(
        &mut self,
        today: NaiveDate,
        listener: &mut dyn DayResetListener,
    ) -> bool {
        if self.date == today {
            return false;
        }
        log::info!(
            "[Store] Day changed {} -> {}, dropping {} broadcast(s)",
            self.date,
            today,
            self.entries.len()
        );
        self.entries.clear();
        listener.on_day_reset();
        self.date = today;
        true
    }

    /// Merges freshly fetched broadcasts.
    ///
    /// Each entry overwrites whatever the slot held before, regardless of
    /// timestamps. Entries for unknown slots are ignored. Returns the number
    /// of entries that changed the store.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Broadcast>) -> usize {
        let mut changed = 0;
        for broadcast in incoming {
            if !self.slots.iter().any(|s| s.label == broadcast.slot_label) {
                log::debug!(
                    "[Store] Ignoring broadcast for unknown slot {}",
                    broadcast.slot_label
                );
                continue;
            }
            let previous = self
                .entries
                .insert(broadcast.slot_label.clone(), broadcast.clone());
            if previous.as_ref() != Some(&broadcast) {
                changed += 1;
            }
        }
        changed
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Broadcast> {
        self.entries.get(label)
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Finds the slot holding the most recently published broadcast.
    ///
    /// Scans in slot order with a strict comparison, so equal timestamps
    /// resolve to the earlier slot.
    #[must_use]
    pub fn find_latest(&self) -> Option<&str> {
        let mut best: Option<&Broadcast> = None;
        for slot in &self.slots {
            if let Some(candidate) = self.entries.get(&slot.label) {
                if best.map_or(true, |b| candidate.published_at > b.published_at) {
                    best = Some(candidate);
                }
            }
        }
        best.map(|b| b.slot_label.as_str())
    }

    /// Builds a presenter snapshot with broadcasts in slot order.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            date: self.date,
            broadcasts: self
                .slots
                .iter()
                .filter_map(|slot| self.entries.get(&slot.label).cloned())
                .collect(),
            latest: self.find_latest().map(str::to_owned),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::slots::default_slots;
    use chrono::TimeZone;

    pub(crate) fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    pub(crate) fn broadcast(label: &str, ts: i64) -> Broadcast {
        Broadcast {
            slot_label: label.to_string(),
            title: format!("News {label}"),
            published_at: Utc.timestamp_opt(ts, 0).unwrap(),
            audio_url: format!("https://cdn.example/{}.mp3", label.replace(':', "")),
        }
    }

    #[derive(Default)]
    struct CountingListener {
        resets: usize,
    }

    impl DayResetListener for CountingListener {
        fn on_day_reset(&mut self) {
            self.resets += 1;
        }
    }

    #[test]
    fn merge_keeps_one_broadcast_per_slot() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        store.merge([broadcast("08:00", 100), broadcast("08:00", 50)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("08:00").unwrap().published_at.timestamp(), 50);
    }

    #[test]
    fn later_fetch_replaces_slot_regardless_of_timestamp() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        store.merge([broadcast("12:30", 500)]);
        let changed = store.merge([broadcast("12:30", 10)]);
        assert_eq!(changed, 1);
        assert_eq!(store.get("12:30").unwrap().published_at.timestamp(), 10);
    }

    #[test]
    fn merge_counts_only_real_changes() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        assert_eq!(store.merge([broadcast("08:00", 1)]), 1);
        assert_eq!(store.merge([broadcast("08:00", 1)]), 0);
    }

    #[test]
    fn merge_ignores_unknown_slots() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        assert_eq!(store.merge([broadcast("09:15", 1)]), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn reset_happens_once_per_day_change() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        let mut listener = CountingListener::default();
        store.merge([broadcast("08:00", 1), broadcast("22:00", 2)]);

        assert!(!store.reset_if_day_changed(day(16), &mut listener));
        assert_eq!(store.len(), 2);

        assert!(store.reset_if_day_changed(day(17), &mut listener));
        assert!(store.is_empty());
        assert_eq!(store.date(), day(17));
        assert_eq!(listener.resets, 1);

        assert!(!store.reset_if_day_changed(day(17), &mut listener));
        assert_eq!(listener.resets, 1);
    }

    #[test]
    fn find_latest_is_none_when_empty() {
        let store = BroadcastStore::new(day(16), default_slots());
        assert!(store.find_latest().is_none());
    }

    #[test]
    fn find_latest_picks_greatest_timestamp() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        store.merge([broadcast("08:00", 100), broadcast("12:30", 200)]);
        assert_eq!(store.find_latest(), Some("12:30"));
    }

    #[test]
    fn find_latest_ties_go_to_earlier_slot() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        store.merge([broadcast("18:00", 300), broadcast("12:30", 300)]);
        assert_eq!(store.find_latest(), Some("12:30"));
    }

    #[test]
    fn snapshot_lists_broadcasts_in_slot_order() {
        let mut store = BroadcastStore::new(day(16), default_slots());
        store.merge([broadcast("22:00", 4), broadcast("08:00", 1)]);

        let snapshot = store.snapshot();
        let labels: Vec<_> = snapshot
            .broadcasts
            .iter()
            .map(|b| b.slot_label.as_str())
            .collect();
        assert_eq!(labels, ["08:00", "22:00"]);
        assert_eq!(snapshot.latest.as_deref(), Some("22:00"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["date"], "2026-10-16");
        assert_eq!(json["broadcasts"][0]["slotLabel"], "08:00");
    }

    #[test]
    fn empty_audio_url_is_not_playable() {
        let mut b = broadcast("08:00", 1);
        assert!(b.is_playable());
        b.audio_url = " ".into();
        assert!(!b.is_playable());
    }
}
