//! Daily broadcast slots.
//!
//! A slot is one of the fixed daily broadcast times. Slot order matters: it
//! decides which slot governs polling and which slot wins timestamp ties.

use serde::{Deserialize, Serialize};

use crate::constants::SLOT_COUNT;

/// A fixed daily broadcast slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Label as it appears in broadcast titles (e.g. `"08:00"`).
    pub label: String,
    /// Hour from which the broadcast is expected to be available.
    pub poll_start_hour: u32,
    /// Minute from which the broadcast is expected to be available.
    pub poll_start_minute: u32,
}

impl Slot {
    /// Creates a slot.
    pub fn new(label: impl Into<String>, poll_start_hour: u32, poll_start_minute: u32) -> Self {
        Self {
            label: label.into(),
            poll_start_hour,
            poll_start_minute,
        }
    }

    /// Poll start expressed in minutes since local midnight.
    #[must_use]
    pub fn poll_start_minutes(&self) -> i32 {
        minutes_since_midnight(self.poll_start_hour, self.poll_start_minute)
    }
}

/// `hour:minute` as minutes, saturating at `i32::MAX` for nonsense input.
pub(crate) fn minutes_since_midnight(hour: u32, minute: u32) -> i32 {
    let minutes = hour.saturating_mul(60).saturating_add(minute);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// The built-in slot set, in tie-break order.
#[must_use]
pub fn default_slots() -> Vec<Slot> {
    vec![
        Slot::new("08:00", 8, 20),
        Slot::new("12:30", 12, 50),
        Slot::new("18:00", 18, 20),
        Slot::new("22:00", 22, 20),
    ]
}

/// Checks that a slot set is usable.
///
/// # Errors
///
/// Returns a description of the first problem found: wrong count, empty or
/// duplicate labels, or an out-of-range poll start.
pub fn validate_slots(slots: &[Slot]) -> Result<(), String> {
    if slots.len() != SLOT_COUNT {
        return Err(format!(
            "expected exactly {} slots, got {}",
            SLOT_COUNT,
            slots.len()
        ));
    }
    for (i, slot) in slots.iter().enumerate() {
        if slot.label.trim().is_empty() {
            return Err(format!("slot #{} has an empty label", i + 1));
        }
        if slot.poll_start_hour > 23 || slot.poll_start_minute > 59 {
            return Err(format!(
                "slot {} has an invalid poll start {}:{}",
                slot.label, slot.poll_start_hour, slot.poll_start_minute
            ));
        }
        if slots[..i].iter().any(|s| s.label == slot.label) {
            return Err(format!("duplicate slot label {}", slot.label));
        }
    }
    Ok(())
}

/// Finds the slot whose label occurs in `title`.
///
/// Plain substring match in slot order; the first hit wins. A label can
/// match incidentally inside unrelated text (a title quoting another time,
/// for instance), so callers should treat the result as a best guess.
#[must_use]
pub fn slot_for_title<'a>(title: &str, slots: &'a [Slot]) -> Option<&'a Slot> {
    slots.iter().find(|slot| title.contains(slot.label.as_str()))
}

/// Returns the position of `label` in `slots`.
#[must_use]
pub fn slot_index(label: &str, slots: &[Slot]) -> Option<usize> {
    slots.iter().position(|slot| slot.label == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvalidated_poll_start_saturates() {
        assert_eq!(Slot::new("x", 8, 20).poll_start_minutes(), 500);
        assert_eq!(Slot::new("x", u32::MAX, 59).poll_start_minutes(), i32::MAX);
        assert_eq!(Slot::new("x", 0, u32::MAX).poll_start_minutes(), i32::MAX);
    }

    #[test]
    fn default_slots_are_valid_and_ordered() {
        let slots = default_slots();
        assert!(validate_slots(&slots).is_ok());
        assert!(slots
            .windows(2)
            .all(|w| w[0].poll_start_minutes() < w[1].poll_start_minutes()));
    }

    #[test]
    fn poll_start_minutes_combines_hour_and_minute() {
        assert_eq!(Slot::new("08:00", 8, 20).poll_start_minutes(), 500);
    }

    #[test]
    fn validate_rejects_bad_sets() {
        let mut slots = default_slots();
        slots.pop();
        assert!(validate_slots(&slots).is_err());

        let mut slots = default_slots();
        slots[3].label = "08:00".into();
        assert!(validate_slots(&slots).unwrap_err().contains("duplicate"));

        let mut slots = default_slots();
        slots[1].label = "  ".into();
        assert!(validate_slots(&slots).is_err());

        let mut slots = default_slots();
        slots[2].poll_start_minute = 60;
        assert!(validate_slots(&slots).is_err());
    }

    #[test]
    fn slot_for_title_matches_label_substring() {
        let slots = default_slots();
        let slot = slot_for_title("Morning news 12:30 edition", &slots).unwrap();
        assert_eq!(slot.label, "12:30");
        assert!(slot_for_title("Weather update", &slots).is_none());
    }

    #[test]
    fn slot_for_title_prefers_earlier_slot_on_multiple_matches() {
        let slots = default_slots();
        let slot = slot_for_title("22:00 recap of the 08:00 bulletin", &slots).unwrap();
        assert_eq!(slot.label, "08:00");
    }

    #[test]
    fn slot_index_finds_position() {
        let slots = default_slots();
        assert_eq!(slot_index("18:00", &slots), Some(2));
        assert_eq!(slot_index("09:00", &slots), None);
    }
}
