// Geiger MQTT: Pulse Window
//
// Six 10-second slots forming the rolling one-minute window, plus the
// chirp request flag.  Shared between the tube interrupt (producer) and the
// main loop (aggregator), so every field is a single atomic word and no lock
// is taken on either side.
//
// Race window: the aggregator advances `active` and then zeroes the newly
// active slot.  A pulse landing between those two stores is counted into the
// new slot and then wiped, and a pulse that read the old index just before
// the advance lands in the slot being frozen.  Both are rare, bounded to a
// single pulse per tick, and accepted.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

use crate::config::SLOT_COUNT;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicU16 = AtomicU16::new(0);

pub struct PulseWindow {
    slots: [AtomicU16; SLOT_COUNT],
    active: AtomicU8,
    chirp: AtomicBool,
}

impl PulseWindow {
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; SLOT_COUNT],
            active: AtomicU8::new(0),
            chirp: AtomicBool::new(false),
        }
    }

    /// Interrupt-context entry point: one detected tube pulse.
    ///
    /// Touches only the active slot and the chirp flag.  No logging, no
    /// allocation, no blocking.
    #[inline]
    pub fn record_pulse(&self) {
        let idx = self.active.load(Ordering::Acquire) as usize;
        self.slots[idx % SLOT_COUNT].fetch_add(1, Ordering::Relaxed);
        self.chirp.store(true, Ordering::Release);
    }

    /// Consume a pending chirp request.  Returns `true` at most once per set.
    pub fn take_chirp(&self) -> bool {
        self.chirp.swap(false, Ordering::AcqRel)
    }

    pub fn active_slot(&self) -> usize {
        self.active.load(Ordering::Acquire) as usize
    }

    pub fn slot(&self, idx: usize) -> u16 {
        self.slots[idx].load(Ordering::Relaxed)
    }

    /// Sum of all six slots, saturated to the 16-bit range of the display
    /// and telemetry contracts.
    pub fn total(&self) -> u16 {
        let sum: u32 = self
            .slots
            .iter()
            .map(|s| u32::from(s.load(Ordering::Relaxed)))
            .sum();
        sum.min(u32::from(u16::MAX)) as u16
    }

    /// Advance the active slot (mod 6).  Returns `(vacated, now_active)`.
    ///
    /// Main-loop only; the producer never moves the index.
    pub(crate) fn advance(&self) -> (usize, usize) {
        let vacated = self.active_slot();
        let next = (vacated + 1) % SLOT_COUNT;
        self.active.store(next as u8, Ordering::Release);
        (vacated, next)
    }

    /// Zero a slot so it can start accumulating the next interval.
    pub(crate) fn reset_slot(&self, idx: usize) {
        self.slots[idx].store(0, Ordering::Relaxed);
    }
}

impl Default for PulseWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl PulseWindow {
    pub(crate) fn with_slots(counts: [u16; SLOT_COUNT]) -> Self {
        let window = Self::new();
        for (slot, count) in window.slots.iter().zip(counts) {
            slot.store(count, Ordering::Relaxed);
        }
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulses_land_in_active_slot_only() {
        let window = PulseWindow::new();
        for _ in 0..4 {
            window.record_pulse();
        }
        assert_eq!(window.slot(0), 4);
        assert!((1..SLOT_COUNT).all(|i| window.slot(i) == 0));

        window.advance();
        window.record_pulse();
        assert_eq!(window.slot(0), 4);
        assert_eq!(window.slot(1), 1);
        assert_eq!(window.total(), 5);
    }

    #[test]
    fn chirp_request_is_consumed_once() {
        let window = PulseWindow::new();
        assert!(!window.take_chirp());

        window.record_pulse();
        window.record_pulse();
        assert!(window.take_chirp());
        assert!(!window.take_chirp());
    }

    #[test]
    fn advance_wraps_modulo_slot_count() {
        let window = PulseWindow::new();
        let mut last = (0, 0);
        for _ in 0..SLOT_COUNT {
            last = window.advance();
        }
        assert_eq!(last, (SLOT_COUNT - 1, 0));
        assert_eq!(window.active_slot(), 0);
    }

    #[test]
    fn total_saturates_at_u16_max() {
        let window = PulseWindow::with_slots([u16::MAX, u16::MAX, 1, 0, 0, 0]);
        assert_eq!(window.total(), u16::MAX);
    }
}
