// Geiger MQTT: Windowed Aggregator
//
// Rotates the pulse window once per counts tick and keeps the running
// min/max over the device's uptime.  Lives entirely on the main loop; the
// only state it shares with the interrupt side is the `PulseWindow`.

use crate::config::SLOT_COUNT;
use crate::events::{Snapshot, Tick};
use crate::window::PulseWindow;

pub struct Aggregator<'w> {
    window: &'w PulseWindow,
    /// Set once the slot index has wrapped back to 0.  Never cleared.
    window_full: bool,
    stats: Snapshot,
}

impl<'w> Aggregator<'w> {
    pub fn new(window: &'w PulseWindow) -> Self {
        Self {
            window,
            window_full: false,
            stats: Snapshot::default(),
        }
    }

    pub fn window(&self) -> &'w PulseWindow {
        self.window
    }

    pub fn window_full(&self) -> bool {
        self.window_full
    }

    pub fn stats(&self) -> Snapshot {
        self.stats
    }

    /// One aggregation step.  Cannot fail.
    ///
    /// The total is taken before the newly active slot is zeroed: at that
    /// point it still holds the oldest completed interval, so the sum covers
    /// exactly the last six completed slots.
    pub fn tick(&mut self) -> Tick {
        let (vacated, active) = self.window.advance();
        if active == 0 {
            self.window_full = true;
        }

        let total = self.window.total();
        self.stats.current = total;

        // A partial window would report an artificially low minimum.
        if self.window_full && total < self.stats.min {
            self.stats.min = total;
        }
        if total > self.stats.max {
            self.stats.max = total;
        }

        self.window.reset_slot(active);

        debug_assert!(vacated < SLOT_COUNT);
        Tick {
            snapshot: self.stats,
            vacated_slot: vacated,
            interval_count: self.window.slot(vacated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MIN_UNSET;

    #[test]
    fn partial_window_total_leaves_min_unset() {
        let window = PulseWindow::with_slots([5, 3, 8, 2, 0, 0]);
        let mut agg = Aggregator::new(&window);

        let tick = agg.tick();
        assert_eq!(tick.snapshot.current, 18);
        assert_eq!(tick.snapshot.min, MIN_UNSET);
        assert_eq!(tick.snapshot.max, 18);
        assert!(!agg.window_full());

        // Slot 1 became active and was cleared; slot 0 kept its count.
        assert_eq!(window.active_slot(), 1);
        assert_eq!(window.slot(1), 0);
        assert_eq!(tick.vacated_slot, 0);
        assert_eq!(tick.interval_count, 5);
    }

    #[test]
    fn six_ticks_return_to_start_and_fill_window() {
        let window = PulseWindow::new();
        let mut agg = Aggregator::new(&window);

        for n in 1..SLOT_COUNT {
            agg.tick();
            assert_eq!(window.active_slot(), n);
            assert!(!agg.window_full());
        }
        agg.tick();
        assert_eq!(window.active_slot(), 0);
        assert!(agg.window_full());

        for _ in 0..SLOT_COUNT + 2 {
            agg.tick();
            assert!(agg.window_full());
        }
    }

    #[test]
    fn min_only_tracks_after_full_window() {
        let window = PulseWindow::new();
        let mut agg = Aggregator::new(&window);

        // Five ticks with pulses: never touches min, max grows from the first tick.
        for _ in 0..SLOT_COUNT - 1 {
            window.record_pulse();
            let tick = agg.tick();
            assert_eq!(tick.snapshot.min, MIN_UNSET);
            assert!(tick.snapshot.max >= 1);
        }

        // Sixth tick wraps the index: min now eligible.
        window.record_pulse();
        let tick = agg.tick();
        assert_eq!(tick.snapshot.current, 6);
        assert_eq!(tick.snapshot.min, 6);
        assert_eq!(tick.snapshot.max, 6);

        // Quiet interval: the oldest slot is gone, total drops and min tightens.
        let tick = agg.tick();
        assert_eq!(tick.snapshot.current, 5);
        assert_eq!(tick.snapshot.min, 5);
        assert_eq!(tick.snapshot.max, 6);
    }

    #[test]
    fn full_window_total_counts_every_pulse_once() {
        let window = PulseWindow::new();
        let mut agg = Aggregator::new(&window);
        let per_slot = [7u16, 0, 13, 2, 9, 4];
        let expected: u16 = per_slot.iter().sum();

        let mut last = None;
        for count in per_slot {
            for _ in 0..count {
                window.record_pulse();
            }
            last = Some(agg.tick());
        }

        let tick = last.unwrap();
        assert_eq!(tick.snapshot.current, expected);
        assert_eq!(tick.interval_count, 4);
    }

    #[test]
    fn interval_reading_is_the_vacated_slot_not_the_total() {
        let window = PulseWindow::new();
        let mut agg = Aggregator::new(&window);

        for _ in 0..3 {
            window.record_pulse();
        }
        agg.tick();
        for _ in 0..2 {
            window.record_pulse();
        }
        let tick = agg.tick();

        assert_eq!(tick.vacated_slot, 1);
        assert_eq!(tick.interval_count, 2);
        assert_eq!(tick.snapshot.current, 5);
    }

    #[test]
    fn max_never_decreases() {
        let window = PulseWindow::new();
        let mut agg = Aggregator::new(&window);

        for _ in 0..10 {
            window.record_pulse();
        }
        assert_eq!(agg.tick().snapshot.max, 10);
        for _ in 0..SLOT_COUNT {
            assert_eq!(agg.tick().snapshot.max, 10);
        }
        assert_eq!(agg.stats().current, 0);
    }
}
