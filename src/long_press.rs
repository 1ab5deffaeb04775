// Geiger MQTT: Config Button Long-Press Detector
//
// Two-state machine (Idle / Pressed) driven from the button's any-edge
// interrupt.  A release more than `threshold_ms` after the press raises the
// long-press flag; the main loop consumes it once per iteration.  There is no
// debounce beyond the hold threshold, so a short press does nothing.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub struct LongPressDetector {
    threshold_ms: u32,
    // Idle = false, Pressed = true
    pressed: AtomicBool,
    press_ms: AtomicU32,
    long_press: AtomicBool,
}

impl LongPressDetector {
    pub const fn new(threshold_ms: u32) -> Self {
        Self {
            threshold_ms,
            pressed: AtomicBool::new(false),
            press_ms: AtomicU32::new(0),
            long_press: AtomicBool::new(false),
        }
    }

    /// Interrupt-context entry point.  `pressed` is the line level read in
    /// the handler (active LOW → `true` when the line reads low); `now_ms`
    /// is milliseconds since boot and may wrap.
    #[inline]
    pub fn on_edge(&self, pressed: bool, now_ms: u32) {
        if pressed {
            self.press_ms.store(now_ms, Ordering::Relaxed);
            self.long_press.store(false, Ordering::Relaxed);
            self.pressed.store(true, Ordering::Release);
        } else if self.pressed.swap(false, Ordering::AcqRel) {
            let held = now_ms.wrapping_sub(self.press_ms.load(Ordering::Relaxed));
            if held > self.threshold_ms {
                self.long_press.store(true, Ordering::Release);
            }
        }
    }

    /// Consume a pending long press.  Returns `true` at most once per press.
    pub fn take(&self) -> bool {
        self.long_press.swap(false, Ordering::AcqRel)
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u32 = 1000;

    #[test]
    fn long_press_sets_flag_exactly_once() {
        let btn = LongPressDetector::new(THRESHOLD);
        btn.on_edge(true, 5_000);
        assert!(btn.is_pressed());
        btn.on_edge(false, 6_200);

        assert!(!btn.is_pressed());
        assert!(btn.take());
        assert!(!btn.take());
    }

    #[test]
    fn short_press_never_sets_flag() {
        let btn = LongPressDetector::new(THRESHOLD);
        btn.on_edge(true, 100);
        btn.on_edge(false, 900);
        assert!(!btn.take());

        // Exactly at the threshold is still short.
        btn.on_edge(true, 2_000);
        btn.on_edge(false, 3_000);
        assert!(!btn.take());
    }

    #[test]
    fn release_without_press_is_ignored() {
        let btn = LongPressDetector::new(THRESHOLD);
        btn.on_edge(false, 60_000);
        assert!(!btn.take());

        // A second release after a completed long press does not re-trigger.
        btn.on_edge(true, 61_000);
        btn.on_edge(false, 62_500);
        btn.on_edge(false, 64_000);
        assert!(btn.take());
        assert!(!btn.take());
    }

    #[test]
    fn new_press_clears_unconsumed_flag() {
        let btn = LongPressDetector::new(THRESHOLD);
        btn.on_edge(true, 0);
        btn.on_edge(false, 1_500);
        btn.on_edge(true, 1_600);
        assert!(!btn.take());
    }

    #[test]
    fn hold_across_millis_wraparound() {
        let btn = LongPressDetector::new(THRESHOLD);
        btn.on_edge(true, u32::MAX - 200);
        btn.on_edge(false, 1_000);
        assert!(btn.take());
    }
}
