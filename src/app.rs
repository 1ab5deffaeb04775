// Geiger MQTT: Foreground Loop
//
// Everything the main loop owns: the aggregator, the presentation sink, the
// telemetry publisher and the piezo, plus the task table that paces them.
// `Geiger::poll` is one main-loop iteration; the binary calls it forever.

use core::ops::ControlFlow;
use std::time::{Duration, Instant};

use crate::aggregator::Aggregator;
use crate::config::{CHIRP_MS, CONFIG_REPUBLISH_MS, SLOT_INTERVAL_MS};
use crate::display::CountDisplay;
use crate::events::LoopAction;
use crate::long_press::LongPressDetector;
use crate::scheduler::{PeriodicTask, Scheduler, TaskId};
use crate::telemetry::{Publisher, Transport};
use crate::window::PulseWindow;

/// Acoustic pulse feedback.  Both calls must be idempotent.
pub trait Beeper {
    fn on(&mut self);
    fn off(&mut self);
}

/// Task context: what the periodic callbacks operate on.
pub struct Devices<'w, D, T, B> {
    pub aggregator: Aggregator<'w>,
    pub display: D,
    pub publisher: Publisher<T>,
    pub beeper: B,
}

impl<'w, D: CountDisplay, T: Transport, B: Beeper> Devices<'w, D, T, B> {
    /// Counts task: rotate the window, show the snapshot, publish the slot
    /// that just closed.
    pub fn process_counts(&mut self) -> ControlFlow<()> {
        let tick = self.aggregator.tick();
        let s = tick.snapshot;

        self.display.render(s.current, s.min, s.max);
        self.publisher
            .publish_reading(tick.interval_count, &mut self.display);

        log::info!(
            "Count {}, Idx {}, Max {}, Min {}, Cur {}",
            s.current,
            tick.vacated_slot,
            s.max,
            s.min,
            tick.interval_count
        );
        ControlFlow::Continue(())
    }

    /// Chirp-off task: silence the piezo and stop until the next pulse.
    pub fn chirp_off(&mut self) -> ControlFlow<()> {
        self.beeper.off();
        ControlFlow::Break(())
    }

    /// Config-republish task.
    pub fn publish_config(&mut self) -> ControlFlow<()> {
        self.publisher.publish_descriptor(&mut self.display);
        ControlFlow::Continue(())
    }
}

pub struct Geiger<'w, D, T, B> {
    devices: Devices<'w, D, T, B>,
    scheduler: Scheduler<Devices<'w, D, T, B>>,
    long_press: &'w LongPressDetector,
}

impl<'w, D: CountDisplay, T: Transport, B: Beeper> Geiger<'w, D, T, B> {
    pub fn new(
        window: &'w PulseWindow,
        long_press: &'w LongPressDetector,
        display: D,
        publisher: Publisher<T>,
        mut beeper: B,
        now: Instant,
    ) -> Self {
        beeper.off();

        let scheduler = Scheduler::new(
            PeriodicTask::new(
                Devices::process_counts,
                Duration::from_millis(SLOT_INTERVAL_MS),
                now,
            ),
            PeriodicTask::new(Devices::chirp_off, Duration::from_millis(CHIRP_MS), now),
            PeriodicTask::new(
                Devices::publish_config,
                Duration::from_millis(CONFIG_REPUBLISH_MS),
                now,
            ),
        );

        Self {
            devices: Devices {
                aggregator: Aggregator::new(window),
                display,
                publisher,
                beeper,
            },
            scheduler,
            long_press,
        }
    }

    /// Start the two free-running tasks.  The chirp task starts on demand.
    pub fn start(&mut self, now: Instant) {
        self.scheduler.start(TaskId::Counts, now);
        self.scheduler.start(TaskId::ConfigRepublish, now);
    }

    /// One main-loop iteration.
    pub fn poll(&mut self, now: Instant) -> LoopAction {
        if self.long_press.take() {
            return LoopAction::EnterConfig;
        }

        self.scheduler.update(now, &mut self.devices);

        if self.devices.aggregator.window().take_chirp() {
            self.devices.beeper.on();
            self.scheduler.start(TaskId::ChirpOff, now);
        }

        LoopAction::Continue
    }

    /// Swap in a publisher for new broker settings.
    pub fn replace_publisher(&mut self, publisher: Publisher<T>) {
        self.devices.publisher = publisher;
    }

    pub fn devices(&self) -> &Devices<'w, D, T, B> {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut Devices<'w, D, T, B> {
        &mut self.devices
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.devices.display
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.scheduler.is_running(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LONG_PRESS_MS;
    use crate::events::MIN_UNSET;
    use crate::telemetry::TransportError;

    #[derive(Default)]
    struct Lcd {
        renders: Vec<(u16, u16, u16)>,
        messages: Vec<String>,
    }

    impl CountDisplay for Lcd {
        fn render(&mut self, current: u16, min: u16, max: u16) {
            self.renders.push((current, min, max));
        }
        fn show_message(&mut self, message: &str) {
            self.messages.push(message.to_owned());
        }
        fn show_config(&mut self) {}
        fn clear(&mut self) {}
    }

    #[derive(Default)]
    struct Broker {
        up: bool,
        sent: Vec<(String, String)>,
    }

    impl Transport for Broker {
        fn is_connected(&self) -> bool {
            self.up
        }
        fn connect(&mut self, _client_id: &str) -> Result<(), TransportError> {
            Err(TransportError::ConnectFailed { code: -2 })
        }
        fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            _retain: bool,
        ) -> Result<(), TransportError> {
            self.sent
                .push((topic.to_owned(), String::from_utf8_lossy(payload).into_owned()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Piezo {
        on: bool,
        offs: usize,
    }

    impl Beeper for Piezo {
        fn on(&mut self) {
            self.on = true;
        }
        fn off(&mut self) {
            self.on = false;
            self.offs += 1;
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn geiger<'w>(
        window: &'w PulseWindow,
        button: &'w LongPressDetector,
        up: bool,
        t0: Instant,
    ) -> Geiger<'w, Lcd, Broker, Piezo> {
        let broker = Broker {
            up,
            ..Default::default()
        };
        let publisher = Publisher::new(broker, "geiger1", "geigercounter-000001".into());
        let mut g = Geiger::new(window, button, Lcd::default(), publisher, Piezo::default(), t0);
        g.start(t0);
        g
    }

    #[test]
    fn pulse_chirps_for_one_hundred_ms() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        window.record_pulse();
        assert_eq!(g.poll(t0 + ms(1)), LoopAction::Continue);
        assert!(g.devices().beeper.on);
        assert!(g.is_running(TaskId::ChirpOff));

        g.poll(t0 + ms(50));
        assert!(g.devices().beeper.on);

        g.poll(t0 + ms(101));
        assert!(!g.devices().beeper.on);
        assert!(!g.is_running(TaskId::ChirpOff));
    }

    #[test]
    fn pulse_during_chirp_extends_it() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        window.record_pulse();
        g.poll(t0);
        window.record_pulse();
        g.poll(t0 + ms(80));
        g.poll(t0 + ms(120));
        assert!(g.devices().beeper.on);
        g.poll(t0 + ms(180));
        assert!(!g.devices().beeper.on);
    }

    #[test]
    fn chirp_off_twice_stays_off() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        assert!(g.devices_mut().chirp_off().is_break());
        assert!(g.devices_mut().chirp_off().is_break());
        assert!(!g.devices().beeper.on);
        // One from boot, two from the calls above.
        assert_eq!(g.devices().beeper.offs, 3);
    }

    #[test]
    fn counts_tick_renders_and_publishes_closed_slot() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        for _ in 0..4 {
            window.record_pulse();
        }
        g.poll(t0 + ms(9_999));
        assert!(g.devices().display.renders.is_empty());

        g.poll(t0 + ms(10_000));
        assert_eq!(g.devices().display.renders, [(4, MIN_UNSET, 4)]);
        assert_eq!(
            g.devices().publisher.transport().sent,
            [("geiger1/state".to_string(), r#"{"count":4}"#.to_string())]
        );

        // Second slot: rolling total keeps the first slot, telemetry does not.
        window.record_pulse();
        g.poll(t0 + ms(20_000));
        assert_eq!(g.devices().display.renders[1], (5, MIN_UNSET, 5));
        assert_eq!(g.devices().publisher.transport().sent[1].1, r#"{"count":1}"#);
    }

    #[test]
    fn offline_broker_does_not_stall_aggregation() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, false, t0);

        window.record_pulse();
        g.poll(t0 + ms(10_000));
        g.poll(t0 + ms(20_000));

        let lcd = &g.devices().display;
        assert_eq!(lcd.renders.len(), 2);
        assert_eq!(lcd.messages.len(), 2);
        assert!(lcd.messages[0].starts_with("MQTT Connection failed"));
    }

    #[test]
    fn descriptor_republished_hourly() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        g.poll(t0 + ms(3_600_000));
        let sent = &g.devices().publisher.transport().sent;
        assert!(sent.iter().any(|(topic, _)| topic == "geiger1/config"));
    }

    #[test]
    fn long_press_requests_config_once() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        button.on_edge(true, 100);
        button.on_edge(false, 1_300);
        assert_eq!(g.poll(t0), LoopAction::EnterConfig);
        assert_eq!(g.poll(t0), LoopAction::Continue);
    }

    #[test]
    fn replaced_publisher_uses_new_topic() {
        let window = PulseWindow::new();
        let button = LongPressDetector::new(LONG_PRESS_MS);
        let t0 = Instant::now();
        let mut g = geiger(&window, &button, true, t0);

        let broker = Broker {
            up: true,
            ..Default::default()
        };
        g.replace_publisher(Publisher::new(broker, "lab/geiger", "geigercounter-000001".into()));
        g.poll(t0 + ms(10_000));
        assert_eq!(g.devices().publisher.transport().sent[0].0, "lab/geiger/state");
    }
}
