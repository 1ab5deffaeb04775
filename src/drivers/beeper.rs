// Geiger MQTT: Piezo Driver
//
// Simple GPIO-driven piezo.  The chirp length is paced by the chirp-off task,
// so nothing here blocks.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use geiger_mqtt::app::Beeper;

pub struct PiezoBeeper<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> PiezoBeeper<'d> {
    pub fn new(pin: PinDriver<'d, AnyOutputPin, Output>) -> Self {
        Self { pin }
    }
}

impl Beeper for PiezoBeeper<'_> {
    fn on(&mut self) {
        let _ = self.pin.set_high();
    }

    fn off(&mut self) {
        let _ = self.pin.set_low();
    }
}
