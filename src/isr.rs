// Geiger MQTT: GPIO Interrupt Handlers
//
// Two producers run in interrupt context:
//   - tube line, falling edge  → `PulseWindow::record_pulse`
//   - config button, any edge  → `LongPressDetector::on_edge`
//
// esp-idf-hal masks a pin's interrupt each time it fires.  Both handlers
// re-arm their own pin with `gpio_intr_enable`, which is ISR-safe, so no
// edge is lost waiting for the main loop.  Handlers touch atomics only.

use esp_idf_hal::gpio::{AnyInputPin, Input, InterruptType, PinDriver, Pull};

use geiger_mqtt::long_press::LongPressDetector;
use geiger_mqtt::window::PulseWindow;

/// Milliseconds since boot (wraps at ~49 days, fine for hold timing).
/// Safe to call from interrupt context.
pub fn now_ms() -> u32 {
    unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u32 }
}

pub fn attach_pulse_counter(
    pin: AnyInputPin,
    window: &'static PulseWindow,
) -> anyhow::Result<PinDriver<'static, AnyInputPin, Input>> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Floating)?;
    driver.set_interrupt_type(InterruptType::NegEdge)?;

    let gpio = driver.pin();
    // SAFETY: the callback runs in ISR context; it only performs atomic
    // stores and re-enables its own GPIO interrupt.
    unsafe {
        driver.subscribe(move || {
            window.record_pulse();
            esp_idf_sys::gpio_intr_enable(gpio);
        })?;
    }
    driver.enable_interrupt()?;

    log::info!("Pulse counter attached to GPIO{}", gpio);
    Ok(driver)
}

pub fn attach_config_button(
    pin: AnyInputPin,
    button: &'static LongPressDetector,
) -> anyhow::Result<PinDriver<'static, AnyInputPin, Input>> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Up)?;
    driver.set_interrupt_type(InterruptType::AnyEdge)?;

    let gpio = driver.pin();
    // SAFETY: as above; `gpio_get_level` and `esp_timer_get_time` are both
    // callable from ISR context.
    unsafe {
        driver.subscribe(move || {
            // Active LOW: a low line means the button is held.
            let pressed = esp_idf_sys::gpio_get_level(gpio) == 0;
            button.on_edge(pressed, now_ms());
            esp_idf_sys::gpio_intr_enable(gpio);
        })?;
    }
    driver.enable_interrupt()?;

    log::info!("Config button attached to GPIO{}", gpio);
    Ok(driver)
}
