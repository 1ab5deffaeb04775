// Geiger MQTT: Firmware Entry Point
//
// Boot sequence:
//   1. Bring up the LCD (cleared) and silence the piezo.
//   2. Load broker settings from NVS; without valid ones, open the portal.
//   3. Join the stored network, falling back to the portal on timeout.
//   4. Create the MQTT session and attach the pulse and button interrupts.
//   5. Run the main loop: one `Geiger::poll` per FreeRTOS tick.
//
// A long press on the config button reopens the portal.  Any failure while
// provisioning leaves a diagnostic on screen and restarts the device.

#[cfg(target_os = "espidf")]
mod drivers;
#[cfg(target_os = "espidf")]
mod isr;
#[cfg(target_os = "espidf")]
mod net;
#[cfg(target_os = "espidf")]
mod storage;

#[cfg(target_os = "espidf")]
use std::{thread, time::Duration, time::Instant};

#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::FreeRtos;
#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::{InputPin, OutputPin, Pin, PinDriver};
#[cfg(target_os = "espidf")]
use esp_idf_hal::prelude::*;
#[cfg(target_os = "espidf")]
use esp_idf_svc::eventloop::EspSystemEventLoop;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use geiger_mqtt::config::*;
use geiger_mqtt::long_press::LongPressDetector;
use geiger_mqtt::window::PulseWindow;
#[cfg(target_os = "espidf")]
use geiger_mqtt::{
    app::{Beeper, Geiger},
    display::{CountDisplay, Screen},
    events::LoopAction,
    provision::{enter_config_mode, ProvisionMode},
    settings::{BrokerConfig, SettingsStore},
    telemetry::{self, Publisher},
};

#[cfg(target_os = "espidf")]
use crate::drivers::{beeper::PiezoBeeper, pcd8544::Pcd8544};
#[cfg(target_os = "espidf")]
use crate::net::{mqtt::MqttTransport, wifi::Network};
#[cfg(target_os = "espidf")]
use crate::storage::NvsSettings;

// ---------------------------------------------------------------------------
// Interrupt-shared state
// ---------------------------------------------------------------------------
static PULSES: PulseWindow = PulseWindow::new();
static CONFIG_BUTTON: LongPressDetector = LongPressDetector::new(LONG_PRESS_MS);

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("Geiger MQTT firmware starting…");

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let pins = peripherals.pins;

    let lcd_sclk = pins.gpio8.downgrade_output();
    let lcd_mosi = pins.gpio10.downgrade_output();
    let lcd_cs = pins.gpio20.downgrade_output();
    let lcd_dc = pins.gpio4.downgrade_output();
    let lcd_rst = pins.gpio21.downgrade_output();
    let piezo_pin = pins.gpio2.downgrade_output();
    let tube_pin = pins.gpio3.downgrade_input();
    let button_pin = pins.gpio5.downgrade_input();
    check_wiring(&[
        ("LCD SCLK", lcd_sclk.pin(), PIN_LCD_SCLK),
        ("LCD MOSI", lcd_mosi.pin(), PIN_LCD_MOSI),
        ("LCD CS", lcd_cs.pin(), PIN_LCD_CS),
        ("LCD DC", lcd_dc.pin(), PIN_LCD_DC),
        ("LCD RST", lcd_rst.pin(), PIN_LCD_RST),
        ("Piezo", piezo_pin.pin(), PIN_PIEZO),
        ("Geiger tube", tube_pin.pin(), PIN_GEIGER),
        ("Config button", button_pin.pin(), PIN_CONFIG_BUTTON),
    ])?;

    // ---- Display and piezo ------------------------------------------------
    let mut lcd = Pcd8544::new(peripherals.spi2, lcd_sclk, lcd_mosi, lcd_cs, lcd_dc, lcd_rst)?;
    lcd.init()?;
    let mut screen = Screen::new(lcd);
    screen.clear();

    let mut piezo = PiezoBeeper::new(PinDriver::output(piezo_pin)?);
    piezo.off();

    // ---- Settings and network ---------------------------------------------
    let mut store = NvsSettings::new(nvs.clone())?;
    let mut network = Network::new(peripherals.modem, sysloop, nvs)?;

    let stored = store.load().unwrap_or_else(|e| {
        log::warn!("Loading broker settings failed: {:?}", e);
        None
    });
    let mut broker = match stored {
        Some(stored) => stored,
        None => configure(
            &mut network,
            &mut store,
            &mut screen,
            ProvisionMode::Portal,
            &BrokerConfig::default(),
        ),
    };
    log::info!(
        "MQTT server {}, port {}, topic {}",
        broker.server,
        broker.port,
        broker.topic
    );

    broker = configure(
        &mut network,
        &mut store,
        &mut screen,
        ProvisionMode::AutoConnect,
        &broker,
    );

    let client_id = telemetry::client_id(network.mac()?);
    log::info!("MQTT client id {}", client_id);
    let transport = MqttTransport::new(&broker);
    let publisher = Publisher::new(transport, &broker.topic, client_id.clone());

    // ---- Interrupts -------------------------------------------------------
    // Drivers stay bound for the life of the firmware; dropping them would
    // unsubscribe the handlers.
    let _tube = isr::attach_pulse_counter(tube_pin, &PULSES)?;
    let _button = isr::attach_config_button(button_pin, &CONFIG_BUTTON)?;

    // ---- Main loop --------------------------------------------------------
    let now = Instant::now();
    let mut geiger = Geiger::new(&PULSES, &CONFIG_BUTTON, screen, publisher, piezo, now);
    geiger.start(now);
    log::info!("Boot complete, counting");

    loop {
        if geiger.poll(Instant::now()) == LoopAction::EnterConfig {
            log::info!("Long press detected");
            broker = configure(
                &mut network,
                &mut store,
                geiger.display_mut(),
                ProvisionMode::Portal,
                &broker,
            );
            geiger.replace_publisher(Publisher::new(
                MqttTransport::new(&broker),
                &broker.topic,
                client_id.clone(),
            ));
        }
        // FreeRtos::delay_ms yields for whole ticks; std sleeps shorter than a
        // tick busy-wait.
        FreeRtos::delay_ms(MAIN_LOOP_INTERVAL_MS);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    // Host builds exist for `cargo test --lib`; the statics keep their types
    // checked here.
    let _ = (&PULSES, &CONFIG_BUTTON);
    eprintln!("geiger-mqtt only runs on ESP-IDF targets");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Configuration mode, restarting the device if it fails.
#[cfg(target_os = "espidf")]
fn configure(
    network: &mut Network,
    store: &mut NvsSettings,
    display: &mut impl CountDisplay,
    mode: ProvisionMode,
    current: &BrokerConfig,
) -> BrokerConfig {
    match enter_config_mode(network, store, display, mode, current) {
        Ok(broker) => broker,
        Err(_) => restart(),
    }
}

/// Give the diagnostic on screen time to be read, then reboot.
#[cfg(target_os = "espidf")]
fn restart() -> ! {
    log::warn!("Restarting in {} ms", RESTART_DELAY_MS);
    thread::sleep(Duration::from_millis(RESTART_DELAY_MS));
    esp_idf_hal::reset::restart()
}
