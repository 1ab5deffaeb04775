// Geiger MQTT: Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_GEIGER: i32 = 3;        // D1     Tube pulse output (falling edge per event)
pub const PIN_PIEZO: i32 = 2;         // D0     Piezo chirp driver
pub const PIN_CONFIG_BUTTON: i32 = 5; // D3     Config button (active LOW, external pull-up)
pub const PIN_LCD_DC: i32 = 4;        // D2     PCD8544 data/command select
pub const PIN_LCD_CS: i32 = 20;       // D7     PCD8544 chip select
pub const PIN_LCD_RST: i32 = 21;      // D6     PCD8544 reset
pub const PIN_LCD_SCLK: i32 = 8;      // D8     SPI clock
pub const PIN_LCD_MOSI: i32 = 10;     // D10    SPI data out

// ---------------------------------------------------------------------------
// Display (PCD8544 / Nokia 5110 LCD)
// ---------------------------------------------------------------------------
pub const SCREEN_WIDTH: u32 = 84;
pub const SCREEN_HEIGHT: u32 = 48;
pub const DISPLAY_BUFFER_SIZE: usize = (SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize) / 8; // 504
pub const LCD_CONTRAST: u8 = 60;
pub const LCD_SPI_BAUDRATE_HZ: u32 = 4_000_000;

// ---------------------------------------------------------------------------
// Counting Window
// ---------------------------------------------------------------------------
pub const SLOT_COUNT: usize = 6;                       // 6 × 10 s = 60 s window
pub const SLOT_INTERVAL_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const CHIRP_MS: u64 = 100;
pub const CONFIG_REPUBLISH_MS: u64 = 3_600_000;        // hourly discovery payload
pub const LONG_PRESS_MS: u32 = 1000;                   // hold longer than this → config mode
pub const FREERTOS_TICK_MS: u32 = 10;                  // CONFIG_FREERTOS_HZ=100 (sdkconfig)
pub const MAIN_LOOP_INTERVAL_MS: u32 = 10;             // sub-tick delays busy-wait and starve IDLE
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 30_000;
pub const MQTT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const RESTART_DELAY_MS: u64 = 5_000;
pub const CONFIG_PORTAL_TIMEOUT_MS: u64 = 300_000;     // portal gives up after 5 min

const _: () = assert!(MAIN_LOOP_INTERVAL_MS >= FREERTOS_TICK_MS);

// ---------------------------------------------------------------------------
// Network / MQTT
// ---------------------------------------------------------------------------
pub const HOSTNAME: &str = "geigermqtt";
pub const PORTAL_SSID_PREFIX: &str = "GeigerMQTT";
pub const CLIENT_ID_PREFIX: &str = "geigercounter";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const MQTT_SERVER_LENGTH: usize = 30;
pub const MQTT_TOPIC_LENGTH: usize = 40;
pub const DEVICE_NAME: &str = "GeigerCounter";
pub const UNIT_OF_MEASUREMENT: &str = "Count";

// ---------------------------------------------------------------------------
// Persistent Settings (NVS)
// ---------------------------------------------------------------------------
pub const SETTINGS_MARKER: u32 = 0xDEAD_BEEF;
pub const NVS_NAMESPACE: &str = "geiger";
pub const NVS_SETTINGS_KEY: &str = "mqtt";

// ---------------------------------------------------------------------------
// Wiring check
// ---------------------------------------------------------------------------

/// Compare the GPIO each driver actually received against the table above.
/// Entries are `(name, wired, expected)`.
pub fn check_wiring(wiring: &[(&str, i32, i32)]) -> anyhow::Result<()> {
    for &(name, wired, expected) in wiring {
        if wired != expected {
            anyhow::bail!("{} is wired to GPIO{}, config.rs says GPIO{}", name, wired, expected);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_loop_sleep_covers_a_full_tick() {
        assert!(MAIN_LOOP_INTERVAL_MS >= FREERTOS_TICK_MS);
        assert_eq!(MAIN_LOOP_INTERVAL_MS % FREERTOS_TICK_MS, 0);
    }

    #[test]
    fn matching_wiring_passes() {
        assert!(check_wiring(&[("tube", 3, PIN_GEIGER), ("piezo", 2, PIN_PIEZO)]).is_ok());
        assert!(check_wiring(&[]).is_ok());
    }

    #[test]
    fn moved_pin_is_reported() {
        let err = check_wiring(&[("tube", 3, PIN_GEIGER), ("LCD DC", 7, PIN_LCD_DC)])
            .unwrap_err()
            .to_string();
        assert_eq!(err, "LCD DC is wired to GPIO7, config.rs says GPIO4");
    }
}
