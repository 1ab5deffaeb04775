// Geiger MQTT: Persistent Broker Settings
//
// Fixed-size record kept in flash:
//
//   u32 marker | [u8; 30] server | u16 port | [u8; 40] topic
//
// Little-endian, strings NUL-padded.  Anything without the marker is treated
// as "never configured" and sends the device into the config portal.

use thiserror::Error;

use crate::config::*;

pub const RECORD_LEN: usize = 4 + MQTT_SERVER_LENGTH + 2 + MQTT_TOPIC_LENGTH;

const SERVER_OFFSET: usize = 4;
const PORT_OFFSET: usize = SERVER_OFFSET + MQTT_SERVER_LENGTH;
const TOPIC_OFFSET: usize = PORT_OFFSET + 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("settings record has the wrong length ({found} bytes)")]
    BadLength { found: usize },
    #[error("settings record marker {0:#010x} is not valid")]
    InvalidMarker(u32),
}

/// Where telemetry goes: broker address, port and base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub server: String,
    pub port: u16,
    pub topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: DEFAULT_MQTT_PORT,
            topic: String::new(),
        }
    }
}

impl BrokerConfig {
    /// Build a config, truncating each string so it fits its record field
    /// with a terminating NUL.
    pub fn new(server: &str, port: u16, topic: &str) -> Self {
        Self {
            server: truncate_field(server, MQTT_SERVER_LENGTH),
            port,
            topic: truncate_field(topic, MQTT_TOPIC_LENGTH),
        }
    }

    /// Apply form input.  Port text that is not a valid `u16` keeps the
    /// current port.
    pub fn updated(&self, server: &str, port_text: &str, topic: &str) -> Self {
        let port = port_text.trim().parse().unwrap_or(self.port);
        Self::new(server.trim(), port, topic.trim())
    }

    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.server, self.port)
    }

    pub fn to_record(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];
        record[..SERVER_OFFSET].copy_from_slice(&SETTINGS_MARKER.to_le_bytes());
        write_field(&mut record[SERVER_OFFSET..PORT_OFFSET], &self.server);
        record[PORT_OFFSET..TOPIC_OFFSET].copy_from_slice(&self.port.to_le_bytes());
        write_field(&mut record[TOPIC_OFFSET..], &self.topic);
        record
    }

    pub fn from_record(bytes: &[u8]) -> Result<Self, SettingsError> {
        if bytes.len() != RECORD_LEN {
            return Err(SettingsError::BadLength { found: bytes.len() });
        }

        let marker = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if marker != SETTINGS_MARKER {
            return Err(SettingsError::InvalidMarker(marker));
        }

        Ok(Self {
            server: read_field(&bytes[SERVER_OFFSET..PORT_OFFSET]),
            port: u16::from_le_bytes([bytes[PORT_OFFSET], bytes[PORT_OFFSET + 1]]),
            topic: read_field(&bytes[TOPIC_OFFSET..]),
        })
    }

    /// Interpret a raw read of the settings key.  A failed read, a missing
    /// key and a malformed record all mean "not configured".
    pub fn from_stored<E: core::fmt::Display>(read: Result<Option<&[u8]>, E>) -> Option<Self> {
        let record = match read {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::info!("No broker settings stored");
                return None;
            }
            Err(e) => {
                log::warn!("Reading stored broker settings failed: {}", e);
                return None;
            }
        };

        match Self::from_record(record) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring stored broker settings: {}", e);
                None
            }
        }
    }
}

/// Persisted-settings backend.  `load` returns `Ok(None)` when nothing valid
/// has been stored yet.
pub trait SettingsStore {
    fn load(&mut self) -> anyhow::Result<Option<BrokerConfig>>;
    fn save(&mut self, config: &BrokerConfig) -> anyhow::Result<()>;
}

fn truncate_field(value: &str, field_len: usize) -> String {
    let max = field_len - 1;
    if value.len() <= max {
        return value.to_owned();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_owned()
}

fn write_field(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(field.len() - 1);
    field[..n].copy_from_slice(&bytes[..n]);
}

fn read_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_fixed() {
        let record = BrokerConfig::new("10.0.0.5", 1884, "geiger1").to_record();

        assert_eq!(RECORD_LEN, 76);
        assert_eq!(&record[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(&record[4..12], b"10.0.0.5");
        assert_eq!(record[12], 0);
        assert_eq!(&record[34..36], &1884u16.to_le_bytes());
        assert_eq!(&record[36..43], b"geiger1");
        assert!(record[43..].iter().all(|&b| b == 0));
    }

    #[test]
    fn stored_record_loads_back() {
        let config = BrokerConfig::new("broker.lan", 8883, "home/geiger");
        let loaded = BrokerConfig::from_record(&config.to_record()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn blank_flash_is_rejected() {
        let erased = [0xFFu8; RECORD_LEN];
        assert_eq!(
            BrokerConfig::from_record(&erased),
            Err(SettingsError::InvalidMarker(0xFFFF_FFFF))
        );
        assert_eq!(
            BrokerConfig::from_record(&erased[..10]),
            Err(SettingsError::BadLength { found: 10 })
        );
    }

    #[test]
    fn unreadable_or_missing_record_means_unconfigured() {
        // Oversized blob: the store refuses the read outright.
        let read: Result<Option<&[u8]>, &str> = Err("ESP_ERR_NVS_INVALID_LENGTH");
        assert_eq!(BrokerConfig::from_stored(read), None);

        assert_eq!(BrokerConfig::from_stored(Ok::<_, &str>(None)), None);

        let erased = [0xFFu8; RECORD_LEN];
        assert_eq!(BrokerConfig::from_stored(Ok::<_, &str>(Some(&erased[..]))), None);
        assert_eq!(BrokerConfig::from_stored(Ok::<_, &str>(Some(&erased[..10]))), None);
    }

    #[test]
    fn readable_record_is_used() {
        let config = BrokerConfig::new("10.0.0.5", 1883, "geiger1");
        let record = config.to_record();
        assert_eq!(
            BrokerConfig::from_stored(Ok::<_, &str>(Some(&record[..]))),
            Some(config)
        );
    }

    #[test]
    fn long_values_keep_a_terminator() {
        let server = "s".repeat(64);
        let config = BrokerConfig::new(&server, 1883, "t");
        assert_eq!(config.server.len(), MQTT_SERVER_LENGTH - 1);

        let record = config.to_record();
        assert_eq!(record[SERVER_OFFSET + MQTT_SERVER_LENGTH - 1], 0);
    }

    #[test]
    fn unparsable_port_keeps_previous() {
        let current = BrokerConfig::new("a", 1999, "b");
        let next = current.updated(" mqtt.local ", "not-a-port", "lab/geiger");
        assert_eq!(next.port, 1999);
        assert_eq!(next.server, "mqtt.local");
        assert_eq!(next.url(), "mqtt://mqtt.local:1999");

        assert_eq!(current.updated("a", "1883", "b").port, 1883);
    }

    #[test]
    fn defaults_match_unconfigured_device() {
        let config = BrokerConfig::default();
        assert!(config.server.is_empty());
        assert!(config.topic.is_empty());
        assert_eq!(config.port, DEFAULT_MQTT_PORT);
    }
}
