// Geiger MQTT: Telemetry Publisher
//
// Pushes discrete-interval readings to `{topic}/state` and the discovery
// descriptor to `{topic}/config` (retained).  A dropped session gets exactly
// one reconnect attempt per publish; every failure is logged and shown on
// the display, and nothing is retried until the next scheduled publish.

use serde::Serialize;
use thiserror::Error;

use crate::config::{CLIENT_ID_PREFIX, DEVICE_NAME, UNIT_OF_MEASUREMENT};
use crate::display::CountDisplay;

const VALUE_TEMPLATE: &str = "{{ value_json.count}}";

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StatePayload {
    count: u16,
}

/// Home-automation discovery descriptor.
#[derive(Debug, Serialize)]
struct Discovery<'a> {
    name: &'a str,
    state_topic: &'a str,
    unit_of_measurement: &'a str,
    value_template: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub config: String,
    pub state: String,
}

impl Topics {
    pub fn new(base: &str) -> Self {
        Self {
            config: format!("{}/config", base),
            state: format!("{}/state", base),
        }
    }
}

pub fn state_payload(count: u16) -> String {
    // A struct of one integer field cannot fail to serialize.
    serde_json::to_string(&StatePayload { count }).unwrap_or_default()
}

pub fn discovery_payload(topics: &Topics) -> String {
    serde_json::to_string(&Discovery {
        name: DEVICE_NAME,
        state_topic: &topics.state,
        unit_of_measurement: UNIT_OF_MEASUREMENT,
        value_template: VALUE_TEMPLATE,
    })
    .unwrap_or_default()
}

/// `geigercounter-xxxxxx` from the last three octets of the station MAC.
pub fn client_id(mac: [u8; 6]) -> String {
    format!(
        "{}-{:02x}{:02x}{:02x}",
        CLIENT_ID_PREFIX, mac[3], mac[4], mac[5]
    )
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Error text doubles as the on-screen diagnostic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("MQTT not connected")]
    NotConnected,
    #[error("MQTT Connection failed, rc={code}")]
    ConnectFailed { code: i32 },
    #[error("MQTT Publish failed, rc={code}")]
    PublishRejected { code: i32 },
}

/// Publish/subscribe session to the broker.
pub trait Transport {
    fn is_connected(&self) -> bool;
    /// One connect attempt.  May block for the transport's own timeout.
    fn connect(&mut self, client_id: &str) -> Result<(), TransportError>;
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError>;
}

pub struct Publisher<T> {
    transport: T,
    topics: Topics,
    client_id: String,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, base_topic: &str, client_id: String) -> Self {
        Self {
            transport,
            topics: Topics::new(base_topic),
            client_id,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Publish one discrete-interval reading as `{"count":n}`.
    pub fn publish_reading(&mut self, count: u16, display: &mut impl CountDisplay) -> bool {
        let payload = state_payload(count);
        let topic = self.topics.state.clone();
        self.publish(&topic, &payload, false, display).is_ok()
    }

    /// Publish the retained discovery descriptor.
    pub fn publish_descriptor(&mut self, display: &mut impl CountDisplay) -> bool {
        let (topic, payload) = self.descriptor();
        self.publish(&topic, &payload, true, display).is_ok()
    }

    fn descriptor(&self) -> (String, String) {
        (self.topics.config.clone(), discovery_payload(&self.topics))
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        retain: bool,
        display: &mut impl CountDisplay,
    ) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            self.reconnect(display);
            if !self.transport.is_connected() {
                return Err(TransportError::NotConnected);
            }
        }

        self.transport
            .publish(topic, payload.as_bytes(), retain)
            .map_err(|e| report(e, display))
    }

    /// Single connect attempt.  A fresh session announces itself with the
    /// descriptor straight away.
    fn reconnect(&mut self, display: &mut impl CountDisplay) {
        match self.transport.connect(&self.client_id) {
            Ok(()) => {
                log::info!("MQTT Connected as {}", self.client_id);
                let (topic, payload) = self.descriptor();
                if let Err(e) = self.transport.publish(&topic, payload.as_bytes(), true) {
                    report(e, display);
                }
            }
            Err(e) => {
                report(e, display);
            }
        }
    }
}

fn report(err: TransportError, display: &mut impl CountDisplay) -> TransportError {
    let message = err.to_string();
    log::warn!("{}", message);
    display.show_message(&message);
    err
}
