// Geiger MQTT: ESP-IDF MQTT Transport
//
// The IDF client runs its own task and reconnects on its own; the event
// callback mirrors its state into atomics so `is_connected` is a load.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttEvent, EventPayload, MqttClientConfiguration, QoS,
};

use geiger_mqtt::config::MQTT_CONNECT_TIMEOUT_MS;
use geiger_mqtt::settings::BrokerConfig;
use geiger_mqtt::telemetry::{Transport, TransportError};

const CONNECT_POLL_MS: u32 = 50;
/// Reported when the broker never answered and the client gave no error.
const RC_TIMEOUT: i32 = -4;

#[derive(Default)]
struct LinkState {
    connected: AtomicBool,
    last_error: AtomicI32,
}

pub struct MqttTransport {
    url: String,
    client: Option<EspMqttClient<'static>>,
    state: Arc<LinkState>,
}

impl MqttTransport {
    pub fn new(broker: &BrokerConfig) -> Self {
        Self {
            url: broker.url(),
            client: None,
            state: Arc::new(LinkState::default()),
        }
    }

    fn create_client(&mut self, client_id: &str) -> Result<(), TransportError> {
        let state = Arc::clone(&self.state);
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };

        let client = EspMqttClient::new_cb(&self.url, &conf, move |event: EspMqttEvent<'_>| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    state.last_error.store(0, Ordering::Relaxed);
                    state.connected.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    state.connected.store(false, Ordering::Release);
                }
                EventPayload::Error(e) => {
                    state.last_error.store(e.code(), Ordering::Relaxed);
                }
                EventPayload::Received { topic, data, .. } => {
                    log::debug!("MQTT message on {:?} ({} bytes)", topic, data.len());
                }
                _ => {}
            }
        })
        .map_err(|e| TransportError::ConnectFailed { code: e.code() })?;

        log::info!("MQTT client for {} created", self.url);
        self.client = Some(client);
        Ok(())
    }
}

impl Transport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        if self.client.is_none() {
            log::info!("Attempting MQTT connection to {} as {}", self.url, client_id);
            self.create_client(client_id)?;
        }

        let deadline = Instant::now() + Duration::from_millis(MQTT_CONNECT_TIMEOUT_MS);
        while !self.is_connected() {
            if Instant::now() >= deadline {
                let code = match self.state.last_error.load(Ordering::Relaxed) {
                    0 => RC_TIMEOUT,
                    code => code,
                };
                return Err(TransportError::ConnectFailed { code });
            }
            FreeRtos::delay_ms(CONNECT_POLL_MS);
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .map(|_| ())
            .map_err(|e| TransportError::PublishRejected { code: e.code() })
    }
}
