// Geiger MQTT: Configuration Mode
//
// Wi-Fi association and broker settings come from a provisioning backend
// (captive portal on the device).  This module only fixes the contract and
// the bookkeeping around it: diagnostics, persisting portal input, and the
// clear screen afterwards.

use crate::display::CountDisplay;
use crate::settings::{BrokerConfig, SettingsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
    /// Boot path: join the stored network, open the portal only on timeout.
    AutoConnect,
    /// User asked for the portal (long press, or no valid settings).
    Portal,
}

impl ProvisionMode {
    /// Shown before the device restarts when provisioning fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            ProvisionMode::AutoConnect => "Failed to connect and hit timeout",
            ProvisionMode::Portal => "Portal Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub broker: BrokerConfig,
    /// The portal was actually opened (and so the user may have edited the
    /// broker fields).
    pub portal_shown: bool,
}

/// Configuration-mode backend.  Expected to call `display.show_config()`
/// when it opens the portal.
pub trait Provisioner {
    fn provision(
        &mut self,
        mode: ProvisionMode,
        current: &BrokerConfig,
        display: &mut impl CountDisplay,
    ) -> anyhow::Result<Provisioned>;
}

/// One submission of the portal form (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalForm {
    pub ssid: String,
    pub password: String,
    pub server: String,
    pub port: String,
    pub topic: String,
}

impl PortalForm {
    pub fn from_urlencoded(body: &str) -> Self {
        let mut form = Self::default();
        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = url_decode(value);
            match url_decode(key).as_str() {
                "ssid" => form.ssid = value,
                "password" => form.password = value,
                "server" => form.server = value,
                "port" => form.port = value,
                "topic" => form.topic = value,
                other => log::debug!("Ignoring portal field {:?}", other),
            }
        }
        form
    }

    /// Broker settings from this submission, falling back to `current` for
    /// the port when the field does not parse.
    pub fn broker(&self, current: &BrokerConfig) -> BrokerConfig {
        current.updated(&self.server, &self.port, &self.topic)
    }
}

fn url_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|d| d as u8)
}

/// Run configuration mode and return the broker triple to use from now on.
///
/// An `Err` is fatal: the diagnostic is already on screen and the caller is
/// expected to restart the device.
pub fn enter_config_mode(
    provisioner: &mut impl Provisioner,
    store: &mut impl SettingsStore,
    display: &mut impl CountDisplay,
    mode: ProvisionMode,
    current: &BrokerConfig,
) -> anyhow::Result<BrokerConfig> {
    log::info!("Entering configuration mode ({:?})", mode);

    let provisioned = match provisioner.provision(mode, current, display) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{}: {:?}", mode.failure_message(), e);
            display.show_message(mode.failure_message());
            return Err(e);
        }
    };

    if provisioned.portal_shown {
        log::info!("Writing MQTT Config");
        if let Err(e) = store.save(&provisioned.broker) {
            log::error!("Saving broker settings failed: {:?}", e);
        }
    }

    display.clear();
    Ok(provisioned.broker)
}
