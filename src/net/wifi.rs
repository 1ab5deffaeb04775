// Geiger MQTT: Wi-Fi Station / Access Point
//
// Station credentials live in the Wi-Fi driver's own NVS storage, so a
// successful join survives reboots without touching the broker record.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi,
};

use geiger_mqtt::config::*;

const LINK_POLL_MS: u32 = 100;

pub struct Network {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl Network {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { wifi })
    }

    pub fn mac(&self) -> anyhow::Result<[u8; 6]> {
        Ok(self.wifi.wifi().sta_netif().get_mac()?)
    }

    /// Join whatever network the driver remembers.  `Ok(false)` when there is
    /// nothing stored or the link did not come up before `timeout`.
    pub fn join_stored(&mut self, timeout: Duration) -> anyhow::Result<bool> {
        if self.wifi.is_started()? && self.wifi.is_connected()? {
            return Ok(true);
        }

        let ssid = match self.wifi.get_configuration()? {
            Configuration::Client(client) | Configuration::Mixed(client, _) => client.ssid,
            _ => Default::default(),
        };
        if ssid.is_empty() {
            log::info!("No stored Wi-Fi credentials");
            return Ok(false);
        }

        log::info!("Joining stored network '{}'", ssid);
        self.start_link(timeout)
    }

    pub fn join(&mut self, ssid: &str, password: &str, timeout: Duration) -> anyhow::Result<bool> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow!("SSID '{}' is too long", ssid))?,
            password: password
                .try_into()
                .map_err(|_| anyhow!("Wi-Fi password is too long"))?,
            auth_method,
            ..Default::default()
        };

        if self.wifi.is_started()? {
            let _ = self.wifi.disconnect();
            self.wifi.stop()?;
        }
        self.wifi.set_configuration(&Configuration::Client(client))?;

        log::info!("Joining network '{}'", ssid);
        self.start_link(timeout)
    }

    /// Bring up the open configuration access point alongside the station.
    /// Returns the AP SSID.
    pub fn start_access_point(&mut self) -> anyhow::Result<String> {
        let mac = self.mac()?;
        let ssid = format!("{}-{:02X}{:02X}", PORTAL_SSID_PREFIX, mac[4], mac[5]);

        let ap = AccessPointConfiguration {
            ssid: ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("AP SSID '{}' is too long", ssid))?,
            auth_method: AuthMethod::None,
            channel: 1,
            ..Default::default()
        };

        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        self.wifi
            .set_configuration(&Configuration::Mixed(ClientConfiguration::default(), ap))?;
        self.wifi.start()?;

        let ip = self.wifi.wifi().ap_netif().get_ip_info()?.ip;
        log::info!("Config portal AP '{}' up at {}", ssid, ip);
        Ok(ssid)
    }

    pub fn stop_access_point(&mut self) -> anyhow::Result<()> {
        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        Ok(())
    }

    fn start_link(&mut self, timeout: Duration) -> anyhow::Result<bool> {
        if !self.wifi.is_started()? {
            let _ = self.wifi.wifi_mut().sta_netif_mut().set_hostname(HOSTNAME);
            self.wifi.start()?;
        }

        // Non-blocking connect so the deadline is ours, not the driver's.
        self.wifi.wifi_mut().connect()?;
        let deadline = Instant::now() + timeout;
        while !self.wifi.is_connected()? {
            if Instant::now() >= deadline {
                log::warn!("Wi-Fi link did not come up within {:?}", timeout);
                let _ = self.wifi.wifi_mut().disconnect();
                return Ok(false);
            }
            FreeRtos::delay_ms(LINK_POLL_MS);
        }

        self.wifi.wait_netif_up()?;
        let ip = self.wifi.wifi().sta_netif().get_ip_info()?.ip;
        log::info!("Wi-Fi connected, IP {}", ip);
        Ok(true)
    }
}
