// Geiger MQTT: Configuration Portal
//
// Open AP + one-page HTTP form.  GET / serves the form pre-filled with the
// current broker settings; POST /save hands the submission to the waiting
// provisioning call, which then joins the submitted network.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer};
use esp_idf_svc::http::{Headers, Method};
use esp_idf_svc::io::{Read, Write};

use geiger_mqtt::config::*;
use geiger_mqtt::display::CountDisplay;
use geiger_mqtt::provision::{PortalForm, ProvisionMode, Provisioned, Provisioner};
use geiger_mqtt::settings::BrokerConfig;

use crate::net::wifi::Network;

const MAX_FORM_LEN: usize = 512;
const SUBMIT_POLL_MS: u32 = 200;

type Submission = Arc<Mutex<Option<PortalForm>>>;

impl Provisioner for Network {
    fn provision(
        &mut self,
        mode: ProvisionMode,
        current: &BrokerConfig,
        display: &mut impl CountDisplay,
    ) -> anyhow::Result<Provisioned> {
        let wifi_timeout = Duration::from_millis(WIFI_CONNECT_TIMEOUT_MS);

        if mode == ProvisionMode::AutoConnect && self.join_stored(wifi_timeout)? {
            return Ok(Provisioned {
                broker: current.clone(),
                portal_shown: false,
            });
        }

        display.show_config();
        let form = run_portal(self, current)?;
        self.stop_access_point()?;

        if !self.join(&form.ssid, &form.password, wifi_timeout)? {
            bail!("could not join '{}' with the submitted credentials", form.ssid);
        }

        Ok(Provisioned {
            broker: form.broker(current),
            portal_shown: true,
        })
    }
}

/// Serve the form until a submission arrives or the portal times out.
fn run_portal(network: &mut Network, current: &BrokerConfig) -> anyhow::Result<PortalForm> {
    let ssid = network.start_access_point()?;
    let submission: Submission = Arc::new(Mutex::new(None));

    let mut server =
        EspHttpServer::new(&HttpConfig::default()).context("starting portal HTTP server")?;

    let page = form_page(current);
    server.fn_handler("/", Method::Get, move |req| -> anyhow::Result<()> {
        req.into_ok_response()?.write_all(page.as_bytes())?;
        Ok(())
    })?;

    let slot = Arc::clone(&submission);
    server.fn_handler("/save", Method::Post, move |mut req| -> anyhow::Result<()> {
        let len = (req.content_len().unwrap_or(0) as usize).min(MAX_FORM_LEN);
        let mut body = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match req.read(&mut body[filled..])? {
                0 => break,
                n => filled += n,
            }
        }

        let form = PortalForm::from_urlencoded(&String::from_utf8_lossy(&body[..filled]));
        log::info!("Portal submission for network '{}'", form.ssid);
        if let Ok(mut pending) = slot.lock() {
            *pending = Some(form);
        }

        req.into_ok_response()?
            .write_all(b"<html><body><p>Saved. Connecting...</p></body></html>")?;
        Ok(())
    })?;

    log::info!("Waiting for configuration on AP '{}'", ssid);
    let deadline = Instant::now() + Duration::from_millis(CONFIG_PORTAL_TIMEOUT_MS);
    loop {
        let pending = submission
            .lock()
            .map_err(|_| anyhow::anyhow!("portal state poisoned"))?
            .take();
        if let Some(form) = pending {
            // Let the confirmation page flush before the AP goes down.
            FreeRtos::delay_ms(SUBMIT_POLL_MS);
            drop(server);
            return Ok(form);
        }
        if Instant::now() >= deadline {
            bail!("config portal timed out on AP '{}'", ssid);
        }
        FreeRtos::delay_ms(SUBMIT_POLL_MS);
    }
}

fn form_page(current: &BrokerConfig) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta name=\"viewport\" content=\"width=device-width\">\
         <title>{name}</title></head><body><h2>{name} setup</h2>\
         <form method=\"post\" action=\"/save\">\
         <p>WiFi SSID<br><input name=\"ssid\" maxlength=\"32\"></p>\
         <p>Password<br><input name=\"password\" type=\"password\" maxlength=\"64\"></p>\
         <p>MQTT server<br>\
         <input name=\"server\" maxlength=\"{server_max}\" value=\"{server}\"></p>\
         <p>MQTT port<br><input name=\"port\" maxlength=\"5\" value=\"{port}\"></p>\
         <p>MQTT topic<br><input name=\"topic\" maxlength=\"{topic_max}\" value=\"{topic}\"></p>\
         <p><input type=\"submit\" value=\"Save\"></p></form></body></html>",
        name = DEVICE_NAME,
        server_max = MQTT_SERVER_LENGTH - 1,
        server = escape_html(&current.server),
        port = current.port,
        topic_max = MQTT_TOPIC_LENGTH - 1,
        topic = escape_html(&current.topic),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
