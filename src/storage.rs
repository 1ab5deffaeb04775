// Geiger MQTT: NVS Settings Store

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use geiger_mqtt::config::{NVS_NAMESPACE, NVS_SETTINGS_KEY};
use geiger_mqtt::settings::{BrokerConfig, SettingsStore, RECORD_LEN};

pub struct NvsSettings {
    nvs: EspNvs<NvsDefault>,
}

impl NvsSettings {
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        Ok(Self {
            nvs: EspNvs::new(partition, NVS_NAMESPACE, true)?,
        })
    }
}

impl SettingsStore for NvsSettings {
    /// Never fails: an unreadable blob (e.g. longer than a record) sends the
    /// device into the portal just like a missing one.
    fn load(&mut self) -> anyhow::Result<Option<BrokerConfig>> {
        let mut buf = [0u8; RECORD_LEN];
        let read = self.nvs.get_blob(NVS_SETTINGS_KEY, &mut buf);
        Ok(BrokerConfig::from_stored(read))
    }

    fn save(&mut self, config: &BrokerConfig) -> anyhow::Result<()> {
        self.nvs.set_blob(NVS_SETTINGS_KEY, &config.to_record())?;
        Ok(())
    }
}
