use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::consts;

/// What to do with a payload that is neither an ON nor an OFF token.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPayload {
    /// Report an error and leave the relay alone.
    #[default]
    Reject,
    /// Switch the relay off.
    Off,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadConfig {
    #[serde(default = "default_on_tokens")]
    pub on_tokens: Vec<String>,
    #[serde(default = "default_off_tokens")]
    pub off_tokens: Vec<String>,
    #[serde(default)]
    pub unknown: UnknownPayload,
}

fn default_on_tokens() -> Vec<String> {
    vec!["turn_on".to_string()]
}

fn default_off_tokens() -> Vec<String> {
    vec!["turn_off".to_string()]
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            on_tokens: default_on_tokens(),
            off_tokens: default_off_tokens(),
            unknown: UnknownPayload::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Broker CA bundle, PEM.
    pub ca: PathBuf,
    /// Client certificate and private key, PEM. Both or none.
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub alpn: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Explicit channel names, in channel order.
    pub channels: Option<Vec<String>>,
    /// Used when `channels` is not given: `<prefix>1` .. `<prefix>4`.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    pub tls: Option<TlsConfig>,
}

fn default_client_id() -> String {
    consts::GATE_NAME.to_string()
}

fn default_namespace() -> String {
    "relays".to_string()
}

fn default_channel_prefix() -> String {
    "relay".to_string()
}

fn default_reconnect_delay() -> u64 {
    consts::DEFAULT_RECONNECT_DELAY_SECS
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            namespace: default_namespace(),
            channels: None,
            channel_prefix: default_channel_prefix(),
            reconnect_delay_secs: default_reconnect_delay(),
            tls: None,
        }
    }
}

impl MqttConfig {
    /// Channel names in channel order (index 0 is channel 1).
    pub fn channel_names(&self) -> Vec<String> {
        match &self.channels {
            Some(names) => names.clone(),
            None => (1..=consts::CHANNEL_COUNT)
                .map(|idx| format!("{}{}", self.channel_prefix, idx))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    /// Switch every relay off before accepting commands.
    #[serde(default = "default_reset_on_start")]
    pub reset_on_start: bool,
}

fn default_reset_on_start() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            payload: PayloadConfig::default(),
            reset_on_start: default_reset_on_start(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> anyhow::Result<Self> {
        let handle = File::open(filename)?;
        let data: Config = serde_yaml::from_reader(handle)?;
        data.validate()?;

        Ok(data)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let data: Config = serde_yaml::from_str(raw)?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let names = self.mqtt.channel_names();
        if names.len() != consts::CHANNEL_COUNT as usize {
            anyhow::bail!(
                "Expected {} channel names, got {}: {:?}",
                consts::CHANNEL_COUNT,
                names.len(),
                names
            );
        }
        let unique: HashSet<&String> = names.iter().collect();
        if unique.len() != names.len() {
            anyhow::bail!("Duplicated channel names: {:?}", names);
        }
        if let Some(bad) = names.iter().find(|n| n.is_empty() || n.contains(['/', '+', '#'])) {
            anyhow::bail!("Invalid channel name '{}'", bad);
        }
        if self.mqtt.namespace.is_empty() || self.mqtt.namespace.contains(['+', '#']) {
            anyhow::bail!("Invalid topic namespace '{}'", self.mqtt.namespace);
        }

        let payload = &self.payload;
        if payload.on_tokens.is_empty() || payload.off_tokens.is_empty() {
            anyhow::bail!("Both on_tokens and off_tokens need at least one entry");
        }
        if let Some(both) = payload.on_tokens.iter().find(|t| payload.off_tokens.contains(t)) {
            anyhow::bail!("Token '{}' is both an ON and an OFF token", both);
        }

        if let Some(tls) = &self.mqtt.tls {
            if tls.cert.is_some() != tls.key.is_some() {
                anyhow::bail!("TLS client cert and key must be given together");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(
            config.mqtt.channel_names(),
            vec!["relay1", "relay2", "relay3", "relay4"]
        );
        assert_eq!(config.mqtt.namespace, "relays");
        assert_eq!(config.payload.on_tokens, vec!["turn_on"]);
        assert_eq!(config.payload.unknown, UnknownPayload::Reject);
        assert!(config.reset_on_start);
        assert!(config.mqtt.tls.is_none());
    }

    #[test]
    fn gate_layout_with_numeric_tokens() {
        let raw = r#"
mqtt:
  client_id: esp8266_relays_controller
  namespace: gates
  channel_prefix: gate
  tls:
    ca: certs/ca.crt
    cert: certs/client.crt
    key: certs/client.key
    alpn: [x-amzn-mqtt-ca]
payload:
  on_tokens: ["1"]
  off_tokens: ["0"]
  unknown: "off"
reset_on_start: false
"#;
        let config = Config::from_yaml(raw).unwrap();
        assert_eq!(config.mqtt.channel_names()[3], "gate4");
        assert_eq!(config.payload.unknown, UnknownPayload::Off);
        let tls = config.mqtt.tls.unwrap();
        assert_eq!(tls.alpn, vec!["x-amzn-mqtt-ca"]);
        assert!(!config.reset_on_start);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let raw = "mqtt:\n  channels: [a, b, c]\n";
        assert!(Config::from_yaml(raw).is_err());
    }

    #[test]
    fn rejects_duplicate_or_nested_names() {
        assert!(Config::from_yaml("mqtt:\n  channels: [a, b, c, a]\n").is_err());
        assert!(Config::from_yaml("mqtt:\n  channels: [a, b, c, d/e]\n").is_err());
    }

    #[test]
    fn rejects_overlapping_tokens() {
        let raw = "payload:\n  on_tokens: [x]\n  off_tokens: [x]\n";
        assert!(Config::from_yaml(raw).is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(Config::from_yaml("devices: {}\n").is_err());
    }

    #[test]
    fn rejects_half_client_auth() {
        let raw = "mqtt:\n  tls:\n    ca: ca.crt\n    cert: client.crt\n";
        assert!(Config::from_yaml(raw).is_err());
    }
}
