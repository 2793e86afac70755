use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::Topics;
use crate::session::SessionConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub parity: SerialParity,
    /// Milliseconds between sending a command and reading the replies
    pub response_guard_ms: u64,
    /// Milliseconds to wait after commands 1 and 3
    pub settle_ms: u64,
    /// Milliseconds of silence that end a read
    pub drain_idle_ms: u64,
    /// Preamble bytes before the command 0 short frame
    pub preamble_len: usize,
    /// Polling address used to find the device
    pub polling_address: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Capacity of the client's outbound request queue
    pub channel_capacity: usize,
    /// Topic for the primary variable
    pub press_topic: String,
    /// Topic for the scaled secondary variable
    pub temp_topic: String,
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl SerialConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            response_guard: Duration::from_millis(self.response_guard_ms),
            settle: Duration::from_millis(self.settle_ms),
            drain_idle: Duration::from_millis(self.drain_idle_ms),
            preamble_len: self.preamble_len,
            polling_address: self.polling_address,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 1200,
            parity: SerialParity::None,
            response_guard_ms: 500,
            settle_ms: 1000,
            drain_idle_ms: 50,
            preamble_len: 20,
            polling_address: 0,
        }
    }
}

impl MqttConfig {
    pub fn topics(&self) -> Topics {
        Topics {
            press: self.press_topic.clone(),
            temp: self.temp_topic.clone(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            client_id: "hart-bridge".to_string(),
            keep_alive_secs: 60,
            channel_capacity: 10,
            press_topic: "press".to_string(),
            temp_topic: "temp".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            baud_rate = 9600
            parity = "odd"

            [mqtt]
            temp_topic = "plant/temp"
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.baud_rate, 9600);
        assert!(matches!(config.serial.parity, SerialParity::Odd));
        assert_eq!(config.serial.response_guard_ms, 500);
        assert_eq!(config.mqtt.press_topic, "press");
        assert_eq!(config.mqtt.temp_topic, "plant/temp");
    }

    #[test]
    fn session_config_from_millis() {
        let serial = SerialConfig {
            response_guard_ms: 250,
            settle_ms: 0,
            ..SerialConfig::default()
        };

        let session = serial.session_config();

        assert_eq!(session.response_guard, Duration::from_millis(250));
        assert_eq!(session.settle, Duration::ZERO);
        assert_eq!(session.preamble_len, 20);
    }

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial.baud_rate, 1200);
        assert!(matches!(config.serial.parity, SerialParity::None));
        assert_eq!(config.mqtt.client_id, "hart-bridge");
    }
}
