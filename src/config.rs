use crate::{DELIMITER, FW_VERSION, HW_VERSION, MAX_MESSAGE_LEN, QUIT_BYTE, TX_BUFFER_SIZE};
use static_assertions::const_assert;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Longest version string; keeps `{"fwVersion":"..."}` inside one reply.
pub const MAX_VERSION_LEN: usize = 64;

// Longest version reply is the key, its quoting and the value
const_assert!(MAX_VERSION_LEN + r#"{"fwVersion":""}"#.len() <= TX_BUFFER_SIZE);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("max_message_len {0} is zero or exceeds the message buffer")]
    MessageLength(usize),
    #[error("poll_interval_ms must be non-zero")]
    PollInterval,
    #[error("quit byte {0:#04x} collides with the message delimiter")]
    QuitByteIsDelimiter(u8),
    #[error("{0} is too long or contains characters that need JSON escaping")]
    Version(&'static str),
}

/// Runtime settings for the controller and the host emulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcsConfig {
    pub delimiter: u8,
    pub quit_byte: u8,
    /// Longest accepted message, delimiter included.
    pub max_message_len: usize,
    pub poll_interval_ms: u64,
    pub fw_version: String,
    pub hw_version: String,
    pub log_level: String,
}

impl Default for AdcsConfig {
    fn default() -> Self {
        Self {
            delimiter: DELIMITER,
            quit_byte: QUIT_BYTE,
            max_message_len: MAX_MESSAGE_LEN,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fw_version: FW_VERSION.to_string(),
            hw_version: HW_VERSION.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AdcsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_len == 0 || self.max_message_len > MAX_MESSAGE_LEN {
            return Err(ConfigError::MessageLength(self.max_message_len));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::PollInterval);
        }
        if self.quit_byte == self.delimiter {
            return Err(ConfigError::QuitByteIsDelimiter(self.quit_byte));
        }
        let versions = [("fw_version", &self.fw_version), ("hw_version", &self.hw_version)];
        for (field, version) in versions {
            if !is_reply_safe(version, self.delimiter) {
                return Err(ConfigError::Version(field));
            }
        }
        Ok(())
    }
}

/// Version strings go into replies verbatim.
fn is_reply_safe(version: &str, delimiter: u8) -> bool {
    version.len() <= MAX_VERSION_LEN
        && version
            .bytes()
            .all(|b| (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' && b != delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AdcsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delimiter, b'!');
        assert_eq!(config.max_message_len, MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"max_message_len": 64, "hw_version": "rev-b"}"#;
        let config = AdcsConfig::from_json_str(json).unwrap();
        assert_eq!(config.max_message_len, 64);
        assert_eq!(config.hw_version, "rev-b");
        assert_eq!(config.delimiter, DELIMITER);
    }

    #[test]
    fn test_rejects_zero_limits() {
        assert!(matches!(
            AdcsConfig::from_json_str(r#"{"max_message_len": 0}"#),
            Err(ConfigError::MessageLength(0))
        ));
        assert!(matches!(
            AdcsConfig::from_json_str(r#"{"poll_interval_ms": 0}"#),
            Err(ConfigError::PollInterval)
        ));
        assert!(matches!(
            AdcsConfig::from_json_str(r#"{"quit_byte": 33}"#),
            Err(ConfigError::QuitByteIsDelimiter(33))
        ));
    }

    #[test]
    fn test_rejects_versions_that_break_replies() {
        let quoted = AdcsConfig {
            fw_version: "1.0\"beta".to_string(),
            ..AdcsConfig::default()
        };
        assert!(matches!(quoted.validate(), Err(ConfigError::Version("fw_version"))));

        let bang = AdcsConfig {
            hw_version: "rev-b!".to_string(),
            ..AdcsConfig::default()
        };
        assert!(matches!(bang.validate(), Err(ConfigError::Version("hw_version"))));

        let long = AdcsConfig {
            hw_version: "x".repeat(MAX_VERSION_LEN + 1),
            ..AdcsConfig::default()
        };
        assert!(matches!(long.validate(), Err(ConfigError::Version("hw_version"))));

        let widest = AdcsConfig {
            hw_version: "x".repeat(MAX_VERSION_LEN),
            ..AdcsConfig::default()
        };
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn test_round_trip_through_serde() {
        let config = AdcsConfig {
            poll_interval_ms: 25,
            ..AdcsConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(AdcsConfig::from_json_str(&json).unwrap(), config);
    }
}
