//! Configuration document shapes
//!
//! The router is configured from one JSON document:
//!
//! ```json
//! {
//!   "switches": {
//!     "matrix": { "title": "Main matrix", "driver": "extron",
//!                 "config": { "tty": "ttyUSB0", "maxInputs": 12, "maxOutputs": 8 } }
//!   },
//!   "devices": [
//!     { "title": "SNES", "image": "snes.png",
//!       "ties": { "matrix": { "input": 1, "output": { "video": 1, "audio": 2 } } } }
//!   ]
//! }
//! ```
//!
//! These types only check the document's shape. Semantic checks (driver
//! names, channel ranges, capabilities) happen when switches and devices are
//! built from them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RouterError;

/// File name used when only a configuration directory is known
pub const CONFIG_FILE_NAME: &str = "config.json";

/// The whole configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Switch blocks keyed by switch id, in document order
    pub switches: Map<String, Value>,
    /// Device blocks, in document order
    pub devices: Vec<Value>,
}

impl RouterConfig {
    /// Parse a configuration document from text
    pub fn from_json(text: &str) -> Result<Self, RouterError> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| RouterError::Config(format!("invalid JSON: {}", e)))?;
        Self::from_value(root)
    }

    /// Check the root shape of an already-parsed document
    pub fn from_value(root: Value) -> Result<Self, RouterError> {
        let Value::Object(mut root) = root else {
            return Err(RouterError::Config(
                "Configuration root is not an object".to_string(),
            ));
        };

        let switches = match root.remove("switches") {
            Some(Value::Object(switches)) => switches,
            Some(_) => {
                return Err(RouterError::Config(
                    "`switches` is not an object".to_string(),
                ))
            }
            None => return Err(RouterError::Config("No switches defined".to_string())),
        };

        let devices = match root.remove("devices") {
            Some(Value::Array(devices)) => devices,
            Some(_) => return Err(RouterError::Config("`devices` is not a list".to_string())),
            None => return Err(RouterError::Config("No devices defined".to_string())),
        };

        Ok(Self { switches, devices })
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RouterError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

/// One entry under `switches`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SwitchConfig {
    /// Display title; the switch id is used when absent
    #[serde(default)]
    pub title: Option<String>,
    /// Registered driver name
    #[serde(default)]
    pub driver: Option<String>,
    /// Driver-specific block
    #[serde(default)]
    pub config: Option<Value>,
}

impl SwitchConfig {
    /// Interpret a switch block
    pub fn from_value(id: &str, value: &Value) -> Result<Self, RouterError> {
        if !value.is_object() {
            return Err(RouterError::Config(format!(
                "Configuration block for `{}` is not an object",
                id
            )));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| RouterError::Config(format!("Invalid configuration for `{}`: {}", id, e)))
    }
}

/// Driver-specific fields of a switch block
///
/// All drivers share one shape; each driver checks the fields it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Serial device; takes precedence over `host`
    #[serde(default)]
    pub tty: Option<String>,
    /// Network host
    #[serde(default)]
    pub host: Option<String>,
    /// Network port override
    #[serde(default)]
    pub port: Option<u16>,
    /// Serial baud rate override
    #[serde(default)]
    pub baud_rate: Option<u32>,
    /// Connect and write timeout override
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Number of inputs on the switch
    #[serde(default)]
    pub max_inputs: Option<u32>,
    /// Number of outputs on the switch
    #[serde(default)]
    pub max_outputs: Option<u32>,
}

impl DriverConfig {
    /// Interpret the `config` block of a switch
    pub fn from_value(id: &str, value: &Value) -> Result<Self, RouterError> {
        if !value.is_object() {
            return Err(RouterError::Config(format!(
                "Configuration block for `{}` is not an object",
                id
            )));
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            RouterError::Config(format!("Invalid driver configuration for `{}`: {}", id, e))
        })
    }
}

/// One entry under `devices`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Display title; the device index is used when absent
    #[serde(default)]
    pub title: Option<String>,
    /// Image path, relative to the configuration directory
    #[serde(default)]
    pub image: Option<String>,
    /// Ties keyed by switch id, applied in document order
    #[serde(default)]
    pub ties: Option<Value>,
}

impl DeviceConfig {
    /// Interpret a device block; `label` names it in error messages
    pub fn from_value(label: &str, value: &Value) -> Result<Self, RouterError> {
        if !value.is_object() {
            return Err(RouterError::Config(format!(
                "Configuration for `{}` is not an object",
                label
            )));
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            RouterError::Config(format!("Invalid configuration for `{}`: {}", label, e))
        })
    }

    /// The tie map, checked for presence and shape
    pub fn ties(&self, label: &str) -> Result<&Map<String, Value>, RouterError> {
        match &self.ties {
            Some(Value::Object(ties)) => Ok(ties),
            Some(_) => Err(RouterError::Config(format!(
                "Ties for `{}` is not an object",
                label
            ))),
            None => Err(RouterError::Config(format!(
                "Configuration for `{}` missing `ties`",
                label
            ))),
        }
    }
}

/// One entry in a device's tie map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TieConfig {
    /// Input channel
    #[serde(default)]
    pub input: Option<u32>,
    /// Output channel(s)
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

/// Output of a tie: one channel, or separate video and audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OutputConfig {
    /// Same output for video and audio
    Single(u32),
    /// Decoupled outputs
    Split {
        #[serde(default)]
        video: Option<u32>,
        #[serde(default)]
        audio: Option<u32>,
    },
}

impl TieConfig {
    /// Interpret a tie block targeting `switch_id`
    pub fn from_value(switch_id: &str, value: &Value) -> Result<Self, RouterError> {
        if !value.is_object() {
            return Err(RouterError::Validation(format!(
                "Tie for `{}` is not an object",
                switch_id
            )));
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            RouterError::Validation(format!("Invalid tie for `{}`: {}", switch_id, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_checks() {
        let err = RouterConfig::from_json("[]").unwrap_err();
        assert!(err.to_string().contains("Configuration root is not an object"));

        let err = RouterConfig::from_json(r#"{"devices": []}"#).unwrap_err();
        assert!(err.to_string().contains("No switches defined"));

        let err = RouterConfig::from_json(r#"{"switches": {}}"#).unwrap_err();
        assert!(err.to_string().contains("No devices defined"));

        assert!(RouterConfig::from_json("{").is_err());
    }

    #[test]
    fn test_switch_order_is_preserved() {
        let config = RouterConfig::from_json(
            r#"{"switches": {"zeta": {}, "alpha": {}, "mid": {}}, "devices": []}"#,
        )
        .unwrap();
        let ids: Vec<&str> = config.switches.keys().map(String::as_str).collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_driver_config_camel_case() {
        let config = DriverConfig::from_value(
            "matrix",
            &json!({"tty": "ttyUSB0", "maxInputs": 12, "maxOutputs": 8, "baudRate": 19200}),
        )
        .unwrap();
        assert_eq!(config.tty.as_deref(), Some("ttyUSB0"));
        assert_eq!(config.max_inputs, Some(12));
        assert_eq!(config.max_outputs, Some(8));
        assert_eq!(config.baud_rate, Some(19200));
        assert_eq!(config.host, None);
    }

    #[test]
    fn test_driver_config_rejects_non_object() {
        let err = DriverConfig::from_value("matrix", &json!(5)).unwrap_err();
        assert!(err.to_string().contains("`matrix` is not an object"));
    }

    #[test]
    fn test_tie_output_forms() {
        let single = TieConfig::from_value("m", &json!({"input": 3, "output": 2})).unwrap();
        assert_eq!(single.input, Some(3));
        assert_eq!(single.output, Some(OutputConfig::Single(2)));

        let split =
            TieConfig::from_value("m", &json!({"input": 3, "output": {"video": 1, "audio": 4}}))
                .unwrap();
        assert_eq!(
            split.output,
            Some(OutputConfig::Split {
                video: Some(1),
                audio: Some(4)
            })
        );

        let audio_only =
            TieConfig::from_value("m", &json!({"input": 3, "output": {"audio": 4}})).unwrap();
        assert_eq!(
            audio_only.output,
            Some(OutputConfig::Split {
                video: None,
                audio: Some(4)
            })
        );

        let bare = TieConfig::from_value("m", &json!({})).unwrap();
        assert_eq!(bare.input, None);
        assert_eq!(bare.output, None);
    }

    #[test]
    fn test_tie_rejects_negative_channel() {
        let err = TieConfig::from_value("m", &json!({"input": -1})).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("`m`"));
    }

    #[test]
    fn test_device_ties_checks() {
        let device = DeviceConfig::from_value("0", &json!({"title": "SNES"})).unwrap();
        assert!(device
            .ties("SNES")
            .unwrap_err()
            .to_string()
            .contains("Configuration for `SNES` missing `ties`"));

        let device = DeviceConfig::from_value("0", &json!({"ties": []})).unwrap();
        assert!(device
            .ties("0")
            .unwrap_err()
            .to_string()
            .contains("Ties for `0` is not an object"));
    }
}
