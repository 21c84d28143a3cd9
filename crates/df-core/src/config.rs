use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

pub const MODEL_PATH_KEY: &str = "DREAMFRAME_MODEL_PATH";
pub const OUTPUT_DIR_KEY: &str = "DREAMFRAME_OUTPUT_DIR";
pub const DEVICE_KEY: &str = "DREAMFRAME_DEVICE";
pub const SAFETY_CHECK_KEY: &str = "DREAMFRAME_SAFETY_CHECK";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// CUDA when the binary was built with it and a GPU is present, CPU otherwise.
    #[default]
    Auto,
    Cpu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub output_dir: PathBuf,
    pub device: DevicePreference,
    pub safety_check: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./model"),
            output_dir: PathBuf::from("output"),
            device: DevicePreference::Auto,
            safety_check: false,
        }
    }
}

impl AppConfig {
    /// Reads `.env` if there is one, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => debug!("ignoring unreadable .env: {e}"),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut conf = Self::default();

        if let Some(path) = lookup(MODEL_PATH_KEY) {
            conf.model_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(OUTPUT_DIR_KEY) {
            conf.output_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup(DEVICE_KEY) {
            conf.device = match device.trim().to_ascii_lowercase().as_str() {
                "auto" => DevicePreference::Auto,
                "cpu" => DevicePreference::Cpu,
                _ => return Err(ConfigError::Invalid { key: DEVICE_KEY, value: device }),
            };
        }
        if let Some(flag) = lookup(SAFETY_CHECK_KEY) {
            conf.safety_check = parse_bool(&flag)
                .ok_or(ConfigError::Invalid { key: SAFETY_CHECK_KEY, value: flag })?;
        }

        Ok(conf)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let conf = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(conf, AppConfig::default());
        assert_eq!(conf.output_dir, PathBuf::from("output"));
        assert!(!conf.safety_check);
    }

    #[test]
    fn test_overrides() {
        let conf = AppConfig::from_lookup(lookup(&[
            (MODEL_PATH_KEY, "/models/sd15"),
            (OUTPUT_DIR_KEY, "renders"),
            (DEVICE_KEY, "CPU"),
            (SAFETY_CHECK_KEY, "yes"),
        ]))
        .unwrap();

        assert_eq!(conf.model_path, PathBuf::from("/models/sd15"));
        assert_eq!(conf.output_dir, PathBuf::from("renders"));
        assert_eq!(conf.device, DevicePreference::Cpu);
        assert!(conf.safety_check);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = AppConfig::from_lookup(lookup(&[(DEVICE_KEY, "tpu")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: DEVICE_KEY, value: "tpu".into() });

        assert!(AppConfig::from_lookup(lookup(&[(SAFETY_CHECK_KEY, "maybe")])).is_err());
    }
}
