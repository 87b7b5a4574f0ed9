//! General configuration loaded from a config.toml file and the env
//! `Env var` overrides `config.toml` overrides `default`
//!
//! The path to the config file defaults to `~/.modelbridge/config.toml` and can be overridden by
//! the `MODELBRIDGE_CONFIG_PATH` env var.

use lazy_static::lazy_static;
use serde::Deserialize;
use std::path::PathBuf;

lazy_static! {
    pub static ref CONFIG: BridgeConfig = BridgeConfig::load();
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// The name of the config file inside a model directory
    /// Defaults to `model.toml`
    /// Env: MODELBRIDGE_MODEL_CONFIG_NAME
    pub model_config_name: String,

    /// The device used when a model is created without explicit options.
    /// -1 is the CPU, anything else is a GPU index
    /// Defaults to 0
    /// Env: MODELBRIDGE_VISIBLE_DEVICE
    pub default_visible_device: i32,

    /// Whether models are loaded when they're constructed if not specified in the options
    /// Defaults to true
    /// Env: MODELBRIDGE_LOAD_AT_CONSTRUCTION
    pub load_model_at_construction: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model_config_name: "model.toml".to_owned(),
            default_visible_device: 0,
            load_model_at_construction: true,
        }
    }
}

impl BridgeConfig {
    fn load() -> BridgeConfig {
        let file_contents = match std::env::var("MODELBRIDGE_CONFIG_PATH") {
            Ok(p) => {
                let config_path: PathBuf = shellexpand::tilde(&p).to_string().into();
                if !config_path.exists() {
                    panic!("MODELBRIDGE_CONFIG_PATH was set to `{p}` which does not exist");
                }

                Some(read_config_file(&config_path))
            }

            Err(_) => {
                let config_path: PathBuf = shellexpand::tilde("~/.modelbridge/config.toml")
                    .to_string()
                    .into();

                if config_path.exists() {
                    Some(read_config_file(&config_path))
                } else {
                    None
                }
            }
        };

        let config = Self::from_sources(file_contents.as_deref(), |k| std::env::var(k).ok());
        log::debug!("Loaded config: {config:?}");
        config
    }

    /// Build a config from the contents of a config file (if any) and env overrides
    pub(crate) fn from_sources<F>(file_contents: Option<&str>, env: F) -> BridgeConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file_contents {
            Some(contents) => match toml::from_str(contents) {
                Ok(config) => config,
                Err(e) => panic!("Error parsing modelbridge config: {e}"),
            },
            None => BridgeConfig::default(),
        };

        // Override with env
        if let Some(v) = env("MODELBRIDGE_MODEL_CONFIG_NAME") {
            config.model_config_name = v;
        }

        if let Some(v) = env("MODELBRIDGE_VISIBLE_DEVICE") {
            match v.trim().parse() {
                Ok(device) => config.default_visible_device = device,
                Err(_) => log::warn!("Ignoring invalid MODELBRIDGE_VISIBLE_DEVICE: `{v}`"),
            }
        }

        if let Some(v) = env("MODELBRIDGE_LOAD_AT_CONSTRUCTION") {
            match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => config.load_model_at_construction = true,
                "0" | "false" | "no" => config.load_model_at_construction = false,
                _ => log::warn!("Ignoring invalid MODELBRIDGE_LOAD_AT_CONSTRUCTION: `{v}`"),
            }
        }

        config
    }
}

fn read_config_file(path: &PathBuf) -> String {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => panic!("Could not read modelbridge config at {path:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::BridgeConfig;

    #[test]
    fn defaults_without_file_or_env() {
        let config = BridgeConfig::from_sources(None, |_| None);
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.model_config_name, "model.toml");
    }

    #[test]
    fn env_overrides_file() {
        let file = r#"
            model_config_name = "config.toml"
            default_visible_device = 3
        "#;

        let env: HashMap<&str, &str> = [
            ("MODELBRIDGE_VISIBLE_DEVICE", "-1"),
            ("MODELBRIDGE_LOAD_AT_CONSTRUCTION", "false"),
        ]
        .into();

        let config =
            BridgeConfig::from_sources(Some(file), |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.model_config_name, "config.toml");
        assert_eq!(config.default_visible_device, -1);
        assert!(!config.load_model_at_construction);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let config = BridgeConfig::from_sources(None, |k| match k {
            "MODELBRIDGE_VISIBLE_DEVICE" => Some("gpu-zero".into()),
            _ => None,
        });

        assert_eq!(config.default_visible_device, 0);
    }
}
