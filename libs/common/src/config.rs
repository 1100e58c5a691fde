//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables with the given prefix, `__` separating nested keys
//! 2. The explicit config file, or `<name>.yaml` / `<name>.toml` in the working dir
//! 3. Default values

use std::path::Path;

use errors::{config_error, SpocResult};
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Build the figment for `name` without extracting it
pub fn layered<T>(name: &str, defaults: &T, path: Option<&Path>) -> SpocResult<Figment>
where
    T: Serialize,
{
    let mut figment = Figment::from(Serialized::defaults(defaults));

    match path {
        Some(path) => {
            if !path.is_file() {
                return Err(config_error!("Config file not found: {}", path.display()));
            }
            let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            figment = match extension {
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                _ => {
                    return Err(config_error!(
                        "Unsupported config file format: {}",
                        path.display()
                    ))
                },
            };
            debug!("Using config file {}", path.display());
        },
        None => {
            figment = figment
                .merge(Toml::file(format!("{}.toml", name)))
                .merge(Yaml::file(format!("{}.yaml", name)));
        },
    }

    Ok(figment.merge(Env::prefixed(&format!("{}_", name.to_uppercase())).split("__")))
}

/// Load a configuration of type `T` layered over `defaults`
pub fn load_config<T>(name: &str, defaults: &T, path: Option<&Path>) -> SpocResult<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    layered(name, defaults, path)?
        .extract()
        .map_err(|e| config_error!("Failed to load configuration: {}", e))
}

/// Render a configuration as YAML
pub fn to_yaml<T: Serialize>(config: &T) -> SpocResult<String> {
    serde_yaml::to_string(config).map_err(|e| config_error!("Failed to render configuration: {}", e))
}
