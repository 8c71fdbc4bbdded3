//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `DISPATCH_`-prefixed environment variables (`DISPATCH_SERVER__PORT=9000`).

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{CorrelatorSettings, HubSettings, LogSettings, ServerSettings, Settings};

/// File consulted when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of the environment variables read by `load_config`.
pub const ENV_PREFIX: &str = "DISPATCH";

/// Loads the configuration from `config/default` (if present) and the
/// environment, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Like `load_config`, but reads `path` instead of `config/default`. An
/// explicit path must exist.
pub fn load_config_from(path: Option<&str>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::with_name(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_into(Settings::default()))
}

#[cfg(test)]
mod tests;
