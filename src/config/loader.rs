use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Load configuration from defaults, an optional file and the process environment.
///
/// Environment variables win over the file. Variable names are the upper-cased
/// field names (`TEAMSERVER_GET_URL`, `ALLOW_INSECURE_SSL`, `WEB_TIMEOUT`, ...).
pub async fn load_config(config_path: Option<&str>) -> Result<ServerConfig> {
    load_config_sync(config_path, Environment::default())
}

/// Load configuration synchronously with an explicit environment source.
///
/// Tests pass `Environment::default().source(Some(map))` to avoid touching
/// the real process environment.
pub fn load_config_sync(config_path: Option<&str>, environment: Environment) -> Result<ServerConfig> {
    let defaults = Config::try_from(&ServerConfig::default())
        .wrap_err("Failed to build default configuration")?;
    let mut builder = Config::builder().add_source(defaults);

    if let Some(config_path) = config_path {
        let path = Path::new(config_path);

        // Determine file format based on extension
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            Some("ini") => FileFormat::Ini,
            _ => FileFormat::Toml, // Default to TOML
        };

        builder = builder.add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
            format,
        ));
    }

    let settings = builder
        .add_source(environment)
        .build()
        .wrap_err("Failed to build configuration")?;

    let server_config: ServerConfig = settings
        .try_deserialize()
        .wrap_err("Failed to deserialize configuration")?;

    Ok(server_config)
}
