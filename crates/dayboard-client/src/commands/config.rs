//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Dump the effective configuration to stdout.
pub fn dump(config: &ClientConfig, source: Option<&Path>) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)?;
    let path = source
        .map(Path::to_path_buf)
        .unwrap_or_else(ClientConfig::default_path);
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Show the configuration file path.
pub fn path(source: Option<&Path>) -> ClientResult<()> {
    match source {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: {}", ClientConfig::default_path().display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes_and_reloads() {
        let mut config = ClientConfig::default();
        config.weather.latitude = Some(47.37);
        config.display.no_events_text = "Free".to_string();

        let text = toml::to_string_pretty(&config).unwrap();
        let reloaded: ClientConfig = toml::from_str(&text).unwrap();

        assert_eq!(reloaded.weather.latitude, Some(47.37));
        assert_eq!(reloaded.display.no_events_text, "Free");
        assert_eq!(reloaded.google.loopback_port_range, (8080, 8090));
    }
}
