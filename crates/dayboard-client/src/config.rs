//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/dayboard/config.toml` by default. Every section and field is
//! optional.
//!
//! ```toml
//! [google]
//! credentials_file = "~/secrets/ApiCredential.json"
//! concurrency = 4
//!
//! [weather]
//! latitude = 47.37
//! longitude = 8.54
//!
//! [display]
//! no_events_text = "Nothing today"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// File name searched for when no credentials path is configured.
pub const CREDENTIALS_FILE_NAME: &str = "ApiCredential.json";

/// How many parent directories are searched above the working directory.
pub const CREDENTIALS_SEARCH_DEPTH: usize = 5;

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the dayboard client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google Calendar settings.
    pub google: GoogleSettings,

    /// Weather settings.
    pub weather: WeatherSettings,

    /// Display settings.
    pub display: DisplaySettings,
}

/// Google Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Path to the OAuth client credentials JSON.
    pub credentials_file: Option<PathBuf>,

    /// Directory holding the cached session.
    pub token_dir: Option<PathBuf>,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// How many calendars are fetched at the same time.
    pub concurrency: usize,

    /// Ports tried, in order, for the OAuth loopback redirect.
    pub loopback_port_range: (u16, u16),

    /// Open the consent page in a browser instead of only printing the URL.
    pub open_browser: bool,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            credentials_file: None,
            token_dir: None,
            timeout_secs: 30,
            concurrency: dayboard_providers::DEFAULT_CONCURRENCY,
            loopback_port_range: (8080, 8090),
            open_browser: true,
        }
    }
}

/// Weather forecast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,

    /// Number of forecast days.
    pub forecast_days: u8,

    /// Forecast endpoint override.
    pub base_url: Option<String>,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            forecast_days: 3,
            base_url: None,
        }
    }
}

/// Display settings for output formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Text shown under a calendar with no events.
    pub no_events_text: String,

    /// Whether calendars without events are listed at all.
    pub show_empty_calendars: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            no_events_text: "No events".to_string(),
            show_empty_calendars: true,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("no config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> ClientResult<Self> {
        toml::from_str(content).map_err(|source| ClientError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dayboard")
    }

    /// Returns the directory holding the cached Google session.
    pub fn token_dir(&self) -> PathBuf {
        self.google
            .token_dir
            .clone()
            .unwrap_or_else(dayboard_providers::google::GoogleConfig::default_token_dir)
    }

    /// Locates the OAuth client credentials file.
    ///
    /// Priority (highest to lowest):
    /// 1. `--credentials` flag or `DAYBOARD_CREDENTIALS`
    /// 2. `[google] credentials_file`
    /// 3. `ApiCredential.json` in `start_dir` or one of its parents
    pub fn credentials_path(&self, explicit: Option<&Path>, start_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = &self.google.credentials_file {
            return Some(path.clone());
        }
        find_credentials_file(start_dir)
    }

    /// Builds the provider configuration from these settings.
    pub fn google_config(
        &self,
        credentials_path: &Path,
    ) -> ClientResult<dayboard_providers::google::GoogleConfig> {
        use std::time::Duration;

        use dayboard_providers::google::{GoogleConfig, OAuthCredentials};

        let credentials = OAuthCredentials::from_file(credentials_path)?;
        let (start, end) = self.google.loopback_port_range;

        let config = GoogleConfig::new(credentials)
            .with_token_dir(self.token_dir())
            .with_timeout(Duration::from_secs(self.google.timeout_secs))
            .with_concurrency(self.google.concurrency)
            .with_loopback_port_range(start, end)
            .with_open_browser(self.google.open_browser);
        config.validate()?;
        Ok(config)
    }
}

/// Searches `start` and up to [`CREDENTIALS_SEARCH_DEPTH`] parents for the
/// credentials file.
pub fn find_credentials_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(CREDENTIALS_SEARCH_DEPTH + 1)
        .map(|dir| dir.join(CREDENTIALS_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .inspect(|found| debug!("found credentials at {}", found.display()))
}
