//! Calendar commands: `today`, `calendars`, `whoami`.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use dayboard_providers::AgendaService;
use dayboard_providers::google::GoogleBackend;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::TodayArgs;
use crate::config::{CREDENTIALS_FILE_NAME, ClientConfig, DisplaySettings};
use crate::error::{ClientError, ClientResult};
use crate::render;

/// Locates the OAuth client credentials, or explains where to put them.
pub fn credentials_path(
    config: &ClientConfig,
    explicit: Option<&Path>,
    start_dir: &Path,
) -> ClientResult<PathBuf> {
    config.credentials_path(explicit, start_dir).ok_or_else(|| {
        ClientError::Config(format!(
            "Google credentials not found. Provide them via:\n  \
             - the --credentials flag or DAYBOARD_CREDENTIALS\n  \
             - credentials_file under [google] in {}\n  \
             - {} in the working directory or one of its parents",
            ClientConfig::default_path().display(),
            CREDENTIALS_FILE_NAME
        ))
    })
}

/// Builds the Google backend from the configured credentials.
fn backend(config: &ClientConfig, credentials: Option<&Path>) -> ClientResult<GoogleBackend> {
    let cwd = std::env::current_dir()?;
    let path = credentials_path(config, credentials, &cwd)?;
    Ok(GoogleBackend::new(config.google_config(&path)?)?)
}

/// Builds the Google backend and acquires a session.
///
/// Never fails. Missing or unreadable credentials and a failed sign-in all
/// yield a service whose every listing is empty.
pub async fn connect(
    config: &ClientConfig,
    credentials: Option<&Path>,
    cancel: &CancellationToken,
) -> AgendaService {
    let backend = match backend(config, credentials) {
        Ok(backend) => backend,
        Err(e) => {
            warn!("{}", e);
            return AgendaService::unavailable();
        }
    };

    let service = backend.connect(cancel).await;
    if !service.is_authorized() {
        info!("continuing without a Google session");
    }
    service
}

/// Show the day's events.
pub async fn today(
    args: &TodayArgs,
    config: &ClientConfig,
    credentials: Option<&Path>,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let service = connect(config, credentials, cancel).await;
    print!("{}", today_output(&service, args, &config.display, cancel).await?);
    Ok(())
}

/// Renders the day's events for `args`.
///
/// Without `--timezone` the day is observed and displayed in local time.
pub async fn today_output(
    service: &AgendaService,
    args: &TodayArgs,
    display: &DisplaySettings,
    cancel: &CancellationToken,
) -> ClientResult<String> {
    match args.timezone {
        Some(tz) => {
            let date = args
                .date
                .unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
            let agenda = service.events_on(date, &tz, cancel).await;
            if args.json {
                render::json(&agenda)
            } else {
                Ok(render::agenda(&agenda, &tz, display))
            }
        }
        None => {
            let agenda = match args.date {
                Some(date) => service.events_on(date, &Local, cancel).await,
                None => service.todays_events(cancel).await,
            };
            if args.json {
                render::json(&agenda)
            } else {
                Ok(render::agenda(&agenda, &Local, display))
            }
        }
    }
}

/// List every accessible calendar.
pub async fn calendars(
    json: bool,
    config: &ClientConfig,
    credentials: Option<&Path>,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let service = connect(config, credentials, cancel).await;
    let calendars = service.accessible_calendars(cancel).await;

    let output = if json {
        render::json(&calendars)?
    } else {
        render::calendars(&calendars)
    };
    print!("{}", output);
    Ok(())
}

/// Show the signed-in account.
pub async fn whoami(
    config: &ClientConfig,
    credentials: Option<&Path>,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let service = connect(config, credentials, cancel).await;
    print!("{}", render::whoami(service.user_email()));
    Ok(())
}
