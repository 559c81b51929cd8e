//! Google Calendar backend.
//!
//! Wires the engine components to Google's HTTP APIs:
//!
//! - [`GoogleAuthorizer`]: cached session, refresh, or PKCE loopback consent
//! - [`FileTokenStore`]: the session cache on disk
//! - [`GoogleIdentityApi`]: token-info and OpenID user-info endpoints
//! - [`GoogleCalendarClient`]: calendar list and events
//!
//! # Authentication Flow
//!
//! 1. User provides their own OAuth client ID/secret (required by Google)
//! 2. A cached session is used if present, refreshed if expired
//! 3. Otherwise a local HTTP server starts on a port in the configured range
//! 4. The browser opens Google's authorization page with a PKCE challenge
//! 5. Google redirects to the loopback server with the authorization code
//! 6. The code is exchanged for access, refresh and ID tokens
//! 7. The session is persisted for future runs
//!
//! # Example
//!
//! ```ignore
//! use dayboard_providers::google::{self, GoogleConfig, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::from_file("ApiCredential.json")?;
//! let service = google::connect(GoogleConfig::new(credentials), &cancel).await;
//! let agenda = service.todays_events(&cancel).await;
//! ```

mod client;
mod config;
mod identity;
mod oauth;
mod tokens;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::acquire::CredentialAcquirer;
use crate::aggregate::EventAggregator;
use crate::error::ProviderResult;
use crate::identity::IdentityResolver;
use crate::lister::CalendarLister;
use crate::service::AgendaService;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use identity::GoogleIdentityApi;
pub use oauth::{GoogleAuthorizer, OAuthClient, PkceFlow, TokenResponse};
pub use tokens::{FileTokenStore, TOKEN_FILE_NAME};

/// The Google implementations of every engine seam.
pub struct GoogleBackend {
    config: GoogleConfig,
    store: Arc<FileTokenStore>,
    authorizer: Arc<GoogleAuthorizer>,
    identity: Arc<GoogleIdentityApi>,
    calendar: Arc<GoogleCalendarClient>,
}

impl GoogleBackend {
    /// Validates the configuration and builds the HTTP clients.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;

        Ok(Self {
            store: Arc::new(FileTokenStore::new(&config.token_dir)),
            authorizer: Arc::new(GoogleAuthorizer::new(&config)?),
            identity: Arc::new(GoogleIdentityApi::new(&config)?),
            calendar: Arc::new(GoogleCalendarClient::new(&config)?),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Returns the token store.
    pub fn store(&self) -> &FileTokenStore {
        &self.store
    }

    /// Builds the credential acquirer.
    pub fn acquirer(&self) -> CredentialAcquirer {
        CredentialAcquirer::new(
            self.authorizer.clone(),
            self.store.clone(),
            IdentityResolver::new(self.identity.clone()),
        )
    }

    /// Builds the event aggregator.
    pub fn aggregator(&self) -> EventAggregator {
        EventAggregator::new(CalendarLister::new(self.calendar.clone()), self.calendar.clone())
            .with_concurrency(self.config.concurrency)
    }

    /// Acquires credentials and returns the resulting service.
    pub async fn connect(&self, cancel: &CancellationToken) -> AgendaService {
        AgendaService::acquire(&self.acquirer(), self.aggregator(), cancel).await
    }
}

/// Connects to Google, degrading to an empty service on any failure.
pub async fn connect(config: GoogleConfig, cancel: &CancellationToken) -> AgendaService {
    match GoogleBackend::new(config) {
        Ok(backend) => backend.connect(cancel).await,
        Err(e) => {
            warn!("Google backend unavailable: {}", e);
            AgendaService::unavailable()
        }
    }
}
