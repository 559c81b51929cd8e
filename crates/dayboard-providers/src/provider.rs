//! Seams between the engine and the outside world.
//!
//! The engine components ([`CredentialAcquirer`], [`IdentityResolver`],
//! [`CalendarLister`], [`EventAggregator`]) only talk to these traits, so they
//! can run against Google's HTTP APIs in production and against in-memory
//! fakes in tests.
//!
//! [`CredentialAcquirer`]: crate::acquire::CredentialAcquirer
//! [`IdentityResolver`]: crate::identity::IdentityResolver
//! [`CalendarLister`]: crate::lister::CalendarLister
//! [`EventAggregator`]: crate::aggregate::EventAggregator

use std::future::Future;
use std::pin::Pin;

use dayboard_core::{CalendarEntry, DayWindow, EventRecord};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, ProviderResult};
use crate::session::AuthorizedSession;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so components can hold
/// `Arc<dyn Trait>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persisted cache of the authorized session.
///
/// The store is process-wide state; only the credential acquirer writes to
/// it.
pub trait TokenStore: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Loads the cached session, if one exists.
    fn load(&self) -> ProviderResult<Option<AuthorizedSession>>;

    /// Persists a session, replacing any cached one.
    fn save(&self, session: &AuthorizedSession) -> ProviderResult<()>;

    /// Removes every cached session but keeps the backing storage.
    fn clear(&self) -> ProviderResult<()>;

    /// Removes the backing storage itself.
    fn delete(&self) -> ProviderResult<()>;

    /// Clears the store and then deletes its backing storage.
    ///
    /// Both steps are attempted even if the first fails; the first error is
    /// returned. There is no suspension point between them.
    fn reset(&self) -> ProviderResult<()> {
        let cleared = self.clear();
        let deleted = self.delete();
        cleared.and(deleted)
    }
}

/// Obtains an authorized session, from the store or interactively.
pub trait Authorizer: Send + Sync {
    /// Returns a usable session, persisting it to `store` when it changed.
    fn authorize<'a>(
        &'a self,
        store: &'a dyn TokenStore,
    ) -> BoxFuture<'a, ProviderResult<AuthorizedSession>>;
}

/// Claims extracted from a verified ID token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    /// Subject identifier.
    #[serde(default)]
    pub sub: Option<String>,
    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Response from an OpenID Connect user-info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,
    /// The user's display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Endpoints used to find out who is signed in.
pub trait IdentityApi: Send + Sync {
    /// Verifies an ID token and returns its claims.
    fn verify_id_token<'a>(&'a self, id_token: &'a str)
    -> BoxFuture<'a, ProviderResult<IdTokenClaims>>;

    /// Fetches user info with the access token as bearer credential.
    ///
    /// A rejected token must surface as an `AuthenticationFailed` error.
    fn user_info<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, ProviderResult<UserInfo>>;
}

/// One page of the calendar list.
#[derive(Debug, Clone, Default)]
pub struct CalendarPage {
    /// Calendars on this page.
    pub items: Vec<CalendarEntry>,
    /// Cursor for the next page; absent or empty on the last page.
    pub next_page_token: Option<String>,
}

impl CalendarPage {
    /// Creates a page.
    pub fn new(items: Vec<CalendarEntry>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }
}

/// Read-only access to calendars and their events.
pub trait CalendarApi: Send + Sync {
    /// Fetches one page of the calendar list, hidden calendars included.
    fn list_calendars_page<'a>(
        &'a self,
        session: &'a AuthorizedSession,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarPage>>;

    /// Fetches every event instance of a calendar within the window.
    ///
    /// Deleted events are excluded, recurring events are expanded to single
    /// instances, and results are ordered by start time.
    fn list_events<'a>(
        &'a self,
        session: &'a AuthorizedSession,
        calendar_id: &'a str,
        window: &'a DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>>;
}

/// Races `operation` against the cancellation token.
pub async fn cancellable<T, F>(
    cancel: &CancellationToken,
    what: &str,
    operation: F,
) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::cancelled(format!("{} cancelled", what))),
        result = operation => result,
    }
}
