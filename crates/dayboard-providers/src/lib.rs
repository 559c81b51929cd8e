//! Credential acquisition and calendar aggregation engine.
//!
//! - [`CredentialAcquirer`] - bounded retry/reset authorization state machine
//! - [`IdentityResolver`] - who is signed in, via ID token then user info
//! - [`CalendarLister`] - every accessible calendar, across pages
//! - [`EventAggregator`] - one day of events per calendar, failures isolated
//! - [`AgendaService`] - the facade the display layer talks to
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐  session?  ┌─────────────────┐
//! │ CredentialAcquirer │ ─────────► │  AgendaService  │
//! │  ├ Authorizer      │            └────────┬────────┘
//! │  ├ TokenStore      │                     │
//! │  └ IdentityResolver│                     ▼
//! └────────────────────┘            ┌─────────────────┐
//!                                   │ EventAggregator │
//!                                   │  └ CalendarLister│
//!                                   └────────┬────────┘
//!                                            │ CalendarApi
//!                                            ▼
//!                                   Google Calendar v3
//! ```
//!
//! Every seam is a trait in [`provider`]; the [`google`] module provides the
//! HTTP implementations.

pub mod acquire;
pub mod aggregate;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod identity;
pub mod lister;
pub mod provider;
pub mod service;
pub mod session;
#[cfg(feature = "weather")]
pub mod weather;

#[cfg(test)]
mod testing;

pub use acquire::{Authorization, CredentialAcquirer, MAX_ATTEMPTS};
pub use aggregate::{DEFAULT_CONCURRENCY, EventAggregator};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use identity::{Identity, IdentityResolver};
pub use lister::CalendarLister;
pub use provider::{
    Authorizer, BoxFuture, CalendarApi, CalendarPage, IdTokenClaims, IdentityApi, TokenStore,
    UserInfo, cancellable,
};
pub use service::AgendaService;
pub use session::AuthorizedSession;
