//! Credential acquisition with a bounded retry-and-reset state machine.
//!
//! ```text
//!            ┌──────────────┐  email            ┌──────────────┐
//!   ───────► │ Start(n)     │ ────────────────► │ Done(auth)   │
//!            └──────┬───────┘                   └──────────────┘
//!                   │ no email / authorize error       ▲
//!          n == 1   ▼                          n == 2  │ session exists
//!            ┌──────────────┐                          │
//!            │ Resetting    │ ── clear + delete ──► Start(2)
//!            └──────────────┘
//!                                       n == 2, no session ─► Failed
//! ```
//!
//! Provider credential caches are occasionally stale or scoped for an older
//! scope set. One reset followed by a second authorization recovers from that
//! without user intervention; the attempt cap prevents looping on a cache
//! that is permanently broken.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProviderErrorCode;
use crate::identity::{Identity, IdentityResolver};
use crate::provider::{Authorizer, TokenStore, cancellable};
use crate::session::AuthorizedSession;

/// Maximum number of authorization attempts per acquisition.
pub const MAX_ATTEMPTS: u8 = 2;

/// An authorized session and the identity resolved for it.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub session: AuthorizedSession,
    /// The signed-in user's email; `None` when it could not be resolved.
    pub email: Option<String>,
}

/// States of one acquisition run.
#[derive(Debug)]
enum State {
    Start { attempt: u8 },
    Resetting { attempt: u8 },
    Done(Authorization),
    Failed,
}

/// What a single authorization attempt produced.
#[derive(Debug)]
enum AttemptOutcome {
    Authorized {
        authorization: Authorization,
        needs_reset: bool,
    },
    AuthorizationFailed,
    Cancelled,
}

/// Computes the state following an attempt.
///
/// `fallback` keeps the newest session seen without an email so that a
/// failing second attempt can still hand it out.
fn transition(attempt: u8, outcome: AttemptOutcome, fallback: &mut Option<Authorization>) -> State {
    let can_retry = attempt < MAX_ATTEMPTS;
    match outcome {
        AttemptOutcome::Cancelled => State::Failed,
        AttemptOutcome::Authorized { authorization, .. } if authorization.email.is_some() => {
            State::Done(authorization)
        }
        AttemptOutcome::Authorized {
            authorization,
            needs_reset,
        } if can_retry => {
            if needs_reset {
                debug!("cached token rejected by the provider");
            }
            *fallback = Some(authorization);
            State::Resetting { attempt }
        }
        AttemptOutcome::Authorized { authorization, .. } => State::Done(authorization),
        AttemptOutcome::AuthorizationFailed if can_retry => State::Resetting { attempt },
        AttemptOutcome::AuthorizationFailed => match fallback.take() {
            Some(authorization) => State::Done(authorization),
            None => State::Failed,
        },
    }
}

/// Drives authorization against the provider.
pub struct CredentialAcquirer {
    authorizer: Arc<dyn Authorizer>,
    store: Arc<dyn TokenStore>,
    identity: IdentityResolver,
}

impl CredentialAcquirer {
    /// Creates an acquirer.
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        store: Arc<dyn TokenStore>,
        identity: IdentityResolver,
    ) -> Self {
        Self {
            authorizer,
            store,
            identity,
        }
    }

    /// Runs the state machine to completion.
    ///
    /// Returns `None` when no session could be obtained or the run was
    /// cancelled. A returned authorization may lack an email.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<Authorization> {
        let mut state = State::Start { attempt: 1 };
        let mut fallback = None;

        loop {
            state = match state {
                State::Start { attempt } => {
                    let outcome = self.attempt(attempt, cancel).await;
                    transition(attempt, outcome, &mut fallback)
                }
                State::Resetting { attempt } => {
                    if cancel.is_cancelled() {
                        State::Failed
                    } else {
                        self.reset_store();
                        State::Start {
                            attempt: attempt + 1,
                        }
                    }
                }
                State::Done(authorization) => {
                    match authorization.email {
                        Some(ref email) => info!("signed in as {}", email),
                        None => info!("signed in, identity unresolved"),
                    }
                    return Some(authorization);
                }
                State::Failed => {
                    warn!("no authorized session, continuing without calendar access");
                    return None;
                }
            };
        }
    }

    async fn attempt(&self, attempt: u8, cancel: &CancellationToken) -> AttemptOutcome {
        debug!(attempt, "authorizing against {}", self.store.describe());

        let session = match cancellable(
            cancel,
            "authorization",
            self.authorizer.authorize(self.store.as_ref()),
        )
        .await
        {
            Ok(session) => session,
            Err(e) if e.code() == ProviderErrorCode::Cancelled => return AttemptOutcome::Cancelled,
            Err(e) => {
                warn!(attempt, "authorization failed: {}", e);
                return AttemptOutcome::AuthorizationFailed;
            }
        };

        let identity = self.identity.resolve(&session, cancel).await;
        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let needs_reset = identity.needs_reset();
        if let Identity::Unresolved { .. } = identity {
            debug!(attempt, needs_reset, "authorized but identity unresolved");
        }

        AttemptOutcome::Authorized {
            authorization: Authorization {
                session,
                email: identity.into_email(),
            },
            needs_reset,
        }
    }

    fn reset_store(&self) {
        info!("resetting token store at {}", self.store.describe());
        if let Err(e) = self.store.reset() {
            warn!("token store reset incomplete: {}", e);
        }
    }
}
