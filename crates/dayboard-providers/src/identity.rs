//! Resolution of the signed-in user's email.
//!
//! Fallback chain:
//!
//! 1. Verify the session's ID token and take its `email` claim.
//! 2. Ask the user-info endpoint using the access token.
//! 3. A 401 from user-info means the cached token is stale; report
//!    `needs_reset` so the acquirer can wipe the token store.
//!
//! Every other failure is logged and leaves the email unresolved. An
//! unresolved identity is a normal outcome, not an error.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{IdentityApi, cancellable};
use crate::session::AuthorizedSession;

/// Outcome of resolving who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The user's email address.
    Resolved(String),
    /// No email could be determined.
    ///
    /// `needs_reset` is set when the provider rejected the access token.
    Unresolved { needs_reset: bool },
}

impl Identity {
    /// Returns the resolved email, if any.
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Resolved(email) => Some(email),
            Self::Unresolved { .. } => None,
        }
    }

    /// Returns true if the cached credentials should be reset.
    pub fn needs_reset(&self) -> bool {
        matches!(self, Self::Unresolved { needs_reset: true })
    }

    /// Consumes the identity, returning the email if resolved.
    pub fn into_email(self) -> Option<String> {
        match self {
            Self::Resolved(email) => Some(email),
            Self::Unresolved { .. } => None,
        }
    }
}

/// Determines the signed-in user's email for a session.
pub struct IdentityResolver {
    api: Arc<dyn IdentityApi>,
}

impl IdentityResolver {
    /// Creates a resolver backed by the given identity endpoints.
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        Self { api }
    }

    /// Runs the fallback chain for `session`.
    pub async fn resolve(
        &self,
        session: &AuthorizedSession,
        cancel: &CancellationToken,
    ) -> Identity {
        if let Some(id_token) = session.id_token.as_deref().filter(|t| !t.is_empty()) {
            match cancellable(cancel, "id token verification", self.api.verify_id_token(id_token))
                .await
            {
                Ok(claims) => match non_empty(claims.email) {
                    Some(email) => {
                        debug!("identity resolved from id token");
                        return Identity::Resolved(email);
                    }
                    None => debug!("id token carries no email claim"),
                },
                Err(e) => debug!("id token verification failed: {}", e),
            }
        }

        if session.access_token.is_empty() {
            return Identity::Unresolved { needs_reset: false };
        }

        match cancellable(cancel, "user info", self.api.user_info(&session.access_token)).await {
            Ok(info) => match non_empty(info.email) {
                Some(email) => {
                    debug!("identity resolved from user info");
                    Identity::Resolved(email)
                }
                None => {
                    debug!("user info response has no email");
                    Identity::Unresolved { needs_reset: false }
                }
            },
            Err(e) if e.is_unauthorized() => {
                warn!("user info rejected the access token: {}", e);
                Identity::Unresolved { needs_reset: true }
            }
            Err(e) => {
                debug!("user info request failed: {}", e);
                Identity::Unresolved { needs_reset: false }
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::testing::{FakeIdentityApi, session};

    fn resolver(api: &Arc<FakeIdentityApi>) -> IdentityResolver {
        IdentityResolver::new(api.clone())
    }

    #[tokio::test]
    async fn id_token_email_wins() {
        let api = Arc::new(FakeIdentityApi::new(
            Ok(Some("id@example.com")),
            Ok(Some("info@example.com")),
        ));
        let identity = resolver(&api)
            .resolve(&session().with_id_token("jwt"), &CancellationToken::new())
            .await;

        assert_eq!(identity, Identity::Resolved("id@example.com".to_string()));
        assert_eq!(api.user_info_calls(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_user_info_when_id_token_is_invalid() {
        let api = Arc::new(FakeIdentityApi::new(
            Err(ProviderError::authentication("bad signature")),
            Ok(Some("a@b.com")),
        ));
        let identity = resolver(&api)
            .resolve(&session().with_id_token("jwt"), &CancellationToken::new())
            .await;

        assert_eq!(identity.email(), Some("a@b.com"));
        assert!(!identity.needs_reset());
        assert_eq!(api.verify_calls(), 1);
        assert_eq!(api.user_info_calls(), 1);
    }

    #[tokio::test]
    async fn skips_verification_without_id_token() {
        let api = Arc::new(FakeIdentityApi::new(
            Ok(Some("never@example.com")),
            Ok(Some("a@b.com")),
        ));
        let identity = resolver(&api)
            .resolve(&session(), &CancellationToken::new())
            .await;

        assert_eq!(identity.email(), Some("a@b.com"));
        assert_eq!(api.verify_calls(), 0);
    }

    #[tokio::test]
    async fn unauthorized_user_info_requests_reset() {
        let api = Arc::new(FakeIdentityApi::new(
            Ok(None),
            Err(ProviderError::from_status(401, "", None)),
        ));
        let identity = resolver(&api)
            .resolve(&session(), &CancellationToken::new())
            .await;

        assert_eq!(identity, Identity::Unresolved { needs_reset: true });
    }

    #[tokio::test]
    async fn other_failures_are_swallowed() {
        let api = Arc::new(FakeIdentityApi::new(
            Ok(None),
            Err(ProviderError::network("connection refused")),
        ));
        let identity = resolver(&api)
            .resolve(&session(), &CancellationToken::new())
            .await;

        assert_eq!(identity, Identity::Unresolved { needs_reset: false });
    }

    #[tokio::test]
    async fn blank_email_is_unresolved() {
        let api = Arc::new(FakeIdentityApi::new(Ok(Some("  ")), Ok(Some(""))));
        let identity = resolver(&api)
            .resolve(&session().with_id_token("jwt"), &CancellationToken::new())
            .await;

        assert_eq!(identity, Identity::Unresolved { needs_reset: false });
    }

    #[tokio::test]
    async fn empty_access_token_skips_user_info() {
        let api = Arc::new(FakeIdentityApi::new(Ok(None), Ok(Some("a@b.com"))));
        let mut s = session();
        s.access_token.clear();
        let identity = resolver(&api).resolve(&s, &CancellationToken::new()).await;

        assert_eq!(identity.email(), None);
        assert_eq!(api.user_info_calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_leaves_identity_unresolved() {
        let api = Arc::new(FakeIdentityApi::new(Ok(Some("id@x.com")), Ok(Some("a@b.com"))));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let identity = resolver(&api)
            .resolve(&session().with_id_token("jwt"), &cancel)
            .await;

        assert_eq!(identity, Identity::Unresolved { needs_reset: false });
    }
}
