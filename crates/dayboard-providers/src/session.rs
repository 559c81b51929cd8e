//! Authorized session state.
//!
//! An [`AuthorizedSession`] is the token material proving that the process may
//! call the calendar API on the user's behalf. It is what the token store
//! persists and what every downstream component borrows read-only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds subtracted from the reported lifetime so tokens refresh early.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token material for one signed-in user.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizedSession {
    /// Bearer token for API requests.
    pub access_token: String,

    /// OpenID Connect ID token, present when `openid` was granted.
    #[serde(default)]
    pub id_token: Option<String>,

    /// Refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the tokens were issued or last refreshed.
    pub issued_at: DateTime<Utc>,
}

impl AuthorizedSession {
    /// Creates a session from a token endpoint response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            id_token: None,
            refresh_token,
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes,
            issued_at: now,
        }
    }

    /// Builder method to attach an ID token.
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if the session can be refreshed without user interaction.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns true if every required scope was granted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Applies a refreshed access token.
    ///
    /// Google omits the refresh token and sometimes the ID token on refresh,
    /// so existing values are kept unless new ones are supplied.
    pub fn refreshed(
        mut self,
        access_token: impl Into<String>,
        id_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        self.access_token = access_token.into();
        if id_token.is_some() {
            self.id_token = id_token;
        }
        self.expires_at = expires_in_secs.map(|secs| expiry_from(now, secs));
        self.issued_at = now;
        self
    }
}

fn expiry_from(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}

impl std::fmt::Debug for AuthorizedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedSession")
            .field("access_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_fresh() {
        let session = AuthorizedSession::new(
            "access",
            Some("refresh".to_string()),
            Some(3600),
            vec!["scope1".to_string()],
        );
        assert!(!session.is_expired());
        assert!(session.can_refresh());
        assert!(session.id_token.is_none());
    }

    #[test]
    fn expired_session() {
        let mut session = AuthorizedSession::new("access", None, Some(3600), vec![]);
        session.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(session.is_expired());
        assert!(!session.can_refresh());
    }

    #[test]
    fn session_without_expiry_never_expires() {
        let session = AuthorizedSession::new("access", None, None, vec![]);
        assert!(!session.is_expired());
    }

    #[test]
    fn scope_check() {
        let session = AuthorizedSession::new(
            "access",
            None,
            None,
            vec!["openid".to_string(), "email".to_string()],
        );
        assert!(session.has_scopes(&["openid".to_string()]));
        assert!(!session.has_scopes(&["calendar".to_string()]));
    }

    #[test]
    fn refresh_keeps_existing_id_token() {
        let session = AuthorizedSession::new("old", Some("r".to_string()), Some(10), vec![])
            .with_id_token("id-1");
        let refreshed = session.refreshed("new", None, Some(3600));
        assert_eq!(refreshed.access_token, "new");
        assert_eq!(refreshed.id_token.as_deref(), Some("id-1"));
        assert_eq!(refreshed.refresh_token.as_deref(), Some("r"));
        assert!(!refreshed.is_expired());
    }

    #[test]
    fn debug_redacts_tokens() {
        let session = AuthorizedSession::new("secret-access", Some("secret-refresh".into()), None, vec![]);
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
