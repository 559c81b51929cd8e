//! OAuth 2.0 PKCE flow and the Google [`Authorizer`].
//!
//! This module implements the Authorization Code flow with PKCE (Proof Key for
//! Code Exchange) extension, using a loopback redirect for desktop applications.
//!
//! # Flow Overview
//!
//! 1. Generate a cryptographic code verifier and its SHA-256 challenge
//! 2. Start a local HTTP server on a free port in the configured range
//! 3. Build the authorization URL with the challenge
//! 4. Open the user's browser to Google's consent page
//! 5. User grants permission; Google redirects to our local server
//! 6. Extract the authorization code from the redirect
//! 7. Exchange the code (with verifier) for access, refresh and ID tokens
//!
//! [`GoogleAuthorizer`] puts this behind the cache: a stored session is used
//! as is while valid, refreshed when expired, and only a missing, unreadable
//! or under-scoped cache triggers the interactive flow.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Authorizer, BoxFuture, TokenStore};
use crate::session::AuthorizedSession;

use super::config::{GoogleConfig, OAuthCredentials};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Timeout for waiting for the OAuth callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for reading the request line of one loopback connection.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Bytes read at most from one loopback request.
const MAX_REQUEST_BYTES: u64 = 8 * 1024;

/// OAuth client for Google's authorization and token endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    auth_url: String,
    token_url: String,
    open_browser: bool,
}

impl OAuthClient {
    /// Creates an OAuth client from the provider configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            credentials: config.credentials.clone(),
            http_client,
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            open_browser: config.open_browser,
        })
    }

    /// Runs the interactive PKCE flow and returns a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No port is available in the specified range
    /// - The user denies authorization or never completes it
    /// - Token exchange fails
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<AuthorizedSession> {
        let pkce = PkceFlow::new();

        let (listener, port) = Self::bind_loopback_server(port_range).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);

        let auth_url = pkce.build_auth_url(
            &self.auth_url,
            &self.credentials.client_id,
            &redirect_uri,
            scopes,
        );

        info!("starting OAuth flow, waiting for consent in the browser");
        debug!("authorization URL: {}", auth_url);

        if !self.open_browser {
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        } else if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) = Self::wait_for_callback(listener).await?;

        if received_state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Obtains a new access token with a refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<TokenResponse> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.post_token(&params, "token refresh").await?;
        info!("refreshed access token");
        Ok(response)
    }

    /// Exchanges an authorization code for a session.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<AuthorizedSession> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.post_token(&params, "token exchange").await?;
        info!("obtained tokens");

        let session = AuthorizedSession::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        );
        Ok(match response.id_token {
            Some(id_token) => session.with_id_token(id_token),
            None => session,
        })
    }

    async fn post_token(&self, params: &[(&str, &str)], what: &str) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{} request failed", what)).with_source(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network("failed to read response").with_source(e))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                what, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid {} response", what)).with_source(e)
        })
    }

    /// Tries to bind a TCP listener on an available port in the given range.
    async fn bind_loopback_server(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
        for port in port_range.0..=port_range.1 {
            let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await else {
                continue;
            };
            let port = listener.local_addr().map(|addr| addr.port()).unwrap_or(port);
            debug!("bound loopback server on port {}", port);
            return Ok((listener, port));
        }
        Err(ProviderError::configuration(format!(
            "no available port in range {}-{}",
            port_range.0, port_range.1
        )))
    }

    /// Waits for the OAuth callback and extracts the authorization code.
    ///
    /// The listener lives inside the returned future, so the port is released
    /// as soon as the wait times out or is dropped.
    async fn wait_for_callback(listener: TcpListener) -> ProviderResult<(String, String)> {
        tokio::time::timeout(CALLBACK_TIMEOUT, Self::accept_callback(&listener))
            .await
            .map_err(|_| ProviderError::authentication("OAuth callback timeout"))?
    }

    async fn accept_callback(listener: &TcpListener) -> ProviderResult<(String, String)> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("loopback connection from {}", peer);
                    if let Some(result) = Self::handle_callback(stream).await {
                        return result;
                    }
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handles an incoming HTTP request on the callback server.
    ///
    /// A connection that sends no complete request line within
    /// [`REQUEST_READ_TIMEOUT`] is dropped.
    async fn handle_callback<S>(mut stream: S) -> Option<ProviderResult<(String, String)>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut request_line = String::new();
        {
            let mut reader = BufReader::new((&mut stream).take(MAX_REQUEST_BYTES));
            let read = reader.read_line(&mut request_line);
            match tokio::time::timeout(REQUEST_READ_TIMEOUT, read).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    debug!("failed to read loopback request: {}", e);
                    return None;
                }
                Err(_) => {
                    debug!("loopback request timed out");
                    return None;
                }
            }
        }

        let result = parse_callback(&request_line)?;

        let response = if result.is_ok() {
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>Authorization Successful</h1>\
            <p>You can close this window and return to the terminal.</p></body></html>"
        } else {
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>Authorization Failed</h1>\
            <p>You can close this window.</p></body></html>"
        };

        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.flush().await;

        Some(result)
    }
}

/// Parses the request line of the loopback redirect.
///
/// Returns `None` for requests that are not the OAuth callback (favicon
/// fetches and the like), so the server keeps waiting.
fn parse_callback(request_line: &str) -> Option<ProviderResult<(String, String)>> {
    // GET /callback?code=...&state=... HTTP/1.1
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 || parts[0] != "GET" {
        return None;
    }

    let path = parts[1];
    if !path.starts_with("/callback") {
        return None;
    }

    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            let value = urlencoding::decode(value).unwrap_or_default().into_owned();
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                _ => {}
            }
        }
    }

    if let Some(error) = error {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    Some(match code {
        Some(code) => Ok((code, state.unwrap_or_default())),
        None => Err(ProviderError::authentication(
            "missing authorization code in callback",
        )),
    })
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the authorization URL.
    ///
    /// Offline access with forced consent makes Google issue a refresh token
    /// every time.
    pub fn build_auth_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_endpoint,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Present when `openid` was granted.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Authorizes against Google, preferring the cached session.
#[derive(Debug)]
pub struct GoogleAuthorizer {
    oauth: OAuthClient,
    scopes: Vec<String>,
    port_range: (u16, u16),
}

impl GoogleAuthorizer {
    /// Creates an authorizer from the provider configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            oauth: OAuthClient::new(config)?,
            scopes: config.scopes.clone(),
            port_range: config.loopback_port_range,
        })
    }

    /// Returns the cached session, refreshed if needed.
    ///
    /// `None` means the interactive flow has to run.
    async fn from_cache(&self, store: &dyn TokenStore) -> Option<AuthorizedSession> {
        let cached = match store.load() {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                warn!("ignoring unreadable token cache: {}", e);
                return None;
            }
        };

        if !cached.has_scopes(&self.scopes) {
            info!("cached session lacks required scopes, re-authorizing");
            return None;
        }

        if !cached.is_expired() {
            debug!("using cached session");
            return Some(cached);
        }

        let refresh_token = cached.refresh_token.clone().filter(|t| !t.is_empty())?;
        match self.oauth.refresh_token(&refresh_token).await {
            Ok(response) => {
                let session =
                    cached.refreshed(response.access_token, response.id_token, response.expires_in);
                persist(store, &session);
                Some(session)
            }
            Err(e) => {
                warn!("token refresh failed: {}", e);
                None
            }
        }
    }
}

impl Authorizer for GoogleAuthorizer {
    fn authorize<'a>(
        &'a self,
        store: &'a dyn TokenStore,
    ) -> BoxFuture<'a, ProviderResult<AuthorizedSession>> {
        Box::pin(async move {
            if let Some(session) = self.from_cache(store).await {
                return Ok(session);
            }

            let session = self.oauth.authorize(&self.scopes, self.port_range).await?;
            persist(store, &session);
            Ok(session)
        })
    }
}

/// Saves the session; a failed save only costs a consent prompt next run.
fn persist(store: &dyn TokenStore, session: &AuthorizedSession) {
    if let Err(e) = store.save(session) {
        warn!("failed to persist session to {}: {}", store.describe(), e);
    }
}
