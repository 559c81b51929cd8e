//! Google identity endpoints: ID token verification and OpenID user info.

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, IdTokenClaims, IdentityApi, UserInfo};

use super::client::send_json;
use super::config::GoogleConfig;

/// Identity endpoints backed by Google's token-info and user-info services.
#[derive(Debug, Clone)]
pub struct GoogleIdentityApi {
    http_client: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
    userinfo_url: String,
}

impl GoogleIdentityApi {
    /// Creates the identity client from the provider configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            client_id: config.credentials.client_id.clone(),
            tokeninfo_url: config.tokeninfo_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
        })
    }

    /// Verifies an ID token and checks its audience and expiry.
    pub async fn verify(&self, id_token: &str) -> ProviderResult<IdTokenClaims> {
        let request = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)]);
        let info: TokenInfoResponse = send_json(request).await?;

        if info.aud.as_deref() != Some(self.client_id.as_str()) {
            return Err(ProviderError::authentication(
                "id token was issued for a different client",
            ));
        }

        match info.exp.as_ref().and_then(parse_exp) {
            Some(exp) if exp > Utc::now().timestamp() => {}
            Some(_) => return Err(ProviderError::authentication("id token has expired")),
            None => {
                return Err(ProviderError::invalid_response(
                    "id token info carries no expiry",
                ));
            }
        }

        debug!("id token verified");
        Ok(IdTokenClaims {
            sub: info.sub,
            email: info.email,
        })
    }

    /// Fetches user info for an access token.
    pub async fn fetch_user_info(&self, access_token: &str) -> ProviderResult<UserInfo> {
        let request = self.http_client.get(&self.userinfo_url).bearer_auth(access_token);
        send_json(request).await
    }
}

impl IdentityApi for GoogleIdentityApi {
    fn verify_id_token<'a>(
        &'a self,
        id_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<IdTokenClaims>> {
        Box::pin(self.verify(id_token))
    }

    fn user_info<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, ProviderResult<UserInfo>> {
        Box::pin(self.fetch_user_info(access_token))
    }
}

/// Response from the tokeninfo endpoint. Google encodes numbers as strings.
#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<serde_json::Value>,
}

fn parse_exp(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
