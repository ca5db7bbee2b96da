//! Identity provider client for a Keycloak realm.
//!
//! Talks to the realm's OpenID Connect endpoints to obtain, refresh and end
//! sessions. Only the refresh token is persisted; access tokens are kept in
//! memory and re-issued on start.

use std::sync::RwLock;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{
    IdentityProvider, InitOptions, LoginOptions, OnLoad, ProviderError, ProviderRedirect,
    ProviderToken, TokenClaims,
};

use super::token_store::{StoredTokens, TokenStore};

/// HTTP request timeout in seconds for provider calls.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Where the realm lives and which client we authenticate as.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
}

impl KeycloakConfig {
    fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.base_url.trim_end_matches('/'), self.realm)
    }

    fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    fn logout_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/logout", self.realm_url())
    }

    pub fn account_url(&self) -> String {
        format!("{}/account", self.realm_url())
    }

    pub fn registration_url(&self) -> String {
        let base = format!("{}/protocol/openid-connect/registrations", self.realm_url());
        let account = self.account_url();
        let params = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("scope", "openid"),
            ("redirect_uri", account.as_str()),
        ];
        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    refresh_expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct TokenState {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    refresh_expires_at: Option<DateTime<Utc>>,
    claims: TokenClaims,
}

impl TokenState {
    fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self, ProviderError> {
        let claims = decode_claims(&response.access_token)?;
        let refresh_token = response
            .refresh_token
            .ok_or_else(|| ProviderError::Malformed("token response without refresh_token".to_string()))?;

        // Prefer the token's own exp claim over the advisory expires_in
        let expires_at = claims
            .exp
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
            .unwrap_or_else(|| now + Duration::seconds(response.expires_in));

        Ok(Self {
            access_token: response.access_token,
            refresh_token,
            expires_at,
            refresh_expires_at: response
                .refresh_expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
            claims,
        })
    }

    fn stored(&self) -> StoredTokens {
        StoredTokens {
            refresh_token: self.refresh_token.clone(),
            refresh_expires_at: self.refresh_expires_at,
            saved_at: Utc::now(),
        }
    }
}

/// Decode the payload segment of a JWT without verifying its signature.
/// The API server validates tokens; the client only reads claims.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ProviderError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ProviderError::Malformed("access token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ProviderError::Malformed(format!("invalid token payload encoding: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::Malformed(format!("invalid token payload: {}", e)))
}

pub struct KeycloakClient {
    client: Client,
    config: KeycloakConfig,
    store: TokenStore,
    state: RwLock<Option<TokenState>>,
}

impl KeycloakClient {
    pub fn new(config: KeycloakConfig, store: TokenStore) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            config,
            store,
            state: RwLock::new(None),
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenState, ProviderError> {
        let response = self
            .client
            .post(self.config.token_endpoint())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<OAuthErrorResponse>(&body)
                .map(|e| e.error_description.unwrap_or(e.error))
                .unwrap_or_else(|_| format!("status {}", status));
            return Err(ProviderError::Rejected(reason));
        }
        if !status.is_success() {
            return Err(ProviderError::Unreachable(format!("token endpoint returned {}", status)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        TokenState::from_response(body, Utc::now())
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenState, ProviderError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    fn install(&self, state: TokenState) {
        if let Err(e) = self.store.save(&state.stored()) {
            warn!(error = %e, "Failed to persist session");
        }
        if let Ok(mut slot) = self.state.write() {
            *slot = Some(state);
        }
    }

    fn take_state(&self) -> Option<TokenState> {
        let taken = self.state.write().ok().and_then(|mut slot| slot.take());
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        taken
    }

    fn current(&self) -> Option<TokenState> {
        self.state.read().ok().and_then(|slot| slot.clone())
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn init(&self, options: &InitOptions) -> Result<bool, ProviderError> {
        if self.current().is_some() {
            return Ok(true);
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
        };

        let Some(stored) = stored else {
            if options.on_load == OnLoad::LoginRequired {
                debug!("No stored session; interactive login required");
            }
            return Ok(false);
        };

        match self.refresh_grant(&stored.refresh_token).await {
            Ok(state) => {
                info!("Resumed stored session");
                self.install(state);
                Ok(true)
            }
            Err(ProviderError::Rejected(reason)) => {
                debug!(%reason, "Stored session no longer valid");
                self.take_state();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn login(&self, options: &LoginOptions) -> Result<ProviderRedirect, ProviderError> {
        let state = self
            .token_request(&[
                ("grant_type", "password"),
                ("client_id", self.config.client_id.as_str()),
                ("scope", "openid"),
                ("username", options.username.as_str()),
                ("password", options.password.as_str()),
            ])
            .await?;

        self.install(state);
        Ok(ProviderRedirect::Completed)
    }

    async fn register(&self) -> Result<ProviderRedirect, ProviderError> {
        Ok(ProviderRedirect::Visit(self.config.registration_url()))
    }

    async fn logout(&self) -> Result<(), ProviderError> {
        let Some(state) = self.take_state() else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.config.logout_endpoint())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", state.refresh_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "logout endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn update_token(&self, min_validity_secs: i64) -> Result<bool, ProviderError> {
        let state = self.current().ok_or(ProviderError::NoSession)?;
        if state.expires_at - Utc::now() >= Duration::seconds(min_validity_secs) {
            return Ok(false);
        }

        let refreshed = self.refresh_grant(&state.refresh_token).await?;
        self.install(refreshed);
        Ok(true)
    }

    fn token(&self) -> Option<ProviderToken> {
        self.current().map(|state| ProviderToken {
            access_token: state.access_token,
            expires_at: state.expires_at,
            claims: state.claims,
        })
    }

    fn account_url(&self) -> String {
        self.config.account_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    fn config() -> KeycloakConfig {
        KeycloakConfig {
            base_url: "http://localhost:8080/".to_string(),
            realm: "library".to_string(),
            client_id: "library-client".to_string(),
        }
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(r#"{"exp":1735689600,"preferred_username":"alice","name":"Alice","email":"a@example.org"}"#);
        let claims = decode_claims(&token).expect("claims should decode");
        assert_eq!(claims.preferred_username.as_deref(), Some("alice"));
        assert_eq!(claims.exp, Some(1_735_689_600));
    }

    #[test]
    fn test_decode_claims_rejects_garbage() {
        assert!(matches!(decode_claims("opaque"), Err(ProviderError::Malformed(_))));
        assert!(matches!(decode_claims("a.!!!.c"), Err(ProviderError::Malformed(_))));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain"));
        assert!(matches!(decode_claims(&not_json), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_token_state_uses_exp_claim() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: jwt(r#"{"exp":1735689600}"#),
            expires_in: 300,
            refresh_token: Some("refresh".to_string()),
            refresh_expires_in: Some(1800),
        };
        let state = TokenState::from_response(response, now).expect("state should build");
        assert_eq!(state.expires_at.timestamp(), 1_735_689_600);
        assert_eq!(state.refresh_expires_at, Some(now + Duration::seconds(1800)));
    }

    #[test]
    fn test_token_state_falls_back_to_expires_in() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: jwt(r#"{"preferred_username":"bob"}"#),
            expires_in: 300,
            refresh_token: Some("refresh".to_string()),
            refresh_expires_in: Some(0),
        };
        let state = TokenState::from_response(response, now).expect("state should build");
        assert_eq!(state.expires_at, now + Duration::seconds(300));
        // Offline tokens report 0: no expiry
        assert_eq!(state.refresh_expires_at, None);
    }

    #[test]
    fn test_token_state_requires_refresh_token() {
        let response = TokenResponse {
            access_token: jwt("{}"),
            expires_in: 300,
            refresh_token: None,
            refresh_expires_in: None,
        };
        assert!(TokenState::from_response(response, Utc::now()).is_err());
    }

    #[test]
    fn test_endpoint_urls() {
        let config = config();
        assert_eq!(
            config.token_endpoint(),
            "http://localhost:8080/realms/library/protocol/openid-connect/token"
        );
        assert_eq!(config.account_url(), "http://localhost:8080/realms/library/account");

        let registration = config.registration_url();
        assert!(registration.starts_with(
            "http://localhost:8080/realms/library/protocol/openid-connect/registrations?"
        ));
        assert!(registration.contains("client_id=library-client"));
    }

    #[tokio::test]
    async fn test_update_token_without_session() {
        let dir = std::env::temp_dir().join(format!("bookshelf-kc-{}", std::process::id()));
        let client = KeycloakClient::new(config(), TokenStore::new(dir)).expect("client should build");
        assert!(matches!(client.update_token(30).await, Err(ProviderError::NoSession)));
        assert!(client.token().is_none());
        // Nothing to end: logout without a session is a local no-op
        assert!(client.logout().await.is_ok());
    }
}
