use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::AuthError;
use crate::oauth::callback::CallbackListener;
use crate::oauth::config::AuthConfig;
use crate::oauth::consent::ConsentPrompt;
use crate::oauth::credential::{Credential, UserKey};
use crate::oauth::endpoint::TokenEndpoint;
use crate::oauth::pkce::{generate_pkce, generate_state};
use crate::oauth::store::CredentialStore;

/// Where the returned credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cached,
    Refreshed,
    Authorized,
}

#[derive(Debug, Clone)]
pub struct AuthResult {
    pub credential: Credential,
    pub source: CredentialSource,
}

/// Installed-application authorization code grant with a local redirect.
pub struct AuthorizationFlow<'a> {
    config: &'a AuthConfig,
    store: &'a dyn CredentialStore,
    endpoint: &'a dyn TokenEndpoint,
    prompt: &'a dyn ConsentPrompt,
}

impl<'a> AuthorizationFlow<'a> {
    pub fn new(
        config: &'a AuthConfig,
        store: &'a dyn CredentialStore,
        endpoint: &'a dyn TokenEndpoint,
        prompt: &'a dyn ConsentPrompt,
    ) -> Self {
        Self {
            config,
            store,
            endpoint,
            prompt,
        }
    }

    /// Returns a usable credential for `key`, refreshing or asking the user
    /// for consent when the stored one cannot be used.
    pub async fn authorize(&self, key: &UserKey) -> Result<AuthResult, AuthError> {
        match self.store.load(key) {
            None => debug!(user = %key, "no stored credential"),
            Some(stored) if !stored.covers(&self.config.scopes) => {
                info!(user = %key, "requested scopes changed, consent required")
            }
            Some(stored) if !stored.is_expired() => {
                debug!(user = %key, expires_at = %stored.expires_at, "using stored credential");
                return Ok(AuthResult {
                    credential: stored,
                    source: CredentialSource::Cached,
                });
            }
            Some(stored) => match stored.refresh_token {
                Some(refresh_token) => match self.refresh(key, refresh_token).await {
                    Ok(credential) => {
                        return Ok(AuthResult {
                            credential,
                            source: CredentialSource::Refreshed,
                        })
                    }
                    Err(AuthError::TokenExchange { status, body }) => {
                        warn!(user = %key, status, %body, "refresh rejected, consent required");
                    }
                    Err(e) => return Err(e),
                },
                None => debug!(user = %key, "stored credential expired without refresh token"),
            },
        }

        let credential = self.request_consent(key).await?;
        Ok(AuthResult {
            credential,
            source: CredentialSource::Authorized,
        })
    }

    async fn refresh(
        &self,
        key: &UserKey,
        refresh_token: String,
    ) -> Result<Credential, AuthError> {
        debug!(user = %key, "refreshing expired credential");
        let response = self.endpoint.refresh(&refresh_token).await?;
        let credential =
            response.into_credential(&self.config.scopes, Some(refresh_token), Utc::now())?;
        if credential.is_expired() {
            return Err(AuthError::TokenExchange {
                status: 200,
                body: format!(
                    "refreshed token expires too soon ({})",
                    credential.expires_at
                ),
            });
        }
        self.store.save(key, &credential)?;
        info!(user = %key, expires_at = %credential.expires_at, "refreshed credential");
        Ok(credential)
    }

    async fn request_consent(&self, key: &UserKey) -> Result<Credential, AuthError> {
        let listener = CallbackListener::bind(
            self.config.redirect_host,
            self.config.redirect_ports,
            &self.config.callback_path,
        )
        .await?;
        let redirect_uri = self.config.redirect_uri(listener.port());
        let state = generate_state();
        let pkce = generate_pkce();

        let url = build_authorization_url(self.config, &redirect_uri, &state, &pkce.challenge);
        debug!(%url, "authorization URL");
        self.prompt.present(&url);

        info!(
            %redirect_uri,
            timeout_secs = self.config.callback_timeout.as_secs(),
            "waiting for authorization callback"
        );
        let code = listener
            .wait_for_code(&state, self.config.callback_timeout)
            .await?;
        debug!("received authorization code");

        let response = self
            .endpoint
            .exchange_code(&code, &redirect_uri, &pkce.verifier)
            .await?;
        let credential = response.into_credential(&self.config.scopes, None, Utc::now())?;
        self.store.save(key, &credential)?;
        info!(user = %key, expires_at = %credential.expires_at, "authorization complete");
        Ok(credential)
    }
}

pub fn build_authorization_url(
    config: &AuthConfig,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> Url {
    let mut url = config.endpoints.auth_url.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.identity.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &config.scopes.to_param())
        .append_pair("state", state)
        .append_pair("access_type", "offline")
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256");
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthorizationFailure;
    use crate::oauth::config::DEFAULT_SCOPE;
    use crate::oauth::credential::{ScopeSet, TokenResponse};
    use crate::oauth::endpoint::MockTokenEndpoint;
    use crate::oauth::store::FileCredentialStore;
    use chrono::Duration;
    use std::collections::HashMap;

    const SECRETS: &str = r#"{
        "installed": {
            "client_id": "client-1",
            "client_secret": "secret-1",
            "auth_uri": "https://accounts.example.com/o/oauth2/auth",
            "token_uri": "https://accounts.example.com/token",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    fn config() -> AuthConfig {
        let secret = yup_oauth2::parse_application_secret(SECRETS).unwrap();
        AuthConfig::new(&secret, ScopeSet::new([DEFAULT_SCOPE]).unwrap())
            .unwrap()
            .with_callback_timeout(std::time::Duration::from_secs(10))
    }

    fn token(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in: Some(expires_in),
            scope: None,
        }
    }

    /// Plays the browser: follows the redirect with the given query.
    struct SimulatedBrowser {
        query: Vec<(&'static str, &'static str)>,
    }

    impl SimulatedBrowser {
        fn granting(code: &'static str) -> Self {
            Self {
                query: vec![("code", code)],
            }
        }
    }

    impl ConsentPrompt for SimulatedBrowser {
        fn present(&self, authorization_url: &Url) {
            let params: HashMap<String, String> =
                authorization_url.query_pairs().into_owned().collect();
            let mut redirect = Url::parse(&params["redirect_uri"]).unwrap();
            redirect
                .query_pairs_mut()
                .extend_pairs(self.query.iter().copied())
                .append_pair("state", &params["state"]);
            tokio::spawn(async move {
                let _ = reqwest::get(redirect).await;
            });
        }
    }

    /// A user who never comes back from the browser.
    struct AbsentUser;

    impl ConsentPrompt for AbsentUser {
        fn present(&self, _authorization_url: &Url) {}
    }

    /// Fails the test if the flow ever asks for consent.
    struct ConsentForbidden;

    impl ConsentPrompt for ConsentForbidden {
        fn present(&self, authorization_url: &Url) {
            panic!("unexpected consent request: {}", authorization_url);
        }
    }

    fn expired_credential(refresh: Option<&str>) -> Credential {
        Credential {
            access_token: "old".to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Utc::now() - Duration::seconds(10),
            scopes: ScopeSet::new([DEFAULT_SCOPE]).unwrap().to_set(),
        }
    }

    #[tokio::test]
    async fn fresh_environment_runs_full_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_exchange_code()
            .withf(|code, redirect_uri, verifier| {
                code == "ABC123" && redirect_uri.ends_with("/Callback") && verifier.len() == 43
            })
            .times(1)
            .returning(|_, _, _| Ok(token("tok1", Some("ref1"), 3600)));
        endpoint.expect_refresh().never();

        let prompt = SimulatedBrowser::granting("ABC123");
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let key = UserKey::new("user").unwrap();
        let result = flow.authorize(&key).await.unwrap();

        assert_eq!(result.source, CredentialSource::Authorized);
        assert_eq!(result.credential.access_token, "tok1");
        assert_eq!(result.credential.refresh_token.as_deref(), Some("ref1"));
        assert!(result.credential.expires_at > Utc::now() + Duration::seconds(3500));
        assert_eq!(store.load(&key), Some(result.credential));
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let key = UserKey::new("user").unwrap();
        store.save(&key, &expired_credential(Some("ref1"))).unwrap();

        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_refresh()
            .withf(|refresh_token| refresh_token == "ref1")
            .times(1)
            .returning(|_| Ok(token("tok2", None, 3600)));
        endpoint.expect_exchange_code().never();

        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &AbsentUser);
        let first = flow.authorize(&key).await.unwrap();
        assert_eq!(first.source, CredentialSource::Refreshed);
        assert_eq!(first.credential.access_token, "tok2");
        assert_eq!(first.credential.refresh_token.as_deref(), Some("ref1"));
        assert_eq!(store.load(&key), Some(first.credential.clone()));

        // Within the new validity window nothing touches the network.
        let second = flow.authorize(&key).await.unwrap();
        assert_eq!(second.source, CredentialSource::Cached);
        assert_eq!(second.credential, first.credential);
    }

    #[tokio::test]
    async fn rejected_refresh_falls_back_to_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let key = UserKey::new("user").unwrap();
        store.save(&key, &expired_credential(Some("revoked"))).unwrap();

        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_refresh().times(1).returning(|_| {
            Err(AuthError::TokenExchange {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            })
        });
        endpoint
            .expect_exchange_code()
            .times(1)
            .returning(|_, _, _| Ok(token("tok3", Some("ref3"), 3600)));

        let prompt = SimulatedBrowser::granting("XYZ");
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let result = flow.authorize(&key).await.unwrap();
        assert_eq!(result.source, CredentialSource::Authorized);
        assert_eq!(
            store.load(&key).unwrap().refresh_token.as_deref(),
            Some("ref3")
        );
    }

    #[tokio::test]
    async fn refresh_transport_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let key = UserKey::new("user").unwrap();
        let stored = expired_credential(Some("ref1"));
        store.save(&key, &stored).unwrap();

        let transport = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_refresh().times(1).return_once(move |_| {
            Err(AuthError::Network {
                stage: crate::error::NetworkStage::Refresh,
                source: transport,
            })
        });
        endpoint.expect_exchange_code().never();

        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &ConsentForbidden);
        let err = flow.authorize(&key).await.unwrap_err();

        assert!(matches!(err, AuthError::Network { .. }));
        assert_eq!(err.stage(), "network");
        assert_eq!(store.load(&key), Some(stored));
    }

    #[tokio::test]
    async fn expired_credential_without_refresh_token_requires_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let key = UserKey::new("user").unwrap();
        store.save(&key, &expired_credential(None)).unwrap();

        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_refresh().never();
        endpoint
            .expect_exchange_code()
            .times(1)
            .returning(|_, _, _| Ok(token("tok5", Some("ref5"), 3600)));

        let prompt = SimulatedBrowser::granting("N0REFRESH");
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let result = flow.authorize(&key).await.unwrap();

        assert_eq!(result.source, CredentialSource::Authorized);
        assert_eq!(store.load(&key).unwrap().access_token, "tok5");
    }

    #[tokio::test]
    async fn short_lived_refresh_falls_back_to_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let key = UserKey::new("user").unwrap();
        store.save(&key, &expired_credential(Some("ref1"))).unwrap();

        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_refresh()
            .times(1)
            .returning(|_| Ok(token("brief", None, 30)));
        endpoint
            .expect_exchange_code()
            .times(1)
            .returning(|_, _, _| Ok(token("tok6", Some("ref6"), 3600)));

        let prompt = SimulatedBrowser::granting("AGAIN");
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let result = flow.authorize(&key).await.unwrap();

        assert_eq!(result.source, CredentialSource::Authorized);
        assert_eq!(result.credential.access_token, "tok6");
        assert_eq!(store.load(&key), Some(result.credential));
    }

    #[tokio::test]
    async fn out_of_range_lifetime_is_an_exchange_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_exchange_code()
            .times(1)
            .returning(|_, _, _| Ok(token("tok", Some("ref"), 1_000_000_000_000_000)));

        let prompt = SimulatedBrowser::granting("BIG");
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let key = UserKey::new("user").unwrap();
        let err = flow.authorize(&key).await.unwrap_err();

        assert_eq!(err.stage(), "exchange");
        assert_eq!(store.load(&key), None);
    }

    #[tokio::test]
    async fn scope_change_requires_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let key = UserKey::new("user").unwrap();
        let mut stale = expired_credential(Some("ref1"));
        stale.expires_at = Utc::now() + Duration::seconds(3600);
        stale.scopes = ["email".to_string()].into_iter().collect();
        store.save(&key, &stale).unwrap();

        let config = config();
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_refresh().never();
        endpoint
            .expect_exchange_code()
            .times(1)
            .returning(|_, _, _| Ok(token("tok4", Some("ref4"), 3600)));

        let prompt = SimulatedBrowser::granting("C0DE");
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let result = flow.authorize(&key).await.unwrap();
        assert_eq!(result.source, CredentialSource::Authorized);
        assert!(result.credential.covers(&config.scopes));
    }

    #[tokio::test]
    async fn callback_timeout_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let config = config().with_callback_timeout(std::time::Duration::from_millis(50));
        let endpoint = MockTokenEndpoint::new();

        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &AbsentUser);
        let key = UserKey::new("user").unwrap();
        let err = flow.authorize(&key).await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::Authorization(AuthorizationFailure::Timeout)
        ));
        assert_eq!(err.stage(), "consent");
        assert_eq!(store.load(&key), None);
    }

    #[tokio::test]
    async fn denied_consent_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let config = config();
        let endpoint = MockTokenEndpoint::new();

        let prompt = SimulatedBrowser {
            query: vec![("error", "access_denied")],
        };
        let flow = AuthorizationFlow::new(&config, &store, &endpoint, &prompt);
        let key = UserKey::new("user").unwrap();
        let err = flow.authorize(&key).await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::Authorization(AuthorizationFailure::Denied(_))
        ));
        assert_eq!(store.load(&key), None);
    }

    #[test]
    fn authorization_url_carries_request_parameters() {
        let config = config();
        let url = build_authorization_url(
            &config,
            "http://127.0.0.1:4242/Callback",
            "st4te",
            "chall",
        );
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("accounts.example.com"));
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:4242/Callback");
        assert_eq!(params["scope"], DEFAULT_SCOPE);
        assert_eq!(params["state"], "st4te");
        assert_eq!(params["code_challenge_method"], "S256");
        assert!(!params.contains_key("client_secret"));
    }
}
