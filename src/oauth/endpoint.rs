use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{AuthError, NetworkStage};
use crate::oauth::config::ClientIdentity;
use crate::oauth::credential::TokenResponse;

// Token endpoint calls sit behind a trait so the flow can be tested without a network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Trade an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError>;

    /// Trade a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;
}

/// Talks to the identity provider's token URL over HTTP.
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    token_url: Url,
    identity: ClientIdentity,
}

impl HttpTokenEndpoint {
    pub fn new(client: reqwest::Client, token_url: Url, identity: ClientIdentity) -> Self {
        Self {
            client,
            token_url,
            identity,
        }
    }

    async fn post_form(
        &self,
        stage: NetworkStage,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        debug!(url = %self.token_url, %stage, "calling token endpoint");
        let response = self
            .client
            .post(self.token_url.clone())
            .form(params)
            .send()
            .await
            .map_err(|source| AuthError::Network { stage, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| AuthError::Network { stage, source })?;

        if !status.is_success() {
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AuthError::TokenExchange {
            status: status.as_u16(),
            body: format!("invalid token response: {}", e),
        })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        self.post_form(
            NetworkStage::CodeExchange,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", &self.identity.client_id),
                ("client_secret", &self.identity.client_secret),
                ("code_verifier", code_verifier),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.post_form(
            NetworkStage::Refresh,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.identity.client_id),
                ("client_secret", &self.identity.client_secret),
            ],
        )
        .await
    }
}
