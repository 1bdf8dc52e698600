use std::fmt;

/// Step of the authorization flow that talked to the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    Refresh,
    CodeExchange,
}

impl fmt::Display for NetworkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkStage::Refresh => f.write_str("token refresh"),
            NetworkStage::CodeExchange => f.write_str("code exchange"),
        }
    }
}

/// Why the interactive consent step did not produce an authorization code.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationFailure {
    #[error("user denied consent: {0}")]
    Denied(String),
    #[error("timed out waiting for the authorization callback")]
    Timeout,
    #[error("malformed redirect: {0}")]
    MalformedRedirect(String),
    #[error("callback listener failed: {0}")]
    Listener(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize credential: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
    #[error("network error during {stage}: {source}")]
    Network {
        stage: NetworkStage,
        #[source]
        source: reqwest::Error,
    },
    #[error("authorization failed: {0}")]
    Authorization(#[from] AuthorizationFailure),
    #[error("token endpoint rejected the request (HTTP {status}): {body}")]
    TokenExchange { status: u16, body: String },
}

impl AuthError {
    /// Short name of the failing stage, used when reporting to the user.
    pub fn stage(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "config",
            AuthError::Store(_) => "storage",
            AuthError::Network { .. } => "network",
            AuthError::Authorization(_) => "consent",
            AuthError::TokenExchange { .. } => "exchange",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Anything a CLI command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Google+ API error: {0}")]
    Api(#[from] ApiError),
}

impl AppError {
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.stage(),
            AppError::Api(_) => "api",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Auth(AuthError::Store(e))
    }
}
