use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use yup_oauth2::ApplicationSecret;

use crate::error::AuthError;
use crate::oauth::credential::ScopeSet;

pub const DEFAULT_CLIENT_SECRETS_PATH: &str = "client_secrets.json";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/plus.me";
pub const DEFAULT_CALLBACK_PATH: &str = "/Callback";
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
}

// Keep the secret out of debug logs.
impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub auth_url: Url,
    pub token_url: Url,
}

/// Inclusive range of ports the callback listener may bind. `0-0` asks the
/// OS for an ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub const EPHEMERAL: PortRange = PortRange { start: 0, end: 0 };

    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::EPHEMERAL
    }
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (s.trim(), s.trim()),
        };
        let start: u16 = start
            .parse()
            .map_err(|e| format!("invalid port '{}': {}", start, e))?;
        let end: u16 = end
            .parse()
            .map_err(|e| format!("invalid port '{}': {}", end, e))?;
        if start > end {
            return Err(format!("port range {}-{} is reversed", start, end));
        }
        Ok(PortRange { start, end })
    }
}

/// Everything the authorization flow needs, validated once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub identity: ClientIdentity,
    pub endpoints: OAuthEndpoints,
    pub scopes: ScopeSet,
    pub redirect_host: IpAddr,
    pub redirect_ports: PortRange,
    pub callback_path: String,
    pub callback_timeout: Duration,
}

impl AuthConfig {
    /// Builds a config from Google's client secrets format with default
    /// listener settings.
    pub fn new(secret: &ApplicationSecret, scopes: ScopeSet) -> Result<Self, AuthError> {
        if secret.client_id.trim().is_empty() {
            return Err(AuthError::Configuration(
                "client secrets are missing client_id".to_string(),
            ));
        }
        if secret.client_secret.trim().is_empty() {
            return Err(AuthError::Configuration(
                "client secrets are missing client_secret".to_string(),
            ));
        }

        Ok(Self {
            identity: ClientIdentity {
                client_id: secret.client_id.clone(),
                client_secret: secret.client_secret.clone(),
            },
            endpoints: OAuthEndpoints {
                auth_url: parse_endpoint("auth_uri", &secret.auth_uri)?,
                token_url: parse_endpoint("token_uri", &secret.token_uri)?,
            },
            scopes,
            redirect_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            redirect_ports: PortRange::EPHEMERAL,
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        })
    }

    pub fn with_redirect_ports(mut self, ports: PortRange) -> Self {
        self.redirect_ports = ports;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.redirect_host, port, self.callback_path)
    }
}

fn parse_endpoint(field: &str, value: &str) -> Result<Url, AuthError> {
    Url::parse(value)
        .map_err(|e| AuthError::Configuration(format!("invalid {} '{}': {}", field, value, e)))
}

/// Reads the client secrets artifact (`installed` or `web` section).
pub async fn load_application_secret(path: &Path) -> Result<ApplicationSecret, AuthError> {
    yup_oauth2::read_application_secret(path)
        .await
        .map_err(|e| {
            AuthError::Configuration(format!(
                "failed to read client secrets from {}: {}",
                path.display(),
                e
            ))
        })
}
