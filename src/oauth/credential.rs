use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::AuthError;

/// Tokens expiring within this window are treated as already expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Identifies whose credential is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey(String);

impl UserKey {
    pub fn new(key: impl Into<String>) -> Result<Self, AuthError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AuthError::Configuration(
                "user key must not be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, de-duplicated list of requested scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for scope in scopes {
            let scope = scope.into();
            let scope = scope.trim();
            if !scope.is_empty() && !ordered.iter().any(|s| s == scope) {
                ordered.push(scope.to_string());
            }
        }
        if ordered.is_empty() {
            return Err(AuthError::Configuration(
                "at least one scope must be requested".to_string(),
            ));
        }
        Ok(Self(ordered))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Space separated form used in the authorization URL.
    pub fn to_param(&self) -> String {
        self.0.join(" ")
    }

    pub fn to_set(&self) -> BTreeSet<String> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: BTreeSet<String>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_empty()
            || now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn covers(&self, scopes: &ScopeSet) -> bool {
        self.scopes == scopes.to_set()
    }
}

/// Body returned by the token endpoint for both code and refresh grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Converts the response into a credential issued at `now`.
    ///
    /// A missing `scope` means the requested scopes were granted as-is, and
    /// a missing `refresh_token` keeps `previous_refresh` (refresh grants
    /// usually do not rotate it). A negative or unrepresentable `expires_in`
    /// is rejected as an invalid token response.
    pub fn into_credential(
        self,
        requested: &ScopeSet,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Credential, AuthError> {
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = Duration::try_seconds(expires_in)
            .filter(|_| expires_in >= 0)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::TokenExchange {
                status: 200,
                body: format!("invalid expires_in: {}", expires_in),
            })?;
        let scopes = match self.scope.as_deref() {
            Some(granted) if !granted.trim().is_empty() => granted
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            _ => requested.to_set(),
        };
        Ok(Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
            scopes,
        })
    }
}
