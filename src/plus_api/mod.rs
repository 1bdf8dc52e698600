//! Google+ REST API calls split into logical submodules
//!
//! - people: people search and the signed-in user's profile
//! - activities: activity listing and retrieval

pub mod activities;
pub mod people;

pub use activities::{get_activity, list_activities};
pub use people::{get_profile, search_people};

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/plus/v1/";

/// Authenticated handle for API calls, scoped to a single run.
#[derive(Debug, Clone)]
pub struct PlusClient {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl PlusClient {
    pub fn new(client: reqwest::Client, base: &str, token: String) -> Result<Self, ApiError> {
        let mut base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        // Url::join drops the last segment unless the base ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> Result<T, ApiError> {
        debug!(%url, endpoint, "calling Google+ API");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ApiError::Status {
                endpoint,
                status,
                body,
            })
        }
    }
}
