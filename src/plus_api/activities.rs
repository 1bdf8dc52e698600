use super::PlusClient;
use crate::error::ApiError;
use crate::types::{Activity, ActivityFeed};

pub const MAX_ACTIVITY_RESULTS: u32 = 100;

// List a user's public activities, newest first
pub async fn list_activities(
    client: &PlusClient,
    user_id: &str,
    max_results: u32,
) -> Result<Vec<Activity>, ApiError> {
    let mut url = client.url(&["people", user_id, "activities", "public"]);
    url.query_pairs_mut().append_pair(
        "maxResults",
        &max_results.clamp(1, MAX_ACTIVITY_RESULTS).to_string(),
    );
    let feed: ActivityFeed = client.get_json("activities.list", url).await?;
    Ok(feed.items)
}

// Fetch a single activity by id
pub async fn get_activity(client: &PlusClient, activity_id: &str) -> Result<Activity, ApiError> {
    let url = client.url(&["activities", activity_id]);
    client.get_json("activities.get", url).await
}
