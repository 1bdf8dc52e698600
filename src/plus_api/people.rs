use super::PlusClient;
use crate::error::ApiError;
use crate::types::{PeopleFeed, Person};

/// The people search endpoint accepts at most this many results per page.
pub const MAX_SEARCH_RESULTS: u32 = 50;

// Search for people by name
pub async fn search_people(
    client: &PlusClient,
    query: &str,
    max_results: u32,
) -> Result<Vec<Person>, ApiError> {
    let mut url = client.url(&["people"]);
    url.query_pairs_mut()
        .append_pair("query", query)
        .append_pair(
            "maxResults",
            &max_results.clamp(1, MAX_SEARCH_RESULTS).to_string(),
        );
    let feed: PeopleFeed = client.get_json("people.search", url).await?;
    Ok(feed.items)
}

// Fetch the signed-in user's profile
pub async fn get_profile(client: &PlusClient) -> Result<Person, ApiError> {
    let url = client.url(&["people", "me"]);
    client.get_json("people.get", url).await
}
