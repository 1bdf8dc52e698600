use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Person {
    pub id: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "aboutMe")]
    pub about_me: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeopleFeed {
    #[serde(default)]
    pub items: Vec<Person>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Activity {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub published: Option<String>,
    pub object: Option<ActivityObject>,
}

impl Activity {
    /// Body text of the activity, falling back to its title.
    pub fn content(&self) -> &str {
        self.object
            .as_ref()
            .and_then(|o| o.content.as_deref())
            .or(self.title.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ActivityObject {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityFeed {
    #[serde(default)]
    pub items: Vec<Activity>,
}
