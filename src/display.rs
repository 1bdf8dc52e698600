use scraper::{Html, Node};

use crate::types::{Activity, Person};

const BANNER: &str = "==============================================================================";
const RULE: &str = "------------------------------------------------------------------------------";

// Render a person header block
pub fn format_person(person: &Person) -> String {
    let mut out = format!(
        "{}\nName: {}\nURL:  {}\nID:   {}\n",
        BANNER,
        person.display_name.as_deref().unwrap_or("(unknown)"),
        person.url.as_deref().unwrap_or("-"),
        person.id.as_deref().unwrap_or("-"),
    );
    if let Some(about) = person.about_me.as_deref().map(strip_html) {
        if !about.is_empty() {
            out.push_str(&format!("About: {}\n", about));
        }
    }
    out.push_str(RULE);
    out
}

// Render one activity as a single block of plain text
pub fn format_activity(activity: &Activity) -> String {
    let mut out = String::new();
    if let Some(published) = &activity.published {
        out.push_str(&format!("[{}] ", published));
    }
    out.push_str(&format!("Activity: {}", strip_html(activity.content())));
    if let Some(url) = &activity.url {
        out.push_str(&format!("\n  {}", url));
    }
    out
}

// Activity content is HTML; keep the text and turn paragraphs and breaks into newlines
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if matches!(el.name(), "br" | "p") => text.push('\n'),
            _ => {}
        }
    }
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityObject;

    #[test]
    fn test_strip_html_removes_tags_and_entities() {
        assert_eq!(
            strip_html("<b>Hello</b> &amp; welcome<br />to <a href=\"x\">Rust</a>"),
            "Hello & welcome\nto Rust"
        );
    }

    #[test]
    fn test_strip_html_decodes_numeric_entities() {
        assert_eq!(
            strip_html("It&#8217;s &#x27;here&#x27; <p class=\"x\">para</p>"),
            "It\u{2019}s 'here'\npara"
        );
    }

    #[test]
    fn test_format_person_shows_about_me() {
        let person = Person {
            id: Some("42".to_string()),
            display_name: Some("Marlon".to_string()),
            url: None,
            about_me: Some("<b>Rustacean</b> &amp; writer".to_string()),
        };
        let text = format_person(&person);
        assert!(text.contains("About: Rustacean & writer\n"));
        assert!(text.ends_with(RULE));
    }

    #[test]
    fn test_format_person_handles_missing_fields() {
        let person = Person {
            id: Some("42".to_string()),
            display_name: None,
            url: None,
            about_me: None,
        };
        let text = format_person(&person);
        assert!(text.contains("Name: (unknown)"));
        assert!(text.contains("ID:   42"));
        assert!(!text.contains("About:"));
    }

    #[test]
    fn test_format_activity_prefers_object_content() {
        let activity = Activity {
            id: Some("a1".to_string()),
            title: Some("Title".to_string()),
            url: Some("https://plus.google.com/a1".to_string()),
            published: Some("2013-05-01T12:00:00.000Z".to_string()),
            object: Some(ActivityObject {
                content: Some("<p>Body</p>".to_string()),
            }),
        };
        assert_eq!(
            format_activity(&activity),
            "[2013-05-01T12:00:00.000Z] Activity: Body\n  https://plus.google.com/a1"
        );
    }
}
