//! Derived views of raw content: rendered HTML, hashtags and mentions.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};

/// Format of an entity's raw content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Markdown source; rendered on demand.
    #[default]
    Markdown,
    /// Content arrived as HTML and is passed through.
    Html,
}

impl ContentType {
    /// MIME type used in ActivityPub `source` blocks.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown",
            Self::Html => "text/html",
        }
    }
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\{([\S ][^{}]+)\}").expect("mention regex is valid"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(^|\s)#([\w-]+)").expect("tag regex is valid"))
}

/// Render raw content for display.
///
/// Markdown is converted to HTML; HTML content is returned unchanged. When
/// `tag_base_url` is set, hashtags become links to `{tag_base_url}{tag}`.
/// Mentions in `@{Name; handle}` form render as `@Name`.
pub fn render(raw: &str, content_type: ContentType, tag_base_url: Option<&str>) -> String {
    if content_type == ContentType::Html {
        return raw.to_string();
    }
    let text = mention_re().replace_all(raw, |caps: &Captures<'_>| {
        let inner = &caps[1];
        let name = inner.split(';').next().unwrap_or(inner).trim();
        format!("@{}", name)
    });
    let text = match tag_base_url {
        Some(base) => tag_re()
            .replace_all(&text, |caps: &Captures<'_>| {
                format!(
                    "{}[#{}]({}{})",
                    &caps[1],
                    &caps[2],
                    base,
                    urlencoding::encode(&caps[2].to_lowercase())
                )
            })
            .into_owned(),
        None => text.into_owned(),
    };
    let mut rendered = String::new();
    html::push_html(&mut rendered, Parser::new_ext(&text, Options::empty()));
    rendered.trim_end().to_string()
}

/// Hashtags in `raw`, lower-cased, deduplicated and sorted.
pub fn tags(raw: &str) -> Vec<String> {
    let found: BTreeSet<String> = tag_re()
        .captures_iter(raw)
        .map(|caps| caps[2].trim_matches('-').to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();
    found.into_iter().collect()
}

/// Handles mentioned as `@{Name; handle}` or `@{handle}`.
pub fn extract_mentions(raw: &str) -> BTreeSet<String> {
    mention_re()
        .captures_iter(raw)
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str();
            let handle = inner.rsplit(';').next()?.trim();
            (!handle.is_empty()).then(|| handle.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown() {
        assert_eq!(
            render("**hi** there", ContentType::Markdown, None),
            "<p><strong>hi</strong> there</p>"
        );
    }

    #[test]
    fn test_render_html_passthrough() {
        let html = "<p>already <b>html</b></p>";
        assert_eq!(render(html, ContentType::Html, None), html);
    }

    #[test]
    fn test_render_tag_links_and_mentions() {
        let out = render(
            "hello @{Bob; bob@example.com} #Rust",
            ContentType::Markdown,
            Some("https://example.com/tag/"),
        );
        assert!(out.contains("@Bob"));
        assert!(out.contains(r#"<a href="https://example.com/tag/rust">#Rust</a>"#));
    }

    #[test]
    fn test_tags() {
        assert_eq!(
            tags("#Zebra and #apple, also #apple again and not#this"),
            vec!["apple".to_string(), "zebra".to_string()]
        );
        assert!(tags("no tags here # lonely").is_empty());
    }

    #[test]
    fn test_extract_mentions() {
        let mentions = extract_mentions(
            "hi @{Jason Robinson; jaywink@jasonrobinson.me} and @{foobar@example.com}",
        );
        assert_eq!(
            mentions.into_iter().collect::<Vec<_>>(),
            vec![
                "foobar@example.com".to_string(),
                "jaywink@jasonrobinson.me".to_string()
            ]
        );
    }
}
