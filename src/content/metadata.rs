use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

/// Only the head of a document is scanned for metadata.
const MAX_SCAN_BYTES: usize = 512 * 1024;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid regex")
});

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("valid regex"));

/// The parts of a page shown in a link preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute when the page URL was known.
    pub image: Option<String>,
}

impl PageMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }
}

/// Extracts title, description and preview image from an HTML document.
///
/// `og:title` wins over `<title>`, `og:description` over `description`.
/// A relative `og:image` is resolved against `base`.
pub fn parse_metadata(html: &str, base: Option<&Url>) -> PageMetadata {
    let html = head_of(html);
    let mut meta: HashMap<String, String> = HashMap::new();

    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for cap in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = cap[1].to_ascii_lowercase();
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map_or("", |m| m.as_str());
            match name.as_str() {
                "property" | "name" => key = Some(value.to_ascii_lowercase()),
                "content" => content = Some(value),
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            meta.entry(key).or_insert_with(|| decode_entities(content));
        }
    }

    let non_empty = |s: &String| !s.trim().is_empty();

    let title = meta
        .get("og:title")
        .filter(|s| non_empty(s))
        .cloned()
        .or_else(|| {
            TITLE_TAG
                .captures(html)
                .map(|c| decode_entities(c[1].trim()))
                .filter(non_empty)
        });
    let description = meta
        .get("og:description")
        .or_else(|| meta.get("description"))
        .filter(|s| non_empty(s))
        .cloned();
    let image = meta
        .get("og:image")
        .filter(|s| non_empty(s))
        .map(|raw| match base.map(|b| b.join(raw.trim())) {
            Some(Ok(abs)) => abs.to_string(),
            _ => raw.trim().to_owned(),
        });

    PageMetadata {
        title,
        description,
        image,
    }
}

fn head_of(html: &str) -> &str {
    if html.len() <= MAX_SCAN_BYTES {
        return html;
    }
    let mut end = MAX_SCAN_BYTES;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_owned();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_graph_tags() {
        let html = r#"<html><head>
            <title>Fallback</title>
            <meta property="og:title" content="Cats &amp; Dogs">
            <meta property="og:description" content='All about pets'>
            <meta property="og:image" content="/img/cover.jpg">
        </head></html>"#;
        let base = Url::parse("https://example.com/post/1").unwrap();

        assert_eq!(
            parse_metadata(html, Some(&base)),
            PageMetadata {
                title: Some("Cats & Dogs".into()),
                description: Some("All about pets".into()),
                image: Some("https://example.com/img/cover.jpg".into()),
            }
        );
    }

    #[test]
    fn test_fallbacks() {
        let html = r#"<head><TITLE> Plain page </TITLE>
            <meta content="Short summary" name="Description"></head>"#;
        let meta = parse_metadata(html, None);
        assert_eq!(meta.title.as_deref(), Some("Plain page"));
        assert_eq!(meta.description.as_deref(), Some("Short summary"));
        assert_eq!(meta.image, None);
    }

    #[test]
    fn test_first_tag_wins() {
        let html = r#"<meta property="og:title" content="One"><meta property="og:title" content="Two">"#;
        assert_eq!(parse_metadata(html, None).title.as_deref(), Some("One"));
    }

    #[test]
    fn test_no_metadata() {
        assert!(parse_metadata("<p>hello</p>", None).is_empty());
        assert!(parse_metadata("", None).is_empty());
    }
}
