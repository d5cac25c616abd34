use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::content::{media_kind_for_url, MediaKind};
use crate::trust::TrustPolicy;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhttps?://\S+").expect("valid regex"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

/// Byte ranges of URLs in `text`, trailing punctuation excluded.
fn url_spans(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    URL_PATTERN.find_iter(text).filter_map(|m| {
        let trimmed = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        // "https://" alone after trimming is not a URL
        (trimmed.len() > m.as_str().find("://").map_or(0, |i| i + 3))
            .then(|| (m.start(), m.start() + trimmed.len()))
    })
}

/// Every distinct http(s) URL in `text`, in order of first appearance.
///
/// ```
/// use murmur::inline::extract_urls;
///
/// let urls = extract_urls("look https://i.imgur.com/a.png, and (https://x.test/b.gif)!");
/// assert_eq!(urls, vec!["https://i.imgur.com/a.png", "https://x.test/b.gif"]);
/// ```
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for (start, end) in url_spans(text) {
        let url = &text[start..end];
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_owned());
        }
    }
    urls
}

/// Image, video, or `None` for anything else, judged by extension.
pub fn classify(url: &str) -> Option<MediaKind> {
    Url::parse(url).ok().as_ref().and_then(media_kind_for_url)
}

/// Where clicking a link goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    /// Trusted host; opened directly.
    Direct,
    /// Goes through the confirmation dialog.
    ConfirmFirst,
}

/// A piece of message text for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link { url: String, target: LinkTarget },
}

/// Splits `text` into plain runs and links.
pub fn segments(text: &str, policy: &TrustPolicy) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for (start, end) in url_spans(text) {
        if start > cursor {
            out.push(Segment::Text(text[cursor..start].to_owned()));
        }
        let url = &text[start..end];
        let target = if policy.is_trusted(url) {
            LinkTarget::Direct
        } else {
            LinkTarget::ConfirmFirst
        };
        out.push(Segment::Link {
            url: url.to_owned(),
            target,
        });
        cursor = end;
    }
    if cursor < text.len() {
        out.push(Segment::Text(text[cursor..].to_owned()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_strips_trailing_punctuation() {
        assert_eq!(
            extract_urls("see https://a.com/x.png. then https://b.com/y?z=1!?"),
            vec!["https://a.com/x.png", "https://b.com/y?z=1"]
        );
        assert_eq!(
            extract_urls("quoted \"https://a.com/q\" and [https://a.com/r]"),
            vec!["https://a.com/q", "https://a.com/r"]
        );
    }

    #[test]
    fn test_extract_runs_to_whitespace() {
        assert_eq!(
            extract_urls("a https://a.com/x?q=<b>&r=\"c\" b"),
            vec!["https://a.com/x?q=<b>&r=\"c"]
        );
    }

    #[test]
    fn test_extract_dedupes_in_order() {
        assert_eq!(
            extract_urls("https://b.com/1 https://a.com/2 https://b.com/1"),
            vec!["https://b.com/1", "https://a.com/2"]
        );
    }

    #[test]
    fn test_extract_ignores_other_schemes() {
        assert!(extract_urls("ftp://a.com/x.png mailto:x@y.z https://").is_empty());
        assert!(extract_urls("").is_empty());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("https://a.com/x.GIF"), Some(MediaKind::Image));
        assert_eq!(classify("https://a.com/x.jpeg?w=2"), Some(MediaKind::Image));
        assert_eq!(classify("https://a.com/clip.mov"), Some(MediaKind::Video));
        assert_eq!(classify("https://a.com/page"), None);
        assert_eq!(classify("https://a.com/archive.zip"), None);
        assert_eq!(classify("not a url.png"), None);
    }

    #[tokio::test]
    async fn test_segments() {
        let policy = TrustPolicy::in_memory().await;
        let segs = segments("hi https://i.imgur.com/a.png and https://evil.test/b.png.", &policy);
        assert_eq!(
            segs,
            vec![
                Segment::Text("hi ".into()),
                Segment::Link {
                    url: "https://i.imgur.com/a.png".into(),
                    target: LinkTarget::Direct
                },
                Segment::Text(" and ".into()),
                Segment::Link {
                    url: "https://evil.test/b.png".into(),
                    target: LinkTarget::ConfirmFirst
                },
                Segment::Text(".".into()),
            ]
        );
    }
}
