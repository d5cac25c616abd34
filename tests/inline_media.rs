//! Inline media against a local HTTP server.
//!
//! The mock server's address is added to the trust seed and the fetcher is
//! allowed to reach loopback; everything else runs as in the binary.

use murmur::content::{BlobRegistry, BlobResolver, HttpFetcher, LinkPreview, MediaKind};
use murmur::inline::{EmbedAction, InlineMediaView, LinkTarget, Segment};
use murmur::storage::MemoryStore;
use murmur::trust::{TrustPolicy, DEFAULT_TRUSTED_DOMAINS};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MP4: &[u8] = b"\0\0\0\x18ftypisom\0\0\0\0";

async fn setup(max_bytes: usize) -> (InlineMediaView, Arc<BlobRegistry>) {
    let mut seed: Vec<&str> = DEFAULT_TRUSTED_DOMAINS.to_vec();
    seed.push("127.0.0.1");
    let policy = Arc::new(TrustPolicy::load_with_seed(Arc::new(MemoryStore::new()), seed).await);
    let fetcher = HttpFetcher::new(Duration::from_secs(5), max_bytes)
        .unwrap()
        .allow_loopback(true);
    let blobs = BlobRegistry::new();
    let resolver = BlobResolver::new(policy, Arc::new(fetcher), blobs.clone());
    (InlineMediaView::new(Arc::new(resolver)), blobs)
}

async fn mount_mp4(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_trusted_media_embeds_and_untrusted_links_confirm() {
    let server = MockServer::start().await;
    mount_mp4(&server, "/clip.mp4", MP4.to_vec()).await;
    let (mut view, blobs) = setup(1024).await;

    let text = format!(
        "look https://i.imgur.com/a.png and {}/clip.mp4 but not https://evil.test/b.png",
        server.uri()
    );
    let embeds = view.show("m1", &text).await;

    assert_eq!(embeds.len(), 2);
    assert_eq!(embeds[0].media.source_url.as_str(), "https://i.imgur.com/a.png");
    assert_eq!(embeds[0].action, EmbedAction::OpenViewer);
    // Trusted image URLs are shown directly, without a download
    assert!(embeds[0].media.local_ref.is_none());

    assert_eq!(embeds[1].action, EmbedAction::NativePlayback);
    let local = embeds[1].media.local_ref.as_ref().unwrap();
    assert!(local.url().starts_with("blob:"));
    assert_eq!(local.mime(), Some("video/mp4"));
    assert_eq!(blobs.bytes(local).unwrap().as_ref(), MP4);
    assert_eq!(blobs.live(), 1);

    let targets: Vec<(String, LinkTarget)> = view
        .segments(&text)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Link { url, target } => Some((url, target)),
            Segment::Text(_) => None,
        })
        .collect();
    assert_eq!(targets[0].1, LinkTarget::Direct);
    assert_eq!(targets[2], ("https://evil.test/b.png".to_string(), LinkTarget::ConfirmFirst));
}

#[tokio::test]
async fn test_oversized_media_is_dropped() {
    let server = MockServer::start().await;
    mount_mp4(&server, "/big.mp4", vec![0u8; 4096]).await;
    let (mut view, blobs) = setup(1024).await;

    let embeds = view.show("m1", &format!("{}/big.mp4", server.uri())).await;
    assert!(embeds.is_empty());
    assert_eq!(blobs.created(), 0);
}

#[tokio::test]
async fn test_http_error_page_is_not_embedded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>Not Found</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (mut view, blobs) = setup(1024).await;

    let embeds = view.show("m1", &format!("{}/gone.mp4", server.uri())).await;
    assert!(embeds.is_empty());
    assert_eq!(blobs.created(), 0);
}

#[tokio::test]
async fn test_trusted_page_preview_reads_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<html><head><title>A post</title>
                    <meta property="og:description" content="Something happened"></head></html>"#,
                    "text/html; charset=utf-8",
                ),
        )
        .mount(&server)
        .await;
    let (view, _) = setup(1024).await;

    let url = Url::parse(&format!("{}/post", server.uri())).unwrap();
    match view.resolver().preview(&url).await {
        LinkPreview::Page(page) => {
            assert_eq!(page.title.as_deref(), Some("A post"));
            assert_eq!(page.description.as_deref(), Some("Something happened"));
        }
        other => panic!("expected page preview, got {:?}", other),
    }

    // Untrusted hosts are never fetched
    let untrusted = Url::parse("https://evil.test/post").unwrap();
    assert!(matches!(
        view.resolver().preview(&untrusted).await,
        LinkPreview::HostOnly { host, .. } if host == "evil.test"
    ));
}

#[tokio::test]
async fn test_repeated_mounts_release_every_blob() {
    let server = MockServer::start().await;
    mount_mp4(&server, "/a.mp4", MP4.to_vec()).await;
    mount_mp4(&server, "/b.mp4", MP4.to_vec()).await;
    let (mut view, blobs) = setup(1024).await;

    for i in 0..10 {
        let route = if i % 2 == 0 { "a" } else { "b" };
        let embeds = view
            .show(&format!("m{i}"), &format!("{}/{}.mp4", server.uri(), route))
            .await;
        assert_eq!(embeds.len(), 1);
        assert_eq!(embeds[0].media.kind, MediaKind::Video);
        assert_eq!(blobs.live(), 1);
    }
    view.unmount();

    assert_eq!(blobs.created(), 10);
    assert_eq!(blobs.released(), 10);
    assert_eq!(blobs.live(), 0);
}
