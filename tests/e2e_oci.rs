//! End-to-end resolution against a stub OCI distribution server

use std::sync::Arc;

use mockito::{Matcher, Server};

use tagpin::config::RegistryConfig;
use tagpin::image::error::{RegistryError, ResolveError};
use tagpin::image::policy::{RegexSelection, SemverSelection};
use tagpin::image::registries::OciRegistry;
use tagpin::image::resolver::TagSelectedResolver;
use tagpin::image::types::Origin;

const DIGEST: &str = "sha256:6457d53fb065d6f250e1504b9bc42d5b6c65941d57532c072d929dd0628977d0";

fn create_resolver() -> TagSelectedResolver {
    let registry = Arc::new(OciRegistry::new(&RegistryConfig::default()).unwrap());
    TagSelectedResolver::new(registry.clone(), registry)
}

#[tokio::test(flavor = "multi_thread")]
async fn resolves_highest_semver_tag_to_manifest_digest() {
    let mut server = Server::new_async().await;
    let tags = server
        .mock("GET", "/v2/org/app/tags/list")
        .match_query(Matcher::Exact("n=1000".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "org/app", "tags": ["v1.9.0", "v1.10.0", "v2.0.0-rc.1", "latest"]}"#)
        .create_async()
        .await;
    let manifest = server
        .mock("HEAD", "/v2/org/app/manifests/v1.10.0")
        .with_status(200)
        .with_header("docker-content-digest", DIGEST)
        .create_async()
        .await;

    let reference = format!("{}/org/app", server.host_with_port());
    let result = create_resolver()
        .resolve(&reference, &SemverSelection::new().into())
        .await
        .unwrap();

    tags.assert_async().await;
    manifest.assert_async().await;
    assert_eq!(result.url, format!("{}@{}", reference, DIGEST));
    assert_eq!(
        result.origins,
        vec![Origin::Resolved {
            url: format!("{}:v1.10.0", reference),
            tag: "v1.10.0".to_string(),
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn resolves_regex_tag_across_pages() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/v2/org/web/tags/list")
        .match_query(Matcher::Exact("n=1000".to_string()))
        .with_status(200)
        .with_header("link", r#"</v2/org/web/tags/list?n=1000&last=main-001>; rel="next""#)
        .with_body(r#"{"tags": ["main-001"]}"#)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/v2/org/web/tags/list")
        .match_query(Matcher::Exact("n=1000&last=main-001".to_string()))
        .with_status(200)
        .with_body(r#"{"tags": ["main-002", "pr-9"]}"#)
        .create_async()
        .await;
    let manifest = server
        .mock("HEAD", "/v2/org/web/manifests/main-002")
        .with_status(200)
        .with_header("docker-content-digest", DIGEST)
        .create_async()
        .await;

    let reference = format!("{}/org/web", server.host_with_port());
    let result = create_resolver()
        .resolve(&reference, &RegexSelection::new("^main-").into())
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    manifest.assert_async().await;
    assert_eq!(result.url, format!("{}@{}", reference, DIGEST));
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_missing_repository_without_fetching_manifest() {
    let mut server = Server::new_async().await;
    let tags = server
        .mock("GET", "/v2/org/gone/tags/list")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let manifest = server
        .mock("HEAD", Matcher::Regex("^/v2/org/gone/manifests/".to_string()))
        .expect(0)
        .create_async()
        .await;

    let reference = format!("{}/org/gone", server.host_with_port());
    let result = create_resolver()
        .resolve(&reference, &SemverSelection::new().into())
        .await;

    tags.assert_async().await;
    manifest.assert_async().await;
    assert!(matches!(
        result,
        Err(ResolveError::RegistryList {
            source: RegistryError::NotFound(_),
            ..
        })
    ));
}
