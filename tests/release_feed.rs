//! Release feed and archive download tests against a mock HTTP server.
//!
//! ureq is blocking, so every client call runs on `spawn_blocking` while the
//! mock server lives on the tokio runtime.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use handoff::config::FeedConfig;
use handoff::update::fetcher::{ArchiveFetcher, HttpFetcher};
use handoff::update::{Release, UpdateChecker, UpdateState};
use handoff::UpdateError;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

fn feed(server: &MockServer) -> FeedConfig {
    FeedConfig {
        releases_url: format!("{}/releases/latest", server.uri()),
        ..FeedConfig::default()
    }
}

fn release_payload(server: &MockServer, tag: &str) -> serde_json::Value {
    json!({
        "tag_name": tag,
        "body": "Bug fixes",
        "assets": [
            {
                "name": "app-windows.zip",
                "browser_download_url": format!("{}/download/app-windows.zip", server.uri()),
                "size": 4
            },
            {
                "name": "app-windows.zip.sha256",
                "browser_download_url": format!("{}/download/app-windows.zip.sha256", server.uri()),
                "size": 80
            }
        ]
    })
}

async fn check(
    feed: FeedConfig,
    current: &str,
    mut state: UpdateState,
) -> (Result<Option<Release>, UpdateError>, UpdateState) {
    let current = current.to_owned();
    tokio::task::spawn_blocking(move || {
        let checker = UpdateChecker::new(&feed, current);
        let result = checker.check_for_updates(&mut state);
        (result, state)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn newer_release_is_reported_with_checksum() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_payload(&server, "v2.0.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/app-windows.zip.sha256"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("{DIGEST}  app-windows.zip\n")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (result, state) = check(feed(&server), "1.0.0", UpdateState::default()).await;
    let release = result.unwrap().expect("update should be available");

    assert_eq!(release.version, "2.0.0");
    assert_eq!(release.asset_name, "app-windows.zip");
    assert_eq!(release.sha256.as_deref(), Some(DIGEST));
    assert!(state.last_check.is_some());
}

#[tokio::test]
async fn same_version_is_up_to_date_and_caches_etag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"feed-v1\"")
                .set_body_json(release_payload(&server, "v1.0.0")),
        )
        .mount(&server)
        .await;

    let (result, state) = check(feed(&server), "1.0.0", UpdateState::default()).await;
    assert!(result.unwrap().is_none());
    assert_eq!(state.etag.as_deref(), Some("\"feed-v1\""));
}

#[tokio::test]
async fn cached_etag_is_sent_and_304_means_no_update() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .and(header("If-None-Match", "\"feed-v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let state = UpdateState {
        etag: Some("\"feed-v1\"".to_owned()),
        ..UpdateState::default()
    };
    let (result, state) = check(feed(&server), "1.0.0", state).await;
    assert!(result.unwrap().is_none());
    assert!(state.last_check.is_some());
}

#[tokio::test]
async fn dismissed_release_is_not_offered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_payload(&server, "v2.0.0")))
        .mount(&server)
        .await;

    let state = UpdateState {
        dismissed_release: Some("2.0.0".to_owned()),
        ..UpdateState::default()
    };
    let (result, _) = check(feed(&server), "1.0.0", state).await;
    assert!(result.unwrap().is_none());
}

#[tokio::test]
async fn server_error_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (result, _) = check(feed(&server), "1.0.0", UpdateState::default()).await;
    assert!(matches!(result, Err(UpdateError::Network(_))));
}

#[tokio::test]
async fn http_fetcher_streams_archive_to_destination() {
    let server = MockServer::start().await;
    let body = vec![7u8; 200_000];
    Mock::given(method("GET"))
        .and(path("/download/app-windows.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("app.zip.download");
    let release = Release::from_url("2.0.0", format!("{}/download/app-windows.zip", server.uri()));
    let feed = feed(&server);

    let (written, reports, dest) = tokio::task::spawn_blocking(move || {
        let fetcher = HttpFetcher::new(&feed);
        let mut reports = Vec::new();
        let written = fetcher
            .fetch(&release, &dest, &mut |done, total| {
                reports.push((done, total));
                Ok(())
            })
            .unwrap();
        (written, reports, dest)
    })
    .await
    .unwrap();

    assert_eq!(written, 200_000);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(reports.first(), Some(&(0, Some(200_000))));
    assert_eq!(reports.last().map(|r| r.0), Some(200_000));
    assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    drop(dir);
}

#[tokio::test]
async fn http_fetcher_missing_asset_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/app-windows.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("app.zip.download");
    let release = Release::from_url("2.0.0", format!("{}/download/app-windows.zip", server.uri()));
    let feed = feed(&server);

    let result = tokio::task::spawn_blocking(move || {
        HttpFetcher::new(&feed).fetch(&release, &dest, &mut |_, _| Ok(()))
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(UpdateError::Network(_))));
}

#[tokio::test]
async fn http_fetcher_aborted_download_leaves_no_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/app-windows.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 200_000]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("app.zip.download");
    let release = Release::from_url("2.0.0", format!("{}/download/app-windows.zip", server.uri()));
    let feed = feed(&server);

    let (result, dest) = tokio::task::spawn_blocking(move || {
        let result = HttpFetcher::new(&feed).fetch(&release, &dest, &mut |done, _| {
            if done > 0 {
                Err(UpdateError::Cancelled)
            } else {
                Ok(())
            }
        });
        (result, dest)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(UpdateError::Cancelled)));
    assert!(!dest.exists());
    assert!(!dir.path().join("app.zip.download.part").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
