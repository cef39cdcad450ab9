//! End-to-end behaviour of the proxy against a mock origin.

use std::time::Duration;

use axum::http::StatusCode;
use modproxy::config::SplitPolicy;

mod common;

#[tokio::test]
async fn test_serves_from_upstream() {
    let origin = common::start_origin(vec![(
        "/github.com/acme/lib/@v/list",
        200,
        b"v1.0.0\nv1.1.0\n".to_vec(),
    )])
    .await;
    let cache = tempfile::tempdir().unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let res = reqwest::get(proxy.url("/github.com/acme/lib/@v/list")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-modproxy-source"], "upstream");
    assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "v1.0.0\nv1.1.0\n");
    assert_eq!(origin.hits(), 1);
}

#[tokio::test]
async fn test_falls_back_to_local_cache() {
    let origin = common::start_origin(vec![]).await; // Everything 404
    let cache = tempfile::tempdir().unwrap();
    common::seed_cache(
        cache.path(),
        "github.com/!org/!project/@v/v1.2.3.mod",
        b"module github.com/Org/Project\n",
    );
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let res = reqwest::get(proxy.url("/github.com/!org/!project/@v/v1.2.3.mod"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-modproxy-source"], "local");
    assert_eq!(res.text().await.unwrap(), "module github.com/Org/Project\n");
    // Upstream saw the escaped address, exactly once.
    assert_eq!(origin.paths(), vec!["/github.com/!org/!project/@v/v1.2.3.mod"]);
}

#[tokio::test]
async fn test_empty_upstream_body_falls_back() {
    let origin =
        common::start_origin(vec![("/example.com/m/@v/v1.0.0.info", 200, Vec::new())]).await;
    let cache = tempfile::tempdir().unwrap();
    common::seed_cache(
        cache.path(),
        "example.com/m/@v/v1.0.0.info",
        br#"{"Version":"v1.0.0","Time":"2024-01-02T03:04:05Z"}"#,
    );
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let res = reqwest::get(proxy.url("/example.com/m/@v/v1.0.0.info")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-modproxy-source"], "local");
    assert_eq!(res.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_empty_chunked_upstream_body_falls_back() {
    let origin = common::start_raw_origin(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n0\r\n\r\n",
    )
    .await;
    let cache = tempfile::tempdir().unwrap();
    let info = br#"{"Version":"v1.0.0","Time":"2024-01-02T03:04:05Z"}"#;
    let archive: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    common::seed_cache(cache.path(), "example.com/m/@v/v1.0.0.info", info);
    common::seed_cache(cache.path(), "example.com/m/@v/v1.0.0.zip", &archive);
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let res = reqwest::get(proxy.url("/example.com/m/@v/v1.0.0.info")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-modproxy-source"], "local");
    assert_eq!(res.bytes().await.unwrap().to_vec(), info.to_vec());

    let res = reqwest::get(proxy.url("/example.com/m/@v/v1.0.0.zip")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-modproxy-source"], "local");
    assert_eq!(res.bytes().await.unwrap().to_vec(), archive);
    assert_eq!(origin.hits(), 2);
}

#[tokio::test]
async fn test_dot_segments_never_leave_cache() {
    let origin = common::start_origin(vec![]).await;
    let cache = tempfile::tempdir().unwrap();
    common::seed_cache(cache.path(), "example.com/m/@v/v1.0.0.mod", b"module example.com/m\n");
    std::fs::write(cache.path().join("secret.mod"), b"outside the download cache").unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    for path in [
        "/example.com/m/@v/../../../../../../../secret.mod",
        "/example.com/m/@v/../../../../../../../secret.info",
        "/example.com/../m/@v/v1.0.0.mod",
        "/example.com/./m/@v/list",
        "/example.com/m/@v/..mod",
    ] {
        let (status, body) = common::raw_get(proxy.addr, path).await;
        assert_eq!(status, 400, "{path}: {body}");
        assert!(!body.contains("outside the download cache"), "{path}");
    }
    assert_eq!(origin.hits(), 0);

    // The well-formed sibling still resolves.
    let (status, body) = common::raw_get(proxy.addr, "/example.com/m/@v/v1.0.0.mod").await;
    assert_eq!(status, 200);
    assert!(body.ends_with("module example.com/m\n"), "{body}");
}

#[tokio::test]
async fn test_exhaustion_reports_local_error() {
    let upstream = common::dead_address().await;
    let cache = tempfile::tempdir().unwrap();
    let proxy =
        common::start_proxy(common::test_config(&format!("http://{upstream}"), cache.path())).await;

    let res = reqwest::get(proxy.url("/example.com/m/@v/v1.0.0.zip")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers()["x-modproxy-source"], "local");
    let body = res.text().await.unwrap();
    assert!(body.starts_with("failed to run /nonexistent/go"), "{body}");
}

#[tokio::test]
async fn test_archive_streams_intact() {
    let archive: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
    let origin =
        common::start_origin(vec![("/example.com/m/@v/v2.0.0.zip", 200, archive.clone())]).await;
    let cache = tempfile::tempdir().unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let res = reqwest::get(proxy.url("/example.com/m/@v/v2.0.0.zip")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/zip");
    assert_eq!(res.bytes().await.unwrap().to_vec(), archive);
}

#[tokio::test]
async fn test_local_patterns_skip_upstream() {
    let origin = common::start_origin(vec![(
        "/git.corp.example/team/lib/@v/v0.1.0.mod",
        200,
        b"public".to_vec(),
    )])
    .await;
    let cache = tempfile::tempdir().unwrap();
    common::seed_cache(cache.path(), "git.corp.example/team/lib/@v/v0.1.0.mod", b"private\n");

    let mut config = common::test_config(&origin.url(), cache.path());
    config.routing.policy = SplitPolicy::Patterns;
    config.routing.local = vec!["*.corp.example".into()];
    let proxy = common::start_proxy(config).await;

    let res = reqwest::get(proxy.url("/git.corp.example/team/lib/@v/v0.1.0.mod"))
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "private\n");
    assert_eq!(origin.hits(), 0);
}

#[tokio::test]
async fn test_request_errors() {
    let origin = common::start_origin(vec![]).await;
    let cache = tempfile::tempdir().unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;
    let client = reqwest::Client::new();

    // Not a module request: ignored
    let res = client.get(proxy.url("/favicon.ico")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = client.get(proxy.url("/example.com/m/@v/v1.0.0.rar")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Bad escape
    let res = client.get(proxy.url("/github.com/!Org/@v/list")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Missing address
    let res = client.get(proxy.url("/@v/v1.0.0.zip")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(origin.hits(), 0);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let origin = common::start_origin(vec![(
        "/example.com/m/@latest",
        200,
        br#"{"Version":"v1.0.0"}"#.to_vec(),
    )])
    .await;
    let cache = tempfile::tempdir().unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let res = reqwest::Client::new()
        .get(proxy.url("/example.com/m/@latest"))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-42");
    assert_eq!(res.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_concurrent_requests() {
    let origin = common::start_origin(vec![(
        "/example.com/m/@v/v1.0.0.mod",
        200,
        b"module example.com/m\n".to_vec(),
    )])
    .await;
    let cache = tempfile::tempdir().unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    let client = reqwest::Client::new();
    let url = proxy.url("/example.com/m/@v/v1.0.0.mod");
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let (client, url) = (client.clone(), url.clone());
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let res = client.get(&url).send().await.unwrap();
                assert_eq!(res.status(), StatusCode::OK);
                assert_eq!(res.text().await.unwrap(), "module example.com/m\n");
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(origin.hits(), 200);
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let origin = common::start_origin(vec![]).await;
    let cache = tempfile::tempdir().unwrap();
    let proxy = common::start_proxy(common::test_config(&origin.url(), cache.path())).await;

    proxy.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), proxy.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
