//! Integration tests for the fetcher
//!
//! These tests use wiremock to stand in for a WebDriver hub and drive the
//! full acquire, navigate, dwell, extract, release cycle end-to-end.

use serde_json::json;
use std::time::{Duration, Instant};
use sumi_render::browser::RemoteHub;
use sumi_render::config::FetchConfig;
use sumi_render::fetch::{Fetcher, RENDER_TIMEOUT_HEADER};
use sumi_render::{fetch, fetch_with_cancel, ConfigError, Outcome};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION_ID: &str = "sess-1";
const ELEMENT_ID: &str = "el-html";
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Creates a config pointing at the mock hub
fn hub_config(server: &MockServer, render_min_ms: u64) -> FetchConfig {
    FetchConfig {
        render_min_ms,
        hub_host: server.address().ip().to_string(),
        hub_port: server.address().port(),
        ..FetchConfig::default()
    }
}

fn session_path(suffix: &str) -> String {
    format!("/wd/hub/session/{}{}", SESSION_ID, suffix)
}

fn null_value() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": null }))
}

fn driver_error(error: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(json!({
        "value": { "error": error, "message": message, "stacktrace": "" }
    }))
}

async fn mount_new_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": {
                "sessionId": SESSION_ID,
                "capabilities": { "browserName": "firefox" }
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_timeouts(server: &MockServer, page_load_ms: u64) {
    Mock::given(method("POST"))
        .and(path(session_path("/timeouts")))
        .and(body_json(json!({ "pageLoad": page_load_ms })))
        .respond_with(null_value())
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_navigation(server: &MockServer, target: &str, reply: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(session_path("/url")))
        .and(body_json(json!({ "url": target })))
        .respond_with(reply)
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_dom(server: &MockServer, inner_html: &str, current_url: &str) {
    Mock::given(method("POST"))
        .and(path(session_path("/element")))
        .and(body_json(json!({ "using": "tag name", "value": "html" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { W3C_ELEMENT_KEY: ELEMENT_ID }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(session_path(&format!(
            "/element/{}/property/innerHTML",
            ELEMENT_ID
        ))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": inner_html })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(session_path("/url")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": current_url })))
        .mount(server)
        .await;
}

async fn mount_quit(server: &MockServer, times: u64) {
    Mock::given(method("DELETE"))
        .and(path(session_path("")))
        .respond_with(null_value())
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_happy_path_captures_rendered_dom() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/hello";
    let markup = r#"<head></head><body><p id="x">hi</p></body>"#;

    mount_new_session(&server).await;
    mount_timeouts(&server, 100).await;
    mount_navigation(&server, target, null_value()).await;
    mount_dom(&server, markup, target).await;
    mount_quit(&server, 1).await;

    let response = fetch(target, 5000, &hub_config(&server, 100))
        .await
        .expect("config is valid");

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.outcome(), Outcome::Ok);
    assert_eq!(response.body(), markup.as_bytes());
    assert!(response.header(RENDER_TIMEOUT_HEADER).is_none());
    assert_eq!(response.final_url().as_str(), target);

    server.verify().await;
}

#[tokio::test]
async fn test_script_injected_content_is_captured() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/scripted";

    mount_new_session(&server).await;
    mount_timeouts(&server, 500).await;
    mount_navigation(&server, target, null_value()).await;
    // The hub reports the DOM as mutated by the page's inline script
    mount_dom(
        &server,
        "<head></head><body><script>document.body.append('')</script><span>Z</span></body>",
        target,
    )
    .await;
    mount_quit(&server, 1).await;

    let started = Instant::now();
    let response = fetch(target, 5000, &hub_config(&server, 500))
        .await
        .expect("config is valid");

    // The dwell runs for the full render floor
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(response.status_code(), 200);
    assert!(String::from_utf8_lossy(response.body()).contains("<span>Z</span>"));
}

#[tokio::test]
async fn test_render_timeout_returns_partial_dom() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/slow";

    mount_new_session(&server).await;
    mount_timeouts(&server, 1500).await;
    mount_navigation(
        &server,
        target,
        driver_error("timeout", "Timed out after 1500 ms").set_delay(Duration::from_millis(1500)),
    )
    .await;
    mount_dom(&server, "<head></head><body><p>partial</p></body>", target).await;
    mount_quit(&server, 1).await;

    let started = Instant::now();
    let response = fetch(target, 5000, &hub_config(&server, 1500))
        .await
        .expect("config is valid");

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.outcome(), Outcome::RenderTimeout);
    assert!(String::from_utf8_lossy(response.body()).contains("partial"));
    assert_eq!(response.header("X-Render-Timeout"), Some("true"));
    // No dwell after a timed-out load
    assert!(started.elapsed() < Duration::from_millis(5000));

    server.verify().await;
}

#[tokio::test]
async fn test_hub_down_yields_empty_response() {
    let config = FetchConfig {
        hub_host: "127.0.0.1".to_string(),
        hub_port: 1,
        render_min_ms: 100,
        ..FetchConfig::default()
    };

    let response = fetch("http://localhost:8080/hello", 5000, &config)
        .await
        .expect("hub failures are not errors");

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::SessionUnavailable);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn test_malformed_hub_url_yields_empty_response() {
    let config = FetchConfig {
        hub_host: "not a host".to_string(),
        ..FetchConfig::default()
    };

    let response = fetch("http://localhost:8080/hello", 5000, &config)
        .await
        .expect("hub failures are not errors");

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::SessionUnavailable);
}

#[tokio::test]
async fn test_rejected_capabilities_yield_session_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .respond_with(driver_error(
            "session not created",
            "Could not start a new session. No matching capabilities",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_quit(&server, 0).await;

    let response = fetch("http://localhost:8080/hello", 5000, &hub_config(&server, 100))
        .await
        .expect("hub failures are not errors");

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::SessionUnavailable);
    server.verify().await;
}

#[tokio::test]
async fn test_cancellation_during_dwell_interrupts_and_releases() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/forever";

    mount_new_session(&server).await;
    mount_timeouts(&server, 10_000).await;
    mount_navigation(&server, target, null_value()).await;
    mount_dom(&server, "<body>never read</body>", target).await;
    mount_quit(&server, 1).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let response = fetch_with_cancel(target, 0, &hub_config(&server, 10_000), &cancel)
        .await
        .expect("config is valid");
    let elapsed = started.elapsed();

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::Interrupted);
    assert!(response.body().is_empty());
    assert!(elapsed <= Duration::from_millis(400), "took {:?}", elapsed);

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(
        !requests
            .iter()
            .any(|r| r.url.path().ends_with("/property/innerHTML")),
        "DOM must not be read after an interrupt"
    );
    server.verify().await;
}

#[tokio::test]
async fn test_cancelled_before_start_opens_no_session() {
    let server = MockServer::start().await;
    mount_quit(&server, 0).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = fetch_with_cancel(
        "http://localhost:8080/hello",
        5000,
        &hub_config(&server, 100),
        &cancel,
    )
    .await
    .expect("config is valid");

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::Interrupted);

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(
        !requests
            .iter()
            .any(|r| r.method.to_string() == "POST" && r.url.path() == "/wd/hub/session"),
        "no session may be requested once cancelled"
    );
    server.verify().await;
}

async fn mount_hung_element_lookup(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(session_path("/element")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": { W3C_ELEMENT_KEY: ELEMENT_ID } }))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_hung_hub_command_hits_deadline() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/hello";

    mount_new_session(&server).await;
    mount_timeouts(&server, 0).await;
    mount_navigation(&server, target, null_value()).await;
    mount_hung_element_lookup(&server).await;
    mount_quit(&server, 1).await;

    let config = FetchConfig {
        hub_command_timeout_ms: 300,
        ..hub_config(&server, 0)
    };

    let started = Instant::now();
    let response = tokio::time::timeout(Duration::from_secs(5), fetch(target, 1000, &config))
        .await
        .expect("fetch returns on its own")
        .expect("config is valid");

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::NavigationFailed);
    assert!(response.body().is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
    server.verify().await;
}

#[tokio::test]
async fn test_cancellation_during_hung_extraction() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/hello";

    mount_new_session(&server).await;
    mount_timeouts(&server, 0).await;
    mount_navigation(&server, target, null_value()).await;
    mount_hung_element_lookup(&server).await;
    mount_quit(&server, 1).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        fetch_with_cancel(target, 1000, &hub_config(&server, 0), &cancel),
    )
    .await
    .expect("fetch returns on its own")
    .expect("config is valid");
    let elapsed = started.elapsed();

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::Interrupted);
    assert!(elapsed < Duration::from_secs(1), "took {:?}", elapsed);
    server.verify().await;
}

#[tokio::test]
async fn test_file_url_is_normalized_before_navigation() {
    let server = MockServer::start().await;

    mount_new_session(&server).await;
    // File targets never get a page-load ceiling
    Mock::given(method("POST"))
        .and(path(session_path("/timeouts")))
        .respond_with(null_value())
        .expect(0)
        .mount(&server)
        .await;
    mount_navigation(&server, "file:///tmp/x.html", null_value()).await;
    mount_dom(&server, "<head></head><body>local</body>", "file:///tmp/x.html").await;
    mount_quit(&server, 1).await;

    let response = fetch("file://tmp/x.html", 5000, &hub_config(&server, 50))
        .await
        .expect("config is valid");

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.final_url().as_str(), "file:///tmp/x.html");
    server.verify().await;
}

#[tokio::test]
async fn test_navigation_failure_releases_session() {
    let server = MockServer::start().await;
    let target = "http://nowhere.invalid/";

    mount_new_session(&server).await;
    mount_timeouts(&server, 100).await;
    mount_navigation(
        &server,
        target,
        driver_error("unknown error", "Reached error page: dnsNotFound"),
    )
    .await;
    mount_quit(&server, 1).await;

    let response = fetch(target, 5000, &hub_config(&server, 100))
        .await
        .expect("config is valid");

    assert_eq!(response.status_code(), 0);
    assert_eq!(response.outcome(), Outcome::NavigationFailed);
    assert!(response.body().is_empty());
    server.verify().await;
}

#[tokio::test]
async fn test_release_failure_keeps_captured_response() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/hello";

    mount_new_session(&server).await;
    mount_timeouts(&server, 10).await;
    mount_navigation(&server, target, null_value()).await;
    mount_dom(&server, "<body>kept</body>", target).await;
    Mock::given(method("DELETE"))
        .and(path(session_path("")))
        .respond_with(driver_error("invalid session id", "Session already gone"))
        .expect(1)
        .mount(&server)
        .await;

    let response = fetch(target, 5000, &hub_config(&server, 10))
        .await
        .expect("config is valid");

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.body(), b"<body>kept</body>");
    server.verify().await;
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/old";
    let landing = "http://localhost:8080/new";

    mount_new_session(&server).await;
    mount_timeouts(&server, 0).await;
    mount_navigation(&server, target, null_value()).await;
    mount_dom(&server, "<body>moved</body>", landing).await;
    mount_quit(&server, 1).await;

    let response = fetch(target, 5000, &hub_config(&server, 0))
        .await
        .expect("config is valid");

    assert_eq!(response.final_url().as_str(), landing);
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_legacy_hub_replies() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/legacy";

    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "sessionId": SESSION_ID,
            "value": { "browserName": "firefox", "javascriptEnabled": true }
        })))
        .mount(&server)
        .await;
    mount_timeouts(&server, 10).await;
    mount_navigation(&server, target, null_value()).await;
    Mock::given(method("POST"))
        .and(path(session_path("/element")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "value": { "ELEMENT": "0" }
        })))
        .mount(&server)
        .await;
    // Older drivers expose innerHTML only as an attribute
    Mock::given(method("GET"))
        .and(path(session_path("/element/0/property/innerHTML")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 0, "value": null })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(session_path("/element/0/attribute/innerHTML")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": 0, "value": "<body>legacy</body>" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(session_path("/url")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 0, "value": target })))
        .mount(&server)
        .await;
    mount_quit(&server, 1).await;

    let response = fetch(target, 5000, &hub_config(&server, 10))
        .await
        .expect("config is valid");

    assert_eq!(response.outcome(), Outcome::Ok);
    assert_eq!(response.body(), b"<body>legacy</body>");
    server.verify().await;
}

#[tokio::test]
async fn test_repeated_fetch_is_byte_identical() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/static";
    let markup = "<head><title>static</title></head><body><p>same</p></body>";

    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": SESSION_ID, "capabilities": {} }
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(session_path("/timeouts")))
        .respond_with(null_value())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(session_path("/url")))
        .respond_with(null_value())
        .expect(2)
        .mount(&server)
        .await;
    mount_dom(&server, markup, target).await;
    mount_quit(&server, 2).await;

    let fetcher = Fetcher::new(RemoteHub::new().expect("client builds"));
    let config = hub_config(&server, 10);

    let first = fetcher.fetch(target, 5000, &config).await.expect("valid");
    let second = fetcher.fetch(target, 5000, &config).await.expect("valid");

    assert_eq!(first.body(), second.body());
    assert_eq!(first.body(), markup.as_bytes());
    server.verify().await;
}

#[tokio::test]
async fn test_content_encoding_applied() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/cafe";

    mount_new_session(&server).await;
    mount_timeouts(&server, 10).await;
    mount_navigation(&server, target, null_value()).await;
    mount_dom(&server, "<body>café</body>", target).await;
    mount_quit(&server, 1).await;

    let config = FetchConfig {
        content_encoding: "ISO-8859-1".to_string(),
        ..hub_config(&server, 10)
    };
    let response = fetch(target, 5000, &config).await.expect("valid");

    assert_eq!(response.body(), b"<body>caf\xE9</body>");
}

#[tokio::test]
async fn test_unknown_browser_fails_before_any_request() {
    let server = MockServer::start().await;

    let config = FetchConfig {
        browser: "lynx".to_string(),
        ..hub_config(&server, 100)
    };
    let result = fetch("http://localhost:8080/hello", 5000, &config).await;

    assert!(matches!(result, Err(ConfigError::UnknownBrowser(_))));
    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_capabilities_sent_to_hub() {
    let server = MockServer::start().await;
    let target = "http://localhost:8080/caps";

    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .and(body_json(json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": ["--headless"] }
                }
            },
            "desiredCapabilities": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": ["--headless"] },
                "javascriptEnabled": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": SESSION_ID, "capabilities": {} }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_timeouts(&server, 10).await;
    mount_navigation(&server, target, null_value()).await;
    mount_dom(&server, "<body>chromium</body>", target).await;
    mount_quit(&server, 1).await;

    let config = FetchConfig {
        browser: "chromium".to_string(),
        headless: true,
        ..hub_config(&server, 10)
    };
    let response = fetch(target, 5000, &config).await.expect("valid");

    assert_eq!(response.status_code(), 200);
    server.verify().await;
}
