use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::json;

use tokenkeep::testing::{CountingStorage, FakeTransport, RecordingNavigator};
use tokenkeep::{CredentialPair, HttpRequest, Navigator, RequestError, SessionManager, Settings};

struct Harness {
    manager: SessionManager<FakeTransport>,
    transport: FakeTransport,
    storage: Arc<CountingStorage>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(transport: FakeTransport) -> Harness {
    let storage = Arc::new(CountingStorage::new());
    let navigator = Arc::new(RecordingNavigator::new("/dashboard"));
    let manager = SessionManager::new(
        &Settings::default(),
        transport.clone(),
        storage.clone(),
        navigator.clone(),
    );
    Harness {
        manager,
        transport,
        storage,
        navigator,
    }
}

fn live_pair(access: &str) -> CredentialPair {
    CredentialPair::new(access, "refresh").with_expires_at(4_102_444_800_000)
}

fn expired_pair() -> CredentialPair {
    CredentialPair::new("stale", "refresh").with_expires_at(1_000_000_000_000)
}

#[tokio::test]
async fn injects_bearer_for_live_session() {
    let transport = FakeTransport::new();
    transport.respond("/items", StatusCode::OK, json!({ "items": [] }));
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let response = h.manager.execute(HttpRequest::get("/items")).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({ "items": [] }));
    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].bearer_token(), Some("live"));
}

#[tokio::test]
async fn opted_out_request_carries_no_bearer_and_no_marker() {
    let transport = FakeTransport::new();
    transport.respond("/public", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    h.manager
        .execute(HttpRequest::get("/public").without_auth())
        .await
        .unwrap();

    let requests = h.transport.requests();
    assert_eq!(requests[0].bearer_token(), None);
    assert!(!requests[0].skips_auth());
}

#[tokio::test]
async fn opted_out_request_skips_refresh_of_expired_session() {
    let transport = FakeTransport::new();
    transport.respond("/public", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(expired_pair()).unwrap();

    h.manager
        .execute(HttpRequest::get("/public").without_auth())
        .await
        .unwrap();

    assert_eq!(h.transport.calls("/auth/refresh"), 0);
    assert_eq!(h.transport.requests()[0].bearer_token(), None);
}

#[tokio::test]
async fn request_without_session_goes_out_unauthenticated() {
    let transport = FakeTransport::new();
    transport.respond("/items", StatusCode::OK, json!({}));
    let h = harness(transport);

    h.manager.execute(HttpRequest::get("/items")).await.unwrap();

    assert_eq!(h.transport.calls("/auth/refresh"), 0);
    assert_eq!(h.transport.requests()[0].bearer_token(), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_with_expired_session_refresh_once() {
    let transport = FakeTransport::new().with_delay(Duration::from_millis(10));
    transport.respond(
        "/auth/refresh",
        StatusCode::OK,
        json!({ "tokens": { "accessToken": "renewed", "refreshToken": "refresh-2", "expiresIn": 900 } }),
    );
    transport.respond("/items", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(expired_pair()).unwrap();

    let results = join_all((0..5).map(|_| h.manager.execute(HttpRequest::get("/items")))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.transport.calls("/auth/refresh"), 1);
    let data_requests: Vec<_> = h
        .transport
        .requests()
        .into_iter()
        .filter(|r| r.path == "/items")
        .collect();
    assert_eq!(data_requests.len(), 5);
    assert!(data_requests.iter().all(|r| r.bearer_token() == Some("renewed")));
    assert_eq!(h.manager.current().unwrap().refresh_token, "refresh-2");
}

#[tokio::test]
async fn refresh_server_error_terminates_without_retry() {
    let transport = FakeTransport::new();
    transport.respond(
        "/auth/refresh",
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": "down" }),
    );
    transport.respond("/auth/logout", StatusCode::OK, json!({}));
    transport.respond("/items", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(expired_pair()).unwrap();

    let err = h
        .manager
        .execute(HttpRequest::get("/items"))
        .await
        .unwrap_err();
    h.manager.logout_settled().await;

    assert!(err.is_auth_required());
    assert_eq!(h.transport.calls("/auth/refresh"), 1);
    assert_eq!(h.transport.calls("/items"), 0);
    assert_eq!(h.transport.calls("/auth/logout"), 1);
    assert_eq!(h.manager.current(), None);
    assert_eq!(h.navigator.navigations(), vec!["/login".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_failed_refresh_and_one_termination() {
    let transport = FakeTransport::new().with_delay(Duration::from_millis(10));
    transport.respond("/auth/refresh", StatusCode::UNAUTHORIZED, json!({ "message": "revoked" }));
    transport.respond("/auth/logout", StatusCode::OK, json!({}));
    transport.respond("/items", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(expired_pair()).unwrap();

    let results = join_all((0..5).map(|_| h.manager.execute(HttpRequest::get("/items")))).await;
    h.manager.logout_settled().await;

    assert!(results.iter().all(|r| matches!(r, Err(RequestError::AuthenticationRequired))));
    assert_eq!(h.transport.calls("/auth/refresh"), 1);
    assert_eq!(h.transport.calls("/auth/logout"), 1);
    assert_eq!(h.transport.calls("/items"), 0);
    assert_eq!(h.storage.removals(), 1);
    assert_eq!(h.navigator.navigations(), vec!["/login".to_string()]);
    assert_eq!(h.manager.current(), None);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_caller_returns_without_waiting_for_logout() {
    let transport = FakeTransport::new().with_delay(Duration::from_secs(3600));
    transport.respond("/items", StatusCode::UNAUTHORIZED, json!({}));
    transport.respond("/auth/logout", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(live_pair("revoked")).unwrap();

    let request = h.manager.execute(HttpRequest::get("/items"));
    let started = tokio::time::Instant::now();
    let err = request.await.unwrap_err();

    // Only the data request's own delay elapsed, not the logout timeout
    assert!(started.elapsed() < Duration::from_secs(3605));
    assert!(err.is_auth_required());
    assert_eq!(h.navigator.navigations(), vec!["/login".to_string()]);
    assert_eq!(h.manager.current(), None);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_unauthorized_responses_terminate_once() {
    let transport = FakeTransport::new().with_delay(Duration::from_millis(10));
    transport.respond("/items", StatusCode::UNAUTHORIZED, json!({ "message": "expired" }));
    transport.respond("/auth/logout", StatusCode::OK, json!({}));
    let h = harness(transport);
    h.manager.sign_in(live_pair("revoked")).unwrap();

    let results = join_all((0..4).map(|_| h.manager.execute(HttpRequest::get("/items")))).await;
    h.manager.logout_settled().await;

    assert!(results.iter().all(|r| matches!(r, Err(RequestError::AuthenticationRequired))));
    assert_eq!(h.transport.calls("/auth/logout"), 1);
    assert_eq!(h.storage.removals(), 1);
    assert_eq!(h.navigator.navigations(), vec!["/login".to_string()]);
    assert_eq!(h.manager.current(), None);
}

#[tokio::test]
async fn unauthorized_from_auth_flow_paths_does_not_terminate() {
    let transport = FakeTransport::new();
    transport.respond("/auth/logout", StatusCode::UNAUTHORIZED, json!({ "message": "no session" }));
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let err = h
        .manager
        .execute(HttpRequest::post("/auth/logout"))
        .await
        .unwrap_err();

    match err {
        RequestError::Failed { status, message } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "no session");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.manager.current().is_some());
    assert!(h.navigator.navigations().is_empty());
}

#[tokio::test]
async fn unauthorized_on_opted_out_request_does_not_terminate() {
    let transport = FakeTransport::new();
    transport.respond("/login", StatusCode::UNAUTHORIZED, json!({ "message": "Wrong password" }));
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let err = h
        .manager
        .execute(HttpRequest::post("/login").json(json!({ "user": "u" })).without_auth())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Wrong password");
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(h.manager.current().is_some());
}

#[tokio::test]
async fn server_fault_redirects_to_fault_route_and_keeps_session() {
    let transport = FakeTransport::new();
    transport.respond_text("/items", StatusCode::BAD_GATEWAY, "");
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let err = h
        .manager
        .execute(HttpRequest::get("/items"))
        .await
        .unwrap_err();

    assert!(err.is_server_fault());
    assert_eq!(err.to_string(), "Server fault (502 Bad Gateway): 502 Bad Gateway");
    assert_eq!(h.navigator.navigations(), vec!["/error".to_string()]);
    assert!(h.manager.current().is_some());
}

#[tokio::test]
async fn client_error_surfaces_message_without_side_effects() {
    let transport = FakeTransport::new();
    transport.respond(
        "/items",
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "message": "Name is required" }),
    );
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let err = h
        .manager
        .execute(HttpRequest::post("/items").json(json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Name is required");
    assert!(h.navigator.navigations().is_empty());
    assert_eq!(h.storage.removals(), 0);
}

#[tokio::test]
async fn network_error_leaves_session_untouched() {
    let transport = FakeTransport::new();
    transport.fail("/items");
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let err = h
        .manager
        .execute(HttpRequest::get("/items"))
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Network(_)));
    assert!(h.manager.current().is_some());
    assert!(h.navigator.navigations().is_empty());
}

#[tokio::test]
async fn malformed_success_body_is_a_plain_failure() {
    let transport = FakeTransport::new();
    transport.respond_text("/items", StatusCode::OK, "<html>oops</html>");
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    let response = h.manager.execute(HttpRequest::get("/items")).await.unwrap();
    let err = response.json::<Vec<String>>().unwrap_err();

    assert!(matches!(err, RequestError::MalformedBody(_)));
    assert!(h.manager.current().is_some());
}

#[tokio::test]
async fn sign_out_clears_even_when_logout_fails() {
    let transport = FakeTransport::new();
    transport.fail("/auth/logout");
    let h = harness(transport);
    h.manager.sign_in(live_pair("live")).unwrap();

    h.manager.sign_out().await;
    h.manager.logout_settled().await;

    assert_eq!(h.manager.current(), None);
    assert!(!h.manager.is_authenticated());
    assert_eq!(h.transport.calls("/auth/logout"), 1);
    assert_eq!(h.navigator.current_route(), "/login");
}
