//! Login flows through the HTTP authenticator.

mod common;

use std::time::Duration;

use common::{ManualClock, management_config, workload_config};
use compute_client::{ComputeClient, ComputeError, ComputeRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[tokio::test]
async fn workload_login_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .and(body_json(json!({"username": "svc", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "cwp-token"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/stats/daily"))
        .and(header("authorization", "Bearer cwp-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"day": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ComputeClient::new(&workload_config(&server.uri())).unwrap();
    let stats = client.stats_daily().await.unwrap();

    assert_eq!(stats, vec![json!({"day": 1})]);
}

#[tokio::test]
async fn management_login_and_extend() {
    let server = MockServer::start().await;
    let clock = ManualClock::new();

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "svc", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "cspm-1", "message": "login_successful"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth_token/extend"))
        .and(header("x-redlock-auth", "cspm-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "cspm-2"})))
        .expect(1)
        .mount(&server)
        .await;

    let ticking = clock.clone();
    Mock::given(method("GET"))
        .and(path("/api/v1/version"))
        .and(header("x-redlock-auth", "cspm-1"))
        .respond_with(move |_: &Request| {
            ticking.advance(Duration::from_secs(591));
            ResponseTemplate::new(200).set_body_json(json!("32.01"))
        })
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/version"))
        .and(header("x-redlock-auth", "cspm-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("32.02")))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ComputeClient::new(&management_config(&server.uri()))
        .unwrap()
        .with_clock(clock);
    let request = ComputeRequest::get("api/v1/version");

    assert_eq!(client.execute(&request).await.unwrap(), Some(json!("32.01")));
    assert_eq!(client.execute(&request).await.unwrap(), Some(json!("32.02")));
}

#[tokio::test]
async fn rejected_login_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ComputeClient::new(&workload_config(&server.uri())).unwrap();
    let err = client.login().await.unwrap_err();

    match err {
        ComputeError::AuthenticationFailed { status, ref body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!client.session().has_token());
}

#[tokio::test]
async fn login_response_without_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ComputeClient::new(&workload_config(&server.uri())).unwrap();
    let err = client.login().await.unwrap_err();

    assert!(matches!(err, ComputeError::AuthenticationFailed { status: 200, .. }));
}

#[tokio::test]
async fn login_is_retried_on_transient_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
        .mount(&server)
        .await;

    let mut client = ComputeClient::new(&workload_config(&server.uri())).unwrap();
    client.login().await.unwrap();

    assert!(client.session().has_token());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
