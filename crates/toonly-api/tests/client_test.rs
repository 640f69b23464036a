#![allow(clippy::unwrap_used)]
// Integration tests for `ToonClient` using wiremock.

use std::sync::Mutex;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use tokio_test::{assert_err, assert_ok};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toonly_api::{Credentials, Error, OAuthConfig, RefreshError, ToonClient};

// ── Helpers ─────────────────────────────────────────────────────────

fn oauth(server: &MockServer) -> OAuthConfig {
    OAuthConfig {
        authorize_url: Url::parse(&format!("{}/authorize", server.uri())).unwrap(),
        token_url: Url::parse(&format!("{}/token", server.uri())).unwrap(),
        client_id: "client-1".into(),
        client_secret: SecretString::from("s3cret".to_string()),
        redirect_uri: "https://app.example.com/callback".into(),
    }
}

async fn setup() -> (MockServer, ToonClient) {
    let server = MockServer::start().await;
    let client = ToonClient::from_reqwest(
        &format!("{}/toon/api/v1", server.uri()),
        reqwest::Client::new(),
        oauth(&server),
        Some(Credentials::new("old-access", Some("old-refresh".into()))),
        1,
    )
    .unwrap();
    (server, client)
}

fn api_path(suffix: &str) -> String {
    format!("/toon/api/v1/{suffix}")
}

fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
        "token_type": "Bearer"
    })
}

async fn mount_refresh_success(server: &MockServer, delay: Duration, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("new-access", "new-refresh"))
                .set_delay(delay),
        )
        .expect(expected)
        .mount(server)
        .await;
}

// ── Token manager ───────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_refreshes_share_one_request() {
    let (server, client) = setup().await;
    mount_refresh_success(&server, Duration::from_millis(200), 1).await;

    let tokens = client.tokens();
    let mut updates = tokens.subscribe();

    let (a, b, c, d) = tokio::join!(
        tokens.refresh(),
        tokens.refresh(),
        tokens.refresh(),
        tokens.refresh(),
    );

    for result in [a, b, c, d] {
        let creds = result.unwrap();
        assert_eq!(creds.access_token.expose_secret(), "new-access");
        assert_eq!(
            creds.refresh_token.as_ref().map(|t| t.expose_secret()),
            Some("new-refresh")
        );
        assert!(creds.expires_at.is_some());
    }

    assert!(updates.has_changed().unwrap());
    let published = updates.borrow_and_update().clone().unwrap();
    assert_eq!(published.access_token.expose_secret(), "new-access");
    assert!(!tokens.is_refreshing());
}

#[tokio::test]
async fn test_failed_refresh_fans_out_and_clears() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({
                    "error": "invalid_grant",
                    "error_description": "Refresh token expired"
                }))
                .set_delay(Duration::from_millis(100)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client.tokens();
    let (a, b, c) = tokio::join!(tokens.refresh(), tokens.refresh(), tokens.refresh());

    let expected = RefreshError {
        status: Some(400),
        message: "Refresh token expired".into(),
    };
    for result in [a, b, c] {
        match result {
            Err(Error::Refresh(e)) => assert_eq!(e, expected),
            other => panic!("expected refresh error, got {other:?}"),
        }
    }
    assert!(!tokens.is_refreshing());

    // The marker is cleared, so the next call makes a fresh attempt.
    mount_refresh_success(&server, Duration::ZERO, 1).await;
    let creds = tokens.refresh().await.unwrap();
    assert_eq!(creds.access_token.expose_secret(), "new-access");
}

#[tokio::test]
async fn test_exchange_code_installs_tokens() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", "renew")))
        .expect(1)
        .mount(&server)
        .await;

    let creds = client.tokens().exchange_code("abc123").await.unwrap();
    assert_eq!(creds.access_token.expose_secret(), "fresh");
    assert_eq!(
        client
            .tokens()
            .access_token()
            .map(|t| t.expose_secret().to_owned()),
        Some("fresh".to_owned())
    );
}

// ── 401 recovery ────────────────────────────────────────────────────

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let (server, client) = setup().await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;

    Mock::given(method("PUT"))
        .and(path(api_path("temperature")))
        .and(header("Authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(api_path("temperature")))
        .and(header("Authorization", "Bearer new-access"))
        .and(body_json(json!({ "value": 2150, "scale": "CELSIUS" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let value = assert_ok!(client.set_target_temperature(21.5).await);
    assert!((value - 21.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_refreshed_request_completes_before_later_ones() {
    let (server, client) = setup().await;
    mount_refresh_success(&server, Duration::from_millis(100), 1).await;

    Mock::given(method("PUT"))
        .and(path(api_path("temperature")))
        .and(header("Authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(api_path("temperature")))
        .and(header("Authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("agreements")))
        .and(header("Authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let order = Mutex::new(Vec::new());
    let (temp, agreements) = tokio::join!(
        async {
            let result = client.set_target_temperature(21.5).await;
            order.lock().unwrap().push("set_temp");
            result
        },
        async {
            let result = client.list_agreements().await;
            order.lock().unwrap().push("agreements");
            result
        },
    );

    assert_ok!(temp);
    assert_ok!(agreements);
    assert_eq!(*order.lock().unwrap(), ["set_temp", "agreements"]);
}

#[tokio::test]
async fn test_second_401_is_terminal() {
    let (server, client) = setup().await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let err = assert_err!(client.status().await);
    assert_eq!(err.status(), Some(401));
    assert!(err.needs_reauthorization());
}

#[tokio::test]
async fn test_refresh_failure_is_propagated() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "fault": { "faultstring": "Invalid Access Token" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.status().await.unwrap_err();
    match &err {
        Error::Refresh(e) => assert_eq!(e.message, "Invalid Access Token"),
        other => panic!("expected refresh error, got {other:?}"),
    }
    assert!(err.needs_reauthorization());
}

#[tokio::test]
async fn test_401_without_refresh_token_fails_locally() {
    let server = MockServer::start().await;
    let client = ToonClient::from_reqwest(
        &format!("{}/toon/api/v1", server.uri()),
        reqwest::Client::new(),
        oauth(&server),
        Some(Credentials::new("only-access", None)),
        1,
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.status().await.unwrap_err();
    assert!(matches!(err, Error::MissingRefreshToken));
}

// ── 429 backpressure ────────────────────────────────────────────────

#[tokio::test]
async fn test_rate_limit_aborts_queued_requests() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(429).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let (first, second, third) = tokio::join!(
        client.status(),
        client.list_agreements(),
        client.list_agreements(),
    );

    assert!(matches!(first, Err(Error::RateLimited)));
    assert!(matches!(second, Err(Error::Aborted)));
    assert!(matches!(third, Err(Error::Aborted)));
    assert_eq!(client.queue().queued(), 0);
    assert_eq!(client.queue().in_flight(), 0);
}

// ── 500 recovery ────────────────────────────────────────────────────

#[tokio::test]
async fn test_lost_agreement_is_rebound_and_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(api_path("agreements")))
        .and(body_json(json!({ "agreementId": "A-1" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "type": "agreementNotSet",
            "description": "No agreement selected"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thermostatInfo": { "currentTemp": 2000, "currentSetpoint": 2100, "activeState": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.bind("A-1").await.unwrap();
    assert_eq!(client.agreement_id().as_deref(), Some("A-1"));

    let status = client.status().await.unwrap();
    assert_eq!(status.target_temperature(), Some(21.0));
}

#[tokio::test]
async fn test_rebound_request_completes_before_later_ones() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    client.bind("A-1").await.unwrap();

    // The re-bind is slow, giving the later request every chance to overtake.
    Mock::given(method("POST"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "type": "agreementNotSet",
            "description": "No agreement selected"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thermostatInfo": { "currentTemp": 2000, "currentSetpoint": 2100, "activeState": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let order = Mutex::new(Vec::new());
    let (status, agreements) = tokio::join!(
        async {
            let result = client.status().await;
            order.lock().unwrap().push("status");
            result
        },
        async {
            let result = client.list_agreements().await;
            order.lock().unwrap().push("agreements");
            result
        },
    );

    assert_eq!(status.unwrap().target_temperature(), Some(21.0));
    agreements.unwrap();
    assert_eq!(*order.lock().unwrap(), ["status", "agreements"]);
}

#[tokio::test]
async fn test_second_500_is_terminal() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    client.bind("A-1").await.unwrap();
    let err = client.status().await.unwrap_err();
    match err {
        Error::Api { status, message, .. } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_500_without_binding_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.status().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_communication_error_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(api_path("agreements")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("status")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "type": "communicationError",
            "description": "Error communicating with Toon"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.bind("A-1").await.unwrap();
    let err = client.status().await.unwrap_err();
    assert!(err.is_device_unreachable());
}

// ── Local preconditions ─────────────────────────────────────────────

#[tokio::test]
async fn test_bind_with_empty_id_makes_no_request() {
    let (server, client) = setup().await;

    let err = client.bind("").await.unwrap_err();
    assert!(matches!(err, Error::MissingArgument { name: "agreement_id" }));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(client.agreement_id().is_none());
}

#[tokio::test]
async fn test_non_finite_temperature_is_rejected() {
    let (server, client) = setup().await;

    let err = client.set_target_temperature(f64::NAN).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { name: "temperature", .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_agreements() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(api_path("agreements")))
        .and(header("Authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "agreementId": "A-1", "displayCommonName": "Living room", "heatingType": "GAS" },
            { "agreementId": "A-2" }
        ])))
        .mount(&server)
        .await;

    let agreements = client.list_agreements().await.unwrap();
    assert_eq!(agreements.len(), 2);
    assert_eq!(agreements[0].agreement_id, "A-1");
    assert_eq!(agreements[0].display_common_name.as_deref(), Some("Living room"));
    assert!(agreements[1].heating_type.is_none());
}

#[tokio::test]
async fn test_state_and_program_bodies() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(api_path("temperature/states")))
        .and(body_json(json!({ "temperatureState": 3 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(api_path("temperature/program")))
        .and(body_json(json!({ "state": 0 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_temperature_state(toonly_api::TemperatureState::Away)
        .await
        .unwrap();
    client.set_program(false).await.unwrap();
}

#[tokio::test]
async fn test_closed_client_rejects_calls() {
    let (server, client) = setup().await;
    client.close();

    let err = client.status().await.unwrap_err();
    assert!(matches!(err, Error::Closed));
    assert!(server.received_requests().await.unwrap().is_empty());
}
