#![allow(clippy::unwrap_used)]
// End-to-end pipeline tests against a mock service.
//
// These exercise the run discipline the unit tests cannot: transient
// malformed frames, bounded re-authentication, the poll budget, and the
// close-exactly-once guarantee (asserted via `.expect(1)` on the Stop
// mock, verified when the MockServer drops).

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use thinqpoll_api::{ThinqClient, TransportConfig};
use thinqpoll_core::{CoreError, FieldValue, PollPolicy, collect};

// ── Helpers ─────────────────────────────────────────────────────────

const DEVICE_ID: &str = "dryer-1";

fn ok_envelope(result: serde_json::Value) -> serde_json::Value {
    json!({ "resultCode": "0000", "result": result })
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        poll_attempts: 10,
        poll_interval: Duration::from_millis(5),
        auth_retries: 2,
        auth_backoff: Duration::from_millis(1),
    }
}

async fn client_for(server: &MockServer) -> ThinqClient {
    let base_url = Url::parse(&server.uri()).unwrap();
    ThinqClient::with_session(
        base_url,
        "access-token".into(),
        "refresh-token".into(),
        &TransportConfig::default(),
    )
    .unwrap()
}

/// Mount the device, model, and monitor Start/Stop endpoints. The Stop
/// mock carries `.expect(1)`: every test implicitly asserts the monitor
/// is closed exactly once.
async fn mount_happy_session(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "deviceId": DEVICE_ID,
            "modelId": "RV13B",
            "alias": "Garage Dryer",
            "type": "DRYER",
        }))))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}/model")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "Value": {
                "Power": { "type": "Enum", "option": { "0": "-", "2": "On" } },
                "State": { "type": "Enum", "option": { "1": "Drying" } },
                "Remain_Time_H": { "type": "Range", "option": { "min": 0, "max": 24 } },
                "Remain_Time_M": { "type": "Range", "option": { "min": 0, "max": 59 } },
            }
        }))))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiMon"))
        .and(body_partial_json(json!({ "cmdOpt": "Start" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(json!({ "workId": "work-1" }))),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiMon"))
        .and(body_partial_json(json!({ "cmdOpt": "Stop" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(json!({ "workId": "work-1" }))),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn frame_response(payload: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
        "returnCode": "0000",
        "returnData": BASE64.encode(payload),
    })))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_frames_do_not_abort_the_run() {
    let server = MockServer::start().await;
    mount_happy_session(&server).await;

    // Two undecodable frames, then a valid one. Mount order matters:
    // the malformed mock expires after two matches.
    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiResult"))
        .respond_with(frame_response(b"\x00\x01 not json"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiResult"))
        .respond_with(frame_response(br#"{"Power": 2, "State": 1}"#))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let snapshot = collect(&client, DEVICE_ID, &fast_policy()).await.unwrap();

    assert_eq!(
        snapshot.fields.get("Power"),
        Some(&FieldValue::Str("On".into()))
    );
    assert_eq!(
        snapshot.fields.get("State"),
        Some(&FieldValue::Str("Drying".into()))
    );
    assert_eq!(snapshot.device.model_id, "RV13B");
}

#[tokio::test]
async fn duration_pair_is_merged_in_final_snapshot() {
    let server = MockServer::start().await;
    mount_happy_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiResult"))
        .respond_with(frame_response(
            br#"{"Power": 2, "Remain_Time_H": 1, "Remain_Time_M": 30}"#,
        ))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let snapshot = collect(&client, DEVICE_ID, &fast_policy()).await.unwrap();

    let fields = snapshot.fields.into_fields();
    assert_eq!(fields.get("remaining_minutes"), Some(&FieldValue::Int(90)));
    assert!(!fields.contains_key("Remain_Time_H"));
    assert!(!fields.contains_key("Remain_Time_M"));
}

#[tokio::test]
async fn exhausted_poll_budget_times_out_and_still_closes() {
    let server = MockServer::start().await;
    mount_happy_session(&server).await;

    // The device never reports.
    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiResult"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(json!({ "returnCode": "0106" }))),
        )
        .mount(&server)
        .await;

    let policy = PollPolicy {
        poll_attempts: 3,
        ..fast_policy()
    };
    let client = client_for(&server).await;
    let result = collect(&client, DEVICE_ID, &policy).await;

    match result {
        Err(CoreError::PollTimeout { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected PollTimeout, got: {other:?}"),
    }
    // Stop mock's .expect(1) verifies close-on-timeout when the server drops.
}

#[tokio::test]
async fn mid_run_error_still_closes_the_session() {
    let server = MockServer::start().await;
    mount_happy_session(&server).await;

    // A hard monitor failure mid-poll (not the no-data code).
    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiResult"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(json!({ "returnCode": "9000" }))),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = collect(&client, DEVICE_ID, &fast_policy()).await;

    assert!(
        matches!(result, Err(CoreError::MonitorFailed { .. })),
        "expected MonitorFailed, got: {result:?}"
    );
    // Stop mock's .expect(1) verifies close-on-error when the server drops.
}

#[tokio::test]
async fn stale_session_is_refreshed_and_the_call_retried() {
    let server = MockServer::start().await;

    // First device fetch sees a stale token; after refresh it succeeds.
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "resultCode": "0102" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "accessToken": "rotated-access",
        }))))
        .expect(1)
        .mount(&server)
        .await;

    mount_happy_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/rti/rtiResult"))
        .respond_with(frame_response(br#"{"Power": 2}"#))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let snapshot = collect(&client, DEVICE_ID, &fast_policy()).await.unwrap();

    // Same end result as if no staleness had occurred.
    assert_eq!(
        snapshot.fields.get("Power"),
        Some(&FieldValue::Str("On".into()))
    );
}

#[tokio::test]
async fn refresh_budget_exhaustion_is_a_fatal_auth_error() {
    let server = MockServer::start().await;

    // The session never becomes valid no matter how often we refresh.
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "resultCode": "0102" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "accessToken": "still-stale",
        }))))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = collect(&client, DEVICE_ID, &fast_policy()).await;

    assert!(
        matches!(result, Err(CoreError::AuthenticationFailed { .. })),
        "expected AuthenticationFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn rejected_refresh_aborts_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "resultCode": "0102" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCode": "0110",
            "resultMessage": "refresh token revoked",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = collect(&client, DEVICE_ID, &fast_policy()).await;

    assert!(
        matches!(result, Err(CoreError::AuthenticationFailed { .. })),
        "expected AuthenticationFailed, got: {result:?}"
    );
}
