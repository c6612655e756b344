#![allow(clippy::unwrap_used)]
// Integration tests for `CloudClient` against a wiremock portal.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tcc_api::{CloudClient, CloudConfig, DeviceId, Error, SystemMode};

// ── Helpers ─────────────────────────────────────────────────────────

const LOGIN_PAGE: &str = r#"<html><body><form action="/portal" method="post">
<input name="__RequestVerificationToken" type="hidden" value="tok-123" />
<input name="UserName" /><input name="Password" type="password" />
</form></body></html>"#;

const LANDING_PAGE: &str = r#"<html><body><a id="LogoutLink" href="/portal/Account/LogOff">Log off</a></body></html>"#;

const LOCATIONS: &str = "/portal/Location/GetLocationListData";
const ZONES: &str = "/portal/Device/GetZoneListData";
const CONTROL: &str = "/portal/Device/SubmitControlScreenChanges";

async fn setup() -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let mut config = CloudConfig::new(Url::parse(&server.uri()).unwrap());
    config.refill_interval = Duration::from_millis(1);
    config.burst = 50;
    let client = CloudClient::new(config).unwrap();
    client.set_credentials("me@example.com", SecretString::from("hunter2"));
    (server, client)
}

/// Login page, form POST redirecting to `landing`, and the landing page.
async fn mount_login(server: &MockServer, landing: &str) {
    Mock::given(method("GET"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/portal"))
        .and(body_string_contains("__RequestVerificationToken=tok-123"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", landing)
                .insert_header("Set-Cookie", ".ASPXAUTH_TRUEHOME=abc; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(landing))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING_PAGE))
        .mount(server)
        .await;
}

fn zone_list() -> serde_json::Value {
    json!([
        {"DeviceID": 1, "Name": "Hall", "DispTemperature": 67.0, "HeatSetpoint": 70.0,
         "CoolSetpoint": 73.0, "IndoorHumidity": 128, "SystemSwitchPosition": 1,
         "EquipmentOutputStatus": 1},
        {"DeviceID": 2, "Name": "Loft", "DispTemperature": 72.0, "HeatSetpoint": 65.0,
         "CoolSetpoint": 76.0, "IndoorHumidity": 40, "SystemSwitchPosition": 3,
         "EquipmentOutputStatus": 0}
    ])
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_follows_redirect_and_remembers_device() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Device/Control/2246437").await;

    client.login().await.unwrap();
    assert!(client.is_authenticated());

    // Both list endpoints come back empty; the remembered id is fetched.
    for endpoint in [LOCATIONS, ZONES] {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/portal/Device/CheckDataSession/2246437"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latestData": {"uiData": {
                "DispTemperature": 68.0, "HeatSetpoint": 69.0, "CoolSetpoint": 75.0,
                "IndoorHumidity": 45, "SystemSwitchPosition": 1, "DisplayUnits": "F"
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.get_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, DeviceId(2_246_437));
    assert_eq!(devices[0].system_mode, SystemMode::Heat);
}

#[tokio::test]
async fn lockout_redirect_is_rate_limited() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Error/TooManyAttempts").await;

    let err = client.login().await.unwrap_err();
    assert!(matches!(err, Error::LoginRateLimited { .. }), "got: {err:?}");
    assert!(err.is_rate_limited());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn failure_marker_is_invalid_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .mount(&server)
        .await;
    // No token on the page: the form is posted without one.
    Mock::given(method("POST"))
        .and(path("/portal"))
        .and(body_string_contains("UserName=me%40example.com"))
        .and(body_string_contains("RememberMe=false"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<div class=\"validation\">Login failed. Invalid username or password.</div>"),
        )
        .mount(&server)
        .await;

    let err = client.login().await.unwrap_err();
    assert!(matches!(err, Error::LoginInvalidCredentials), "got: {err:?}");
    assert!(err.is_credential_failure());
}

#[tokio::test]
async fn missing_credentials_make_no_request() {
    let server = MockServer::start().await;
    let client = CloudClient::new(CloudConfig::new(Url::parse(&server.uri()).unwrap())).unwrap();

    let err = client.get_devices().await.unwrap_err();
    assert!(matches!(err, Error::CredentialsMissing));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_password_fails_before_any_request() {
    let server = MockServer::start().await;
    let client = CloudClient::new(CloudConfig::new(Url::parse(&server.uri()).unwrap())).unwrap();
    client.set_credentials("me@example.com", SecretString::from(""));

    let err = client.login().await.unwrap_err();
    assert!(matches!(err, Error::CredentialsMissing));
    assert!(!client.has_credentials());
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Poll cache ──────────────────────────────────────────────────────

#[tokio::test]
async fn second_poll_inside_interval_is_served_from_cache() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("GET"))
        .and(path(LOCATIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_list()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ZONES))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_list()))
        .expect(0)
        .mount(&server)
        .await;

    let first = client.get_devices().await.unwrap();
    let before = server.received_requests().await.unwrap().len();
    let second = client.get_devices().await.unwrap();
    let after = server.received_requests().await.unwrap().len();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].humidity, 100);
    assert_eq!(before, after, "cached poll must not touch the network");
}

#[tokio::test]
async fn control_submission_forces_next_poll_live() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("GET"))
        .and(path(LOCATIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_list()))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CONTROL))
        .and(body_partial_json(json!({
            "DeviceID": 1, "HeatSetpoint": 69.8, "StatusHeat": 1, "HeatNextPeriod": 0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 1})))
        .expect(1)
        .mount(&server)
        .await;

    client.get_devices().await.unwrap();
    client.set_heat_setpoint(DeviceId(1), 69.8).await.unwrap();
    assert!(client.last_poll().is_none());
    client.get_devices().await.unwrap();
}

#[tokio::test]
async fn redirected_list_endpoint_falls_through_to_nested_zones() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("GET"))
        .and(path(LOCATIONS))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/portal/Account/Login"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/portal/Account/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sign in</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ZONES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"LocationID": 5, "Name": "Home", "Zones": zone_list()}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.get_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].name, "Loft");
}

// ── Session expiry & control errors ─────────────────────────────────

#[tokio::test]
async fn unauthorized_detail_expires_session() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("GET"))
        .and(path("/portal/Device/CheckDataSession/1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get_device_data(DeviceId(1)).await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
    assert!(err.is_auth_expired());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn unauthorized_control_expires_session() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("POST"))
        .and(path(CONTROL))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.set_system_mode(DeviceId(1), SystemMode::Cool).await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn rejected_control_keeps_body() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("POST"))
        .and(path(CONTROL))
        .and(body_partial_json(json!({"DeviceID": 1, "SystemSwitch": 3})))
        .respond_with(ResponseTemplate::new(500).set_body_string("setpoint out of range"))
        .mount(&server)
        .await;

    let err = client.set_system_mode(DeviceId(1), SystemMode::Cool).await.unwrap_err();
    match err {
        Error::ControlSubmit { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "setpoint out of range");
        }
        other => panic!("expected ControlSubmit, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_mode_is_never_submitted() {
    let (server, client) = setup().await;
    mount_login(&server, "/portal/Locations").await;

    Mock::given(method("POST"))
        .and(path(CONTROL))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.set_system_mode(DeviceId(1), SystemMode::Unknown).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedMode(SystemMode::Unknown)));
}

// ── Credential check ────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_logs_in_again_and_polls_live() {
    let server = MockServer::start().await;
    let mut config = CloudConfig::new(Url::parse(&server.uri()).unwrap());
    config.refill_interval = Duration::from_millis(1);
    config.burst = 50;
    let client = CloudClient::new(config).unwrap();
    client.set_credentials("me@example.com", SecretString::from("hunter2"));

    Mock::given(method("GET"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/portal/Locations"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/portal/Locations"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_list()))
        .expect(2)
        .mount(&server)
        .await;

    client.get_devices().await.unwrap();
    let devices = client.test_connection().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert!(client.is_authenticated());
}
