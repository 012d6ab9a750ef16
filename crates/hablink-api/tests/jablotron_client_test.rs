#![allow(clippy::unwrap_used)]
// Integration tests for `JablotronClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hablink_api::{Error, JablotronClient, PanelKind, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(kind: PanelKind) -> (MockServer, JablotronClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = JablotronClient::new(base_url, kind, "4242", &TransportConfig::default()).unwrap();
    (server, client)
}

fn password() -> SecretString {
    "hunter2".to_string().into()
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_returns_session_cookie() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("POST"))
        .and(path("/ajax/login.php"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(body_string_contains("login=me%40example.com"))
        .and(body_string_contains("heslo=hunter2"))
        .and(body_string_contains("aStatus=200"))
        .and(body_string_contains("loginType=Login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "PHPSESSID=abc123; path=/")
                .set_body_json(json!({ "status": 200 })),
        )
        .mount(&server)
        .await;

    let token = client.login("me@example.com", &password()).await.unwrap();
    assert_eq!(token, "PHPSESSID=abc123");
    assert_eq!(client.session_cookie().as_deref(), Some("PHPSESSID=abc123"));
}

#[tokio::test]
async fn test_login_rejected_status() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("POST"))
        .and(path("/ajax/login.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 300 })))
        .mount(&server)
        .await;

    let result = client.login("me@example.com", &password()).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_server_error_is_transient() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("POST"))
        .and(path("/ajax/login.php"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.login("me@example.com", &password()).await.unwrap_err();
    assert!(
        matches!(err, Error::UnexpectedStatus { status: 503, .. }),
        "expected UnexpectedStatus, got: {err:?}"
    );
    assert!(err.is_transient());
    assert!(!err.is_auth_expired());
}

#[tokio::test]
async fn test_login_forbidden_is_auth_error() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("POST"))
        .and(path("/ajax/login.php"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let result = client.login("me@example.com", &password()).await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_initialize_service() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("GET"))
        .and(path("/app/ja100"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    client.initialize_service().await.unwrap();
}

#[tokio::test]
async fn test_initialize_service_failure() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("GET"))
        .and(path("/app/oasis"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client.initialize_service().await;
    assert!(matches!(result, Err(Error::UnexpectedStatus { status: 404, .. })));
}

#[tokio::test]
async fn test_logout() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("GET"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.logout().await.unwrap();
}

// ── Status tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_body_sends_browser_headers() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("GET"))
        .and(path("/app/oasis/ajax/stav.php"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("Accept-Language", "cs-CZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "sekce": [{"stav": 1}, {"stav": 0}, {"stav": 0}],
            "pgm": [{"stav": 0}, {"stav": 1}],
            "isAlarm": 0,
            "controlDisabled": false
        })))
        .mount(&server)
        .await;

    let status = client.status().await.unwrap();
    assert!(status.is_ok());
    let sekce = status.sekce.unwrap();
    assert!(sekce.is_on(0));
    assert!(!sekce.is_on(1));
    assert!(status.pgm.unwrap().is_on(1));
}

#[tokio::test]
async fn test_status_redirect_means_session_expired() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("GET"))
        .and(path("/app/ja100/ajax/stav.php"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/login"))
        .mount(&server)
        .await;

    let result = client.status_body().await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_status_garbage_is_deserialization_error() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("GET"))
        .and(path("/app/ja100/ajax/stav.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.status().await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Control tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_send_user_code_query_then_code() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("POST"))
        .and(path("/app/oasis/ajax/ovladani.php"))
        .and(body_string_contains("section=STATE"))
        .and(body_string_contains("status=1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": 200, "vysledek": 4 })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/app/oasis/ajax/ovladani.php"))
        .and(body_string_contains("code=1234"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": 200, "vysledek": 1 })),
        )
        .mount(&server)
        .await;

    let query = client.send_user_code("").await.unwrap();
    assert!(query.needs_code());

    let answer = client.send_user_code("1234").await.unwrap();
    assert_eq!(answer.status, 200);
    assert_eq!(answer.vysledek, Some(1));
}

#[tokio::test]
async fn test_control_section() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("POST"))
        .and(path("/app/ja100/ajax/ovladani.php"))
        .and(body_string_contains("section=PGM_3"))
        .and(body_string_contains("status=0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": 800, "vysledek": 0 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.control_section("PGM_3", false).await.unwrap();
    assert_eq!(resp.status, 800);
}

// ── History / discovery tests ───────────────────────────────────────

#[tokio::test]
async fn test_history_ja100() {
    let (server, client) = setup(PanelKind::Ja100).await;

    Mock::given(method("POST"))
        .and(path("/app/ja100/ajax/historie.php"))
        .and(body_string_contains("from=this_month"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ResponseCode": 200,
            "EventsCount": 2,
            "HistoryData": {"Events": [
                {"date": "2018-03-15T18:07:32+01:00", "section-name": "House", "event-text": "Set", "icon-type": "arm"},
                {"date": "2018-03-14T08:00:00+01:00", "section-name": "House", "event-text": "Unset", "icon-type": "disarm"}
            ]}
        })))
        .mount(&server)
        .await;

    let events = client.history().await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].text, "Set");
    assert_eq!(events[0].section.as_deref(), Some("House"));
}

#[tokio::test]
async fn test_list_services() {
    let (server, client) = setup(PanelKind::Oasis).await;

    Mock::given(method("GET"))
        .and(path("/ajax/widget-new.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "cnt-widgets": 1,
            "widgets": [{
                "id": 4242,
                "name": "Home",
                "url": "https://www.jablonet.net/app/ja100?service=4242",
                "templateService": "ja100"
            }]
        })))
        .mount(&server)
        .await;

    let services = client.list_services().await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, "4242");
    assert_eq!(services[0].template_service, "ja100");
}
