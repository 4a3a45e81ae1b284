//! Twilio transport against a local stand-in for the Messages API

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wildwatch_policy::{Alert, AlertDispatcher, SmsTransport, TwilioCredentials, TwilioTransport};
use wildwatch_telemetry::{AuditLog, ALERT_FAILED, ALERT_SENT};

#[derive(Default)]
struct Captured {
    account: Option<String>,
    authorized: bool,
    form: HashMap<String, String>,
}

type Shared = Arc<Mutex<Captured>>;

async fn create_message(
    State(captured): State<Shared>,
    Path(account): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut captured = captured.lock();
    captured.account = Some(account);
    captured.authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Basic "))
        .unwrap_or(false);
    captured.form = form;

    (StatusCode::CREATED, Json(serde_json::json!({"sid": "SM0001"})))
}

async fn reject_message() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"code": 21211, "message": "Invalid 'To' Phone Number"})),
    )
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn credentials() -> TwilioCredentials {
    TwilioCredentials {
        account_sid: format!("AC{}", "0".repeat(32)),
        auth_token: "f".repeat(32),
        from_number: "+15550001111".to_string(),
    }
}

#[tokio::test]
async fn test_dispatch_posts_form_once() {
    let captured: Shared = Arc::default();
    let router = Router::new()
        .route("/2010-04-01/Accounts/:account/Messages.json", post(create_message))
        .with_state(captured.clone());
    let base = spawn(router).await;

    let transport: Arc<dyn SmsTransport> =
        Arc::new(TwilioTransport::new(credentials(), reqwest::Client::new()).with_api_base(base));
    let audit = AuditLog::new(10);
    let dispatcher = AlertDispatcher::new(Some(transport), audit.clone())
        .with_send_timeout(Duration::from_secs(5));

    let alert = Alert::new("fire", 0.823);
    assert!(dispatcher.dispatch(&alert, "+919999999999").await);

    let captured = captured.lock();
    assert_eq!(captured.account.as_deref(), Some(credentials().account_sid.as_str()));
    assert!(captured.authorized);
    assert_eq!(captured.form.get("To").map(String::as_str), Some("+919999999999"));
    assert_eq!(captured.form.get("From").map(String::as_str), Some("+15550001111"));
    assert_eq!(captured.form.get("Body"), Some(&alert.compose_message()));
    assert_eq!(audit.events_of(ALERT_SENT).len(), 1);
}

#[tokio::test]
async fn test_provider_rejection_is_failure() {
    let router = Router::new().route(
        "/2010-04-01/Accounts/:account/Messages.json",
        post(reject_message),
    );
    let base = spawn(router).await;

    let transport: Arc<dyn SmsTransport> =
        Arc::new(TwilioTransport::new(credentials(), reqwest::Client::new()).with_api_base(base));
    let audit = AuditLog::new(10);
    let dispatcher = AlertDispatcher::new(Some(transport), audit.clone());

    assert!(!dispatcher.dispatch(&Alert::new("person", 0.9), "bogus").await);

    let failed = audit.events_of(ALERT_FAILED);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].data.as_deref().unwrap().contains("400"));
}

#[tokio::test]
async fn test_unreachable_provider_is_failure() {
    let transport: Arc<dyn SmsTransport> = Arc::new(
        TwilioTransport::new(credentials(), reqwest::Client::new())
            .with_api_base("http://127.0.0.1:9"),
    );
    let dispatcher = AlertDispatcher::new(Some(transport), AuditLog::new(10))
        .with_send_timeout(Duration::from_secs(2));

    assert!(!dispatcher.dispatch(&Alert::new("boat", 0.5), "+15550002222").await);
}
