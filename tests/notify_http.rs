//! Notification senders against local stub APIs.
//!
//! Each test spins up an Axum server on a random port that mimics the
//! provider endpoint, then points the notifier at it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use tldr_digest::notify::{
    Notifier, TelegramConfig, TelegramNotifier, WhatsAppConfig, WhatsAppNotifier,
};

/// Start an Axum server on a random port, return its base URL.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

// ── Twilio (WhatsApp) ───────────────────────────────────────────────

type Captured = Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>;

#[derive(Clone)]
struct TwilioStub {
    status: StatusCode,
    reply: Value,
    captured: Captured,
}

async fn create_message(
    State(stub): State<TwilioStub>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.captured.lock().unwrap().push((auth, form));
    (stub.status, Json(stub.reply.clone()))
}

async fn twilio(status: StatusCode, reply: Value) -> (WhatsAppNotifier, Captured) {
    let captured: Captured = Arc::default();
    let stub = TwilioStub {
        status,
        reply,
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route(
            "/2010-04-01/Accounts/{sid}/Messages.json",
            post(create_message),
        )
        .with_state(stub);
    let base = serve(app).await;

    let notifier = WhatsAppNotifier::new(WhatsAppConfig {
        account_sid: "AC123".into(),
        auth_token: SecretString::from("tok"),
        from: "whatsapp:+14155238886".into(),
        to: "whatsapp:+15550001111".into(),
    })
    .with_api_base(base);
    (notifier, captured)
}

#[tokio::test]
async fn whatsapp_accepted_message_is_delivered() {
    let (notifier, captured) = twilio(
        StatusCode::CREATED,
        json!({"sid": "SM1", "status": "queued"}),
    )
    .await;

    let text = "📰 *TLDR Summary* — Mon\n\n*HEADLINE*\nparagraph.";
    assert!(notifier.send(text).await.unwrap());

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let (auth, form) = &captured[0];
    assert!(auth.as_deref().unwrap_or_default().starts_with("Basic "));
    assert_eq!(form["From"], "whatsapp:+14155238886");
    assert_eq!(form["To"], "whatsapp:+15550001111");
    assert_eq!(form["Body"], text);
}

#[tokio::test]
async fn whatsapp_http_rejection_returns_false() {
    let (notifier, _) = twilio(
        StatusCode::BAD_REQUEST,
        json!({"code": 21211, "message": "Invalid 'To' Phone Number", "status": 400}),
    )
    .await;
    assert!(!notifier.send("hello").await.unwrap());
}

#[tokio::test]
async fn whatsapp_failed_status_returns_false() {
    let (notifier, _) = twilio(
        StatusCode::CREATED,
        json!({"sid": "SM2", "status": "failed"}),
    )
    .await;
    assert!(!notifier.send("hello").await.unwrap());
}

#[tokio::test]
async fn whatsapp_long_digest_is_split_under_body_limit() {
    let (notifier, captured) = twilio(
        StatusCode::CREATED,
        json!({"sid": "SM3", "status": "queued"}),
    )
    .await;

    let text = format!("{}\n{}\n{}", "a".repeat(1500), "b".repeat(1500), "c".repeat(500));
    assert!(notifier.send(&text).await.unwrap());

    let captured = captured.lock().unwrap();
    let bodies: Vec<&str> = captured.iter().map(|(_, form)| form["Body"].as_str()).collect();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|b| b.chars().count() <= 1600));
    assert_eq!(bodies[0], "a".repeat(1500));
    assert_eq!(bodies[2], "c".repeat(500));
}

#[tokio::test]
async fn whatsapp_refused_chunk_stops_the_rest() {
    let (notifier, captured) = twilio(
        StatusCode::BAD_REQUEST,
        json!({"code": 21617, "message": "The concatenated message body exceeds the 1600 character limit"}),
    )
    .await;

    let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
    assert!(!notifier.send(&text).await.unwrap());
    assert_eq!(captured.lock().unwrap().len(), 1);
}

// ── Telegram ────────────────────────────────────────────────────────

#[derive(Clone)]
struct TelegramStub {
    reject_markdown: bool,
    reject_all: bool,
    captured: Arc<Mutex<Vec<Value>>>,
}

async fn send_message(
    State(stub): State<TelegramStub>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let has_markdown = body.get("parse_mode").is_some();
    stub.captured.lock().unwrap().push(body);
    if stub.reject_all || (stub.reject_markdown && has_markdown) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "description": "Bad Request: can't parse entities"})),
        );
    }
    (StatusCode::OK, Json(json!({"ok": true})))
}

async fn telegram(reject_markdown: bool, reject_all: bool) -> (TelegramNotifier, Arc<Mutex<Vec<Value>>>) {
    let captured: Arc<Mutex<Vec<Value>>> = Arc::default();
    let stub = TelegramStub {
        reject_markdown,
        reject_all,
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route("/bot123-abc/sendMessage", post(send_message))
        .with_state(stub);
    let base = serve(app).await;

    let notifier = TelegramNotifier::new(TelegramConfig {
        bot_token: SecretString::from("123-abc"),
        chat_id: "42".into(),
    })
    .with_api_base(base);
    (notifier, captured)
}

#[tokio::test]
async fn telegram_markdown_accepted_first_try() {
    let (notifier, captured) = telegram(false, false).await;
    assert!(notifier.send("*bold* digest").await.unwrap());

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0]["chat_id"], "42");
    assert_eq!(captured[0]["parse_mode"], "Markdown");
}

#[tokio::test]
async fn telegram_falls_back_to_plain_text() {
    let (notifier, captured) = telegram(true, false).await;
    assert!(notifier.send("*unbalanced digest").await.unwrap());

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert!(captured[1].get("parse_mode").is_none());
    assert_eq!(captured[1]["text"], "*unbalanced digest");
}

#[tokio::test]
async fn telegram_rejection_returns_false() {
    let (notifier, _) = telegram(false, true).await;
    assert!(!notifier.send("hello").await.unwrap());
}

#[tokio::test]
async fn telegram_long_digest_is_split() {
    let (notifier, captured) = telegram(false, false).await;
    let text = format!("{}\n{}", "a".repeat(3000), "b".repeat(3000));
    assert!(notifier.send(&text).await.unwrap());

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0]["text"], "a".repeat(3000));
    assert_eq!(captured[1]["text"], "b".repeat(3000));
}
