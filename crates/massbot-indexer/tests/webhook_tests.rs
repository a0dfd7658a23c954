//! Webhook delivery against a local Axum endpoint.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use massbot_indexer::{IndexerError, Notification, NotificationSink, WebhookSink};

#[derive(Debug, Clone)]
struct Received {
    part: Option<String>,
    content_type: String,
    body: Vec<u8>,
}

type Inbox = Arc<Mutex<Vec<Received>>>;

async fn hook(
    State(inbox): State<Inbox>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    inbox.lock().unwrap().push(Received {
        part: query.get("part").cloned(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned(),
        body: body.to_vec(),
    });
    StatusCode::NO_CONTENT
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/hook")
}

#[tokio::test]
async fn posts_text_then_image() {
    let inbox = Inbox::default();
    let url = spawn(Router::new().route("/hook", post(hook)).with_state(Arc::clone(&inbox))).await;
    let sink = WebhookSink::new(&url, Duration::from_secs(5)).unwrap();

    sink.deliver(&Notification {
        text: "#2 is now m(12)".to_owned(),
        image: Some(vec![0x89, b'P', b'N', b'G']),
    })
    .await
    .unwrap();

    let received = inbox.lock().unwrap().clone();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].part, None);
    assert!(received[0].content_type.starts_with("application/json"));
    let json: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(json["text"], "#2 is now m(12)");
    assert_eq!(received[1].part.as_deref(), Some("image"));
    assert_eq!(received[1].content_type, "application/octet-stream");
    assert_eq!(received[1].body, vec![0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn text_only_is_a_single_request() {
    let inbox = Inbox::default();
    let url = spawn(Router::new().route("/hook", post(hook)).with_state(Arc::clone(&inbox))).await;
    let sink = WebhookSink::new(&url, Duration::from_secs(5)).unwrap();

    sink.deliver(&Notification {
        text: "hello".to_owned(),
        image: None,
    })
    .await
    .unwrap();
    assert_eq!(inbox.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_surface_as_notify_errors() {
    let app = Router::new().route("/hook", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let url = spawn(app).await;
    let sink = WebhookSink::new(&url, Duration::from_secs(5)).unwrap();

    let err = sink.deliver(&Notification::default()).await.unwrap_err();
    assert!(matches!(err, IndexerError::Notify(_)), "got {err:?}");
}

#[test]
fn invalid_url_is_rejected() {
    assert!(WebhookSink::new("not a url", Duration::from_secs(1)).is_err());
}
