//! Integration tests for the rank endpoint.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` against
//! the in-memory store and a scripted reader. No network access is needed
//! except for the server lifecycle tests, which bind local ports.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use massbot_api::{AppState, ServerConfig, ServerError, build_router, serve, start_server};
use massbot_chain::{Address, ChainError, ChainReader, TokenValue};
use massbot_db::{MemoryStore, TokenStore};
use massbot_types::{Mass, Tier, TokenId, TokenRecord};
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

/// Reader that only answers owner lookups.
#[derive(Debug, Default)]
struct OwnerReader {
    down: bool,
}

impl ChainReader for OwnerReader {
    async fn value_of(&self, id: TokenId) -> Result<TokenValue, ChainError> {
        Err(ChainError::NotFound(format!("token {id}")))
    }

    async fn decode(&self, _value: TokenValue) -> Result<(Tier, Mass), ChainError> {
        Err(ChainError::Decode("not scripted".to_owned()))
    }

    async fn owner_of(&self, id: TokenId) -> Result<Address, ChainError> {
        if self.down {
            return Err(ChainError::Unavailable("connection refused".to_owned()));
        }
        match id.get() {
            26984 => Ok(Address::with_last_byte(0x01)),
            2 => Ok(Address::with_last_byte(0x02)),
            _ => Err(ChainError::NotFound(format!("token {id}"))),
        }
    }

    async fn resolve_alias(&self, address: Address) -> Option<String> {
        (address == Address::with_last_byte(0x01)).then(|| "pak.eth".to_owned())
    }

    async fn universe_size(&self) -> Result<u64, ChainError> {
        Ok(28_990)
    }

    async fn current_alpha(&self) -> Result<TokenId, ChainError> {
        Ok(TokenId(26984))
    }
}

async fn make_state(reader: OwnerReader) -> Arc<AppState<OwnerReader, MemoryStore>> {
    let store = MemoryStore::new();
    store
        .upsert_batch(&[
            TokenRecord::existing(TokenId(1), Tier(3), Mass(30)),
            TokenRecord::existing(TokenId(2), Tier(3), Mass(10)),
            TokenRecord::existing(TokenId(3), Tier(1), Mass(500)),
            TokenRecord::existing(TokenId(26984), Tier(3), Mass(20)),
            TokenRecord::absent(TokenId(5)),
        ])
        .await
        .unwrap();
    Arc::new(AppState::new(Arc::new(reader), Arc::new(store), TokenId(26984)))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: Arc<AppState<OwnerReader, MemoryStore>>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

#[tokio::test]
async fn tracked_rank_with_owner_alias() {
    let (status, json) = get(make_state(OwnerReader::default()).await, "/rank").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tokenId"], 26984);
    assert_eq!(json["mass"], 20);
    assert_eq!(json["rank"], 2);
    assert_eq!(json["overallRank"], 3);
    assert_eq!(json["owner"]["alias"], "pak.eth");
    assert_eq!(
        json["owner"]["address"],
        Address::with_last_byte(0x01).to_checksum(None)
    );
}

#[tokio::test]
async fn rank_by_id_without_alias() {
    let (status, json) = get(make_state(OwnerReader::default()).await, "/rank/2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rank"], 3);
    assert_eq!(json["overallRank"], 4);
    assert!(json["owner"]["alias"].is_null());
}

#[tokio::test]
async fn destroyed_token_has_no_owner() {
    let (status, json) = get(make_state(OwnerReader::default()).await, "/rank/5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["exists"], false);
    assert!(json["owner"].is_null());
}

#[tokio::test]
async fn owner_not_found_is_null() {
    let (status, json) = get(make_state(OwnerReader::default()).await, "/rank/3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rank"], 1);
    assert!(json["owner"].is_null());
}

#[tokio::test]
async fn missing_record_is_a_server_error() {
    let (status, json) = get(make_state(OwnerReader::default()).await, "/rank/777").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], 500);
    assert!(json["error"].as_str().unwrap().contains("777"));
}

#[tokio::test]
async fn invalid_id_is_a_bad_request() {
    let state = make_state(OwnerReader::default()).await;
    for uri in ["/rank/zero", "/rank/0", "/rank/-1"] {
        let (status, json) = get(Arc::clone(&state), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["status"], 400);
    }
}

#[tokio::test]
async fn ledger_outage_is_a_bad_gateway() {
    let (status, json) = get(make_state(OwnerReader { down: true }).await, "/rank").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["status"], 502);
}

#[tokio::test]
async fn health_is_ok() {
    let (status, json) = get(make_state(OwnerReader::default()).await, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn server_stops_on_shutdown_signal() {
    let state = make_state(OwnerReader::default()).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = watch::channel(false);
    let server = tokio::spawn(serve(listener, state, rx));

    tx.send(true).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}

#[tokio::test]
async fn start_server_binds_a_host_name() {
    let state = make_state(OwnerReader::default()).await;
    let config = ServerConfig {
        host: "localhost".to_owned(),
        port: 0,
    };
    let (tx, rx) = watch::channel(false);
    let server = tokio::spawn(async move { start_server(&config, state, rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))), "got {finished:?}");
}

#[tokio::test]
async fn start_server_reports_a_taken_port() {
    let state = make_state(OwnerReader::default()).await;
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: taken.local_addr().unwrap().port(),
    };
    let (_tx, rx) = watch::channel(false);

    let err = start_server(&config, state, rx).await.unwrap_err();
    assert!(matches!(err, ServerError::Bind(_)), "got {err:?}");
}
