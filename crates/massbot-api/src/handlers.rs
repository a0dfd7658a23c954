//! Endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/rank` | Rank of the tracked token |
//! | `GET` | `/rank/{id}` | Rank of any token |
//! | `GET` | `/health` | Liveness probe |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use massbot_chain::ChainReader;
use massbot_db::TokenStore;
use massbot_indexer::rank_of;
use massbot_types::{RankReport, TokenId};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /rank` -- the tracked token.
pub async fn get_tracked_rank<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
) -> Result<Json<RankReport>, ApiError>
where
    R: ChainReader,
    S: TokenStore,
{
    let id = state.tracked;
    rank_report(&state, id).await.map(Json)
}

/// `GET /rank/{id}` -- any token.
pub async fn get_rank<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    Path(raw): Path<String>,
) -> Result<Json<RankReport>, ApiError>
where
    R: ChainReader,
    S: TokenStore,
{
    let id = parse_token_id(&raw)?;
    rank_report(&state, id).await.map(Json)
}

/// `GET /health`
#[allow(clippy::unused_async)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn parse_token_id(raw: &str) -> Result<TokenId, ApiError> {
    raw.parse::<u64>()
        .ok()
        .and_then(TokenId::from_ledger)
        .ok_or_else(|| ApiError::InvalidId(raw.to_owned()))
}

async fn rank_report<R, S>(state: &AppState<R, S>, id: TokenId) -> Result<RankReport, ApiError>
where
    R: ChainReader,
    S: TokenStore,
{
    let mut report = rank_of(state.store.as_ref(), id)
        .await?
        .ok_or(ApiError::MissingRecord(id))?;

    if report.exists {
        report.owner = match state.reader.owner_info(id).await {
            Ok(owner) => Some(owner),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(ApiError::Upstream(e.to_string())),
        };
    }
    Ok(report)
}
