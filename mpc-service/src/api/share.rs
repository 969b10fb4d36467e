//! `GET /signal/{id}/share_info`: lets a peer learn which x-coordinate this
//! validator holds for a signal, without ever disclosing the share value
//! itself outside of [`Environment::Dev`](crate::config::Environment::Dev).

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use mpc_types::api::v1::ShareInfoResponse;
use uuid::Uuid;

use crate::config::Environment;
use crate::error::CoordinatorError;
use crate::AppState;

async fn share_info(State(state): State<AppState>, Path(signal_id): Path<Uuid>) -> Result<Json<ShareInfoResponse>, CoordinatorError> {
    let (share_x, share_y, _mac_y) = state
        .share_store
        .share_info(signal_id)
        .ok_or_else(|| CoordinatorError::InvalidInput(format!("no share held for signal {signal_id}")))?;

    let share_y = match state.config.environment {
        Environment::Dev => Some(share_y),
        Environment::Prod => None,
    };

    Ok(Json(ShareInfoResponse { signal_id, share_x, share_y }))
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/signal/{id}/share_info", get(share_info))
}
