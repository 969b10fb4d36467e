//! Peer-side handlers for the `/mpc/*` session lifecycle: accept a session
//! a remote coordinator originated, drive this node's own gate state
//! machine one call at a time, participate in the closing batch MAC check,
//! and react to the coordinator's result or abort broadcast.
//!
//! Each handler here is a short-lived task, unlike [`crate::Coordinator::run_session`]
//! which owns a session end-to-end. A [`crate::services::session_registry::SessionGuard`]
//! returned by [`crate::services::session_registry::SessionRegistry::insert_new_session`]
//! is therefore disarmed immediately on `init`: the entry must outlive this
//! request and is only ever removed later, by `/mpc/result`, `/mpc/abort`,
//! or the background TTL reaper.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use mpc_core::beaver::{self, GateOutput, LocalTriple, ParticipantState};
use mpc_core::field::Fp;
use mpc_core::spdz::{self, AuthGateOutput, AuthLocalTriple, AuthenticatedParticipantState, AuthenticatedShare};
use mpc_types::api::v1::{
    AbortRequest, AlphaShareRequest, AlphaShareResponse, ComputeGateRequest, ComputeGateResponse, InitRequest, InitResponse,
    MacCheckCommitRequest, MacCheckCommitResponse, MacCheckRevealRequest, MacCheckRevealResponse, ResultRequest, StatusResponse,
};
use mpc_types::{MPCMode, SessionStatus};
use rand::{thread_rng, Rng};

use crate::error::CoordinatorError;
use crate::services::coordinator::{auth_availability_leaves, from_wire, validate_available_indices};
use crate::services::session_registry::{Engine, SessionEntry};
use crate::util::{bytes32_to_hex, validate_session_id};
use crate::AppState;

fn get_live_entry(state: &AppState, session_id: &str) -> Result<Arc<SessionEntry>, CoordinatorError> {
    let entry = state
        .registry
        .get(session_id)
        .ok_or_else(|| CoordinatorError::SessionExpired(session_id.to_string()))?;
    if entry.is_expired() {
        state.registry.remove(session_id);
        return Err(CoordinatorError::SessionExpired(session_id.to_string()));
    }
    Ok(entry)
}

async fn init(State(state): State<AppState>, Json(req): Json<InitRequest>) -> Result<Json<InitResponse>, CoordinatorError> {
    validate_session_id(&req.session_id)?;
    validate_available_indices(&req.available_indices)?;

    let (self_x, self_share, self_mac) = match state.share_store.share_info(req.signal_id) {
        Some(info) => info,
        None => {
            return Ok(Json(InitResponse {
                session_id: req.session_id,
                accepted: false,
                message: "no share held for this signal".into(),
            }));
        }
    };

    let engine = match req.mode {
        MPCMode::SemiHonest => {
            let leaves = beaver::availability_leaves(self_share, req.r_share_y, &req.available_indices);
            let plan = beaver::build_gate_plan(leaves.len());
            let triples: Vec<LocalTriple> = req
                .triple_shares
                .iter()
                .map(|t| LocalTriple { a: t.a, b: t.b, c: t.c })
                .collect();
            Engine::SemiHonest(ParticipantState::new(self_x, leaves, plan, triples)?)
        }
        MPCMode::Authenticated => {
            let Some(auth) = req.auth.as_ref() else {
                return Ok(Json(InitResponse {
                    session_id: req.session_id,
                    accepted: false,
                    message: "authenticated mode requires auth fields".into(),
                }));
            };
            let Some(self_mac) = self_mac else {
                return Ok(Json(InitResponse {
                    session_id: req.session_id,
                    accepted: false,
                    message: "this validator has no persistent MAC for authenticated mode".into(),
                }));
            };
            let Some(own_alpha_share) = state.config.alpha_share()? else {
                return Ok(Json(InitResponse {
                    session_id: req.session_id,
                    accepted: false,
                    message: "MPC_NODE_ALPHA_SHARE not configured".into(),
                }));
            };

            // The coordinator's own alpha_share field is ignored in favor of
            // this node's persistent share, the same way auth_secret_share
            // is ignored in favor of this node's persistent mac_y.
            let secret_share = AuthenticatedShare { value: self_share, mac: self_mac };
            let r_share = from_wire(auth.auth_r_share);
            let leaves = auth_availability_leaves(secret_share, r_share, own_alpha_share, &req.available_indices);
            let plan = beaver::build_gate_plan(leaves.len());
            let triples: Vec<AuthLocalTriple> = auth
                .auth_triple_shares
                .iter()
                .map(|t| AuthLocalTriple {
                    a: from_wire(t.a),
                    b: from_wire(t.b),
                    c: from_wire(t.c),
                })
                .collect();
            Engine::Authenticated(AuthenticatedParticipantState::new(self_x, own_alpha_share, leaves, plan, triples)?)
        }
    };

    let entry = SessionEntry {
        session_id: req.session_id.clone(),
        signal_id: req.signal_id,
        mode: req.mode,
        threshold: req.threshold,
        participant_xs: req.participant_xs.clone(),
        created_at: Instant::now(),
        ttl: state.config.session_ttl,
        engine: parking_lot::Mutex::new(engine),
        status: parking_lot::Mutex::new(SessionStatus::Round1Collecting),
        peers: Vec::new(),
        pending_mac_check: parking_lot::Mutex::new(None),
    };
    let (_, mut guard) = state.registry.insert_new_session(entry)?;
    // This node only joined as a peer: the coordinator owns the session's
    // full lifetime, so the entry must survive past this request.
    guard.disarm();

    Ok(Json(InitResponse {
        session_id: req.session_id,
        accepted: true,
        message: String::new(),
    }))
}

async fn compute_gate(
    State(state): State<AppState>,
    Json(req): Json<ComputeGateRequest>,
) -> Result<Json<ComputeGateResponse>, CoordinatorError> {
    let entry = get_live_entry(&state, &req.session_id)?;
    let prev_opened = match (req.prev_opened_d, req.prev_opened_e) {
        (Some(d), Some(e)) => Some((d, e)),
        (None, None) => None,
        _ => return Err(CoordinatorError::InvalidInput("prev_opened_d and prev_opened_e must both be present or absent".into())),
    };

    let (d_value, e_value) = {
        let mut engine = entry.engine.lock();
        match &mut *engine {
            Engine::SemiHonest(s) => match s.compute_gate(req.gate_idx, prev_opened)? {
                GateOutput::Masked(m) => (m.d, m.e),
                GateOutput::Final(z) => (z, Fp::zero()),
            },
            Engine::Authenticated(s) => match s.compute_gate(req.gate_idx, prev_opened)? {
                AuthGateOutput::Masked(m) => (m.d, m.e),
                AuthGateOutput::Final(share) => (share.value, Fp::zero()),
            },
        }
    };

    Ok(Json(ComputeGateResponse {
        session_id: req.session_id,
        gate_idx: req.gate_idx,
        d_value,
        e_value,
        // MAC shares are never opened per gate; they are checked in bulk via
        // the /mpc/mac_check/commit and /mpc/mac_check/reveal handshake.
        d_mac: None,
        e_mac: None,
    }))
}

async fn result(State(state): State<AppState>, Json(req): Json<ResultRequest>) -> Result<Json<ResultRequest>, CoordinatorError> {
    if state.registry.remove(&req.session_id).is_some() {
        tracing::info!(session_id = %req.session_id, available = req.available, "session closed by coordinator result");
    }
    Ok(Json(req))
}

async fn abort(State(state): State<AppState>, Json(req): Json<AbortRequest>) -> Result<Json<serde_json::Value>, CoordinatorError> {
    if state.registry.remove(&req.session_id).is_some() {
        tracing::warn!(session_id = %req.session_id, reason = ?req.reason, "session aborted by coordinator");
    }
    Ok(Json(serde_json::Value::Null))
}

async fn mac_check_commit(
    State(state): State<AppState>,
    Json(req): Json<MacCheckCommitRequest>,
) -> Result<Json<MacCheckCommitResponse>, CoordinatorError> {
    let entry = get_live_entry(&state, &req.session_id)?;
    let sigma = {
        let engine = entry.engine.lock();
        match &*engine {
            Engine::Authenticated(s) => s.mac_check_contribution(&req.coeffs)?,
            Engine::SemiHonest(_) => {
                return Err(CoordinatorError::InvalidInput("mac check requested for a semi-honest session".into()));
            }
        }
    };
    let nonce: [u8; 32] = thread_rng().gen();
    let commitment = spdz::commit(sigma, nonce);
    *entry.pending_mac_check.lock() = Some((sigma, nonce));

    Ok(Json(MacCheckCommitResponse {
        session_id: req.session_id,
        commitment: bytes32_to_hex(commitment.as_bytes()),
    }))
}

async fn mac_check_reveal(
    State(state): State<AppState>,
    Json(req): Json<MacCheckRevealRequest>,
) -> Result<Json<MacCheckRevealResponse>, CoordinatorError> {
    let entry = get_live_entry(&state, &req.session_id)?;
    let (sigma, nonce) = entry
        .pending_mac_check
        .lock()
        .take()
        .ok_or_else(|| CoordinatorError::InvalidInput("no pending mac check commitment for this session".into()))?;

    if let Engine::Authenticated(s) = &mut *entry.engine.lock() {
        s.clear_pending_checks();
    }

    Ok(Json(MacCheckRevealResponse {
        session_id: req.session_id,
        sigma,
        nonce: bytes32_to_hex(&nonce),
    }))
}

async fn alpha_share(
    State(state): State<AppState>,
    Json(req): Json<AlphaShareRequest>,
) -> Result<Json<AlphaShareResponse>, CoordinatorError> {
    let alpha_share = state
        .config
        .alpha_share()?
        .ok_or_else(|| CoordinatorError::InvalidInput("MPC_NODE_ALPHA_SHARE not configured".into()))?;
    Ok(Json(AlphaShareResponse {
        session_id: req.session_id,
        alpha_share,
    }))
}

async fn status(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<Json<StatusResponse>, CoordinatorError> {
    let entry = get_live_entry(&state, &session_id)?;
    Ok(Json(StatusResponse {
        status: *entry.status.lock(),
        participants_responded: entry.participant_xs.len(),
        total_participants: entry.participant_xs.len(),
        available: None,
    }))
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/mpc/init", post(init))
        .route("/mpc/compute_gate", post(compute_gate))
        .route("/mpc/result", post(result))
        .route("/mpc/abort", post(abort))
        .route("/mpc/mac_check/commit", post(mac_check_commit))
        .route("/mpc/mac_check/reveal", post(mac_check_reveal))
        .route("/mpc/alpha_share", post(alpha_share))
        .route("/mpc/{session_id}/status", get(status))
}
