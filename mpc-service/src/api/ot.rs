//! Peer-side handlers for the `/mpc/ot/{session_id}/*` two-party network-OT
//! sub-protocol, mirroring [`crate::services::coordinator::Coordinator`]'s
//! drive of the same four phases from the other side. State is threaded
//! across the calls via [`crate::services::ot_store::OtStateStore`] rather
//! than [`crate::services::session_registry::SessionRegistry`], since this
//! handshake runs before the session itself exists on this node - the
//! coordinator only sends `/mpc/init` once triple generation is complete.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use mpc_core::dh::dh_group_2048;
use mpc_core::field::Fp;
use mpc_core::triple_gen::OtTripleGenState;
use mpc_types::api::v1::{
    AdditiveTripleShare, OtChoicesRequest, OtChoicesResponse, OtCompleteRequest, OtCompleteResponse, OtSetupRequest,
    OtSetupResponse, OtSharesResponse, OtTransfersRequest, OtTransfersResponse,
};
use rand::thread_rng;

use crate::error::CoordinatorError;
use crate::util::{biguint_from_hex, biguint_to_hex};
use crate::AppState;

async fn setup(State(state): State<AppState>, Json(req): Json<OtSetupRequest>) -> Result<Json<OtSetupResponse>, CoordinatorError> {
    let group = dh_group_2048();
    let mut rng = thread_rng();
    let states: Vec<OtTripleGenState> = (0..req.count).map(|_| OtTripleGenState::initialize(group.clone(), &mut rng)).collect();
    let sender_public_keys = states.iter().map(|s| biguint_to_hex(&s.sender_public_key())).collect();
    state.ot_store.insert(req.session_id.clone(), states);
    Ok(Json(OtSetupResponse {
        session_id: req.session_id,
        sender_public_keys,
    }))
}

async fn choices(State(state): State<AppState>, Json(req): Json<OtChoicesRequest>) -> Result<Json<OtChoicesResponse>, CoordinatorError> {
    let peer_pks: Vec<num_bigint::BigUint> = req.peer_sender_public_keys.iter().map(|h| biguint_from_hex(h)).collect::<Result<_, _>>()?;

    let choices = state.ot_store.with(&req.session_id, |run| -> Result<Vec<Vec<String>>, CoordinatorError> {
        if run.states.len() != peer_pks.len() {
            return Err(CoordinatorError::InvalidInput("peer public key count mismatch".into()));
        }
        let choices = run
            .states
            .iter()
            .zip(&peer_pks)
            .map(|(s, pk)| s.generate_receiver_choices(pk).iter().map(biguint_to_hex).collect())
            .collect();
        run.peer_public_keys = peer_pks.clone();
        Ok(choices)
    })??;

    Ok(Json(OtChoicesResponse {
        session_id: req.session_id,
        choices,
    }))
}

async fn transfers(State(state): State<AppState>, Json(req): Json<OtTransfersRequest>) -> Result<Json<OtTransfersResponse>, CoordinatorError> {
    for row in &req.peer_choices {
        if row.len() != state.config.ot_bits {
            return Err(CoordinatorError::InvalidInput(format!(
                "expected {} OT choices per triple, got {}",
                state.config.ot_bits,
                row.len()
            )));
        }
    }
    let peer_choices: Vec<Vec<num_bigint::BigUint>> = req
        .peer_choices
        .iter()
        .map(|row| row.iter().map(|h| biguint_from_hex(h)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;

    let pairs = state
        .ot_store
        .with(&req.session_id, |run| -> Result<Vec<Vec<(Fp, Fp)>>, CoordinatorError> {
            if run.states.len() != peer_choices.len() {
                return Err(CoordinatorError::InvalidInput("peer choice count mismatch".into()));
            }
            let mut pairs = Vec::with_capacity(run.states.len());
            let mut sender_shares = Vec::with_capacity(run.states.len());
            for (triple_state, choices) in run.states.iter().zip(&peer_choices) {
                let (p, share) = triple_state.process_sender_choices(choices);
                pairs.push(p);
                sender_shares.push(share);
            }
            run.sender_shares = sender_shares;
            Ok(pairs)
        })??;

    Ok(Json(OtTransfersResponse {
        session_id: req.session_id,
        pairs,
    }))
}

async fn complete(State(state): State<AppState>, Json(req): Json<OtCompleteRequest>) -> Result<Json<OtCompleteResponse>, CoordinatorError> {
    for row in &req.peer_pairs {
        if row.len() != state.config.ot_bits {
            return Err(CoordinatorError::InvalidInput(format!(
                "expected {} OT transfer pairs per triple, got {}",
                state.config.ot_bits,
                row.len()
            )));
        }
    }
    state.ot_store.with(&req.session_id, |run| -> Result<(), CoordinatorError> {
        if run.peer_public_keys.len() != req.peer_pairs.len() || run.sender_shares.len() != req.peer_pairs.len() {
            return Err(CoordinatorError::InvalidInput("peer transfer pair count mismatch".into()));
        }
        for ((triple_state, peer_pk), (peer_pairs, sender_share)) in run
            .states
            .iter_mut()
            .zip(&run.peer_public_keys)
            .zip(req.peer_pairs.iter().zip(&run.sender_shares))
        {
            triple_state.decrypt_and_accumulate(peer_pk, peer_pairs, *sender_share);
        }
        Ok(())
    })??;

    Ok(Json(OtCompleteResponse {
        session_id: req.session_id,
        ack: true,
    }))
}

async fn shares(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<Json<OtSharesResponse>, CoordinatorError> {
    let run = state
        .ot_store
        .remove(&session_id)
        .ok_or_else(|| CoordinatorError::SessionExpired(session_id.clone()))?;
    let additive_shares = run
        .states
        .iter()
        .map(|s| {
            let (a, b, c) = s.additive_shares();
            AdditiveTripleShare { a, b, c }
        })
        .collect();
    Ok(Json(OtSharesResponse { session_id, additive_shares }))
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/mpc/ot/{session_id}/setup", post(setup))
        .route("/mpc/ot/{session_id}/choices", post(choices))
        .route("/mpc/ot/{session_id}/transfers", post(transfers))
        .route("/mpc/ot/{session_id}/complete", post(complete))
        .route("/mpc/ot/{session_id}/shares", post(shares))
}
