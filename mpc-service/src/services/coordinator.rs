//! Drives one availability-check session from the coordinator's side:
//! peer discovery, triple and mask generation, the init broadcast, driving
//! every gate to completion (with a batch MAC check in authenticated
//! mode), and the closing result or abort broadcast.
//!
//! 1. **Peer discovery**: [`crate::services::peer_registry::PeerRegistry`].
//! 2. **Create session**: generate Beaver triples (and, in authenticated
//!    mode, their MACs) either via the two-party network-OT protocol or the
//!    explicitly-gated trusted-dealer fallback.
//! 3. **Broadcast init** (`POST /mpc/init`): collect acceptances, abort if
//!    fewer than `threshold` participants (including this node) accept.
//! 4. **Drive gates** (`POST /mpc/compute_gate`): reconstruct each gate's
//!    opened `(d, e)` by Shamir interpolation and feed it back to every
//!    participant for the next round.
//! 5. **MAC check** (authenticated mode only): commit-then-reveal over
//!    every opened `(d, e)` pair from the whole session.
//! 6. **Broadcast result or abort** (`POST /mpc/result` / `POST /mpc/abort`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use mpc_core::beaver::{self, AvailabilityOutcome, GateOutput, LocalTriple, ParticipantState};
use mpc_core::dh::dh_group_2048;
use mpc_core::field::Fp;
use mpc_core::shamir::{self, Share};
use mpc_core::spdz::{
    self, AuthGateOutput, AuthLocalTriple, AuthenticatedBeaverTriple, AuthenticatedParticipantState, AuthenticatedRecord,
    AuthenticatedShare, Commitment,
};
use mpc_core::triple_gen::{self, BeaverTripleShares, OtTripleGenState};
use mpc_types::api::v1::{
    AbortReason, AbortRequest, AlphaShareRequest, AlphaShareResponse, AuthInitFields, AuthTripleShareWire,
    AuthenticatedShareWire, ComputeGateRequest, ComputeGateResponse, InitRequest, InitResponse, MacCheckCommitRequest,
    MacCheckCommitResponse, MacCheckRevealRequest, MacCheckRevealResponse, OtChoicesRequest, OtChoicesResponse,
    OtCompleteRequest, OtCompleteResponse, OtSetupRequest, OtSetupResponse, OtSharesResponse, OtTransfersRequest,
    OtTransfersResponse, ResultRequest, TripleShareWire,
};
use mpc_types::{MPCMode, MPCResult, SessionStatus};
use rand::{rngs::ThreadRng, thread_rng, Rng};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant as TokioInstant};
use tracing::instrument;
use uuid::Uuid;

use crate::config::MpcNodeConfig;
use crate::error::CoordinatorError;
use crate::services::peer_client::{PeerClient, PeerHandle};
use crate::services::peer_registry::PeerRegistry;
use crate::services::session_registry::{Engine, SessionEntry, SessionRegistry};
use crate::services::share_store::ShareStore;
use crate::util::{biguint_from_hex, biguint_to_hex, bytes32_from_hex};

const MIN_AVAILABLE_INDEX: u64 = 1;
const MAX_AVAILABLE_INDEX: u64 = 10;

fn share_for(shares: &[Share], x: u8) -> Result<Fp, CoordinatorError> {
    shares
        .iter()
        .find(|s| s.x == x)
        .map(|s| s.y)
        .ok_or_else(|| CoordinatorError::InvalidInput(format!("no share generated for participant x={x}")))
}

fn record_for(records: &[AuthenticatedRecord], x: u8) -> Result<AuthenticatedShare, CoordinatorError> {
    records
        .iter()
        .find(|r| r.x == x)
        .map(|r| r.share)
        .ok_or_else(|| CoordinatorError::InvalidInput(format!("no authenticated share generated for participant x={x}")))
}

pub(crate) fn validate_available_indices(indices: &[u64]) -> Result<(), CoordinatorError> {
    let mut seen = HashSet::new();
    for &idx in indices {
        if !(MIN_AVAILABLE_INDEX..=MAX_AVAILABLE_INDEX).contains(&idx) {
            return Err(CoordinatorError::InvalidInput(format!("available index {idx} out of range [1,10]")));
        }
        if !seen.insert(idx) {
            return Err(CoordinatorError::InvalidInput(format!("duplicate available index {idx}")));
        }
    }
    Ok(())
}

/// Built for every peer during session setup: everything it needs to
/// construct its own local engine for this session.
struct PeerInit {
    r_share_y: Fp,
    triple_shares: Vec<TripleShareWire>,
    auth: Option<PeerAuthInit>,
}

struct PeerAuthInit {
    auth_triple_shares: Vec<AuthTripleShareWire>,
    alpha_share: Fp,
    auth_r_share: AuthenticatedShareWire,
}

/// Drives sessions this node originates (the coordinator role). Sessions
/// this node only participates in as a peer are handled entirely by the
/// `/mpc/*` API handlers against the same [`SessionRegistry`].
pub struct Coordinator {
    config: MpcNodeConfig,
    registry: SessionRegistry,
    peer_client: PeerClient,
    peer_registry: Arc<dyn PeerRegistry>,
    share_store: Arc<dyn ShareStore>,
}

impl Coordinator {
    /// Builds a coordinator from its constituent services.
    pub fn new(
        config: MpcNodeConfig,
        registry: SessionRegistry,
        peer_client: PeerClient,
        peer_registry: Arc<dyn PeerRegistry>,
        share_store: Arc<dyn ShareStore>,
    ) -> Self {
        Self {
            config,
            registry,
            peer_client,
            peer_registry,
            share_store,
        }
    }

    /// Runs a full availability-check session as coordinator, returning the
    /// caller-visible outcome. The security-relevant detail of *why* a
    /// session aborted is logged server-side only, never returned.
    #[instrument(skip(self), fields(session_id = %session_id, signal_id = %signal_id))]
    pub async fn run_session(&self, session_id: String, signal_id: Uuid, available_indices: Vec<u64>) -> Result<MPCResult, CoordinatorError> {
        validate_available_indices(&available_indices)?;
        if available_indices.is_empty() {
            return Ok(MPCResult {
                available: false,
                participating_validators: 0,
                aborted: false,
            });
        }

        let (self_x, self_share, self_mac) = self
            .share_store
            .share_info(signal_id)
            .ok_or_else(|| CoordinatorError::InvalidInput(format!("no share held for signal {signal_id}")))?;

        let k = self.config.threshold;
        let mut peers = self.peer_registry.peers();
        peers.retain(|p| p.x != self_x);
        peers.sort_by_key(|p| p.x);
        if 1 + peers.len() < k {
            return Err(CoordinatorError::InsufficientShares {
                needed: k,
                got: 1 + peers.len(),
            });
        }

        let mut xs: Vec<u8> = std::iter::once(self_x).chain(peers.iter().map(|p| p.x)).collect();
        xs.sort_unstable();

        let mode = if self.config.use_authenticated_mpc {
            MPCMode::Authenticated
        } else {
            MPCMode::SemiHonest
        };
        let gate_count = beaver::build_gate_plan(1 + available_indices.len()).len();

        let (engine, peer_inits) = match mode {
            MPCMode::SemiHonest => {
                self.materialize_semi_honest(&session_id, &xs, k, self_x, self_share, gate_count, &peers, &available_indices)
                    .await?
            }
            MPCMode::Authenticated => {
                self.materialize_authenticated(&session_id, &xs, k, self_x, self_share, self_mac, gate_count, &peers, &available_indices)
                    .await?
            }
        };

        let entry = SessionEntry {
            session_id: session_id.clone(),
            signal_id,
            mode,
            threshold: k,
            participant_xs: xs.clone(),
            created_at: Instant::now(),
            ttl: self.config.session_ttl,
            engine: parking_lot::Mutex::new(engine),
            status: parking_lot::Mutex::new(SessionStatus::Pending),
            peers: peers.clone(),
            pending_mac_check: parking_lot::Mutex::new(None),
        };
        let (entry, mut guard) = self.registry.insert_new_session(entry)?;

        let accepted = self.broadcast_init(&session_id, signal_id, &available_indices, self_x, &xs, k, mode, &peers, &peer_inits).await;
        if 1 + accepted.len() < k {
            self.broadcast_abort(&session_id, &peers, AbortReason::InsufficientParticipants, 0, None).await;
            guard.disarm();
            self.registry.remove(&session_id);
            return Ok(MPCResult {
                available: false,
                participating_validators: 1 + accepted.len(),
                aborted: true,
            });
        }
        let live_peers: Vec<PeerHandle> = peers.into_iter().filter(|p| accepted.contains(&p.x)).collect();
        *entry.status.lock() = SessionStatus::Round1Collecting;

        match self.drive_gates(&entry, &live_peers, gate_count, k).await {
            Ok(outcome) => {
                *entry.status.lock() = SessionStatus::Complete;
                self.broadcast_result(&session_id, &live_peers, signal_id, outcome.available, &xs).await;
                guard.disarm();
                self.registry.remove(&session_id);
                Ok(MPCResult {
                    available: outcome.available,
                    participating_validators: 1 + live_peers.len(),
                    aborted: false,
                })
            }
            Err(CoordinatorError::MacFailure { gate_idx }) => {
                *entry.status.lock() = SessionStatus::Aborted;
                self.broadcast_abort(&session_id, &live_peers, AbortReason::MacFailure, gate_idx, None).await;
                guard.disarm();
                self.registry.remove(&session_id);
                Ok(MPCResult {
                    available: false,
                    participating_validators: 1 + live_peers.len(),
                    aborted: true,
                })
            }
            Err(CoordinatorError::Timeout { missing }) => {
                tracing::warn!(missing, "gate-driving round timed out waiting on peers");
                *entry.status.lock() = SessionStatus::Aborted;
                self.broadcast_abort(&session_id, &live_peers, AbortReason::PeerTimeout, 0, None).await;
                guard.disarm();
                self.registry.remove(&session_id);
                Ok(MPCResult {
                    available: false,
                    participating_validators: 1 + live_peers.len(),
                    aborted: true,
                })
            }
            Err(err) => {
                *entry.status.lock() = SessionStatus::Aborted;
                self.broadcast_abort(&session_id, &live_peers, AbortReason::Other { message: err.to_string() }, 0, None)
                    .await;
                guard.disarm();
                self.registry.remove(&session_id);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn materialize_semi_honest(
        &self,
        session_id: &str,
        xs: &[u8],
        k: usize,
        self_x: u8,
        self_share: Fp,
        gate_count: usize,
        peers: &[PeerHandle],
        available_indices: &[u64],
    ) -> Result<(Engine, Vec<PeerInit>), CoordinatorError> {
        let (r_shares, triples) = if peers.len() == 1 && self.config.use_network_ot {
            let mut triples = self.generate_triples_via_network_ot(session_id, &peers[0], xs, k, gate_count + 1).await?;
            let r_triple = triples.remove(0);
            (r_triple.a, triples)
        } else {
            if !self.config.allow_dealer_fallback {
                return Err(CoordinatorError::SimulationModeRequired("trusted-dealer triple generation"));
            }
            tracing::warn!("using trusted-dealer triple generation for a {}-party session", xs.len());
            let mut rng = thread_rng();
            let r_secret = Fp::random_nonzero(&mut rng);
            let r_shares = shamir::split_at_points(r_secret, xs, k, &mut rng)?;
            let triples = (0..gate_count)
                .map(|_| triple_gen::generate_dealer_triple(xs, k, self.config.allow_dealer_fallback, &mut rng))
                .collect::<mpc_core::Result<Vec<_>>>()?;
            (r_shares, triples)
        };

        let r_share_self = share_for(&r_shares, self_x)?;
        let leaves = beaver::availability_leaves(self_share, r_share_self, available_indices);
        let plan = beaver::build_gate_plan(leaves.len());
        let own_triples: Vec<LocalTriple> = triples
            .iter()
            .map(|t| {
                Ok(LocalTriple {
                    a: share_for(&t.a, self_x)?,
                    b: share_for(&t.b, self_x)?,
                    c: share_for(&t.c, self_x)?,
                })
            })
            .collect::<Result<_, CoordinatorError>>()?;

        let mut peer_inits = Vec::with_capacity(peers.len());
        for peer in peers {
            let r_share_y = share_for(&r_shares, peer.x)?;
            let triple_shares = triples
                .iter()
                .map(|t| {
                    Ok(TripleShareWire {
                        a: share_for(&t.a, peer.x)?,
                        b: share_for(&t.b, peer.x)?,
                        c: share_for(&t.c, peer.x)?,
                    })
                })
                .collect::<Result<Vec<_>, CoordinatorError>>()?;
            peer_inits.push(PeerInit {
                r_share_y,
                triple_shares,
                auth: None,
            });
        }

        Ok((Engine::SemiHonest(ParticipantState::new(self_x, leaves, plan, own_triples)?), peer_inits))
    }

    #[allow(clippy::too_many_arguments)]
    async fn materialize_authenticated(
        &self,
        session_id: &str,
        xs: &[u8],
        k: usize,
        self_x: u8,
        self_share: Fp,
        self_mac: Option<Fp>,
        gate_count: usize,
        peers: &[PeerHandle],
        available_indices: &[u64],
    ) -> Result<(Engine, Vec<PeerInit>), CoordinatorError> {
        if !self.config.allow_dealer_fallback {
            return Err(CoordinatorError::SimulationModeRequired("trusted-dealer authenticated-triple generation"));
        }
        let self_mac = self_mac
            .ok_or_else(|| CoordinatorError::InvalidInput("this validator's signal share has no MAC provisioned for authenticated mode".into()))?;
        let own_alpha_share = self
            .config
            .alpha_share()?
            .ok_or_else(|| CoordinatorError::InvalidInput("MPC_NODE_ALPHA_SHARE not configured".into()))?;

        let mut alpha_shares = vec![Share::new(self_x, own_alpha_share)];
        for peer in peers {
            let resp: AlphaShareResponse = self
                .peer_client
                .post_json(
                    peer,
                    "/mpc/alpha_share",
                    &AlphaShareRequest {
                        session_id: session_id.to_string(),
                    },
                )
                .await?;
            alpha_shares.push(Share::new(peer.x, resp.alpha_share));
        }
        tracing::warn!("reconstructing SPDZ MAC key for trusted-dealer authenticated-triple generation");
        let alpha = spdz::reconstruct_alpha_for_simulation(&alpha_shares[..k], k, self.config.allow_simulation_mode)?;

        let mut rng = thread_rng();
        let r_secret = Fp::random_nonzero(&mut rng);
        let r_val_shares = shamir::split_at_points(r_secret, xs, k, &mut rng)?;
        let r_mac_shares = shamir::split_at_points(r_secret.mul(&alpha), xs, k, &mut rng)?;
        let triples: Vec<AuthenticatedBeaverTriple> = (0..gate_count)
            .map(|_| dealer_authenticated_triple(xs, k, alpha, &mut rng))
            .collect::<Result<_, CoordinatorError>>()?;

        let own_triples: Vec<AuthLocalTriple> = triples
            .iter()
            .map(|t| {
                Ok(AuthLocalTriple {
                    a: record_for(&t.a, self_x)?,
                    b: record_for(&t.b, self_x)?,
                    c: record_for(&t.c, self_x)?,
                })
            })
            .collect::<Result<_, CoordinatorError>>()?;

        let r_share_self = AuthenticatedShare {
            value: share_for(&r_val_shares, self_x)?,
            mac: share_for(&r_mac_shares, self_x)?,
        };
        let secret_share_self = AuthenticatedShare {
            value: self_share,
            mac: self_mac,
        };
        let leaves = auth_availability_leaves(secret_share_self, r_share_self, alpha, available_indices);
        let plan = beaver::build_gate_plan(leaves.len());

        let mut peer_inits = Vec::with_capacity(peers.len());
        for peer in peers {
            let auth_triple_shares = triples
                .iter()
                .map(|t| {
                    Ok(AuthTripleShareWire {
                        a: to_wire(record_for(&t.a, peer.x)?),
                        b: to_wire(record_for(&t.b, peer.x)?),
                        c: to_wire(record_for(&t.c, peer.x)?),
                    })
                })
                .collect::<Result<Vec<_>, CoordinatorError>>()?;
            let auth_r_share = AuthenticatedShareWire {
                y: share_for(&r_val_shares, peer.x)?,
                mac: share_for(&r_mac_shares, peer.x)?,
            };
            peer_inits.push(PeerInit {
                r_share_y: share_for(&r_val_shares, peer.x)?,
                triple_shares: triples
                    .iter()
                    .map(|t| {
                        Ok(TripleShareWire {
                            a: record_for(&t.a, peer.x)?.value,
                            b: record_for(&t.b, peer.x)?.value,
                            c: record_for(&t.c, peer.x)?.value,
                        })
                    })
                    .collect::<Result<Vec<_>, CoordinatorError>>()?,
                auth: Some(PeerAuthInit {
                    auth_triple_shares,
                    alpha_share: alpha_shares
                        .iter()
                        .find(|s| s.x == peer.x)
                        .map(|s| s.y)
                        .ok_or_else(|| CoordinatorError::InvalidInput("missing peer alpha share".into()))?,
                    auth_r_share,
                }),
            });
        }

        Ok((
            Engine::Authenticated(AuthenticatedParticipantState::new(self_x, own_alpha_share, leaves, plan, own_triples)?),
            peer_inits,
        ))
    }

    async fn generate_triples_via_network_ot(
        &self,
        session_id: &str,
        peer: &PeerHandle,
        xs: &[u8],
        k: usize,
        count: usize,
    ) -> Result<Vec<BeaverTripleShares>, CoordinatorError> {
        let group = dh_group_2048();
        let mut rng = thread_rng();
        let mut states: Vec<OtTripleGenState> = (0..count).map(|_| OtTripleGenState::initialize(group.clone(), &mut rng)).collect();
        let our_pks: Vec<String> = states.iter().map(|s| biguint_to_hex(&s.sender_public_key())).collect();

        let setup: OtSetupResponse = self
            .peer_client
            .post_json(
                peer,
                &format!("/mpc/ot/{session_id}/setup"),
                &OtSetupRequest {
                    session_id: session_id.to_string(),
                    count,
                },
            )
            .await?;
        let peer_pks = setup.sender_public_keys.iter().map(|h| biguint_from_hex(h)).collect::<Result<Vec<_>, _>>()?;
        if peer_pks.len() != count {
            return Err(CoordinatorError::InvalidInput("peer returned wrong OT triple count".into()));
        }

        let our_choices: Vec<Vec<num_bigint::BigUint>> = states
            .iter()
            .zip(&peer_pks)
            .map(|(s, pk)| s.generate_receiver_choices(pk))
            .collect();
        let our_choices_hex: Vec<Vec<String>> = our_choices.iter().map(|row| row.iter().map(biguint_to_hex).collect()).collect();

        let choices_resp: OtChoicesResponse = self
            .peer_client
            .post_json(
                peer,
                &format!("/mpc/ot/{session_id}/choices"),
                &OtChoicesRequest {
                    session_id: session_id.to_string(),
                    peer_sender_public_keys: our_pks,
                },
            )
            .await?;
        let peer_choices = choices_resp
            .choices
            .iter()
            .map(|row| row.iter().map(|h| biguint_from_hex(h)).collect::<Result<Vec<_>, _>>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut our_sender_shares = Vec::with_capacity(count);
        let mut our_pairs = Vec::with_capacity(count);
        for (state, choices) in states.iter().zip(&peer_choices) {
            let (pairs, share) = state.process_sender_choices(choices);
            our_pairs.push(pairs);
            our_sender_shares.push(share);
        }

        let transfers_resp: OtTransfersResponse = self
            .peer_client
            .post_json(
                peer,
                &format!("/mpc/ot/{session_id}/transfers"),
                &OtTransfersRequest {
                    session_id: session_id.to_string(),
                    peer_choices: our_choices_hex,
                },
            )
            .await?;
        if transfers_resp.pairs.len() != count {
            return Err(CoordinatorError::InvalidInput("peer returned wrong transfer pair count".into()));
        }

        for (i, state) in states.iter_mut().enumerate() {
            state.decrypt_and_accumulate(&peer_pks[i], &transfers_resp.pairs[i], our_sender_shares[i]);
        }

        let complete_resp: OtCompleteResponse = self
            .peer_client
            .post_json(
                peer,
                &format!("/mpc/ot/{session_id}/complete"),
                &OtCompleteRequest {
                    session_id: session_id.to_string(),
                    peer_pairs: our_pairs,
                },
            )
            .await?;
        if !complete_resp.ack {
            return Err(CoordinatorError::PeerPermanent {
                peer: peer.address.clone(),
                message: "peer did not acknowledge OT completion".into(),
            });
        }

        let shares_resp: OtSharesResponse = self.peer_client.post_json(peer, &format!("/mpc/ot/{session_id}/shares"), &()).await?;
        if shares_resp.additive_shares.len() != count {
            return Err(CoordinatorError::InvalidInput("peer returned wrong additive share count".into()));
        }

        let mut out = Vec::with_capacity(count);
        for (state, peer_share) in states.iter().zip(&shares_resp.additive_shares) {
            let (a0, b0, c0) = state.additive_shares();
            let a = triple_gen::additive_to_shamir(&[a0, peer_share.a], xs, k, &mut rng)?;
            let b = triple_gen::additive_to_shamir(&[b0, peer_share.b], xs, k, &mut rng)?;
            let c = triple_gen::additive_to_shamir(&[c0, peer_share.c], xs, k, &mut rng)?;
            out.push(BeaverTripleShares { a, b, c });
        }
        Ok(out)
    }

    /// Fans `requests` out to their peers concurrently and waits for
    /// replies, bounded overall by `config.gather_timeout` rather than by
    /// each individual peer call's own retry/backoff budget. A peer that
    /// errors or has not replied when the deadline passes is dropped from
    /// the returned responses; the `usize` is how many requests never came
    /// back in time, for the caller to compare against its own threshold.
    async fn gather<Req, Resp>(&self, path: &'static str, requests: Vec<(PeerHandle, Req)>) -> (Vec<(PeerHandle, Resp)>, usize)
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        let mut set = JoinSet::new();
        for (peer, request) in requests {
            let client = self.peer_client.clone();
            set.spawn(async move {
                let result = client.post_json::<Req, Resp>(&peer, path, &request).await;
                (peer, result)
            });
        }

        let deadline = TokioInstant::now() + self.config.gather_timeout;
        let mut responded = Vec::new();
        while !set.is_empty() {
            let remaining = deadline.saturating_duration_since(TokioInstant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, set.join_next()).await {
                Ok(Some(Ok((peer, Ok(resp))))) => responded.push((peer, resp)),
                Ok(Some(Ok((peer, Err(err))))) => tracing::warn!(peer = %peer.address, %err, path, "peer request failed"),
                Ok(Some(Err(join_err))) => tracing::error!(%join_err, path, "peer request task panicked"),
                Ok(None) => break,
                Err(_) => break,
            }
        }

        let missing = set.len();
        if missing > 0 {
            tracing::warn!(missing, path, timeout = ?self.config.gather_timeout, "gather timed out waiting on peers");
        }
        (responded, missing)
    }

    #[allow(clippy::too_many_arguments)]
    async fn broadcast_init(
        &self,
        session_id: &str,
        signal_id: Uuid,
        available_indices: &[u64],
        coordinator_x: u8,
        xs: &[u8],
        k: usize,
        mode: MPCMode,
        peers: &[PeerHandle],
        peer_inits: &[PeerInit],
    ) -> HashSet<u8> {
        let requests: Vec<(PeerHandle, InitRequest)> = peers
            .iter()
            .zip(peer_inits)
            .map(|(peer, init)| {
                let request = InitRequest {
                    session_id: session_id.to_string(),
                    signal_id,
                    available_indices: available_indices.to_vec(),
                    coordinator_x,
                    participant_xs: xs.to_vec(),
                    threshold: k,
                    mode,
                    r_share_y: init.r_share_y,
                    triple_shares: init.triple_shares.clone(),
                    auth: init.auth.as_ref().map(|a| AuthInitFields {
                        auth_triple_shares: a.auth_triple_shares.clone(),
                        alpha_share: a.alpha_share,
                        auth_r_share: a.auth_r_share,
                        // The coordinator never holds the plaintext of a peer's
                        // pre-existing secret share, so it cannot authenticate it;
                        // a peer with its own persistent mac_y ignores this field.
                        auth_secret_share: AuthenticatedShareWire { y: Fp::zero(), mac: Fp::zero() },
                    }),
                };
                (peer.clone(), request)
            })
            .collect();

        let (responses, _missing) = self.gather::<InitRequest, InitResponse>("/mpc/init", requests).await;
        let mut accepted = HashSet::new();
        for (peer, resp) in responses {
            if resp.accepted {
                accepted.insert(peer.x);
            } else {
                tracing::warn!(peer = %peer.address, message = %resp.message, "peer rejected init");
            }
        }
        accepted
    }

    /// Drives every gate to completion, reconstructing each gate's opened
    /// `(d, e)` from whichever participants answer within `gather_timeout`.
    /// A peer that misses one round's deadline is dropped for the rest of
    /// the session (its local engine has fallen out of step with
    /// `call_idx` and cannot safely rejoin); the session itself only
    /// aborts with [`CoordinatorError::Timeout`] if that leaves fewer than
    /// `k` contributors for the round.
    async fn drive_gates(&self, entry: &SessionEntry, peers: &[PeerHandle], gate_count: usize, k: usize) -> Result<AvailabilityOutcome, CoordinatorError> {
        let authenticated = matches!(entry.mode, MPCMode::Authenticated);
        let mut prev_opened: Option<(Fp, Fp)> = None;
        let mut final_shares: Vec<Share> = Vec::new();
        let mut pending_checks = 0usize;
        let mut live: Vec<PeerHandle> = peers.to_vec();

        for call_idx in 0..=gate_count {
            let own_x = entry.engine.lock().x();
            let (own_d, own_e, own_final) = {
                let mut engine = entry.engine.lock();
                match &mut *engine {
                    Engine::SemiHonest(state) => match state.compute_gate(call_idx, prev_opened)? {
                        GateOutput::Masked(m) => (Some(m.d), Some(m.e), None),
                        GateOutput::Final(z) => (None, None, Some(z)),
                    },
                    Engine::Authenticated(state) => match state.compute_gate(call_idx, prev_opened)? {
                        AuthGateOutput::Masked(m) => (Some(m.d), Some(m.e), None),
                        AuthGateOutput::Final(share) => (None, None, Some(share.value)),
                    },
                }
            };

            let request = ComputeGateRequest {
                session_id: entry.session_id.clone(),
                gate_idx: call_idx,
                prev_opened_d: prev_opened.map(|(d, _)| d),
                prev_opened_e: prev_opened.map(|(_, e)| e),
            };

            let requests: Vec<(PeerHandle, ComputeGateRequest)> = live.iter().map(|p| (p.clone(), request.clone())).collect();
            let (responses, missing) = self.gather::<ComputeGateRequest, ComputeGateResponse>("/mpc/compute_gate", requests).await;
            if 1 + responses.len() < k {
                return Err(CoordinatorError::Timeout { missing });
            }
            let responded_xs: HashSet<u8> = responses.iter().map(|(p, _)| p.x).collect();
            live.retain(|p| responded_xs.contains(&p.x));

            if call_idx < gate_count {
                let mut d_shares = vec![Share::new(own_x, own_d.expect("masked gate call"))];
                let mut e_shares = vec![Share::new(own_x, own_e.expect("masked gate call"))];
                for (peer, resp) in &responses {
                    d_shares.push(Share::new(peer.x, resp.d_value));
                    e_shares.push(Share::new(peer.x, resp.e_value));
                }
                let d = shamir::reconstruct(&d_shares[..k.min(d_shares.len())], k)?;
                let e = shamir::reconstruct(&e_shares[..k.min(e_shares.len())], k)?;
                prev_opened = Some((d, e));
                if authenticated {
                    pending_checks += 2;
                }
            } else {
                final_shares.push(Share::new(own_x, own_final.expect("final call")));
                for (peer, resp) in &responses {
                    final_shares.push(Share::new(peer.x, resp.d_value));
                }
            }
        }

        if authenticated {
            self.run_mac_check(entry, &live, pending_checks).await?;
        }

        let result = shamir::reconstruct(&final_shares[..k.min(final_shares.len())], k)?;
        Ok(AvailabilityOutcome { available: result.is_zero() })
    }

    /// Runs the commit-then-reveal batch MAC check against whichever of
    /// `peers` answer within `gather_timeout`, aborting with
    /// [`CoordinatorError::Timeout`] if too few do for the session's
    /// threshold to reconstruct from.
    async fn run_mac_check(&self, entry: &SessionEntry, peers: &[PeerHandle], pending_checks: usize) -> Result<(), CoordinatorError> {
        let mut rng = thread_rng();
        let coeffs: Vec<Fp> = (0..pending_checks).map(|_| Fp::random_nonzero(&mut rng)).collect();

        let (own_x, own_sigma) = {
            let engine = entry.engine.lock();
            match &*engine {
                Engine::Authenticated(state) => (state.x(), state.mac_check_contribution(&coeffs)?),
                Engine::SemiHonest(_) => unreachable!("mac check only runs in authenticated mode"),
            }
        };
        let nonce: [u8; 32] = rng.gen();
        let own_commitment = spdz::commit(own_sigma, nonce);

        let commit_requests: Vec<(PeerHandle, MacCheckCommitRequest)> = peers
            .iter()
            .map(|p| {
                (
                    p.clone(),
                    MacCheckCommitRequest {
                        session_id: entry.session_id.clone(),
                        coeffs: coeffs.clone(),
                    },
                )
            })
            .collect();
        let (commit_responses, missing) = self
            .gather::<MacCheckCommitRequest, MacCheckCommitResponse>("/mpc/mac_check/commit", commit_requests)
            .await;
        if 1 + commit_responses.len() < entry.threshold {
            return Err(CoordinatorError::Timeout { missing });
        }

        let mut commitments: std::collections::HashMap<u8, Commitment> = std::collections::HashMap::new();
        commitments.insert(own_x, own_commitment);
        let mut live_peers = Vec::with_capacity(commit_responses.len());
        for (peer, resp) in commit_responses {
            commitments.insert(peer.x, Commitment::from_bytes(bytes32_from_hex(&resp.commitment)?));
            live_peers.push(peer);
        }

        let reveal_requests: Vec<(PeerHandle, MacCheckRevealRequest)> = live_peers
            .iter()
            .map(|p| {
                (
                    p.clone(),
                    MacCheckRevealRequest {
                        session_id: entry.session_id.clone(),
                    },
                )
            })
            .collect();
        let (reveal_responses, missing) = self
            .gather::<MacCheckRevealRequest, MacCheckRevealResponse>("/mpc/mac_check/reveal", reveal_requests)
            .await;
        if 1 + reveal_responses.len() < entry.threshold {
            return Err(CoordinatorError::Timeout { missing });
        }

        let mut sigmas = vec![Share::new(own_x, own_sigma)];
        for (peer, resp) in reveal_responses {
            let peer_nonce = bytes32_from_hex(&resp.nonce)?;
            let commitment = commitments
                .get(&peer.x)
                .ok_or_else(|| CoordinatorError::InvalidInput(format!("peer x={} revealed a sigma without a prior commitment", peer.x)))?;
            if !spdz::verify_commitment(commitment, resp.sigma, peer_nonce) {
                return Err(CoordinatorError::MacFailure { gate_idx: 0 });
            }
            sigmas.push(Share::new(peer.x, resp.sigma));
        }

        {
            let mut engine = entry.engine.lock();
            if let Engine::Authenticated(state) = &mut *engine {
                state.clear_pending_checks();
            }
        }

        if spdz::mac_check_passes(&sigmas)? {
            Ok(())
        } else {
            Err(CoordinatorError::MacFailure { gate_idx: 0 })
        }
    }

    async fn broadcast_result(&self, session_id: &str, peers: &[PeerHandle], signal_id: Uuid, available: bool, xs: &[u8]) {
        let request = ResultRequest {
            session_id: session_id.to_string(),
            signal_id,
            available,
            participating_validators: xs.to_vec(),
        };
        for peer in peers {
            if let Err(err) = self.peer_client.post_json::<_, ResultRequest>(peer, "/mpc/result", &request).await {
                tracing::warn!(peer = %peer.address, %err, "result broadcast failed");
            }
        }
    }

    async fn broadcast_abort(&self, session_id: &str, peers: &[PeerHandle], reason: AbortReason, gate_idx: usize, offending_validator_x: Option<u8>) {
        let request = AbortRequest {
            session_id: session_id.to_string(),
            reason,
            gate_idx,
            offending_validator_x,
        };
        for peer in peers {
            let _ = self.peer_client.post_json::<_, serde_json::Value>(peer, "/mpc/abort", &request).await;
        }
    }
}

pub(crate) fn to_wire(share: AuthenticatedShare) -> AuthenticatedShareWire {
    AuthenticatedShareWire { y: share.value, mac: share.mac }
}

/// Inverse of [`to_wire`], for a peer reading its own authenticated shares
/// back off an `/mpc/init` payload.
pub(crate) fn from_wire(wire: AuthenticatedShareWire) -> AuthenticatedShare {
    AuthenticatedShare { value: wire.y, mac: wire.mac }
}

/// The authenticated-mode equivalent of `beaver::availability_leaves`:
/// `r` followed by one `s - a_i` per available index, each carrying its
/// MAC derived affinely from `mac(s)` since subtracting a public constant
/// `a_i` is linear: `mac(s - a_i) = mac(s) - a_i * alpha`.
pub(crate) fn auth_availability_leaves(secret_share: AuthenticatedShare, r_share: AuthenticatedShare, alpha: Fp, available_indices: &[u64]) -> Vec<AuthenticatedShare> {
    let mut leaves = Vec::with_capacity(1 + available_indices.len());
    leaves.push(r_share);
    leaves.extend(available_indices.iter().map(|&a| {
        let a_fp = Fp::from_u64(a);
        AuthenticatedShare {
            value: secret_share.value.sub(&a_fp),
            mac: secret_share.mac.sub(&a_fp.mul(&alpha)),
        }
    }));
    leaves
}

fn dealer_authenticated_triple(xs: &[u8], k: usize, alpha: Fp, rng: &mut ThreadRng) -> Result<AuthenticatedBeaverTriple, CoordinatorError> {
    let a = Fp::random(rng);
    let b = Fp::random(rng);
    let c = a.mul(&b);
    let a_val = shamir::split_at_points(a, xs, k, rng)?;
    let b_val = shamir::split_at_points(b, xs, k, rng)?;
    let c_val = shamir::split_at_points(c, xs, k, rng)?;
    let a_mac = shamir::split_at_points(a.mul(&alpha), xs, k, rng)?;
    let b_mac = shamir::split_at_points(b.mul(&alpha), xs, k, rng)?;
    let c_mac = shamir::split_at_points(c.mul(&alpha), xs, k, rng)?;
    let zip = |values: Vec<Share>, macs: Vec<Share>| -> Vec<AuthenticatedRecord> {
        values
            .into_iter()
            .zip(macs)
            .map(|(v, m)| AuthenticatedRecord {
                x: v.x,
                share: AuthenticatedShare { value: v.y, mac: m.y },
            })
            .collect()
    };
    Ok(AuthenticatedBeaverTriple {
        a: zip(a_val, a_mac),
        b: zip(b_val, b_mac),
        c: zip(c_val, c_mac),
    })
}
