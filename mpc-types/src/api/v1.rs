//! # v1 API types
//!
//! Data transfer objects for the version 1 coordinator/peer protocol: the
//! five `/mpc/*` lifecycle endpoints, the `/signal/{id}/share_info` lookup,
//! and the `/mpc/ot/*` sub-protocol used only while two-party distributed
//! triple generation is active.
//!
//! All integers are plain JSON numbers; field elements and other byte
//! strings are hex via [`mpc_core::Fp`]'s own (de)serialization or plain
//! hex `String`s for raw DH group elements (which live outside `Fp`).

use mpc_core::Fp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::MPCMode;

/// One participant's Shamir share of a Beaver triple's three components.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TripleShareWire {
    /// Share of `a`.
    pub a: Fp,
    /// Share of `b`.
    pub b: Fp,
    /// Share of `c = a * b`.
    pub c: Fp,
}

/// A value's Shamir share paired with a share of `value * alpha`, for the
/// authenticated protocol variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthenticatedShareWire {
    /// The value share.
    pub y: Fp,
    /// The MAC share.
    pub mac: Fp,
}

/// One participant's authenticated Beaver triple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthTripleShareWire {
    /// Authenticated share of `a`.
    pub a: AuthenticatedShareWire,
    /// Authenticated share of `b`.
    pub b: AuthenticatedShareWire,
    /// Authenticated share of `c = a * b`.
    pub c: AuthenticatedShareWire,
}

/// The additional fields carried by `/mpc/init` only when `mode ==
/// Authenticated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInitFields {
    /// This participant's authenticated triple shares, one per gate.
    pub auth_triple_shares: Vec<AuthTripleShareWire>,
    /// This participant's share of the session's global MAC key.
    pub alpha_share: Fp,
    /// This participant's authenticated share of the random mask `r`.
    pub auth_r_share: AuthenticatedShareWire,
    /// This participant's authenticated share of the secret index `s`, as
    /// computed by the coordinator. A receiving peer that was itself
    /// provisioned with a persistent MAC for its own secret share (the
    /// common case - see the service crate's share store) ignores this
    /// field and uses its own instead, since the coordinator cannot
    /// authenticate a share it never held the plaintext of; it is only
    /// meaningful for a peer with no persistent MAC of its own.
    pub auth_secret_share: AuthenticatedShareWire,
}

/// `POST /mpc/init` request: the coordinator's broadcast opening a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitRequest {
    /// Opaque session identifier, `^[A-Za-z0-9_-]{1,256}$`.
    pub session_id: String,
    /// The identifier of the signal being queried.
    pub signal_id: Uuid,
    /// The buyer-supplied set of indices to test membership against, a
    /// subset of `[1, 10]`.
    pub available_indices: Vec<u64>,
    /// The coordinator's own Shamir x-coordinate.
    pub coordinator_x: u8,
    /// Every participant's x-coordinate, coordinator included.
    pub participant_xs: Vec<u8>,
    /// Reconstruction threshold `k`.
    pub threshold: usize,
    /// Which gate variant this session runs.
    pub mode: MPCMode,
    /// This participant's share of the random mask `r`.
    pub r_share_y: Fp,
    /// This participant's triple shares, one per gate in the plan.
    pub triple_shares: Vec<TripleShareWire>,
    /// Present iff `mode == Authenticated`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auth: Option<AuthInitFields>,
}

/// `POST /mpc/init` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitResponse {
    /// Echoes the request's session identifier.
    pub session_id: String,
    /// Whether this peer accepted the session.
    pub accepted: bool,
    /// A human-readable reason, set on rejection.
    pub message: String,
}

/// `POST /mpc/compute_gate` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeGateRequest {
    /// The session this gate belongs to.
    pub session_id: String,
    /// The gate index being driven, or the sentinel value (the gate count)
    /// to request the final output share.
    pub gate_idx: usize,
    /// The previous gate's opened `d`, absent only for gate 0.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prev_opened_d: Option<Fp>,
    /// The previous gate's opened `e`, absent only for gate 0.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prev_opened_e: Option<Fp>,
}

/// `POST /mpc/compute_gate` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeGateResponse {
    /// Echoes the request's session identifier.
    pub session_id: String,
    /// Echoes the request's gate index.
    pub gate_idx: usize,
    /// This participant's masked `d` share (or, at the sentinel gate index,
    /// its final output share).
    pub d_value: Fp,
    /// This participant's masked `e` share (unused at the sentinel gate
    /// index, set to zero).
    pub e_value: Fp,
    /// The MAC share of `d_value`, present only in authenticated mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub d_mac: Option<Fp>,
    /// The MAC share of `e_value`, present only in authenticated mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub e_mac: Option<Fp>,
}

/// `POST /mpc/result` request: the coordinator's broadcast closing a
/// session out. Peers clear per-session state on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRequest {
    /// The session being closed.
    pub session_id: String,
    /// The identifier of the signal that was queried.
    pub signal_id: Uuid,
    /// The reconstructed availability bit.
    pub available: bool,
    /// The x-coordinates of every validator that contributed to the result.
    pub participating_validators: Vec<u8>,
}

/// Why a session was aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// A SPDZ MAC check failed at the given gate.
    MacFailure,
    /// Fewer than the threshold number of participants accepted `/mpc/init`.
    InsufficientParticipants,
    /// A peer was unresponsive past `GATHER_TIMEOUT`.
    PeerTimeout,
    /// Any other reason, with a human-readable explanation.
    Other {
        /// The explanation.
        message: String,
    },
}

/// `POST /mpc/abort` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortRequest {
    /// The session being aborted.
    pub session_id: String,
    /// Why the session is being aborted.
    pub reason: AbortReason,
    /// The gate index active when the abort was triggered.
    pub gate_idx: usize,
    /// The x-coordinate of the validator suspected of cheating, if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub offending_validator_x: Option<u8>,
}

/// `GET /mpc/{session_id}/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// The session's current lifecycle status.
    pub status: crate::session::SessionStatus,
    /// How many participants have responded to the current round so far.
    pub participants_responded: usize,
    /// The total number of participants in this session.
    pub total_participants: usize,
    /// The reconstructed availability bit, once `status == Complete`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub available: Option<bool>,
}

/// `POST /mpc/mac_check/commit` request: the coordinator's broadcast of the
/// random linear-combination coefficients for this session's batch MAC
/// check, once every gate has been opened. Coefficients are a deterministic
/// function of the already-opened `d`/`e` values, so every participant can
/// verify them independently rather than trusting the coordinator's choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacCheckCommitRequest {
    /// The session being checked.
    pub session_id: String,
    /// The random coefficients, one per queued `(d, e)` opening.
    pub coeffs: Vec<Fp>,
}

/// `POST /mpc/mac_check/commit` response: this participant's hash
/// commitment to its MAC-check contribution, hex-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacCheckCommitResponse {
    /// Echoes the request's session identifier.
    pub session_id: String,
    /// The 32-byte commitment, hex-encoded.
    pub commitment: String,
}

/// `POST /mpc/mac_check/reveal` request: the coordinator signals that every
/// participant's commitment has been collected and reveals may proceed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacCheckRevealRequest {
    /// The session being checked.
    pub session_id: String,
}

/// `POST /mpc/mac_check/reveal` response: this participant's revealed MAC-
/// check contribution and the nonce used to commit to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacCheckRevealResponse {
    /// Echoes the request's session identifier.
    pub session_id: String,
    /// The revealed MAC-check contribution share.
    pub sigma: Fp,
    /// The 32-byte nonce used in the prior commitment, hex-encoded.
    pub nonce: String,
}

/// `POST /mpc/alpha_share` request: the coordinator's request for a peer's
/// persistent share of the deployment-wide SPDZ MAC key, needed only by the
/// trusted-dealer authenticated-triple fallback (which must reconstruct the
/// full key to mint fresh triple MACs, gated the same way
/// `mpc_core::spdz::reconstruct_alpha_for_simulation` gates any other
/// reconstruction of `alpha`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaShareRequest {
    /// The session this request is being made for, for logging/audit only.
    pub session_id: String,
}

/// `POST /mpc/alpha_share` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaShareResponse {
    /// Echoes the request's session identifier.
    pub session_id: String,
    /// This peer's persistent share of the MAC key.
    pub alpha_share: Fp,
}

/// `GET /signal/{id}/share_info` response: lets a peer learn which
/// x-coordinate another validator holds for a given signal. `share_y` is
/// omitted in production for confidentiality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInfoResponse {
    /// The signal this share belongs to.
    pub signal_id: Uuid,
    /// The responding validator's Shamir x-coordinate.
    pub share_x: u8,
    /// The responding validator's share value, present only when the
    /// service is configured to disclose it (dev/test only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub share_y: Option<Fp>,
}

/// `POST /mpc/ot/setup` request: how many triples this OT run will
/// generate. Sent ahead of session creation itself - the peer has no
/// `SessionEntry` yet at this point, only an [`crate::api::v1::OtSetupResponse`]-producing
/// state keyed by `session_id` in the OT store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtSetupRequest {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// The number of triples to generate, one [`OtTripleGenState`] each.
    ///
    /// [`OtTripleGenState`]: mpc_core::triple_gen::OtTripleGenState
    pub count: usize,
}

/// `POST /mpc/ot/setup` response: each party's per-triple DH sender public
/// key, hex-encoded (these are `DhGroup` elements, not [`Fp`] values, so
/// they do not fit `Fp`'s modular encoding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtSetupResponse {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// One DH public key per triple being generated.
    pub sender_public_keys: Vec<String>,
}

/// `POST /mpc/ot/choices` request: the peer's published sender public keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtChoicesRequest {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// The peer's per-triple sender public keys.
    pub peer_sender_public_keys: Vec<String>,
}

/// `POST /mpc/ot/choices` response: this party's per-bit choice
/// commitments for every triple being generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtChoicesResponse {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// One set of per-bit choice commitments per triple.
    pub choices: Vec<Vec<String>>,
}

/// `POST /mpc/ot/transfers` request: the peer's choice commitments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtTransfersRequest {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// The peer's per-triple choice commitments.
    pub peer_choices: Vec<Vec<String>>,
}

/// `POST /mpc/ot/transfers` response: this party's encrypted transfer
/// pairs, one `(E0, E1)` per bit per triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtTransfersResponse {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// One set of encrypted transfer pairs per triple.
    pub pairs: Vec<Vec<(Fp, Fp)>>,
}

/// `POST /mpc/ot/complete` request: the peer's encrypted transfer pairs,
/// completing this party's side of the OT exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtCompleteRequest {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// The peer's per-triple encrypted transfer pairs.
    pub peer_pairs: Vec<Vec<(Fp, Fp)>>,
}

/// `POST /mpc/ot/complete` response: acknowledges receipt; the actual
/// additive shares are fetched separately via `/mpc/ot/shares` once both
/// sides have completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtCompleteResponse {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// Always `true` on success; the endpoint otherwise returns an error.
    pub ack: bool,
}

/// One party's additive shares of a single Beaver triple's three
/// components, before being combined into Shamir shares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdditiveTripleShare {
    /// Additive share of `a`.
    pub a: Fp,
    /// Additive share of `b`.
    pub b: Fp,
    /// Additive share of `c = a * b`.
    pub c: Fp,
}

/// `POST /mpc/ot/shares` response: this party's final additive shares for
/// every triple, fetched once OT has completed so the coordinator can run
/// `additive_to_shamir` over both parties' contributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtSharesResponse {
    /// The session this OT run belongs to.
    pub session_id: String,
    /// One additive share set per triple.
    pub additive_shares: Vec<AdditiveTripleShare>,
}
