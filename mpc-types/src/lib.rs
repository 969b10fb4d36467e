#![deny(missing_docs)]
//! Wire types exchanged between the MPC coordinator and peer nodes while
//! running the signal-availability protocol.
//!
//! This crate has no protocol logic of its own - it only defines the JSON
//! payloads described in this project's external interface surface, plus
//! the session-lifecycle enums shared by every endpoint. Field elements use
//! [`mpc_core::Fp`]'s own hex (de)serialization, so every numeric wire value
//! is either a plain integer, a hex string, or one of these payload structs.
//!
//! Types are grouped the same way the protocol groups them: [`session`] for
//! lifecycle-wide enums, [`api::v1`] for the versioned request/response
//! payloads of each endpoint.

pub mod api;
pub mod session;

pub use session::{MPCMode, MPCResult, SessionStatus};
