//! Field arithmetic, Shamir secret sharing, and the OT-based Beaver-triple
//! multiplication protocol underlying the signal-availability MPC gate.
//!
//! This crate has no network awareness: every `*_local` function runs a
//! full protocol round-trip in one process for simulation and testing, and
//! every stateful `*State` type exposes the individual steps a networked
//! coordinator drives between HTTP calls. Wire formats and session
//! orchestration live in `mpc-types` and `mpc-service`.

pub mod beaver;
pub mod dh;
pub mod error;
pub mod field;
pub mod gilboa;
pub mod shamir;
pub mod spdz;
pub mod triple_gen;

pub use error::{CoreError, Result};
pub use field::Fp;
pub use shamir::Share;
