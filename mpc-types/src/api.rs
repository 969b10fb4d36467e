//! # API module
//!
//! Entry point for all API version modules.
//!
//! Currently exposes the version 1 coordinator/peer protocol types under
//! [`v1`].

use http::HeaderName;

pub mod v1;

/// The name of the mpc-protocol-version header, sent on every peer request
/// so a version mismatch is a clean 4xx rather than a parse failure deep in
/// a handler.
pub static MPC_PROTOCOL_VERSION_HEADER: HeaderName = HeaderName::from_static("x-mpc-protocol-version");
