//! Internal services backing the peer-facing API: session tracking, share
//! storage, peer discovery, and the outbound peer HTTP client.

pub mod cleanup;
pub mod coordinator;
pub mod ot_store;
pub mod peer_client;
pub mod peer_registry;
pub mod session_registry;
pub mod share_store;
