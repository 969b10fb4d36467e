//! The full peer-facing and externally-facing HTTP surface: the `/mpc/*`
//! session lifecycle, the `/mpc/ot/*` two-party OT sub-protocol, and
//! `/signal/{id}/share_info`.

pub(crate) mod mpc;
pub(crate) mod ot;
pub(crate) mod share;

use axum::Router;

use crate::AppState;

/// Merges every API submodule's routes into one router.
pub(crate) fn routes() -> Router<AppState> {
    Router::new().merge(mpc::routes()).merge(ot::routes()).merge(share::routes())
}
