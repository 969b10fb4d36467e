use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use mpc_service::config::{Environment, MpcNodeConfig};
use mpc_service::{InMemoryShareStore, MpcServiceBuilder, StaticPeerRegistry};
use mpc_types::api::v1::{
    AbortRequest, AlphaShareRequest, AlphaShareResponse, ComputeGateRequest, ComputeGateResponse, InitRequest, InitResponse,
    MacCheckCommitRequest, MacCheckCommitResponse, MacCheckRevealRequest, MacCheckRevealResponse, OtChoicesRequest, OtChoicesResponse,
    OtCompleteRequest, OtCompleteResponse, OtSetupRequest, OtSetupResponse, OtSharesResponse, OtTransfersRequest, OtTransfersResponse,
    ResultRequest, ShareInfoResponse, StatusResponse,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A single in-process node, reachable only via its [`TestServer`] - no real
/// socket is bound, so this sidesteps `validate_peer_address`'s https/
/// non-local requirement entirely. Coordination across several `TestNode`s
/// is driven by the test itself, playing the role a real coordinator would.
pub struct TestNode {
    pub x: u8,
    pub server: TestServer,
    cleanup: JoinHandle<()>,
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.cleanup.abort();
    }
}

pub fn test_config(self_x: u8, threshold: usize, environment: Environment, alpha_share_hex: Option<String>) -> MpcNodeConfig {
    MpcNodeConfig {
        environment,
        self_x,
        threshold,
        use_authenticated_mpc: alpha_share_hex.is_some(),
        use_network_ot: true,
        allow_simulation_mode: true,
        allow_dealer_fallback: true,
        peer_timeout: Duration::from_secs(2),
        peer_retries: 1,
        gather_timeout: Duration::from_secs(4),
        session_ttl: Duration::from_secs(60),
        cleanup_interval: Duration::from_secs(300),
        circuit_breaker_threshold: 5,
        circuit_breaker_recovery_timeout: Duration::from_secs(30),
        ot_bits: 256,
        alpha_share_hex,
    }
}

impl TestNode {
    pub fn start(config: MpcNodeConfig, share_store: Arc<InMemoryShareStore>) -> eyre::Result<Self> {
        let x = config.self_x;
        let peer_registry = Arc::new(StaticPeerRegistry::new(vec![])?);
        let (router, cleanup) = MpcServiceBuilder::new(config, peer_registry, share_store).build()?;
        let server = TestServer::builder().http_transport().build(router)?;
        Ok(Self { x, server, cleanup })
    }

    pub async fn init(&self, req: &InitRequest) -> InitResponse {
        self.server.post("/mpc/init").json(req).await.json::<InitResponse>()
    }

    pub async fn compute_gate(&self, req: &ComputeGateRequest) -> ComputeGateResponse {
        self.server.post("/mpc/compute_gate").json(req).await.json::<ComputeGateResponse>()
    }

    pub async fn result(&self, req: &ResultRequest) {
        self.server.post("/mpc/result").json(req).await.assert_status_ok();
    }

    pub async fn abort(&self, req: &AbortRequest) {
        self.server.post("/mpc/abort").json(req).await.assert_status_ok();
    }

    pub async fn mac_check_commit(&self, req: &MacCheckCommitRequest) -> MacCheckCommitResponse {
        self.server.post("/mpc/mac_check/commit").json(req).await.json::<MacCheckCommitResponse>()
    }

    pub async fn mac_check_reveal(&self, req: &MacCheckRevealRequest) -> MacCheckRevealResponse {
        self.server.post("/mpc/mac_check/reveal").json(req).await.json::<MacCheckRevealResponse>()
    }

    pub async fn alpha_share(&self, req: &AlphaShareRequest) -> AlphaShareResponse {
        self.server.post("/mpc/alpha_share").json(req).await.json::<AlphaShareResponse>()
    }

    pub async fn status(&self, session_id: &str) -> StatusResponse {
        self.server.get(&format!("/mpc/{session_id}/status")).await.json::<StatusResponse>()
    }

    pub async fn share_info(&self, signal_id: Uuid) -> ShareInfoResponse {
        self.server.get(&format!("/signal/{signal_id}/share_info")).await.json::<ShareInfoResponse>()
    }

    pub async fn ot_setup(&self, req: &OtSetupRequest) -> OtSetupResponse {
        self.server.post(&format!("/mpc/ot/{}/setup", req.session_id)).json(req).await.json::<OtSetupResponse>()
    }

    pub async fn ot_choices(&self, req: &OtChoicesRequest) -> OtChoicesResponse {
        self.server.post(&format!("/mpc/ot/{}/choices", req.session_id)).json(req).await.json::<OtChoicesResponse>()
    }

    pub async fn ot_transfers(&self, req: &OtTransfersRequest) -> OtTransfersResponse {
        self.server.post(&format!("/mpc/ot/{}/transfers", req.session_id)).json(req).await.json::<OtTransfersResponse>()
    }

    pub async fn ot_complete(&self, req: &OtCompleteRequest) -> OtCompleteResponse {
        self.server.post(&format!("/mpc/ot/{}/complete", req.session_id)).json(req).await.json::<OtCompleteResponse>()
    }

    pub async fn ot_shares(&self, session_id: &str) -> OtSharesResponse {
        self.server.post(&format!("/mpc/ot/{session_id}/shares")).await.json::<OtSharesResponse>()
    }
}
