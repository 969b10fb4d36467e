use std::sync::Arc;

use mpc_core::beaver::build_gate_plan;
use mpc_core::dh::dh_group_test;
use mpc_core::field::Fp;
use mpc_core::shamir::{self, Share};
use mpc_core::spdz::{self, generate_authenticated_triples_local};
use mpc_core::triple_gen::{generate_dealer_triple, generate_two_party_triples_local, additive_to_shamir, BeaverTripleShares};
use mpc_service::config::Environment;
use mpc_service::InMemoryShareStore;
use mpc_types::api::v1::{
    AbortReason, AbortRequest, AlphaShareRequest, AuthInitFields, AuthTripleShareWire, AuthenticatedShareWire, ComputeGateRequest,
    InitRequest, MacCheckCommitRequest, MacCheckRevealRequest, OtChoicesRequest, OtCompleteRequest, OtSetupRequest, OtTransfersRequest,
    ResultRequest, TripleShareWire,
};
use mpc_types::{MPCMode, SessionStatus};
use rand::thread_rng;
use uuid::Uuid;

mod setup;
use setup::{test_config, TestNode};

/// Drives `nodes` through a full semi-honest session and returns the
/// reconstructed availability bit, exercising the same `/mpc/init` ->
/// `/mpc/compute_gate`* -> `/mpc/result` sequence a real coordinator would.
async fn run_semi_honest_session(
    nodes: &[TestNode],
    session_id: &str,
    signal_id: Uuid,
    available_indices: Vec<u64>,
    threshold: usize,
    r: Fp,
    triples: &[BeaverTripleShares],
) -> bool {
    let xs: Vec<u8> = nodes.iter().map(|n| n.x).collect();
    let r_shares = shamir::split_at_points(r, &xs, threshold, &mut thread_rng()).unwrap();

    for (i, node) in nodes.iter().enumerate() {
        let triple_shares: Vec<TripleShareWire> = triples
            .iter()
            .map(|t| TripleShareWire { a: t.a[i].y, b: t.b[i].y, c: t.c[i].y })
            .collect();
        let req = InitRequest {
            session_id: session_id.to_string(),
            signal_id,
            available_indices: available_indices.clone(),
            coordinator_x: xs[0],
            participant_xs: xs.clone(),
            threshold,
            mode: MPCMode::SemiHonest,
            r_share_y: r_shares[i].y,
            triple_shares,
            auth: None,
        };
        let resp = node.init(&req).await;
        assert!(resp.accepted, "node {} rejected init: {}", node.x, resp.message);
    }

    let plan = build_gate_plan(1 + available_indices.len());
    let final_call = plan.len();
    let mut prev_opened = None;
    let mut final_shares = Vec::new();
    for call_idx in 0..=final_call {
        let mut masked = Vec::with_capacity(nodes.len());
        for node in nodes {
            let req = ComputeGateRequest {
                session_id: session_id.to_string(),
                gate_idx: call_idx,
                prev_opened_d: prev_opened.map(|(d, _)| d),
                prev_opened_e: prev_opened.map(|(_, e)| e),
            };
            let resp = node.compute_gate(&req).await;
            if call_idx == final_call {
                final_shares.push(Share::new(node.x, resp.d_value));
            } else {
                masked.push((Share::new(node.x, resp.d_value), Share::new(node.x, resp.e_value)));
            }
        }
        if call_idx < final_call {
            let d_shares: Vec<Share> = masked.iter().map(|(d, _)| *d).collect();
            let e_shares: Vec<Share> = masked.iter().map(|(_, e)| *e).collect();
            let d = shamir::reconstruct(&d_shares[..threshold], threshold).unwrap();
            let e = shamir::reconstruct(&e_shares[..threshold], threshold).unwrap();
            prev_opened = Some((d, e));
        }
    }

    let result = shamir::reconstruct(&final_shares[..threshold], threshold).unwrap();
    let available = result.is_zero();

    for node in nodes {
        node.result(&ResultRequest {
            session_id: session_id.to_string(),
            signal_id,
            available,
            participating_validators: xs.clone(),
        })
        .await;
    }
    available
}

fn provision_semi_honest_share(store: &InMemoryShareStore, signal_id: Uuid, x: u8, secret: Fp, xs: &[u8], k: usize) {
    let shares = shamir::split_at_points(secret, xs, k, &mut thread_rng()).unwrap();
    let share = shares.iter().find(|s| s.x == x).unwrap();
    store.provision(signal_id, x, share.y, None, Arc::from(b"demo payload".as_slice()));
}

#[tokio::test]
async fn semi_honest_session_finds_membership() {
    let xs = [1u8, 2, 3];
    let k = 2;
    let secret = Fp::from_u64(7);
    let signal_id = Uuid::new_v4();

    let mut nodes = Vec::new();
    for &x in &xs {
        let store = Arc::new(InMemoryShareStore::default());
        provision_semi_honest_share(&store, signal_id, x, secret, &xs, k);
        let config = test_config(x, k, Environment::Dev, None);
        nodes.push(TestNode::start(config, store).unwrap());
    }

    // 3 participants, 1 available index -> 1 leaf pair -> 1 gate.
    let triples = vec![generate_dealer_triple(&xs, k, true, &mut thread_rng()).unwrap()];
    let r = Fp::random(&mut thread_rng());
    let available = run_semi_honest_session(&nodes, "session-member", signal_id, vec![7], k, r, &triples).await;
    assert!(available, "secret index 7 is in the queried set, should be available");
}

#[tokio::test]
async fn semi_honest_session_rejects_non_membership() {
    let xs = [1u8, 2, 3];
    let k = 2;
    let secret = Fp::from_u64(7);
    let signal_id = Uuid::new_v4();

    let mut nodes = Vec::new();
    for &x in &xs {
        let store = Arc::new(InMemoryShareStore::default());
        provision_semi_honest_share(&store, signal_id, x, secret, &xs, k);
        let config = test_config(x, k, Environment::Dev, None);
        nodes.push(TestNode::start(config, store).unwrap());
    }

    let triples = vec![generate_dealer_triple(&xs, k, true, &mut thread_rng()).unwrap()];
    let r = Fp::random(&mut thread_rng());
    let available = run_semi_honest_session(&nodes, "session-non-member", signal_id, vec![3], k, r, &triples).await;
    assert!(!available, "secret index 7 is not in the queried set {{3}}, should be unavailable");
}

#[tokio::test]
async fn authenticated_session_passes_mac_check_and_reconstructs() {
    let xs = [1u8, 2, 3];
    let k = 2;
    let secret = Fp::from_u64(4);
    let signal_id = Uuid::new_v4();
    let mut rng = thread_rng();

    let alpha0 = Fp::random(&mut rng);
    let alpha1 = Fp::random(&mut rng);
    let alpha = alpha0.add(&alpha1);
    let alpha_shares = shamir::split_at_points(alpha, &xs, k, &mut rng).unwrap();

    let value_shares = shamir::split_at_points(secret, &xs, k, &mut rng).unwrap();
    let mac_shares = shamir::split_at_points(secret.mul(&alpha), &xs, k, &mut rng).unwrap();

    let r = Fp::random(&mut rng);
    let r_value_shares = shamir::split_at_points(r, &xs, k, &mut rng).unwrap();
    let r_mac_shares = shamir::split_at_points(r.mul(&alpha), &xs, k, &mut rng).unwrap();

    let available_indices = vec![4u64];
    let gate_count = build_gate_plan(1 + available_indices.len()).len();
    let group = dh_group_test();
    let triples = generate_authenticated_triples_local(gate_count, &xs, k, &group, alpha0, alpha1, &mut rng).unwrap();

    let mut nodes = Vec::new();
    for (i, &x) in xs.iter().enumerate() {
        let store = Arc::new(InMemoryShareStore::default());
        store.provision(signal_id, x, value_shares[i].y, Some(mac_shares[i].y), Arc::from(b"demo payload".as_slice()));
        let config = test_config(x, k, Environment::Dev, Some(alpha_shares[i].y.to_hex()));
        nodes.push(TestNode::start(config, store).unwrap());
    }

    for (i, node) in nodes.iter().enumerate() {
        let auth_triple_shares: Vec<AuthTripleShareWire> = triples
            .iter()
            .map(|t| AuthTripleShareWire {
                a: AuthenticatedShareWire { y: t.a[i].share.value, mac: t.a[i].share.mac },
                b: AuthenticatedShareWire { y: t.b[i].share.value, mac: t.b[i].share.mac },
                c: AuthenticatedShareWire { y: t.c[i].share.value, mac: t.c[i].share.mac },
            })
            .collect();
        let req = InitRequest {
            session_id: "session-auth".to_string(),
            signal_id,
            available_indices: available_indices.clone(),
            coordinator_x: xs[0],
            participant_xs: xs.to_vec(),
            threshold: k,
            mode: MPCMode::Authenticated,
            r_share_y: r_value_shares[i].y,
            triple_shares: vec![],
            auth: Some(AuthInitFields {
                auth_triple_shares,
                alpha_share: Fp::zero(),
                auth_r_share: AuthenticatedShareWire { y: r_value_shares[i].y, mac: r_mac_shares[i].y },
                auth_secret_share: AuthenticatedShareWire { y: Fp::zero(), mac: Fp::zero() },
            }),
        };
        let resp = node.init(&req).await;
        assert!(resp.accepted, "node {x} rejected authenticated init: {}", resp.message, x = node.x);
    }

    let plan_len = gate_count;
    let mut prev_opened = None;
    let mut final_value_shares = Vec::new();
    for call_idx in 0..=plan_len {
        let mut masked = Vec::new();
        for node in &nodes {
            let req = ComputeGateRequest {
                session_id: "session-auth".to_string(),
                gate_idx: call_idx,
                prev_opened_d: prev_opened.map(|(d, _)| d),
                prev_opened_e: prev_opened.map(|(_, e)| e),
            };
            let resp = node.compute_gate(&req).await;
            if call_idx == plan_len {
                final_value_shares.push(Share::new(node.x, resp.d_value));
            } else {
                masked.push((Share::new(node.x, resp.d_value), Share::new(node.x, resp.e_value)));
            }
        }
        if call_idx < plan_len {
            let d_shares: Vec<Share> = masked.iter().map(|(d, _)| *d).collect();
            let e_shares: Vec<Share> = masked.iter().map(|(_, e)| *e).collect();
            let d = shamir::reconstruct(&d_shares[..k], k).unwrap();
            let e = shamir::reconstruct(&e_shares[..k], k).unwrap();
            prev_opened = Some((d, e));
        }
    }

    let result = shamir::reconstruct(&final_value_shares[..k], k).unwrap();
    assert!(result.is_zero(), "secret 4 is in the queried set {{4}}, should be available");

    // Batch MAC check over every opened (d, e) pair this session produced.
    let coeffs: Vec<Fp> = (0..2 * plan_len as u64).map(Fp::from_u64).collect();
    let mut commitments = Vec::new();
    for node in &nodes {
        let resp = node
            .mac_check_commit(&MacCheckCommitRequest { session_id: "session-auth".to_string(), coeffs: coeffs.clone() })
            .await;
        commitments.push(resp.commitment);
    }
    let mut sigma_shares = Vec::new();
    for (node, commitment_hex) in nodes.iter().zip(&commitments) {
        let resp = node.mac_check_reveal(&MacCheckRevealRequest { session_id: "session-auth".to_string() }).await;
        let commitment = spdz::Commitment::from_bytes(mpc_service::util::bytes32_from_hex(commitment_hex).unwrap());
        let nonce = mpc_service::util::bytes32_from_hex(&resp.nonce).unwrap();
        assert!(
            spdz::verify_commitment(&commitment, resp.sigma, nonce),
            "revealed sigma must match this node's earlier commitment"
        );
        sigma_shares.push(resp.sigma);
    }
    assert!(spdz::mac_check_passes(&sigma_shares), "honest authenticated session must pass its batch MAC check");

    for node in &nodes {
        node.result(&ResultRequest {
            session_id: "session-auth".to_string(),
            signal_id,
            available: true,
            participating_validators: xs.to_vec(),
        })
        .await;
    }
}

#[tokio::test]
async fn abort_and_status_lifecycle() {
    let xs = [1u8, 2];
    let k = 2;
    let signal_id = Uuid::new_v4();
    let secret = Fp::from_u64(1);

    let mut nodes = Vec::new();
    for &x in &xs {
        let store = Arc::new(InMemoryShareStore::default());
        provision_semi_honest_share(&store, signal_id, x, secret, &xs, k);
        let config = test_config(x, k, Environment::Dev, None);
        nodes.push(TestNode::start(config, store).unwrap());
    }

    let triples = vec![generate_dealer_triple(&xs, k, true, &mut thread_rng()).unwrap()];
    let r = Fp::random(&mut thread_rng());
    let r_shares = shamir::split_at_points(r, &xs, k, &mut thread_rng()).unwrap();
    for (i, node) in nodes.iter().enumerate() {
        let triple_shares: Vec<TripleShareWire> = triples.iter().map(|t| TripleShareWire { a: t.a[i].y, b: t.b[i].y, c: t.c[i].y }).collect();
        let req = InitRequest {
            session_id: "session-abort".to_string(),
            signal_id,
            available_indices: vec![1],
            coordinator_x: xs[0],
            participant_xs: xs.to_vec(),
            threshold: k,
            mode: MPCMode::SemiHonest,
            r_share_y: r_shares[i].y,
            triple_shares,
            auth: None,
        };
        assert!(node.init(&req).await.accepted);
    }

    let status = nodes[0].status("session-abort").await;
    assert_eq!(status.status, SessionStatus::Round1Collecting);
    assert_eq!(status.total_participants, 2);

    for node in &nodes {
        node.abort(&AbortRequest {
            session_id: "session-abort".to_string(),
            reason: AbortReason::PeerTimeout,
            gate_idx: 0,
            offending_validator_x: None,
        })
        .await;
    }

    let req = ComputeGateRequest {
        session_id: "session-abort".to_string(),
        gate_idx: 0,
        prev_opened_d: None,
        prev_opened_e: None,
    };
    let response = nodes[0].server.post("/mpc/compute_gate").json(&req).await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn share_info_only_discloses_value_in_dev() {
    let signal_id = Uuid::new_v4();
    let secret = Fp::from_u64(9);

    let dev_store = Arc::new(InMemoryShareStore::default());
    dev_store.provision(signal_id, 1, secret, None, Arc::from(b"payload".as_slice()));
    let dev_node = TestNode::start(test_config(1, 2, Environment::Dev, None), dev_store).unwrap();
    let dev_resp = dev_node.share_info(signal_id).await;
    assert_eq!(dev_resp.share_y, Some(secret));

    let prod_store = Arc::new(InMemoryShareStore::default());
    prod_store.provision(signal_id, 1, secret, None, Arc::from(b"payload".as_slice()));
    let prod_node = TestNode::start(test_config(1, 2, Environment::Prod, None), prod_store).unwrap();
    let prod_resp = prod_node.share_info(signal_id).await;
    assert_eq!(prod_resp.share_y, None);
}

#[tokio::test]
async fn alpha_share_endpoint_returns_configured_share() {
    let store = Arc::new(InMemoryShareStore::default());
    let alpha = Fp::from_u64(42);
    let node = TestNode::start(test_config(1, 2, Environment::Dev, Some(alpha.to_hex())), store).unwrap();
    let resp = node.alpha_share(&AlphaShareRequest { session_id: "whatever".to_string() }).await;
    assert_eq!(resp.alpha_share, alpha);
}

#[tokio::test]
async fn network_ot_produces_a_consistent_triple_across_two_nodes() {
    let xs = [1u8, 2];
    let k = 2;
    let session_id = "session-ot";

    let a_store = Arc::new(InMemoryShareStore::default());
    let b_store = Arc::new(InMemoryShareStore::default());
    let node_a = TestNode::start(test_config(1, k, Environment::Dev, None), a_store).unwrap();
    let node_b = TestNode::start(test_config(2, k, Environment::Dev, None), b_store).unwrap();

    let setup_a = node_a.ot_setup(&OtSetupRequest { session_id: session_id.to_string(), count: 2 }).await;
    let setup_b = node_b.ot_setup(&OtSetupRequest { session_id: session_id.to_string(), count: 2 }).await;

    let choices_a = node_a
        .ot_choices(&OtChoicesRequest { session_id: session_id.to_string(), peer_sender_public_keys: setup_b.sender_public_keys.clone() })
        .await;
    let choices_b = node_b
        .ot_choices(&OtChoicesRequest { session_id: session_id.to_string(), peer_sender_public_keys: setup_a.sender_public_keys.clone() })
        .await;

    let transfers_a = node_a
        .ot_transfers(&OtTransfersRequest { session_id: session_id.to_string(), peer_choices: choices_b.choices.clone() })
        .await;
    let transfers_b = node_b
        .ot_transfers(&OtTransfersRequest { session_id: session_id.to_string(), peer_choices: choices_a.choices.clone() })
        .await;

    node_a
        .ot_complete(&OtCompleteRequest { session_id: session_id.to_string(), peer_pairs: transfers_b.pairs.clone() })
        .await;
    node_b
        .ot_complete(&OtCompleteRequest { session_id: session_id.to_string(), peer_pairs: transfers_a.pairs.clone() })
        .await;

    let shares_a = node_a.ot_shares(session_id).await;
    let shares_b = node_b.ot_shares(session_id).await;

    let mut rng = thread_rng();
    for (sa, sb) in shares_a.additive_shares.iter().zip(&shares_b.additive_shares) {
        let a = additive_to_shamir(&[sa.a, sb.a], &xs, k, &mut rng).unwrap();
        let b = additive_to_shamir(&[sa.b, sb.b], &xs, k, &mut rng).unwrap();
        let c = additive_to_shamir(&[sa.c, sb.c], &xs, k, &mut rng).unwrap();
        let a = shamir::reconstruct(&a, k).unwrap();
        let b = shamir::reconstruct(&b, k).unwrap();
        let c = shamir::reconstruct(&c, k).unwrap();
        assert_eq!(c, a.mul(&b), "network-OT triple must satisfy c = a * b");
    }

    // a local in-process run of the same protocol should produce the same invariant
    let group = dh_group_test();
    for triple in generate_two_party_triples_local(2, &xs, k, &group, &mut rng).unwrap() {
        let a = shamir::reconstruct(&triple.a[..k], k).unwrap();
        let b = shamir::reconstruct(&triple.b[..k], k).unwrap();
        let c = shamir::reconstruct(&triple.c[..k], k).unwrap();
        assert_eq!(c, a.mul(&b));
    }
}
