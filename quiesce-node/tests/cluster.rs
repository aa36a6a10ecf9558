//! End-to-end cluster runs over real loopback TCP.
//!
//! Every node is a full stack (listener, sender, dispatch, predictor); the
//! tests assert that the whole cluster reaches termination and shuts down
//! cleanly on its own.

use {
    quiesce_engine::{PeerId, ProtocolConfig},
    quiesce_net::{Listener, NetConfig},
    quiesce_node::{Node, NodeConfig},
    std::{
        collections::HashMap,
        net::SocketAddr,
        thread,
        time::{Duration, Instant},
    },
};

const CLUSTER_DEADLINE: Duration = Duration::from_secs(60);

/// Bind one listener per node up front (port 0) and build the matching
/// configs, root at index 0.
fn make_cluster(size: usize) -> Vec<(NodeConfig, Listener)> {
    let ids: Vec<PeerId> = (0..size).map(|i| PeerId::new(format!("n{i}"))).collect();
    let listeners: Vec<Listener> = (0..size)
        .map(|_| Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap())
        .collect();
    let addrs: HashMap<PeerId, SocketAddr> = ids
        .iter()
        .zip(&listeners)
        .map(|(id, listener)| (id.clone(), listener.local_addr()))
        .collect();

    ids.iter()
        .zip(listeners)
        .map(|(self_id, listener)| {
            let peers: Vec<PeerId> = ids.iter().filter(|id| *id != self_id).cloned().collect();
            let peer_addrs = peers
                .iter()
                .map(|peer| (peer.clone(), addrs[peer]))
                .collect();

            let mut protocol = ProtocolConfig::new(self_id.clone(), ids[0].clone(), peers);
            // Short run: few messages, fast pacing, generous linger.
            protocol.p_idle = 0.4;
            protocol.max_compute_messages = 8;
            protocol.decision_interval_ms = 1;
            protocol.grace_delay_ms = 50;
            protocol.linger_ms = 5_000;

            let config = NodeConfig {
                protocol,
                net: NetConfig::dev_default(),
                peer_addrs,
            };
            (config, listener)
        })
        .collect()
}

/// Run every node to completion, failing the test if the cluster has not
/// terminated within the deadline.
fn run_cluster(cluster: Vec<(NodeConfig, Listener)>) {
    let nodes: Vec<Node> = cluster
        .into_iter()
        .map(|(config, listener)| Node::start_with_listener(config, listener).unwrap())
        .collect();

    let handles: Vec<_> = nodes
        .into_iter()
        .map(|node| thread::spawn(move || node.join()))
        .collect();

    let deadline = Instant::now() + CLUSTER_DEADLINE;
    while handles.iter().any(|handle| !handle.is_finished()) {
        assert!(
            Instant::now() < deadline,
            "cluster did not terminate within {CLUSTER_DEADLINE:?}"
        );
        thread::sleep(Duration::from_millis(50));
    }

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
}

#[test]
fn test_two_node_cluster_terminates() {
    let _ = env_logger::builder().is_test(true).try_init();
    run_cluster(make_cluster(2));
}

#[test]
fn test_three_node_cluster_terminates() {
    let _ = env_logger::builder().is_test(true).try_init();
    run_cluster(make_cluster(3));
}

#[test]
fn test_five_node_cluster_terminates() {
    let _ = env_logger::builder().is_test(true).try_init();
    run_cluster(make_cluster(5));
}
