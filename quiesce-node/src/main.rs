//! Process entry point: load a JSON config, run one node to termination.
//!
//! Exit codes: 0 on clean termination, 2 when connection establishment
//! exhausts its retry budget, 1 for every other fatal error.

use {
    log::*,
    quiesce_node::{Node, NodeConfig, NodeError},
    quiesce_net::NetError,
    std::{env, fs, process},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(config_path) = env::args().nth(1) else {
        eprintln!("usage: quiesce-node <config.json>");
        process::exit(1);
    };

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config from {config_path}: {e}");
            process::exit(1);
        }
    };

    match run(config) {
        Ok(()) => info!("run complete"),
        Err(NodeError::Net(NetError::RetriesExhausted { peer, attempts })) => {
            error!("could not reach peer {peer} after {attempts} attempts");
            process::exit(2);
        }
        Err(e) => {
            error!("fatal: {e}");
            process::exit(1);
        }
    }
}

fn load_config(path: &str) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)?;
    let config: NodeConfig = serde_json::from_str(&raw)?;
    config.protocol.validate()?;
    Ok(config)
}

fn run(config: NodeConfig) -> Result<(), NodeError> {
    let node = Node::start(config)?;
    node.join()
}
