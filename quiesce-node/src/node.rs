//! Node assembly: configuration, thread spawn order, and shutdown.

use {
    crate::{
        dispatch::DispatchService, predictor_service::PredictorService, shared::EngineCell,
        shared::SharedEngine,
    },
    crossbeam_channel::bounded,
    log::*,
    quiesce_engine::{EngineError, PeerId, ProtocolConfig, TerminationEngine},
    quiesce_net::{connect_all, Listener, ListenerHandle, NetConfig, NetError, SenderService},
    serde::{Deserialize, Serialize},
    std::{
        collections::HashMap,
        net::SocketAddr,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    },
    thiserror::Error,
};

/// Everything one node needs to run: protocol knobs, transport knobs, and
/// the address book for the fixed peer set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub net: NetConfig,
    /// Listener address of every remote peer, keyed by identity.
    pub peer_addrs: HashMap<PeerId, SocketAddr>,
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("transport error: {0}")]
    Net(#[from] NetError),

    #[error("no address configured for peer {0}")]
    MissingPeerAddress(PeerId),

    #[error("node aborted before reaching termination")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// A running node: listener, sender, dispatch loop, and workload generator.
///
/// [`Node::join`] blocks until the protocol terminates (or a fatal error
/// aborts the run) and tears the services down in dependency order.
pub struct Node {
    shared: SharedEngine,
    exit: Arc<AtomicBool>,
    dispatch: DispatchService,
    predictor: PredictorService,
    sender: SenderService,
    listener_handle: ListenerHandle,
}

impl Node {
    /// Bind the local listener and bring the node up.
    pub fn start(config: NodeConfig) -> Result<Self> {
        let listener = Listener::bind(config.net.bind_addr)?;
        Self::start_with_listener(config, listener)
    }

    /// Bring the node up on an already-bound listener.
    ///
    /// Split out so callers (and the cluster tests) can bind every node on
    /// an ephemeral port first and exchange resolved addresses before any
    /// dialing starts.
    pub fn start_with_listener(config: NodeConfig, listener: Listener) -> Result<Self> {
        config.protocol.validate().map_err(EngineError::from)?;
        config.net.validate()?;
        let mut peer_addrs = HashMap::with_capacity(config.protocol.peers.len());
        for peer in &config.protocol.peers {
            let addr = config
                .peer_addrs
                .get(peer)
                .ok_or_else(|| NodeError::MissingPeerAddress(peer.clone()))?;
            peer_addrs.insert(peer.clone(), *addr);
        }

        info!(
            "node {}: starting ({} peers, root: {})",
            config.protocol.self_id,
            config.protocol.peers.len(),
            config.protocol.root_id,
        );

        let exit = Arc::new(AtomicBool::new(false));
        let (inbound_tx, inbound_rx) = bounded(config.net.channel_capacity);
        let (outbound_tx, outbound_rx) = bounded(config.net.channel_capacity);

        // Accept before dialing, so peers starting concurrently find every
        // listener already bound.
        let listener_handle =
            listener.start(inbound_tx, config.net.max_message_size, Arc::clone(&exit));
        let streams = match connect_all(&peer_addrs, &config.net.retry) {
            Ok(streams) => streams,
            Err(e) => {
                listener_handle.shutdown(&exit);
                return Err(e.into());
            }
        };

        let engine = TerminationEngine::new(config.protocol)?;
        let shared = EngineCell::new(engine);

        let sender = SenderService::spawn(
            streams,
            outbound_rx,
            config.net.max_message_size,
            Arc::clone(&exit),
        );
        let dispatch = DispatchService::spawn(
            Arc::clone(&shared),
            inbound_rx,
            outbound_tx.clone(),
            Arc::clone(&exit),
        );
        let predictor =
            PredictorService::spawn(Arc::clone(&shared), outbound_tx, Arc::clone(&exit));

        Ok(Self {
            shared,
            exit,
            dispatch,
            predictor,
            sender,
            listener_handle,
        })
    }

    /// Whether the protocol has reached the terminated state.
    pub fn terminated(&self) -> bool {
        self.shared.with(|engine| engine.terminated())
    }

    /// Block until the run ends, then tear everything down.
    ///
    /// Dispatch and predictor finish first and drop their outbound sender
    /// halves; the sender service then drains the queue to the wire before
    /// closing the streams; the listener is unblocked and joined last.
    pub fn join(self) -> Result<()> {
        if self.dispatch.join().is_err() {
            error!("node: dispatch thread panicked");
        }
        if self.predictor.join().is_err() {
            error!("node: predictor thread panicked");
        }
        if self.sender.join().is_err() {
            error!("node: sender thread panicked");
        }
        self.listener_handle.shutdown(&self.exit);

        if self.shared.with(|engine| engine.terminated()) {
            info!("node: clean shutdown after termination");
            Ok(())
        } else {
            Err(NodeError::Aborted)
        }
    }

    /// Raise the exit flag, aborting the run.
    pub fn abort(&self) {
        self.exit.store(true, Ordering::Relaxed);
    }
}
