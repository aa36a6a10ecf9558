//! Outbound connection establishment with bounded retry.
//!
//! The protocol assumes a complete, fixed channel set: a node that cannot
//! reach every peer cannot make progress.  Connection attempts therefore
//! retry with exponential backoff up to a configured limit, and exhaustion
//! is returned as an error for the process entry point to act on — nothing
//! in here exits or spins forever.

use {
    crate::{
        config::RetryConfig,
        error::{NetError, Result},
    },
    log::*,
    quiesce_engine::PeerId,
    std::{
        collections::HashMap,
        net::{SocketAddr, TcpStream},
        thread,
    },
};

/// Connect to one peer, retrying up to the configured attempt limit.
pub fn connect_with_retry(
    peer: &PeerId,
    addr: SocketAddr,
    retry: &RetryConfig,
) -> Result<TcpStream> {
    for attempt in 0..retry.attempt_limit {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                info!("connector: connected to {peer} at {addr}");
                return Ok(stream);
            }
            Err(e) => {
                let delay = retry.delay_after_attempt(attempt);
                warn!(
                    "connector: attempt {}/{} to {peer} at {addr} failed: {e}; \
                     retrying in {}ms",
                    attempt + 1,
                    retry.attempt_limit,
                    delay.as_millis()
                );
                thread::sleep(delay);
            }
        }
    }
    Err(NetError::RetriesExhausted {
        peer: peer.clone(),
        attempts: retry.attempt_limit,
    })
}

/// Establish the full outbound channel set, one stream per peer.
///
/// Fails on the first peer whose retry budget is exhausted; partially
/// opened streams are dropped (closed) on the error path.
pub fn connect_all(
    peer_addrs: &HashMap<PeerId, SocketAddr>,
    retry: &RetryConfig,
) -> Result<HashMap<PeerId, TcpStream>> {
    let mut streams = HashMap::with_capacity(peer_addrs.len());
    for (peer, addr) in peer_addrs {
        let stream = connect_with_retry(peer, *addr, retry)?;
        streams.insert(peer.clone(), stream);
    }
    Ok(streams)
}

#[cfg(test)]
mod tests {
    use {super::*, std::net::TcpListener};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            attempt_limit: 2,
            base_delay_ms: 10,
            max_delay_ms: 20,
        }
    }

    #[test]
    fn test_connects_to_live_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = connect_with_retry(&PeerId::from("p"), addr, &fast_retry());
        assert!(stream.is_ok());
    }

    #[test]
    fn test_retries_exhausted_on_dead_address() {
        // Bind then drop to get an address that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect_with_retry(&PeerId::from("p"), addr, &fast_retry());
        assert!(matches!(
            result,
            Err(NetError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_connect_all_fails_fast_on_unreachable_peer() {
        let live = TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let mut addrs = HashMap::new();
        addrs.insert(PeerId::from("live"), live.local_addr().unwrap());
        addrs.insert(PeerId::from("dead"), dead_addr);

        assert!(connect_all(&addrs, &fast_retry()).is_err());
    }
}
