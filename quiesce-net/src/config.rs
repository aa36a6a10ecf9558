//! Configuration for the transport layer.

use {
    crate::error::{NetError, Result},
    serde::{Deserialize, Serialize},
    std::net::SocketAddr,
};

/// Bounded-retry policy for outbound connection establishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per peer before giving up.
    /// Default: 10.
    #[serde(default = "default_attempt_limit")]
    pub attempt_limit: u32,

    /// Delay before the second attempt (ms); doubles every attempt.
    /// Default: 100.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling (ms).
    /// Default: 2000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_attempt_limit() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempt_limit: default_attempt_limit(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Backoff delay after a given failed attempt (0-based).
    pub fn delay_after_attempt(&self, attempt: u32) -> std::time::Duration {
        let exp = attempt.min(16);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        std::time::Duration::from_millis(delay)
    }
}

/// Configuration for a node's transport endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Local address the listener binds to.
    /// Default: `0.0.0.0:7400`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Maximum size of a single serialized message in bytes.  Protocol
    /// messages are tiny; the cap guards against garbage frames.
    /// Default: 64 KiB.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Capacity of the inbound and outbound message queues.
    /// Default: 1024.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Connection retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:7400".parse().expect("valid default bind addr")
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_channel_capacity() -> usize {
    1_024
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_message_size: default_max_message_size(),
            channel_capacity: default_channel_capacity(),
            retry: RetryConfig::default(),
        }
    }
}

impl NetConfig {
    /// Validate transport parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size > u32::MAX as usize {
            return Err(NetError::OversizedFrameLimit(self.max_message_size));
        }
        Ok(())
    }

    /// Config suitable for local testing: loopback, ephemeral port, short
    /// retry budget.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".parse().expect("valid dev bind addr"),
            max_message_size: 64 * 1024,
            channel_capacity: 256,
            retry: RetryConfig {
                attempt_limit: 3,
                base_delay_ms: 20,
                max_delay_ms: 100,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetConfig::default();
        assert_eq!(config.max_message_size, 64 * 1024);
        assert_eq!(config.channel_capacity, 1_024);
        assert_eq!(config.retry.attempt_limit, 10);
    }

    #[test]
    fn test_frame_limit_must_fit_header() {
        let mut config = NetConfig::default();
        assert!(config.validate().is_ok());
        config.max_message_size = u32::MAX as usize;
        assert!(config.validate().is_ok());
        config.max_message_size = u32::MAX as usize + 1;
        assert!(matches!(
            config.validate(),
            Err(NetError::OversizedFrameLimit(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_up_to_ceiling() {
        let retry = RetryConfig {
            attempt_limit: 10,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        };
        assert_eq!(retry.delay_after_attempt(0).as_millis(), 100);
        assert_eq!(retry.delay_after_attempt(1).as_millis(), 200);
        assert_eq!(retry.delay_after_attempt(3).as_millis(), 800);
        assert_eq!(retry.delay_after_attempt(5).as_millis(), 2_000);
        assert_eq!(retry.delay_after_attempt(60).as_millis(), 2_000);
    }
}
