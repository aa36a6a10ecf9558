//! Blocking TCP transport for the quiesce termination-detection protocol.
//!
//! The transport is deliberately plain: every peer pair shares one
//! long-lived TCP connection, messages travel as a 4-byte little-endian
//! length prefix followed by a bincode payload, and each side of the link
//! is serviced by a dedicated OS thread.
//!
//! - [`codec`]: framing and (de)serialization of wire messages.
//! - [`listener`]: inbound side, one reader thread per accepted connection.
//! - [`connector`]: outbound dialing with bounded exponential backoff.
//! - [`sender`]: the single drain thread writing the outbound queue.

pub mod codec;
pub mod config;
pub mod connector;
pub mod error;
pub mod listener;
pub mod sender;

pub use {
    config::{NetConfig, RetryConfig},
    connector::{connect_all, connect_with_retry},
    error::{NetError, Result},
    listener::{Listener, ListenerHandle},
    sender::SenderService,
};
