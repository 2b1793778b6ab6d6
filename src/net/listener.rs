//! Shared TCP listener.
//!
//! # Responsibilities
//! - Bind the configured address so every worker can accept on it
//! - Report bind failures with the address that failed
//!
//! # Design Decisions
//! - Each worker binds its own socket with `SO_REUSEPORT`; the kernel
//!   spreads incoming connections across them
//! - The socket is built with `TcpSocket` so options are set before `bind`

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The configured address does not parse.
    Address(String),
    /// Failed to bind to address.
    Bind(SocketAddr, std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address(addr) => write!(f, "Invalid bind address: {}", addr),
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Bind the configured address with port sharing enabled.
pub fn bind_shared(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|_| ListenerError::Address(config.bind_address.clone()))?;

    let listener = bind_addr(addr, config.backlog).map_err(|e| ListenerError::Bind(addr, e))?;

    let local_addr = listener.local_addr().map_err(|e| ListenerError::Bind(addr, e))?;
    tracing::info!(address = %local_addr, backlog = config.backlog, "Listener bound");

    Ok(listener)
}

fn bind_addr(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.set_reuseaddr(true)?;
    #[cfg(unix)]
    socket.set_reuseport(true)?;

    socket.bind(addr)?;
    socket.listen(backlog)
}
