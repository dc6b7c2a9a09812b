//! Listener binding.
//!
//! # Responsibilities
//! - Resolve the HTTP port from overrides and configuration
//! - Preflight-bind the port when asked to, before anything else starts
//! - Bind the listening sockets handed to the HTTP engine

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use socket2::{Domain, Protocol, Socket, Type};

const BACKLOG: i32 = 1024;

/// Pick the HTTP port: the override wins, else the configured port.
pub fn resolve_port(configured: u16, override_port: Option<u16>) -> u16 {
    match override_port {
        Some(port) => {
            tracing::info!(port, "Using port from override");
            port
        }
        None => {
            tracing::warn!(port = configured, "No port override specified, using configured port");
            configured
        }
    }
}

/// Resolve `host:port` to the first socket address.
pub fn socket_addr(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no address for {host}:{port}"),
        )
    })
}

fn socket_for(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    Ok(socket)
}

/// Check that `addr` can be bound right now. The socket is closed again.
pub fn preflight(addr: SocketAddr) -> io::Result<()> {
    match socket_for(addr) {
        Ok(_) => {
            tracing::debug!(address = %addr, "Port preflight succeeded");
            Ok(())
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Port is not available");
            Err(e)
        }
    }
}

/// Bind a non-blocking listening socket.
pub fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket_for(addr)?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;
    let listener: TcpListener = socket.into();

    tracing::info!(address = %listener.local_addr()?, "Listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        assert_eq!(resolve_port(8080, Some(9000)), 9000);
        assert_eq!(resolve_port(8080, None), 8080);
    }

    #[test]
    fn preflight_fails_on_bound_port() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = held.local_addr().unwrap();
        assert!(preflight(addr).is_err());
    }

    #[test]
    fn binds_ephemeral_port() {
        let listener = bind_listener(socket_addr("127.0.0.1", 0).unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert!(preflight(socket_addr("127.0.0.1", 0).unwrap()).is_ok());
    }
}
