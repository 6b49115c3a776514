// SPDX-License-Identifier: Apache-2.0

//! The transport adapter (§4.7, §5): one loopback UDP socket per neighbor,
//! bound at startup and held for the process lifetime, with a single
//! readiness wait bounded by a short timeout. This is the only collaborator
//! spec.md treats as external; `Router` never touches a socket directly.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use futures::future::select_all;
use tokio::net::UdpSocket;

use crate::config::NeighborSpec;
use crate::error::RouterError;

/// Oversize datagrams are a protocol violation (§5); this buffer is large
/// enough to receive and then truncate any single one.
const MAX_DATAGRAM: usize = 65536;

/// One readiness wait is bounded to this duration (§5), purely to keep the
/// event loop responsive — there is no per-message timeout.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// The neighbor sockets opened at startup, one per configured connection.
pub struct Transport {
    sockets: HashMap<Ipv4Addr, UdpSocket>,
    ports: HashMap<Ipv4Addr, u16>,
}

impl Transport {
    /// Bind one ephemeral loopback socket per neighbor spec.
    pub async fn bind(specs: &[NeighborSpec]) -> Result<Self, RouterError> {
        let mut sockets = HashMap::new();
        let mut ports = HashMap::new();
        for spec in specs {
            let socket = UdpSocket::bind(("127.0.0.1", 0))
                .await
                .map_err(|source| RouterError::TransportFailure {
                    neighbor: spec.neighbor,
                    source,
                })?;
            sockets.insert(spec.neighbor, socket);
            ports.insert(spec.neighbor, spec.port);
        }
        Ok(Self { sockets, ports })
    }

    /// Send `bytes` to `neighbor`'s configured port on localhost.
    pub async fn send(&self, neighbor: Ipv4Addr, bytes: &[u8]) -> Result<(), RouterError> {
        let socket = self
            .sockets
            .get(&neighbor)
            .ok_or(RouterError::UnknownNeighbor(neighbor))?;
        let port = *self
            .ports
            .get(&neighbor)
            .ok_or(RouterError::UnknownNeighbor(neighbor))?;
        socket
            .send_to(bytes, ("127.0.0.1", port))
            .await
            .map(|_| ())
            .map_err(|source| RouterError::TransportFailure { neighbor, source })
    }

    /// Wait up to [`POLL_TIMEOUT`] for any neighbor socket to become
    /// readable, returning the datagram that arrived first, if any (§5's
    /// single suspension point). `None` means the timeout elapsed with no
    /// datagram — the caller loops back around to poll again.
    pub async fn poll(&self) -> Option<(Ipv4Addr, Vec<u8>)> {
        if self.sockets.is_empty() {
            tokio::time::sleep(POLL_TIMEOUT).await;
            return None;
        }

        let waits = self.sockets.iter().map(|(&neighbor, socket)| {
            Box::pin(async move {
                let mut buf = vec![0u8; MAX_DATAGRAM];
                match socket.recv(&mut buf).await {
                    Ok(n) => {
                        buf.truncate(n);
                        Some((neighbor, buf))
                    }
                    Err(_) => None,
                }
            })
        });

        match tokio::time::timeout(POLL_TIMEOUT, select_all(waits)).await {
            Ok((result, _, _)) => result,
            Err(_) => None,
        }
    }
}
