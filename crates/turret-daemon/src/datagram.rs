//! [`DatagramServer`] – the UDP command server.
//!
//! Every datagram is handled on its own; an error is logged and the next
//! datagram is served. A `stop` datagram ends the loop like the shutdown
//! future does.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, error, info, warn};
use turret_core::dispatcher::{self, DatagramOutcome};
use turret_protocol::MAX_FRAME_LEN;
use turret_types::TurretError;

use crate::{SharedState, with_state};

pub struct DatagramServer {
    socket: UdpSocket,
    state: SharedState,
}

impl DatagramServer {
    /// Bind the UDP socket.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Io`] if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs, state: SharedState) -> Result<Self, TurretError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket, state })
    }

    /// # Errors
    ///
    /// Returns [`TurretError::Io`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, TurretError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve datagrams until `shutdown` resolves or a `stop` command
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Io`] if receiving from the socket fails.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<(), TurretError> {
        tokio::pin!(shutdown);
        if let Ok(addr) = self.socket.local_addr() {
            info!(%addr, "datagram server listening");
        }
        let mut buf = vec![0u8; MAX_FRAME_LEN];

        loop {
            let (len, peer) = tokio::select! {
                () = &mut shutdown => break,
                received = self.socket.recv_from(&mut buf) => received?,
            };
            let payload = buf[..len].to_vec();
            debug!(%peer, len, "datagram received");

            let outcome = with_state(&self.state, move |state| {
                dispatcher::handle_datagram(state, &payload)
            })
            .await;

            match outcome {
                Ok(DatagramOutcome::Reply(bytes)) => {
                    if let Err(e) = self.socket.send_to(&bytes, peer).await {
                        warn!(%peer, error = %e, "failed to send reply");
                    }
                }
                Ok(DatagramOutcome::NoReply) => {}
                Ok(DatagramOutcome::Stop) => {
                    info!(%peer, "stop requested");
                    break;
                }
                Err(TurretError::UnsupportedMessage) => {
                    warn!(%peer, "unsupported datagram ignored");
                }
                Err(e) => error!(%peer, error = %e, "datagram failed"),
            }
        }

        info!("datagram server stopped");
        Ok(())
    }
}
