//! [`StreamServer`] – the TCP command server.
//!
//! Sessions are served strictly one after another: a second client waits
//! in the listen backlog until the current session ends. Within a session
//! each frame is classified, executed and answered in order.
//!
//! | Outcome | Effect |
//! |---|---|
//! | Reply | Encoded and written back as one frame. |
//! | `UnsupportedMessage` | Logged; no reply; the session continues. |
//! | Any other error | Logged; the session is closed; the server keeps accepting. |

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};
use turret_core::dispatcher;
use turret_protocol::{Framing, encode};
use turret_types::TurretError;

use crate::{SharedState, with_state};

pub struct StreamServer {
    listener: TcpListener,
    state: SharedState,
    framing: Framing,
}

impl StreamServer {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::Io`] if the address cannot be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        state: SharedState,
        framing: Framing,
    ) -> Result<Self, TurretError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state,
            framing,
        })
    }

    /// # Errors
    ///
    /// Returns [`TurretError::Io`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, TurretError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve sessions until `shutdown` resolves. An in-flight
    /// session is abandoned at shutdown.
    ///
    /// # Errors
    ///
    /// Currently infallible; accept errors are logged and retried.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<(), TurretError> {
        tokio::pin!(shutdown);
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, framing = ?self.framing, "stream server listening");
        }

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            info!(%peer, "session opened");
            tokio::select! {
                () = &mut shutdown => break,
                result = self.session(stream) => match result {
                    Ok(()) => info!(%peer, "session closed"),
                    Err(e) => error!(%peer, error = %e, "session terminated"),
                },
            }
        }

        info!("stream server stopped");
        Ok(())
    }

    async fn session(&self, mut stream: TcpStream) -> Result<(), TurretError> {
        while let Some(payload) = self.framing.read_frame(&mut stream).await? {
            debug!(len = payload.len(), "frame received");
            let reply = with_state(&self.state, move |state| {
                dispatcher::handle(state, &payload)
            })
            .await;

            match reply {
                Ok(message) => {
                    let bytes = encode(&message)?;
                    self.framing.write_frame(&mut stream, &bytes).await?;
                }
                Err(TurretError::UnsupportedMessage) => {
                    warn!("unsupported message ignored");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
