//! Message framing for the stream transport.
//!
//! - [`Framing::LengthPrefixed`] (default): a 4-byte big-endian length
//!   followed by that many payload bytes. Coalesced or split TCP writes are
//!   reassembled exactly.
//! - [`Framing::Legacy`]: whatever a single read of up to
//!   [`MAX_FRAME_LEN`] bytes returns is one message. Only correct while the
//!   client sends one small message per round trip.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use turret_types::TurretError;

/// Largest payload accepted or emitted, in bytes.
pub const MAX_FRAME_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    #[default]
    LengthPrefixed,
    Legacy,
}

impl Framing {
    /// Wrap `payload` for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::FrameTooLarge`] if a length-prefixed payload
    /// exceeds [`MAX_FRAME_LEN`].
    pub fn encode_frame(self, payload: &[u8]) -> Result<Vec<u8>, TurretError> {
        match self {
            Framing::LengthPrefixed => {
                check_len(payload.len())?;
                let mut frame = Vec::with_capacity(4 + payload.len());
                frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                frame.extend_from_slice(payload);
                Ok(frame)
            }
            Framing::Legacy => Ok(payload.to_vec()),
        }
    }

    /// Read the next message, or `None` once the peer has closed the
    /// connection cleanly.
    ///
    /// # Errors
    ///
    /// - [`TurretError::Io`] on a transport error or a connection closed
    ///   mid-frame.
    /// - [`TurretError::FrameTooLarge`] for a declared length above
    ///   [`MAX_FRAME_LEN`].
    pub async fn read_frame<R>(self, reader: &mut R) -> Result<Option<Vec<u8>>, TurretError>
    where
        R: AsyncRead + Unpin,
    {
        match self {
            Framing::LengthPrefixed => {
                let mut header = [0u8; 4];
                let mut filled = 0;
                while filled < header.len() {
                    let n = reader.read(&mut header[filled..]).await?;
                    if n == 0 {
                        if filled == 0 {
                            return Ok(None);
                        }
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed inside a frame header",
                        )
                        .into());
                    }
                    filled += n;
                }
                let len = u32::from_be_bytes(header) as usize;
                check_len(len)?;
                let mut payload = vec![0u8; len];
                reader.read_exact(&mut payload).await?;
                Ok(Some(payload))
            }
            Framing::Legacy => {
                let mut buf = vec![0u8; MAX_FRAME_LEN];
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                buf.truncate(n);
                Ok(Some(buf))
            }
        }
    }

    /// Encode and write `payload`, then flush.
    ///
    /// # Errors
    ///
    /// Propagates [`encode_frame`][Self::encode_frame] and transport errors.
    pub async fn write_frame<W>(self, writer: &mut W, payload: &[u8]) -> Result<(), TurretError>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode_frame(payload)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }
}

fn check_len(len: usize) -> Result<(), TurretError> {
    if len > MAX_FRAME_LEN {
        Err(TurretError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        })
    } else {
        Ok(())
    }
}
