//! bspwm socket transport and one-shot command client
//!
//! Every bspwm command uses its own connection: the client writes one
//! encoded command and the daemon answers, then closes the socket. A reply
//! starting with the BEL byte (`0x07`) signals a failed command.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use super::codec::encode_command;
use super::BspwmError;

/// First byte of a failure reply
const FAILURE_MARKER: u8 = 0x07;

/// A way of opening a fresh connection to bspwm
///
/// The subscriber is generic over this so tests can hand it in-memory
/// streams instead of a real socket.
pub trait Transport: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Stream, BspwmError>> + Send;

    /// Human readable endpoint for log messages
    fn describe(&self) -> String;
}

/// Connects to bspwm's Unix domain socket
#[derive(Debug, Clone)]
pub struct UnixTransport {
    socket_path: PathBuf,
}

impl UnixTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Transport for UnixTransport {
    type Stream = UnixStream;

    fn connect(&self) -> impl Future<Output = Result<UnixStream, BspwmError>> + Send {
        let path = self.socket_path.clone();
        async move {
            UnixStream::connect(&path)
                .await
                .map_err(|source| BspwmError::ConnectionFailed { path, source })
        }
    }

    fn describe(&self) -> String {
        self.socket_path.display().to_string()
    }
}

/// Write one encoded command as a single write
pub async fn write_command<W, S>(writer: &mut W, words: &[S]) -> Result<(), BspwmError>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let payload = encode_command(words)?;
    writer
        .write_all(&payload)
        .await
        .map_err(BspwmError::SendFailed)?;
    writer.flush().await.map_err(BspwmError::SendFailed)
}

/// Client for one-shot bspwm commands
///
/// # Example
///
/// ```ignore
/// let client = BspwmClient::new(UnixTransport::new(get_socket_path(None)?));
/// client.focus_desktop(2).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BspwmClient<T: Transport = UnixTransport> {
    transport: T,
}

impl<T: Transport> BspwmClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Send a command and return the daemon's reply text
    ///
    /// # Errors
    ///
    /// Returns `BspwmError::InvalidCommand` before connecting if the words
    /// cannot be encoded, connection and I/O errors as they occur, and
    /// `BspwmError::CommandFailed` if bspwm rejects the command.
    pub async fn send<S: AsRef<str>>(&self, words: &[S]) -> Result<String, BspwmError> {
        // Validate before opening a connection
        encode_command(words)?;

        let mut stream = self.transport.connect().await?;
        write_command(&mut stream, words).await?;

        let mut reply = Vec::new();
        stream
            .read_to_end(&mut reply)
            .await
            .map_err(BspwmError::ReceiveFailed)?;

        debug!(
            command = %words.iter().map(|w| w.as_ref()).collect::<Vec<_>>().join(" "),
            reply_len = reply.len(),
            "bspwm command sent"
        );

        if reply.first() == Some(&FAILURE_MARKER) {
            return Err(BspwmError::CommandFailed {
                message: String::from_utf8_lossy(&reply[1..]).trim_end().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Focus the desktop at 1-based `slot` (`desktop ^N --focus`)
    pub async fn focus_desktop(&self, slot: usize) -> Result<(), BspwmError> {
        let target = format!("^{}", slot);
        self.send(&["desktop", target.as_str(), "--focus"]).await?;
        Ok(())
    }
}
