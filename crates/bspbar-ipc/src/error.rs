//! Error types for bspwm IPC operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to the bspwm daemon
#[derive(Debug, Error)]
pub enum BspwmError {
    /// Neither an explicit path, `$BSPWM_SOCKET` nor `$DISPLAY` yielded a socket path
    #[error("bspwm socket path not found: no $BSPWM_SOCKET and $DISPLAY could not be parsed")]
    SocketPathNotFound,

    /// Failed to connect to the bspwm socket
    #[error("Failed to connect to bspwm socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a command to bspwm
    #[error("Failed to send command to bspwm: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Failed to read from the bspwm socket
    #[error("Failed to receive data from bspwm: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Connection was closed by the daemon
    #[error("Connection to bspwm closed")]
    ConnectionClosed,

    /// A command could not be encoded
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// A report line could not be decoded into tokens
    #[error("Malformed report line: {reason}")]
    MalformedLine { reason: String },

    /// A report token violated the protocol ordering
    #[error("Malformed report: {reason}")]
    MalformedReport { reason: String },

    /// bspwm answered a command with a failure reply
    #[error("bspwm returned error: {message}")]
    CommandFailed { message: String },

    /// Maximum retry attempts exceeded
    #[error("Failed to subscribe to bspwm after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

impl BspwmError {
    /// Whether the subscription can carry on after this error
    ///
    /// Connection-level failures trigger a reconnect, line-level failures
    /// skip the offending line. Everything else is surfaced to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BspwmError::ConnectionFailed { .. }
                | BspwmError::SendFailed(_)
                | BspwmError::ReceiveFailed(_)
                | BspwmError::ConnectionClosed
                | BspwmError::MalformedLine { .. }
                | BspwmError::MalformedReport { .. }
        )
    }
}
