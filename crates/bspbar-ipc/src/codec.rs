//! Wire codec for the bspwm socket
//!
//! Outgoing commands are words joined by NUL bytes with a trailing NUL,
//! written in a single write. Incoming reports are newline-terminated
//! lines: a one-character sentinel followed by `:`-separated tokens.

use super::BspwmError;

/// The command that turns a connection into a report stream
pub const SUBSCRIBE_REPORT: [&str; 2] = ["subscribe", "report"];

/// Encode command words into the NUL-delimited wire format
///
/// # Errors
///
/// Returns `BspwmError::InvalidCommand` if `words` is empty or a word
/// contains a NUL byte. Words are never escaped.
///
/// # Example
///
/// ```
/// let bytes = bspbar_ipc::encode_command(&["desktop", "^1", "--focus"]).unwrap();
/// assert_eq!(bytes, b"desktop\0^1\0--focus\0");
/// ```
pub fn encode_command<S: AsRef<str>>(words: &[S]) -> Result<Vec<u8>, BspwmError> {
    if words.is_empty() {
        return Err(BspwmError::InvalidCommand {
            reason: "command has no words".to_string(),
        });
    }

    let mut payload = Vec::with_capacity(words.iter().map(|w| w.as_ref().len() + 1).sum());
    for word in words {
        let word = word.as_ref();
        if word.as_bytes().contains(&0) {
            return Err(BspwmError::InvalidCommand {
                reason: format!("word {:?} contains a NUL byte", word),
            });
        }
        payload.extend_from_slice(word.as_bytes());
        payload.push(0);
    }

    Ok(payload)
}

/// Split a whitespace-separated command string into words
pub fn split_command(command: &str) -> Vec<&str> {
    command.split_whitespace().collect()
}

/// Decode one report line into its `:`-separated tokens
///
/// A trailing `\n` (and `\r`) is stripped, then the first character is
/// dropped as the report sentinel.
///
/// # Errors
///
/// Returns `BspwmError::MalformedLine` if the line is empty or is not
/// valid UTF-8.
pub fn decode_line(line: &[u8]) -> Result<Vec<&str>, BspwmError> {
    let text = std::str::from_utf8(line).map_err(|e| BspwmError::MalformedLine {
        reason: format!("invalid UTF-8: {}", e),
    })?;
    let text = text.trim_end_matches(['\n', '\r']);

    let mut chars = text.chars();
    if chars.next().is_none() {
        return Err(BspwmError::MalformedLine {
            reason: "empty line".to_string(),
        });
    }

    Ok(chars.as_str().split(':').collect())
}
