//! Report lexer and parser
//!
//! Tokens are first classified into a [`Token`] by their leading
//! character, then folded into a [`Report`] by [`ReportParser`], which
//! keeps the current monitor and its focused desktop as explicit cursors.
//!
//! | token       | meaning                                         |
//! |-------------|-------------------------------------------------|
//! | `M` / `m`   | focused / unfocused monitor, name follows       |
//! | `O` / `o`   | occupied desktop, uppercase = focused           |
//! | `F` / `f`   | free desktop                                    |
//! | `U` / `u`   | urgent desktop                                  |
//! | `L?`        | layout of the focused desktop (`T`, `M`)        |
//! | `T?`        | state of the focused node (`T`, `P`, `F`, `=`, `@`) |
//!
//! Any other token (`G` flags, future extensions) is ignored.

use serde::Serialize;
use tracing::trace;

use super::codec::decode_line;
use super::types::{Desktop, FocusDetail, Layout, Monitor, NodeState, Occupancy, Report};
use super::BspwmError;

/// One classified report token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Monitor {
        focused: bool,
        name: &'a str,
    },
    Desktop {
        focused: bool,
        occupancy: Occupancy,
        name: &'a str,
    },
    Layout(Layout),
    State(NodeState),
    /// Empty, unknown, or not-yet-understood token
    Ignored(&'a str),
}

impl<'a> Token<'a> {
    /// Classify a single token by its leading character
    pub fn lex(raw: &'a str) -> Self {
        let mut chars = raw.chars();
        let Some(kind) = chars.next() else {
            return Token::Ignored(raw);
        };
        let rest = chars.as_str();

        match kind {
            'M' | 'm' => Token::Monitor {
                focused: kind == 'M',
                name: rest,
            },
            'O' | 'o' | 'F' | 'f' | 'U' | 'u' => {
                let occupancy = match kind.to_ascii_lowercase() {
                    'o' => Occupancy::Occupied,
                    'u' => Occupancy::Urgent,
                    _ => Occupancy::Free,
                };
                Token::Desktop {
                    focused: kind.is_ascii_uppercase(),
                    occupancy,
                    name: rest,
                }
            }
            'L' => match rest.chars().next() {
                Some('T') => Token::Layout(Layout::Tiling),
                Some('M') => Token::Layout(Layout::Monocle),
                _ => Token::Ignored(raw),
            },
            'T' => match rest.chars().next() {
                Some('T') => Token::State(NodeState::Tiled),
                Some('P') => Token::State(NodeState::PseudoTiled),
                Some('F') => Token::State(NodeState::Floating),
                Some('=') => Token::State(NodeState::Fullscreen),
                Some('@') => Token::State(NodeState::Sticky),
                _ => Token::Ignored(raw),
            },
            _ => Token::Ignored(raw),
        }
    }
}

/// A token that was skipped because it broke the protocol ordering
///
/// Issues never abort a report; they are surfaced so the subscriber can
/// publish them for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseIssue {
    /// Zero-based token position within the line
    pub position: usize,
    pub token: String,
    pub reason: String,
}

impl ParseIssue {
    fn new(position: usize, token: &str, reason: impl Into<String>) -> Self {
        Self {
            position,
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// Convert into the error taxonomy
    pub fn into_error(self) -> BspwmError {
        BspwmError::MalformedReport {
            reason: format!("token {} ({:?}): {}", self.position, self.token, self.reason),
        }
    }
}

impl std::fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "skipped token {} ({:?}): {}",
            self.position, self.token, self.reason
        )
    }
}

/// A parsed report plus any tokens that had to be skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReport {
    pub report: Report,
    pub issues: Vec<ParseIssue>,
}

/// Folds a token sequence into a `Report`
#[derive(Debug, Default)]
pub struct ReportParser {
    monitors: Vec<Monitor>,
    /// Index into `monitors` of the monitor receiving desktops
    current_monitor: Option<usize>,
    issues: Vec<ParseIssue>,
}

impl ReportParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw token at `position`
    pub fn push(&mut self, position: usize, raw: &str) {
        match Token::lex(raw) {
            Token::Monitor { focused, name } => {
                self.monitors.push(Monitor::new(name, focused));
                self.current_monitor = Some(self.monitors.len() - 1);
            }
            Token::Desktop {
                focused,
                occupancy,
                name,
            } => self.push_desktop(position, raw, focused, occupancy, name),
            Token::Layout(layout) => {
                if let Some(detail) = self.focus_detail_mut(position, raw) {
                    detail.layout = Some(layout);
                }
            }
            Token::State(state) => {
                if let Some(detail) = self.focus_detail_mut(position, raw) {
                    detail.state = Some(state);
                }
            }
            Token::Ignored(token) => {
                if !token.is_empty() {
                    trace!(position, token, "Ignoring unknown report token");
                }
            }
        }
    }

    fn push_desktop(
        &mut self,
        position: usize,
        raw: &str,
        focused: bool,
        occupancy: Occupancy,
        name: &str,
    ) {
        let Some(monitor) = self.current_monitor.map(|i| &mut self.monitors[i]) else {
            self.issues
                .push(ParseIssue::new(position, raw, "desktop before any monitor"));
            return;
        };

        let slot = monitor.desktops.len();
        if focused {
            // The last uppercase desktop of a monitor holds focus
            if let Some(previous) = monitor.focused_desktop {
                monitor.desktops[previous].focus = None;
                trace!(position, token = raw, "Earlier focused desktop demoted");
            }
            monitor.focused_desktop = Some(slot);
        }

        monitor.desktops.push(Desktop {
            index: slot + 1,
            name: name.to_string(),
            occupancy,
            focus: focused.then(FocusDetail::default),
        });
    }

    fn focus_detail_mut(&mut self, position: usize, raw: &str) -> Option<&mut FocusDetail> {
        let detail = self
            .current_monitor
            .map(|i| &mut self.monitors[i])
            .and_then(|m| match m.focused_desktop {
                Some(d) => m.desktops[d].focus.as_mut(),
                None => None,
            });

        if detail.is_none() {
            self.issues.push(ParseIssue::new(
                position,
                raw,
                "modifier before a focused desktop",
            ));
        }
        detail
    }

    pub fn finish(self) -> ParsedReport {
        ParsedReport {
            report: Report {
                monitors: self.monitors,
            },
            issues: self.issues,
        }
    }
}

/// Parse already-decoded tokens into a report
pub fn parse_tokens<'a, I>(tokens: I) -> ParsedReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parser = ReportParser::new();
    for (position, token) in tokens.into_iter().enumerate() {
        parser.push(position, token);
    }
    parser.finish()
}

/// Decode and parse one raw report line
///
/// # Errors
///
/// Returns `BspwmError::MalformedLine` if the line cannot be decoded.
/// Out-of-order tokens do not fail the line; they are listed in
/// `ParsedReport::issues`.
pub fn parse_report_line(line: &[u8]) -> Result<ParsedReport, BspwmError> {
    let tokens = decode_line(line)?;
    Ok(parse_tokens(tokens))
}
