//! bspwm IPC client for bspbar
//!
//! This crate talks to the bspwm window manager over its Unix socket. It
//! enables bspbar to:
//! - Subscribe to bspwm's status reports and keep a structured model of
//!   monitors and desktops
//! - Publish minimal per-desktop change events so panels can reuse widgets
//! - Send one-shot commands such as `desktop ^2 --focus`
//!
//! ## Architecture
//!
//! - `codec`: NUL-delimited command encoding, report line tokenizing
//! - `parser`: token lexer and report parser
//! - `reconcile`: report diffing with positional desktop slots
//! - `subscription`: `ReportSubscriber`, the reconnecting read loop
//! - `client`: `Transport`, `UnixTransport`, `BspwmClient`
//! - `socket`: socket path discovery from `$BSPWM_SOCKET` / `$DISPLAY`
//!
//! ## Protocol
//!
//! Commands are words separated and terminated by NUL bytes. After
//! `subscribe report`, bspwm writes one report per line, for example
//! `WMeDP-1:o1:F2:LT:TT`.

mod client;
mod codec;
mod error;
mod parser;
mod reconcile;
mod socket;
mod subscription;
mod types;

pub use client::{write_command, BspwmClient, Transport, UnixTransport};
pub use codec::{decode_line, encode_command, split_command, SUBSCRIBE_REPORT};
pub use error::BspwmError;
pub use parser::{parse_report_line, parse_tokens, ParseIssue, ParsedReport, ReportParser, Token};
pub use reconcile::{reconcile, ReportChange, SlotPlan};
pub use socket::{
    get_socket_path, parse_display, resolve_socket_path, DisplayId, DisplaySource, EnvDisplay,
    BSPWM_SOCKET_ENV, DISPLAY_ENV,
};
pub use subscription::{
    ConnectionState, EventReceiver, ReportSubscriber, RetryPolicy, SubscriberConfig,
    SubscriptionEvent, SubscriptionHandle, SubscriptionState, DEFAULT_CHANNEL_BUFFER,
};
pub use types::{Desktop, FocusDetail, Layout, Monitor, NodeState, Occupancy, Report};
