//! Configuration parsing for bspbar
//!
//! This crate handles parsing the KDL configuration file shared by the
//! panel daemon and the CLI.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{load_config, parse_config, parse_config_str};
