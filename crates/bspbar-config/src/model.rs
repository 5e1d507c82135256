//! Configuration data model

use std::path::PathBuf;
use std::time::Duration;

use bspbar_ipc::{RetryPolicy, SubscriberConfig};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub global: GlobalConfig,
    pub bspwm: BspwmConfig,
    pub panel: PanelConfig,
}

/// Global settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Connection settings for the bspwm socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BspwmConfig {
    /// Explicit socket path; beats `$BSPWM_SOCKET` and `$DISPLAY`
    pub socket_path: Option<PathBuf>,
    /// First reconnect delay in milliseconds
    pub retry_initial_ms: u64,
    /// Reconnect delay cap in milliseconds
    pub retry_max_ms: u64,
    /// Consecutive failed reconnects before giving up; `None` = never
    pub max_retries: Option<u32>,
    /// Queue depth of each event listener
    pub channel_buffer: usize,
}

impl Default for BspwmConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            retry_initial_ms: 1000,
            retry_max_ms: 10_000,
            max_retries: None,
            channel_buffer: 64,
        }
    }
}

impl BspwmConfig {
    /// Subscriber settings for these connection options
    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(self.retry_initial_ms),
                max_delay: Duration::from_millis(self.retry_max_ms),
                max_retries: self.max_retries,
            },
            channel_buffer: self.channel_buffer,
        }
    }
}

/// Desktop strip settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    /// Monitor whose desktops are shown; first monitor when unset
    pub monitor: Option<String>,
    /// Hide the panel while the focused window is fullscreen
    pub hide_on_fullscreen: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            monitor: None,
            hide_on_fullscreen: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_config_mapping() {
        let bspwm = BspwmConfig {
            socket_path: None,
            retry_initial_ms: 200,
            retry_max_ms: 800,
            max_retries: Some(3),
            channel_buffer: 8,
        };

        let settings = bspwm.subscriber_config();
        assert_eq!(settings.retry.initial_delay, Duration::from_millis(200));
        assert_eq!(settings.retry.max_delay, Duration::from_millis(800));
        assert_eq!(settings.retry.max_retries, Some(3));
        assert_eq!(settings.channel_buffer, 8);
    }

    #[test]
    fn test_default_mapping_matches_subscriber_defaults() {
        assert_eq!(
            BspwmConfig::default().subscriber_config(),
            SubscriberConfig::default()
        );
    }
}
