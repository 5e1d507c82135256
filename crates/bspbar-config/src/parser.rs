//! KDL configuration parser

use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content)
}

/// Parse the configuration file, falling back to defaults if it does not exist
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl uses an older miette version, so we need to extract offset/len manually
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "bspwm" => {
                config.bspwm = parse_bspwm(node)?;
            }
            "panel" => {
                config.panel = parse_panel(node)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    global.log_level = string_value(child)?
                        .parse()
                        .map_err(|message| ConfigError::Invalid { message })?;
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_bspwm(node: &kdl::KdlNode) -> Result<BspwmConfig, ConfigError> {
    let mut bspwm = BspwmConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "socket-path" => {
                    let path = string_value(child)?;
                    bspwm.socket_path = Some(shellexpand::tilde(path).into_owned().into());
                }
                "retry-initial-ms" => {
                    bspwm.retry_initial_ms = positive_value(child)?;
                }
                "retry-max-ms" => {
                    bspwm.retry_max_ms = positive_value(child)?;
                }
                "max-retries" => {
                    let retries = integer_value(child)?;
                    bspwm.max_retries = Some(u32::try_from(retries).map_err(|_| {
                        ConfigError::Invalid {
                            message: format!("max-retries must fit in 32 bits, got {}", retries),
                        }
                    })?);
                }
                "channel-buffer" => {
                    bspwm.channel_buffer = positive_value(child)? as usize;
                }
                name => {
                    tracing::warn!("Unknown bspwm config option: {}", name);
                }
            }
        }
    }

    if bspwm.retry_max_ms < bspwm.retry_initial_ms {
        return Err(ConfigError::Invalid {
            message: format!(
                "retry-max-ms ({}) must not be smaller than retry-initial-ms ({})",
                bspwm.retry_max_ms, bspwm.retry_initial_ms
            ),
        });
    }

    Ok(bspwm)
}

fn parse_panel(node: &kdl::KdlNode) -> Result<PanelConfig, ConfigError> {
    let mut panel = PanelConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "monitor" => {
                    panel.monitor = Some(string_value(child)?.to_string());
                }
                "hide-on-fullscreen" => {
                    panel.hide_on_fullscreen = bool_value(child)?;
                }
                name => {
                    tracing::warn!("Unknown panel config option: {}", name);
                }
            }
        }
    }

    Ok(panel)
}

fn first_value<'a>(node: &'a kdl::KdlNode) -> Result<&'a kdl::KdlValue, ConfigError> {
    node.entries()
        .first()
        .map(|e| e.value())
        .ok_or_else(|| ConfigError::MissingField {
            field: node.name().value().to_string(),
        })
}

fn string_value(node: &kdl::KdlNode) -> Result<&str, ConfigError> {
    first_value(node)?
        .as_string()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects a string", node.name().value()),
        })
}

fn integer_value(node: &kdl::KdlNode) -> Result<u64, ConfigError> {
    let value = first_value(node)?
        .as_i64()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects an integer", node.name().value()),
        })?;
    u64::try_from(value).map_err(|_| ConfigError::Invalid {
        message: format!("`{}` must not be negative, got {}", node.name().value(), value),
    })
}

fn positive_value(node: &kdl::KdlNode) -> Result<u64, ConfigError> {
    match integer_value(node)? {
        0 => Err(ConfigError::Invalid {
            message: format!("`{}` must be greater than zero", node.name().value()),
        }),
        value => Ok(value),
    }
}

fn bool_value(node: &kdl::KdlNode) -> Result<bool, ConfigError> {
    first_value(node)?
        .as_bool()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects true or false", node.name().value()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            global {
                log-level "debug"
            }
            bspwm {
                socket-path "/tmp/bspwm_0_0-socket"
                retry-initial-ms 250
                retry-max-ms 4000
                max-retries 8
                channel-buffer 16
            }
            panel {
                monitor "HDMI-1"
                hide-on-fullscreen false
            }
        "#;

        let config = parse_config_str(config).unwrap();
        assert_eq!(config.global.log_level, LogLevel::Debug);
        assert_eq!(
            config.bspwm,
            BspwmConfig {
                socket_path: Some(PathBuf::from("/tmp/bspwm_0_0-socket")),
                retry_initial_ms: 250,
                retry_max_ms: 4000,
                max_retries: Some(8),
                channel_buffer: 16,
            }
        );
        assert_eq!(config.panel.monitor.as_deref(), Some("HDMI-1"));
        assert!(!config.panel.hide_on_fullscreen);
    }

    #[test]
    fn test_minimal_valid_config() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.panel.hide_on_fullscreen);
        assert_eq!(config.bspwm.max_retries, None);
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            theme "dark"
            bspwm {
                colour "red"
            }
        "#;
        assert_eq!(parse_config_str(config).unwrap(), Config::default());
    }

    #[test]
    fn test_kdl_syntax_error() {
        let result = parse_config_str("bspwm {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_zero_retry_delay_rejected() {
        let config = r#"
            bspwm {
                retry-initial-ms 0
            }
        "#;
        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::Invalid { message } => assert!(message.contains("retry-initial-ms")),
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_negative_value_rejected() {
        let config = r#"
            bspwm {
                max-retries -1
            }
        "#;
        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_max_below_initial_rejected() {
        let config = r#"
            bspwm {
                retry-initial-ms 5000
                retry-max-ms 1000
            }
        "#;
        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_value_reported() {
        let config = r#"
            panel {
                monitor
            }
        "#;
        match parse_config_str(config).unwrap_err() {
            ConfigError::MissingField { field } => assert_eq!(field, "monitor"),
            other => panic!("Expected MissingField error, got: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_value_type() {
        let config = r#"
            panel {
                hide-on-fullscreen "yes"
            }
        "#;
        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_unknown_log_level() {
        let config = r#"
            global {
                log-level "loud"
            }
        "#;
        match parse_config_str(config).unwrap_err() {
            ConfigError::Invalid { message } => assert!(message.contains("loud")),
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_tilde_expansion_in_socket_path() {
        let config = r#"
            bspwm {
                socket-path "~/.cache/bspwm.sock"
            }
        "#;
        let config = parse_config_str(config).unwrap();
        let path = config.bspwm.socket_path.unwrap();
        assert!(
            !path.to_string_lossy().starts_with('~'),
            "tilde should be expanded: {}",
            path.display()
        );
        assert!(path.ends_with(".cache/bspwm.sock"));
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.kdl")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "global { log-level \"warn\"; }").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.global.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_parse_config_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.kdl");
        match parse_config(&path).unwrap_err() {
            ConfigError::Io { path: p, .. } => assert_eq!(p, path),
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }
}
