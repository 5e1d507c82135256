use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(bspbar::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(bspbar::config::invalid))]
    Invalid { message: String },

    /// An option node was written without its argument, e.g. `monitor`
    #[error("Option `{field}` needs a value")]
    #[diagnostic(code(bspbar::config::missing_value))]
    MissingField { field: String },

    #[error("Cannot read config file {}", .path.display())]
    #[diagnostic(code(bspbar::config::io))]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
