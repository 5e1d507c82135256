//! bspwm socket path discovery
//!
//! bspwm listens on `$BSPWM_SOCKET` when set, otherwise on a path derived
//! from the X display it manages: `/tmp/bspwm{host}_{display}_{screen}-socket`.

use std::ffi::OsString;
use std::path::PathBuf;

use super::BspwmError;

/// Environment variable overriding the socket path
pub const BSPWM_SOCKET_ENV: &str = "BSPWM_SOCKET";

/// Environment variable holding the X display name
pub const DISPLAY_ENV: &str = "DISPLAY";

/// Prefix of the display-derived socket path
const SOCKET_PATH_PREFIX: &str = "/tmp/bspwm";

/// The (host, display, screen) triple of an X display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayId {
    pub host: String,
    pub display: u32,
    pub screen: u32,
}

impl DisplayId {
    /// The socket path bspwm uses for this display
    pub fn socket_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}{}_{}_{}-socket",
            SOCKET_PATH_PREFIX, self.host, self.display, self.screen
        ))
    }
}

/// Parse an X display name of the form `[protocol/][host]:display[.screen]`
///
/// The screen defaults to 0. Returns `None` when there is no `:`, or when
/// the display or screen number is missing or not numeric.
pub fn parse_display(name: &str) -> Option<DisplayId> {
    let colon = name.rfind(':')?;
    let (host, numbers) = (&name[..colon], &name[colon + 1..]);

    // Drop a `protocol/` prefix
    let host = host.rsplit_once('/').map_or(host, |(_, h)| h);

    let (display, screen) = match numbers.split_once('.') {
        Some((display, screen)) => (display, Some(screen)),
        None => (numbers, None),
    };

    let display = parse_number(display)?;
    let screen = match screen {
        Some(s) => parse_number(s)?,
        None => 0,
    };

    Some(DisplayId {
        host: host.to_string(),
        display,
        screen,
    })
}

fn parse_number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Source of the current display identity
///
/// Production code reads `$DISPLAY`; tests substitute fixed values.
pub trait DisplaySource {
    fn display_id(&self) -> Option<DisplayId>;
}

/// Reads the display name from `$DISPLAY`
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvDisplay;

impl DisplaySource for EnvDisplay {
    fn display_id(&self) -> Option<DisplayId> {
        std::env::var(DISPLAY_ENV).ok().as_deref().and_then(parse_display)
    }
}

impl DisplaySource for Option<DisplayId> {
    fn display_id(&self) -> Option<DisplayId> {
        self.clone()
    }
}

/// Resolve the socket path from an override or the display identity
///
/// An empty override counts as unset.
///
/// # Errors
///
/// Returns `BspwmError::SocketPathNotFound` if neither source yields a path.
pub fn resolve_socket_path<D: DisplaySource>(
    override_path: Option<OsString>,
    display: &D,
) -> Result<PathBuf, BspwmError> {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    display
        .display_id()
        .map(|id| id.socket_path())
        .ok_or(BspwmError::SocketPathNotFound)
}

/// Discover the bspwm socket path from the environment
///
/// `explicit` (for example from the config file) wins over `$BSPWM_SOCKET`,
/// which wins over `$DISPLAY`. The path is not required to exist yet;
/// the subscriber keeps retrying until the daemon creates it.
///
/// # Example
///
/// ```ignore
/// let socket_path = get_socket_path(None)?;
/// println!("bspwm socket at: {}", socket_path.display());
/// ```
pub fn get_socket_path(explicit: Option<PathBuf>) -> Result<PathBuf, BspwmError> {
    let override_path = explicit
        .map(OsString::from)
        .or_else(|| std::env::var_os(BSPWM_SOCKET_ENV));
    resolve_socket_path(override_path, &EnvDisplay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Environment variables are global state, so tests modifying them must not run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Run `f` with the given variables set (or removed), restoring them afterwards
    fn with_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let saved: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var_os(k))).collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_parse_local_display() {
        assert_eq!(
            parse_display(":0"),
            Some(DisplayId {
                host: String::new(),
                display: 0,
                screen: 0
            })
        );
    }

    #[test]
    fn test_parse_full_display() {
        assert_eq!(
            parse_display("tcp/remote:12.3"),
            Some(DisplayId {
                host: "remote".into(),
                display: 12,
                screen: 3
            })
        );
        assert_eq!(parse_display("unix:1").unwrap().host, "unix");
    }

    #[test]
    fn test_parse_invalid_displays() {
        assert_eq!(parse_display(""), None);
        assert_eq!(parse_display("localhost"), None);
        assert_eq!(parse_display(":"), None);
        assert_eq!(parse_display(":x"), None);
        assert_eq!(parse_display(":0."), None);
        assert_eq!(parse_display(":0.a"), None);
    }

    #[test]
    fn test_display_socket_path_format() {
        let id = DisplayId {
            host: String::new(),
            display: 1,
            screen: 0,
        };
        assert_eq!(id.socket_path(), PathBuf::from("/tmp/bspwm_1_0-socket"));
    }

    #[test]
    fn test_override_wins_over_display() {
        let display = Some(DisplayId {
            host: String::new(),
            display: 0,
            screen: 0,
        });
        let path = resolve_socket_path(Some("/run/user/1000/bspwm.sock".into()), &display).unwrap();
        assert_eq!(path, PathBuf::from("/run/user/1000/bspwm.sock"));
    }

    #[test]
    fn test_empty_override_falls_back_to_display() {
        let display = Some(DisplayId {
            host: "box".into(),
            display: 2,
            screen: 1,
        });
        let path = resolve_socket_path(Some(OsString::new()), &display).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/bspwmbox_2_1-socket"));
    }

    #[test]
    fn test_no_source_is_fatal() {
        let err = resolve_socket_path(None, &None::<DisplayId>).unwrap_err();
        assert!(matches!(err, BspwmError::SocketPathNotFound));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_env_socket_variable() {
        let path = with_env(
            &[
                (BSPWM_SOCKET_ENV, Some("/tmp/custom-bspwm-socket")),
                (DISPLAY_ENV, Some(":9")),
            ],
            || get_socket_path(None),
        );
        assert_eq!(path.unwrap(), PathBuf::from("/tmp/custom-bspwm-socket"));
    }

    #[test]
    fn test_env_display_variable() {
        let path = with_env(
            &[(BSPWM_SOCKET_ENV, None), (DISPLAY_ENV, Some(":1.0"))],
            || get_socket_path(None),
        );
        assert_eq!(path.unwrap(), PathBuf::from("/tmp/bspwm_1_0-socket"));
    }

    #[test]
    fn test_explicit_path_beats_env() {
        let path = with_env(
            &[(BSPWM_SOCKET_ENV, Some("/tmp/from-env"))],
            || get_socket_path(Some(PathBuf::from("/tmp/from-config"))),
        );
        assert_eq!(path.unwrap(), PathBuf::from("/tmp/from-config"));
    }

    #[test]
    fn test_env_nothing_set() {
        let result = with_env(&[(BSPWM_SOCKET_ENV, None), (DISPLAY_ENV, None)], || {
            get_socket_path(None)
        });
        assert!(matches!(result, Err(BspwmError::SocketPathNotFound)));
    }
}
