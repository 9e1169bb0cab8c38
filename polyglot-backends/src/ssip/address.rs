//! Where to find the Speech Dispatcher socket
//!
//! Accepted forms, as in `SPEECHD_ADDRESS`:
//! - `unix_socket:/run/user/1000/speech-dispatcher/speechd.sock`
//! - `inet_socket:127.0.0.1:6560` (port optional)

use polyglot_core::ConfigError;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_INET_PORT: u16 = 6560;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsipAddress {
    Unix(PathBuf),
    Inet { host: String, port: u16 },
}

impl SsipAddress {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidSetting {
            key: "speech.address".into(),
            message: format!("{} ({})", message, s),
        };

        if let Some(path) = s.strip_prefix("unix_socket:") {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(SsipAddress::Unix(PathBuf::from(path)));
        }
        if let Some(rest) = s.strip_prefix("inet_socket:") {
            let (host, port) = match rest.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
                    (host, port)
                }
                None => (rest, DEFAULT_INET_PORT),
            };
            if host.is_empty() {
                return Err(invalid("empty host"));
            }
            return Ok(SsipAddress::Inet {
                host: host.to_string(),
                port,
            });
        }
        Err(invalid("expected unix_socket:<path> or inet_socket:<host>[:<port>]"))
    }

    /// Explicit address, else `SPEECHD_ADDRESS`, else the per-user socket
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(s) = explicit.filter(|s| !s.is_empty()) {
            return Self::parse(s);
        }
        match std::env::var("SPEECHD_ADDRESS") {
            Ok(s) if !s.is_empty() => Self::parse(&s),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for SsipAddress {
    fn default() -> Self {
        let base = std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))
            .unwrap_or_else(std::env::temp_dir);
        SsipAddress::Unix(base.join("speech-dispatcher").join("speechd.sock"))
    }
}

impl fmt::Display for SsipAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsipAddress::Unix(path) => write!(f, "unix_socket:{}", path.display()),
            SsipAddress::Inet { host, port } => write!(f, "inet_socket:{}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_socket() {
        assert_eq!(
            SsipAddress::parse("unix_socket:/tmp/speechd.sock").unwrap(),
            SsipAddress::Unix(PathBuf::from("/tmp/speechd.sock"))
        );
    }

    #[test]
    fn test_parse_inet_socket_with_and_without_port() {
        assert_eq!(
            SsipAddress::parse("inet_socket:localhost:7000").unwrap(),
            SsipAddress::Inet {
                host: "localhost".into(),
                port: 7000
            }
        );
        assert_eq!(
            SsipAddress::parse("inet_socket:10.0.0.2").unwrap(),
            SsipAddress::Inet {
                host: "10.0.0.2".into(),
                port: DEFAULT_INET_PORT
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SsipAddress::parse("tcp://localhost").is_err());
        assert!(SsipAddress::parse("unix_socket:").is_err());
        assert!(SsipAddress::parse("inet_socket:host:notaport").is_err());
    }

    #[test]
    fn test_explicit_address_wins() {
        let addr = SsipAddress::resolve(Some("inet_socket:speech:1234")).unwrap();
        assert_eq!(addr.to_string(), "inet_socket:speech:1234");
    }

    #[test]
    fn test_default_is_speechd_socket() {
        match SsipAddress::default() {
            SsipAddress::Unix(path) => assert!(path.ends_with("speech-dispatcher/speechd.sock")),
            other => panic!("unexpected default {other:?}"),
        }
    }
}
