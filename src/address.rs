//! Editor endpoint resolution.
//!
//! An address is either `host:port` with an all-digit port (TCP) or anything
//! else, which is taken as a Unix domain socket path or named pipe.
//!
//! The port must also fit in 16 bits. `host:99999` can never be a TCP
//! endpoint, so it is kept as a path: a socket file may legally carry that
//! name, and the editor is then started listening on exactly that path.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::nvim::NvimClient;

/// Environment variables consulted for the address, in priority order.
pub const ADDRESS_VARS: &[&str] = &["NVIM", "NVIM_LISTEN_ADDRESS"];

/// Variable the address is published under for a spawned editor.
pub const PUBLISH_VAR: &str = "NVIM_LISTEN_ADDRESS";

/// Fallback address when nothing else is configured.
#[cfg(windows)]
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6789";
#[cfg(not(windows))]
pub const DEFAULT_ADDRESS: &str = "/tmp/nvimsocket";

/// Where an editor listens for remote control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Socket(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Classify a raw address string.
    pub fn parse(address: &str) -> Self {
        if let Some((host, port)) = address.rsplit_once(':') {
            let numeric = !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit());
            if let (true, Ok(port)) = (numeric, port.parse::<u16>()) {
                return Self::Tcp {
                    host: host.to_string(),
                    port,
                };
            }
        }
        Self::Socket(PathBuf::from(address))
    }

    /// Resolve the address to use for this invocation.
    ///
    /// Order: explicit override, the `NVIM`/`NVIM_LISTEN_ADDRESS` variables
    /// (looked up through `env`), the configured address, the built-in default.
    pub fn resolve<F>(explicit: Option<&str>, configured: Option<&str>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = ADDRESS_VARS
            .iter()
            .filter_map(|&var| env(var))
            .find(|value| !value.is_empty());

        let address = explicit
            .map(str::to_string)
            .or(from_env)
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        tracing::debug!(address = %address, "Resolved address");
        Self::parse(&address)
    }

    /// Socket path, if this is a socket endpoint.
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Self::Socket(path) => Some(path),
            Self::Tcp { .. } => None,
        }
    }

    /// Pick an endpoint that a new editor can safely bind.
    ///
    /// A socket path that exists but accepts no connection is a leftover from
    /// a dead instance (or an unrelated file); a fresh sibling path is
    /// returned instead. Anything else is returned unchanged.
    pub fn sanitize(self) -> Self {
        match self {
            Self::Socket(ref path)
                if path.exists() && NvimClient::try_connect(&self).is_none() =>
            {
                let fresh = unique_sibling(path);
                tracing::info!(
                    stale = %path.display(),
                    fresh = %fresh.display(),
                    "Socket path is not a live socket, using a fresh one"
                );
                Self::Socket(fresh)
            }
            other => other,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(path) => write!(f, "{}", path.display()),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// `path` with a unique suffix appended to its file name.
fn unique_sibling(path: &Path) -> PathBuf {
    let token = ulid::Ulid::new().to_string().to_lowercase();
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{token}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            Endpoint::parse("127.0.0.1:6789"),
            Endpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 6789
            }
        );
        assert_eq!(
            Endpoint::parse("localhost:1"),
            Endpoint::Tcp {
                host: "localhost".to_string(),
                port: 1
            }
        );
    }

    #[test]
    fn test_parse_ipv6_splits_on_last_colon() {
        assert_eq!(
            Endpoint::parse("::1:6789"),
            Endpoint::Tcp {
                host: "::1".to_string(),
                port: 6789
            }
        );
    }

    #[test]
    fn test_out_of_range_port_is_a_path() {
        assert_eq!(
            Endpoint::parse("/run/nvim:70000"),
            Endpoint::Socket(PathBuf::from("/run/nvim:70000"))
        );
    }

    #[test]
    fn test_parse_socket() {
        for address in [
            "/tmp/nvimsocket",
            "relative/sock",
            "host:",
            "host:80a",
            "host:+80",
            "host:99999",
            r"\\.\pipe\nvim-1234-0",
        ] {
            assert_eq!(
                Endpoint::parse(address),
                Endpoint::Socket(PathBuf::from(address)),
                "{address}"
            );
        }
    }

    #[test]
    fn test_resolve_priority() {
        let env = |var: &str| match var {
            "NVIM" => Some("/run/nvim.sock".to_string()),
            "NVIM_LISTEN_ADDRESS" => Some("/tmp/legacy".to_string()),
            _ => None,
        };
        assert_eq!(
            Endpoint::resolve(Some("localhost:7777"), Some("/cfg"), env),
            Endpoint::parse("localhost:7777")
        );
        assert_eq!(
            Endpoint::resolve(None, Some("/cfg"), env),
            Endpoint::parse("/run/nvim.sock")
        );

        let legacy_only = |var: &str| (var == "NVIM_LISTEN_ADDRESS").then(|| "/tmp/legacy".to_string());
        assert_eq!(
            Endpoint::resolve(None, Some("/cfg"), legacy_only),
            Endpoint::parse("/tmp/legacy")
        );
        assert_eq!(
            Endpoint::resolve(None, Some("/cfg"), no_env),
            Endpoint::parse("/cfg")
        );
        assert_eq!(
            Endpoint::resolve(None, None, no_env),
            Endpoint::parse(DEFAULT_ADDRESS)
        );
    }

    #[test]
    fn test_resolve_skips_empty_env() {
        let env = |var: &str| match var {
            "NVIM" => Some(String::new()),
            "NVIM_LISTEN_ADDRESS" => Some("/tmp/legacy".to_string()),
            _ => None,
        };
        assert_eq!(Endpoint::resolve(None, None, env), Endpoint::parse("/tmp/legacy"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::parse("10.0.0.1:80").to_string(), "10.0.0.1:80");
        assert_eq!(Endpoint::parse("/tmp/x").to_string(), "/tmp/x");
    }

    #[test]
    fn test_sanitize_keeps_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::Socket(dir.path().join("nvimsocket"));
        assert_eq!(endpoint.clone().sanitize(), endpoint);
    }

    #[test]
    fn test_sanitize_keeps_tcp() {
        let endpoint = Endpoint::parse("127.0.0.1:1");
        assert_eq!(endpoint.clone().sanitize(), endpoint);
    }

    #[test]
    fn test_sanitize_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("nvimsocket");
        std::fs::write(&stale, b"not a socket").unwrap();

        let first = Endpoint::Socket(stale.clone()).sanitize();
        let second = Endpoint::Socket(stale.clone()).sanitize();

        let first = first.socket_path().unwrap().to_path_buf();
        let second = second.socket_path().unwrap().to_path_buf();
        assert_ne!(first, stale);
        assert_ne!(first, second);
        assert_eq!(first.parent(), stale.parent());
        assert!(!first.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_sanitize_keeps_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&path).unwrap();

        let endpoint = Endpoint::Socket(path);
        assert_eq!(endpoint.clone().sanitize(), endpoint);
    }
}
