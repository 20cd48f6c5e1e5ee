//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/nvr/config.toml` (XDG) or platform config dir
//! 2. Environment variables: `NVR_*`
//!
//! ```toml
//! # Command used to start a new editor when none is reachable.
//! cmd = "nvim --cmd 'let g:remote = 1'"
//! # Address used when neither --servername, $NVIM nor $NVIM_LISTEN_ADDRESS is set.
//! servername = "/run/user/1000/nvimsocket"
//! attach_attempts = 10
//! attach_delay_ms = 200
//! ```
//!
//! `NVR_CMD` keeps its historical meaning: `NVR_CMD="nvim -n" nvr file`.

use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Editor started when nothing is configured.
pub const DEFAULT_EDITOR: &str = "nvim";

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Editor launch command, split on whitespace.
    #[serde(default)]
    pub cmd: Option<String>,
    /// Address to fall back on before the built-in default.
    #[serde(default)]
    pub servername: Option<String>,
    /// How often to try attaching to a freshly spawned editor.
    pub attach_attempts: u32,
    /// Pause between attach attempts.
    pub attach_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cmd: None,
            servername: None,
            attach_attempts: 10,
            attach_delay_ms: 200,
        }
    }
}

impl Config {
    /// Load config with layered resolution (defaults → user → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(Self::user_config_path())
            .extract()
            .map_err(ConfigError::from)
    }

    /// The layered figment, with the user config read from `user_config`.
    pub fn figment(user_config: PathBuf) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            // Layer 1: User config
            .merge(Toml::file(user_config))
            // Layer 2: Environment variables (highest priority)
            .merge(Env::prefixed("NVR_"))
    }

    /// Editor program and arguments, before the `--listen` address is added.
    ///
    /// `cmd` is split with shell quoting rules.
    pub fn editor_command(&self) -> Result<Vec<String>, ConfigError> {
        let cmd = self.cmd.as_deref().unwrap_or_default();
        let args = shell_words::split(cmd)
            .map_err(|e| figment::Error::from(format!("invalid cmd `{cmd}`: {e}")))?;

        if args.is_empty() {
            Ok(vec![DEFAULT_EDITOR.to_string()])
        } else {
            Ok(args)
        }
    }

    pub fn attach_delay(&self) -> Duration {
        Duration::from_millis(self.attach_delay_ms)
    }

    /// User config path: ~/.config/nvr/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("nvr").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("nvr").join("config.toml"))
            .unwrap_or_default()
    }
}
