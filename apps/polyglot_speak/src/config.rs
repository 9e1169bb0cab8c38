use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use polyglot_core::{ClientIdentity, ConfigError, RetryPolicy, SessionSettings};

use crate::cli::Cli;

/// High-level configuration for polyglot-speak
#[derive(Clone, Debug)]
pub struct PolyglotConfig {
    /// Language names; the CLI selection replaces these when given
    pub languages: Vec<String>,
    pub speech: SpeechConfig,
    pub client: ClientIdentity,
    pub retry: RetryConfig,
}

/// Speech Dispatcher connection and playback
#[derive(Clone, Debug)]
pub struct SpeechConfig {
    /// SSIP address; falls back to SPEECHD_ADDRESS, then the per-user socket
    pub address: Option<String>,
    pub output_module: String,
    /// Bound on each completion wait; unbounded when unset
    pub playback_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            address: None,
            output_module: "espeak-ng".to_string(),
            playback_timeout_ms: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 1_000,
        }
    }
}

impl Default for PolyglotConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            speech: SpeechConfig::default(),
            client: ClientIdentity {
                user: "polyglot-speak".into(),
                client: "polyglot-speak".into(),
                component: "polyglot-speak".into(),
            },
            retry: RetryConfig::default(),
        }
    }
}

/// Non-empty value of `key`, parsed. A value that does not parse is an error.
fn env_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidSetting {
                key: key.to_string(),
                message: format!("'{}': {}", v, e),
            }),
        None => Ok(None),
    }
}

impl PolyglotConfig {
    /// Built-in defaults overridden by environment variables
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(address) = env_value::<String>(&lookup, "SPEECHD_ADDRESS")? {
            cfg.speech.address = Some(address);
        }
        if let Some(module) = env_value::<String>(&lookup, "POLYGLOT_OUTPUT_MODULE")? {
            cfg.speech.output_module = module;
        }
        if let Some(ms) = env_value::<u64>(&lookup, "POLYGLOT_PLAYBACK_TIMEOUT_MS")? {
            cfg.speech.playback_timeout_ms = Some(ms);
        }
        if let Some(attempts) = env_value::<u32>(&lookup, "POLYGLOT_CONNECT_ATTEMPTS")? {
            cfg.retry.attempts = attempts;
        }
        if let Some(ms) = env_value::<u64>(&lookup, "POLYGLOT_RETRY_DELAY_MS")? {
            cfg.retry.delay_ms = ms;
        }
        Ok(cfg)
    }

    /// Load configuration from a TOML file, overlaying values onto the
    /// env-driven defaults. An explicit path must exist; the implicit one
    /// (POLYGLOT_CONFIG or ./polyglot.toml) may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let default = Self::from_env(|key| std::env::var(key).ok())?;
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (
                PathBuf::from(
                    std::env::var("POLYGLOT_CONFIG").unwrap_or_else(|_| "polyglot.toml".into()),
                ),
                false,
            ),
        };
        if !required && !path.exists() {
            tracing::debug!(target: "polyglot", path = %path.display(), "No TOML config found; using defaults/env");
            return Ok(default);
        }
        let s = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let t = toml::from_str::<PolyglotToml>(&s).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        tracing::info!(target: "polyglot", path = %path.display(), "Loaded TOML config");
        Ok(t.overlay(default))
    }

    /// Flags win over file and environment
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if !cli.use_languages.is_empty() {
            self.languages = cli.use_languages.clone();
        }
        if let Some(m) = &cli.output_module {
            self.speech.output_module = m.clone();
        }
        if let Some(a) = &cli.address {
            self.speech.address = Some(a.clone());
        }
        self
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            identity: self.client.clone(),
            output_module: self.speech.output_module.clone(),
        }
    }

    pub fn playback_timeout(&self) -> Option<Duration> {
        self.speech
            .playback_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PolyglotToml {
    pub languages: Option<Vec<String>>,
    pub speech: Option<SpeechToml>,
    pub client: Option<ClientToml>,
    pub retry: Option<RetryToml>,
}

impl PolyglotToml {
    fn overlay(self, mut base: PolyglotConfig) -> PolyglotConfig {
        if let Some(l) = self.languages {
            base.languages = l;
        }
        if let Some(s) = self.speech {
            s.apply(&mut base.speech);
        }
        if let Some(c) = self.client {
            c.apply(&mut base.client);
        }
        if let Some(r) = self.retry {
            r.apply(&mut base.retry);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SpeechToml {
    pub address: Option<String>,
    pub output_module: Option<String>,
    pub playback_timeout_ms: Option<u64>,
}
impl SpeechToml {
    fn apply(self, s: &mut SpeechConfig) {
        if let Some(x) = self.address {
            s.address = Some(x);
        }
        if let Some(x) = self.output_module {
            s.output_module = x;
        }
        if let Some(x) = self.playback_timeout_ms {
            s.playback_timeout_ms = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientToml {
    pub user: Option<String>,
    pub name: Option<String>,
    pub component: Option<String>,
}
impl ClientToml {
    fn apply(self, c: &mut ClientIdentity) {
        if let Some(x) = self.user {
            c.user = x;
        }
        if let Some(x) = self.name {
            c.client = x;
        }
        if let Some(x) = self.component {
            c.component = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryToml {
    pub attempts: Option<u32>,
    pub delay_ms: Option<u64>,
}
impl RetryToml {
    fn apply(self, r: &mut RetryConfig) {
        if let Some(x) = self.attempts {
            r.attempts = x;
        }
        if let Some(x) = self.delay_ms {
            r.delay_ms = x;
        }
    }
}
