//! Everything decided before the speech backend is contacted

use std::time::Duration;

use polyglot_backends::{Language, SsipAddress};
use polyglot_core::{ConfigError, LanguageSet, LanguageTable, RetryPolicy, SessionSettings};

use crate::config::PolyglotConfig;

#[derive(Debug)]
pub struct Startup {
    pub languages: LanguageSet<Language>,
    pub retry: RetryPolicy,
    pub address: SsipAddress,
    pub settings: SessionSettings,
    pub playback_timeout: Option<Duration>,
}

impl Startup {
    /// Validate the configuration. Any error here is fatal and happens
    /// before a connection is attempted.
    pub fn prepare(
        cfg: &PolyglotConfig,
        table: &LanguageTable<Language>,
    ) -> Result<Self, ConfigError> {
        tracing::debug!(target: "polyglot", languages = ?cfg.languages, "Trying to detect the following languages");
        let languages = table.resolve(&cfg.languages)?;
        Ok(Self {
            languages,
            retry: cfg.retry_policy()?,
            address: SsipAddress::resolve(cfg.speech.address.as_deref())?,
            settings: cfg.session_settings(),
            playback_timeout: cfg.playback_timeout(),
        })
    }
}
