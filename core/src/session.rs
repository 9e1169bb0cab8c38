//! Speech session contract
//!
//! A session is one live connection to a speech-output backend. All
//! operations take `&self` so the lifecycle guard can close the session
//! while the pipeline is suspended waiting for playback.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{command}' rejected with {code}: {message}")]
    Rejected {
        command: String,
        code: u16,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Session closed")]
    Closed,
}

impl BackendError {
    /// Convert to error code string
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Rejected { .. } => "REJECTED",
            BackendError::Protocol(_) => "PROTOCOL_ERROR",
            BackendError::Closed => "CLOSED",
        }
    }
}

/// How an utterance finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
}

/// Handle to one in-flight utterance
#[async_trait]
pub trait Playback: Send {
    /// Suspend until the backend reports the utterance finished
    async fn wait(self) -> Result<PlaybackOutcome, BackendError>;
}

/// Identity reported to the backend as `user:client:component`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user: String,
    pub client: String,
    pub component: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            user: "polyglot".to_string(),
            client: "polyglot".to_string(),
            component: "main".to_string(),
        }
    }
}

#[async_trait]
pub trait SpeechSession: Send + Sync {
    type Playback: Playback + 'static;

    async fn set_client_name(&self, identity: &ClientIdentity) -> Result<(), BackendError>;

    async fn set_output_module(&self, module: &str) -> Result<(), BackendError>;

    async fn set_event_notifications(&self, enabled: bool) -> Result<(), BackendError>;

    /// Switch the active output language (ISO 639-1 code)
    async fn set_language(&self, code: &str) -> Result<(), BackendError>;

    async fn speak(&self, text: &str) -> Result<Self::Playback, BackendError>;

    async fn close(&self) -> Result<(), BackendError>;
}

/// Opens sessions against a backend; one call is one connection attempt
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: SpeechSession + 'static;

    async fn open(&self) -> Result<Self::Session, BackendError>;
}

/// Session setup applied once after connecting
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub identity: ClientIdentity,
    pub output_module: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            identity: ClientIdentity::default(),
            output_module: "espeak-ng".to_string(),
        }
    }
}

/// Configure identity and output module, then enable event notifications so
/// playback completion can be awaited.
pub async fn prepare_session<S: SpeechSession>(
    session: &S,
    settings: &SessionSettings,
) -> Result<(), BackendError> {
    session.set_client_name(&settings.identity).await?;
    session.set_output_module(&settings.output_module).await?;
    session.set_event_notifications(true).await?;
    info!(
        target: "session",
        client = %settings.identity.client,
        module = %settings.output_module,
        "Session configured"
    );
    Ok(())
}
