//! Termination signal listener

use super::guard::SessionGuard;
use crate::session::SpeechSession;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// External termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
}

impl Termination {
    pub fn signal_number(&self) -> i32 {
        match self {
            Termination::Interrupt => 2,
            Termination::Terminate => 15,
        }
    }

    /// Conventional shell status for death by signal
    pub fn exit_code(&self) -> i32 {
        128 + self.signal_number()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Interrupt => "interrupt",
            Termination::Terminate => "terminate",
        }
    }

    /// Inverse of `as_str`; other release triggers map to `None`
    pub fn from_trigger(trigger: &str) -> Option<Self> {
        match trigger {
            "interrupt" => Some(Termination::Interrupt),
            "terminate" => Some(Termination::Terminate),
            _ => None,
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spawn the listener. When `trigger` yields a termination, the session is
/// released and `exit` is called with the matching status. A trigger that
/// yields `None` ends the listener without touching the session.
pub fn arm<S, F, X>(guard: Arc<SessionGuard<S>>, trigger: F, exit: X) -> JoinHandle<()>
where
    S: SpeechSession + 'static,
    F: Future<Output = Option<Termination>> + Send + 'static,
    X: FnOnce(i32) + Send + 'static,
{
    tokio::spawn(async move {
        let Some(termination) = trigger.await else {
            return;
        };
        warn!(
            target: "lifecycle",
            signal = termination.as_str(),
            "Termination requested, closing session"
        );
        guard.release(termination.as_str()).await;
        exit(termination.exit_code());
    })
}

/// First SIGINT or SIGTERM delivered to the process.
#[cfg(unix)]
pub fn termination_signals(
) -> std::io::Result<impl Future<Output = Option<Termination>> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            v = interrupt.recv() => v.map(|_| Termination::Interrupt),
            v = terminate.recv() => v.map(|_| Termination::Terminate),
        }
    })
}

#[cfg(not(unix))]
pub fn termination_signals(
) -> std::io::Result<impl Future<Output = Option<Termination>> + Send + 'static> {
    Ok(async { tokio::signal::ctrl_c().await.ok().map(|_| Termination::Interrupt) })
}
