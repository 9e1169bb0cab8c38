//! Scoped ownership of the speech session.
//!
//! The guard moves Active → Closing → Closed exactly once. Whichever caller
//! wins the Active → Closing transition performs the close; every other
//! caller waits for Closed and returns without touching the session.

use super::signal::Termination;
use crate::session::SpeechSession;
use crate::PolyglotError;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Active,
    Closing,
    Closed,
}

pub struct SessionGuard<S: SpeechSession> {
    session: Arc<S>,
    state: watch::Sender<GuardState>,
    closed_by: OnceLock<String>,
}

impl<S: SpeechSession + 'static> SessionGuard<S> {
    pub fn new(session: S) -> Arc<Self> {
        let (state, _) = watch::channel(GuardState::Active);
        Arc::new(Self {
            session: Arc::new(session),
            state,
            closed_by: OnceLock::new(),
        })
    }

    /// Shared handle for the pipeline. Never close through it directly.
    pub fn session(&self) -> Arc<S> {
        Arc::clone(&self.session)
    }

    pub fn state(&self) -> GuardState {
        *self.state.borrow()
    }

    /// Trigger of the release that performed the close
    pub fn closed_by(&self) -> Option<&str> {
        self.closed_by.get().map(String::as_str)
    }

    /// Set once a termination signal won the release
    pub fn terminated_by(&self) -> Option<Termination> {
        self.closed_by().and_then(Termination::from_trigger)
    }

    /// Close the session unless another path already did.
    ///
    /// Returns `true` if this call performed the close. A losing caller
    /// returns `false` once the winner has finished closing.
    pub async fn release(&self, trigger: &str) -> bool {
        let won = self.state.send_if_modified(|state| {
            if *state == GuardState::Active {
                *state = GuardState::Closing;
                true
            } else {
                false
            }
        });

        if !won {
            debug!(target: "lifecycle", trigger, "Session already released by another path");
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|state| *state == GuardState::Closed).await;
            return false;
        }

        let _ = self.closed_by.set(trigger.to_string());
        info!(target: "lifecycle", trigger, "Closing speech session");
        if let Err(e) = self.session.close().await {
            error!(
                target: "lifecycle",
                trigger,
                error_code = e.code(),
                error = %e,
                "Closing speech session failed"
            );
        }
        self.state.send_replace(GuardState::Closed);
        true
    }

    /// Run `work` while holding the session, then release it.
    ///
    /// The work runs as its own task so a panic is reported as a fault
    /// instead of skipping the release. Work that failed because a
    /// termination signal closed the session underneath it reports
    /// `Terminated`.
    pub async fn scope<F, T, E>(self: &Arc<Self>, work: F) -> Result<T, PolyglotError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<PolyglotError> + Send + 'static,
    {
        let outcome = tokio::spawn(work).await;
        let trigger = match &outcome {
            Ok(Ok(_)) => "completed",
            Ok(Err(_)) => "error",
            Err(_) => "fault",
        };
        let released = self.release(trigger).await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let e: PolyglotError = e.into();
                match self.terminated_by() {
                    Some(termination) if !released => {
                        debug!(target: "lifecycle", error = %e, "Work ended by termination");
                        Err(PolyglotError::Terminated(termination))
                    }
                    _ => Err(e),
                }
            }
            Err(e) => Err(PolyglotError::Fault(describe_join_error(e))),
        }
    }
}

impl<S: SpeechSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if *self.state.borrow() == GuardState::Active {
            error!(target: "lifecycle", "Session guard dropped while session still open");
        }
    }
}

fn describe_join_error(e: JoinError) -> String {
    if e.is_cancelled() {
        return "task cancelled".to_string();
    }
    let payload = e.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else {
        "panic".to_string()
    }
}
