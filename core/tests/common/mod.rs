//! Recording fakes shared by the core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use polyglot_core::{
    BackendError, ClientIdentity, Connector, Playback, PlaybackOutcome, SpeechSession,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ClientName(String),
    OutputModule(String),
    Notifications(bool),
    Language(String),
    Speak(String),
    Waited(String),
    Close,
}

#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
}

impl Recorder {
    pub fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| f(c)).count()
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

/// Flips to true when the fake session is closed
#[derive(Debug)]
pub struct ClosedFlag(watch::Sender<bool>);

impl Default for ClosedFlag {
    fn default() -> Self {
        Self(watch::channel(false).0)
    }
}

/// Session that records every call. Failures can be injected per operation.
#[derive(Debug, Default)]
pub struct FakeSession {
    pub recorder: Arc<Recorder>,
    pub closed: Arc<ClosedFlag>,
    pub reject_language: Option<String>,
    pub fail_speak: bool,
    pub fail_output_module: bool,
    pub playback_delay: Duration,
    /// When set, waits only end when the session is closed, with `Closed`
    pub hang_playback: bool,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recorder(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            ..Default::default()
        }
    }
}

pub struct FakePlayback {
    text: String,
    recorder: Arc<Recorder>,
    delay: Duration,
    hang: bool,
    closed: Arc<ClosedFlag>,
}

#[async_trait]
impl Playback for FakePlayback {
    async fn wait(self) -> Result<PlaybackOutcome, BackendError> {
        if self.hang {
            let mut closed = self.closed.0.subscribe();
            let _ = closed.wait_for(|closed| *closed).await;
            return Err(BackendError::Closed);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.recorder.in_flight.store(false, Ordering::SeqCst);
        self.recorder.push(Call::Waited(self.text));
        Ok(PlaybackOutcome::Completed)
    }
}

#[async_trait]
impl SpeechSession for FakeSession {
    type Playback = FakePlayback;

    async fn set_client_name(&self, identity: &ClientIdentity) -> Result<(), BackendError> {
        self.recorder.push(Call::ClientName(format!(
            "{}:{}:{}",
            identity.user, identity.client, identity.component
        )));
        Ok(())
    }

    async fn set_output_module(&self, module: &str) -> Result<(), BackendError> {
        self.recorder.push(Call::OutputModule(module.to_string()));
        if self.fail_output_module {
            return Err(BackendError::Rejected {
                command: format!("SET SELF OUTPUT_MODULE {}", module),
                code: 300,
                message: "ERR INTERNAL".into(),
            });
        }
        Ok(())
    }

    async fn set_event_notifications(&self, enabled: bool) -> Result<(), BackendError> {
        self.recorder.push(Call::Notifications(enabled));
        Ok(())
    }

    async fn set_language(&self, code: &str) -> Result<(), BackendError> {
        self.recorder.push(Call::Language(code.to_string()));
        if self.reject_language.as_deref() == Some(code) {
            return Err(BackendError::Rejected {
                command: format!("SET SELF LANGUAGE {}", code),
                code: 410,
                message: "ERR INVALID PARAMETER".into(),
            });
        }
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<FakePlayback, BackendError> {
        self.recorder.push(Call::Speak(text.to_string()));
        if self.fail_speak {
            return Err(BackendError::Closed);
        }
        if self.recorder.in_flight.swap(true, Ordering::SeqCst) {
            self.recorder.overlapped.store(true, Ordering::SeqCst);
        }
        Ok(FakePlayback {
            text: text.to_string(),
            recorder: Arc::clone(&self.recorder),
            delay: self.playback_delay,
            hang: self.hang_playback,
            closed: Arc::clone(&self.closed),
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.recorder.push(Call::Close);
        self.closed.0.send_replace(true);
        Ok(())
    }
}

/// Connector that fails a fixed number of times before succeeding
pub struct FlakyConnector {
    failures_left: AtomicUsize,
    pub opens: Mutex<Vec<Instant>>,
}

impl FlakyConnector {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            opens: Mutex::new(Vec::new()),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn gaps(&self) -> Vec<Duration> {
        let opens = self.opens.lock().unwrap();
        opens.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, BackendError> {
        self.opens.lock().unwrap().push(Instant::now());
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "speechd not ready",
            )));
        }
        Ok(FakeSession::new())
    }
}

/// Reader that yields `data`, then fails instead of reporting end-of-stream
pub struct FailAfter {
    data: Vec<u8>,
    pos: usize,
}

impl FailAfter {
    pub fn new(data: &str) -> Self {
        Self {
            data: data.as_bytes().to_vec(),
            pos: 0,
        }
    }
}

impl tokio::io::AsyncRead for FailAfter {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        if self.pos >= self.data.len() {
            return std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin went away",
            )));
        }
        let n = buf.remaining().min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        std::task::Poll::Ready(Ok(()))
    }
}
