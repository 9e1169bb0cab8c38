//! SSIP session
//!
//! One background task reads the socket. Command replies are forwarded to
//! whoever holds the conversation lock; 7xx events complete playback
//! handles by message id.

use super::address::SsipAddress;
use super::reply::{encode_payload, Event, Reply, ReplyAssembler};
use async_trait::async_trait;
use polyglot_core::{
    BackendError, ClientIdentity, Connector, Playback, PlaybackOutcome, SpeechSession,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, trace, warn};

/// Upper bound on the polite QUIT exchange during close
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Conversation {
    writer: Writer,
    replies: mpsc::UnboundedReceiver<Reply>,
}

impl Conversation {
    async fn send_raw(&mut self, data: &str) -> Result<(), BackendError> {
        self.writer.write_all(data.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), BackendError> {
        trace!(target: "ssip", command = %line, "Sending command");
        self.send_raw(&format!("{}\r\n", line)).await
    }

    async fn recv(&mut self) -> Result<Reply, BackendError> {
        self.replies.recv().await.ok_or(BackendError::Closed)
    }

    async fn exchange(&mut self, command: &str) -> Result<Reply, BackendError> {
        self.send_line(command).await?;
        self.recv().await?.check(command)
    }
}

/// Message id → waiter. Events that arrive before their waiter registers are
/// parked in `finished`.
#[derive(Default)]
struct PlaybackRegistry {
    waiting: HashMap<u64, oneshot::Sender<PlaybackOutcome>>,
    finished: HashMap<u64, PlaybackOutcome>,
    closed: bool,
}

impl PlaybackRegistry {
    fn register(&mut self, msg_id: u64) -> oneshot::Receiver<PlaybackOutcome> {
        let (tx, rx) = oneshot::channel();
        if let Some(outcome) = self.finished.remove(&msg_id) {
            let _ = tx.send(outcome);
        } else if !self.closed {
            self.waiting.insert(msg_id, tx);
        }
        rx
    }

    fn complete(&mut self, msg_id: u64, outcome: PlaybackOutcome) {
        match self.waiting.remove(&msg_id) {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => {
                self.finished.insert(msg_id, outcome);
            }
        }
    }

    /// Drop every waiter so pending waits fail with `Closed`
    fn fail_all(&mut self) {
        self.closed = true;
        self.waiting.clear();
    }
}

pub struct SsipSession {
    conversation: Mutex<Option<Conversation>>,
    playback: Arc<Mutex<PlaybackRegistry>>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SsipSession {
    /// Open a session on `address`
    pub async fn connect(address: &SsipAddress) -> Result<Self, BackendError> {
        debug!(target: "ssip", address = %address, "Opening Speech Dispatcher socket");
        match address {
            SsipAddress::Inet { host, port } => {
                let stream = tokio::net::TcpStream::connect((host.as_str(), *port)).await?;
                Ok(Self::from_stream(stream))
            }
            #[cfg(unix)]
            SsipAddress::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok(Self::from_stream(stream))
            }
            #[cfg(not(unix))]
            SsipAddress::Unix(_) => Err(BackendError::Protocol(
                "unix sockets are not supported on this platform".into(),
            )),
        }
    }

    /// Run the protocol over an already connected stream
    pub fn from_stream<T>(stream: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let playback = Arc::new(Mutex::new(PlaybackRegistry::default()));
        let reader = tokio::spawn(read_loop(read_half, reply_tx, Arc::clone(&playback)));

        Self {
            conversation: Mutex::new(Some(Conversation {
                writer: Box::new(write_half),
                replies: reply_rx,
            })),
            playback,
            reader: std::sync::Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        }
    }

    async fn command(&self, command: &str) -> Result<Reply, BackendError> {
        let mut guard = self.conversation.lock().await;
        let conversation = guard.as_mut().ok_or(BackendError::Closed)?;
        conversation.exchange(command).await
    }

    fn stop_reader(&self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

fn check_token(part: &str) -> Result<&str, BackendError> {
    if part.is_empty() || part.contains(':') || part.chars().any(char::is_whitespace) {
        return Err(BackendError::Protocol(format!(
            "invalid client name component '{}'",
            part
        )));
    }
    Ok(part)
}

#[async_trait]
impl SpeechSession for SsipSession {
    type Playback = SsipPlayback;

    async fn set_client_name(&self, identity: &ClientIdentity) -> Result<(), BackendError> {
        let command = format!(
            "SET SELF CLIENT_NAME {}:{}:{}",
            check_token(&identity.user)?,
            check_token(&identity.client)?,
            check_token(&identity.component)?
        );
        self.command(&command).await.map(|_| ())
    }

    async fn set_output_module(&self, module: &str) -> Result<(), BackendError> {
        self.command(&format!("SET SELF OUTPUT_MODULE {}", module))
            .await
            .map(|_| ())
    }

    async fn set_event_notifications(&self, enabled: bool) -> Result<(), BackendError> {
        let state = if enabled { "on" } else { "off" };
        self.command(&format!("SET SELF NOTIFICATION ALL {}", state))
            .await
            .map(|_| ())
    }

    async fn set_language(&self, code: &str) -> Result<(), BackendError> {
        self.command(&format!("SET SELF LANGUAGE {}", code))
            .await
            .map(|_| ())
    }

    async fn speak(&self, text: &str) -> Result<SsipPlayback, BackendError> {
        let msg_id = {
            let mut guard = self.conversation.lock().await;
            let conversation = guard.as_mut().ok_or(BackendError::Closed)?;

            let ready = conversation.exchange("SPEAK").await?;
            if ready.code != 230 {
                return Err(BackendError::Protocol(format!(
                    "expected 230 after SPEAK, got {} {}",
                    ready.code, ready.message
                )));
            }
            conversation.send_raw(&encode_payload(text)).await?;
            let queued = conversation.recv().await?.check("SPEAK")?;
            queued
                .data
                .first()
                .and_then(|id| id.trim().parse::<u64>().ok())
                .ok_or_else(|| BackendError::Protocol("SPEAK reply missing message id".into()))?
        };

        trace!(target: "ssip", msg_id, "Message queued");
        let done = self.playback.lock().await.register(msg_id);
        Ok(SsipPlayback { msg_id, done })
    }

    async fn close(&self) -> Result<(), BackendError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let conversation = match timeout(QUIT_TIMEOUT, self.conversation.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let quit = match conversation {
            Some(mut conversation) => {
                let result = match timeout(QUIT_TIMEOUT, conversation.exchange("QUIT")).await {
                    Ok(result) => result.map(|_| ()),
                    Err(_) => Err(BackendError::Protocol("QUIT timed out".into())),
                };
                let _ = conversation.writer.shutdown().await;
                result
            }
            None => {
                warn!(target: "ssip", "Conversation busy, closing without QUIT");
                Ok(())
            }
        };

        self.stop_reader();
        self.playback.lock().await.fail_all();
        debug!(target: "ssip", "Session closed");
        quit
    }
}

impl Drop for SsipSession {
    fn drop(&mut self) {
        // Can't QUIT here; dropping the socket ends the session server-side
        self.stop_reader();
    }
}

/// Completion handle for one queued message
pub struct SsipPlayback {
    msg_id: u64,
    done: oneshot::Receiver<PlaybackOutcome>,
}

impl SsipPlayback {
    pub fn msg_id(&self) -> u64 {
        self.msg_id
    }
}

#[async_trait]
impl Playback for SsipPlayback {
    async fn wait(self) -> Result<PlaybackOutcome, BackendError> {
        self.done.await.map_err(|_| BackendError::Closed)
    }
}

async fn read_loop<R>(
    read_half: R,
    replies: mpsc::UnboundedSender<Reply>,
    playback: Arc<Mutex<PlaybackRegistry>>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(read_half).lines();
    let mut assembler = ReplyAssembler::default();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target: "ssip", "Speech Dispatcher closed the connection");
                break;
            }
            Err(e) => {
                warn!(target: "ssip", error = %e, "Socket read failed");
                break;
            }
        };

        let reply = match assembler.push(line.trim_end_matches('\r')) {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(e) => {
                warn!(target: "ssip", error = %e, "Discarding malformed reply");
                continue;
            }
        };

        if reply.is_event() {
            match Event::from_reply(&reply) {
                Ok(event) => {
                    trace!(
                        target: "ssip",
                        kind = ?event.kind,
                        msg_id = event.msg_id,
                        client_id = event.client_id,
                        "Event"
                    );
                    if let Some(outcome) = event.kind.outcome() {
                        playback.lock().await.complete(event.msg_id, outcome);
                    }
                }
                Err(e) => warn!(target: "ssip", error = %e, "Ignoring malformed event"),
            }
        } else if replies.send(reply).is_err() {
            break;
        }
    }

    playback.lock().await.fail_all();
}

/// Opens SSIP sessions on a fixed address
#[derive(Debug, Clone)]
pub struct SsipConnector {
    address: SsipAddress,
}

impl SsipConnector {
    pub fn new(address: SsipAddress) -> Self {
        Self { address }
    }
}

#[async_trait]
impl Connector for SsipConnector {
    type Session = SsipSession;

    async fn open(&self) -> Result<SsipSession, BackendError> {
        SsipSession::connect(&self.address).await
    }
}
