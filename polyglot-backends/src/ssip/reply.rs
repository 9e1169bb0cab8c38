//! SSIP reply framing
//!
//! Every reply is zero or more `NNN-data` lines closed by one `NNN text`
//! line carrying the same code. Codes 7xx are asynchronous events.

use polyglot_core::{BackendError, PlaybackOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub code: u16,
    /// Payload of the `NNN-` continuation lines
    pub data: Vec<String>,
    /// Text of the closing `NNN ` line
    pub message: String,
}

impl Reply {
    pub fn is_event(&self) -> bool {
        (700..800).contains(&self.code)
    }

    /// Turn 3xx/4xx/5xx into a rejection of `command`
    pub fn check(self, command: &str) -> Result<Reply, BackendError> {
        if self.code >= 300 {
            return Err(BackendError::Rejected {
                command: command.to_string(),
                code: self.code,
                message: self.message,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ReplyAssembler {
    code: Option<u16>,
    data: Vec<String>,
}

impl ReplyAssembler {
    /// Feed one line (without line terminator). Returns a reply once its
    /// closing line arrives.
    pub fn push(&mut self, line: &str) -> Result<Option<Reply>, BackendError> {
        let (code, last, text) = split_line(line)?;
        if let Some(open) = self.code {
            if open != code {
                self.code = None;
                self.data.clear();
                return Err(BackendError::Protocol(format!(
                    "reply {} interrupted by line with code {}",
                    open, code
                )));
            }
        }
        if !last {
            self.code = Some(code);
            self.data.push(text.to_string());
            return Ok(None);
        }
        self.code = None;
        Ok(Some(Reply {
            code,
            data: std::mem::take(&mut self.data),
            message: text.to_string(),
        }))
    }
}

fn split_line(line: &str) -> Result<(u16, bool, &str), BackendError> {
    let bad = || BackendError::Protocol(format!("malformed reply line '{}'", line));
    if line.len() < 4 || !line.is_char_boundary(3) {
        return Err(bad());
    }
    let code = line[..3].parse::<u16>().map_err(|_| bad())?;
    let last = match line.as_bytes()[3] {
        b' ' => true,
        b'-' => false,
        _ => return Err(bad()),
    };
    Ok((code, last, &line[4..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    IndexMark,
    Begin,
    End,
    Cancelled,
    Paused,
    Resumed,
}

impl EventKind {
    fn from_code(code: u16) -> Option<Self> {
        match code {
            700 => Some(EventKind::IndexMark),
            701 => Some(EventKind::Begin),
            702 => Some(EventKind::End),
            703 => Some(EventKind::Cancelled),
            704 => Some(EventKind::Paused),
            705 => Some(EventKind::Resumed),
            _ => None,
        }
    }

    /// Events that finish an utterance
    pub fn outcome(&self) -> Option<PlaybackOutcome> {
        match self {
            EventKind::End => Some(PlaybackOutcome::Completed),
            EventKind::Cancelled => Some(PlaybackOutcome::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Event {
    pub kind: EventKind,
    pub msg_id: u64,
    pub client_id: u64,
}

impl Event {
    pub fn from_reply(reply: &Reply) -> Result<Self, BackendError> {
        let kind = EventKind::from_code(reply.code)
            .ok_or_else(|| BackendError::Protocol(format!("unknown event {}", reply.code)))?;
        let id = |i: usize| {
            reply
                .data
                .get(i)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    BackendError::Protocol(format!("event {} missing ids", reply.code))
                })
        };
        Ok(Event {
            kind,
            msg_id: id(0)?,
            client_id: id(1)?,
        })
    }
}

/// Encode a SPEAK payload: CRLF line endings, leading dots doubled, closed
/// by a lone dot.
pub(crate) fn encode_payload(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}
