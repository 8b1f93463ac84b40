/*
[INPUT]:  Raw STOMP text frames from the transport, outbound command + headers + body
[OUTPUT]: Parsed `Frame` values and NUL-terminated wire strings
[POS]:    Protocol layer - STOMP 1.2 text frame codec (no I/O)
[UPDATE]: When supporting new commands or changing header parsing rules
*/

use std::collections::BTreeMap;
use std::fmt;

const NUL: char = '\u{0}';
const HEADER_SEPARATOR: &str = "\n\n";

pub const ACCEPT_VERSION: &str = "1.2";
pub const HEART_BEAT: &str = "0,0";

/// STOMP command vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StompCommand {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
    /// Anything outside the vocabulary, kept verbatim so it can be ignored
    Other(String),
}

impl StompCommand {
    pub fn as_str(&self) -> &str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Stomp => "STOMP",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Send => "SEND",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Unsubscribe => "UNSUBSCRIBE",
            StompCommand::Ack => "ACK",
            StompCommand::Nack => "NACK",
            StompCommand::Begin => "BEGIN",
            StompCommand::Commit => "COMMIT",
            StompCommand::Abort => "ABORT",
            StompCommand::Disconnect => "DISCONNECT",
            StompCommand::Message => "MESSAGE",
            StompCommand::Receipt => "RECEIPT",
            StompCommand::Error => "ERROR",
            StompCommand::Other(raw) => raw,
        }
    }
}

impl From<&str> for StompCommand {
    fn from(raw: &str) -> Self {
        match raw {
            "CONNECT" => StompCommand::Connect,
            "STOMP" => StompCommand::Stomp,
            "CONNECTED" => StompCommand::Connected,
            "SEND" => StompCommand::Send,
            "SUBSCRIBE" => StompCommand::Subscribe,
            "UNSUBSCRIBE" => StompCommand::Unsubscribe,
            "ACK" => StompCommand::Ack,
            "NACK" => StompCommand::Nack,
            "BEGIN" => StompCommand::Begin,
            "COMMIT" => StompCommand::Commit,
            "ABORT" => StompCommand::Abort,
            "DISCONNECT" => StompCommand::Disconnect,
            "MESSAGE" => StompCommand::Message,
            "RECEIPT" => StompCommand::Receipt,
            "ERROR" => StompCommand::Error,
            other => StompCommand::Other(other.to_string()),
        }
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP protocol unit.
///
/// Headers are a map: duplicate keys collapse to the last value seen on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: StompCommand,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Frame {
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// CONNECT frame sent right after the transport opens. Heartbeats are not negotiated.
    pub fn connect() -> Self {
        Self::new(StompCommand::Connect)
            .with_header("accept-version", ACCEPT_VERSION)
            .with_header("heart-beat", HEART_BEAT)
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(StompCommand::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self::new(StompCommand::Unsubscribe).with_header("id", id)
    }

    pub fn disconnect() -> Self {
        Self::new(StompCommand::Disconnect)
    }

    /// Serialize to the wire format. Header values are written verbatim (no escaping).
    pub fn encode(&self) -> String {
        let headers_len: usize = self
            .headers
            .iter()
            .map(|(key, value)| key.len() + value.len() + 2)
            .sum();
        let mut out =
            String::with_capacity(self.command.as_str().len() + headers_len + self.body.len() + 3);

        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        if !self.body.is_empty() {
            out.push_str(&self.body);
        }
        out.push(NUL);
        out
    }

    /// Parse one frame. Returns `None` when there is no blank line between headers and body.
    ///
    /// Input is cut at the first NUL; anything after it is discarded, even a second frame.
    pub fn decode(raw: &str) -> Option<Self> {
        let content = match raw.find(NUL) {
            Some(end) => &raw[..end],
            None => raw,
        };

        let header_end = content.find(HEADER_SEPARATOR)?;
        let header_part = &content[..header_end];
        let body = &content[header_end + HEADER_SEPARATOR.len()..];

        let mut lines = header_part.split('\n');
        let command = StompCommand::from(lines.next().unwrap_or_default());

        let mut headers = BTreeMap::new();
        for line in lines {
            match line.find(':') {
                Some(colon) if colon > 0 => {
                    headers.insert(line[..colon].to_string(), line[colon + 1..].to_string());
                }
                _ => {}
            }
        }

        Some(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }
}
