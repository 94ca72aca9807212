//! STOMP 1.2 frames carried over WebSocket text messages
//!
//! Each WebSocket text message holds exactly one frame:
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! A message consisting only of end-of-line characters is a server heart-beat.
//! [`Frame::decode`] reports it as `Ok(None)` so callers can skip it without
//! treating it as a malformed frame.
//!
//! # Header Escaping
//!
//! Header names and values escape `\`, newline, carriage return and `:` as
//! `\\`, `\n`, `\r` and `\c`. `CONNECT` and `CONNECTED` frames are exempt, as
//! STOMP 1.2 requires for compatibility with 1.0 brokers.
//!
//! # Examples
//!
//! ```rust
//! use hivewire_core::{Frame, StompCommand};
//!
//! let frame = Frame::send("/app/forum/post/create", r#"{"title":"hi"}"#);
//! let wire = frame.encode();
//!
//! let decoded = Frame::decode(&wire).unwrap().unwrap();
//! assert_eq!(decoded.command, StompCommand::Send);
//! assert_eq!(decoded.destination(), Some("/app/forum/post/create"));
//! assert_eq!(decoded.body, r#"{"title":"hi"}"#);
//!
//! assert!(Frame::decode("\n").unwrap().is_none());
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// STOMP frame command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StompCommand {
    /// Client opens a session
    Connect,
    /// Broker accepted the session
    Connected,
    /// Client starts listening on a destination
    Subscribe,
    /// Client stops listening
    Unsubscribe,
    /// Client publishes to a destination
    Send,
    /// Broker delivers a message for a subscription
    Message,
    /// Broker acknowledges a receipt request
    Receipt,
    /// Broker reports an error; the broker closes the connection afterwards
    Error,
    /// Client ends the session
    Disconnect,
    /// Any command this client does not act on
    Other(String),
}

impl StompCommand {
    /// Wire representation of the command
    pub fn as_str(&self) -> &str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Unsubscribe => "UNSUBSCRIBE",
            StompCommand::Send => "SEND",
            StompCommand::Message => "MESSAGE",
            StompCommand::Receipt => "RECEIPT",
            StompCommand::Error => "ERROR",
            StompCommand::Disconnect => "DISCONNECT",
            StompCommand::Other(other) => other,
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "CONNECT" | "STOMP" => StompCommand::Connect,
            "CONNECTED" => StompCommand::Connected,
            "SUBSCRIBE" => StompCommand::Subscribe,
            "UNSUBSCRIBE" => StompCommand::Unsubscribe,
            "SEND" => StompCommand::Send,
            "MESSAGE" => StompCommand::Message,
            "RECEIPT" => StompCommand::Receipt,
            "ERROR" => StompCommand::Error,
            "DISCONNECT" => StompCommand::Disconnect,
            other => StompCommand::Other(other.to_string()),
        }
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self, StompCommand::Connect | StompCommand::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete unit of the wire protocol
///
/// Headers keep their wire order. When a header is repeated the first
/// occurrence wins, as STOMP 1.2 specifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command
    pub command: StompCommand,
    /// Ordered header list
    pub headers: Vec<(String, String)>,
    /// Frame body as text (JSON for application frames)
    pub body: String,
}

impl Frame {
    /// Create an empty frame with the given command
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// CONNECT frame carrying the bearer credential, if any
    pub fn connect(host: &str, token: Option<&str>) -> Self {
        let frame = Frame::new(StompCommand::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0");
        match token {
            Some(token) => frame.header("Authorization", format!("Bearer {}", token)),
            None => frame,
        }
    }

    /// SUBSCRIBE frame
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(StompCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// UNSUBSCRIBE frame
    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(StompCommand::Unsubscribe).header("id", id)
    }

    /// SEND frame with a JSON body
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Frame::new(StompCommand::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", body.len().to_string())
            .with_body(body)
    }

    /// DISCONNECT frame
    pub fn disconnect() -> Self {
        Frame::new(StompCommand::Disconnect)
    }

    /// Look up a header value (first occurrence)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// `destination` header
    pub fn destination(&self) -> Option<&str> {
        self.get_header("destination")
    }

    /// `subscription` header of a MESSAGE frame
    pub fn subscription(&self) -> Option<&str> {
        self.get_header("subscription")
    }

    /// Encode the frame for a WebSocket text message
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode one WebSocket text message
    ///
    /// Returns `Ok(None)` for a heart-beat (end-of-line only) message.
    pub fn decode(input: &str) -> Result<Option<Frame>> {
        let text = input.trim_start_matches(is_eol);
        if text.is_empty() {
            return Ok(None);
        }

        let text = match text.find('\0') {
            Some(end) => &text[..end],
            None => text.trim_end_matches(is_eol),
        };

        let (head, body) = split_head(text);
        let mut lines = head.lines();
        let command = match lines.next() {
            Some(line) if !line.is_empty() => StompCommand::parse(line),
            _ => return Err(Error::Parse("missing command line".to_string())),
        };

        let escape = command.escapes_headers();
        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Parse(format!("malformed header line: {:?}", line)))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        Ok(Some(Frame {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(destination) = self.destination() {
            write!(f, " {}", destination)?;
        }
        write!(f, " ({} bytes)", self.body.len())
    }
}

/// Split a frame into header block and body at the first blank line
fn split_head(text: &str) -> (&str, &str) {
    let lf = text.find("\n\n").map(|i| (i, 2));
    let crlf = text.find("\n\r\n").map(|i| (i, 3));
    let split = match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((index, len)) => (text[..index].trim_end_matches('\r'), &text[index + len..]),
        None => (text, ""),
    }
}

fn is_eol(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(Error::Parse(format!(
                    "invalid header escape sequence: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_frame_carries_bearer_token() {
        let frame = Frame::connect("focushive.local", Some("abc.def"));
        let wire = frame.encode();

        assert!(wire.starts_with("CONNECT\n"));
        assert!(wire.contains("accept-version:1.2\n"));
        assert!(wire.contains("Authorization:Bearer abc.def\n"));
        assert!(wire.ends_with("\n\n\0"));
    }

    #[test]
    fn test_connect_frame_without_token() {
        let frame = Frame::connect("localhost", None);
        assert!(frame.get_header("Authorization").is_none());
    }

    #[test]
    fn test_decode_message_frame() {
        let wire = "MESSAGE\nsubscription:sub-3\nmessage-id:7\ndestination:/topic/presence\n\n{\"userId\":5}\0";
        let frame = Frame::decode(wire).unwrap().unwrap();

        assert_eq!(frame.command, StompCommand::Message);
        assert_eq!(frame.subscription(), Some("sub-3"));
        assert_eq!(frame.destination(), Some("/topic/presence"));
        assert_eq!(frame.body, "{\"userId\":5}");
    }

    #[test]
    fn test_decode_crlf_frame() {
        let wire = "CONNECTED\r\nversion:1.2\r\n\r\n\0";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.command, StompCommand::Connected);
        assert_eq!(frame.get_header("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_heartbeat_decodes_to_none() {
        assert!(Frame::decode("\n").unwrap().is_none());
        assert!(Frame::decode("\r\n").unwrap().is_none());
        assert!(Frame::decode("").unwrap().is_none());
    }

    #[test]
    fn test_header_escaping() {
        let frame = Frame::new(StompCommand::Send)
            .header("destination", "/topic/a:b")
            .header("note", "line1\nline2\\");
        let wire = frame.encode();
        assert!(wire.contains("destination:/topic/a\\cb\n"));

        let decoded = Frame::decode(&wire).unwrap().unwrap();
        assert_eq!(decoded.destination(), Some("/topic/a:b"));
        assert_eq!(decoded.get_header("note"), Some("line1\nline2\\"));
    }

    #[test]
    fn test_repeated_header_first_wins() {
        let wire = "MESSAGE\ndestination:/topic/first\ndestination:/topic/second\n\n\0";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.destination(), Some("/topic/first"));
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(Frame::decode("MESSAGE\nno-colon-here\n\n\0").is_err());
        assert!(Frame::decode("MESSAGE\nbad:\\x\n\n\0").is_err());
        assert!(Frame::decode("\n\n\nMESSAGE\n\n\0").is_ok());
    }

    #[test]
    fn test_unknown_command() {
        let frame = Frame::decode("NACK\nid:1\n\n\0").unwrap().unwrap();
        assert_eq!(frame.command, StompCommand::Other("NACK".to_string()));
    }

    #[test]
    fn test_send_sets_content_length() {
        let frame = Frame::send("/app/presence/status", "{\"status\":\"AWAY\"}");
        assert_eq!(frame.get_header("content-length"), Some("17"));
        assert_eq!(frame.get_header("content-type"), Some("application/json"));
    }
}
