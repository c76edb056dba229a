//! SASL negotiation session.
//!
//! A [`Session`] owns the receive buffer, the credentials and the current
//! state of one authentication attempt. It is driven by transport events
//! through [`Session::handle_event`] (pure: returns actions) or
//! [`Session::dispatch`] (applies the actions to a [`Transport`]).
//!
//! Every call runs to completion. Complete spans are handled in stream
//! order, so the outcome does not depend on how reads were chunked.
//! Incomplete input leaves the state alone; any error closes the session.
//!
//! While waiting for challenges, only `<challenge>`, `<failure>` and
//! `<stream:error>` are framed. Anything else the server sends (`<success/>`,
//! whitespace keep-alives) stays buffered until a later span is extracted,
//! which drops the bytes in front of it.

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::challenge::Challenge;
use super::delimiters::{
    CHALLENGE_END, CHALLENGE_START, FAILURE_END, FAILURE_START, FEATURES_END, FEATURES_START,
    STREAM_ERROR_END, STREAM_ERROR_START,
};
use super::mechanism::{select, Mechanism};
use super::message::Message;
use super::nonce::generate_nonce;
use super::xml::{parse_mechanisms, XmlNode};
use crate::codec::StreamBuffer;
use crate::error::{Result, SaslError};
use crate::transport::{Transport, TransportEvent};

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Waiting for the transport to connect
    InitializeStream,
    /// Stream opened, waiting for `<stream:features>`
    SelectAuthenticationMechanism,
    /// `<auth>` sent, decoding `<challenge>` payloads
    DecodeBase64Challenge,
    /// Session failed or was closed
    Closed,
}

/// Side effects requested by one step of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Bytes to hand to the transport
    Write(Bytes),
    /// Decoded challenge for the continuation of the exchange
    Challenge(Challenge),
    /// Tear the connection down. Follows the output of a step that ended
    /// on a fatal condition.
    Disconnect,
}

/// Credentials for one session. Immutable once the session exists.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Server domain, used as the stream `to` address
    pub host: String,
    /// Authentication identity
    pub username: String,
    /// Password (not consumed by the initial messages)
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Span kinds framed out of the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Features,
    Challenge,
    Failure,
    StreamError,
}

impl SpanKind {
    fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            SpanKind::Features => (FEATURES_START, FEATURES_END),
            SpanKind::Challenge => (CHALLENGE_START, CHALLENGE_END),
            SpanKind::Failure => (FAILURE_START, FAILURE_END),
            SpanKind::StreamError => (STREAM_ERROR_START, STREAM_ERROR_END),
        }
    }
}

/// Outcome of one state's transition function
struct Transition {
    next: SessionState,
    actions: Vec<Action>,
}

/// SASL negotiation session
pub struct Session {
    /// Session ID (log correlation only)
    id: String,
    /// Current state
    state: SessionState,
    /// Bytes received but not yet consumed
    buffer: StreamBuffer,
    /// Immutable credentials
    credentials: Credentials,
    /// SCRAM client nonce
    nonce: String,
    /// Mechanism chosen from the server's offer
    mechanism: Option<Mechanism>,
    /// Bytes received from the transport
    bytes_received: u64,
    /// Bytes handed to the transport
    bytes_written: u64,
    /// Complete spans consumed from the buffer
    spans_extracted: u64,
    /// Challenges decoded
    challenges: u64,
    /// Fatal error held back so the output preceding it could be returned
    deferred: Option<SaslError>,
}

impl Session {
    /// Create a session with a freshly generated nonce
    pub fn new(credentials: Credentials) -> Self {
        Self::with_nonce(credentials, generate_nonce())
    }

    /// Create a session with a fixed nonce
    pub fn with_nonce(credentials: Credentials, nonce: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: SessionState::InitializeStream,
            buffer: StreamBuffer::new(),
            credentials,
            nonce: nonce.into(),
            mechanism: None,
            bytes_received: 0,
            bytes_written: 0,
            spans_extracted: 0,
            challenges: 0,
            deferred: None,
        }
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session has been closed
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Get the session credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get the client nonce
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Get the selected mechanism, once features have been processed
    pub fn mechanism(&self) -> Option<Mechanism> {
        self.mechanism
    }

    /// Bytes received but not yet consumed by a span
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Run one step of the state machine for `event`.
    ///
    /// On error the session is closed. If the step had already produced
    /// output before the failing span, that output is returned followed by
    /// [`Action::Disconnect`] and the error is held for the next call (or
    /// [`Session::take_error`]). Otherwise the error is returned and the
    /// caller must disconnect.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<Vec<Action>> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        let mut actions = Vec::new();
        let outcome = match event {
            TransportEvent::Connected => self.on_connect(&mut actions),
            TransportEvent::DataReceived(bytes) => self.on_data(&bytes, &mut actions),
            TransportEvent::Errored(reason) => Err(SaslError::Transport(reason)),
        };

        match outcome {
            Ok(()) => Ok(actions),
            Err(err) => {
                warn!(session = %self.id, state = ?self.state, "negotiation failed: {err}");
                self.close();
                if actions.is_empty() {
                    return Err(err);
                }
                actions.push(Action::Disconnect);
                self.deferred = Some(err);
                Ok(actions)
            },
        }
    }

    /// Run one step and apply its actions to `transport`.
    ///
    /// Returns the challenges decoded during this step. On error the
    /// transport is disconnected before the error is returned. Challenges
    /// that arrived ahead of a fatal span are still returned; the error then
    /// comes back from the next call.
    pub fn dispatch<T: Transport + ?Sized>(
        &mut self,
        event: TransportEvent,
        transport: &mut T,
    ) -> Result<Vec<Challenge>> {
        let was_closed = self.is_closed();
        let actions = match self.handle_event(event) {
            Ok(actions) => actions,
            Err(err) => {
                // A closed session already tore its transport down
                if !was_closed {
                    error!(session = %self.id, "disconnecting: {err}");
                    transport.disconnect();
                }
                return Err(err);
            },
        };

        let mut challenges = Vec::new();
        for action in actions {
            match action {
                Action::Write(bytes) => transport.write(&bytes),
                Action::Challenge(challenge) => challenges.push(challenge),
                Action::Disconnect => transport.disconnect(),
            }
        }
        if challenges.is_empty() {
            if let Some(err) = self.deferred.take() {
                return Err(err);
            }
        }
        Ok(challenges)
    }

    /// Take the error that closed the session after output was returned
    pub fn take_error(&mut self) -> Option<SaslError> {
        self.deferred.take()
    }

    /// Close the session, discarding buffered data
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!(session = %self.id, from = ?self.state, "session closed");
        }
        self.state = SessionState::Closed;
        self.buffer.clear();
    }

    /// Get session statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id.clone(),
            state: self.state,
            mechanism: self.mechanism,
            bytes_received: self.bytes_received,
            bytes_written: self.bytes_written,
            bytes_buffered: self.buffer.len() as u64,
            spans_extracted: self.spans_extracted,
            challenges: self.challenges,
        }
    }

    fn apply(&mut self, transition: Transition, actions: &mut Vec<Action>) {
        if transition.next != self.state {
            info!(session = %self.id, from = ?self.state, to = ?transition.next, "state transition");
            self.state = transition.next;
        }
        for action in &transition.actions {
            if let Action::Write(bytes) = action {
                self.bytes_written += bytes.len() as u64;
            }
        }
        actions.extend(transition.actions);
    }

    fn on_connect(&mut self, actions: &mut Vec<Action>) -> Result<()> {
        match self.state {
            SessionState::InitializeStream => {
                let transition = self.initialize_stream();
                self.apply(transition, actions);
                Ok(())
            },
            state => Err(SaslError::InvalidState(format!(
                "connect event in state {state:?}"
            ))),
        }
    }

    fn on_data(&mut self, bytes: &[u8], actions: &mut Vec<Action>) -> Result<()> {
        match self.state {
            SessionState::SelectAuthenticationMechanism | SessionState::DecodeBase64Challenge => {},
            state => {
                return Err(SaslError::InvalidState(format!(
                    "{} bytes received in state {state:?}",
                    bytes.len()
                )))
            },
        }

        self.buffer.extend(bytes);
        self.bytes_received += bytes.len() as u64;
        debug!(session = %self.id, received = bytes.len(), buffered = self.buffer.len(), "data received");

        while let Some((kind, span)) = self.next_span() {
            self.spans_extracted += 1;
            let transition = match kind {
                SpanKind::Features => self.select_mechanism(&span)?,
                SpanKind::Challenge => self.decode_challenge(&span)?,
                SpanKind::Failure => {
                    let node = XmlNode::parse_bytes(&span)?;
                    return Err(SaslError::Rejected(condition(&node)));
                },
                SpanKind::StreamError => {
                    let node = XmlNode::parse_bytes(&span)?;
                    return Err(SaslError::StreamError(condition(&node)));
                },
            };
            self.apply(transition, actions);
        }
        Ok(())
    }

    /// Extract the earliest complete span the current state reacts to.
    fn next_span(&mut self) -> Option<(SpanKind, Bytes)> {
        let expected = match self.state {
            SessionState::SelectAuthenticationMechanism => SpanKind::Features,
            SessionState::DecodeBase64Challenge => SpanKind::Challenge,
            SessionState::InitializeStream | SessionState::Closed => return None,
        };

        let (_, kind) = [expected, SpanKind::Failure, SpanKind::StreamError]
            .into_iter()
            .filter_map(|kind| {
                let (start, end) = kind.delimiters();
                self.buffer.span_start(start, end).map(|at| (at, kind))
            })
            .min_by_key(|&(at, _)| at)?;

        let (start, end) = kind.delimiters();
        self.buffer.extract(start, end).map(|span| (kind, span))
    }

    fn initialize_stream(&mut self) -> Transition {
        let header = Message::stream_header(&self.credentials.host);
        debug!(session = %self.id, host = %self.credentials.host, "opening stream");
        Transition {
            next: SessionState::SelectAuthenticationMechanism,
            actions: vec![Action::Write(header.into_bytes())],
        }
    }

    fn select_mechanism(&mut self, span: &[u8]) -> Result<Transition> {
        let features = std::str::from_utf8(span)
            .map_err(|e| SaslError::Xml(format!("features are not UTF-8: {e}")))?;
        let offered = parse_mechanisms(features)?;
        let mechanism = select(&offered);
        debug!(session = %self.id, ?offered, %mechanism, "mechanisms offered");

        if mechanism == Mechanism::None {
            let offered: Vec<&str> = offered.iter().map(String::as_str).collect();
            return Err(SaslError::UnsupportedMechanism(format!(
                "server offers [{}], only SCRAM-SHA-1 and DIGEST-MD5 are supported",
                offered.join(", ")
            )));
        }

        self.mechanism = Some(mechanism);
        let auth = Message::auth(mechanism, &self.credentials.username, &self.nonce);
        Ok(Transition {
            next: SessionState::DecodeBase64Challenge,
            actions: vec![Action::Write(auth.into_bytes())],
        })
    }

    fn decode_challenge(&mut self, span: &[u8]) -> Result<Transition> {
        let challenge = Challenge::decode(span)?;
        self.challenges += 1;
        debug!(session = %self.id, len = challenge.payload().len(), "challenge decoded");
        Ok(Transition {
            next: self.state,
            actions: vec![Action::Challenge(challenge)],
        })
    }
}

/// First child naming an error condition, `<text>` excluded.
fn condition(node: &XmlNode) -> String {
    let name = node
        .children
        .iter()
        .find(|child| child.local_name() != "text")
        .map_or("undefined-condition", XmlNode::local_name);
    match node.find("text") {
        Some(text) if !text.text.is_empty() => format!("{name}: {}", text.text),
        _ => name.to_string(),
    }
}

/// Session statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Session ID
    pub session_id: String,
    /// Current state
    pub state: SessionState,
    /// Selected mechanism
    pub mechanism: Option<Mechanism>,
    /// Bytes received from the transport
    pub bytes_received: u64,
    /// Bytes handed to the transport
    pub bytes_written: u64,
    /// Bytes still buffered
    pub bytes_buffered: u64,
    /// Complete spans consumed
    pub spans_extracted: u64,
    /// Challenges decoded
    pub challenges: u64,
}
