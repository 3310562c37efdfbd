//! Cross-context handshake between a requesting application and the
//! isolated authentication surface. The requester opens a single auxiliary
//! browsing context at the trusted origin, passes its request through the
//! URL query, and waits for exactly one origin-checked message carrying the
//! result back.

pub mod error;

use crate::handshake::error::ProtocolError;
use std::time::{Duration, Instant};
use url::form_urlencoded;

/// Hosted authentication surface used when no trusted origin is configured.
pub const HANDSHAKE_DEFAULT_AUTH_ORIGIN: &str = "https://authnz.neocities.org";
pub const HANDSHAKE_DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const HANDSHAKE_DEFAULT_WINDOW_FEATURES: &str = "toolbar=no, menubar=no, width=1280, height=700, top=100, left=100";

/// Marker carried by every payload belonging to this protocol; messages
/// without it are unrelated window traffic.
pub const HANDSHAKE_TARGET_MARKER: &str = "authzn-popup";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    Login,
    Register,
    Sign,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Login => "login",
            EventKind::Register => "register",
            EventKind::Sign => "sign",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "login" => Some(EventKind::Login),
            "register" => Some(EventKind::Register),
            "sign" => Some(EventKind::Sign),
            _ => None,
        }
    }

    pub fn window_title(&self) -> &'static str {
        match self {
            EventKind::Login => "Login Authzn",
            EventKind::Register => "Register Authzn",
            EventKind::Sign => "Sign Authzn",
        }
    }
}

/// Request carried to the authentication surface through the URL of the
/// auxiliary context: `{trusted_origin}/#/{kind}?origin=...&...`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HandshakeRequest {
    pub kind: EventKind,
    /// Origin of the requesting application, used by the surface to address
    /// its reply.
    pub origin: String,
    pub params: Vec<(String, String)>,
}

impl HandshakeRequest {
    pub fn to_url(&self, trusted_origin: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("origin", self.origin.as_str());
        for (key, value) in &self.params {
            query.append_pair(key.as_str(), value.as_str());
        }

        format!("{}/#/{}?{}", trusted_origin, self.kind.as_str(), query.finish())
    }

    /// Parse the request back out of an auxiliary-context URL. Used by the
    /// authentication surface side.
    pub fn from_url(url: &str) -> Option<Self> {
        let fragment = url.split_once("#/")?.1;
        let (path, query) = fragment.split_once('?').unwrap_or((fragment, ""));

        let kind = EventKind::from_name(path)?;

        let mut origin = None;
        let mut params = Vec::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key == "origin" {
                origin = Some(value.into_owned());
            } else {
                params.push((key.into_owned(), value.into_owned()));
            }
        }

        Some(HandshakeRequest {
            kind,
            origin: origin?,
            params,
        })
    }
}

/// Result posted back by the authentication surface, form-urlencoded with
/// the protocol marker and the event-specific fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HandshakeResponse {
    Login { username: String, address: String },
    Register { username: String, address: String },
    Sign { tx: String },
}

impl HandshakeResponse {
    pub fn kind(&self) -> EventKind {
        match self {
            HandshakeResponse::Login { .. } => EventKind::Login,
            HandshakeResponse::Register { .. } => EventKind::Register,
            HandshakeResponse::Sign { .. } => EventKind::Sign,
        }
    }

    pub fn to_message(&self) -> String {
        let mut message = form_urlencoded::Serializer::new(String::new());
        message.append_pair("target", HANDSHAKE_TARGET_MARKER);
        message.append_pair("event", self.kind().as_str());

        match self {
            HandshakeResponse::Login { username, address } | HandshakeResponse::Register { username, address } => {
                message.append_pair("username", username.as_str());
                message.append_pair("address", address.as_str());
            }
            HandshakeResponse::Sign { tx } => {
                message.append_pair("tx", tx.as_str());
            }
        }

        message.finish()
    }

    /// Parse a message payload. `None` means the payload does not belong to
    /// this protocol (missing marker, unknown event, missing fields) and
    /// must be ignored as unrelated noise.
    pub fn from_message(data: &str) -> Option<Self> {
        let mut target = None;
        let mut event = None;
        let mut username = None;
        let mut address = None;
        let mut tx = None;

        for (key, value) in form_urlencoded::parse(data.as_bytes()) {
            match key.as_ref() {
                "target" => target = Some(value.into_owned()),
                "event" => event = Some(value.into_owned()),
                "username" => username = Some(value.into_owned()),
                "address" => address = Some(value.into_owned()),
                "tx" => tx = Some(value.into_owned()),
                _ => {}
            }
        }

        if target.as_deref() != Some(HANDSHAKE_TARGET_MARKER) {
            return None;
        }

        match EventKind::from_name(event?.as_str())? {
            EventKind::Login => Some(HandshakeResponse::Login {
                username: username?,
                address: address?,
            }),
            EventKind::Register => Some(HandshakeResponse::Register {
                username: username?,
                address: address?,
            }),
            EventKind::Sign => Some(HandshakeResponse::Sign { tx: tx? }),
        }
    }
}

/// A message received from another browsing context, as (sender origin,
/// payload) — the shape of a `message` event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub data: String,
}

/// Opener of auxiliary browsing contexts. Implemented by the embedder over
/// whatever window machinery it has.
pub trait AuthSurface {
    type Handle: SurfaceHandle;

    fn open(&mut self, url: &str, name: &str, features: &str) -> Result<Self::Handle, ProtocolError>;
}

/// An open auxiliary browsing context.
pub trait SurfaceHandle {
    fn focus(&mut self);
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandshakePhase {
    Idle,
    AwaitingMessage,
    Resolved,
    Rejected,
}

struct Pending {
    kind: EventKind,
    deadline: Instant,
}

pub struct HandshakeBuilder {
    trusted_origin: Option<String>,
    origin: Option<String>,
    timeout: Option<Duration>,
    window_features: Option<String>,
}

impl HandshakeBuilder {
    pub fn new() -> Self {
        HandshakeBuilder {
            trusted_origin: None,
            origin: None,
            timeout: None,
            window_features: None,
        }
    }

    /// Origin of the authentication surface; only messages from this origin
    /// can settle a handshake.
    pub fn trusted_origin(mut self, origin: &str) -> Self {
        self.trusted_origin = Some(origin.to_string());
        self
    }

    /// Origin of the requesting application, passed to the surface so it
    /// can address its reply.
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn window_features(mut self, features: &str) -> Self {
        self.window_features = Some(features.to_string());
        self
    }

    pub fn build<S: AuthSurface>(self, surface: S) -> Requester<S> {
        let HandshakeBuilder {
            trusted_origin,
            origin,
            timeout,
            window_features,
        } = self;

        Requester {
            surface,
            trusted_origin: trusted_origin.unwrap_or_else(|| HANDSHAKE_DEFAULT_AUTH_ORIGIN.to_string()),
            origin: origin.unwrap_or_default(),
            timeout: timeout.unwrap_or(HANDSHAKE_DEFAULT_TIMEOUT),
            window_features: window_features.unwrap_or_else(|| HANDSHAKE_DEFAULT_WINDOW_FEATURES.to_string()),
            popup: None,
            previous_url: None,
            pending: None,
            phase: HandshakePhase::Idle,
        }
    }
}

impl Default for HandshakeBuilder {
    fn default() -> Self {
        HandshakeBuilder::new()
    }
}

/// Requester side of the handshake. Owns the single auxiliary-context
/// handle and at most one pending handshake; the inbound message stream and
/// the deadline race to settle it exactly once, and whichever fires second
/// is a no-op.
pub struct Requester<S: AuthSurface> {
    surface: S,
    trusted_origin: String,
    origin: String,
    timeout: Duration,
    window_features: String,
    popup: Option<S::Handle>,
    previous_url: Option<String>,
    pending: Option<Pending>,
    phase: HandshakePhase,
}

impl<S: AuthSurface> Requester<S> {
    /// Create a new handshake builder
    pub fn builder() -> HandshakeBuilder {
        HandshakeBuilder::new()
    }

    /// Open (or refocus) the auxiliary context for `kind` and start waiting
    /// for its reply. A handshake already pending is abandoned: its state is
    /// swapped out before the context is touched, so two pending handshakes
    /// never coexist.
    pub fn initiate(&mut self, kind: EventKind, params: &[(&str, &str)]) -> Result<(), ProtocolError> {
        self.pending = None;
        self.phase = HandshakePhase::Idle;

        let request = HandshakeRequest {
            kind,
            origin: self.origin.clone(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        };
        let url = request.to_url(self.trusted_origin.as_str());

        let same_url = self.previous_url.as_deref() == Some(url.as_str());
        let (reopen, focus_after) = match self.popup.as_mut() {
            None => (true, false),
            Some(handle) if handle.is_closed() => (true, false),
            Some(_) if !same_url => (true, true),
            Some(handle) => {
                handle.focus();
                (false, false)
            }
        };

        if reopen {
            let mut handle = self.surface.open(url.as_str(), kind.window_title(), self.window_features.as_str())?;
            if focus_after {
                handle.focus();
            }
            self.popup = Some(handle);
        }

        self.previous_url = Some(url);
        self.pending = Some(Pending {
            kind,
            deadline: Instant::now() + self.timeout,
        });
        self.phase = HandshakePhase::AwaitingMessage;

        Ok(())
    }

    /// Feed one inbound cross-context message. Returns the typed result
    /// when the message settles the pending handshake; `None` means the
    /// message was ignored (no handshake pending, foreign origin, missing
    /// marker, or an event kind other than the awaited one) and the state
    /// is unchanged. The auxiliary context is left alone on resolution; the
    /// surface closes itself after posting.
    pub fn deliver(&mut self, message: &InboundMessage) -> Option<HandshakeResponse> {
        let pending = self.pending.as_ref()?;

        if message.origin != self.trusted_origin {
            return None;
        }

        let response = HandshakeResponse::from_message(message.data.as_str())?;
        if response.kind() != pending.kind {
            return None;
        }

        self.pending = None;
        self.phase = HandshakePhase::Resolved;

        Some(response)
    }

    /// Check the deadline. When it has elapsed with the handshake still
    /// pending, the auxiliary context is closed, the pending state is
    /// consumed, and the timeout is reported exactly once.
    pub fn poll_deadline(&mut self, now: Instant) -> Result<(), ProtocolError> {
        match self.pending.as_ref() {
            Some(pending) if now >= pending.deadline => {
                let kind = pending.kind;
                self.pending = None;
                self.previous_url = None;
                self.phase = HandshakePhase::Rejected;

                if let Some(mut popup) = self.popup.take() {
                    if !popup.is_closed() {
                        popup.close();
                    }
                }

                Err(ProtocolError::Timeout(kind))
            }
            _ => Ok(()),
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Deadline of the pending handshake, if one is awaiting its message.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn trusted_origin(&self) -> &str {
        self.trusted_origin.as_str()
    }
}
