use crate::handshake::EventKind;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ProtocolError {
    /// The deadline elapsed before a matching message arrived.
    Timeout(EventKind),
    /// The auxiliary browsing context could not be opened.
    Surface(String),
}

impl StdError for ProtocolError {}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            ProtocolError::Timeout(kind) => write!(f, "{} event timed out", kind.as_str()),
            ProtocolError::Surface(s) => write!(f, "{s}"),
        }
    }
}
