//! Opaque watch position handed out by the coordinator.

use std::fmt;

use serde_json::Value;

use crate::error::RemoteError;

/// Where a lease watch resumes from.
///
/// The only legal wire shape is a string, so the type is closed over "start
/// fresh" and an opaque string token. Callers pass back exactly the cursor
/// they last received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// No position yet; the coordinator answers with a full snapshot.
    #[default]
    Start,
    /// Opaque token returned by a previous watch.
    Token(String),
}

impl Cursor {
    /// The token, if this cursor holds one.
    pub fn token(&self) -> Option<&str> {
        match self {
            Cursor::Start => None,
            Cursor::Token(token) => Some(token),
        }
    }

    /// Returns true for [`Cursor::Start`].
    pub fn is_start(&self) -> bool {
        matches!(self, Cursor::Start)
    }

    /// Validate a cursor taken from a coordinator response. Only a string
    /// is accepted; `null`, a missing field and every other type are
    /// protocol violations.
    pub(crate) fn from_response(value: Value) -> Result<Self, RemoteError> {
        match value {
            Value::String(token) => Ok(Cursor::Token(token)),
            other => Err(RemoteError::Protocol(format!(
                "lease watch returned non-string cursor: {other}"
            ))),
        }
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Cursor::Token(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Cursor::Token(token.to_owned())
    }
}

/// Accepts `null` (start fresh) or a string. Anything else is rejected
/// before it can reach the network.
impl TryFrom<Value> for Cursor {
    type Error = RemoteError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Cursor::Start),
            Value::String(token) => Ok(Cursor::Token(token)),
            other => Err(RemoteError::Protocol(format!(
                "internal error: lease watch received non-string cursor: {other}"
            ))),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Start => write!(f, "<start>"),
            Cursor::Token(token) => write!(f, "{token}"),
        }
    }
}
