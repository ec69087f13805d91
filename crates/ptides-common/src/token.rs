//! Opaque event payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The payload carried by an event.
///
/// The scheduling core never interprets token contents; actors do. Pure
/// events carry [`Token::Empty`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// No payload (pure events, bare triggers).
    Empty,
    /// A boolean value.
    Bool(bool),
    /// A signed integer value.
    Int(i64),
    /// A floating-point value.
    Real(f64),
}

impl Default for Token {
    fn default() -> Self {
        Token::Empty
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Empty => write!(f, "()"),
            Token::Bool(v) => write!(f, "{v}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Real(v) => write!(f, "{v}"),
        }
    }
}
