use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error kinds a request/reply handler can surface to its caller (§7). Stream
/// handlers use the same kinds internally but only to decide ack/term/retry — they
/// never serialize one back over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("insufficient stock")]
    InsufficientStock,

    #[error("nats error: {message}")]
    NatsError { message: String },

    #[error("kv error: {message}")]
    KvError { message: String },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl ErrorKind {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn nats_error(message: impl Into<String>) -> Self {
        Self::NatsError {
            message: message.into(),
        }
    }

    pub fn kv_error(message: impl Into<String>) -> Self {
        Self::KvError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::InternalError {
            message: message.to_string(),
        }
    }

    /// The stable label used for metrics and the JSON `code` tag.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NotFound { .. } => "not_found",
            Self::InsufficientStock => "insufficient_stock",
            Self::NatsError { .. } => "nats_error",
            Self::KvError { .. } => "kv_error",
            Self::InternalError { .. } => "internal_error",
        }
    }

    /// Encode as the JSON body a request/reply caller receives on failure.
    pub fn to_reply_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{\"code\":\"internal_error\"}".to_vec())
    }
}

pub type ProtocolResult<T> = Result<T, ErrorKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_spec_labels() {
        assert_eq!(ErrorKind::invalid_request("x").code(), "invalid_request");
        assert_eq!(ErrorKind::InsufficientStock.code(), "insufficient_stock");
        assert_eq!(ErrorKind::nats_error("x").code(), "nats_error");
    }

    #[test]
    fn serializes_with_tagged_code() {
        let v = serde_json::to_value(ErrorKind::InsufficientStock).unwrap();
        assert_eq!(v["code"], "insufficient_stock");
    }
}
