use common_protocol::ErrorKind;
use thiserror::Error;

/// Failure modes surfaced by the broker facade (spec §4.1). Transient publish/request
/// failures are returned to the caller; consumer and stream creation failures are meant
/// to be treated as fatal to service startup by whoever calls them.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("stream setup failed: {0}")]
    StreamSetup(String),

    #[error("consumer setup failed: {0}")]
    ConsumerSetup(String),

    #[error("error while consuming: {0}")]
    Consume(String),

    #[error("kv bucket setup failed: {0}")]
    KvSetup(String),

    #[error("kv operation failed: {0}")]
    Kv(String),

    #[error("malformed message: {0}")]
    Decode(String),
}

impl From<BrokerError> for ErrorKind {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Kv(msg) | BrokerError::KvSetup(msg) => ErrorKind::kv_error(msg),
            BrokerError::Decode(msg) => ErrorKind::invalid_request(msg),
            other => ErrorKind::nats_error(other.to_string()),
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
