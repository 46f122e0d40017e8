//! Thin facade over a pub/sub broker (spec §4.1): core request/reply, durable streams
//! with ordered consumers, and key/value buckets. Every higher layer in this workspace
//! talks to the broker only through this crate — nothing above here imports `async-nats`
//! directly.

pub mod client;
pub mod consumer;
pub mod error;
pub mod kv;

pub use client::{Broker, StreamSpec};
pub use consumer::{consume_until_drained, DeliverPolicy, DurableConsumer, OrderedConsumer, StreamMessage};
pub use error::{BrokerError, BrokerResult};
pub use kv::{KvBucket, KvChange, WatchEvent};
