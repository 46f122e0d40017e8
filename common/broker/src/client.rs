use std::time::Duration;

use async_nats::jetstream::stream::Config as StreamConfig;
use bytes::Bytes;

use crate::consumer::{DeliverPolicy, DurableConsumer, OrderedConsumer};
use crate::error::{BrokerError, BrokerResult};
use crate::kv::KvBucket;

/// Durable-stream configuration passed to [`Broker::ensure_stream`]. Mirrors the
/// teacher-adjacent source's `common.StreamConfig` values (`common/streams.go`):
/// a stream name plus the subject patterns it should capture.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub name: &'static str,
    pub subjects: Vec<String>,
    pub max_age: Option<Duration>,
}

impl StreamSpec {
    pub fn new(name: &'static str, subjects: Vec<String>) -> Self {
        Self {
            name,
            subjects,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// A connected handle to the broker: a core NATS connection plus a JetStream context.
/// Cheap to clone (both inner handles are themselves `Clone` over an `Arc`).
#[derive(Clone)]
pub struct Broker {
    client: async_nats::Client,
    jetstream: async_nats::jetstream::Context,
}

impl Broker {
    pub async fn connect(url: &str) -> BrokerResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|err| BrokerError::Connect(err.to_string()))?;
        let jetstream = async_nats::jetstream::new(client.clone());
        Ok(Self { client, jetstream })
    }

    /// Core request/reply (spec §4.1): send `payload` on `subject`, wait up to `timeout`
    /// for exactly one responder. A timeout surfaces as [`BrokerError::Timeout`].
    pub async fn request(
        &self,
        subject: impl Into<String>,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> BrokerResult<Bytes> {
        let subject = subject.into();
        tokio::time::timeout(timeout, self.client.request(subject, payload.into()))
            .await
            .map_err(|_| BrokerError::Timeout)?
            .map(|msg| msg.payload)
            .map_err(|err| BrokerError::Publish(err.to_string()))
    }

    /// Reply to a core-subject message. Used by request/reply handlers.
    pub async fn publish(
        &self,
        subject: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> BrokerResult<()> {
        self.client
            .publish(subject.into(), payload.into())
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))
    }

    /// Durable publish to a JetStream stream subject (spec §4.1): returns only after the
    /// broker has acknowledged persistence — send, then await the ack, not fire-and-forget.
    pub async fn publish_durable(
        &self,
        subject: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> BrokerResult<u64> {
        let ack = self
            .jetstream
            .publish(subject.into(), payload.into())
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))?
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))?;
        Ok(ack.sequence)
    }

    /// Idempotently create (or fetch, if already present) a durable stream.
    pub async fn ensure_stream(&self, spec: StreamSpec) -> BrokerResult<()> {
        let mut cfg = StreamConfig {
            name: spec.name.to_string(),
            subjects: spec.subjects,
            ..Default::default()
        };
        if let Some(max_age) = spec.max_age {
            cfg.max_age = max_age;
        }
        self.jetstream
            .get_or_create_stream(cfg)
            .await
            .map_err(|err| BrokerError::StreamSetup(err.to_string()))?;
        Ok(())
    }

    /// Create an ordered ephemeral consumer over `stream_name`, filtered to
    /// `filter_subject`, starting at `deliver_policy` (spec §4.1).
    pub async fn ordered_consumer(
        &self,
        stream_name: &str,
        filter_subject: impl Into<String>,
        deliver_policy: DeliverPolicy,
    ) -> BrokerResult<OrderedConsumer> {
        let stream = self
            .jetstream
            .get_stream(stream_name)
            .await
            .map_err(|err| BrokerError::ConsumerSetup(err.to_string()))?;
        OrderedConsumer::create(&stream, filter_subject, deliver_policy).await
    }

    /// Create (or resume) a durable consumer for long-lived subscriptions
    /// (`RegisterJsHandler`, spec §4.2).
    pub async fn durable_consumer(
        &self,
        stream_name: &str,
        durable_name: impl Into<String>,
        filter_subject: impl Into<String>,
        deliver_policy: DeliverPolicy,
    ) -> BrokerResult<DurableConsumer> {
        let stream = self
            .jetstream
            .get_stream(stream_name)
            .await
            .map_err(|err| BrokerError::ConsumerSetup(err.to_string()))?;
        DurableConsumer::create(&stream, durable_name, filter_subject, deliver_policy).await
    }

    /// Open (creating if absent) a KV bucket (spec §4.1 / §4.6).
    pub async fn kv_bucket(&self, bucket: &str) -> BrokerResult<KvBucket> {
        KvBucket::open(&self.jetstream, bucket).await
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}
