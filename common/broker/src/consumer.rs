use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy as NatsDeliverPolicy};
use async_nats::jetstream::stream::Stream as JsStream;
use async_nats::jetstream::Message as JsMessage;
use bytes::Bytes;
use futures::StreamExt;

use crate::error::{BrokerError, BrokerResult};

/// Where an ordered consumer should start reading from (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverPolicy {
    /// Replay the whole subject from the start.
    All,
    /// Skip history, only observe messages published from now on.
    New,
}

impl From<DeliverPolicy> for NatsDeliverPolicy {
    fn from(policy: DeliverPolicy) -> Self {
        match policy {
            DeliverPolicy::All => NatsDeliverPolicy::All,
            DeliverPolicy::New => NatsDeliverPolicy::New,
        }
    }
}

/// A single durable-stream message handed to a handler, with enough broker metadata
/// (stream sequence, publish timestamp) for callers that need it (e.g. a warehouse
/// reconstructing a reservation's age).
pub struct StreamMessage {
    pub subject: String,
    pub payload: Bytes,
    pub stream_sequence: u64,
    pub published_at: chrono::DateTime<chrono::Utc>,
    inner: JsMessage,
}

impl StreamMessage {
    async fn from_jetstream(msg: JsMessage) -> BrokerResult<Self> {
        let info = msg
            .info()
            .map_err(|err| BrokerError::Decode(format!("missing message metadata: {err}")))?;
        Ok(Self {
            subject: msg.subject.to_string(),
            payload: msg.payload.clone(),
            stream_sequence: info.stream_sequence,
            published_at: chrono::DateTime::from_timestamp(
                info.published.unix_timestamp(),
                info.published.nanosecond(),
            )
            .unwrap_or_else(chrono::Utc::now),
            inner: msg,
        })
    }

    /// Positively acknowledge the message (spec §4.2: non-error handler return acks).
    pub async fn ack(&self) -> BrokerResult<()> {
        self.inner
            .ack()
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))
    }

    /// Terminate the message so the broker never redelivers it — used when the payload
    /// is provably unprocessable (spec §7b), to prevent poison-pill redelivery.
    pub async fn term(&self) -> BrokerResult<()> {
        self.inner
            .ack_with(async_nats::jetstream::AckKind::Term)
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))
    }

    /// Negatively acknowledge the message, asking the broker to retry it later
    /// (spec §7c).
    pub async fn nak(&self) -> BrokerResult<()> {
        self.inner
            .ack_with(async_nats::jetstream::AckKind::Nak(None))
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))
    }
}

/// A single-reader cursor over a stream, delivering messages in append order, discarded
/// on drop (spec §4.1, "ordered ephemeral consumer").
pub struct OrderedConsumer {
    consumer: async_nats::jetstream::consumer::Consumer<async_nats::jetstream::consumer::OrderedConfig>,
}

impl OrderedConsumer {
    pub(crate) async fn create(
        stream: &JsStream,
        filter_subject: impl Into<String>,
        deliver_policy: DeliverPolicy,
    ) -> BrokerResult<Self> {
        let consumer = stream
            .create_consumer(async_nats::jetstream::consumer::OrderedConfig {
                filter_subject: filter_subject.into(),
                deliver_policy: deliver_policy.into(),
                ..Default::default()
            })
            .await
            .map_err(|err| BrokerError::ConsumerSetup(err.to_string()))?;
        Ok(Self { consumer })
    }

    pub async fn num_pending(&mut self) -> BrokerResult<u64> {
        let info = self
            .consumer
            .info()
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))?;
        Ok(info.num_pending)
    }

    async fn messages(
        &self,
    ) -> BrokerResult<impl futures::Stream<Item = Result<JsMessage, async_nats::error::Error<async_nats::jetstream::consumer::pull::MessagesErrorKind>>>>
    {
        self.consumer
            .messages()
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))
    }
}

/// A durable consumer used for long-lived subscriptions (spec §4.2's
/// `RegisterJsHandler`), as opposed to the ephemeral ordered one above used at startup.
pub struct DurableConsumer {
    consumer: async_nats::jetstream::consumer::PullConsumer,
}

impl DurableConsumer {
    pub(crate) async fn create(
        stream: &JsStream,
        durable_name: impl Into<String>,
        filter_subject: impl Into<String>,
        deliver_policy: DeliverPolicy,
    ) -> BrokerResult<Self> {
        let consumer = stream
            .create_consumer(async_nats::jetstream::consumer::pull::Config {
                durable_name: Some(durable_name.into()),
                filter_subject: filter_subject.into(),
                deliver_policy: deliver_policy.into(),
                ack_policy: AckPolicy::Explicit,
                ..Default::default()
            })
            .await
            .map_err(|err| BrokerError::ConsumerSetup(err.to_string()))?;
        Ok(Self { consumer })
    }

    async fn messages(
        &self,
    ) -> BrokerResult<impl futures::Stream<Item = Result<JsMessage, async_nats::error::Error<async_nats::jetstream::consumer::pull::MessagesErrorKind>>>>
    {
        self.consumer
            .messages()
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))
    }

    /// Run forever, calling `on_message` for each delivery; positively acks on success,
    /// naks on error (spec §4.2's `RegisterJsHandler` contract), until `shutdown`
    /// resolves.
    pub async fn run_forever<F, Fut>(
        &self,
        mut on_message: F,
        mut shutdown: impl Future<Output = ()> + Unpin,
    ) -> BrokerResult<()>
    where
        F: FnMut(StreamMessage) -> Fut,
        Fut: Future<Output = BrokerResult<()>>,
    {
        let mut messages = self.messages().await?;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(()),
                maybe_msg = messages.next() => {
                    match maybe_msg {
                        Some(Ok(msg)) => {
                            let stream_msg = StreamMessage::from_jetstream(msg).await?;
                            match on_message(stream_msg).await {
                                Ok(()) => {}
                                Err(_err) => {
                                    // Individual handler errors are the handler's own
                                    // responsibility to nak/term; nothing further here.
                                }
                            }
                        }
                        Some(Err(err)) => return Err(BrokerError::Consume(err.to_string())),
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}

/// Run `on_message` for every currently-pending message on `consumer`, then return once
/// the backlog is drained (`num_pending == 0`, polled every 250ms) — spec §4.1's
/// consume-until-drained helper, used at startup to rebuild in-memory projections.
pub async fn consume_until_drained<F, Fut>(
    mut consumer: OrderedConsumer,
    mut on_message: F,
) -> BrokerResult<()>
where
    F: FnMut(StreamMessage) -> Fut,
    Fut: Future<Output = BrokerResult<()>>,
{
    let mut messages = consumer.messages().await?;
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_msg = messages.next() => {
                match maybe_msg {
                    Some(Ok(msg)) => {
                        let stream_msg = StreamMessage::from_jetstream(msg).await?;
                        stream_msg.ack().await?;
                        on_message(stream_msg).await?;
                    }
                    Some(Err(err)) => return Err(BrokerError::Consume(err.to_string())),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if consumer.num_pending().await? == 0 {
                    break;
                }
            }
        }
    }
    Ok(())
}
