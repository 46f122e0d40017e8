//! Generic, typed service container (spec §4.2): owns a broker connection and a
//! parameterized state value, and provides the three registration contracts every
//! binary in this workspace builds on (`RegisterHandler`, `RegisterJsHandler`,
//! `RegisterJsHandlerExisting`), plus a graceful shutdown driven by a
//! [`CancellationToken`].
//!
//! The runtime does not synchronize access to `S` on its own (spec §5) — handlers that
//! share mutable state must lock it themselves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use common_broker::{
    consume_until_drained, Broker, BrokerResult, DeliverPolicy, DurableConsumer, StreamMessage,
};
use common_protocol::ErrorKind;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a durable stream handler wants done with the message it was handed (spec §7):
/// acknowledge it, terminate it (payload provably unprocessable — never redeliver), or
/// leave it to be retried under stream semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ack,
    Term(String),
    Retry,
}

/// The subset of a [`StreamMessage`] a handler needs to decide what to do, detached
/// from the broker's own ack handle so it can be handed to an owned async closure
/// while the runtime still holds the original message to ack/term/nak afterwards.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub subject: String,
    pub payload: Bytes,
    pub stream_sequence: u64,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl From<&StreamMessage> for StreamEvent {
    fn from(msg: &StreamMessage) -> Self {
        Self {
            subject: msg.subject.clone(),
            payload: msg.payload.clone(),
            stream_sequence: msg.stream_sequence,
            published_at: msg.published_at,
        }
    }
}

type CoreHandler<S> =
    Arc<dyn Fn(S, Bytes) -> BoxFuture<'static, Result<Vec<u8>, ErrorKind>> + Send + Sync>;
type JsHandler<S> = Arc<dyn Fn(S, StreamEvent) -> BoxFuture<'static, Ack> + Send + Sync>;
type JsReplayHandler<S> =
    Arc<dyn Fn(S, StreamEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// A typed container shared across all handlers of one binary. Cloning is cheap — every
/// field is itself `Clone` over a shared handle.
#[derive(Clone)]
pub struct ServiceRuntime<S> {
    pub broker: Broker,
    state: S,
    shutdown: CancellationToken,
}

impl<S> ServiceRuntime<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(broker: Broker, state: S) -> Self {
        Self {
            broker,
            state,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> S {
        self.state.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request every outstanding subscription/consumer to drain and stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// `RegisterHandler` (spec §4.2): subscribe to a core subject, dispatch each
    /// incoming message onto its own task (one task per message, matching the "one
    /// goroutine per message is acceptable" contract), and reply with whatever the
    /// handler returns.
    pub async fn register_handler<F, Fut>(
        &self,
        subject: impl Into<String>,
        handler: F,
    ) -> BrokerResult<()>
    where
        F: Fn(S, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, ErrorKind>> + Send + 'static,
    {
        let handler: CoreHandler<S> = Arc::new(move |state, payload| Box::pin(handler(state, payload)));
        self.spawn_core_subscription(subject.into(), handler).await
    }

    async fn spawn_core_subscription(
        &self,
        subject: String,
        handler: CoreHandler<S>,
    ) -> BrokerResult<()> {
        let mut subscriber = self
            .broker
            .client()
            .subscribe(subject.clone())
            .await
            .map_err(|err| common_broker::BrokerError::ConsumerSetup(err.to_string()))?;
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let broker = self.broker.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    maybe_msg = subscriber.next() => {
                        let Some(msg) = maybe_msg else { break };
                        let Some(reply_to) = msg.reply.clone() else { continue };
                        let handler = handler.clone();
                        let state = state.clone();
                        let broker = broker.clone();
                        let subject = subject.clone();
                        tokio::spawn(async move {
                            let result = handler(state, msg.payload).await;
                            let bytes = match result {
                                Ok(bytes) => bytes,
                                Err(kind) => {
                                    warn!(subject = %subject, code = kind.code(), "handler returned error");
                                    kind.to_reply_bytes()
                                }
                            };
                            if let Err(err) = broker.publish(reply_to.to_string(), bytes).await {
                                error!(subject = %subject, %err, "failed to send reply");
                            }
                        });
                    }
                }
            }
        });
        Ok(())
    }

    /// `RegisterJsHandler` (spec §4.2): a long-lived durable consumer. Positively acks on
    /// `Ack::Ack`, terminates on `Ack::Term`, naks (retry) on `Ack::Retry`. Runs until
    /// shutdown is requested.
    pub async fn register_js_handler<F, Fut>(
        &self,
        stream_name: &str,
        durable_name: impl Into<String>,
        filter_subject: impl Into<String>,
        deliver_policy: DeliverPolicy,
        handler: F,
    ) -> BrokerResult<()>
    where
        F: Fn(S, StreamEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Ack> + Send + 'static,
    {
        let handler: JsHandler<S> = Arc::new(move |state, event| Box::pin(handler(state, event)));
        let consumer: DurableConsumer = self
            .broker
            .durable_consumer(stream_name, durable_name, filter_subject, deliver_policy)
            .await?;
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let shutdown_fut = Box::pin(shutdown.cancelled());
            let result = consumer
                .run_forever(
                    move |msg| {
                        let handler = handler.clone();
                        let state = state.clone();
                        let event = StreamEvent::from(&msg);
                        async move {
                            match handler(state, event).await {
                                Ack::Ack => msg.ack().await,
                                Ack::Term(reason) => {
                                    warn!(reason = %reason, "terminating unprocessable message");
                                    msg.term().await
                                }
                                Ack::Retry => msg.nak().await,
                            }
                        }
                    },
                    shutdown_fut,
                )
                .await;
            if let Err(err) = result {
                error!(%err, "durable consumer loop exited with error");
            }
        });
        Ok(())
    }

    /// `RegisterJsHandlerExisting` (spec §4.2): an ephemeral ordered consumer used at
    /// startup to rebuild in-memory state from stream history. Runs until the stream's
    /// backlog is drained (`num_pending == 0`), then returns — used to block `main`
    /// until replay is complete before accepting live traffic.
    pub async fn register_js_handler_existing<F, Fut>(
        &self,
        stream_name: &str,
        filter_subject: impl Into<String>,
        deliver_policy: DeliverPolicy,
        handler: F,
    ) -> BrokerResult<()>
    where
        F: Fn(S, StreamEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: JsReplayHandler<S> =
            Arc::new(move |state, event| Box::pin(handler(state, event)));
        let consumer = self
            .broker
            .ordered_consumer(stream_name, filter_subject, deliver_policy)
            .await?;
        let state = self.state.clone();
        consume_until_drained(consumer, move |msg| {
            let handler = handler.clone();
            let state = state.clone();
            let event = StreamEvent::from(&msg);
            async move {
                handler(state, event).await;
                Ok(())
            }
        })
        .await
    }
}
