use std::collections::HashMap;
use std::pin::Pin;

use async_nats::jetstream::kv::{Operation, Store};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{BrokerError, BrokerResult};

/// One live change observed on a watched key. `Deleted` covers both `Operation::Delete`
/// and `Operation::Purge` — callers that only care about current values treat them alike.
#[derive(Debug, Clone)]
pub enum KvChange {
    Put { key: String, value: Bytes },
    Deleted { key: String },
}

/// An item yielded by [`KvBucket::watch_all`] (spec §4.1's `WatchAll`): either a change
/// to a key, or the `Drained` sentinel marking the end of the current backlog — every
/// item after it is a live update, not historical replay.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Change(KvChange),
    Drained,
}

/// Wraps an `async-nats` KV store with the `Put`/`Get`/`Delete`/`WatchAll` contract spec
/// §4.1 asks for.
#[derive(Clone)]
pub struct KvBucket {
    store: Store,
}

impl KvBucket {
    pub(crate) async fn open(
        js: &async_nats::jetstream::Context,
        bucket: &str,
    ) -> BrokerResult<Self> {
        let store = match js.get_key_value(bucket).await {
            Ok(store) => store,
            Err(_) => js
                .create_key_value(async_nats::jetstream::kv::Config {
                    bucket: bucket.to_string(),
                    ..Default::default()
                })
                .await
                .map_err(|err| BrokerError::KvSetup(err.to_string()))?,
        };
        Ok(Self { store })
    }

    pub async fn put(&self, key: &str, value: impl Into<Bytes>) -> BrokerResult<u64> {
        self.store
            .put(key, value.into())
            .await
            .map_err(|err| BrokerError::Kv(err.to_string()))
    }

    pub async fn get(&self, key: &str) -> BrokerResult<Option<Bytes>> {
        self.store
            .get(key)
            .await
            .map_err(|err| BrokerError::Kv(err.to_string()))
    }

    pub async fn delete(&self, key: &str) -> BrokerResult<()> {
        self.store
            .delete(key)
            .await
            .map_err(|err| BrokerError::Kv(err.to_string()))
    }

    /// `WatchAll` (spec §4.1): a lazy sequence over every key's changes, starting with the
    /// bucket's current backlog and then running forever. The NATS KV watcher reports how
    /// many backlog entries are still pending replay in each entry's `delta`; once an entry
    /// arrives with `delta == 0` the backlog is drained, so that entry is immediately
    /// followed by a [`WatchEvent::Drained`] sentinel before any further (live) update is
    /// yielded — matching "terminating with a sentinel once the backlog is drained;
    /// thereafter it yields future updates until stopped".
    ///
    /// A bucket with no keys at watch time never produces an entry to carry `delta == 0`
    /// on, so that case is special-cased: if the bucket is empty when the watch is opened,
    /// the sentinel is emitted up front, ahead of the live stream.
    pub async fn watch_all(
        &self,
    ) -> BrokerResult<Pin<Box<dyn Stream<Item = BrokerResult<WatchEvent>> + Send>>> {
        let mut keys = self
            .store
            .keys()
            .await
            .map_err(|err| BrokerError::Kv(err.to_string()))?;
        let is_empty = match keys.next().await {
            None => true,
            Some(Ok(_)) => false,
            Some(Err(err)) => return Err(BrokerError::Kv(err.to_string())),
        };

        let watcher = self
            .store
            .watch_all()
            .await
            .map_err(|err| BrokerError::Kv(err.to_string()))?;
        let live = watcher.flat_map(|entry| {
            let items = match entry {
                Ok(entry) => {
                    let caught_up = entry.delta == 0;
                    let change = match entry.operation {
                        Operation::Delete | Operation::Purge => {
                            KvChange::Deleted { key: entry.key }
                        }
                        Operation::Put => KvChange::Put {
                            key: entry.key,
                            value: entry.value,
                        },
                    };
                    let mut items = vec![Ok(WatchEvent::Change(change))];
                    if caught_up {
                        items.push(Ok(WatchEvent::Drained));
                    }
                    items
                }
                Err(err) => vec![Err(BrokerError::Kv(err.to_string()))],
            };
            stream::iter(items)
        });

        let lead_in = if is_empty {
            vec![Ok(WatchEvent::Drained)]
        } else {
            vec![]
        };
        Ok(Box::pin(stream::iter(lead_in).chain(live)))
    }

    /// Collect every currently-stored value by draining [`watch_all`](Self::watch_all)
    /// through its `Drained` sentinel (spec §4.6's `catalog.list`: "returns the current
    /// snapshot collected by watching the bucket until the sentinel value terminates the
    /// backlog scan"). Does not consume any live update the watch would go on to yield —
    /// the returned future resolves as soon as the sentinel is observed.
    pub async fn snapshot_all(&self) -> BrokerResult<Vec<Bytes>> {
        let mut watch = self.watch_all().await?;
        let mut values: HashMap<String, Bytes> = HashMap::new();
        while let Some(event) = watch.next().await {
            match event? {
                WatchEvent::Change(KvChange::Put { key, value }) => {
                    values.insert(key, value);
                }
                WatchEvent::Change(KvChange::Deleted { key }) => {
                    values.remove(&key);
                }
                WatchEvent::Drained => break,
            }
        }
        Ok(values.into_values().collect())
    }
}
