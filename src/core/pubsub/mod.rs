// src/core/pubsub/mod.rs

//! A single-coordinator pub/sub bus: one task owns the subscriber table and
//! every subscribe/unsubscribe/publish goes through its request channel, so
//! there is never a lock shared between publishers and subscribers. Used to
//! wake `XREAD BLOCK` callers when a stream key they're watching gets a new
//! entry.

use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

const NOTIFICATION_CHANNEL_CAPACITY: usize = 16;

/// A wakeup notification delivered to a subscriber. Carries no payload: a
/// subscriber always re-reads the store itself rather than trusting stale
/// data shipped through the bus.
#[derive(Debug, Clone, Copy)]
pub struct Notification;

enum Command {
    Subscribe {
        topic: Bytes,
        reply_to: oneshot::Sender<(u64, mpsc::Receiver<Notification>)>,
    },
    Unsubscribe {
        topic: Bytes,
        id: u64,
    },
    Publish {
        topic: Bytes,
    },
}

/// Handle to the running pub/sub coordinator task. Cloneable, cheap: it's
/// just a sender into the coordinator's request channel.
#[derive(Debug, Clone)]
pub struct PubSub {
    cmd_tx: mpsc::Sender<Command>,
}

impl PubSub {
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        tokio::spawn(run(cmd_rx));
        Self { cmd_tx }
    }

    /// Subscribes to `topic`, returning a handle that unsubscribes itself
    /// when dropped.
    pub async fn subscribe(&self, topic: Bytes) -> Subscription {
        let (reply_to, reply_rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Command::Subscribe {
                topic: topic.clone(),
                reply_to,
            })
            .await;
        let (id, rx) = reply_rx
            .await
            .expect("pubsub coordinator task dropped its reply sender");
        Subscription {
            id,
            topic,
            rx,
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Notifies every current subscriber of `topic` that new data arrived.
    pub async fn publish(&self, topic: Bytes) {
        let _ = self.cmd_tx.send(Command::Publish { topic }).await;
    }
}

/// An active subscription. Dropping it unsubscribes; unsubscribing twice
/// (e.g. an explicit call followed by drop) is harmless, since the
/// coordinator treats removal by id as idempotent.
pub struct Subscription {
    id: u64,
    topic: Bytes,
    rx: mpsc::Receiver<Notification>,
    cmd_tx: mpsc::Sender<Command>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(Command::Unsubscribe {
            topic: self.topic.clone(),
            id: self.id,
        });
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Notification>,
}

async fn run(mut cmd_rx: mpsc::Receiver<Command>) {
    let mut subscribers: HashMap<Bytes, Vec<Subscriber>> = HashMap::new();
    let mut next_id: u64 = 0;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::Subscribe { topic, reply_to } => {
                let id = next_id;
                next_id += 1;
                let (tx, rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
                subscribers.entry(topic).or_default().push(Subscriber { id, tx });
                let _ = reply_to.send((id, rx));
            }
            Command::Unsubscribe { topic, id } => {
                if let Some(subs) = subscribers.get_mut(&topic) {
                    subs.retain(|s| s.id != id);
                    if subs.is_empty() {
                        subscribers.remove(&topic);
                    }
                }
            }
            Command::Publish { topic } => {
                // Per `spec.md` §4.6, publish blocks until every subscriber
                // has accepted the event rather than dropping it on a full
                // channel; subscriber channels are bounded, so this still
                // bounds how far ahead a fast publisher can get.
                if let Some(subs) = subscribers.get(&topic) {
                    for sub in subs {
                        let _ = sub.tx.send(Notification).await;
                    }
                }
            }
        }
    }
}
