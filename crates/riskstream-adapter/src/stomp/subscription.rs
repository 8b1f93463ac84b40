/*
[INPUT]:  Subscribe/unsubscribe requests, inbound MESSAGE frames
[OUTPUT]: Per-subscription message channels keyed by subscription id
[POS]:    Protocol layer - subscription id allocation and MESSAGE routing
[UPDATE]: When changing id allocation, delivery payloads, or routing rules
*/

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::debug;

use super::connection::ClientCommand;
use crate::error::Result;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(0);

/// Allocate a process-wide unique subscription id (`sub-0`, `sub-1`, ...).
pub(crate) fn next_subscription_id() -> String {
    let n = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
    format!("sub-{n}")
}

/// A MESSAGE frame routed to its subscription, body already parsed as JSON
#[derive(Debug, Clone, PartialEq)]
pub struct StompMessage {
    pub subscription: String,
    pub destination: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub payload: serde_json::Value,
}

impl StompMessage {
    /// Deserialize the payload into a typed report
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

/// Caller-side handle for one subscription.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    destination: String,
    receiver: Option<mpsc::UnboundedReceiver<StompMessage>>,
    commands: mpsc::UnboundedSender<ClientCommand>,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        destination: String,
        receiver: mpsc::UnboundedReceiver<StompMessage>,
        commands: mpsc::UnboundedSender<ClientCommand>,
    ) -> Self {
        Self {
            id,
            destination,
            receiver: Some(receiver),
            commands,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Wait for the next message. `None` after unsubscribe, disconnect, or client shutdown.
    pub async fn recv(&mut self) -> Option<StompMessage> {
        self.receiver.as_mut()?.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StompMessage> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// Stop delivery. Messages already queued are discarded; repeated calls are no-ops.
    pub fn unsubscribe(&mut self) {
        if self.receiver.take().is_none() {
            return;
        }
        let _ = self.commands.send(ClientCommand::Unsubscribe {
            id: self.id.clone(),
        });
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[derive(Debug)]
struct SubscriptionEntry {
    destination: String,
    sender: mpsc::UnboundedSender<StompMessage>,
}

/// Outcome of routing one MESSAGE frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Delivered,
    UnknownSubscription,
    /// The handle dropped its receiver before the unsubscribe was processed; the entry was pruned
    ReceiverGone,
}

/// Id -> destination/channel table owned by the connection worker
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    entries: HashMap<String, SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub(crate) fn insert(
        &mut self,
        id: String,
        destination: String,
        sender: mpsc::UnboundedSender<StompMessage>,
    ) {
        self.entries
            .insert(id, SubscriptionEntry { destination, sender });
    }

    /// Remove an entry, returning its destination if it was present
    pub(crate) fn remove(&mut self, id: &str) -> Option<String> {
        self.entries.remove(id).map(|entry| entry.destination)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// `(id, destination)` pairs, ordered by id for stable replay
    pub(crate) fn destinations(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.destination.clone()))
            .collect();
        pairs.sort_by_key(|(id, _)| subscription_ordinal(id));
        pairs
    }

    pub(crate) fn dispatch(
        &mut self,
        subscription: &str,
        headers: BTreeMap<String, String>,
        payload: serde_json::Value,
    ) -> Dispatch {
        let Some(entry) = self.entries.get(subscription) else {
            debug!(subscription, "message for unknown subscription dropped");
            return Dispatch::UnknownSubscription;
        };

        let message = StompMessage {
            subscription: subscription.to_string(),
            destination: headers.get("destination").cloned(),
            headers,
            payload,
        };

        if entry.sender.send(message).is_err() {
            self.entries.remove(subscription);
            return Dispatch::ReceiverGone;
        }
        Dispatch::Delivered
    }
}

fn subscription_ordinal(id: &str) -> u64 {
    id.strip_prefix("sub-")
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}
