//! Topic subscription table
//!
//! Topics are never declared: a `Topic` entry appears on first subscription
//! and any string is a legal name. Duplicate subscriptions are a no-op.
//!
//! Callers synchronize access through the hub lock.

use std::collections::{HashMap, HashSet};

use crate::broker::registry::ConnectionId;

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashSet<ConnectionId>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashSet::new(),
        }
    }

    pub fn subscribe(&mut self, id: ConnectionId) {
        self.subscribers.insert(id);
    }

    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.subscribers.remove(id)
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionTable {
    topics: HashMap<String, Topic>,
}

impl SubscriptionTable {
    pub fn subscribe(&mut self, topic: &str, id: ConnectionId) {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(id);
    }

    pub fn unsubscribe(&mut self, topic: &str, id: &str) -> bool {
        self.topics
            .get_mut(topic)
            .is_some_and(|t| t.unsubscribe(id))
    }

    /// Drop `id` from every topic. Returns the topics it was removed from.
    pub fn remove_everywhere(&mut self, id: &str) -> Vec<String> {
        self.topics
            .values_mut()
            .filter_map(|t| t.unsubscribe(id).then(|| t.name.clone()))
            .collect()
    }

    /// Snapshot of the subscribers of `topic`; empty when nobody subscribed.
    pub fn subscribers(&self, topic: &str) -> Vec<ConnectionId> {
        self.topics
            .get(topic)
            .map(|t| t.subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, topic: &str, id: &str) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|t| t.subscribers.contains(id))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |t| t.subscribers.len())
    }
}
