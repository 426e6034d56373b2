//! Observer registry.
//!
//! # Responsibilities
//! - Map event names to ordered subscriber lists
//! - Subscribe, unsubscribe, emit
//!
//! # Design Decisions
//! - Copy-on-write table behind `ArcSwap`: emit reads a snapshot without
//!   locking, mutators swap in a new table
//! - Subscribers added or removed during an emit take effect on the next one
//! - No error containment: a panicking subscriber unwinds into the emitter

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::events::Event;

/// Subscriber callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`Emitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Subscription {
    id: ListenerId,
    listener: Listener,
}

type Table = HashMap<String, Vec<Subscription>>;

/// Event name → subscribers, in registration order.
pub struct Emitter {
    table: ArcSwap<Table>,
    next_id: AtomicU64,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to an event name.
    pub fn on<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            listener: Arc::new(listener),
        };

        self.table.rcu(|table| {
            let mut table = Table::clone(table);
            table
                .entry(name.to_string())
                .or_default()
                .push(subscription.clone());
            table
        });
        id
    }

    /// Unsubscribe. Returns false if the subscription was not found.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        let previous = self.table.rcu(|table| {
            let mut table = Table::clone(table);
            if let Some(subscriptions) = table.get_mut(name) {
                subscriptions.retain(|s| s.id != id);
                if subscriptions.is_empty() {
                    table.remove(name);
                }
            }
            table
        });

        previous
            .get(name)
            .map(|subs| subs.iter().any(|s| s.id == id))
            .unwrap_or(false)
    }

    /// Drop every subscriber of an event name.
    pub fn remove_all(&self, name: &str) {
        self.table.rcu(|table| {
            let mut table = Table::clone(table);
            table.remove(name);
            table
        });
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.table.load().get(name).map(Vec::len).unwrap_or(0)
    }

    /// Invoke every current subscriber of the event's name, in registration order.
    ///
    /// Returns false if nobody was subscribed.
    pub fn emit(&self, event: &Event) -> bool {
        let table = self.table.load_full();
        match table.get(event.name()) {
            Some(subscriptions) => {
                for subscription in subscriptions {
                    (subscription.listener)(event);
                }
                true
            }
            None => false,
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.load();
        let mut map = f.debug_map();
        for (name, subscriptions) in table.iter() {
            map.entry(name, &subscriptions.len());
        }
        map.finish()
    }
}
