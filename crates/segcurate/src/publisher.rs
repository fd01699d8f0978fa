//! Per-instance publish/subscribe registry.
//!
//! Every [`Publisher`] owns its own subscriber table; there is no global
//! registry. A subscription is keyed by `(EventKind, subscriber)` and lives
//! until its [`Subscription`] handle is dropped, [`Publisher::unsubscribe`] is
//! called, or the publisher itself is dropped.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use segcurate::{Event, EventKind, Publisher, Subscriber};
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl Subscriber for Counter {
//!     fn handle_event(&self, _event: &Event) -> segcurate::Result<()> {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let publisher = Publisher::new();
//! let counter = Arc::new(Counter::default());
//! let subscription = publisher.subscribe(EventKind::CursorMoved, &counter, None);
//!
//! publisher.dispatch(&Event::CursorMoved).unwrap();
//! assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//!
//! drop(subscription);
//! publisher.dispatch(&Event::CursorMoved).unwrap();
//! assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::event::{Event, EventKind};

/// Anything that can react to dispatched events.
pub trait Subscriber: Send + Sync {
    /// Default handler, used when a subscription was made without an explicit one.
    fn handle_event(&self, event: &Event) -> Result<()>;
}

/// Per-subscription handler overriding [`Subscriber::handle_event`].
pub type Handler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Wrap a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A subscriber whose default handler is a closure.
pub struct FnSubscriber<F> {
    f: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    /// Create a shared closure subscriber, ready to pass to [`Publisher::subscribe`].
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(Self { f })
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn handle_event(&self, event: &Event) -> Result<()> {
        (self.f)(event)
    }
}

/// Identity of a subscriber: the address of its shared allocation.
///
/// The table holds a `Weak` to every registered subscriber, so the allocation
/// (and therefore the address) cannot be reused while the entry exists.
type SubscriberKey = usize;

fn subscriber_key<S: ?Sized>(subscriber: &Arc<S>) -> SubscriberKey {
    Arc::as_ptr(subscriber) as *const () as usize
}

struct Registration {
    subscriber: Weak<dyn Subscriber>,
    handler: Option<Handler>,
    token: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<EventKind, IndexMap<SubscriberKey, Registration>>,
    next_token: u64,
}

impl Table {
    fn remove(&mut self, kind: EventKind, key: SubscriberKey) -> bool {
        let Some(registrations) = self.entries.get_mut(&kind) else {
            return false;
        };
        let removed = registrations.shift_remove(&key).is_some();
        if registrations.is_empty() {
            self.entries.remove(&kind);
        }
        removed
    }
}

/// Multicast dispatcher owning its own `EventKind -> subscribers` table.
///
/// Delivery is synchronous and in registration order. A handler error stops
/// the dispatch and is returned to the caller.
pub struct Publisher {
    table: Arc<Mutex<Table>>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        let counts: HashMap<&EventKind, usize> =
            table.entries.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Publisher").field("subscribers", &counts).finish()
    }
}

impl Publisher {
    /// Create a publisher with no subscribers.
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table::default())),
        }
    }

    /// Register `subscriber` for `kind`.
    ///
    /// Re-subscribing the same `(kind, subscriber)` pair replaces the handler
    /// and keeps the original delivery position; it never duplicates delivery.
    /// Only the newest [`Subscription`] handle for a pair controls it.
    pub fn subscribe<S>(
        &self,
        kind: EventKind,
        subscriber: &Arc<S>,
        handler: Option<Handler>,
    ) -> Subscription
    where
        S: Subscriber + 'static,
    {
        let key = subscriber_key(subscriber);
        let weak: Weak<S> = Arc::downgrade(subscriber);
        let weak: Weak<dyn Subscriber> = weak;

        let mut table = self.table.lock();
        let token = table.next_token;
        table.next_token += 1;

        let registrations = table.entries.entry(kind).or_default();
        let replaced = registrations
            .insert(
                key,
                Registration {
                    subscriber: weak,
                    handler,
                    token,
                },
            )
            .is_some();
        debug!(?kind, replaced, "subscribed");

        Subscription {
            table: Arc::downgrade(&self.table),
            kind,
            key,
            token,
            detached: false,
        }
    }

    /// Remove the registration of `subscriber` for `kind`. No-op when absent.
    pub fn unsubscribe<S>(&self, kind: EventKind, subscriber: &Arc<S>)
    where
        S: Subscriber + ?Sized,
    {
        let removed = self.table.lock().remove(kind, subscriber_key(subscriber));
        if removed {
            debug!(?kind, "unsubscribed");
        }
    }

    /// Whether `subscriber` is currently registered for `kind`.
    pub fn is_subscribed<S>(&self, kind: EventKind, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber + ?Sized,
    {
        self.table
            .lock()
            .entries
            .get(&kind)
            .is_some_and(|r| r.contains_key(&subscriber_key(subscriber)))
    }

    /// Number of registrations for `kind`, dead subscribers included.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.table.lock().entries.get(&kind).map_or(0, |r| r.len())
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.table.lock().entries.clear();
    }

    /// Deliver `event` to every subscriber registered for its kind.
    ///
    /// The subscriber list is snapshotted before the first handler runs, so
    /// handlers may subscribe or unsubscribe freely; such changes take effect
    /// from the next dispatch. Dispatching with no subscribers is a no-op.
    pub fn dispatch(&self, event: &Event) -> Result<()> {
        let kind = event.kind();
        let snapshot: Vec<(SubscriberKey, Weak<dyn Subscriber>, Option<Handler>)> = {
            let table = self.table.lock();
            match table.entries.get(&kind) {
                Some(registrations) => registrations
                    .iter()
                    .map(|(key, r)| (*key, r.subscriber.clone(), r.handler.clone()))
                    .collect(),
                None => return Ok(()),
            }
        };

        debug!(?event, subscribers = snapshot.len(), "dispatch");

        let mut dead = Vec::new();
        let mut outcome = Ok(());
        for (key, weak, handler) in snapshot {
            let Some(subscriber) = weak.upgrade() else {
                warn!(?kind, "subscriber dropped without unsubscribing");
                dead.push(key);
                continue;
            };
            let result = match handler {
                Some(handler) => handler(event),
                None => subscriber.handle_event(event),
            };
            if let Err(err) = result {
                outcome = Err(err);
                break;
            }
        }

        if !dead.is_empty() {
            let mut table = self.table.lock();
            for key in dead {
                table.remove(kind, key);
            }
        }

        outcome
    }
}

/// Handle for one registration; dropping it unsubscribes.
///
/// A handle that was superseded by a later `subscribe` of the same pair does
/// nothing on drop.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    table: Weak<Mutex<Table>>,
    kind: EventKind,
    key: SubscriberKey,
    token: u64,
    detached: bool,
}

impl Subscription {
    /// The event kind this subscription listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether the registration this handle controls is still in place.
    pub fn is_active(&self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let table = table.lock();
        table
            .entries
            .get(&self.kind)
            .and_then(|r| r.get(&self.key))
            .is_some_and(|r| r.token == self.token)
    }

    /// Keep the registration for the publisher's lifetime.
    pub fn detach(mut self) {
        self.detached = true;
    }

    /// Explicitly release the registration.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("token", &self.token)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = table.lock();
        let owns = table
            .entries
            .get(&self.kind)
            .and_then(|r| r.get(&self.key))
            .is_some_and(|r| r.token == self.token);
        if owns {
            table.remove(self.kind, self.key);
            debug!(kind = ?self.kind, "subscription released");
        }
    }
}
