// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed per-object event channels and the stock state-change event.

use alloc::rc::{Rc, Weak};
use core::any::{Any, TypeId};
use core::cell::{Cell, RefCell};
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::object::SceneObjectHandle;
use crate::state::SceneObjectState;

/// Marker for values publishable on an [`EventBus`].
///
/// Blanket-implemented for every `'static` type: an event is identified by
/// its Rust type, and dispatch is keyed on [`TypeId`]. Declaring a new event
/// is just declaring a new type.
pub trait SceneEvent: Any {}

impl<T: Any> SceneEvent for T {}

type ErasedHandler = Rc<dyn Fn(&dyn Any)>;

struct Entry {
    id: u64,
    handler: ErasedHandler,
}

#[derive(Default)]
struct BusInner {
    subscribers: RefCell<HashMap<TypeId, SmallVec<[Entry; 2]>>>,
    next_id: Cell<u64>,
}

/// Synchronous publish/subscribe channel owned by a single scene object.
///
/// Delivery is typed: a subscriber registered for `E` sees only events of
/// type `E`. Within one publish, subscribers run in subscription order
/// against a snapshot of the list taken before the first handler runs, so
/// re-entrant subscribe and unsubscribe calls take effect from the next
/// publish on.
///
/// Clones alias the same channel.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to events of type `E`.
    ///
    /// Handlers for the same type run in subscription order. The returned
    /// [`Subscription`] detaches the handler when explicitly released;
    /// otherwise the handler lives until [`clear`](Self::clear).
    pub fn subscribe<E: SceneEvent>(&self, handler: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let erased: ErasedHandler = Rc::new(move |event| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.inner
            .subscribers
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Entry { id, handler: erased });
        Subscription {
            bus: Rc::downgrade(&self.inner),
            type_id: TypeId::of::<E>(),
            id,
        }
    }

    /// Publishes `event` to every subscriber of its type, synchronously.
    pub fn publish<E: SceneEvent>(&self, event: &E) {
        self.publish_erased(TypeId::of::<E>(), event);
    }

    /// Publishes an already-erased event under an explicit type id.
    ///
    /// Bubbling re-publishes one event on several buses without knowing its
    /// concrete type, which is why this entry point exists.
    pub(crate) fn publish_erased(&self, type_id: TypeId, event: &dyn Any) {
        // Snapshot the handler list so re-entrant (un)subscription cannot
        // shift delivery mid-publish.
        let snapshot: SmallVec<[ErasedHandler; 2]> = {
            let subscribers = self.inner.subscribers.borrow();
            match subscribers.get(&type_id) {
                Some(entries) => entries.iter().map(|entry| entry.handler.clone()).collect(),
                None => return,
            }
        };
        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of live subscriptions across all event types.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Drops every subscription.
    ///
    /// Outstanding [`Subscription`] handles become inert; unsubscribing them
    /// afterwards is a no-op.
    pub fn clear(&self) {
        self.inner.subscribers.borrow_mut().clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Handle for one subscriber on an [`EventBus`].
///
/// Dropping the handle does not detach the subscriber: it stays attached
/// until [`unsubscribe`](Self::unsubscribe) is called or the owning bus is
/// cleared, which happens when its scene object fully deactivates.
#[must_use = "hold the subscription and call `unsubscribe` to detach the handler"]
pub struct Subscription {
    bus: Weak<BusInner>,
    type_id: TypeId,
    id: u64,
}

impl Subscription {
    /// Detaches the subscriber.
    ///
    /// A no-op if the bus is gone or was already cleared.
    pub fn unsubscribe(self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut subscribers = bus.subscribers.borrow_mut();
        if let Some(entries) = subscribers.get_mut(&self.type_id) {
            entries.retain(|entry| entry.id != self.id);
            if entries.is_empty() {
                subscribers.remove(&self.type_id);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Published on an object's bus after every
/// [`set_state`](crate::object::SceneObject::set_state), then bubbled to the
/// root.
///
/// Snapshots travel type-erased so ancestors can observe descendant changes
/// without naming the concrete state type. [`previous_state`],
/// [`current_state`] and [`state_patch`] recover typed views when the type
/// is known.
///
/// [`previous_state`]: Self::previous_state
/// [`current_state`]: Self::current_state
/// [`state_patch`]: Self::state_patch
pub struct StateChangedEvent {
    /// The object whose state changed.
    pub source: SceneObjectHandle,
    /// Snapshot before the change.
    pub previous: Rc<dyn Any>,
    /// Snapshot after the change.
    pub current: Rc<dyn Any>,
    /// The partial update that produced `current`.
    pub patch: Rc<dyn Any>,
}

impl StateChangedEvent {
    /// Typed view of the pre-change snapshot.
    pub fn previous_state<S: SceneObjectState>(&self) -> Option<Rc<S>> {
        self.previous.clone().downcast::<S>().ok()
    }

    /// Typed view of the post-change snapshot.
    pub fn current_state<S: SceneObjectState>(&self) -> Option<Rc<S>> {
        self.current.clone().downcast::<S>().ok()
    }

    /// Typed view of the partial update.
    pub fn state_patch<P: 'static>(&self) -> Option<Rc<P>> {
        self.patch.clone().downcast::<P>().ok()
    }
}

impl fmt::Debug for StateChangedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChangedEvent")
            .field("source", &self.source.key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct Ping(u32);
    struct Pong;

    #[test]
    fn publish_reaches_typed_subscribers_only() {
        let bus = EventBus::new();
        let seen = Rc::new(Cell::new(0_u32));

        let seen_ping = seen.clone();
        let _ping = bus.subscribe(move |event: &Ping| seen_ping.set(event.0));
        let seen_pong = seen.clone();
        let _pong = bus.subscribe(move |_: &Pong| seen_pong.set(999));

        bus.publish(&Ping(7));
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn subscribers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            let _sub = bus.subscribe(move |_: &Ping| order.borrow_mut().push(tag));
        }

        bus.publish(&Ping(0));
        assert_eq!(*order.borrow(), ["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_detaches_one_handler() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0_u32));

        let count_a = count.clone();
        let sub_a = bus.subscribe(move |_: &Ping| count_a.set(count_a.get() + 1));
        let count_b = count.clone();
        let _sub_b = bus.subscribe(move |_: &Ping| count_b.set(count_b.get() + 10));

        sub_a.unsubscribe();
        bus.publish(&Ping(0));
        assert_eq!(count.get(), 10);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn dropping_a_subscription_keeps_the_handler_attached() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0_u32));

        let count_inner = count.clone();
        drop(bus.subscribe(move |_: &Ping| count_inner.set(count_inner.get() + 1)));

        bus.publish(&Ping(0));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn clear_makes_outstanding_subscriptions_inert() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0_u32));

        let count_inner = count.clone();
        let sub = bus.subscribe(move |_: &Ping| count_inner.set(count_inner.get() + 1));

        bus.clear();
        bus.publish(&Ping(0));
        assert_eq!(count.get(), 0);
        assert_eq!(bus.subscriber_count(), 0);

        // Releasing a subscription whose bus was cleared must not panic.
        sub.unsubscribe();
    }

    #[test]
    fn reentrant_subscribe_takes_effect_next_publish() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0_u32));

        let bus_inner = bus.clone();
        let count_inner = count.clone();
        let _outer = bus.subscribe(move |_: &Ping| {
            let count_nested = count_inner.clone();
            // Registered mid-publish; must not run for the current event.
            let sub = bus_inner.subscribe(move |_: &Ping| {
                count_nested.set(count_nested.get() + 1);
            });
            drop(sub);
        });

        bus.publish(&Ping(0));
        assert_eq!(count.get(), 0);
        bus.publish(&Ping(0));
        assert_eq!(count.get(), 1);
    }
}
