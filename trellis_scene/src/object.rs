// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene objects: construction, state transitions, activation lifecycle.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::cell::{Cell, RefCell};
use core::fmt;
use core::ptr;

use log::{debug, warn};
use smallvec::SmallVec;

use crate::events::{EventBus, SceneEvent, StateChangedEvent, Subscription};
use crate::refs::SceneObjectRef;
use crate::state::{SceneObjectState, clone_state};
use crate::types::{Capabilities, SceneKey};

/// Callback captured during activation and run once at full deactivation.
pub type DeactivationFn = Box<dyn FnOnce()>;

/// Activation callback: runs when its object transitions to active and may
/// return a deactivation callback, captured and run at full deactivation.
///
/// The object is passed in as an argument; closures should not capture a
/// strong handle to their own object, or the object can never be dropped.
pub type ActivationHandler = dyn Fn(&SceneObjectHandle) -> Option<DeactivationFn>;

/// Concrete type of a scene object: its state shape, renderer association,
/// capability markers, and lifecycle hooks.
///
/// A kind value may carry per-instance fields that live outside the frozen
/// state (interior-mutable where needed); `Clone` supplies those fields when
/// the object is deep-cloned.
pub trait ObjectKind: Clone + 'static {
    /// State type stored by objects of this kind.
    type State: SceneObjectState;

    /// Renderer association consulted by a UI binding layer.
    ///
    /// The lifecycle core never interprets this value.
    fn component(&self) -> &'static str {
        ""
    }

    /// Capability markers declared by this kind.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Hook run when the object transitions to active, before registered
    /// activation handlers. May return a deactivation callback.
    fn on_activate(&self, object: &SceneObject<Self>) -> Option<DeactivationFn> {
        let _ = object;
        None
    }

    /// Hook run at full deactivation, after captured deactivation callbacks
    /// have run and held child activations are released.
    fn on_deactivate(&self, object: &SceneObject<Self>) {
        let _ = object;
    }
}

/// Pluggable unit attached through a state's behaviors list, started and
/// stopped in lockstep with its host.
#[derive(Clone)]
pub enum SceneBehavior {
    /// A full scene object; a child of the host, activated alongside it.
    Object(SceneObjectHandle),
    /// A bare callback run on host activation, with optional cleanup.
    Fn(Rc<ActivationHandler>),
}

impl SceneBehavior {
    /// Wraps a callback as a behavior.
    pub fn from_fn(
        handler: impl Fn(&SceneObjectHandle) -> Option<DeactivationFn> + 'static,
    ) -> Self {
        Self::Fn(Rc::new(handler))
    }

    /// Whether both values denote the same attached unit.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Fn(a), Self::Fn(b)) => ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for SceneBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => f.debug_tuple("Object").field(object.key()).finish(),
            Self::Fn(_) => f.write_str("Fn"),
        }
    }
}

/// Object API visible without knowing the concrete kind.
///
/// `SceneObjectHandle` and `SceneObjectRef` work in terms of this trait;
/// typed access goes through [`SceneObjectHandle::downcast`].
pub(crate) trait ErasedObject: 'static {
    fn key(&self) -> &SceneKey;
    fn component(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;
    fn is_active(&self) -> bool;
    fn parent(&self) -> Option<SceneObjectHandle>;
    fn set_parent(&self, parent: &SceneObjectHandle);
    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectHandle));
    fn for_each_behavior(&self, visit: &mut dyn FnMut(&SceneBehavior));
    fn data_provider(&self) -> Option<SceneObjectHandle>;
    fn variables(&self) -> Option<SceneObjectHandle>;
    fn time_range(&self) -> Option<SceneObjectHandle>;
    fn activate(&self) -> ActivationHandle;
    fn release_one(&self);
    fn add_activation_handler_rc(&self, handler: Rc<ActivationHandler>);
    fn bus(&self) -> &EventBus;
    fn clone_erased(&self) -> SceneObjectHandle;
    fn get_ref(&self) -> SceneObjectRef;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

#[derive(Clone, Copy)]
enum SlotId {
    Data,
    Variables,
    TimeRange,
}

#[derive(Default)]
struct SlotGuards {
    data: Option<ActivationHandle>,
    variables: Option<ActivationHandle>,
    time_range: Option<ActivationHandle>,
}

impl SlotGuards {
    fn take(&mut self, slot: SlotId) -> Option<ActivationHandle> {
        match slot {
            SlotId::Data => self.data.take(),
            SlotId::Variables => self.variables.take(),
            SlotId::TimeRange => self.time_range.take(),
        }
    }

    fn set(&mut self, slot: SlotId, guard: Option<ActivationHandle>) {
        match slot {
            SlotId::Data => self.data = guard,
            SlotId::Variables => self.variables = guard,
            SlotId::TimeRange => self.time_range = guard,
        }
    }

    fn holds(&self, slot: SlotId) -> bool {
        match slot {
            SlotId::Data => self.data.is_some(),
            SlotId::Variables => self.variables.is_some(),
            SlotId::TimeRange => self.time_range.is_some(),
        }
    }
}

enum BehaviorCleanup {
    Guard(ActivationHandle),
    Callback(DeactivationFn),
    None,
}

struct BehaviorGuard {
    behavior: SceneBehavior,
    cleanup: BehaviorCleanup,
}

impl BehaviorGuard {
    fn run_cleanup(self) {
        match self.cleanup {
            BehaviorCleanup::Guard(guard) => drop(guard),
            BehaviorCleanup::Callback(callback) => callback(),
            BehaviorCleanup::None => {}
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    active: Cell<bool>,
    ref_count: Cell<usize>,
    cleanups: RefCell<SmallVec<[DeactivationFn; 2]>>,
    slots: RefCell<SlotGuards>,
    behaviors: RefCell<Vec<BehaviorGuard>>,
}

struct NodeInner<K: ObjectKind> {
    key: SceneKey,
    kind: K,
    state: RefCell<Rc<K::State>>,
    parent: RefCell<Option<Weak<dyn ErasedObject>>>,
    bus: EventBus,
    activation_handlers: RefCell<SmallVec<[Rc<ActivationHandler>; 2]>>,
    lifecycle: Lifecycle,
    cached_ref: RefCell<Option<SceneObjectRef>>,
    self_weak: Weak<NodeInner<K>>,
}

/// A node in the scene graph, typed by its concrete kind.
///
/// `SceneObject` is a cheap alias: `Clone` yields another handle to the same
/// node, observing the same state and lifecycle. Deep copying goes through
/// [`clone_object`](Self::clone_object).
pub struct SceneObject<K: ObjectKind> {
    inner: Rc<NodeInner<K>>,
}

impl<K: ObjectKind> Clone for SceneObject<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: ObjectKind> SceneObject<K> {
    /// Creates an object with a generated key.
    ///
    /// Children already present in `initial_state` are adopted: each gets
    /// its parent pointer set to the new object.
    pub fn new(kind: K, initial_state: K::State) -> Self {
        Self::build(SceneKey::generate(), kind, initial_state)
    }

    /// Creates an object under a caller-chosen key.
    pub fn with_key(key: impl Into<SceneKey>, kind: K, initial_state: K::State) -> Self {
        Self::build(key.into(), kind, initial_state)
    }

    fn build(key: SceneKey, kind: K, initial_state: K::State) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<NodeInner<K>>| NodeInner {
            key,
            kind,
            state: RefCell::new(Rc::new(initial_state)),
            parent: RefCell::new(None),
            bus: EventBus::new(),
            activation_handlers: RefCell::new(SmallVec::new()),
            lifecycle: Lifecycle::default(),
            cached_ref: RefCell::new(None),
            self_weak: weak.clone(),
        });
        inner.adopt_children();
        Self { inner }
    }

    /// This object's identity key.
    pub fn key(&self) -> &SceneKey {
        &self.inner.key
    }

    /// The kind value. Per-instance fields outside the frozen state live
    /// here.
    pub fn kind(&self) -> &K {
        &self.inner.kind
    }

    /// Renderer association of this object's kind.
    pub fn component(&self) -> &'static str {
        self.inner.kind.component()
    }

    /// Capability markers of this object's kind.
    pub fn capabilities(&self) -> Capabilities {
        self.inner.kind.capabilities()
    }

    /// The current state snapshot.
    ///
    /// Snapshots are frozen; two reads without an intervening
    /// [`set_state`](Self::set_state) return the same `Rc`, so
    /// [`Rc::ptr_eq`] detects change.
    pub fn state(&self) -> Rc<K::State> {
        self.inner.state.borrow().clone()
    }

    /// Whether the object is currently active.
    pub fn is_active(&self) -> bool {
        self.inner.lifecycle.active.get()
    }

    /// The parent object, if attached.
    pub fn parent(&self) -> Option<SceneObjectHandle> {
        self.inner.parent_handle()
    }

    /// Walks parent links to the top of the graph; the object itself when
    /// detached.
    pub fn root(&self) -> SceneObjectHandle {
        self.handle().root()
    }

    /// A type-erased handle aliasing this object.
    pub fn handle(&self) -> SceneObjectHandle {
        SceneObjectHandle::from_rc(self.inner.clone())
    }

    /// A non-owning reference to this object, created once and cached, so
    /// repeated calls return equal references.
    pub fn get_ref(&self) -> SceneObjectRef {
        self.inner.cached_object_ref()
    }

    /// Whether `self` and `other` alias the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Merges `patch` over the current state and publishes the change.
    ///
    /// The merged snapshot replaces the current one before any side effect
    /// runs. Children introduced by the patch are adopted (a child still
    /// attached elsewhere is warned about, then moved); children carried
    /// over keep their current parent. If the object is active,
    /// extension-slot occupancy and the behaviors list are diffed: newly
    /// present units start, removed ones stop. Finally a
    /// [`StateChangedEvent`] is published here and bubbled to the root.
    pub fn set_state(&self, patch: <K::State as SceneObjectState>::Patch) {
        let previous = self.state();
        let next = Rc::new(previous.apply(&patch));
        *self.inner.state.borrow_mut() = next.clone();
        self.inner.adopt_new_children(&previous, &next);
        if self.is_active() {
            self.inner.sync_slot_activation(&previous, &next);
        }
        let event = StateChangedEvent {
            source: self.handle(),
            previous,
            current: next,
            patch: Rc::new(patch),
        };
        self.handle().publish_event(event, true);
    }

    /// Activates this object and returns the guard for the activation.
    ///
    /// The first activation marks the object active, runs the kind's
    /// [`on_activate`](ObjectKind::on_activate) hook, then the registered
    /// activation handlers in registration order, then starts the
    /// extension-slot occupants (data provider, variables, time range) that
    /// are not already active, then the behaviors. Further calls while
    /// active only stack another reference.
    ///
    /// Releasing (or dropping) the returned guard undoes one activation;
    /// teardown runs when the last outstanding guard goes.
    pub fn activate(&self) -> ActivationHandle {
        self.inner.activate_node()
    }

    /// Registers an activation handler, run on every inactive-to-active
    /// transition in registration order.
    ///
    /// A handler added while the object is active runs from the next
    /// activation on. The handler receives the object as an argument and
    /// should not capture a strong handle to it.
    pub fn add_activation_handler(
        &self,
        handler: impl Fn(&SceneObjectHandle) -> Option<DeactivationFn> + 'static,
    ) {
        self.inner.add_activation_handler_rc(Rc::new(handler));
    }

    /// Subscribes to this object's own state changes.
    ///
    /// The handler receives `(current, previous)` snapshots and fires only
    /// for changes originating here; state-change events bubbled up from
    /// descendants are filtered out. Subscribe to [`StateChangedEvent`] via
    /// [`subscribe_to_event`](Self::subscribe_to_event) to observe those.
    pub fn subscribe_to_state(
        &self,
        handler: impl Fn(&K::State, &K::State) + 'static,
    ) -> Subscription {
        let origin = Rc::downgrade(&self.inner);
        self.inner.bus.subscribe(move |event: &StateChangedEvent| {
            let Some(origin) = origin.upgrade() else {
                return;
            };
            if !ptr::addr_eq(Rc::as_ptr(&event.source.inner), Rc::as_ptr(&origin)) {
                return;
            }
            let (Some(current), Some(previous)) = (
                event.current_state::<K::State>(),
                event.previous_state::<K::State>(),
            ) else {
                return;
            };
            handler(&current, &previous);
        })
    }

    /// Subscribes to typed events on this object's bus.
    ///
    /// Unlike [`subscribe_to_state`](Self::subscribe_to_state) this is not
    /// origin-filtered: events bubbled up from descendants are delivered
    /// too.
    pub fn subscribe_to_event<E: SceneEvent>(
        &self,
        handler: impl Fn(&E) + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(handler)
    }

    /// Publishes `event` on this object's bus; when `bubble` is set, the
    /// event is re-published on each ancestor afterwards, in order, up to
    /// the root.
    pub fn publish_event<E: SceneEvent>(&self, event: E, bubble: bool) {
        self.handle().publish_event(event, bubble);
    }

    /// Visits every direct child scene object, in state field order.
    pub fn for_each_child(&self, mut visit: impl FnMut(&SceneObjectHandle)) {
        self.state().for_each_child(&mut visit);
    }

    /// Deep-clones this object: children are cloned recursively, plain
    /// fields carry over, and the clone keeps this object's key. The clone
    /// starts detached and inactive.
    ///
    /// # Panics
    ///
    /// Panics if any state in the subtree embeds [`SceneObjectRef`] handles;
    /// see [`clone_state`].
    pub fn clone_object(&self) -> Self {
        self.inner.clone_typed(None)
    }

    /// Deep-clones this object with `overrides` applied after children are
    /// cloned.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`clone_object`](Self::clone_object).
    pub fn clone_object_with(&self, overrides: <K::State as SceneObjectState>::Patch) -> Self {
        self.inner.clone_typed(Some(&overrides))
    }
}

impl<K: ObjectKind> fmt::Debug for SceneObject<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("key", &self.inner.key)
            .field("component", &self.component())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl<K: ObjectKind> NodeInner<K> {
    fn object(&self) -> SceneObject<K> {
        let inner = self
            .self_weak
            .upgrade()
            .expect("self weak upgrades while a method runs on the node");
        SceneObject { inner }
    }

    fn handle(&self) -> SceneObjectHandle {
        SceneObjectHandle::from_rc(
            self.self_weak
                .upgrade()
                .expect("self weak upgrades while a method runs on the node"),
        )
    }

    fn parent_handle(&self) -> Option<SceneObjectHandle> {
        self.parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(SceneObjectHandle::from_rc)
    }

    fn cached_object_ref(&self) -> SceneObjectRef {
        self.cached_ref
            .borrow_mut()
            .get_or_insert_with(|| {
                let weak: Weak<dyn ErasedObject> = self.self_weak.clone();
                SceneObjectRef::new(weak)
            })
            .clone()
    }

    /// Points every child in the current state at this node.
    fn adopt_children(&self) {
        let state = self.state.borrow().clone();
        let me = self.handle();
        state.for_each_child(&mut |child| child.inner.set_parent(&me));
    }

    /// Points children introduced by `next` at this node. Children carried
    /// over from `previous` keep whatever parent they have, so patching one
    /// field of a former parent never pulls back a child that has since
    /// moved elsewhere.
    fn adopt_new_children(&self, previous: &K::State, next: &K::State) {
        let me = self.handle();
        let mut carried: Vec<*const ()> = Vec::new();
        previous.for_each_child(&mut |child| {
            carried.push(Rc::as_ptr(&child.inner).cast::<()>());
        });
        next.for_each_child(&mut |child| {
            if !carried.contains(&Rc::as_ptr(&child.inner).cast::<()>()) {
                child.inner.set_parent(&me);
            }
        });
    }

    fn assign_parent(&self, parent: &SceneObjectHandle) {
        let mut link = self.parent.borrow_mut();
        if let Some(existing) = link.as_ref().and_then(Weak::upgrade) {
            if ptr::addr_eq(Rc::as_ptr(&existing), Rc::as_ptr(&parent.inner)) {
                return;
            }
            warn!(
                "scene object {} is already attached under {}; moving it under {} (clone the object instead of sharing one instance)",
                self.key,
                existing.key(),
                parent.key(),
            );
        }
        *link = Some(Rc::downgrade(&parent.inner));
    }

    fn activate_node(&self) -> ActivationHandle {
        let count = self.lifecycle.ref_count.get();
        self.lifecycle.ref_count.set(count + 1);
        if count == 0 {
            self.first_activate();
        }
        let weak: Weak<dyn ErasedObject> = self.self_weak.clone();
        ActivationHandle::new(weak, self.key.clone())
    }

    fn first_activate(&self) {
        debug!("activating scene object {}", self.key);
        self.lifecycle.active.set(true);
        let object = self.object();
        let handle = object.handle();

        if let Some(cleanup) = self.kind.on_activate(&object) {
            self.lifecycle.cleanups.borrow_mut().push(cleanup);
        }
        let handlers: SmallVec<[Rc<ActivationHandler>; 2]> =
            self.activation_handlers.borrow().clone();
        for handler in handlers {
            if let Some(cleanup) = handler(&handle) {
                self.lifecycle.cleanups.borrow_mut().push(cleanup);
            }
        }

        // Handlers may have patched the state; start slots and behaviors
        // from the snapshot they left behind. A nested `set_state` from a
        // handler already holds guards for anything it started, so only the
        // unguarded remainder starts here.
        let state = self.state.borrow().clone();
        self.fill_vacant_slot(state.data_provider(), SlotId::Data);
        self.fill_vacant_slot(state.variables(), SlotId::Variables);
        self.fill_vacant_slot(state.time_range(), SlotId::TimeRange);
        self.sync_behaviors(state.behaviors());
    }

    fn full_deactivate(&self) {
        debug!("deactivating scene object {}", self.key);
        self.lifecycle.active.set(false);
        let cleanups = self.lifecycle.cleanups.take();
        for cleanup in cleanups {
            cleanup();
        }
        let slots = self.lifecycle.slots.take();
        drop(slots);
        let behaviors = self.lifecycle.behaviors.take();
        for guard in behaviors {
            guard.run_cleanup();
        }
        self.kind.on_deactivate(&self.object());
        self.bus.clear();
    }

    fn sync_slot_activation(&self, previous: &K::State, next: &K::State) {
        self.sync_slot(previous.data_provider(), next.data_provider(), SlotId::Data);
        self.sync_slot(previous.variables(), next.variables(), SlotId::Variables);
        self.sync_slot(previous.time_range(), next.time_range(), SlotId::TimeRange);
        self.sync_behaviors(next.behaviors());
    }

    fn sync_slot(
        &self,
        previous: Option<&SceneObjectHandle>,
        next: Option<&SceneObjectHandle>,
        slot: SlotId,
    ) {
        let unchanged = match (previous, next) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        if unchanged {
            return;
        }
        // Take the held guard out before running any lifecycle callback.
        let held = self.lifecycle.slots.borrow_mut().take(slot);
        drop(held);
        let fresh = next.and_then(start_slot_occupant);
        self.lifecycle.slots.borrow_mut().set(slot, fresh);
    }

    /// Starts the slot's occupant unless a guard for the slot is already
    /// held, which happens when a handler's nested `set_state` introduced
    /// and started the occupant mid-activation.
    fn fill_vacant_slot(&self, occupant: Option<&SceneObjectHandle>, slot: SlotId) {
        if self.lifecycle.slots.borrow().holds(slot) {
            return;
        }
        let fresh = occupant.and_then(start_slot_occupant);
        self.lifecycle.slots.borrow_mut().set(slot, fresh);
    }

    fn sync_behaviors(&self, next: &[SceneBehavior]) {
        let handle = self.handle();
        let current = self.lifecycle.behaviors.take();
        let mut kept = Vec::with_capacity(next.len());
        for guard in current {
            if next.iter().any(|behavior| behavior.ptr_eq(&guard.behavior)) {
                kept.push(guard);
            } else {
                guard.run_cleanup();
            }
        }
        for behavior in next {
            if !kept.iter().any(|guard| guard.behavior.ptr_eq(behavior)) {
                kept.push(BehaviorGuard {
                    behavior: behavior.clone(),
                    cleanup: start_behavior(behavior, &handle),
                });
            }
        }
        *self.lifecycle.behaviors.borrow_mut() = kept;
    }

    fn clone_typed(
        &self,
        overrides: Option<&<K::State as SceneObjectState>::Patch>,
    ) -> SceneObject<K> {
        let state = self.state.borrow().clone();
        assert!(
            !state.holds_object_refs(),
            "cannot clone scene object {}: its state holds weak object references; re-resolve them on the copy",
            self.key,
        );
        let cloned = clone_state(&*state, overrides);
        SceneObject::build(self.key.clone(), self.kind.clone(), cloned)
    }
}

fn start_slot_occupant(occupant: &SceneObjectHandle) -> Option<ActivationHandle> {
    if occupant.is_active() {
        // Someone else activated it; that party keeps ownership.
        None
    } else {
        Some(occupant.activate())
    }
}

fn start_behavior(behavior: &SceneBehavior, host: &SceneObjectHandle) -> BehaviorCleanup {
    match behavior {
        SceneBehavior::Object(object) => BehaviorCleanup::Guard(object.activate()),
        SceneBehavior::Fn(handler) => match handler(host) {
            Some(callback) => BehaviorCleanup::Callback(callback),
            None => BehaviorCleanup::None,
        },
    }
}

impl<K: ObjectKind> ErasedObject for NodeInner<K> {
    fn key(&self) -> &SceneKey {
        &self.key
    }

    fn component(&self) -> &'static str {
        self.kind.component()
    }

    fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    fn is_active(&self) -> bool {
        self.lifecycle.active.get()
    }

    fn parent(&self) -> Option<SceneObjectHandle> {
        self.parent_handle()
    }

    fn set_parent(&self, parent: &SceneObjectHandle) {
        self.assign_parent(parent);
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectHandle)) {
        let state = self.state.borrow().clone();
        state.for_each_child(visit);
    }

    fn for_each_behavior(&self, visit: &mut dyn FnMut(&SceneBehavior)) {
        let state = self.state.borrow().clone();
        for behavior in state.behaviors() {
            visit(behavior);
        }
    }

    fn data_provider(&self) -> Option<SceneObjectHandle> {
        self.state.borrow().data_provider().cloned()
    }

    fn variables(&self) -> Option<SceneObjectHandle> {
        self.state.borrow().variables().cloned()
    }

    fn time_range(&self) -> Option<SceneObjectHandle> {
        self.state.borrow().time_range().cloned()
    }

    fn activate(&self) -> ActivationHandle {
        self.activate_node()
    }

    fn release_one(&self) {
        let count = self.lifecycle.ref_count.get();
        debug_assert!(count > 0, "activation count underflow");
        let count = count.saturating_sub(1);
        self.lifecycle.ref_count.set(count);
        if count == 0 {
            self.full_deactivate();
        }
    }

    fn add_activation_handler_rc(&self, handler: Rc<ActivationHandler>) {
        self.activation_handlers.borrow_mut().push(handler);
    }

    fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn clone_erased(&self) -> SceneObjectHandle {
        self.clone_typed(None).handle()
    }

    fn get_ref(&self) -> SceneObjectRef {
        self.cached_object_ref()
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Type-erased handle to a scene object.
///
/// This is what states store as children and what traversal walks. Cloning
/// aliases the node; typed access comes back through
/// [`downcast`](Self::downcast).
pub struct SceneObjectHandle {
    pub(crate) inner: Rc<dyn ErasedObject>,
}

impl SceneObjectHandle {
    pub(crate) fn from_rc(inner: Rc<dyn ErasedObject>) -> Self {
        Self { inner }
    }

    /// The object's identity key.
    pub fn key(&self) -> &SceneKey {
        self.inner.key()
    }

    /// Renderer association of the object's kind.
    pub fn component(&self) -> &'static str {
        self.inner.component()
    }

    /// Capability markers of the object's kind.
    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    /// Whether the object is currently active.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// The parent object, if attached.
    pub fn parent(&self) -> Option<SceneObjectHandle> {
        self.inner.parent()
    }

    /// Walks parent links to the top of the graph; the object itself when
    /// detached.
    pub fn root(&self) -> SceneObjectHandle {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Visits every direct child scene object, in state field order.
    pub fn for_each_child(&self, mut visit: impl FnMut(&SceneObjectHandle)) {
        self.inner.for_each_child(&mut visit);
    }

    /// Visits the behaviors attached to this object.
    pub fn for_each_behavior(&self, mut visit: impl FnMut(&SceneBehavior)) {
        self.inner.for_each_behavior(&mut visit);
    }

    /// Occupant of the data-provider slot, if any.
    pub fn data_provider(&self) -> Option<SceneObjectHandle> {
        self.inner.data_provider()
    }

    /// Occupant of the variable-set slot, if any.
    pub fn variables(&self) -> Option<SceneObjectHandle> {
        self.inner.variables()
    }

    /// Occupant of the time-range slot, if any.
    pub fn time_range(&self) -> Option<SceneObjectHandle> {
        self.inner.time_range()
    }

    /// Activates the object; see [`SceneObject::activate`].
    pub fn activate(&self) -> ActivationHandle {
        self.inner.activate()
    }

    /// Registers an activation handler; see
    /// [`SceneObject::add_activation_handler`].
    pub fn add_activation_handler(
        &self,
        handler: impl Fn(&SceneObjectHandle) -> Option<DeactivationFn> + 'static,
    ) {
        self.inner.add_activation_handler_rc(Rc::new(handler));
    }

    /// Subscribes to typed events on this object's bus, bubbled ones
    /// included.
    pub fn subscribe_to_event<E: SceneEvent>(
        &self,
        handler: impl Fn(&E) + 'static,
    ) -> Subscription {
        self.inner.bus().subscribe(handler)
    }

    /// Publishes `event` locally, then on each ancestor in order when
    /// `bubble` is set.
    ///
    /// Local subscribers always run before any ancestor's.
    pub fn publish_event<E: SceneEvent>(&self, event: E, bubble: bool) {
        let type_id = TypeId::of::<E>();
        self.inner.bus().publish_erased(type_id, &event);
        if bubble {
            let mut current = self.parent();
            while let Some(ancestor) = current {
                ancestor.inner.bus().publish_erased(type_id, &event);
                current = ancestor.parent();
            }
        }
    }

    /// Deep-clones the object; see [`SceneObject::clone_object`].
    ///
    /// # Panics
    ///
    /// Panics if any state in the subtree embeds
    /// [`SceneObjectRef`] handles.
    pub fn clone_object(&self) -> SceneObjectHandle {
        self.inner.clone_erased()
    }

    /// A non-owning reference to the object, cached per object.
    pub fn get_ref(&self) -> SceneObjectRef {
        self.inner.get_ref()
    }

    /// Recovers the typed object when this handle's kind is `K`.
    pub fn downcast<K: ObjectKind>(&self) -> Option<SceneObject<K>> {
        let any = self.inner.clone().as_any_rc();
        any.downcast::<NodeInner<K>>()
            .ok()
            .map(|inner| SceneObject { inner })
    }

    /// Whether this handle's kind is `K`.
    pub fn is<K: ObjectKind>(&self) -> bool {
        self.downcast::<K>().is_some()
    }

    /// Whether `self` and `other` alias the same node.
    pub fn ptr_eq(&self, other: &SceneObjectHandle) -> bool {
        ptr::addr_eq(Rc::as_ptr(&self.inner), Rc::as_ptr(&other.inner))
    }
}

impl Clone for SceneObjectHandle {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for SceneObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObjectHandle")
            .field("key", self.inner.key())
            .field("active", &self.inner.is_active())
            .finish_non_exhaustive()
    }
}

/// Guard for one activation of a scene object.
///
/// Every [`SceneObject::activate`] call returns its own guard; the object
/// deactivates when the last outstanding guard is released. Dropping an
/// unreleased guard releases it exactly once.
#[must_use = "the object deactivates when this guard goes away; hold it for the consumer's lifetime"]
pub struct ActivationHandle {
    node: Weak<dyn ErasedObject>,
    key: SceneKey,
    released: bool,
}

impl ActivationHandle {
    fn new(node: Weak<dyn ErasedObject>, key: SceneKey) -> Self {
        Self {
            node,
            key,
            released: false,
        }
    }

    /// Releases this activation explicitly.
    ///
    /// # Panics
    ///
    /// Panics if this guard was already released: a double release means two
    /// parties believed they owned the same activation, which is a lifecycle
    /// bug in the caller.
    pub fn release(&mut self) {
        assert!(
            !self.released,
            "activation of scene object {} released twice",
            self.key,
        );
        self.released = true;
        if let Some(node) = self.node.upgrade() {
            node.release_one();
        }
    }

    /// Whether this guard was explicitly released.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ActivationHandle {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Some(node) = self.node.upgrade() {
                node.release_one();
            }
        }
    }
}

impl fmt::Debug for ActivationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationHandle")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}
