// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query activity tracking for a scene subtree.
//!
//! A [`QueryController`] is a scene object attached through a host's
//! behaviors list. Data-producing descendants locate it with
//! [`graph::nearest_query_controller`](trellis_scene::graph::nearest_query_controller)
//! and report each request's lifetime to it; chrome such as a global
//! "refresh in progress" spinner observes the controller's `is_running`
//! state or the injected [`QueryCounter`] service.
//!
//! ## Tracking rules
//!
//! 1. [`query_started`](QueryControllerExt::query_started) adds an entry to
//!    the running set and bumps the counter. Re-adding an entry that is
//!    already tracked is a no-op.
//! 2. [`query_completed`](QueryControllerExt::query_completed) removes the
//!    entry and decrements the counter. Completing an entry that was never
//!    tracked (or was already completed) is ignored.
//! 3. `is_running` flips on with the first tracked entry and off with the
//!    last; each flip is a normal state transition with a bubbling
//!    [`StateChangedEvent`](trellis_scene::events::StateChangedEvent).
//! 4. [`cancel_all`](QueryControllerExt::cancel_all) asks every tracked
//!    entry to cancel but removes none of them: an entry leaves the set
//!    only through `query_completed`, however its work ended.
//! 5. Deactivating the controller drops every tracked entry and gives the
//!    counter back its share, since completions may never arrive once the
//!    host is gone.
//!
//! Entries are compared by identity, not content: the `Rc` handed to
//! `query_started` is the one to pass to `query_completed`.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::ptr;

use log::debug;

use trellis_scene::object::{ObjectKind, SceneObject, SceneObjectHandle};
use trellis_scene::state::SceneObjectState;
use trellis_scene::types::Capabilities;

/// One in-flight request tracked by a [`QueryController`].
///
/// Cancellation is an optional capability: the default does nothing, and the
/// controller only ever requests it, never assumes the work stopped.
pub trait QueryEntry: 'static {
    /// Requests cancellation of the underlying work.
    fn cancel(&self) {}
}

/// Process-wide running-query counter, injected as a service.
///
/// Clones share one count: construct the counter once at composition time
/// and hand a clone to every controller that reports to it. The count is
/// the sum of entries tracked by all live controllers.
#[derive(Clone, Debug, Default)]
pub struct QueryCounter {
    count: Rc<Cell<u64>>,
}

impl QueryCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queries currently reported as running.
    pub fn running(&self) -> u64 {
        self.count.get()
    }

    /// Reports one query started.
    pub fn increment(&self) {
        self.count.set(self.count.get() + 1);
    }

    /// Reports one query finished.
    pub fn decrement(&self) {
        self.count.set(self.count.get().saturating_sub(1));
    }
}

/// Kind of the query-tracking scene object.
///
/// Attach one through the host's behaviors list and resolve it from
/// descendants with
/// [`graph::nearest_query_controller`](trellis_scene::graph::nearest_query_controller).
/// The running set lives on the kind, outside the frozen state: it holds
/// live request handles, which have no place in a snapshot.
pub struct QueryController {
    counter: QueryCounter,
    running: RefCell<Vec<Rc<dyn QueryEntry>>>,
}

impl QueryController {
    /// Creates a controller reporting to `counter`.
    pub fn new(counter: QueryCounter) -> Self {
        Self {
            counter,
            running: RefCell::new(Vec::new()),
        }
    }

    /// The counter service this controller reports to.
    pub fn counter(&self) -> &QueryCounter {
        &self.counter
    }
}

impl Clone for QueryController {
    fn clone(&self) -> Self {
        // A copy shares the counter service but tracks its own requests.
        Self::new(self.counter.clone())
    }
}

impl fmt::Debug for QueryController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryController")
            .field("running", &self.running.borrow().len())
            .field("counter", &self.counter.running())
            .finish()
    }
}

impl ObjectKind for QueryController {
    type State = QueryControllerState;

    fn capabilities(&self) -> Capabilities {
        Capabilities::QUERY_CONTROLLER
    }

    fn on_deactivate(&self, object: &SceneObject<Self>) {
        // Completions may never arrive once the host is gone; forget the
        // tracked entries and give the shared counter back their share.
        let dropped = self.running.borrow_mut().drain(..).collect::<Vec<_>>();
        for _entry in &dropped {
            self.counter.decrement();
        }
        if !dropped.is_empty() {
            debug!(
                "query controller {} dropped {} tracked entries on deactivation",
                object.key(),
                dropped.len(),
            );
        }
    }
}

/// State of a [`QueryController`] object.
#[derive(Clone, Debug, Default)]
pub struct QueryControllerState {
    /// Whether at least one tracked query is in flight.
    pub is_running: bool,
}

/// Partial update for [`QueryControllerState`].
#[derive(Clone, Debug, Default)]
pub struct QueryControllerPatch {
    /// New `is_running` value, if changing.
    pub is_running: Option<bool>,
}

impl SceneObjectState for QueryControllerState {
    type Patch = QueryControllerPatch;

    fn apply(&self, patch: &QueryControllerPatch) -> Self {
        Self {
            is_running: patch.is_running.unwrap_or(self.is_running),
        }
    }

    fn for_each_child(&self, _visit: &mut dyn FnMut(&SceneObjectHandle)) {}

    fn map_children(
        &self,
        _map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle,
    ) -> Self {
        self.clone()
    }
}

/// Tracking operations of a [`QueryController`] scene object.
pub trait QueryControllerExt {
    /// Tracks `entry` as running.
    ///
    /// The first tracked entry flips `is_running` on. Re-adding an entry
    /// already in the set is a no-op.
    fn query_started(&self, entry: Rc<dyn QueryEntry>);

    /// Stops tracking `entry`.
    ///
    /// Removing the last entry flips `is_running` off. Unknown entries are
    /// ignored, so completing twice is harmless.
    fn query_completed(&self, entry: &Rc<dyn QueryEntry>);

    /// Requests cancellation of every tracked entry.
    ///
    /// No entry is removed: each leaves the set through
    /// [`query_completed`](Self::query_completed) once its work actually
    /// ends.
    fn cancel_all(&self);

    /// Number of entries currently tracked.
    fn running_count(&self) -> usize;
}

impl QueryControllerExt for SceneObject<QueryController> {
    fn query_started(&self, entry: Rc<dyn QueryEntry>) {
        let kind = self.kind();
        let first = {
            let mut running = kind.running.borrow_mut();
            if running.iter().any(|tracked| entry_eq(tracked, &entry)) {
                return;
            }
            running.push(entry);
            kind.counter.increment();
            running.len() == 1
        };
        if first {
            self.set_state(QueryControllerPatch {
                is_running: Some(true),
            });
        }
    }

    fn query_completed(&self, entry: &Rc<dyn QueryEntry>) {
        let kind = self.kind();
        let last = {
            let mut running = kind.running.borrow_mut();
            let Some(index) = running.iter().position(|tracked| entry_eq(tracked, entry))
            else {
                return;
            };
            running.remove(index);
            kind.counter.decrement();
            running.is_empty()
        };
        if last {
            self.set_state(QueryControllerPatch {
                is_running: Some(false),
            });
        }
    }

    fn cancel_all(&self) {
        let entries: Vec<Rc<dyn QueryEntry>> = self.kind().running.borrow().clone();
        for entry in entries {
            entry.cancel();
        }
    }

    fn running_count(&self) -> usize {
        self.kind().running.borrow().len()
    }
}

fn entry_eq(a: &Rc<dyn QueryEntry>, b: &Rc<dyn QueryEntry>) -> bool {
    ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
