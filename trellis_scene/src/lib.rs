// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Scene: a reactive scene-object graph for composable dashboard UIs.
//!
//! ## Overview
//!
//! A dashboard is a tree of scene objects. Each object pairs a frozen state
//! snapshot with a lifecycle: objects activate when something on screen
//! needs them and deactivate when the last consumer lets go. State never
//! mutates in place — [`object::SceneObject::set_state`] merges a partial
//! update into a fresh snapshot, wires up any newly introduced children, and
//! publishes a [`events::StateChangedEvent`] that bubbles to the root. UI
//! bindings, sibling objects, and controllers all observe the graph through
//! those events rather than by polling.
//!
//! ## Objects and state
//!
//! A concrete object is a [`object::ObjectKind`] (the type: renderer
//! association, capability markers, lifecycle hooks) plus a
//! [`state::SceneObjectState`] (the data: plain fields, child objects, and
//! the reserved extension slots). [`object::SceneObject`] is the typed
//! handle; [`object::SceneObjectHandle`] is the erased one that states store
//! as children and traversal walks.
//!
//! Three reserved slots — data provider, variable set, time range — and a
//! behaviors list attach cross-cutting machinery to any object. Slot
//! occupants and behaviors start and stop in lockstep with their host, and
//! descendants inherit the nearest occupant through the
//! [`graph::nearest_data_provider`]-family resolvers.
//!
//! ## Lifecycle
//!
//! [`object::SceneObject::activate`] is reference-counted and returns an
//! [`object::ActivationHandle`] guard. The first activation runs the kind's
//! hook and every registered activation handler; deactivation runs captured
//! cleanup callbacks and clears the object's event subscriptions. Double
//! release of one guard panics; dropping an unreleased guard releases it
//! once.
//!
//! ## Traversal
//!
//! [`graph`] holds pure lookups: upward ([`graph::closest`],
//! [`graph::ancestor`]), downward ([`graph::find_all_objects`],
//! [`graph::find_descendants`]), and whole-graph ([`graph::find_object`],
//! [`graph::find_by_key`]). [`refs::SceneObjectRef`] is a non-owning
//! reference for cross-branch links that must not keep objects alive.
//!
//! ## Quick start
//!
//! ```
//! use trellis_scene::object::{ObjectKind, SceneObject, SceneObjectHandle};
//! use trellis_scene::state::SceneObjectState;
//!
//! // A counter object: its state is one number.
//! #[derive(Clone)]
//! struct Counter;
//!
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Default)]
//! struct CounterPatch {
//!     count: Option<i64>,
//! }
//!
//! impl SceneObjectState for CounterState {
//!     type Patch = CounterPatch;
//!
//!     fn apply(&self, patch: &CounterPatch) -> Self {
//!         Self {
//!             count: patch.count.unwrap_or(self.count),
//!         }
//!     }
//!
//!     fn for_each_child(&self, _visit: &mut dyn FnMut(&SceneObjectHandle)) {}
//!
//!     fn map_children(
//!         &self,
//!         _map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle,
//!     ) -> Self {
//!         Self { count: self.count }
//!     }
//! }
//!
//! impl ObjectKind for Counter {
//!     type State = CounterState;
//!
//!     fn component(&self) -> &'static str {
//!         "counter"
//!     }
//! }
//!
//! let counter = SceneObject::new(Counter, CounterState { count: 0 });
//! let active = counter.activate();
//!
//! let _sub = counter.subscribe_to_state(|current, previous| {
//!     assert_eq!((previous.count, current.count), (0, 1));
//! });
//! counter.set_state(CounterPatch { count: Some(1) });
//! assert_eq!(counter.state().count, 1);
//! drop(active);
//! ```
//!
//! ## Threading
//!
//! The graph is a single-threaded structure: publishes, activations, and
//! state transitions run synchronously to completion on the caller's
//! thread. Handles are intentionally not `Send`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod events;
pub mod graph;
pub mod object;
pub mod refs;
pub mod state;
pub mod types;
