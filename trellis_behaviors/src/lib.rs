// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Behaviors: stock scene-object kinds for Trellis graphs.
//!
//! [`trellis_scene`] defines the graph contract; this crate supplies the
//! pluggable objects most dashboards attach to it:
//!
//! - [`query_controller`]: tracks in-flight query activity for a subtree
//!   and reports it to an injected process-wide counter. Attached through a
//!   host's behaviors list.
//! - [`time_range`]: carries the active time range for a subtree. Attached
//!   through the reserved time-range extension slot.
//!
//! Both are ordinary scene objects: they activate in lockstep with their
//! host, publish bubbling state changes, and are resolved from descendants
//! with the `nearest_*` helpers in [`trellis_scene::graph`].
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use trellis_scene::object::SceneObject;
//! use trellis_behaviors::query_controller::{
//!     QueryController, QueryControllerExt, QueryControllerState, QueryCounter, QueryEntry,
//! };
//!
//! struct Request;
//! impl QueryEntry for Request {}
//!
//! let counter = QueryCounter::new();
//! let controller = SceneObject::new(
//!     QueryController::new(counter.clone()),
//!     QueryControllerState::default(),
//! );
//! let active = controller.activate();
//!
//! let request: Rc<dyn QueryEntry> = Rc::new(Request);
//! controller.query_started(request.clone());
//! assert!(controller.state().is_running);
//! assert_eq!(counter.running(), 1);
//!
//! controller.query_completed(&request);
//! assert_eq!(counter.running(), 0);
//! drop(active);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod query_controller;
pub mod time_range;
