// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The state contract every scene object implements.

use crate::object::{SceneBehavior, SceneObjectHandle};

/// State carried by a scene object.
///
/// A state value is a plain record of the object's semantic fields. The
/// graph never reflects over it; instead the implementor declares the pieces
/// the lifecycle needs:
///
/// - [`apply`](Self::apply) merges a partial update ([`Self::Patch`]) over a
///   snapshot and produces the next snapshot. Fields absent from the patch
///   must carry over unchanged; `Rc`-backed fields should carry over by
///   clone so snapshot-to-snapshot comparison by reference stays meaningful.
/// - [`for_each_child`](Self::for_each_child) visits every child scene
///   object reachable through the state, in field declaration order: plain
///   handle fields, collections, the three extension-slot occupants, and
///   object behaviors.
/// - [`map_children`](Self::map_children) rebuilds the state with every
///   child handle replaced, which is how deep cloning rewrites a subtree.
///
/// The slot accessors identify which children occupy the reserved extension
/// slots. Occupants must also be visited by `for_each_child`; the accessors
/// only mark them for lockstep activation and traversal shortcuts.
///
/// Snapshots handed out by [`SceneObject::state`](crate::object::SceneObject::state)
/// are frozen: mutation goes through
/// [`SceneObject::set_state`](crate::object::SceneObject::set_state) with a
/// patch, never through the snapshot itself.
pub trait SceneObjectState: Sized + 'static {
    /// Partial update merged over snapshots by [`apply`](Self::apply).
    type Patch: 'static;

    /// Produces the next state by merging `patch` over `self`.
    fn apply(&self, patch: &Self::Patch) -> Self;

    /// Visits every direct child scene object, in field declaration order.
    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectHandle));

    /// Rebuilds the state with every child handle replaced by `map(child)`.
    ///
    /// Non-child fields carry over by clone. Function behaviors have no
    /// object to replace and carry over as-is.
    fn map_children(
        &self,
        map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle,
    ) -> Self;

    /// Occupant of the data-provider extension slot, if any.
    fn data_provider(&self) -> Option<&SceneObjectHandle> {
        None
    }

    /// Occupant of the variable-set extension slot, if any.
    fn variables(&self) -> Option<&SceneObjectHandle> {
        None
    }

    /// Occupant of the time-range extension slot, if any.
    fn time_range(&self) -> Option<&SceneObjectHandle> {
        None
    }

    /// Behaviors attached to the host, activated in lockstep with it.
    fn behaviors(&self) -> &[SceneBehavior] {
        &[]
    }

    /// Whether this state embeds [`SceneObjectRef`](crate::refs::SceneObjectRef)
    /// handles.
    ///
    /// States carrying non-owning references must report `true`. Cloning
    /// such a state is rejected, because after a clone the reference would
    /// still point into the original graph. See [`clone_state`].
    fn holds_object_refs(&self) -> bool {
        false
    }
}

/// Deep-clones `state` for use in a new object of the same kind.
///
/// Child scene objects are cloned recursively (each child runs its own
/// clone), plain fields carry over through the state's
/// [`map_children`](SceneObjectState::map_children), and `overrides` is
/// applied last so callers can redirect fields on the copy.
///
/// # Panics
///
/// Panics if `state` reports
/// [`holds_object_refs`](SceneObjectState::holds_object_refs): the
/// reference's referent is ambiguous after a clone, so callers must
/// re-resolve references on the copy instead of cloning them.
pub fn clone_state<S: SceneObjectState>(state: &S, overrides: Option<&S::Patch>) -> S {
    assert!(
        !state.holds_object_refs(),
        "cannot clone a state holding weak object references; re-resolve them on the copy"
    );
    let cloned = state.map_children(&mut |child| child.clone_object());
    match overrides {
        Some(overrides) => cloned.apply(overrides),
        None => cloned,
    }
}
