// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-owning references to scene objects.

use alloc::rc::Weak;
use core::fmt;

use crate::object::{ErasedObject, SceneObjectHandle};

/// Non-owning reference to a scene object.
///
/// A `SceneObjectRef` identifies an object without keeping it alive, which
/// makes it safe to store inside another object's state: it is exempt from
/// deep cloning and never extends its referent's lifetime. Obtain one via
/// [`SceneObject::get_ref`](crate::object::SceneObject::get_ref) and recover
/// the object with [`resolve`](Self::resolve).
pub struct SceneObjectRef {
    target: Weak<dyn ErasedObject>,
}

impl SceneObjectRef {
    pub(crate) fn new(target: Weak<dyn ErasedObject>) -> Self {
        Self { target }
    }

    /// The referent, if it is still alive.
    ///
    /// Resolving a dangling reference is benign and returns `None`; callers
    /// decide whether a missing referent is an error.
    pub fn resolve(&self) -> Option<SceneObjectHandle> {
        self.target.upgrade().map(SceneObjectHandle::from_rc)
    }
}

impl Clone for SceneObjectRef {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

/// References are equal when they point at the same object, alive or not.
impl PartialEq for SceneObjectRef {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(self.target.as_ptr(), other.target.as_ptr())
    }
}

impl Eq for SceneObjectRef {}

impl fmt::Debug for SceneObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SceneObjectRef");
        match self.resolve() {
            Some(target) => debug.field("target", target.key()),
            None => debug.field("target", &"<dropped>"),
        }
        .finish()
    }
}
