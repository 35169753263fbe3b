// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Traversal helpers over a scene graph.
//!
//! Everything here is a pure lookup: nothing mutates state or lifecycle.
//! Lookups come in three directions:
//!
//! - [`closest`] walks from a node (inclusive) upward to the root and is the
//!   basis of the `nearest_*` resolvers, which implement slot inheritance:
//!   a node without its own time range or data provider uses the nearest
//!   ancestor's.
//! - [`find_all_objects`] and [`find_descendants`] walk a subtree downward.
//! - [`find_object`] searches the whole graph from anywhere: the start
//!   node's subtree first, then ancestor by ancestor, descending into each
//!   newly reachable branch without re-entering an already searched one.

use alloc::vec::Vec;

use crate::object::{ObjectKind, SceneBehavior, SceneObject, SceneObjectHandle};
use crate::types::Capabilities;

/// Walks from `node` (inclusive) up through its ancestors and returns the
/// first `Some` produced by `extract`.
pub fn closest<R>(
    node: &SceneObjectHandle,
    mut extract: impl FnMut(&SceneObjectHandle) -> Option<R>,
) -> Option<R> {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if let Some(found) = extract(&candidate) {
            return Some(found);
        }
        current = candidate.parent();
    }
    None
}

/// Locates a node anywhere in the graph reachable from `node`.
///
/// The search checks `node` and its whole subtree first, then moves to the
/// parent and searches the branches not yet visited, repeating up to the
/// root. Each node is visited at most once.
pub fn find_object(
    node: &SceneObjectHandle,
    mut predicate: impl FnMut(&SceneObjectHandle) -> bool,
) -> Option<SceneObjectHandle> {
    find_in(node, &mut predicate, None, true)
}

fn find_in(
    node: &SceneObjectHandle,
    predicate: &mut dyn FnMut(&SceneObjectHandle) -> bool,
    searched: Option<&SceneObjectHandle>,
    search_up: bool,
) -> Option<SceneObjectHandle> {
    if predicate(node) {
        return Some(node.clone());
    }
    for child in children_of(node) {
        if searched.is_some_and(|searched| child.ptr_eq(searched)) {
            continue;
        }
        if let Some(found) = find_in(&child, predicate, None, false) {
            return Some(found);
        }
    }
    if search_up && let Some(parent) = node.parent() {
        return find_in(&parent, predicate, Some(node), true);
    }
    None
}

/// Collects every descendant of `node` matching `predicate`, depth-first in
/// child order. `node` itself is not considered.
pub fn find_all_objects(
    node: &SceneObjectHandle,
    mut predicate: impl FnMut(&SceneObjectHandle) -> bool,
) -> Vec<SceneObjectHandle> {
    let mut matches = Vec::new();
    for child in children_of(node) {
        collect_matches(&child, &mut predicate, &mut matches);
    }
    matches
}

fn collect_matches(
    node: &SceneObjectHandle,
    predicate: &mut dyn FnMut(&SceneObjectHandle) -> bool,
    matches: &mut Vec<SceneObjectHandle>,
) {
    if predicate(node) {
        matches.push(node.clone());
    }
    for child in children_of(node) {
        collect_matches(&child, predicate, matches);
    }
}

/// Collects every descendant of `node` whose kind is `K`, typed.
pub fn find_descendants<K: ObjectKind>(node: &SceneObjectHandle) -> Vec<SceneObject<K>> {
    find_all_objects(node, |candidate| candidate.is::<K>())
        .iter()
        .filter_map(SceneObjectHandle::downcast::<K>)
        .collect()
}

/// Locates a node anywhere in the graph by key.
///
/// Uses the [`find_object`] search order, so the nearest match in the start
/// node's own subtree wins over one elsewhere in the graph.
pub fn find_by_key(node: &SceneObjectHandle, key: &str) -> Option<SceneObjectHandle> {
    find_object(node, |candidate| candidate.key().as_str() == key)
}

/// Locates a node by key and recovers it typed.
///
/// `None` when the key is absent or names a node of a different kind.
pub fn find_by_key_of<K: ObjectKind>(
    node: &SceneObjectHandle,
    key: &str,
) -> Option<SceneObject<K>> {
    find_by_key(node, key).and_then(|found| found.downcast::<K>())
}

/// The nearest ancestor of `node` whose kind is `K`.
///
/// The walk is strictly upward: `node` itself is never a candidate, so a
/// node of kind `K` can look up the enclosing `K` above it.
///
/// # Panics
///
/// Panics, naming `K`, if no such ancestor exists. Callers reach for this
/// when the graph shape guarantees the ancestor; use [`find_ancestor`] when
/// absence is expected.
pub fn ancestor<K: ObjectKind>(node: &SceneObjectHandle) -> SceneObject<K> {
    match find_ancestor::<K>(node) {
        Some(found) => found,
        None => panic!(
            "scene object {} has no ancestor of kind {}",
            node.key(),
            core::any::type_name::<K>(),
        ),
    }
}

/// The nearest ancestor of `node` whose kind is `K`, or `None`.
pub fn find_ancestor<K: ObjectKind>(node: &SceneObjectHandle) -> Option<SceneObject<K>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if let Some(typed) = candidate.downcast::<K>() {
            return Some(typed);
        }
        current = candidate.parent();
    }
    None
}

/// Occupant of the nearest data-provider slot at or above `node`.
pub fn nearest_data_provider(node: &SceneObjectHandle) -> Option<SceneObjectHandle> {
    closest(node, |candidate| candidate.data_provider())
}

/// Occupant of the nearest variable-set slot at or above `node`.
pub fn nearest_variable_set(node: &SceneObjectHandle) -> Option<SceneObjectHandle> {
    closest(node, |candidate| candidate.variables())
}

/// Occupant of the nearest time-range slot at or above `node`.
pub fn nearest_time_range(node: &SceneObjectHandle) -> Option<SceneObjectHandle> {
    closest(node, |candidate| candidate.time_range())
}

/// The nearest behavior object carrying
/// [`Capabilities::QUERY_CONTROLLER`], looking at `node` and then each
/// ancestor's behaviors list.
pub fn nearest_query_controller(node: &SceneObjectHandle) -> Option<SceneObjectHandle> {
    closest(node, |candidate| {
        let mut controller = None;
        candidate.for_each_behavior(|behavior| {
            if controller.is_some() {
                return;
            }
            if let SceneBehavior::Object(object) = behavior
                && object.capabilities().contains(Capabilities::QUERY_CONTROLLER)
            {
                controller = Some(object.clone());
            }
        });
        controller
    })
}

fn children_of(node: &SceneObjectHandle) -> Vec<SceneObjectHandle> {
    let mut children = Vec::new();
    node.for_each_child(|child| children.push(child.clone()));
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SceneObjectState;
    use alloc::vec;
    use hashbrown::HashMap;

    #[derive(Clone)]
    struct Group;

    impl ObjectKind for Group {
        type State = GroupState;
    }

    #[derive(Default)]
    struct GroupState {
        children: Vec<SceneObjectHandle>,
        data: Option<SceneObjectHandle>,
        time_range: Option<SceneObjectHandle>,
        behaviors: Vec<SceneBehavior>,
    }

    impl SceneObjectState for GroupState {
        type Patch = ();

        fn apply(&self, _patch: &()) -> Self {
            Self {
                children: self.children.clone(),
                data: self.data.clone(),
                time_range: self.time_range.clone(),
                behaviors: self.behaviors.clone(),
            }
        }

        fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectHandle)) {
            for child in &self.children {
                visit(child);
            }
            if let Some(data) = &self.data {
                visit(data);
            }
            if let Some(time_range) = &self.time_range {
                visit(time_range);
            }
            for behavior in &self.behaviors {
                if let SceneBehavior::Object(object) = behavior {
                    visit(object);
                }
            }
        }

        fn map_children(
            &self,
            map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle,
        ) -> Self {
            Self {
                children: self.children.iter().map(&mut *map).collect(),
                data: self.data.as_ref().map(&mut *map),
                time_range: self.time_range.as_ref().map(&mut *map),
                behaviors: self
                    .behaviors
                    .iter()
                    .map(|behavior| match behavior {
                        SceneBehavior::Object(object) => SceneBehavior::Object(map(object)),
                        SceneBehavior::Fn(handler) => SceneBehavior::Fn(handler.clone()),
                    })
                    .collect(),
            }
        }

        fn data_provider(&self) -> Option<&SceneObjectHandle> {
            self.data.as_ref()
        }

        fn time_range(&self) -> Option<&SceneObjectHandle> {
            self.time_range.as_ref()
        }

        fn behaviors(&self) -> &[SceneBehavior] {
            &self.behaviors
        }
    }

    #[derive(Clone)]
    struct Item;

    impl ObjectKind for Item {
        type State = ItemState;
    }

    #[derive(Clone)]
    struct Tracker;

    impl ObjectKind for Tracker {
        type State = ItemState;

        fn capabilities(&self) -> Capabilities {
            Capabilities::QUERY_CONTROLLER
        }
    }

    struct ItemState {
        tag: u32,
    }

    impl SceneObjectState for ItemState {
        type Patch = ();

        fn apply(&self, _patch: &()) -> Self {
            Self { tag: self.tag }
        }

        fn for_each_child(&self, _visit: &mut dyn FnMut(&SceneObjectHandle)) {}

        fn map_children(
            &self,
            _map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle,
        ) -> Self {
            Self { tag: self.tag }
        }
    }

    fn item(key: &str, tag: u32) -> SceneObject<Item> {
        SceneObject::with_key(key, Item, ItemState { tag })
    }

    fn group(key: &str, state: GroupState) -> SceneObject<Group> {
        SceneObject::with_key(key, Group, state)
    }

    fn group_of(key: &str, children: Vec<SceneObjectHandle>) -> SceneObject<Group> {
        group(
            key,
            GroupState {
                children,
                ..Default::default()
            },
        )
    }

    #[test]
    fn closest_is_inclusive_of_the_start_node() {
        let range = item("range", 0);
        let owner = group(
            "owner",
            GroupState {
                time_range: Some(range.handle()),
                ..Default::default()
            },
        );

        let found = nearest_time_range(&owner.handle()).unwrap();
        assert!(found.ptr_eq(&range.handle()));
    }

    #[test]
    fn nearest_resolvers_pick_the_closest_provider() {
        let outer_range = item("outer-range", 0);
        let inner_range = item("inner-range", 0);
        let provider = item("provider", 0);
        let leaf = item("leaf", 0);
        let sibling = item("sibling", 0);

        let inner = group(
            "inner",
            GroupState {
                children: vec![leaf.handle()],
                time_range: Some(inner_range.handle()),
                ..Default::default()
            },
        );
        let _root = group(
            "root",
            GroupState {
                children: vec![inner.handle(), sibling.handle()],
                data: Some(provider.handle()),
                time_range: Some(outer_range.handle()),
                ..Default::default()
            },
        );

        let found = nearest_time_range(&leaf.handle()).unwrap();
        assert!(found.ptr_eq(&inner_range.handle()));

        let found = nearest_time_range(&sibling.handle()).unwrap();
        assert!(found.ptr_eq(&outer_range.handle()));

        let found = nearest_data_provider(&leaf.handle()).unwrap();
        assert!(found.ptr_eq(&provider.handle()));

        assert!(nearest_variable_set(&leaf.handle()).is_none());
    }

    #[test]
    fn find_object_reaches_sibling_branches() {
        let deep = item("deep", 0);
        let target = item("target", 0);
        let left = group_of("left", vec![deep.handle()]);
        let right = group_of("right", vec![target.handle()]);
        let _root = group_of("root", vec![left.handle(), right.handle()]);

        let found = find_by_key(&deep.handle(), "target").unwrap();
        assert!(found.ptr_eq(&target.handle()));
    }

    #[test]
    fn find_object_prefers_the_start_subtree() {
        // Two nodes carry the same tag; the one below the start node wins
        // over the one in a sibling branch.
        let near = item("near", 7);
        let far = item("far", 7);
        let start = group_of("start", vec![near.handle()]);
        let other = group_of("other", vec![far.handle()]);
        let _root = group_of("root", vec![other.handle(), start.handle()]);

        let found = find_object(&start.handle(), |candidate| {
            candidate
                .downcast::<Item>()
                .is_some_and(|item| item.state().tag == 7)
        })
        .unwrap();
        assert!(found.ptr_eq(&near.handle()));
    }

    #[test]
    fn find_object_visits_each_node_at_most_once() {
        let a = item("a", 0);
        let b = item("b", 0);
        let left = group_of("left", vec![a.handle()]);
        let right = group_of("right", vec![b.handle()]);
        let _root = group_of("root", vec![left.handle(), right.handle()]);

        let mut visits: HashMap<crate::types::SceneKey, u32> = HashMap::new();
        let missing = find_object(&a.handle(), |candidate| {
            *visits.entry(candidate.key().clone()).or_insert(0) += 1;
            false
        });

        assert!(missing.is_none());
        assert_eq!(visits.len(), 5);
        assert!(visits.values().all(|count| *count == 1));
    }

    #[test]
    fn find_all_objects_excludes_the_start_node() {
        let a = item("a", 1);
        let b = item("b", 2);
        let inner = group_of("inner", vec![b.handle()]);
        let root = group_of("root", vec![a.handle(), inner.handle()]);

        let all = find_all_objects(&root.handle(), |_| true);
        let keys: Vec<&str> = all.iter().map(|node| node.key().as_str()).collect();
        assert_eq!(keys, ["a", "inner", "b"]);
    }

    #[test]
    fn find_descendants_returns_typed_matches() {
        let a = item("a", 1);
        let b = item("b", 2);
        let inner = group_of("inner", vec![b.handle()]);
        let root = group_of("root", vec![a.handle(), inner.handle()]);

        let items = find_descendants::<Item>(&root.handle());
        let tags: Vec<u32> = items.iter().map(|item| item.state().tag).collect();
        assert_eq!(tags, [1, 2]);

        let groups = find_descendants::<Group>(&root.handle());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key().as_str(), "inner");
    }

    #[test]
    fn ancestor_walks_strictly_upward() {
        let leaf = item("leaf", 0);
        let inner = group_of("inner", vec![leaf.handle()]);
        let outer = group_of("outer", vec![inner.handle()]);

        let found = ancestor::<Group>(&leaf.handle());
        assert!(found.ptr_eq(&inner));

        // From a group, the result is the enclosing group, never the node
        // itself.
        let found = ancestor::<Group>(&inner.handle());
        assert!(found.ptr_eq(&outer));
    }

    #[test]
    #[should_panic(expected = "no ancestor of kind")]
    fn ancestor_panics_when_absent() {
        let lone = item("lone", 0);
        let _ = ancestor::<Group>(&lone.handle());
    }

    #[test]
    fn find_ancestor_returns_none_when_absent() {
        let lone = item("lone", 0);
        assert!(find_ancestor::<Group>(&lone.handle()).is_none());
    }

    #[test]
    fn find_by_key_of_checks_the_kind() {
        let a = item("a", 1);
        let root = group_of("root", vec![a.handle()]);

        assert!(find_by_key_of::<Item>(&root.handle(), "a").is_some());
        assert!(find_by_key_of::<Group>(&root.handle(), "a").is_none());
        assert!(find_by_key_of::<Item>(&root.handle(), "missing").is_none());
    }

    #[test]
    fn nearest_query_controller_scans_ancestor_behaviors() {
        let tracker = SceneObject::with_key("tracker", Tracker, ItemState { tag: 0 });
        let leaf = item("leaf", 0);
        let inner = group_of("inner", vec![leaf.handle()]);
        let _root = group(
            "root",
            GroupState {
                children: vec![inner.handle()],
                behaviors: vec![
                    SceneBehavior::from_fn(|_host| None),
                    SceneBehavior::Object(tracker.handle()),
                ],
                ..Default::default()
            },
        );

        let found = nearest_query_controller(&leaf.handle()).unwrap();
        assert!(found.ptr_eq(&tracker.handle()));
        assert!(found.capabilities().contains(Capabilities::QUERY_CONTROLLER));

        // The tracker sits in root's subtree, so it resolves to itself.
        let from_tracker = nearest_query_controller(&tracker.handle()).unwrap();
        assert!(from_tracker.ptr_eq(&tracker.handle()));
    }
}
