// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The stock time-range scene object.
//!
//! A [`TimeRangeNode`] occupies the time-range extension slot of whichever
//! object it is attached to. Descendants resolve the range in force with
//! [`graph::nearest_time_range`](trellis_scene::graph::nearest_time_range),
//! so a panel with its own node overrides the dashboard-wide one.
//!
//! Relative stamps (`now-6h`) are stored verbatim: evaluating them against
//! a clock belongs to the data layer at query time, which keeps this state
//! stable under re-render and cheap to compare and URL-encode.

use alloc::string::String;

use trellis_scene::object::{ObjectKind, SceneObject, SceneObjectHandle};
use trellis_scene::state::SceneObjectState;
use trellis_scene::types::Capabilities;

/// A point in dashboard time.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TimeStamp {
    /// Milliseconds since the Unix epoch.
    Absolute(i64),
    /// A relative expression such as `now-6h`, kept verbatim.
    Relative(String),
}

impl TimeStamp {
    /// The relative stamp `now`.
    pub fn now() -> Self {
        Self::Relative(String::from("now"))
    }
}

/// State of a [`TimeRangeNode`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TimeRangeState {
    /// Start of the range.
    pub from: TimeStamp,
    /// End of the range.
    pub to: TimeStamp,
}

impl Default for TimeRangeState {
    /// The conventional dashboard default: the last six hours.
    fn default() -> Self {
        Self {
            from: TimeStamp::Relative(String::from("now-6h")),
            to: TimeStamp::now(),
        }
    }
}

/// Partial update for [`TimeRangeState`].
#[derive(Clone, Debug, Default)]
pub struct TimeRangePatch {
    /// New start of the range, if changing.
    pub from: Option<TimeStamp>,
    /// New end of the range, if changing.
    pub to: Option<TimeStamp>,
}

impl SceneObjectState for TimeRangeState {
    type Patch = TimeRangePatch;

    fn apply(&self, patch: &TimeRangePatch) -> Self {
        Self {
            from: patch.from.clone().unwrap_or_else(|| self.from.clone()),
            to: patch.to.clone().unwrap_or_else(|| self.to.clone()),
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

/// Kind of the stock time-range object.
#[derive(Clone, Debug, Default)]
pub struct TimeRange;

impl ObjectKind for TimeRange {
    type State = TimeRangeState;

    fn component(&self) -> &'static str {
        "time-range-picker"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::URL_SYNCABLE
    }
}

/// A scene object carrying the active time range for its subtree.
pub type TimeRangeNode = SceneObject<TimeRange>;

/// Creates a time-range object with the given initial range.
pub fn time_range_node(state: TimeRangeState) -> TimeRangeNode {
    SceneObject::new(TimeRange, state)
}

/// Range operations of a [`TimeRangeNode`].
pub trait TimeRangeExt {
    /// Replaces both ends of the range in one transition.
    fn set_time_range(&self, from: TimeStamp, to: TimeStamp);
}

impl TimeRangeExt for TimeRangeNode {
    fn set_time_range(&self, from: TimeStamp, to: TimeStamp) {
        self.set_state(TimeRangePatch {
            from: Some(from),
            to: Some(to),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn defaults_to_the_last_six_hours() {
        let node = time_range_node(TimeRangeState::default());
        let state = node.state();
        assert_eq!(state.from, TimeStamp::Relative(String::from("now-6h")));
        assert_eq!(state.to, TimeStamp::now());
    }

    #[test]
    fn set_time_range_replaces_both_ends() {
        let node = time_range_node(TimeRangeState::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_inner = seen.clone();
        let _sub = node.subscribe_to_state(move |current, previous| {
            seen_inner
                .borrow_mut()
                .push((previous.clone(), current.clone()));
        });

        node.set_time_range(TimeStamp::Absolute(1_000), TimeStamp::Absolute(2_000));

        let state = node.state();
        assert_eq!(state.from, TimeStamp::Absolute(1_000));
        assert_eq!(state.to, TimeStamp::Absolute(2_000));
        let transitions = seen.borrow();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].0, TimeRangeState::default());
        assert_eq!(transitions[0].1, *state);
    }

    #[test]
    fn partial_patch_keeps_the_other_end() {
        let node = time_range_node(TimeRangeState::default());
        node.set_state(TimeRangePatch {
            from: Some(TimeStamp::Absolute(5)),
            to: None,
        });
        let state = node.state();
        assert_eq!(state.from, TimeStamp::Absolute(5));
        assert_eq!(state.to, TimeStamp::now());
    }

    #[test]
    fn declares_url_sync_and_a_picker_component() {
        let node = time_range_node(TimeRangeState::default());
        assert!(node.capabilities().contains(Capabilities::URL_SYNCABLE));
        assert_eq!(node.component(), "time-range-picker");
    }
}
