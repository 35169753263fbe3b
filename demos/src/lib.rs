// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared building blocks for the Trellis demos.
//!
//! A small dashboard vocabulary — a [`Dashboard`] container and a [`Panel`]
//! leaf — plus builders that wire the reserved slots and behaviors the way
//! the runnable examples expect. The integration tests at the bottom drive
//! `trellis_scene` and `trellis_behaviors` together through this vocabulary.

use trellis_behaviors::query_controller::{QueryController, QueryControllerState, QueryCounter};
use trellis_behaviors::time_range::{TimeRangeState, time_range_node};
use trellis_scene::object::{ObjectKind, SceneBehavior, SceneObject, SceneObjectHandle};
use trellis_scene::state::SceneObjectState;
use trellis_scene::types::Capabilities;

/// A dashboard: a row of panels plus shared machinery in the reserved slots.
#[derive(Clone, Debug)]
pub struct Dashboard;

/// State of a [`Dashboard`] object.
#[derive(Debug)]
pub struct DashboardState {
    /// Title shown in the chrome.
    pub title: String,
    /// Panels laid out by the dashboard, in display order.
    pub panels: Vec<SceneObjectHandle>,
    /// Occupant of the time-range slot, shared by every panel underneath.
    pub time_range: Option<SceneObjectHandle>,
    /// Behaviors started and stopped with the dashboard.
    pub behaviors: Vec<SceneBehavior>,
}

/// Partial update for [`DashboardState`].
#[derive(Debug, Default)]
pub struct DashboardPatch {
    /// New title, if changing.
    pub title: Option<String>,
    /// New panel list, if changing.
    pub panels: Option<Vec<SceneObjectHandle>>,
    /// New slot occupant, if changing. `Some(None)` clears the slot.
    pub time_range: Option<Option<SceneObjectHandle>>,
    /// New behavior list, if changing.
    pub behaviors: Option<Vec<SceneBehavior>>,
}

impl SceneObjectState for DashboardState {
    type Patch = DashboardPatch;

    fn apply(&self, patch: &DashboardPatch) -> Self {
        Self {
            title: patch.title.clone().unwrap_or_else(|| self.title.clone()),
            panels: patch.panels.clone().unwrap_or_else(|| self.panels.clone()),
            time_range: patch
                .time_range
                .clone()
                .unwrap_or_else(|| self.time_range.clone()),
            behaviors: patch
                .behaviors
                .clone()
                .unwrap_or_else(|| self.behaviors.clone()),
        }
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectHandle)) {
        for panel in &self.panels {
            visit(panel);
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

    fn map_children(&self, map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle) -> Self {
        Self {
            title: self.title.clone(),
            panels: self.panels.iter().map(&mut *map).collect(),
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

    fn time_range(&self) -> Option<&SceneObjectHandle> {
        self.time_range.as_ref()
    }

    fn behaviors(&self) -> &[SceneBehavior] {
        &self.behaviors
    }
}

impl ObjectKind for Dashboard {
    type State = DashboardState;

    fn component(&self) -> &'static str {
        "dashboard"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LAYOUT
    }
}

/// A single visualization. Panels hold their query but resolve the time
/// range and query controller through the graph at runtime.
#[derive(Clone, Debug)]
pub struct Panel;

/// State of a [`Panel`] object.
#[derive(Debug)]
pub struct PanelState {
    /// Title shown in the panel header.
    pub title: String,
    /// Query expression the panel renders.
    pub query: String,
}

/// Partial update for [`PanelState`].
#[derive(Debug, Default)]
pub struct PanelPatch {
    /// New title, if changing.
    pub title: Option<String>,
    /// New query expression, if changing.
    pub query: Option<String>,
}

impl SceneObjectState for PanelState {
    type Patch = PanelPatch;

    fn apply(&self, patch: &PanelPatch) -> Self {
        Self {
            title: patch.title.clone().unwrap_or_else(|| self.title.clone()),
            query: patch.query.clone().unwrap_or_else(|| self.query.clone()),
        }
    }

    fn for_each_child(&self, _visit: &mut dyn FnMut(&SceneObjectHandle)) {}

    fn map_children(&self, _map: &mut dyn FnMut(&SceneObjectHandle) -> SceneObjectHandle) -> Self {
        Self {
            title: self.title.clone(),
            query: self.query.clone(),
        }
    }
}

impl ObjectKind for Panel {
    type State = PanelState;

    fn component(&self) -> &'static str {
        "time-series-panel"
    }
}

/// Creates a panel with a stable key.
pub fn panel(key: &str, title: &str, query: &str) -> SceneObject<Panel> {
    SceneObject::with_key(
        key,
        Panel,
        PanelState {
            title: String::from(title),
            query: String::from(query),
        },
    )
}

/// Assembles a dashboard around `panels`: a default time range in the
/// reserved slot and a query controller, fed by `counter`, as a behavior.
pub fn dashboard(
    title: &str,
    panels: Vec<SceneObjectHandle>,
    counter: &QueryCounter,
) -> SceneObject<Dashboard> {
    let range = time_range_node(TimeRangeState::default());
    let controller = SceneObject::new(
        QueryController::new(counter.clone()),
        QueryControllerState::default(),
    );
    SceneObject::new(
        Dashboard,
        DashboardState {
            title: String::from(title),
            panels,
            time_range: Some(range.handle()),
            behaviors: vec![SceneBehavior::Object(controller.handle())],
        },
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use trellis_behaviors::query_controller::{QueryControllerExt, QueryEntry};
    use trellis_behaviors::time_range::{TimeRange, TimeRangeExt, TimeRangeState, TimeStamp};
    use trellis_scene::events::StateChangedEvent;
    use trellis_scene::graph::{find_descendants, nearest_query_controller, nearest_time_range};

    use super::*;

    struct Request;

    impl QueryEntry for Request {}

    #[test]
    fn activation_reaches_slots_and_behaviors_but_not_panels() {
        let counter = QueryCounter::new();
        let cpu = panel("cpu", "CPU", "avg(cpu_usage)");
        let board = dashboard("Overview", vec![cpu.handle()], &counter);

        let range = nearest_time_range(&board.handle()).unwrap();
        let tracker = nearest_query_controller(&board.handle()).unwrap();
        assert!(!range.is_active());
        assert!(!tracker.is_active());

        let guard = board.activate();
        assert!(board.is_active());
        assert!(range.is_active());
        assert!(tracker.is_active());
        assert!(!cpu.is_active());

        drop(guard);
        assert!(!board.is_active());
        assert!(!range.is_active());
        assert!(!tracker.is_active());
    }

    #[test]
    fn panels_resolve_the_controller_and_drive_the_counter() {
        let counter = QueryCounter::new();
        let cpu = panel("cpu", "CPU", "avg(cpu_usage)");
        let board = dashboard("Overview", vec![cpu.handle()], &counter);
        let _guard = board.activate();

        let tracker = nearest_query_controller(&cpu.handle())
            .and_then(|found| found.downcast::<QueryController>())
            .unwrap();

        let transitions = Rc::new(RefCell::new(Vec::new()));
        let seen = transitions.clone();
        let _sub = tracker.subscribe_to_state(move |current, _previous| {
            seen.borrow_mut().push(current.is_running);
        });

        let request: Rc<dyn QueryEntry> = Rc::new(Request);
        tracker.query_started(request.clone());
        assert_eq!(counter.running(), 1);
        tracker.query_completed(&request);
        assert_eq!(counter.running(), 0);
        assert_eq!(*transitions.borrow(), vec![true, false]);
    }

    #[test]
    fn range_changes_bubble_to_the_dashboard() {
        let counter = QueryCounter::new();
        let board = dashboard("Overview", Vec::new(), &counter);
        let _guard = board.activate();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _sub = board.subscribe_to_event::<StateChangedEvent>(move |event| {
            if let Some(state) = event.current_state::<TimeRangeState>() {
                log.borrow_mut().push(state.from.clone());
            }
        });

        let range = nearest_time_range(&board.handle())
            .and_then(|found| found.downcast::<TimeRange>())
            .unwrap();
        range.set_time_range(TimeStamp::Relative(String::from("now-1h")), TimeStamp::now());

        assert_eq!(
            *seen.borrow(),
            vec![TimeStamp::Relative(String::from("now-1h"))]
        );
    }

    #[test]
    fn cloning_a_dashboard_duplicates_the_whole_subtree() {
        let counter = QueryCounter::new();
        let cpu = panel("cpu", "CPU", "avg(cpu_usage)");
        let memory = panel("memory", "Memory", "max(mem_used)");
        let board = dashboard("Overview", vec![cpu.handle(), memory.handle()], &counter);

        let copy = board.clone_object();
        let fresh = find_descendants::<Panel>(&copy.handle());
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].key().as_str(), "cpu");
        assert!(!fresh[0].ptr_eq(&cpu));
        assert!(fresh[0].handle().parent().unwrap().ptr_eq(&copy.handle()));

        // The copy carries its own controller; the original's is untouched.
        let original_tracker = nearest_query_controller(&board.handle()).unwrap();
        let copied_tracker = nearest_query_controller(&copy.handle()).unwrap();
        assert!(!original_tracker.ptr_eq(&copied_tracker));
    }
}
