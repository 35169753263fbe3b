// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A miniature dashboard assembled from scene objects.
//!
//! The example wires together:
//! - the `Dashboard` and `Panel` kinds from `trellis_demos`,
//! - a shared time-range object sitting in the dashboard's reserved slot,
//! - a query-controller behavior that tracks in-flight panel queries.
//!
//! It then activates the root, lets panels look up the shared objects
//! through the graph, drives a time-range change and a query lifecycle, and
//! finishes with a deep clone of a panel.
//!
//! Run:
//! - `cargo run -p trellis_demos --example dashboard`
//! - prefix with `RUST_LOG=debug` to watch activation and teardown logs.

use std::rc::Rc;

use trellis_behaviors::query_controller::{
    QueryController, QueryControllerExt, QueryCounter, QueryEntry,
};
use trellis_behaviors::time_range::{TimeRange, TimeRangeExt, TimeStamp};
use trellis_demos::{Panel, PanelPatch, dashboard, panel};
use trellis_scene::events::StateChangedEvent;
use trellis_scene::graph::{find_descendants, nearest_query_controller, nearest_time_range};

/// Stand-in for an in-flight data request; cancellation just prints.
struct PanelQuery {
    panel: String,
}

impl QueryEntry for PanelQuery {
    fn cancel(&self) {
        println!("  cancel requested for the {} query", self.panel);
    }
}

fn main() {
    env_logger::init();

    // Shared services injected at composition time.
    let counter = QueryCounter::new();

    // Leaves first, then the root that owns them.
    let cpu = panel("cpu", "CPU", "avg(cpu_usage)");
    let memory = panel("memory", "Memory", "max(mem_used)");
    let board = dashboard(
        "Host overview",
        vec![cpu.handle(), memory.handle()],
        &counter,
    );

    // Every state transition in the graph bubbles to the root.
    let _changes = board.subscribe_to_event::<StateChangedEvent>(|event| {
        println!("  state changed at {}", event.source.key());
    });

    // Activating the root activates the slot occupant and the behavior too.
    let active = board.activate();
    let range = nearest_time_range(&board.handle())
        .and_then(|found| found.downcast::<TimeRange>())
        .expect("the builder fills the time-range slot");
    println!(
        "activated {:?}: range active = {}, from {:?} to {:?}",
        board.state().title,
        range.is_active(),
        range.state().from,
        range.state().to,
    );

    // Panels resolve shared machinery through the graph, not through
    // constructor wiring.
    for found in find_descendants::<Panel>(&board.handle()) {
        let shared = nearest_time_range(&found.handle());
        println!(
            "panel {} ({:?}) sees time range {:?}",
            found.key(),
            found.state().title,
            shared.map(|occupant| occupant.key().clone()),
        );
    }

    // A range change is one frozen-state swap; the root subscriber above
    // reports it.
    println!("moving the range to the last 24 hours:");
    range.set_time_range(TimeStamp::Relative(String::from("now-24h")), TimeStamp::now());

    // Drive the query lifecycle a panel would run against the controller.
    let tracker = nearest_query_controller(&cpu.handle())
        .and_then(|found| found.downcast::<QueryController>())
        .expect("the builder attaches a query controller");
    let request: Rc<dyn QueryEntry> = Rc::new(PanelQuery {
        panel: String::from("cpu"),
    });
    tracker.query_started(request.clone());
    println!("queries in flight: {}", counter.running());
    tracker.cancel_all();
    tracker.query_completed(&request);
    println!("queries in flight: {}", counter.running());

    // Deep clone: same key, fresh instance, overrides applied last.
    let copy = cpu.clone_object_with(PanelPatch {
        title: Some(String::from("CPU (copy)")),
        query: None,
    });
    println!(
        "cloned panel {} titled {:?} running {:?}",
        copy.key(),
        copy.state().title,
        copy.state().query,
    );

    drop(active);
    println!("dashboard released: active = {}", board.is_active());
}
