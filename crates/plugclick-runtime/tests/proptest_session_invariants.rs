//! Property-based invariant tests for gesture sessions and engine teardown.
//!
//! ## Invariants
//!
//! 1. Resource accounting: every live session holds exactly two listeners
//!    and one timer on top of the two document-wide listeners
//! 2. At most one native click per confirmed session, and none otherwise
//! 3. Classification: a single press/release pair confirms iff the release
//!    is within the distance threshold and strictly before the deadline
//! 4. Teardown leaves no listeners, timers or sessions, whatever came before
//! 5. Each session ends at most once

use std::collections::HashSet;

use plugclick_core::config::{DISTANCE_THRESHOLD, EngineConfig, GESTURE_WINDOW};
use plugclick_core::document::{Document, NodeId, NodeKind};
use plugclick_core::event::{EventId, EventKind, InputEvent, MouseButton};
use plugclick_core::geometry::Point;
use plugclick_core::policy::SitePolicy;
use plugclick_native::RecordingSurface;
use plugclick_runtime::{Engine, SessionEnd};
use proptest::prelude::*;
use web_time::Duration;

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Down { button: MouseButton, plugin: usize, at: (i32, i32) },
    Move { at: (i32, i32) },
    Up { button: MouseButton, plugin: usize, at: (i32, i32) },
    Wait,
}

fn arb_button() -> impl Strategy<Value = MouseButton> {
    prop_oneof![
        3 => Just(MouseButton::Secondary),
        1 => Just(MouseButton::Primary),
        1 => Just(MouseButton::Auxiliary),
    ]
}

fn arb_point() -> impl Strategy<Value = (i32, i32)> {
    (80i32..=120, 80i32..=120)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_button(), 0usize..3, arb_point())
            .prop_map(|(button, plugin, at)| Op::Down { button, plugin, at }),
        arb_point().prop_map(|at| Op::Move { at }),
        (arb_button(), 0usize..3, arb_point())
            .prop_map(|(button, plugin, at)| Op::Up { button, plugin, at }),
        Just(Op::Wait),
    ]
}

fn arb_script() -> impl Strategy<Value = Vec<(Op, u64)>> {
    prop::collection::vec((arb_op(), 0u64..200), 1..40)
}

// ── Harness ───────────────────────────────────────────────────────────────

struct Harness {
    engine: Engine<Document, RecordingSurface, SitePolicy>,
    surface: RecordingSurface,
    plugins: Vec<NodeId>,
    now: u64,
    next_id: u64,
}

impl Harness {
    fn new() -> Self {
        let mut doc = Document::new("https://example.org/");
        let body = doc.append(doc.root(), NodeKind::element("body"));
        let plugins = (0..3)
            .map(|_| doc.append(body, NodeKind::plugin("application/x-test")))
            .collect();
        let surface = RecordingSurface::new();
        let engine = Engine::from_config(doc, surface.clone(), EngineConfig::default()).unwrap();
        Self {
            engine,
            surface,
            plugins,
            now: 0,
            next_id: 0,
        }
    }

    fn event(&mut self, kind: EventKind, button: MouseButton, target: NodeId, at: (i32, i32)) -> InputEvent {
        self.next_id += 1;
        InputEvent::new(EventId(self.next_id), kind, button, Point::new(at.0, at.1), target)
            .at(Duration::from_millis(self.now))
    }

    fn apply(&mut self, op: &Op, dt: u64) -> Vec<SessionEnd> {
        self.now += dt;
        match *op {
            Op::Down { button, plugin, at } => {
                let ev = self.event(EventKind::PointerDown, button, self.plugins[plugin], at);
                self.engine.on_pointer_down(&ev).ended
            }
            Op::Move { at } => {
                let ev = self.event(EventKind::PointerMove, MouseButton::Primary, self.plugins[0], at);
                self.engine.on_pointer_move(&ev).ended
            }
            Op::Up { button, plugin, at } => {
                let ev = self.event(EventKind::PointerUp, button, self.plugins[plugin], at);
                self.engine.on_pointer_up(&ev).ended
            }
            Op::Wait => self.engine.advance_to(Duration::from_millis(self.now)),
        }
    }

    fn assert_accounting(&self) {
        let sessions = self.engine.active_sessions();
        assert_eq!(self.engine.active_listeners(), 2 + 2 * sessions);
        assert_eq!(self.engine.pending_timers(), sessions);
    }
}

// ── 1, 2, 5. Accounting, click count, single end ─────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn sessions_account_for_their_resources(script in arb_script()) {
        let mut harness = Harness::new();
        let mut ended = Vec::new();
        for (op, dt) in &script {
            ended.extend(harness.apply(op, *dt));
            harness.assert_accounting();
        }

        let confirmed = ended.iter().filter(|end| end.reason.is_confirmed()).count();
        prop_assert_eq!(harness.surface.clicks().len(), confirmed);

        let mut seen = HashSet::new();
        for end in &ended {
            prop_assert!(seen.insert((end.node, end.serial)), "session ended twice: {:?}", end);
        }
    }

    // ── 4. Teardown ──────────────────────────────────────────────────────

    #[test]
    fn teardown_always_leaves_nothing(script in arb_script()) {
        let mut harness = Harness::new();
        for (op, dt) in &script {
            harness.apply(op, *dt);
        }
        let live = harness.engine.active_sessions();
        let teardown = harness.engine.uninit();
        prop_assert_eq!(teardown.sessions.len(), live);
        prop_assert_eq!(harness.engine.active_listeners(), 0);
        prop_assert_eq!(harness.engine.pending_timers(), 0);
        prop_assert_eq!(harness.engine.active_sessions(), 0);
        prop_assert!(harness.engine.uninit().sessions.is_empty());
    }
}

// ── 3. Classification ─────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn single_pair_confirms_within_distance_and_window(
        dx in -30i32..=30,
        dy in -30i32..=30,
        dt in 0u64..500,
    ) {
        let mut harness = Harness::new();
        harness.apply(&Op::Down { button: MouseButton::Secondary, plugin: 0, at: (100, 100) }, 0);
        let ended = harness.apply(
            &Op::Up { button: MouseButton::Secondary, plugin: 0, at: (100 + dx, 100 + dy) },
            dt,
        );

        let near = dx.unsigned_abs() <= DISTANCE_THRESHOLD && dy.unsigned_abs() <= DISTANCE_THRESHOLD;
        let in_time = u128::from(dt) < GESTURE_WINDOW.as_millis();
        let confirmed = ended.iter().any(|end| end.reason.is_confirmed());
        prop_assert_eq!(confirmed, near && in_time);
        prop_assert_eq!(harness.surface.clicks().len(), usize::from(confirmed));
        prop_assert_eq!(harness.engine.active_sessions(), 0);
    }
}
