//! End-to-end scenarios: a document with plugin content, a recording native
//! surface, and an engine driven the way a host would drive it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use plugclick_core::config::EngineConfig;
use plugclick_core::document::{Document, NodeId, NodeKind};
use plugclick_core::event::{Buttons, EventId, EventKind, InputEvent, MouseButton};
use plugclick_core::geometry::Point;
use plugclick_core::policy::SitePolicy;
use plugclick_native::{
    ConfirmReport, NativeBridge, NativeCall, NativeError, NativeOp, RecordingSurface,
    UnsupportedSurface,
};
use plugclick_runtime::{EndReason, Engine, Interception};
use pretty_assertions::assert_eq;
use web_time::Duration;

type TestEngine = Engine<Document, RecordingSurface, SitePolicy>;

struct Page {
    engine: TestEngine,
    surface: RecordingSurface,
    body: NodeId,
    plugin: NodeId,
    next_id: Cell<u64>,
}

impl Page {
    fn new() -> Self {
        Self::with_config("https://example.org/", EngineConfig::default())
    }

    fn with_config(location: &str, config: EngineConfig) -> Self {
        let mut doc = Document::new(location);
        let body = doc.append(doc.root(), NodeKind::element("body"));
        let plugin = doc.append(body, NodeKind::plugin("application/x-shockwave-flash"));
        let surface = RecordingSurface::new();
        let engine = Engine::from_config(doc, surface.clone(), config).unwrap();
        Self {
            engine,
            surface,
            body,
            plugin,
            next_id: Cell::new(1),
        }
    }

    fn event(&self, kind: EventKind, button: MouseButton, target: NodeId, x: i32, y: i32, t: u64) -> InputEvent {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        InputEvent::new(EventId(id), kind, button, Point::new(x, y), target)
            .at(Duration::from_millis(t))
    }

    fn right_down(&self, x: i32, y: i32, t: u64) -> Interception {
        let ev = self.event(EventKind::PointerDown, MouseButton::Secondary, self.plugin, x, y, t);
        self.engine.on_pointer_down(&ev)
    }

    fn right_up(&self, x: i32, y: i32, t: u64) -> Interception {
        let ev = self.event(EventKind::PointerUp, MouseButton::Secondary, self.plugin, x, y, t);
        self.engine.on_pointer_up(&ev)
    }

    fn move_to(&self, x: i32, y: i32, t: u64) -> Interception {
        let ev = self.event(EventKind::PointerMove, MouseButton::Primary, self.plugin, x, y, t);
        self.engine.on_pointer_move(&ev)
    }

    fn reasons(out: &Interception) -> Vec<&'static str> {
        out.ended.iter().map(|end| end.reason.as_str()).collect()
    }
}

// ── Right-click confirmation ─────────────────────────────────────────────

#[test]
fn quick_right_click_is_forwarded_and_confirmed_natively() {
    let page = Page::new();

    let down = page.right_down(100, 100, 0);
    assert!(down.suppress_original);
    assert!(down.armed);
    assert!(down.dispatched.is_empty());

    let up = page.right_up(105, 103, 120);
    assert!(up.suppress_original);
    assert_eq!(Page::reasons(&up), vec!["confirmed"]);

    let dispatched = page.engine.host().dispatched();
    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].target, page.body);
    assert_eq!(dispatched[0].event.kind, EventKind::PointerDown);
    assert_eq!(dispatched[0].event.client, Point::new(100, 100));
    assert_eq!(dispatched[1].target, page.body);
    assert_eq!(dispatched[1].event.kind, EventKind::PointerUp);
    assert_eq!(dispatched[1].event.client, Point::new(105, 103));
    assert!(dispatched.iter().all(|record| record.event.synthetic));

    assert_eq!(
        page.surface.calls(),
        vec![
            NativeCall::InstallHook,
            NativeCall::RecordFocus,
            NativeCall::ClearFocus,
            NativeCall::RestoreFocus,
            NativeCall::SynthesizeClick(Point::new(105, 103)),
        ]
    );
    assert_eq!(page.engine.active_sessions(), 0);
    assert_eq!(page.engine.pending_timers(), 0);
    assert_eq!(page.engine.active_listeners(), 2);
}

#[test]
fn release_on_threshold_boundary_confirms() {
    let page = Page::new();
    page.right_down(100, 100, 0);
    let up = page.right_up(110, 90, 10);
    assert_eq!(Page::reasons(&up), vec!["confirmed"]);
    assert_eq!(page.surface.clicks(), vec![Point::new(110, 90)]);
}

#[test]
fn far_release_is_a_gesture() {
    let page = Page::new();
    page.right_down(100, 100, 0);

    let up = page.right_up(300, 100, 50);
    assert!(!up.suppress_original);
    assert_eq!(
        up.ended[0].reason,
        EndReason::ReleasedAway {
            at: Point::new(300, 100)
        }
    );
    assert!(page.engine.host().dispatched().is_empty());
    assert!(page.surface.clicks().is_empty());
}

// ── Gesture aborts ───────────────────────────────────────────────────────

#[test]
fn window_elapsing_aborts_the_session() {
    let page = Page::new();
    page.right_down(100, 100, 0);

    assert!(page.engine.advance_to(Duration::from_millis(299)).is_empty());
    let ended = page.engine.advance_to(Duration::from_millis(300));
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].reason, EndReason::TimedOut);
    assert_eq!(page.engine.pending_timers(), 0);

    let up = page.right_up(100, 100, 350);
    assert!(up.is_pass_through());
    assert!(page.engine.host().dispatched().is_empty());
    assert!(page.surface.clicks().is_empty());
}

#[test]
fn late_release_times_out_before_it_is_classified() {
    let page = Page::new();
    page.right_down(100, 100, 0);
    let up = page.right_up(100, 100, 400);
    assert_eq!(Page::reasons(&up), vec!["timed_out"]);
    assert!(!up.suppress_original);
    assert!(page.surface.clicks().is_empty());
}

#[test]
fn moving_past_threshold_aborts_the_session() {
    let page = Page::new();
    page.right_down(100, 100, 0);

    let near = page.move_to(110, 110, 10);
    assert!(near.ended.is_empty());
    assert_eq!(page.engine.active_sessions(), 1);

    let far = page.move_to(111, 100, 20);
    assert_eq!(
        far.ended[0].reason,
        EndReason::Moved {
            to: Point::new(111, 100)
        }
    );
    assert_eq!(page.engine.active_sessions(), 0);

    let up = page.right_up(100, 100, 40);
    assert!(up.is_pass_through());
    assert!(page.surface.clicks().is_empty());
}

#[test]
fn moves_without_a_session_are_not_listened_to() {
    let page = Page::new();
    assert!(page.move_to(500, 500, 0).is_pass_through());
}

#[test]
fn new_press_supersedes_the_armed_session() {
    let page = Page::new();
    page.right_down(100, 100, 0);
    let second = page.right_down(200, 200, 100);

    assert_eq!(Page::reasons(&second), vec!["superseded"]);
    assert!(second.armed);
    assert_eq!(page.engine.active_sessions(), 1);
    assert_eq!(page.engine.pending_timers(), 1);

    // The first window would have closed at 300; only the second one counts.
    assert!(page.engine.advance_to(Duration::from_millis(350)).is_empty());
    let up = page.right_up(200, 200, 360);
    assert_eq!(Page::reasons(&up), vec!["confirmed"]);
}

// ── Forwarding of other presses ──────────────────────────────────────────

#[test]
fn primary_press_on_plugin_is_forwarded_at_once() {
    let page = Page::new();
    let ev = page.event(EventKind::PointerDown, MouseButton::Primary, page.plugin, 7, 9, 0);
    let out = page.engine.on_pointer_down(&ev);

    assert!(!out.suppress_original);
    assert!(!out.armed);
    assert_eq!(out.dispatched.len(), 1);
    assert_eq!(out.dispatched[0].target, page.body);
    assert_eq!(page.engine.active_sessions(), 0);
}

#[test]
fn chorded_press_without_a_session_is_forwarded() {
    let page = Page::new();
    let ev = page
        .event(EventKind::PointerDown, MouseButton::Primary, page.plugin, 7, 9, 0)
        .with_buttons(Buttons::PRIMARY | Buttons::SECONDARY);
    let out = page.engine.on_pointer_down(&ev);
    assert!(!out.armed);
    assert!(!out.suppress_original);
    assert_eq!(out.dispatched.len(), 1);
    assert_eq!(page.engine.active_sessions(), 0);
}

#[test]
fn rocker_chord_aborts_without_a_native_click() {
    let page = Page::new();
    assert!(page.right_down(100, 100, 0).armed);

    let left_down = page
        .event(EventKind::PointerDown, MouseButton::Primary, page.plugin, 100, 100, 40)
        .with_buttons(Buttons::PRIMARY | Buttons::SECONDARY);
    let chord = page.engine.on_pointer_down(&left_down);
    assert_eq!(Page::reasons(&chord), vec!["chorded"]);
    assert_eq!(
        chord.ended[0].reason,
        EndReason::Chorded {
            button: MouseButton::Primary
        }
    );
    assert!(!chord.armed);
    assert!(!chord.suppress_original);
    assert_eq!(page.engine.active_sessions(), 0);
    assert_eq!(page.engine.pending_timers(), 0);

    let left_up = page
        .event(EventKind::PointerUp, MouseButton::Primary, page.plugin, 100, 100, 60)
        .with_buttons(Buttons::SECONDARY);
    assert!(page.engine.on_pointer_up(&left_up).is_pass_through());
    assert!(page.right_up(100, 100, 80).is_pass_through());

    assert!(page.surface.clicks().is_empty());
    // Only the user's left press reaches the page.
    let forwarded: Vec<(EventKind, MouseButton)> = page
        .engine
        .host()
        .dispatched()
        .iter()
        .map(|record| (record.event.kind, record.event.button))
        .collect();
    assert_eq!(forwarded, vec![(EventKind::PointerDown, MouseButton::Primary)]);
    assert_eq!(page.engine.active_listeners(), 2);
}

#[test]
fn nested_plugin_forwards_past_every_plugin_ancestor() {
    let mut doc = Document::new("https://example.org/");
    let body = doc.append(doc.root(), NodeKind::element("body"));
    let object = doc.append(body, NodeKind::plugin("application/x-java-applet"));
    let embed = doc.append(object, NodeKind::plugin("application/x-java-applet"));
    let engine =
        Engine::from_config(doc, RecordingSurface::new(), EngineConfig::default()).unwrap();

    let press = InputEvent::new(EventId(1), EventKind::PointerDown, MouseButton::Secondary, Point::new(1, 1), embed);
    let release = InputEvent::new(EventId(2), EventKind::PointerUp, MouseButton::Secondary, Point::new(1, 1), embed)
        .at(Duration::from_millis(5));
    engine.on_pointer_down(&press);
    engine.on_pointer_up(&release);

    let targets: Vec<NodeId> = engine.host().dispatched().iter().map(|r| r.target).collect();
    assert_eq!(targets, vec![body, body]);
}

#[test]
fn non_plugin_content_is_untouched() {
    let page = Page::new();
    let down = page.event(EventKind::PointerDown, MouseButton::Secondary, page.body, 0, 0, 0);
    let up = page.event(EventKind::PointerUp, MouseButton::Secondary, page.body, 0, 0, 10);

    assert!(page.engine.on_pointer_down(&down).is_pass_through());
    assert!(page.engine.on_pointer_up(&up).is_pass_through());
    assert_eq!(page.engine.on_plugin_instantiated(page.body), None);
    assert!(page.surface.clicks().is_empty());
}

// ── Policy ───────────────────────────────────────────────────────────────

#[test]
fn disabled_site_passes_everything_through() {
    let config = EngineConfig {
        disabled_sites: vec!["example.org".into()],
        ..EngineConfig::default()
    };
    let page = Page::with_config("https://www.example.org/game", config);

    assert_eq!(page.engine.on_plugin_instantiated(page.plugin), Some(false));
    assert!(page.right_down(10, 10, 0).is_pass_through());
    assert!(page.right_up(10, 10, 20).is_pass_through());
    assert!(!page.engine.on_focus(page.plugin));
    assert!(page.engine.host().dispatched().is_empty());
}

#[test]
fn policy_is_asked_once_per_element() {
    let mut doc = Document::new("https://example.org/");
    let body = doc.append(doc.root(), NodeKind::element("body"));
    let plugin = doc.append(body, NodeKind::plugin("application/x-test"));
    let asked = Rc::new(Cell::new(0));
    let counter = asked.clone();
    let policy = move |_: &str| {
        counter.set(counter.get() + 1);
        true
    };
    let mut engine = Engine::new(
        doc,
        NativeBridge::new(RecordingSurface::new()),
        policy,
        EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(engine.on_plugin_instantiated(plugin), Some(true));
    for t in 0..5 {
        let press = InputEvent::new(EventId(t), EventKind::PointerDown, MouseButton::Primary, Point::new(0, 0), plugin)
            .at(Duration::from_millis(t));
        engine.on_pointer_down(&press);
    }
    assert_eq!(asked.get(), 1);

    // Slot reuse gives the replacement the same identity with a new generation.
    engine.host_mut().remove(plugin);
    let replacement = engine
        .host_mut()
        .append(body, NodeKind::plugin("application/x-test"));
    assert_eq!(replacement, plugin);
    assert_eq!(engine.on_plugin_instantiated(replacement), Some(true));
    assert_eq!(asked.get(), 2);
}

// ── Native degradation and echoes ────────────────────────────────────────

#[test]
fn unsupported_platform_still_forwards_the_click() {
    let mut doc = Document::new("https://example.org/");
    let body = doc.append(doc.root(), NodeKind::element("body"));
    let plugin = doc.append(body, NodeKind::plugin("application/x-test"));
    let engine = Engine::from_config(doc, UnsupportedSurface, EngineConfig::default()).unwrap();
    assert!(!engine.holds_hook());

    let press = InputEvent::new(EventId(1), EventKind::PointerDown, MouseButton::Secondary, Point::new(3, 3), plugin);
    let release = InputEvent::new(EventId(2), EventKind::PointerUp, MouseButton::Secondary, Point::new(3, 3), plugin)
        .at(Duration::from_millis(30));
    engine.on_pointer_down(&press);
    let up = engine.on_pointer_up(&release);

    assert!(up.suppress_original);
    assert_eq!(up.dispatched.len(), 2);
    assert_eq!(
        up.ended[0].reason,
        EndReason::Confirmed {
            at: Point::new(3, 3),
            native: Some(ConfirmReport::Degraded {
                op: NativeOp::RecordFocus,
                error: NativeError::Unsupported,
                clicked: false,
            }),
        }
    );
    assert!(!engine.gate().is_held());
}

#[test]
fn synthesized_click_echo_is_ignored() {
    let page = Page::new();
    let engine = Rc::new(page.engine);
    let plugin = page.plugin;
    let echoes: Rc<RefCell<Vec<Interception>>> = Rc::default();

    let weak = Rc::downgrade(&engine);
    let seen = echoes.clone();
    page.surface.on_click(move |at| {
        let Some(engine) = weak.upgrade() else {
            return;
        };
        let down = InputEvent::new(EventId(100), EventKind::PointerDown, MouseButton::Secondary, at, plugin)
            .at(Duration::from_millis(121));
        let up = InputEvent::new(EventId(101), EventKind::PointerUp, MouseButton::Secondary, at, plugin)
            .at(Duration::from_millis(121));
        seen.borrow_mut().push(engine.on_pointer_down(&down));
        seen.borrow_mut().push(engine.on_pointer_up(&up));
        assert!(!engine.on_focus(plugin));
    });

    let down = InputEvent::new(EventId(1), EventKind::PointerDown, MouseButton::Secondary, Point::new(50, 50), plugin);
    let up = InputEvent::new(EventId(2), EventKind::PointerUp, MouseButton::Secondary, Point::new(50, 50), plugin)
        .at(Duration::from_millis(120));
    engine.on_pointer_down(&down);
    engine.on_pointer_up(&up);

    assert_eq!(page.surface.clicks(), vec![Point::new(50, 50)]);
    assert_eq!(echoes.borrow().len(), 2);
    assert!(echoes.borrow().iter().all(Interception::is_pass_through));
    assert_eq!(engine.host().dispatched().len(), 2);
    assert_eq!(engine.active_sessions(), 0);
    assert!(!engine.gate().is_held());
}

#[test]
fn echo_delivered_after_the_confirm_returns_is_ignored() {
    let page = Page::new();
    page.right_down(50, 50, 0);
    page.right_up(50, 50, 100);
    assert_eq!(page.surface.clicks(), vec![Point::new(50, 50)]);
    assert!(!page.engine.gate().is_held());
    assert_eq!(page.engine.outstanding_echoes(), 1);

    // The OS queue hands the synthesized press and release back later.
    let at = page.surface.clicks()[0];
    let down = page.right_down(at.x, at.y, 130);
    assert!(down.is_pass_through());
    assert_eq!(page.engine.active_sessions(), 0);
    let up = page.right_up(at.x, at.y, 131);
    assert!(up.is_pass_through());
    assert_eq!(page.engine.outstanding_echoes(), 0);
    assert_eq!(page.surface.clicks().len(), 1);
    assert_eq!(page.engine.host().dispatched().len(), 2);

    // The next right-click is the user's again.
    assert!(page.right_down(50, 50, 200).armed);
    assert_eq!(Page::reasons(&page.right_up(50, 50, 220)), vec!["confirmed"]);
    assert_eq!(page.surface.clicks().len(), 2);
}

#[test]
fn failed_click_expects_no_echo() {
    let page = Page::new();
    page.surface.fail_on(NativeOp::SynthesizeClick);
    page.right_down(50, 50, 0);
    page.right_up(50, 50, 100);
    assert_eq!(page.engine.outstanding_echoes(), 0);
    assert!(page.right_down(50, 50, 130).armed);
}

#[test]
fn element_removed_before_release_loses_the_click() {
    let mut page = Page::new();
    page.right_down(10, 10, 0);
    let plugin = page.plugin;
    page.engine.host_mut().remove(plugin);

    let up = page.right_up(10, 10, 20);
    assert!(up.suppress_original);
    assert_eq!(Page::reasons(&up), vec!["target_lost"]);
    assert!(page.surface.clicks().is_empty());
    assert!(page.engine.host().dispatched().is_empty());
}

// ── Focus shield ─────────────────────────────────────────────────────────

#[test]
fn plugin_focus_is_blurred_with_native_focus_preserved() {
    let page = Page::new();
    assert!(page.engine.on_focus(page.plugin));
    assert_eq!(page.engine.host().blurred(), vec![page.plugin]);
    assert_eq!(page.surface.count(NativeOp::RecordFocus), 1);
    assert_eq!(page.surface.count(NativeOp::RestoreFocus), 1);
    assert_eq!(page.engine.focus_shielded(), 1);
    assert!(!page.engine.gate().is_held());

    assert!(!page.engine.on_focus(page.body));
    assert_eq!(page.engine.host().blurred().len(), 1);
}

#[test]
fn focus_shield_skips_blur_without_recorded_focus() {
    let page = Page::new();
    page.surface.fail_on(NativeOp::RecordFocus);
    assert!(!page.engine.on_focus(page.plugin));
    assert!(page.engine.host().blurred().is_empty());
    assert_eq!(page.engine.focus_shielded(), 0);
}

// ── Teardown ─────────────────────────────────────────────────────────────

#[test]
fn uninit_releases_everything_and_is_idempotent() {
    let page = Page::new();
    page.right_down(10, 10, 0);
    assert_eq!(page.engine.active_listeners(), 4);
    assert_eq!(page.engine.pending_timers(), 1);

    let teardown = page.engine.uninit();
    assert_eq!(teardown.sessions.len(), 1);
    assert_eq!(teardown.sessions[0].reason, EndReason::Cancelled);
    assert_eq!(teardown.listeners_removed, 4);
    assert_eq!(teardown.timers_cancelled, 1);
    assert_eq!(page.engine.active_listeners(), 0);
    assert_eq!(page.engine.pending_timers(), 0);
    assert!(!page.engine.is_live());
    assert_eq!(page.surface.count(NativeOp::UninstallHook), 1);

    let again = page.engine.uninit();
    assert!(again.sessions.is_empty());
    assert_eq!(again.listeners_removed, 0);
    assert!(page.engine.advance_to(Duration::from_secs(10)).is_empty());
    assert!(page.right_up(10, 10, 20).is_pass_through());
}

#[test]
fn dropping_the_engine_uninstalls_the_hook() {
    let page = Page::new();
    let surface = page.surface.clone();
    drop(page);
    assert_eq!(surface.count(NativeOp::InstallHook), 1);
    assert_eq!(surface.count(NativeOp::UninstallHook), 1);
}
