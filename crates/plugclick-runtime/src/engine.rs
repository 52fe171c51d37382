#![forbid(unsafe_code)]

//! The composed interception engine.
//!
//! [`Engine`] wires the [`Interceptor`], the [`Disambiguator`] and the
//! [`FocusShield`] to a content host, a native bridge and a simulation
//! policy. The host feeds it every pointer and focus event and reports the
//! passage of time; the engine answers with an [`Interception`] record
//! telling the host whether to suppress the original event.
//!
//! # Re-entrancy
//!
//! Every entry point takes `&self`. Internal state lives in a `RefCell`
//! that is never borrowed across a call into the host, the policy or the
//! native bridge, so those calls may re-enter the engine. Events that
//! arrive while a native operation holds the [`ConfirmGate`] are echoes of
//! that operation and are ignored. The OS usually delivers a synthesized
//! click later, after the gate is free; the [`EchoFilter`] recognizes that
//! press and release by position and lets them through untouched.
//!
//! # Teardown
//!
//! [`Engine::uninit`] cancels every session and timer, removes every
//! listener and releases the input hook. It is idempotent, runs on drop,
//! and afterwards every entry point is a no-op.

use std::cell::{Cell, RefCell};
use std::fmt;

use plugclick_core::config::EngineConfig;
use plugclick_core::document::{ContentHost, NodeId, PluginSurfaceRef};
use plugclick_core::event::{EventId, InputEvent};
use plugclick_core::policy::{SimulationPolicy, SitePolicy};
use plugclick_native::{ConfirmReport, HookGuard, InputHookSurface, NativeBridge};
use web_time::Duration;

use crate::disambiguator::{ConfirmedClick, Disambiguator, Release, SessionEnd, SessionKey};
use crate::echo::EchoFilter;
use crate::focus::FocusShield;
use crate::gate::{ConfirmGate, GateOutcome};
use crate::interceptor::{
    Dispatched, Interception, Interceptor, PressPlan, VERDICT_PRUNE_THRESHOLD,
};
use crate::listener::{ListenerKind, ListenerRegistry};
use crate::timer::TimerQueue;

/// Forwarded copies get identities from this range to stay clear of host ids.
const FORWARDED_ID_BASE: u64 = 1 << 63;

/// Errors from building an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The configuration failed validation.
    InvalidConfig(Vec<String>),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(errors) => {
                write!(f, "invalid engine config: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Summary of an [`Engine::uninit`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Teardown {
    /// Sessions cancelled.
    pub sessions: Vec<SessionEnd>,
    /// Listener registrations removed.
    pub listeners_removed: usize,
    /// Pending timers cancelled.
    pub timers_cancelled: usize,
}

struct EngineState {
    live: bool,
    timers: TimerQueue<SessionKey>,
    listeners: ListenerRegistry,
    interceptor: Interceptor,
    disambiguator: Disambiguator,
    echoes: EchoFilter,
    focus: FocusShield,
}

/// Right-click interception engine for plugin content.
pub struct Engine<H, S, P>
where
    H: ContentHost,
    S: InputHookSurface,
    P: SimulationPolicy,
{
    host: H,
    bridge: NativeBridge<S>,
    policy: P,
    config: EngineConfig,
    gate: ConfirmGate,
    state: RefCell<EngineState>,
    hook: RefCell<Option<HookGuard<S>>>,
    next_event: Cell<u64>,
}

impl<H, S> Engine<H, S, SitePolicy>
where
    H: ContentHost,
    S: InputHookSurface,
{
    /// Build an engine whose policy is the config's site policy.
    pub fn from_config(host: H, surface: S, config: EngineConfig) -> Result<Self, EngineError> {
        let policy = config.site_policy();
        Self::new(host, NativeBridge::new(surface), policy, config)
    }
}

impl<H, S, P> Engine<H, S, P>
where
    H: ContentHost,
    S: InputHookSurface,
    P: SimulationPolicy,
{
    /// Build an engine and register its document-wide listeners.
    ///
    /// Fails only on an invalid `config`. A hook that cannot be installed is
    /// logged; the engine then runs with native steps degraded.
    pub fn new(
        host: H,
        bridge: NativeBridge<S>,
        policy: P,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(EngineError::InvalidConfig(errors));
        }

        let mut listeners = ListenerRegistry::new();
        let mut interceptor = Interceptor::new();
        interceptor.attach(&mut listeners);
        let mut focus = FocusShield::new();
        focus.attach(&mut listeners);

        let hook = match bridge.acquire_hook() {
            Ok(guard) => Some(guard),
            Err(error) => {
                tracing::warn!(target: "plugclick.engine", %error, "input hook unavailable");
                None
            }
        };

        tracing::debug!(
            target: "plugclick.engine",
            gesture_window_ms = config.gesture_window_ms,
            distance_threshold = config.distance_threshold,
            "engine initialized"
        );

        Ok(Self {
            host,
            bridge,
            policy,
            gate: ConfirmGate::new(),
            state: RefCell::new(EngineState {
                live: true,
                timers: TimerQueue::new(),
                listeners,
                interceptor,
                disambiguator: Disambiguator::new(&config),
                echoes: EchoFilter::new(&config),
                focus,
            }),
            config,
            hook: RefCell::new(hook),
            next_event: Cell::new(0),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access, for hosts that mutate their tree in place.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn bridge(&self) -> &NativeBridge<S> {
        &self.bridge
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn gate(&self) -> &ConfirmGate {
        &self.gate
    }

    /// Whether [`uninit`](Self::uninit) has not run yet.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state.borrow().live
    }

    #[must_use]
    pub fn active_listeners(&self) -> usize {
        self.state.borrow().listeners.active_count()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.pending()
    }

    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.state.borrow().disambiguator.active()
    }

    /// Whether a gesture session is armed on `node`.
    #[must_use]
    pub fn has_session(&self, node: NodeId) -> bool {
        self.state.borrow().disambiguator.session(node).is_some()
    }

    /// Number of focus events the shield acted on.
    #[must_use]
    pub fn focus_shielded(&self) -> u64 {
        self.state.borrow().focus.shielded()
    }

    /// Synthesized clicks whose echo has not fully come back.
    #[must_use]
    pub fn outstanding_echoes(&self) -> usize {
        self.state.borrow().echoes.outstanding()
    }

    /// Whether the input hook is held by this engine.
    #[must_use]
    pub fn holds_hook(&self) -> bool {
        self.hook.borrow().is_some()
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Handle a press anywhere in the document.
    pub fn on_pointer_down(&self, event: &InputEvent) -> Interception {
        let mut out = Interception::default();
        if self.absorb_echo(event) || !self.accepts(ListenerKind::PointerDown) {
            return out;
        }
        out.ended = self.advance_to(event.timestamp);

        let Some(surface) = PluginSurfaceRef::capture(&self.host, event.target) else {
            return out;
        };
        if !self.simulation_enabled(surface) {
            tracing::debug!(
                target: "plugclick.intercept",
                node = %event.target,
                "simulation disabled for plugin content"
            );
            return out;
        }

        let chorded = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            state
                .disambiguator
                .on_chord(event, &mut state.timers, &mut state.listeners)
        };
        if let Some(end) = chorded {
            tracing::debug!(
                target: "plugclick.gesture",
                node = %event.target,
                button = event.button.dom_index(),
                secondary_held = event.holds_secondary(),
                "chorded press"
            );
            log_session_end(&end);
            out.ended.push(end);
        }

        match PressPlan::for_press(event) {
            PressPlan::Defer => {
                let (superseded, timer, listeners) = {
                    let mut state = self.state.borrow_mut();
                    let state = &mut *state;
                    let superseded = state.disambiguator.arm(
                        surface,
                        event.clone(),
                        &mut state.timers,
                        &mut state.listeners,
                    );
                    let session = state.disambiguator.session(event.target);
                    (
                        superseded,
                        session.map(|session| session.timer().raw()),
                        session.map(|session| session.listeners().map(|handle| handle.raw())),
                    )
                };
                if let Some(end) = superseded {
                    log_session_end(&end);
                    out.ended.push(end);
                }
                tracing::debug!(
                    target: "plugclick.gesture",
                    node = %event.target,
                    x = event.client.x,
                    y = event.client.y,
                    timer = ?timer,
                    listeners = ?listeners,
                    "possible gesture: armed"
                );
                out.suppress_original = true;
                out.armed = true;
            }
            PressPlan::Forward => match surface.safe_parent(&self.host) {
                Some(parent) => {
                    if let Some(dispatched) = self.forward(event, parent) {
                        out.dispatched.push(dispatched);
                    }
                }
                None => tracing::warn!(
                    target: "plugclick.intercept",
                    node = %event.target,
                    "plugin content has no safe parent"
                ),
            },
        }
        out
    }

    /// Handle pointer movement anywhere in the document.
    pub fn on_pointer_move(&self, event: &InputEvent) -> Interception {
        let mut out = Interception::default();
        if !self.accepts(ListenerKind::PointerMove) {
            return out;
        }
        out.ended = self.advance_to(event.timestamp);

        let moved = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            state
                .disambiguator
                .on_move(event, &mut state.timers, &mut state.listeners)
        };
        for end in &moved {
            log_session_end(end);
        }
        out.ended.extend(moved);
        out
    }

    /// Handle a release anywhere in the document.
    pub fn on_pointer_up(&self, event: &InputEvent) -> Interception {
        let mut out = Interception::default();
        // Checked before the listener: an echo's release usually arrives
        // when no session is listening for releases.
        if self.absorb_echo(event) || !self.accepts(ListenerKind::PointerUp) {
            return out;
        }
        out.ended = self.advance_to(event.timestamp);

        let release = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            state
                .disambiguator
                .on_up(event, &mut state.timers, &mut state.listeners)
        };
        match release {
            Release::Ignored => {}
            Release::Aborted(end) => {
                log_session_end(&end);
                out.ended.push(end);
            }
            Release::Confirmed(click) => {
                out.suppress_original = true;
                let end = self.complete(&click, &mut out.dispatched);
                log_session_end(&end);
                out.ended.push(end);
            }
        }
        out
    }

    /// Handle DOM focus landing on `node`.
    ///
    /// Returns `true` if the element was blurred with native focus saved
    /// and restored around it.
    pub fn on_focus(&self, node: NodeId) -> bool {
        if !self.accepts(ListenerKind::Focus) {
            return false;
        }
        let Some(surface) = PluginSurfaceRef::capture(&self.host, node) else {
            return false;
        };
        if !self.simulation_enabled(surface) {
            return false;
        }
        // Blurring may fire focus events at other elements; hold the gate so
        // they are treated as echoes.
        let Some(_token) = self.gate.try_acquire() else {
            return false;
        };
        match self.bridge.with_saved_focus(|| self.host.blur(node)) {
            Ok(()) => {
                self.state.borrow_mut().focus.record_shielded();
                tracing::debug!(target: "plugclick.intercept", node = %node, "plugin focus shielded");
                true
            }
            Err(error) => {
                tracing::warn!(
                    target: "plugclick.intercept",
                    node = %node,
                    %error,
                    "plugin focus shield degraded"
                );
                false
            }
        }
    }

    /// Prime the verdict cache for a freshly instantiated plugin element.
    ///
    /// Returns the verdict, or `None` for non-plugin nodes and after
    /// teardown.
    pub fn on_plugin_instantiated(&self, node: NodeId) -> Option<bool> {
        if !self.is_live() {
            return None;
        }
        let surface = PluginSurfaceRef::capture(&self.host, node)?;
        let enabled = self.simulation_enabled(surface);
        tracing::debug!(
            target: "plugclick.intercept",
            node = %node,
            enabled,
            "plugin instantiated"
        );
        Some(enabled)
    }

    /// Report the host's current time, firing every expired gesture window.
    pub fn advance_to(&self, now: Duration) -> Vec<SessionEnd> {
        let fired = {
            let mut state = self.state.borrow_mut();
            if !state.live {
                return Vec::new();
            }
            state.timers.advance_to(now)
        };

        let mut ended = Vec::new();
        for (_, key) in fired {
            let end = {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                state
                    .disambiguator
                    .on_timer(key, &mut state.timers, &mut state.listeners)
            };
            if let Some(end) = end {
                log_session_end(&end);
                ended.push(end);
            }
        }
        ended
    }

    /// Tear everything down. Idempotent.
    pub fn uninit(&self) -> Teardown {
        let teardown = {
            let mut state = self.state.borrow_mut();
            if !state.live {
                return Teardown::default();
            }
            state.live = false;
            let state = &mut *state;
            let listeners_before = state.listeners.active_count();
            let timers_before = state.timers.pending();

            let sessions = state
                .disambiguator
                .cancel_all(&mut state.timers, &mut state.listeners);
            state.interceptor.detach(&mut state.listeners);
            state.focus.detach(&mut state.listeners);
            // Every owner has unsubscribed by now; anything left is a leak.
            let leaked = state.listeners.clear();
            if leaked > 0 {
                tracing::error!(target: "plugclick.engine", leaked, "listeners outlived teardown");
            }
            state.timers.clear();
            state.echoes.clear();
            Teardown {
                sessions,
                listeners_removed: listeners_before,
                timers_cancelled: timers_before,
            }
        };

        self.gate.clear_queue();
        let hook = self.hook.borrow_mut().take();
        drop(hook);

        for end in &teardown.sessions {
            log_session_end(end);
        }
        tracing::debug!(
            target: "plugclick.engine",
            sessions = teardown.sessions.len(),
            listeners = teardown.listeners_removed,
            timers = teardown.timers_cancelled,
            "engine uninitialized"
        );
        teardown
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn accepts(&self, kind: ListenerKind) -> bool {
        if self.gate.is_held() {
            tracing::trace!(target: "plugclick.engine", ?kind, "ignoring synthesized echo");
            return false;
        }
        let state = self.state.borrow();
        state.live && state.listeners.listens(kind)
    }

    /// Whether `event` is the late echo of a click this engine synthesized.
    fn absorb_echo(&self, event: &InputEvent) -> bool {
        let absorbed = {
            let mut state = self.state.borrow_mut();
            state.live && state.echoes.absorb(event)
        };
        if absorbed {
            tracing::trace!(
                target: "plugclick.engine",
                kind = event.kind.as_str(),
                x = event.client.x,
                y = event.client.y,
                "ignoring synthesized echo"
            );
        }
        absorbed
    }

    fn simulation_enabled(&self, surface: PluginSurfaceRef) -> bool {
        if let Some(cached) = self.state.borrow().interceptor.cached_verdict(&surface) {
            return cached;
        }
        let enabled = self
            .host
            .location(surface.node())
            .is_some_and(|location| self.policy.is_simulation_enabled_for_location(&location));
        let (enabled, cached) = {
            let mut state = self.state.borrow_mut();
            let enabled = state.interceptor.remember(surface, enabled);
            (enabled, state.interceptor.cached())
        };
        if cached > VERDICT_PRUNE_THRESHOLD {
            self.prune_verdicts();
        }
        enabled
    }

    fn prune_verdicts(&self) {
        let surfaces = self.state.borrow().interceptor.cached_surfaces();
        let stale: Vec<PluginSurfaceRef> = surfaces
            .into_iter()
            .filter(|surface| surface.resolve(&self.host).is_none())
            .collect();
        if !stale.is_empty() {
            self.state.borrow_mut().interceptor.forget(&stale);
        }
    }

    fn next_event_id(&self) -> EventId {
        let n = self.next_event.get();
        self.next_event.set(n + 1);
        EventId(FORWARDED_ID_BASE | n)
    }

    fn forward(&self, event: &InputEvent, parent: NodeId) -> Option<Dispatched> {
        let copy = event.forwarded_to(self.next_event_id(), parent);
        let dispatched = Dispatched {
            target: parent,
            event: copy.id,
            kind: copy.kind,
        };
        match self.host.dispatch(parent, copy) {
            Ok(()) => {
                tracing::trace!(
                    target: "plugclick.intercept",
                    kind = event.kind.as_str(),
                    button = event.button.dom_index(),
                    parent = %parent,
                    "forwarded event"
                );
                Some(dispatched)
            }
            Err(error) => {
                tracing::warn!(
                    target: "plugclick.intercept",
                    kind = event.kind.as_str(),
                    %error,
                    "forwarding failed"
                );
                None
            }
        }
    }

    /// Forward a confirmed click and run the native confirm sequence.
    fn complete(&self, click: &ConfirmedClick, dispatched: &mut Vec<Dispatched>) -> SessionEnd {
        let Some(parent) = click.surface.safe_parent(&self.host) else {
            tracing::warn!(
                target: "plugclick.gesture",
                node = %click.node,
                "plugin content gone before its click was forwarded"
            );
            return click.lost();
        };
        // forward() already warned on failure.
        let Some(press) = self.forward(&click.press, parent) else {
            return click.lost();
        };
        dispatched.push(press);
        if let Some(release) = self.forward(&click.release, parent) {
            dispatched.push(release);
        }

        let now = click.release.timestamp;
        let native = match self.gate.run(click.release.client, |at| {
            let report = self.bridge.confirm_click(at);
            if report.clicked() {
                self.state.borrow_mut().echoes.expect(at, now);
            }
            report
        }) {
            GateOutcome::Ran(mut reports) => {
                // The first report belongs to this click; later ones drained the queue.
                (!reports.is_empty()).then(|| reports.swap_remove(0))
            }
            GateOutcome::Queued => None,
        };
        if let Some(ConfirmReport::Degraded { op, error, .. }) = &native {
            tracing::warn!(
                target: "plugclick.gesture",
                node = %click.node,
                op = op.as_str(),
                %error,
                "context menu may not appear"
            );
        }
        click.end(native)
    }
}

impl<H, S, P> Drop for Engine<H, S, P>
where
    H: ContentHost,
    S: InputHookSurface,
    P: SimulationPolicy,
{
    fn drop(&mut self) {
        self.uninit();
    }
}

impl<H, S, P> fmt::Debug for Engine<H, S, P>
where
    H: ContentHost,
    S: InputHookSurface,
    P: SimulationPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Engine")
            .field("live", &state.live)
            .field("sessions", &state.disambiguator.active())
            .field("listeners", &state.listeners.active_count())
            .field("timers", &state.timers.pending())
            .field("gate", &self.gate.current())
            .finish_non_exhaustive()
    }
}

fn log_session_end(end: &SessionEnd) {
    tracing::debug!(
        target: "plugclick.gesture",
        node = %end.node,
        serial = end.serial,
        reason = end.reason.as_str(),
        "possible gesture: {}",
        end.reason
    );
}
