//! In-memory surface that records every call.
//!
//! Used to test the engine without a real OS hook. Clones share the same
//! call log, failure set and click callback, so a test can keep one handle
//! while the engine owns another.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use plugclick_core::geometry::Point;

use crate::error::{NativeError, Result};
use crate::surface::{InputHookSurface, NativeOp};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    InstallHook,
    UninstallHook,
    RecordFocus,
    ClearFocus,
    RestoreFocus,
    SynthesizeClick(Point),
    /// Test marker inserted with [`RecordingSurface::mark`].
    Mark(&'static str),
}

impl NativeCall {
    /// The operation this call performed, if any.
    #[must_use]
    pub const fn op(&self) -> Option<NativeOp> {
        match self {
            Self::InstallHook => Some(NativeOp::InstallHook),
            Self::UninstallHook => Some(NativeOp::UninstallHook),
            Self::RecordFocus => Some(NativeOp::RecordFocus),
            Self::ClearFocus => Some(NativeOp::ClearFocus),
            Self::RestoreFocus => Some(NativeOp::RestoreFocus),
            Self::SynthesizeClick(_) => Some(NativeOp::SynthesizeClick),
            Self::Mark(_) => None,
        }
    }
}

type ClickHook = Rc<dyn Fn(Point)>;

#[derive(Default)]
struct State {
    calls: Vec<NativeCall>,
    failing: AHashSet<NativeOp>,
    on_click: Option<ClickHook>,
}

/// Recording stub for [`InputHookSurface`].
#[derive(Clone, Default)]
pub struct RecordingSurface {
    state: Rc<RefCell<State>>,
}

impl std::fmt::Debug for RecordingSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RecordingSurface")
            .field("calls", &state.calls)
            .field("failing", &state.failing)
            .finish_non_exhaustive()
    }
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `op` fail.
    pub fn fail_on(&self, op: NativeOp) {
        self.state.borrow_mut().failing.insert(op);
    }

    /// Stop failing `op`.
    pub fn succeed_on(&self, op: NativeOp) {
        self.state.borrow_mut().failing.remove(&op);
    }

    /// Run `hook` after every recorded click synthesis.
    ///
    /// The hook runs with no internal borrow held, so it may re-enter
    /// whatever owns this surface (simulating the OS echoing the click back
    /// into the host).
    pub fn on_click(&self, hook: impl Fn(Point) + 'static) {
        self.state.borrow_mut().on_click = Some(Rc::new(hook));
    }

    /// Append a marker to the call log.
    pub fn mark(&self, label: &'static str) {
        self.state.borrow_mut().calls.push(NativeCall::Mark(label));
    }

    /// Snapshot of the call log.
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls of `op`.
    #[must_use]
    pub fn count(&self, op: NativeOp) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.op() == Some(op))
            .count()
    }

    /// Points of every synthesized click, in order.
    #[must_use]
    pub fn clicks(&self) -> Vec<Point> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                NativeCall::SynthesizeClick(at) => Some(*at),
                _ => None,
            })
            .collect()
    }

    /// Forget the call log.
    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: NativeCall) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let op = call.op();
        state.calls.push(call);
        match op {
            Some(op) if state.failing.contains(&op) => Err(NativeError::Os {
                op: op.as_str(),
                code: -1,
            }),
            _ => Ok(()),
        }
    }
}

impl InputHookSurface for RecordingSurface {
    fn install_hook(&self) -> Result<()> {
        self.record(NativeCall::InstallHook)
    }

    fn uninstall_hook(&self) -> Result<()> {
        self.record(NativeCall::UninstallHook)
    }

    fn record_focus(&self) -> Result<()> {
        self.record(NativeCall::RecordFocus)
    }

    fn clear_focus(&self) -> Result<()> {
        self.record(NativeCall::ClearFocus)
    }

    fn restore_focus(&self) -> Result<()> {
        self.record(NativeCall::RestoreFocus)
    }

    fn synthesize_secondary_click(&self, at: Point) -> Result<()> {
        let result = self.record(NativeCall::SynthesizeClick(at));
        let hook = self.state.borrow().on_click.clone();
        if result.is_ok()
            && let Some(hook) = hook
        {
            hook(at);
        }
        result
    }
}
