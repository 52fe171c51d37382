#![forbid(unsafe_code)]

//! plugclick Runtime
//!
//! Interception, gesture disambiguation and engine lifecycle.
//!
//! # Key Components
//!
//! - [`Engine`] - Composes everything and exposes the host entry points
//! - [`Interceptor`] - Decides per press whether to forward now or defer
//! - [`Disambiguator`] - Classifies a deferred right press as click or gesture
//! - [`FocusShield`] - Keeps plugin content from holding DOM focus
//! - [`ConfirmGate`] - Serializes native confirm sequences and marks echoes
//! - [`EchoFilter`] - Recognizes synthesized clicks the OS delivers late
//! - [`TimerQueue`] - Gesture-window timers driven by host time
//! - [`ListenerRegistry`] - Disposable listener registrations
//!
//! # Role in plugclick
//! `plugclick-runtime` is the orchestrator. It consumes [`InputEvent`]s
//! from the host, asks the simulation policy once per plugin element, and
//! drives [`plugclick_native::NativeBridge`] for the OS-level confirm.
//!
//! # How it fits in the system
//! The host owns the event loop and the content tree. It calls
//! [`Engine::on_pointer_down`] and friends for every event, honours the
//! returned [`Interception`], and reports time through
//! [`Engine::advance_to`]. Nothing here spawns threads or reads a clock.
//!
//! [`InputEvent`]: plugclick_core::event::InputEvent

pub mod disambiguator;
pub mod echo;
pub mod engine;
pub mod focus;
pub mod gate;
pub mod interceptor;
pub mod listener;
pub mod timer;

pub use disambiguator::{
    ConfirmedClick, Disambiguator, EndReason, GestureSession, Release, SessionEnd, SessionKey,
};
pub use echo::EchoFilter;
pub use engine::{Engine, EngineError, Teardown};
pub use focus::FocusShield;
pub use gate::{ConfirmGate, ConfirmToken, GateOutcome};
pub use interceptor::{Dispatched, Interception, Interceptor, PressPlan};
pub use listener::{ListenerHandle, ListenerKind, ListenerOwner, ListenerRegistry};
pub use timer::{TimerHandle, TimerQueue};
