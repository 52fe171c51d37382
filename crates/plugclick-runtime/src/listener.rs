#![forbid(unsafe_code)]

//! Disposable listener registrations.
//!
//! The host delivers every pointer and focus event to the engine; which of
//! them the engine actually acts on is decided by the registrations held
//! here. Each registration is a [`ListenerHandle`] that must be returned
//! through [`ListenerRegistry::unsubscribe`]; teardown calls
//! [`ListenerRegistry::clear`], after which [`ListenerRegistry::active_count`]
//! is zero.

use std::collections::BTreeMap;

use plugclick_core::document::NodeId;

/// Event stream a listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerDown,
    PointerMove,
    PointerUp,
    Focus,
}

/// Who a listener belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerOwner {
    /// The interceptor's document-wide listeners.
    Interceptor,
    /// The focus shield's document-wide listener.
    FocusShield,
    /// A gesture session armed on this plugin element.
    Session(NodeId),
}

/// Identity of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    kind: ListenerKind,
    owner: ListenerOwner,
}

/// Set of active listener registrations.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    active: BTreeMap<ListenerHandle, Registration>,
    next: u64,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its handle.
    pub fn subscribe(&mut self, kind: ListenerKind, owner: ListenerOwner) -> ListenerHandle {
        let handle = ListenerHandle(self.next);
        self.next += 1;
        self.active.insert(handle, Registration { kind, owner });
        handle
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        self.active.remove(&handle).is_some()
    }

    #[must_use]
    pub fn is_active(&self, handle: ListenerHandle) -> bool {
        self.active.contains_key(&handle)
    }

    /// Whether any listener of `kind` is registered.
    #[must_use]
    pub fn listens(&self, kind: ListenerKind) -> bool {
        self.active.values().any(|reg| reg.kind == kind)
    }

    /// Total number of registrations.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of registrations held by `owner`.
    #[must_use]
    pub fn count_of(&self, owner: ListenerOwner) -> usize {
        self.active.values().filter(|reg| reg.owner == owner).count()
    }

    /// Remove every registration. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_and_unsubscribe() {
        let mut registry = ListenerRegistry::new();
        let node = NodeId::from_raw(3);
        let moves = registry.subscribe(ListenerKind::PointerMove, ListenerOwner::Session(node));
        let ups = registry.subscribe(ListenerKind::PointerUp, ListenerOwner::Session(node));

        assert_eq!(registry.count_of(ListenerOwner::Session(node)), 2);
        assert!(registry.listens(ListenerKind::PointerMove));

        assert!(registry.unsubscribe(moves));
        assert!(!registry.unsubscribe(moves));
        assert!(!registry.listens(ListenerKind::PointerMove));
        assert!(registry.is_active(ups));
    }

    #[test]
    fn clear_removes_everything() {
        let mut registry = ListenerRegistry::new();
        registry.subscribe(ListenerKind::PointerDown, ListenerOwner::Interceptor);
        registry.subscribe(ListenerKind::Focus, ListenerOwner::FocusShield);
        assert_eq!(registry.clear(), 2);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut registry = ListenerRegistry::new();
        let first = registry.subscribe(ListenerKind::PointerDown, ListenerOwner::Interceptor);
        registry.unsubscribe(first);
        let second = registry.subscribe(ListenerKind::PointerDown, ListenerOwner::Interceptor);
        assert_ne!(first, second);
        assert!(!registry.is_active(first));
    }
}
