#![forbid(unsafe_code)]

//! Content-tree contracts and an in-memory document.
//!
//! The engine never owns the host's content tree. It sees it through
//! [`ContentTree`] (read-only structure queries) and [`ContentHost`]
//! (the two host actions it needs: dispatching a forwarded event and
//! blurring an element).
//!
//! Plugin content can be nested (an `<embed>` inside an `<object>`), so
//! forwarding never targets the direct parent blindly: [`safe_parent`]
//! walks up past every plugin ancestor.
//!
//! [`Document`] is a small arena-backed implementation used by tests and
//! by embedders that mirror a real tree into the engine.

use std::cell::RefCell;
use std::fmt;

use crate::event::InputEvent;

/// Opaque identity of a node in the host's content tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Wrap a raw host identifier.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw host identifier.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only structure queries against the host's content tree.
pub trait ContentTree {
    /// Parent element, or `None` at the root or for detached nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` is plugin content (an element whose rendering surface
    /// swallows pointer events).
    fn is_plugin_content(&self, node: NodeId) -> bool;

    /// Liveness generation of `node`; `None` once the node is gone.
    ///
    /// Hosts that recycle identifiers must bump the generation on reuse so
    /// that stale [`PluginSurfaceRef`]s stop resolving.
    fn generation(&self, node: NodeId) -> Option<u32>;

    /// Location (URL) of the document that owns `node`.
    fn location(&self, node: NodeId) -> Option<String>;
}

/// Host actions the engine performs on the content tree.
pub trait ContentHost: ContentTree {
    /// Dispatch a forwarded event at `target`.
    fn dispatch(&self, target: NodeId, event: InputEvent) -> Result<(), DispatchError>;

    /// Remove DOM focus from `node`.
    fn blur(&self, node: NodeId);
}

/// Why a dispatch could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The target node is no longer attached.
    Detached(NodeId),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached(node) => write!(f, "dispatch target {node} is detached"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Nearest ancestor of `node` that is not plugin content.
///
/// Returns `None` when the chain of plugin ancestors runs off the root.
pub fn safe_parent<T: ContentTree + ?Sized>(tree: &T, node: NodeId) -> Option<NodeId> {
    let mut parent = tree.parent(node)?;
    while tree.is_plugin_content(parent) {
        parent = tree.parent(parent)?;
    }
    Some(parent)
}

/// Weak, non-owning reference to a plugin element.
///
/// Holds identity plus the liveness generation observed at capture time, so
/// it resolves only while the same element is still attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginSurfaceRef {
    node: NodeId,
    generation: u32,
}

impl PluginSurfaceRef {
    /// Capture a reference to `node` if it is live plugin content.
    pub fn capture<T: ContentTree + ?Sized>(tree: &T, node: NodeId) -> Option<Self> {
        if !tree.is_plugin_content(node) {
            return None;
        }
        let generation = tree.generation(node)?;
        Some(Self { node, generation })
    }

    /// The referenced node identity (may be stale).
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Re-resolve the node; `None` if it was removed or replaced.
    pub fn resolve<T: ContentTree + ?Sized>(&self, tree: &T) -> Option<NodeId> {
        (tree.generation(self.node) == Some(self.generation)).then_some(self.node)
    }

    /// Re-resolve the forwarding target for this element.
    pub fn safe_parent<T: ContentTree + ?Sized>(&self, tree: &T) -> Option<NodeId> {
        self.resolve(tree).and_then(|node| safe_parent(tree, node))
    }
}

// ---------------------------------------------------------------------------
// In-memory document
// ---------------------------------------------------------------------------

/// What kind of element a [`Document`] node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Ordinary element, identified by tag name.
    Element(String),
    /// Plugin content (`<object>` / `<embed>`) with its MIME type.
    Plugin { mime: String },
}

impl NodeKind {
    /// Shorthand for an ordinary element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element(tag.into())
    }

    /// Shorthand for plugin content.
    pub fn plugin(mime: impl Into<String>) -> Self {
        Self::Plugin { mime: mime.into() }
    }
}

/// One forwarded event delivered to a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub target: NodeId,
    pub event: InputEvent,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
}

/// Arena-backed content tree that records host actions.
///
/// Removed slots are recycled with a bumped generation, which makes
/// [`PluginSurfaceRef`] staleness observable in tests.
#[derive(Debug)]
pub struct Document {
    location: String,
    slots: Vec<Slot>,
    free: Vec<u32>,
    dispatched: RefCell<Vec<DispatchRecord>>,
    blurred: RefCell<Vec<NodeId>>,
}

impl Document {
    /// Create a document with a single `<html>` root element.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            slots: vec![Slot {
                generation: 0,
                node: Some(NodeData {
                    kind: NodeKind::element("html"),
                    parent: None,
                }),
            }],
            free: Vec::new(),
            dispatched: RefCell::new(Vec::new()),
            blurred: RefCell::new(Vec::new()),
        }
    }

    /// The root element.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Document location.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.location
    }

    /// Append a child under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not attached.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        assert!(self.is_attached(parent), "append under detached parent {parent}");
        let data = NodeData {
            kind,
            parent: Some(parent),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(data);
            NodeId(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(data),
            });
            NodeId(index)
        }
    }

    /// Detach `node` and its whole subtree. Returns the number of nodes removed.
    pub fn remove(&mut self, node: NodeId) -> usize {
        if node == self.root() || !self.is_attached(node) {
            return 0;
        }
        let mut doomed = vec![node];
        let mut index = 0;
        while index < doomed.len() {
            let current = doomed[index];
            for (raw, slot) in self.slots.iter().enumerate() {
                if let Some(data) = &slot.node
                    && data.parent == Some(current)
                {
                    doomed.push(NodeId(raw as u32));
                }
            }
            index += 1;
        }
        for id in &doomed {
            self.slots[id.0 as usize].node = None;
            self.free.push(id.0);
        }
        doomed.len()
    }

    /// Whether `node` is currently attached.
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.data(node).is_some()
    }

    /// Node kind, if attached.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.data(node).map(|data| &data.kind)
    }

    /// Every event dispatched so far, in order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.dispatched.borrow().clone()
    }

    /// Every node blurred so far, in order.
    #[must_use]
    pub fn blurred(&self) -> Vec<NodeId> {
        self.blurred.borrow().clone()
    }

    /// Forget recorded host actions.
    pub fn clear_records(&self) {
        self.dispatched.borrow_mut().clear();
        self.blurred.borrow_mut().clear();
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.slots.get(node.0 as usize).and_then(|slot| slot.node.as_ref())
    }
}

impl ContentTree for Document {
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).and_then(|data| data.parent)
    }

    fn is_plugin_content(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Plugin { .. }))
    }

    fn generation(&self, node: NodeId) -> Option<u32> {
        let slot = self.slots.get(node.0 as usize)?;
        slot.node.as_ref().map(|_| slot.generation)
    }

    fn location(&self, node: NodeId) -> Option<String> {
        self.is_attached(node).then(|| self.location.clone())
    }
}

impl ContentHost for Document {
    fn dispatch(&self, target: NodeId, event: InputEvent) -> Result<(), DispatchError> {
        if !self.is_attached(target) {
            return Err(DispatchError::Detached(target));
        }
        self.dispatched
            .borrow_mut()
            .push(DispatchRecord { target, event });
        Ok(())
    }

    fn blur(&self, node: NodeId) {
        self.blurred.borrow_mut().push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventId, EventKind, MouseButton};
    use crate::geometry::Point;

    const FLASH: &str = "application/x-shockwave-flash";

    fn nested() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new("https://example.org/game");
        let body = doc.append(doc.root(), NodeKind::element("body"));
        let object = doc.append(body, NodeKind::plugin(FLASH));
        let embed = doc.append(object, NodeKind::plugin(FLASH));
        (doc, body, object, embed)
    }

    #[test]
    fn safe_parent_skips_nested_plugins() {
        let (doc, body, object, embed) = nested();
        assert_eq!(safe_parent(&doc, embed), Some(body));
        assert_eq!(safe_parent(&doc, object), Some(body));
        assert_eq!(safe_parent(&doc, body), Some(doc.root()));
    }

    #[test]
    fn safe_parent_of_root_is_none() {
        let doc = Document::new("about:blank");
        assert_eq!(safe_parent(&doc, doc.root()), None);
    }

    #[test]
    fn surface_ref_requires_plugin_content() {
        let (doc, body, _, embed) = nested();
        assert!(PluginSurfaceRef::capture(&doc, body).is_none());
        let surface = PluginSurfaceRef::capture(&doc, embed).expect("plugin");
        assert_eq!(surface.resolve(&doc), Some(embed));
        assert_eq!(surface.safe_parent(&doc), Some(body));
    }

    #[test]
    fn surface_ref_goes_stale_after_removal_and_reuse() {
        let (mut doc, body, object, embed) = nested();
        let surface = PluginSurfaceRef::capture(&doc, embed).expect("plugin");

        assert_eq!(doc.remove(object), 2);
        assert_eq!(surface.resolve(&doc), None);

        // The recycled slot gets a new generation.
        let replacement = doc.append(body, NodeKind::plugin(FLASH));
        assert_eq!(surface.resolve(&doc), None);
        assert!(PluginSurfaceRef::capture(&doc, replacement).is_some());
    }

    #[test]
    fn root_cannot_be_removed() {
        let (mut doc, ..) = nested();
        let root = doc.root();
        assert_eq!(doc.remove(root), 0);
        assert!(doc.is_attached(root));
    }

    #[test]
    fn dispatch_records_and_rejects_detached() {
        let (mut doc, body, object, _) = nested();
        let event = InputEvent::new(
            EventId(1),
            EventKind::PointerDown,
            MouseButton::Primary,
            Point::new(1, 2),
            body,
        );
        doc.dispatch(body, event.clone()).expect("attached");
        assert_eq!(doc.dispatched().len(), 1);
        assert_eq!(doc.dispatched()[0].target, body);

        doc.remove(object);
        assert_eq!(
            doc.dispatch(object, event),
            Err(DispatchError::Detached(object))
        );
    }

    #[test]
    fn location_is_reported_for_attached_nodes() {
        let (doc, _, _, embed) = nested();
        assert_eq!(
            doc.location(embed).as_deref(),
            Some("https://example.org/game")
        );
        assert_eq!(doc.location(NodeId::from_raw(99)), None);
    }
}
