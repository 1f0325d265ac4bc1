//! Host document abstraction.
//!
//! The core never talks to a concrete rendering engine. Everything it needs
//! from the page (element metadata, layout, text, and the handful of writes
//! it performs) goes through [`HostDocument`].

pub mod memory;
pub mod selector;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Profile;

pub use memory::MemoryDocument;
pub use selector::Selector;

/// Opaque handle to an element in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a reading-support affordance attached next to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportId(usize);

impl SupportId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Errors raised by a host document.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Node handle does not exist
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// Node is no longer connected to the document
    #[error("Node detached from document: {0:?}")]
    Detached(NodeId),

    /// Support affordance handle does not exist
    #[error("Unknown support affordance: {0:?}")]
    UnknownSupport(SupportId),

    /// Layout could not be measured
    #[error("Geometry unavailable for {0:?}")]
    GeometryUnavailable(NodeId),

    /// Snapshot could not be taken or restored
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Static description of an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lowercase tag name
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Bounding rectangle in layout units, relative to the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Layout facts about an element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Layout {
    /// `display: none` on the element or an ancestor
    pub display_none: bool,
    /// `position: fixed`
    pub position_fixed: bool,
    /// Bounding rectangle, when measurable
    pub rect: Option<Rect>,
}

impl Layout {
    /// Rendered and not collapsed to zero size (fixed elements are exempt from the size rule).
    pub fn is_visible(&self) -> bool {
        if self.display_none {
            return false;
        }
        match self.rect {
            Some(rect) if rect.is_empty() => self.position_fixed,
            _ => true,
        }
    }
}

/// Where a reading-support affordance is attached relative to its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportPlacement {
    /// Appended inside the block (list items)
    Inside,
    /// Inserted directly after the block
    After,
}

/// Complete visible state of a reading-support affordance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportView {
    pub button_label: String,
    pub button_enabled: bool,
    pub status: String,
    /// Rendered supported-reading markup, once generated
    pub content: Option<String>,
    pub visible: bool,
}

/// The page the core adapts.
///
/// Implementations use interior mutability; every method takes `&self` and
/// must not block on anything but its own short critical section.
pub trait HostDocument: Send + Sync + 'static {
    /// Opaque saved state of a subtree.
    type Snapshot: Send + Sync + 'static;

    /// The document's top element.
    fn document_root(&self) -> NodeId;

    /// Element metadata, or `None` for an unknown handle.
    fn describe(&self, node: NodeId) -> Option<ElementInfo>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Descendant elements of `scope` in document order, excluding `scope`.
    fn elements(&self, scope: NodeId) -> Vec<NodeId>;

    fn is_connected(&self, node: NodeId) -> bool;

    fn layout(&self, node: NodeId) -> Result<Layout, HostError>;

    fn viewport_height(&self) -> Option<f64>;

    /// Rendered text of the element (like `innerText`).
    fn inner_text(&self, node: NodeId) -> Option<String>;

    /// Replace the element's rendered content with markup.
    fn replace_content(&self, node: NodeId, markup: &str) -> Result<(), HostError>;

    fn marker(&self, node: NodeId, key: &str) -> Option<String>;

    fn set_marker(&self, node: NodeId, key: &str, value: &str) -> Result<(), HostError>;

    fn snapshot(&self, scope: NodeId) -> Result<Self::Snapshot, HostError>;

    fn restore(&self, scope: NodeId, snapshot: Self::Snapshot) -> Result<(), HostError>;

    /// Insert a panel before all existing content of `scope`.
    fn insert_panel(&self, scope: NodeId, markup: &str) -> Result<(), HostError>;

    fn attach_support(
        &self,
        node: NodeId,
        placement: SupportPlacement,
    ) -> Result<SupportId, HostError>;

    fn update_support(&self, support: SupportId, view: &SupportView) -> Result<(), HostError>;

    /// Apply (or with `None`, clear) the profile's visual theme on `scope`.
    fn apply_theme(&self, scope: NodeId, profile: Option<Profile>) -> Result<(), HostError>;
}

/// Ancestors of `node`, nearest first, stopping before `stop`.
pub fn ancestors_until<H: HostDocument + ?Sized>(host: &H, node: NodeId, stop: NodeId) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut current = host.parent(node);
    while let Some(id) = current {
        if id == stop {
            break;
        }
        chain.push(id);
        current = host.parent(id);
    }
    chain
}
