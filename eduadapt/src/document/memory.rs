//! In-memory host document.
//!
//! A thread-safe element arena with just enough layout data to drive the
//! extractor and scheduler. It loads from a nested JSON description and
//! serializes back to HTML, which makes it the host used by the CLI and the
//! test suite.

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    ElementInfo, HostDocument, HostError, Layout, NodeId, Rect, SupportId, SupportPlacement,
    SupportView,
};
use crate::types::Profile;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// JSON description of a whole document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSpec {
    /// Viewport height in layout units
    #[serde(default)]
    pub viewport_height: Option<f64>,
    /// Top element (usually `body`)
    pub root: ElementSpec,
}

/// JSON description of one element.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Space-separated class list
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Option<Rect>,
    /// `display: none`
    #[serde(default)]
    pub hidden: bool,
    /// `position: fixed`
    #[serde(default)]
    pub fixed: bool,
    /// Not connected to the document
    #[serde(default)]
    pub detached: bool,
    /// Layout measurement throws
    #[serde(default)]
    pub geometry_error: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

/// A child node: text or element.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element(ElementSpec),
}

#[derive(Debug, Clone)]
enum Child {
    Text(String),
    Element(NodeId),
}

#[derive(Debug, Clone)]
struct ElementData {
    info: ElementInfo,
    parent: Option<NodeId>,
    children: Vec<Child>,
    hidden: bool,
    fixed: bool,
    rect: Option<Rect>,
    connected: bool,
    geometry_error: bool,
    rendered: Option<String>,
    markers: BTreeMap<String, String>,
    panels: Vec<String>,
}

#[derive(Debug, Clone)]
struct SupportSlot {
    anchor: NodeId,
    placement: SupportPlacement,
    view: SupportView,
}

#[derive(Debug, Clone)]
struct DocumentState {
    elements: Vec<ElementData>,
    root: NodeId,
    viewport_height: Option<f64>,
    supports: Vec<SupportSlot>,
    theme: Option<(NodeId, Profile)>,
}

/// Saved document state. The memory host snapshots the whole document.
#[derive(Debug, Clone)]
pub struct MemorySnapshot(DocumentState);

/// In-memory implementation of [`HostDocument`].
pub struct MemoryDocument {
    state: Mutex<DocumentState>,
    mutations: AtomicU64,
}

impl MemoryDocument {
    /// Build a document from its description.
    pub fn from_spec(spec: DocumentSpec) -> Self {
        let mut elements = Vec::new();
        let root = push_element(&mut elements, spec.root, None);
        Self {
            state: Mutex::new(DocumentState {
                elements,
                root,
                viewport_height: spec.viewport_height,
                supports: Vec::new(),
                theme: None,
            }),
            mutations: AtomicU64::new(0),
        }
    }

    /// Parse a JSON document description.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_spec(serde_json::from_str(json)?))
    }

    /// Build from an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(Self::from_spec(serde_json::from_value(value)?))
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of writes performed through the host interface.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// First element carrying the given id attribute.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let state = self.lock();
        state
            .elements
            .iter()
            .position(|el| el.info.id.as_deref() == Some(id))
            .map(NodeId::new)
    }

    /// Markup written over the element, if any.
    pub fn rendered(&self, node: NodeId) -> Option<String> {
        self.lock()
            .elements
            .get(node.index())
            .and_then(|el| el.rendered.clone())
    }

    /// Panels inserted at the top of the element.
    pub fn panels(&self, node: NodeId) -> Vec<String> {
        self.lock()
            .elements
            .get(node.index())
            .map(|el| el.panels.clone())
            .unwrap_or_default()
    }

    /// Attached support affordances with their anchors.
    pub fn supports(&self) -> Vec<(NodeId, SupportView)> {
        self.lock()
            .supports
            .iter()
            .map(|slot| (slot.anchor, slot.view.clone()))
            .collect()
    }

    /// Current state of one support affordance.
    pub fn support_view(&self, support: SupportId) -> Option<SupportView> {
        self.lock()
            .supports
            .get(support.index())
            .map(|slot| slot.view.clone())
    }

    /// The applied profile theme.
    pub fn theme(&self) -> Option<Profile> {
        self.lock().theme.map(|(_, profile)| profile)
    }

    /// Simulate the host removing or re-adding an element.
    pub fn set_connected(&self, node: NodeId, connected: bool) {
        if let Some(el) = self.lock().elements.get_mut(node.index()) {
            el.connected = connected;
        }
    }

    /// Serialize the document to HTML.
    pub fn to_html(&self) -> String {
        let state = self.lock();
        let mut out = String::new();
        write_element(&state, state.root, &mut out);
        out
    }
}

fn push_element(elements: &mut Vec<ElementData>, spec: ElementSpec, parent: Option<NodeId>) -> NodeId {
    let id = NodeId::new(elements.len());
    let mut info = ElementInfo::new(spec.tag);
    info.id = spec.id;
    info.classes = spec
        .class
        .as_deref()
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    info.attributes = spec.attrs;

    elements.push(ElementData {
        info,
        parent,
        children: Vec::new(),
        hidden: spec.hidden,
        fixed: spec.fixed,
        rect: spec.rect,
        connected: !spec.detached,
        geometry_error: spec.geometry_error,
        rendered: None,
        markers: BTreeMap::new(),
        panels: Vec::new(),
    });

    let mut children = Vec::with_capacity(spec.children.len());
    for child in spec.children {
        match child {
            NodeSpec::Text(text) => children.push(Child::Text(text)),
            NodeSpec::Element(child_spec) => {
                children.push(Child::Element(push_element(elements, child_spec, Some(id))))
            }
        }
    }
    elements[id.index()].children = children;
    id
}

impl DocumentState {
    fn get(&self, node: NodeId) -> Result<&ElementData, HostError> {
        self.elements
            .get(node.index())
            .ok_or(HostError::UnknownNode(node))
    }

    fn get_mut(&mut self, node: NodeId) -> Result<&mut ElementData, HostError> {
        self.elements
            .get_mut(node.index())
            .ok_or(HostError::UnknownNode(node))
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.elements.get(id.index()) {
                Some(el) if el.connected => current = el.parent,
                _ => return false,
            }
        }
        true
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.elements.get(id.index()) {
                Some(el) if el.hidden => return true,
                Some(el) => current = el.parent,
                None => return false,
            }
        }
        false
    }

    fn collect_elements(&self, node: NodeId, out: &mut Vec<NodeId>) {
        let Some(el) = self.elements.get(node.index()) else {
            return;
        };
        if el.rendered.is_some() {
            return;
        }
        for child in &el.children {
            if let Child::Element(id) = child {
                out.push(*id);
                self.collect_elements(*id, out);
            }
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(el) = self.elements.get(node.index()) else {
            return;
        };
        if el.hidden {
            return;
        }
        if let Some(markup) = &el.rendered {
            push_collapsed(out, &strip_markup(markup));
            return;
        }
        for child in &el.children {
            match child {
                Child::Text(text) => push_collapsed(out, text),
                Child::Element(id) => {
                    let block = self
                        .elements
                        .get(id.index())
                        .map(|c| BLOCK_TAGS.contains(&c.info.tag.as_str()))
                        .unwrap_or(false);
                    if block {
                        push_break(out);
                    }
                    self.collect_text(*id, out);
                    if block {
                        push_break(out);
                    }
                }
            }
        }
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

fn push_break(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn strip_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_html_entities(&out).into_owned()
}

fn write_element(state: &DocumentState, node: NodeId, out: &mut String) {
    let Some(el) = state.elements.get(node.index()) else {
        return;
    };

    let mut classes = el.info.classes.clone();
    if let Some((scope, profile)) = state.theme {
        if scope == node {
            classes.push("eduadapt-adapted".to_string());
            classes.push(format!("eduadapt-{}", profile));
        }
    }

    out.push('<');
    out.push_str(&el.info.tag);
    if let Some(id) = &el.info.id {
        out.push_str(&format!(" id=\"{}\"", encode_double_quoted_attribute(id)));
    }
    if !classes.is_empty() {
        out.push_str(&format!(
            " class=\"{}\"",
            encode_double_quoted_attribute(&classes.join(" "))
        ));
    }
    for (name, value) in &el.info.attributes {
        out.push_str(&format!(" {}=\"{}\"", name, encode_double_quoted_attribute(value)));
    }
    for (key, value) in &el.markers {
        out.push_str(&format!(" data-{}=\"{}\"", key, encode_double_quoted_attribute(value)));
    }
    out.push('>');

    if VOID_TAGS.contains(&el.info.tag.as_str()) {
        return;
    }

    for panel in &el.panels {
        out.push_str("<div class=\"eduadapt-panel\">");
        out.push_str(panel);
        out.push_str("</div>");
    }

    match &el.rendered {
        Some(markup) => out.push_str(markup),
        None => {
            for child in &el.children {
                match child {
                    Child::Text(text) => out.push_str(&encode_text(text)),
                    Child::Element(id) => write_element(state, *id, out),
                }
            }
        }
    }

    for slot in state
        .supports
        .iter()
        .filter(|s| s.anchor == node && s.placement == SupportPlacement::Inside)
    {
        write_support(&slot.view, out);
    }

    out.push_str(&format!("</{}>", el.info.tag));

    for slot in state
        .supports
        .iter()
        .filter(|s| s.anchor == node && s.placement == SupportPlacement::After)
    {
        write_support(&slot.view, out);
    }
}

fn write_support(view: &SupportView, out: &mut String) {
    out.push_str("<div class=\"eduadapt-support-tools\">");
    out.push_str(&format!(
        "<button type=\"button\" class=\"eduadapt-support-button\"{}>{}</button>",
        if view.button_enabled { "" } else { " disabled" },
        encode_text(&view.button_label)
    ));
    out.push_str(&format!(
        "<div class=\"eduadapt-support-status\" role=\"status\" aria-live=\"polite\">{}</div>",
        encode_text(&view.status)
    ));
    out.push_str(&format!(
        "<div class=\"eduadapt-support-content{}\">{}</div>",
        if view.visible { " eduadapt-visible" } else { "" },
        view.content.as_deref().unwrap_or("")
    ));
    out.push_str("</div>");
}

impl HostDocument for MemoryDocument {
    type Snapshot = MemorySnapshot;

    fn document_root(&self) -> NodeId {
        self.lock().root
    }

    fn describe(&self, node: NodeId) -> Option<ElementInfo> {
        self.lock()
            .elements
            .get(node.index())
            .map(|el| el.info.clone())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().elements.get(node.index()).and_then(|el| el.parent)
    }

    fn elements(&self, scope: NodeId) -> Vec<NodeId> {
        let state = self.lock();
        let mut out = Vec::new();
        state.collect_elements(scope, &mut out);
        out
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.lock().is_connected(node)
    }

    fn layout(&self, node: NodeId) -> Result<Layout, HostError> {
        let state = self.lock();
        let el = state.get(node)?;
        if el.geometry_error {
            return Err(HostError::GeometryUnavailable(node));
        }
        Ok(Layout {
            display_none: state.is_hidden(node),
            position_fixed: el.fixed,
            rect: el.rect,
        })
    }

    fn viewport_height(&self) -> Option<f64> {
        self.lock().viewport_height
    }

    fn inner_text(&self, node: NodeId) -> Option<String> {
        let state = self.lock();
        state.get(node).ok()?;
        let mut raw = String::new();
        state.collect_text(node, &mut raw);
        let text = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Some(text)
    }

    fn replace_content(&self, node: NodeId, markup: &str) -> Result<(), HostError> {
        let mut state = self.lock();
        if !state.is_connected(node) {
            state.get(node)?;
            return Err(HostError::Detached(node));
        }
        state.get_mut(node)?.rendered = Some(markup.to_string());
        drop(state);
        self.touch();
        Ok(())
    }

    fn marker(&self, node: NodeId, key: &str) -> Option<String> {
        self.lock()
            .elements
            .get(node.index())
            .and_then(|el| el.markers.get(key).cloned())
    }

    fn set_marker(&self, node: NodeId, key: &str, value: &str) -> Result<(), HostError> {
        self.lock()
            .get_mut(node)?
            .markers
            .insert(key.to_string(), value.to_string());
        self.touch();
        Ok(())
    }

    fn snapshot(&self, scope: NodeId) -> Result<Self::Snapshot, HostError> {
        let state = self.lock();
        state.get(scope)?;
        Ok(MemorySnapshot(state.clone()))
    }

    fn restore(&self, scope: NodeId, snapshot: Self::Snapshot) -> Result<(), HostError> {
        let mut state = self.lock();
        if snapshot.0.elements.get(scope.index()).is_none() {
            return Err(HostError::Snapshot(format!(
                "snapshot does not contain {:?}",
                scope
            )));
        }
        *state = snapshot.0;
        drop(state);
        self.touch();
        Ok(())
    }

    fn insert_panel(&self, scope: NodeId, markup: &str) -> Result<(), HostError> {
        self.lock()
            .get_mut(scope)?
            .panels
            .insert(0, markup.to_string());
        self.touch();
        Ok(())
    }

    fn attach_support(
        &self,
        node: NodeId,
        placement: SupportPlacement,
    ) -> Result<SupportId, HostError> {
        let mut state = self.lock();
        if !state.is_connected(node) {
            state.get(node)?;
            return Err(HostError::Detached(node));
        }
        let id = SupportId::new(state.supports.len());
        state.supports.push(SupportSlot {
            anchor: node,
            placement,
            view: SupportView::default(),
        });
        drop(state);
        self.touch();
        Ok(id)
    }

    fn update_support(&self, support: SupportId, view: &SupportView) -> Result<(), HostError> {
        self.lock()
            .supports
            .get_mut(support.index())
            .ok_or(HostError::UnknownSupport(support))?
            .view = view.clone();
        self.touch();
        Ok(())
    }

    fn apply_theme(&self, scope: NodeId, profile: Option<Profile>) -> Result<(), HostError> {
        let mut state = self.lock();
        state.get(scope)?;
        state.theme = profile.map(|p| (scope, p));
        drop(state);
        self.touch();
        Ok(())
    }
}
