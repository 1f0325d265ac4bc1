//! Block extraction.
//!
//! Walks the extraction root in document order and keeps the elements whose
//! text is worth adapting: visible, after the page title, outside site
//! chrome, wide enough, long enough, not boilerplate, and not a container of
//! other text blocks.

use regex::{RegexSet, RegexSetBuilder};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::document::selector::query_first;
use crate::document::{ancestors_until, ElementInfo, HostDocument, NodeId, Selector};
use crate::types::{Block, BlockKind};

/// Tags that make a candidate a container of other blocks.
const NESTED_BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3"];

const EXCLUDED_TAGS: &[&str] = &["nav", "header", "footer", "aside"];

const EXCLUDED_ROLES: &[&str] = &["navigation", "banner", "contentinfo"];

const EXCLUDED_CLASSES: &[&str] = &[
    "sidebar",
    "widget",
    "advert",
    "advertisement",
    "ads",
    "adunit",
    "sponsored",
    "promo",
    "newsletter",
    "subscription",
    "cookie",
    "modal",
    "popup",
    "eduadapt-support-tools",
    "infobox",
    "thumb",
    "thumbcaption",
    "navbox",
    "vertical-navbox",
    "metadata",
];

const EXCLUDED_IDS: &[&str] = &["toc", "siteSub", "contentSub"];

/// Class/id substrings that mark interface chrome.
const CHROME_KEYWORDS: &[&str] = &[
    "appearance",
    "setting",
    "control",
    "option",
    "toggle",
    "preference",
    "sidebar",
    "toolbar",
    "menu",
    "breadcrumb",
    "infobox",
    "metadata",
    "thumb",
    "gallery",
    "caption",
];

const BOILERPLATE_PHRASES: &[&str] = &[
    "from wikipedia",
    "this article",
    "learn how and when to",
    "this section",
    "talk:",
    "view history",
    "navigation menu",
    "jump to",
    "display settings",
    "last updated",
    "share this",
    "share on",
    "cookie",
    "newsletter",
    "subscribe",
    "advertisement",
    "sponsored",
];

/// Main-content candidates, most specific first.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"[role="main"]"#,
    ".content",
    ".post-content",
    ".article-content",
    "#content",
    ".entry-content",
    "body",
];

/// Selects adaptable text blocks from a host document.
pub struct BlockExtractor {
    config: ExtractionConfig,
    boilerplate: RegexSet,
    main_content: Vec<Selector>,
}

impl BlockExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let boilerplate = RegexSetBuilder::new(BOILERPLATE_PHRASES.iter().map(|p| regex::escape(p)))
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Boilerplate patterns failed to compile, filter disabled");
                RegexSet::empty()
            });

        Self {
            config,
            boilerplate,
            main_content: MAIN_CONTENT_SELECTORS
                .iter()
                .map(|s| Selector::parse(s))
                .collect(),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The element holding the page's main content.
    ///
    /// First match of the main-content selectors whose text is substantial,
    /// else the document root.
    pub fn find_main_content<H: HostDocument + ?Sized>(&self, host: &H) -> NodeId {
        let root = host.document_root();
        for selector in &self.main_content {
            if let Some(node) = query_first(host, root, selector) {
                let length = host
                    .inner_text(node)
                    .map(|t| t.chars().count())
                    .unwrap_or(0);
                if length > self.config.main_content_min_text {
                    return node;
                }
            }
        }
        root
    }

    /// The page title element that marks where content starts.
    pub fn first_heading<H: HostDocument + ?Sized>(&self, host: &H) -> Option<NodeId> {
        let root = host.document_root();
        ["#firstHeading", "main h1", "h1"]
            .iter()
            .find_map(|s| query_first(host, root, &Selector::parse(s)))
    }

    /// Extract blocks under `root` in document order.
    pub fn extract<H: HostDocument + ?Sized>(&self, host: &H, root: NodeId) -> Vec<Block> {
        let positions: HashMap<NodeId, usize> = host
            .elements(host.document_root())
            .into_iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();

        let anchor = self.first_heading(host).map(|heading| {
            let position = positions.get(&heading).copied().unwrap_or(0);
            let mut containers = ancestors_until(host, heading, host.document_root());
            containers.push(host.document_root());
            (position, containers)
        });

        let mut blocks = Vec::new();
        for node in host.elements(root) {
            let Some(info) = host.describe(node) else {
                continue;
            };
            // Candidate tags: p, h1-h6, li, div
            let Some(kind) = BlockKind::from_tag(&info.tag) else {
                continue;
            };

            if let Some((anchor_pos, containers)) = &anchor {
                let position = positions.get(&node).copied().unwrap_or(usize::MAX);
                if position < *anchor_pos && !containers.contains(&node) {
                    continue;
                }
            }

            if let Some(text) = self.qualify(host, root, node, &info) {
                debug!(block = blocks.len(), tag = %info.tag, chars = text.len(), "Block selected");
                blocks.push(Block {
                    index: blocks.len(),
                    locator: node,
                    original_text: text,
                    kind,
                });
            }
        }
        blocks
    }

    /// Apply every filter; returns the trimmed text when the node qualifies.
    fn qualify<H: HostDocument + ?Sized>(
        &self,
        host: &H,
        root: NodeId,
        node: NodeId,
        info: &ElementInfo,
    ) -> Option<String> {
        if !host.is_connected(node) {
            return None;
        }

        let chain: Vec<ElementInfo> = std::iter::once(info.clone())
            .chain(
                ancestors_until(host, node, root)
                    .into_iter()
                    .filter_map(|a| host.describe(a)),
            )
            .collect();
        if chain.iter().any(|el| is_excluded(el) || has_chrome_keyword(el)) {
            return None;
        }

        let layout = host.layout(node).ok()?;
        if !layout.is_visible() {
            return None;
        }
        if let Some(rect) = layout.rect {
            if rect.width > 0.0 && rect.width < self.config.min_element_width {
                return None;
            }
        }

        let text = host.inner_text(node)?.trim().to_string();
        if text.chars().count() < self.config.min_text_length
            || text.split_whitespace().count() < self.config.min_word_count
        {
            return None;
        }
        if self.boilerplate.is_match(&text) {
            return None;
        }

        let nested = host.elements(node).into_iter().any(|child| {
            host.describe(child)
                .is_some_and(|c| NESTED_BLOCK_TAGS.contains(&c.tag.as_str()))
        });
        if nested {
            return None;
        }

        Some(text)
    }
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

fn is_excluded(info: &ElementInfo) -> bool {
    EXCLUDED_TAGS.contains(&info.tag.as_str())
        || info
            .attribute("role")
            .is_some_and(|role| EXCLUDED_ROLES.contains(&role))
        || info.attribute("aria-hidden") == Some("true")
        || info
            .classes
            .iter()
            .any(|c| EXCLUDED_CLASSES.contains(&c.as_str()))
        || info
            .id
            .as_deref()
            .is_some_and(|id| EXCLUDED_IDS.contains(&id))
}

fn has_chrome_keyword(info: &ElementInfo) -> bool {
    let matches = |value: &str| {
        let lower = value.to_lowercase();
        CHROME_KEYWORDS.iter().any(|k| lower.contains(k))
    };
    info.classes.iter().any(|c| matches(c)) || info.id.as_deref().is_some_and(matches)
}
