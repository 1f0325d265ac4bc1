//! Minimal element selectors.
//!
//! Supports the handful of forms the extractor and the main-content finder
//! need: `tag`, `.class`, `#id`, `[attr]`, `[attr="value"]`, and a
//! two-part descendant form such as `main h1`.

use super::{ElementInfo, HostDocument, NodeId};

/// A single compound-free selector, or a descendant pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Tag(String),
    Class(String),
    Id(String),
    Attribute { name: String, value: Option<String> },
    /// `ancestor target`
    Descendant(Box<Selector>, Box<Selector>),
}

impl Selector {
    /// Parse a selector. Unrecognized syntax is read as a tag name.
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split_whitespace().map(Self::parse_simple).collect::<Vec<_>>();
        let mut selector = parts.pop().unwrap_or_else(|| Selector::Tag(String::new()));
        while let Some(ancestor) = parts.pop() {
            selector = Selector::Descendant(Box::new(ancestor), Box::new(selector));
        }
        selector
    }

    fn parse_simple(part: &str) -> Self {
        if let Some(class) = part.strip_prefix('.') {
            return Selector::Class(class.to_string());
        }
        if let Some(id) = part.strip_prefix('#') {
            return Selector::Id(id.to_string());
        }
        if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
            return match inner.split_once('=') {
                Some((name, value)) => Selector::Attribute {
                    name: name.trim().to_string(),
                    value: Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                },
                None => Selector::Attribute {
                    name: inner.trim().to_string(),
                    value: None,
                },
            };
        }
        Selector::Tag(part.to_ascii_lowercase())
    }

    /// Whether the element itself matches (ignores descendant context).
    pub fn matches_info(&self, info: &ElementInfo) -> bool {
        match self {
            Selector::Tag(tag) => info.tag == *tag,
            Selector::Class(class) => info.has_class(class),
            Selector::Id(id) => info.id.as_deref() == Some(id.as_str()),
            Selector::Attribute { name, value } => match (info.attribute(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
            Selector::Descendant(_, target) => target.matches_info(info),
        }
    }

    /// Whether `node` matches, including any descendant context.
    pub fn matches<H: HostDocument + ?Sized>(&self, host: &H, node: NodeId) -> bool {
        let Some(info) = host.describe(node) else {
            return false;
        };
        match self {
            Selector::Descendant(ancestor, target) => {
                if !target.matches_info(&info) {
                    return false;
                }
                let mut current = host.parent(node);
                while let Some(id) = current {
                    if ancestor.matches(host, id) {
                        return true;
                    }
                    current = host.parent(id);
                }
                false
            }
            simple => simple.matches_info(&info),
        }
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Selector::parse(value)
    }
}

/// First element in `scope` (inclusive) matching `selector`, in document order.
pub fn query_first<H: HostDocument + ?Sized>(
    host: &H,
    scope: NodeId,
    selector: &Selector,
) -> Option<NodeId> {
    std::iter::once(scope)
        .chain(host.elements(scope))
        .find(|node| selector.matches(host, *node))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(tag: &str, classes: &[&str], id: Option<&str>) -> ElementInfo {
        ElementInfo {
            tag: tag.to_string(),
            id: id.map(str::to_string),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            attributes: Default::default(),
        }
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(Selector::parse("nav"), Selector::Tag("nav".into()));
        assert_eq!(Selector::parse(".sidebar"), Selector::Class("sidebar".into()));
        assert_eq!(Selector::parse("#toc"), Selector::Id("toc".into()));
        assert_eq!(
            Selector::parse(r#"[role="navigation"]"#),
            Selector::Attribute {
                name: "role".into(),
                value: Some("navigation".into())
            }
        );
        assert!(matches!(Selector::parse("main h1"), Selector::Descendant(_, _)));
    }

    #[test]
    fn test_matches_info() {
        let element = info("div", &["post-content", "wide"], Some("content"));
        assert!(Selector::parse(".post-content").matches_info(&element));
        assert!(Selector::parse("#content").matches_info(&element));
        assert!(Selector::parse("div").matches_info(&element));
        assert!(!Selector::parse(".sidebar").matches_info(&element));

        let mut hidden = info("span", &[], None);
        hidden
            .attributes
            .insert("aria-hidden".to_string(), "true".to_string());
        assert!(Selector::parse(r#"[aria-hidden="true"]"#).matches_info(&hidden));
        assert!(Selector::parse("[aria-hidden]").matches_info(&hidden));
    }
}
