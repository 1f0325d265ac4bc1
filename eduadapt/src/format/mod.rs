//! Structured text formatting.
//!
//! Adapted text comes back in a loose markdown-like grammar. The parser turns
//! one response into a [`RenderTree`], applying grade-level policy, and the
//! renderer serializes the tree to escaped markup.

mod parser;
mod render;

use serde::{Deserialize, Serialize};

use crate::types::{BlockKind, GradeLevel, Profile};

pub use parser::parse_inline;

/// Inline run of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Span {
    Text(String),
    Strong(String),
}

/// List rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    Plain,
    /// One checkbox per item (ADHD)
    Checklist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

/// One node of formatted output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum RenderNode {
    Heading { level: u8, text: Vec<Span> },
    Paragraph { text: Vec<Span> },
    List { style: ListStyle, items: Vec<Vec<Span>> },
    Glossary { entries: Vec<GlossaryEntry> },
    Question { text: Vec<Span>, advanced: bool },
    /// Bare inline content, used when the target block is itself a heading
    Inline { text: Vec<Span> },
}

/// Ordered formatter output for one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTree {
    pub nodes: Vec<RenderNode>,
}

impl RenderTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize to escaped markup.
    pub fn to_html(&self) -> String {
        render::render(self)
    }
}

/// Parse adapted text into a render tree.
///
/// Heading blocks keep only their first line. Non-blank input always yields
/// at least one node.
pub fn format(raw: &str, profile: Profile, kind: BlockKind, grade: GradeLevel) -> RenderTree {
    if kind.is_heading() {
        return parser::parse_heading_block(raw);
    }
    let mut tree = parser::Parser::new(profile, grade).parse(raw);
    if tree.is_empty() && !raw.trim().is_empty() {
        tree.nodes.push(RenderNode::Paragraph {
            text: vec![Span::Text(raw.trim().to_string())],
        });
    }
    tree
}

/// Parse and serialize in one step.
pub fn format_html(raw: &str, profile: Profile, kind: BlockKind, grade: GradeLevel) -> String {
    format(raw, profile, kind, grade).to_html()
}

/// Escape the five reserved markup characters.
pub fn escape(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(raw: &str) -> RenderTree {
        format(raw, Profile::Default, BlockKind::Paragraph, GradeLevel::Middle)
    }

    #[test]
    fn test_bold_only_text_is_single_paragraph() {
        let tree = fmt("**Lava** is melted rock.");
        assert_eq!(
            tree.nodes,
            vec![RenderNode::Paragraph {
                text: vec![
                    Span::Strong("Lava".into()),
                    Span::Text(" is melted rock.".into())
                ]
            }]
        );
        let html = tree.to_html();
        assert_eq!(html, "<p><strong>Lava</strong> is melted rock.</p>");
        assert!(!html.contains('*'));
    }

    #[test]
    fn test_full_grammar() {
        let raw = "## What is a volcano?\n\
                   A volcano is a mountain.\n\
                   - Magma rises\n\
                   - Lava flows\n\
                   \n\
                   Glossary:\n\
                   magma - melted rock underground\n\
                   crust: the outer layer\n\
                   \n\
                   Question: Where does magma come from?";
        let tree = fmt(raw);
        assert_eq!(tree.nodes.len(), 5);
        assert!(matches!(tree.nodes[0], RenderNode::Heading { level: 2, .. }));
        assert!(matches!(tree.nodes[1], RenderNode::Paragraph { .. }));
        assert!(matches!(
            &tree.nodes[2],
            RenderNode::List { style: ListStyle::Plain, items } if items.len() == 2
        ));
        assert!(matches!(
            &tree.nodes[3],
            RenderNode::Glossary { entries } if entries.len() == 2
        ));
        assert!(matches!(
            tree.nodes[4],
            RenderNode::Question { advanced: true, .. }
        ));
    }

    #[test]
    fn test_adhd_lists_are_checklists() {
        let tree = format(
            "• Read the text\n• Answer the question",
            Profile::Adhd,
            BlockKind::Paragraph,
            GradeLevel::Middle,
        );
        assert!(matches!(
            &tree.nodes[0],
            RenderNode::List { style: ListStyle::Checklist, items } if items.len() == 2
        ));
        assert!(tree.to_html().contains("type=\"checkbox\""));
    }

    #[test]
    fn test_questions_suppressed_for_lower_grade() {
        for raw in [
            "Question: Why?",
            "Intro line.\nquestion: What next?\nMore text.",
            "**Question:** Is it hot?\nLava is hot.",
        ] {
            let tree = format(raw, Profile::Autism, BlockKind::Paragraph, GradeLevel::Lower);
            assert!(
                !tree
                    .nodes
                    .iter()
                    .any(|n| matches!(n, RenderNode::Question { .. })),
                "question shown for {raw:?}"
            );
        }
    }

    #[test]
    fn test_upper_grade_question_not_advanced() {
        let tree = format(
            "Question: Why do volcanoes erupt?",
            Profile::Default,
            BlockKind::Paragraph,
            GradeLevel::Upper,
        );
        assert_eq!(
            tree.nodes,
            vec![RenderNode::Question {
                text: vec![Span::Text("Why do volcanoes erupt?".into())],
                advanced: false
            }]
        );
    }

    #[test]
    fn test_heading_block_uses_first_line() {
        let tree = format(
            "## Volcanoes\nExtra explanation.",
            Profile::Default,
            BlockKind::Heading(2),
            GradeLevel::Middle,
        );
        assert_eq!(
            tree.nodes,
            vec![RenderNode::Inline {
                text: vec![Span::Text("Volcanoes".into())]
            }]
        );
        assert_eq!(tree.to_html(), "Volcanoes");
    }

    #[test]
    fn test_metadata_block_skipped() {
        let raw = "Grade guidance: middle school\n\
                   This adaptation uses short sentences.\n\
                   Audience: students\n\
                   Language: English\n\
                   Lava is hot.";
        let tree = fmt(raw);
        assert_eq!(
            tree.nodes,
            vec![RenderNode::Paragraph {
                text: vec![Span::Text("Lava is hot.".into())]
            }]
        );
    }

    #[test]
    fn test_everything_escaped() {
        let html = fmt("Use <b> & \"quotes\" 'here'").to_html();
        assert!(html.starts_with("<p>Use &lt;b&gt; &amp; &quot;quotes&quot; "));
        assert!(!html.contains('\''));
    }

    #[test]
    fn test_fallback_never_empty() {
        let tree = fmt("Grade guidance: lower");
        assert_eq!(tree.nodes.len(), 1);
        assert!(fmt("   \n  ").is_empty());
    }
}
