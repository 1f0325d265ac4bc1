//! Line classifier state machine.

use super::{GlossaryEntry, ListStyle, RenderNode, RenderTree, Span};
use crate::types::{GradeLevel, Profile};

#[derive(Debug)]
enum State {
    Normal,
    InList(Vec<Vec<Span>>),
    InGlossary(Vec<GlossaryEntry>),
    SkippingMetadata,
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Heading { level: u8, text: &'a str },
    GlossaryHeader,
    Question(String),
    Bullet(&'a str),
    Text(&'a str),
}

pub(super) struct Parser {
    profile: Profile,
    grade: GradeLevel,
    state: State,
    nodes: Vec<RenderNode>,
    seen_content: bool,
}

impl Parser {
    pub(super) fn new(profile: Profile, grade: GradeLevel) -> Self {
        Self {
            profile,
            grade,
            state: State::Normal,
            nodes: Vec::new(),
            seen_content: false,
        }
    }

    pub(super) fn parse(mut self, raw: &str) -> RenderTree {
        for line in raw.lines() {
            self.feed(line.trim());
        }
        self.flush();
        RenderTree { nodes: self.nodes }
    }

    fn feed(&mut self, line: &str) {
        if !self.seen_content && !line.is_empty() {
            self.seen_content = true;
            if strip_prefix_ci(&strip_emphasis(line), "grade guidance").is_some() {
                self.state = State::SkippingMetadata;
                return;
            }
        }

        match std::mem::replace(&mut self.state, State::Normal) {
            State::Normal => self.normal(line),
            State::SkippingMetadata => {
                let clean = strip_emphasis(line);
                let metadata = ["this adaptation", "audience:", "language:"]
                    .iter()
                    .any(|p| strip_prefix_ci(&clean, p).is_some());
                if metadata {
                    self.state = State::SkippingMetadata;
                } else {
                    self.normal(line);
                }
            }
            State::InList(mut items) => match classify(line) {
                Line::Bullet(text) => {
                    items.push(parse_inline(text));
                    self.state = State::InList(items);
                }
                _ => {
                    self.push_list(items);
                    self.normal(line);
                }
            },
            State::InGlossary(mut entries) => match classify(line) {
                // Blank lines before the first entry are tolerated
                Line::Blank if entries.is_empty() => self.state = State::InGlossary(entries),
                Line::Blank => self.push_glossary(entries),
                Line::Heading { .. } | Line::GlossaryHeader | Line::Question(_) => {
                    self.push_glossary(entries);
                    self.normal(line);
                }
                _ => match parse_glossary_entry(line) {
                    Some(entry) => {
                        entries.push(entry);
                        self.state = State::InGlossary(entries);
                    }
                    None => {
                        self.push_glossary(entries);
                        self.normal(line);
                    }
                },
            },
        }
    }

    fn normal(&mut self, line: &str) {
        match classify(line) {
            Line::Blank => {}
            Line::Heading { level, text } => self.nodes.push(RenderNode::Heading {
                level,
                text: parse_inline(text),
            }),
            Line::GlossaryHeader => self.state = State::InGlossary(Vec::new()),
            Line::Question(text) => {
                if self.grade != GradeLevel::Lower {
                    self.nodes.push(RenderNode::Question {
                        text: parse_inline(&text),
                        advanced: self.grade == GradeLevel::Middle,
                    });
                }
            }
            Line::Bullet(text) => self.state = State::InList(vec![parse_inline(text)]),
            Line::Text(text) => self.nodes.push(RenderNode::Paragraph {
                text: parse_inline(text),
            }),
        }
    }

    fn flush(&mut self) {
        match std::mem::replace(&mut self.state, State::Normal) {
            State::InList(items) => self.push_list(items),
            State::InGlossary(entries) => self.push_glossary(entries),
            State::Normal | State::SkippingMetadata => {}
        }
    }

    fn push_list(&mut self, items: Vec<Vec<Span>>) {
        let style = match self.profile {
            Profile::Adhd => ListStyle::Checklist,
            _ => ListStyle::Plain,
        };
        self.nodes.push(RenderNode::List { style, items });
    }

    fn push_glossary(&mut self, entries: Vec<GlossaryEntry>) {
        if !entries.is_empty() {
            self.nodes.push(RenderNode::Glossary { entries });
        }
    }
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }

    if line.starts_with('#') {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        let rest = &line[hashes..];
        if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
            // A single `#` is promoted to level 2
            let level = hashes.clamp(2, 6) as u8;
            return Line::Heading {
                level,
                text: rest.trim(),
            };
        }
    }

    let clean = strip_emphasis(line);
    let clean = clean.trim();
    if clean.eq_ignore_ascii_case("glossary") || clean.eq_ignore_ascii_case("glossary:") {
        return Line::GlossaryHeader;
    }
    if let Some(rest) = strip_prefix_ci(clean, "question:") {
        return Line::Question(rest.trim().to_string());
    }

    if let Some(text) = strip_bullet(line) {
        return Line::Bullet(text);
    }

    Line::Text(line)
}

/// Text after a `•`, `*` or `-` marker followed by whitespace.
fn strip_bullet(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let marker = chars.next()?;
    if !matches!(marker, '•' | '*' | '-') {
        return None;
    }
    let rest = chars.as_str();
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn parse_glossary_entry(line: &str) -> Option<GlossaryEntry> {
    let line = strip_bullet(line).unwrap_or(line);
    let (term, definition) = line
        .split_once(" - ")
        .or_else(|| line.split_once(':'))?;
    let term = strip_markdown(term);
    let definition = strip_markdown(definition);
    if term.is_empty() || definition.is_empty() {
        return None;
    }
    Some(GlossaryEntry { term, definition })
}

/// Parse `**strong**` runs. Unclosed markers stay literal.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        push_text(&mut spans, &rest[..start]);
        let inner = &after[..end];
        if !inner.is_empty() {
            spans.push(Span::Strong(inner.to_string()));
        }
        rest = &after[end + 2..];
    }
    push_text(&mut spans, rest);
    spans
}

fn push_text(spans: &mut Vec<Span>, text: &str) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(Span::Text(previous)) => previous.push_str(text),
        _ => spans.push(Span::Text(text.to_string())),
    }
}

/// First line of a heading block, with leading `#` markers removed.
pub(super) fn parse_heading_block(raw: &str) -> RenderTree {
    let Some(first) = raw.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return RenderTree::default();
    };
    let text = first.trim_start_matches('#').trim();
    let text = if text.is_empty() { first } else { text };
    RenderTree {
        nodes: vec![RenderNode::Inline {
            text: parse_inline(text),
        }],
    }
}

fn strip_emphasis(line: &str) -> String {
    line.replace("**", "")
}

/// Remove leftover markdown and collapse whitespace.
fn strip_markdown(text: &str) -> String {
    text.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim_matches(|c: char| c == '#' || c == '*' || c == '_' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Vec<RenderNode> {
        Parser::new(Profile::Default, GradeLevel::Middle)
            .parse(raw)
            .nodes
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(""), Line::Blank);
        assert_eq!(
            classify("### Steps"),
            Line::Heading {
                level: 3,
                text: "Steps"
            }
        );
        assert_eq!(
            classify("######## Deep"),
            Line::Heading {
                level: 6,
                text: "Deep"
            }
        );
        assert_eq!(
            classify("# Top"),
            Line::Heading {
                level: 2,
                text: "Top"
            }
        );
        assert_eq!(classify("#hashtag"), Line::Text("#hashtag"));
        assert_eq!(classify("GLOSSARY:"), Line::GlossaryHeader);
        assert_eq!(classify("**Glossary**"), Line::GlossaryHeader);
        assert_eq!(
            classify("Question:   Why?"),
            Line::Question("Why?".to_string())
        );
        assert_eq!(classify("• one"), Line::Bullet("one"));
        assert_eq!(classify("* two"), Line::Bullet("two"));
        assert_eq!(classify("-three"), Line::Text("-three"));
        assert_eq!(classify("**Bold** start"), Line::Text("**Bold** start"));
    }

    #[test]
    fn test_inline_parsing() {
        assert_eq!(
            parse_inline("a **b** c **d**"),
            vec![
                Span::Text("a ".into()),
                Span::Strong("b".into()),
                Span::Text(" c ".into()),
                Span::Strong("d".into()),
            ]
        );
        assert_eq!(
            parse_inline("open **marker"),
            vec![Span::Text("open **marker".into())]
        );
    }

    #[test]
    fn test_glossary_entry_count_ignores_blank_lines() {
        let nodes = parse("Intro.\n\nGlossary\n\n\n- **lava** - melted   rock\nvent: an opening\n\nAfter.");
        let entries = nodes
            .iter()
            .find_map(|n| match n {
                RenderNode::Glossary { entries } => Some(entries.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            entries,
            vec![
                GlossaryEntry {
                    term: "lava".into(),
                    definition: "melted rock".into()
                },
                GlossaryEntry {
                    term: "vent".into(),
                    definition: "an opening".into()
                },
            ]
        );
        assert!(matches!(nodes.last(), Some(RenderNode::Paragraph { .. })));
    }

    #[test]
    fn test_glossary_closed_by_plain_line() {
        let nodes = parse("Glossary:\nash - tiny rock bits\nThis line has no separator");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[1], RenderNode::Paragraph { .. }));
    }

    #[test]
    fn test_list_closed_by_paragraph() {
        let nodes = parse("- one\n- two\nAfter the list.");
        assert!(matches!(&nodes[0], RenderNode::List { items, .. } if items.len() == 2));
        assert!(matches!(nodes[1], RenderNode::Paragraph { .. }));
    }

    #[test]
    fn test_metadata_only_skipped_at_start() {
        let nodes = parse("Lava is hot.\nAudience: everyone");
        assert_eq!(nodes.len(), 2);
    }
}
