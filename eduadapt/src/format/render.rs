//! Render tree serialization.

use super::{escape, ListStyle, RenderNode, RenderTree, Span};

pub(super) fn render(tree: &RenderTree) -> String {
    let mut out = String::new();
    for node in &tree.nodes {
        render_node(node, &mut out);
    }
    out
}

fn render_node(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Heading { level, text } => {
            out.push_str(&format!("<h{level} class=\"eduadapt-heading\">"));
            render_spans(text, out);
            out.push_str(&format!("</h{level}>"));
        }
        RenderNode::Paragraph { text } => {
            out.push_str("<p>");
            render_spans(text, out);
            out.push_str("</p>");
        }
        RenderNode::List { style, items } => {
            let class = match style {
                ListStyle::Plain => "eduadapt-list",
                ListStyle::Checklist => "eduadapt-list eduadapt-checklist",
            };
            out.push_str(&format!("<ul class=\"{class}\">"));
            for item in items {
                out.push_str("<li>");
                match style {
                    ListStyle::Plain => render_spans(item, out),
                    ListStyle::Checklist => {
                        out.push_str("<label><input type=\"checkbox\"> <span>");
                        render_spans(item, out);
                        out.push_str("</span></label>");
                    }
                }
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
        RenderNode::Glossary { entries } => {
            out.push_str("<div class=\"eduadapt-glossary\"><h4>Glossary</h4><dl>");
            for entry in entries {
                out.push_str(&format!(
                    "<dt>{}</dt><dd>{}</dd>",
                    escape(&entry.term),
                    escape(&entry.definition)
                ));
            }
            out.push_str("</dl></div>");
        }
        RenderNode::Question { text, advanced } => {
            if *advanced {
                out.push_str("<div class=\"eduadapt-question eduadapt-question-advanced\">");
            } else {
                out.push_str("<div class=\"eduadapt-question\">");
            }
            out.push_str("<strong>Question:</strong> ");
            render_spans(text, out);
            out.push_str("</div>");
        }
        RenderNode::Inline { text } => render_spans(text, out),
    }
}

fn render_spans(spans: &[Span], out: &mut String) {
    for span in spans {
        match span {
            Span::Text(text) => out.push_str(&escape(text)),
            Span::Strong(text) => {
                out.push_str("<strong>");
                out.push_str(&escape(text));
                out.push_str("</strong>");
            }
        }
    }
}
