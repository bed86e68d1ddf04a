//! A small schema and node builders for tests, benches and demos.
//!
//! ```rust
//! use editview_model::builders::{doc, em, p, txt};
//!
//! let d = doc(vec![p(vec![txt("plain "), em(txt("slanted"))])]);
//! assert_eq!(format!("{d:?}"), r#"doc(paragraph("plain ", em("slanted")))"#);
//! ```

use std::sync::{Arc, LazyLock};

use crate::mark::Mark;
use crate::node::{Attrs, Fragment, Node};
use crate::schema::{
    ContentKind, DomOutput, MarkSpec, MarkTypeId, NodeSpec, NodeTypeId, Schema,
};

const DOC: NodeTypeId = NodeTypeId(0);
const PARAGRAPH: NodeTypeId = NodeTypeId(1);
const BLOCKQUOTE: NodeTypeId = NodeTypeId(2);
const HEADING: NodeTypeId = NodeTypeId(3);
const HORIZONTAL_RULE: NodeTypeId = NodeTypeId(4);
const TEXT: NodeTypeId = NodeTypeId(5);
const IMAGE: NodeTypeId = NodeTypeId(6);
const HARD_BREAK: NodeTypeId = NodeTypeId(7);

const LINK: MarkTypeId = MarkTypeId(0);
const EM: MarkTypeId = MarkTypeId(1);
const STRONG: MarkTypeId = MarkTypeId(2);
const CODE: MarkTypeId = MarkTypeId(3);

static BASIC: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Schema::build(
        vec![
            ("doc", NodeSpec::block(ContentKind::Block)),
            (
                "paragraph",
                NodeSpec::block(ContentKind::Inline).with_dom(|_| DomOutput::new("p")),
            ),
            (
                "blockquote",
                NodeSpec::block(ContentKind::Block).with_dom(|_| DomOutput::new("blockquote")),
            ),
            (
                "heading",
                NodeSpec::block(ContentKind::Inline)
                    .with_dom(|node| {
                        DomOutput::new(&format!("h{}", node.attr("level").unwrap_or("1")))
                    }),
            ),
            (
                "horizontal_rule",
                NodeSpec::block(ContentKind::Empty).with_dom(|_| DomOutput::leaf("hr")),
            ),
            ("text", NodeSpec::text()),
            (
                "image",
                NodeSpec::inline_leaf().with_dom(|node| {
                    DomOutput::leaf("img").with_attr("src", node.attr("src").unwrap_or_default())
                }),
            ),
            (
                "hard_break",
                NodeSpec::inline_leaf()
                    .line_break()
                    .with_dom(|_| DomOutput::leaf("br")),
            ),
        ],
        vec![
            (
                "link",
                MarkSpec::new().exclusive().with_dom(|mark| {
                    DomOutput::new("a").with_attr("href", mark.attr("href").unwrap_or_default())
                }),
            ),
            ("em", MarkSpec::new().with_dom(|_| DomOutput::new("em"))),
            ("strong", MarkSpec::new().with_dom(|_| DomOutput::new("strong"))),
            ("code", MarkSpec::new().with_dom(|_| DomOutput::new("code"))),
        ],
        TEXT,
    )
});

/// Schema with paragraphs, blockquotes, headings, rules, images, hard
/// breaks and the link/em/strong/code marks.
pub fn basic_schema() -> Arc<Schema> {
    BASIC.clone()
}

fn node(id: NodeTypeId, attrs: Attrs, content: Vec<Node>) -> Node {
    Node::new(
        BASIC.node_type_at(id).clone(),
        attrs,
        Fragment::from_vec(content),
        Vec::new(),
    )
}

fn attrs(pairs: &[(&str, &str)]) -> Attrs {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

pub fn doc(children: Vec<Node>) -> Node {
    node(DOC, Attrs::new(), children)
}

pub fn p(children: Vec<Node>) -> Node {
    node(PARAGRAPH, Attrs::new(), children)
}

/// Paragraph holding a single plain text run
pub fn pt(text: &str) -> Node {
    p(vec![txt(text)])
}

pub fn blockquote(children: Vec<Node>) -> Node {
    node(BLOCKQUOTE, Attrs::new(), children)
}

pub fn h(level: u8, children: Vec<Node>) -> Node {
    node(HEADING, attrs(&[("level", &level.to_string())]), children)
}

pub fn hr() -> Node {
    node(HORIZONTAL_RULE, Attrs::new(), Vec::new())
}

pub fn txt(text: &str) -> Node {
    BASIC.text(text, Vec::new())
}

pub fn img(src: &str) -> Node {
    node(IMAGE, attrs(&[("src", src)]), Vec::new())
}

pub fn br() -> Node {
    node(HARD_BREAK, Attrs::new(), Vec::new())
}

fn mark_of(id: MarkTypeId, attrs: Attrs) -> Mark {
    Mark::new(BASIC.mark_type_at(id).clone(), attrs)
}

pub fn em_mark() -> Mark {
    mark_of(EM, Attrs::new())
}

pub fn strong_mark() -> Mark {
    mark_of(STRONG, Attrs::new())
}

pub fn code_mark() -> Mark {
    mark_of(CODE, Attrs::new())
}

pub fn link_mark(href: &str) -> Mark {
    mark_of(LINK, attrs(&[("href", href)]))
}

fn with_mark(mark: Mark, node: Node) -> Node {
    let marks = mark.add_to_set(node.marks());
    node.mark(marks)
}

pub fn em(node: Node) -> Node {
    with_mark(em_mark(), node)
}

pub fn strong(node: Node) -> Node {
    with_mark(strong_mark(), node)
}

pub fn code(node: Node) -> Node {
    with_mark(code_mark(), node)
}

pub fn link(href: &str, node: Node) -> Node {
    with_mark(link_mark(href), node)
}
