use editview_model::{Decoration, DecorationSource, Mark, Node};
use serde::Serialize;

use crate::dom::DomId;
use crate::render::NodeKey;

/// Index of a descriptor in its [`super::DescTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DescId(pub(crate) usize);

/// How much of a descriptor must be re-derived on the next update.
/// Ordered: a stronger state never gets downgraded by a weaker one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Dirty {
    NotDirty,
    /// Some child needs work, this descriptor's own children list is fine
    ChildDirty,
    /// The children list must be rebuilt
    ContentDirty,
    /// The descriptor and its DOM must be recreated
    NodeDirty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HackKind {
    /// `<br>` that keeps an empty or break-terminated textblock one line high
    TrailingBreak,
    /// `<img>` giving the caret something to sit next to after an
    /// uneditable node
    Separator,
}

#[derive(Debug, Clone)]
pub enum DescKind {
    Node {
        node: Node,
        outer: Vec<Decoration>,
        inner: DecorationSource,
        key: Option<NodeKey>,
    },
    Text {
        node: Node,
        outer: Vec<Decoration>,
    },
    Mark {
        mark: Mark,
    },
    Widget {
        deco: Decoration,
    },
    /// Browser-created text of a running composition that has no document
    /// counterpart yet
    Composition {
        text: String,
    },
    TrailingHack(HackKind),
}

#[derive(Debug, Clone)]
pub struct Desc {
    pub kind: DescKind,
    pub parent: Option<DescId>,
    pub children: Vec<DescId>,
    /// Outermost DOM node, including decoration wrappers
    pub dom: DomId,
    /// The node's own DOM (text node for text)
    pub node_dom: DomId,
    /// Where children are rendered, if anywhere
    pub content_dom: Option<DomId>,
    pub dirty: Dirty,
    /// How many times this descriptor was created or re-derived
    pub derivations: u32,
    pub(crate) alive: bool,
}

impl Desc {
    pub(crate) fn new(
        kind: DescKind,
        dom: DomId,
        node_dom: DomId,
        content_dom: Option<DomId>,
    ) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            dom,
            node_dom,
            content_dom,
            dirty: Dirty::NotDirty,
            derivations: 1,
            alive: true,
        }
    }

    pub fn node(&self) -> Option<&Node> {
        match &self.kind {
            DescKind::Node { node, .. } | DescKind::Text { node, .. } => Some(node),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<NodeKey> {
        match &self.kind {
            DescKind::Node { key, .. } => *key,
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, DescKind::Node { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, DescKind::Text { .. })
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.kind, DescKind::Widget { .. })
    }

    pub fn is_hack(&self) -> bool {
        matches!(self.kind, DescKind::TrailingHack(_))
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Widget side, 0 for everything else
    pub fn side(&self) -> i32 {
        match &self.kind {
            DescKind::Widget { deco } => deco.side(),
            _ => 0,
        }
    }

    /// The DOM is a single uneditable unit the caret can only sit next to
    pub fn dom_atom(&self) -> bool {
        match &self.kind {
            DescKind::Node { node, .. } => node.is_leaf(),
            DescKind::Widget { .. } | DescKind::TrailingHack(_) => true,
            _ => false,
        }
    }

    pub fn outer_decorations(&self) -> &[Decoration] {
        match &self.kind {
            DescKind::Node { outer, .. } | DescKind::Text { outer, .. } => outer,
            _ => &[],
        }
    }

    pub(crate) fn name(&self) -> String {
        match &self.kind {
            DescKind::Node { node, .. } => node.type_name().to_string(),
            DescKind::Text { .. } => "text".to_string(),
            DescKind::Mark { mark } => format!("mark:{}", mark.type_name()),
            DescKind::Widget { .. } => "widget".to_string(),
            DescKind::Composition { .. } => "composition".to_string(),
            DescKind::TrailingHack(HackKind::TrailingBreak) => "hack:br".to_string(),
            DescKind::TrailingHack(HackKind::Separator) => "hack:img".to_string(),
        }
    }
}

/// Serialisable view of a descriptor subtree, for debugging and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescSnapshot {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub pos: usize,
    pub size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DescSnapshot>,
}
