use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ModelError;
use crate::mark::Mark;
use crate::node::{Attrs, Fragment, Node};

/// Stable identifier of a node type within one schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeTypeId(pub u16);

/// Stable identifier of a mark type within one schema. Also its rank:
/// mark sets are kept ordered by this id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkTypeId(pub u16);

/// What a node may contain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContentKind {
    /// Leaf node (text, image, hard break)
    Empty,
    /// Textblock: inline nodes only
    Inline,
    /// Container: block nodes only
    Block,
}

/// Render rule output: the element a node or mark is drawn as.
#[derive(Debug, Clone, PartialEq)]
pub struct DomOutput {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    /// Whether content is rendered inside this element
    pub hole: bool,
}

impl DomOutput {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            hole: true,
        }
    }

    pub fn leaf(tag: &str) -> Self {
        Self {
            hole: false,
            ..Self::new(tag)
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }
}

pub type NodeToDom = fn(&Node) -> DomOutput;
pub type MarkToDom = fn(&Mark) -> DomOutput;

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub inline: bool,
    pub content: ContentKind,
    pub text: bool,
    pub line_break: bool,
    pub to_dom: Option<NodeToDom>,
}

impl NodeSpec {
    pub fn block(content: ContentKind) -> Self {
        Self {
            inline: false,
            content,
            text: false,
            line_break: false,
            to_dom: None,
        }
    }

    pub fn inline_leaf() -> Self {
        Self {
            inline: true,
            content: ContentKind::Empty,
            text: false,
            line_break: false,
            to_dom: None,
        }
    }

    pub fn text() -> Self {
        Self {
            text: true,
            ..Self::inline_leaf()
        }
    }

    pub fn with_dom(mut self, to_dom: NodeToDom) -> Self {
        self.to_dom = Some(to_dom);
        self
    }

    /// Marks this inline leaf as the schema's hard line break.
    pub fn line_break(mut self) -> Self {
        self.line_break = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MarkSpec {
    /// Whether text typed at the end of the mark picks it up
    pub inclusive: bool,
    pub to_dom: Option<MarkToDom>,
}

impl MarkSpec {
    pub fn new() -> Self {
        Self {
            inclusive: true,
            to_dom: None,
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn with_dom(mut self, to_dom: MarkToDom) -> Self {
        self.to_dom = Some(to_dom);
        self
    }
}

impl Default for MarkSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct NodeType {
    pub id: NodeTypeId,
    pub name: String,
    pub spec: NodeSpec,
}

impl NodeType {
    pub fn is_text(&self) -> bool {
        self.spec.text
    }

    pub fn is_inline(&self) -> bool {
        self.spec.inline
    }

    pub fn is_block(&self) -> bool {
        !self.spec.inline
    }

    pub fn is_leaf(&self) -> bool {
        self.spec.content == ContentKind::Empty
    }

    pub fn is_textblock(&self) -> bool {
        self.spec.content == ContentKind::Inline
    }

    pub fn is_line_break(&self) -> bool {
        self.spec.line_break
    }

    pub fn to_dom(&self) -> Option<NodeToDom> {
        self.spec.to_dom
    }

    /// Whether content produced for `other` may be placed in this type
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self.id == other.id || self.spec.content == other.spec.content
    }

    pub fn check_content(&self, content: &Fragment) -> Result<(), ModelError> {
        let valid = match self.spec.content {
            ContentKind::Empty => content.size() == 0,
            ContentKind::Inline => content.iter().all(|child| child.is_inline()),
            ContentKind::Block => content.iter().all(|child| child.is_block()),
        };
        if valid {
            Ok(())
        } else {
            Err(ModelError::InvalidContent {
                node_type: self.name.clone(),
            })
        }
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

#[derive(Debug)]
pub struct MarkType {
    pub id: MarkTypeId,
    pub name: String,
    pub spec: MarkSpec,
}

impl MarkType {
    pub fn to_dom(&self) -> Option<MarkToDom> {
        self.spec.to_dom
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

/// Node and mark types of one document family. The first node type is the
/// top node; a `text` type is required.
#[derive(Debug)]
pub struct Schema {
    nodes: Vec<Arc<NodeType>>,
    marks: Vec<Arc<MarkType>>,
    node_names: HashMap<String, NodeTypeId>,
    mark_names: HashMap<String, MarkTypeId>,
    text: NodeTypeId,
}

impl Schema {
    pub fn new(
        nodes: Vec<(&str, NodeSpec)>,
        marks: Vec<(&str, MarkSpec)>,
    ) -> Result<Arc<Schema>, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::MissingSchemaNode("top node"));
        }

        let text = nodes
            .iter()
            .position(|(_, spec)| spec.text)
            .ok_or(ModelError::MissingSchemaNode("text"))?;
        Ok(Self::build(nodes, marks, NodeTypeId(text as u16)))
    }

    /// Assemble a schema whose node list is known to be valid.
    pub(crate) fn build(
        nodes: Vec<(&str, NodeSpec)>,
        marks: Vec<(&str, MarkSpec)>,
        text: NodeTypeId,
    ) -> Arc<Schema> {
        let nodes: Vec<Arc<NodeType>> = nodes
            .into_iter()
            .enumerate()
            .map(|(index, (name, spec))| {
                Arc::new(NodeType {
                    id: NodeTypeId(index as u16),
                    name: name.to_string(),
                    spec,
                })
            })
            .collect();
        let marks: Vec<Arc<MarkType>> = marks
            .into_iter()
            .enumerate()
            .map(|(index, (name, spec))| {
                Arc::new(MarkType {
                    id: MarkTypeId(index as u16),
                    name: name.to_string(),
                    spec,
                })
            })
            .collect();

        Arc::new(Schema {
            node_names: nodes.iter().map(|ty| (ty.name.clone(), ty.id)).collect(),
            mark_names: marks.iter().map(|ty| (ty.name.clone(), ty.id)).collect(),
            nodes,
            marks,
            text,
        })
    }

    pub fn node_type(&self, name: &str) -> Result<&Arc<NodeType>, ModelError> {
        self.node_names
            .get(name)
            .map(|id| &self.nodes[id.0 as usize])
            .ok_or_else(|| ModelError::UnknownNodeType(name.to_string()))
    }

    pub fn node_type_by_id(&self, id: NodeTypeId) -> Option<&Arc<NodeType>> {
        self.nodes.get(id.0 as usize)
    }

    pub(crate) fn node_type_at(&self, id: NodeTypeId) -> &Arc<NodeType> {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn mark_type_at(&self, id: MarkTypeId) -> &Arc<MarkType> {
        &self.marks[id.0 as usize]
    }

    pub fn mark_type(&self, name: &str) -> Result<&Arc<MarkType>, ModelError> {
        self.mark_names
            .get(name)
            .map(|id| &self.marks[id.0 as usize])
            .ok_or_else(|| ModelError::UnknownMarkType(name.to_string()))
    }

    pub fn node_types(&self) -> impl Iterator<Item = &Arc<NodeType>> {
        self.nodes.iter()
    }

    pub fn mark_types(&self) -> impl Iterator<Item = &Arc<MarkType>> {
        self.marks.iter()
    }

    pub fn top_node_type(&self) -> &Arc<NodeType> {
        &self.nodes[0]
    }

    pub fn text_type(&self) -> &Arc<NodeType> {
        &self.nodes[self.text.0 as usize]
    }

    pub fn line_break_type(&self) -> Option<&Arc<NodeType>> {
        self.nodes.iter().find(|ty| ty.is_line_break())
    }

    pub fn text(&self, text: &str, marks: Vec<Mark>) -> Node {
        Node::new_text(self.text_type().clone(), text, marks)
    }

    pub fn node(&self, name: &str, attrs: Attrs, content: Vec<Node>) -> Result<Node, ModelError> {
        let ty = self.node_type(name)?.clone();
        let content = Fragment::from_vec(content);
        ty.check_content(&content)?;
        Ok(Node::new(ty, attrs, content, Vec::new()))
    }

    pub fn mark(&self, name: &str, attrs: Attrs) -> Result<Mark, ModelError> {
        Ok(Mark::new(self.mark_type(name)?.clone(), attrs))
    }
}
