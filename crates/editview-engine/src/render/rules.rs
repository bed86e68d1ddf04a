use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use editview_model::schema::{MarkToDom, NodeToDom};
use editview_model::{DomOutput, Mark, MarkTypeId, Node, NodeTypeId, Schema};

use crate::error::ViewError;

/// Custom rendering for one node type. The returned element is mounted
/// in place of the schema's rule; when it has a content hole the node's
/// children are rendered inside it.
pub trait NodeViewOverride: fmt::Debug {
    fn render(&self, node: &Node) -> DomOutput;
}

/// Overrides by node type name, as handed to a view session.
#[derive(Debug, Clone, Default)]
pub struct NodeViews {
    views: Vec<(String, Arc<dyn NodeViewOverride>)>,
}

impl NodeViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, node_type: &str, view: Arc<dyn NodeViewOverride>) -> Self {
        self.views.retain(|(name, _)| name != node_type);
        self.views.push((node_type.to_string(), view));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Same type names bound to the very same override objects
    pub fn same_as(&self, other: &NodeViews) -> bool {
        self.views.len() == other.views.len()
            && self
                .views
                .iter()
                .zip(&other.views)
                .all(|((a_name, a), (b_name, b))| a_name == b_name && Arc::ptr_eq(a, b))
    }
}

#[derive(Clone)]
enum NodeRule {
    Schema(NodeToDom),
    Override(Arc<dyn NodeViewOverride>),
}

impl fmt::Debug for NodeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRule::Schema(_) => f.write_str("Schema"),
            NodeRule::Override(view) => write!(f, "Override({view:?})"),
        }
    }
}

/// Render rules resolved once per node and mark type.
#[derive(Debug, Clone)]
pub struct RenderRegistry {
    nodes: HashMap<NodeTypeId, NodeRule>,
    marks: HashMap<MarkTypeId, MarkToDom>,
}

impl RenderRegistry {
    pub fn new(schema: &Schema, views: &NodeViews) -> Result<Self, ViewError> {
        let mut nodes = HashMap::new();
        for ty in schema.node_types() {
            if let Some(to_dom) = ty.to_dom() {
                nodes.insert(ty.id, NodeRule::Schema(to_dom));
            }
        }
        for (name, view) in &views.views {
            let ty = schema.node_type(name)?;
            nodes.insert(ty.id, NodeRule::Override(view.clone()));
        }
        let marks = schema
            .mark_types()
            .filter_map(|ty| ty.to_dom().map(|to_dom| (ty.id, to_dom)))
            .collect();
        Ok(Self { nodes, marks })
    }

    /// Element for a non-text node. Fails when the type has no rule.
    pub fn node_dom(&self, node: &Node) -> Result<DomOutput, ViewError> {
        match self.nodes.get(&node.type_id()) {
            Some(NodeRule::Schema(to_dom)) => Ok(to_dom(node)),
            Some(NodeRule::Override(view)) => Ok(view.render(node)),
            None => Err(ViewError::MissingNodeRule {
                node_type: node.type_name().to_string(),
            }),
        }
    }

    pub fn is_overridden(&self, ty: NodeTypeId) -> bool {
        matches!(self.nodes.get(&ty), Some(NodeRule::Override(_)))
    }

    pub fn mark_dom(&self, mark: &Mark) -> Result<DomOutput, ViewError> {
        self.marks
            .get(&mark.type_id())
            .map(|to_dom| to_dom(mark))
            .ok_or_else(|| ViewError::MissingMarkRule {
                mark_type: mark.type_name().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use editview_model::ModelError;
    use editview_model::builders::{basic_schema, em_mark, hr, img, pt};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Figure;

    impl NodeViewOverride for Figure {
        fn render(&self, node: &Node) -> DomOutput {
            DomOutput::leaf("figure").with_attr("data-src", node.attr("src").unwrap_or_default())
        }
    }

    #[test]
    fn test_schema_rules() {
        let registry = RenderRegistry::new(&basic_schema(), &NodeViews::new()).unwrap();

        assert_eq!(registry.node_dom(&pt("a")).unwrap().tag, "p");
        assert_eq!(registry.node_dom(&hr()).unwrap(), DomOutput::leaf("hr"));
        assert_eq!(registry.mark_dom(&em_mark()).unwrap().tag, "em");
    }

    #[test]
    fn test_override_replaces_schema_rule() {
        let views = NodeViews::new().with("image", Arc::new(Figure));
        let registry = RenderRegistry::new(&basic_schema(), &views).unwrap();

        let out = registry.node_dom(&img("a.png")).unwrap();
        assert_eq!(out.tag, "figure");
        assert!(!out.hole);
        assert!(registry.is_overridden(img("a.png").type_id()));
    }

    #[test]
    fn test_missing_rule_is_an_error() {
        let registry = RenderRegistry::new(&basic_schema(), &NodeViews::new()).unwrap();
        let d = editview_model::builders::doc(vec![pt("a")]);

        assert_eq!(
            registry.node_dom(&d),
            Err(ViewError::MissingNodeRule {
                node_type: "doc".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_override_name() {
        let views = NodeViews::new().with("figure", Arc::new(Figure));
        let err = RenderRegistry::new(&basic_schema(), &views).unwrap_err();
        assert_eq!(
            err,
            ViewError::Model(ModelError::UnknownNodeType("figure".to_string()))
        );
    }

    #[test]
    fn test_same_as_compares_identity() {
        let figure: Arc<dyn NodeViewOverride> = Arc::new(Figure);
        let a = NodeViews::new().with("image", figure.clone());
        let b = NodeViews::new().with("image", figure);
        let c = NodeViews::new().with("image", Arc::new(Figure));

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
