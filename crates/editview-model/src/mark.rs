use std::fmt;
use std::sync::Arc;

use crate::node::Attrs;
use crate::schema::{MarkType, MarkTypeId};

/// An inline annotation (emphasis, link, ...) attached to inline nodes.
/// Mark sets are kept sorted by type rank with at most one mark per type.
#[derive(Clone)]
pub struct Mark {
    ty: Arc<MarkType>,
    attrs: Attrs,
}

impl Mark {
    pub fn new(ty: Arc<MarkType>, attrs: Attrs) -> Self {
        Self { ty, attrs }
    }

    pub fn ty(&self) -> &Arc<MarkType> {
        &self.ty
    }

    pub fn type_id(&self) -> MarkTypeId {
        self.ty.id
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn is_inclusive(&self) -> bool {
        self.ty.spec.inclusive
    }

    /// Insert this mark into a sorted set, replacing a mark of the same type.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut result = Vec::with_capacity(set.len() + 1);
        let mut placed = false;
        for other in set {
            if other == self {
                return set.to_vec();
            }
            if other.type_id() == self.type_id() {
                continue;
            }
            if !placed && other.type_id() > self.type_id() {
                result.push(self.clone());
                placed = true;
            }
            result.push(other.clone());
        }
        if !placed {
            result.push(self.clone());
        }
        result
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|mark| *mark != self).cloned().collect()
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|mark| mark == self)
    }

    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
    }
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.ty.id == other.ty.id && self.attrs == other.attrs
    }
}

impl Eq for Mark {}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            write!(f, "{}", self.ty.name)
        } else {
            write!(f, "{}{:?}", self.ty.name, self.attrs)
        }
    }
}
