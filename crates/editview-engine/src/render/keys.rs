use std::collections::BTreeMap;

use editview_model::{Assoc, Mapping, Node, NodeTypeId, Transaction};
use log::{debug, trace};
use serde::Serialize;

/// Opaque identity of a document node, stable across transactions that
/// only move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey(u64);

#[derive(Debug, Clone, Default)]
struct Frozen {
    /// Everything applied since the freeze, in order
    pending: Mapping,
    /// Bust requests, in positions of the latest document
    busts: Vec<usize>,
}

/// Position to key map for every non-text node of one document.
///
/// Keys are carried through a transaction by mapping each old position
/// forward. An entry survives only when its node start was not deleted and
/// a node of the same type sits at the mapped position. While frozen (an
/// input method is composing) the map is left untouched and lookups are
/// translated back through the pending changes.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    entries: BTreeMap<usize, (NodeKey, NodeTypeId)>,
    next: u64,
    frozen: Option<Frozen>,
}

impl KeyRegistry {
    pub fn new(doc: &Node) -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
            next: 0,
            frozen: None,
        };
        registry.mint_missing(doc);
        registry
    }

    fn mint(&mut self) -> NodeKey {
        self.next += 1;
        NodeKey(self.next)
    }

    /// Mint keys for nodes without one. Returns their positions.
    fn mint_missing(&mut self, doc: &Node) -> Vec<usize> {
        let mut missing = Vec::new();
        doc.descendants(&mut |node, pos, _| {
            if !node.is_text() {
                missing.push((pos, node.type_id()));
            }
            true
        });
        let mut minted = Vec::new();
        for (pos, ty) in missing {
            if self.entries.contains_key(&pos) {
                continue;
            }
            let key = self.mint();
            self.entries.insert(pos, (key, ty));
            minted.push(pos);
        }
        minted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Key of the node starting at `pos` in the current document
    pub fn key_at(&self, pos: usize) -> Option<NodeKey> {
        let pos = match &self.frozen {
            Some(frozen) => {
                let back = frozen.pending.invert().map_result(pos, Assoc::Right);
                if back.deleted() {
                    return None;
                }
                back.pos
            }
            None => pos,
        };
        self.entries.get(&pos).map(|(key, _)| *key)
    }

    /// Position of the node holding `key`, in the current document
    pub fn pos_of(&self, key: NodeKey) -> Option<usize> {
        let pos = self
            .entries
            .iter()
            .find(|(_, (k, _))| *k == key)
            .map(|(pos, _)| *pos)?;
        match &self.frozen {
            Some(frozen) => {
                let result = frozen.pending.map_result(pos, Assoc::Right);
                (!result.deleted()).then_some(result.pos)
            }
            None => Some(pos),
        }
    }

    /// Carry keys through `tr`. Returns the positions that received a fresh
    /// key, empty while frozen.
    pub fn apply(&mut self, tr: &Transaction) -> Vec<usize> {
        if let Some(frozen) = &mut self.frozen {
            for bust in &mut frozen.busts {
                *bust = tr.mapping().map(*bust, Assoc::Right);
            }
            frozen.pending.append_mapping(tr.mapping());
            frozen.busts.extend(tr.meta.bust_keys.iter().copied());
            trace!("key registry frozen, deferring {} steps", tr.steps().len());
            return Vec::new();
        }
        self.remap(tr.mapping(), &tr.meta.bust_keys, tr.doc())
    }

    fn remap(&mut self, mapping: &Mapping, busts: &[usize], doc: &Node) -> Vec<usize> {
        if mapping.is_empty() && busts.is_empty() {
            return Vec::new();
        }
        let old = std::mem::take(&mut self.entries);
        let mut dropped = 0;
        for (pos, (key, ty)) in old {
            let result = mapping.map_result(pos, Assoc::Right);
            if result.deleted() || busts.contains(&result.pos) {
                dropped += 1;
                continue;
            }
            let persists = doc
                .node_at(result.pos)
                .is_some_and(|node| !node.is_text() && node.type_id() == ty);
            if !persists || self.entries.contains_key(&result.pos) {
                dropped += 1;
                continue;
            }
            self.entries.insert(result.pos, (key, ty));
        }
        let minted = self.mint_missing(doc);
        debug!(
            "keys remapped: {} kept, {} dropped, {} minted",
            self.entries.len() - minted.len(),
            dropped,
            minted.len()
        );
        minted
    }

    /// Suspend key changes until [`KeyRegistry::thaw`]
    pub fn freeze(&mut self) {
        if self.frozen.is_none() {
            self.frozen = Some(Frozen::default());
        }
    }

    /// Apply everything deferred since the freeze in one go
    pub fn thaw(&mut self, doc: &Node) -> Vec<usize> {
        match self.frozen.take() {
            Some(frozen) => self.remap(&frozen.pending, &frozen.busts, doc),
            None => Vec::new(),
        }
    }

    /// Forget every identity and mint fresh keys for `doc`
    pub fn reset(&mut self, doc: &Node) {
        self.entries.clear();
        self.frozen = None;
        self.mint_missing(doc);
    }
}
