use serde::Serialize;

use super::DomId;

/// A position in the DOM: a node and an offset into it (chars for text
/// nodes, child index for elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DomPoint {
    pub node: DomId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: DomId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: DomPoint,
    pub end: DomPoint,
}

/// The native selection object of the headless document.
///
/// Every write marks a pending `selectionchange`, delivered later through
/// [`DomSelection::take_change`], the same way browsers queue the event
/// instead of firing it synchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomSelection {
    anchor: Option<DomPoint>,
    focus: Option<DomPoint>,
    supports_extend: bool,
    change_pending: bool,
}

impl DomSelection {
    pub fn new(supports_extend: bool) -> Self {
        Self {
            anchor: None,
            focus: None,
            supports_extend,
            change_pending: false,
        }
    }

    pub fn anchor(&self) -> Option<DomPoint> {
        self.anchor
    }

    pub fn focus(&self) -> Option<DomPoint> {
        self.focus
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn range_count(&self) -> usize {
        usize::from(self.anchor.is_some())
    }

    pub fn supports_extend(&self) -> bool {
        self.supports_extend
    }

    pub fn set_supports_extend(&mut self, supported: bool) {
        self.supports_extend = supported;
    }

    pub(crate) fn collapse(&mut self, point: DomPoint) {
        self.anchor = Some(point);
        self.focus = Some(point);
        self.change_pending = true;
    }

    pub(crate) fn extend(&mut self, point: DomPoint) -> bool {
        if !self.supports_extend || self.anchor.is_none() {
            return false;
        }
        self.focus = Some(point);
        self.change_pending = true;
        true
    }

    /// Ranges are always forward: the anchor ends up at the start.
    pub(crate) fn add_range(&mut self, range: DomRange) {
        self.anchor = Some(range.start);
        self.focus = Some(range.end);
        self.change_pending = true;
    }

    pub fn remove_all_ranges(&mut self) {
        if self.anchor.is_some() {
            self.change_pending = true;
        }
        self.anchor = None;
        self.focus = None;
    }

    /// Whether a `selectionchange` is waiting to be delivered. Clears it.
    pub fn take_change(&mut self) -> bool {
        std::mem::take(&mut self.change_pending)
    }

    pub fn has_pending_change(&self) -> bool {
        self.change_pending
    }
}

impl Default for DomSelection {
    fn default() -> Self {
        Self::new(true)
    }
}
