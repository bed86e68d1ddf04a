//! Two-way synchronisation between the document selection and the native
//! selection of the editable surface.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use editview_config::ViewConfig;
use editview_model::{Selection, SelectionOrigin};
use log::{debug, trace};

use crate::dom::{DomId, DomPoint, DomTree};
use crate::error::DomError;
use crate::view::DescTree;

/// Source of monotonic time for suppression windows.
pub trait Clock: fmt::Debug {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Surface not focused; native notifications are ignored
    Idle,
    Observing,
    /// The view just wrote to the DOM; notifications before `until` echo
    /// that write
    Suppressed { until: Duration },
    /// An input method owns the native selection
    ComposingGuard,
}

/// Last native selection seen or written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionSnapshot {
    pub anchor: Option<DomPoint>,
    pub focus: Option<DomPoint>,
}

impl SelectionSnapshot {
    pub fn read(dom: &DomTree) -> Self {
        Self {
            anchor: dom.selection().anchor(),
            focus: dom.selection().focus(),
        }
    }
}

/// A native selection change resolved to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRead {
    pub selection: Selection,
    pub origin: Option<SelectionOrigin>,
}

#[derive(Debug)]
pub struct SelectionSync {
    state: SyncState,
    snapshot: SelectionSnapshot,
    window: Duration,
    clock: Rc<dyn Clock>,
    origin: Option<SelectionOrigin>,
}

impl SelectionSync {
    pub fn new(window: Duration, clock: Rc<dyn Clock>) -> Self {
        Self {
            state: SyncState::Idle,
            snapshot: SelectionSnapshot::default(),
            window,
            clock,
            origin: None,
        }
    }

    /// Current state, expiring a lapsed suppression first
    pub fn state(&mut self) -> SyncState {
        if let SyncState::Suppressed { until } = self.state {
            if self.clock.now() >= until {
                trace!("selection suppression expired");
                self.state = SyncState::Observing;
            }
        }
        self.state
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.snapshot
    }

    pub fn focus(&mut self) {
        if self.state == SyncState::Idle {
            self.state = SyncState::Observing;
        }
    }

    pub fn blur(&mut self) {
        if self.state != SyncState::ComposingGuard {
            self.state = SyncState::Idle;
        }
    }

    pub fn composition_start(&mut self) {
        debug!("selection handed to input method");
        self.state = SyncState::ComposingGuard;
    }

    pub fn composition_end(&mut self) {
        self.state = SyncState::Observing;
        self.suppress();
    }

    /// Ignore notifications for the configured window. Has no effect while
    /// composing or unfocused.
    pub fn suppress(&mut self) {
        if matches!(self.state, SyncState::Observing | SyncState::Suppressed { .. }) {
            self.state = SyncState::Suppressed {
                until: self.clock.now() + self.window,
            };
        }
    }

    /// Remember what kind of user action the next selection change comes from
    pub fn set_origin(&mut self, origin: SelectionOrigin) {
        self.origin = Some(origin);
    }

    /// Read the native selection after a `selectionchange`. Returns the
    /// document selection to dispatch, if it moved.
    pub fn on_selection_change(&mut self, dom: &DomTree, tree: &DescTree) -> Option<SelectionRead> {
        let state = self.state();
        if state != SyncState::Observing || !dom.has_focus() {
            trace!("selection change ignored in {state:?}");
            return None;
        }
        let current = SelectionSnapshot::read(dom);
        if current == self.snapshot {
            return None;
        }
        let (Some(anchor), Some(focus)) = (current.anchor, current.focus) else {
            self.snapshot = current;
            return None;
        };
        let head = match tree.pos_from_dom(dom, focus.node, focus.offset, 1) {
            Ok(pos) => pos,
            Err(err) => {
                trace!("selection outside the document: {err}");
                return None;
            }
        };
        let anchor = if current.anchor == current.focus {
            head
        } else {
            match tree.pos_from_dom(dom, anchor.node, anchor.offset, 1) {
                Ok(pos) => pos,
                Err(err) => {
                    trace!("selection anchor outside the document: {err}");
                    return None;
                }
            }
        };
        self.snapshot = current;
        Some(SelectionRead {
            selection: Selection::text(anchor, head),
            origin: self.origin.take(),
        })
    }

    /// Write a document selection to the native one and start a
    /// suppression window for its echo. Skipped while composing.
    pub fn push(
        &mut self,
        dom: &mut DomTree,
        tree: &DescTree,
        root: DomId,
        selection: &Selection,
        config: &ViewConfig,
        force: bool,
    ) -> Result<bool, DomError> {
        if self.state() == SyncState::ComposingGuard {
            trace!("selection push skipped during composition");
            return Ok(false);
        }
        if selection.visible() {
            dom.remove_class(root, &config.hide_selection_class)?;
        } else {
            dom.add_class(root, &config.hide_selection_class)?;
        }
        let written = tree.set_selection(
            dom,
            selection.anchor(),
            selection.head(),
            &config.browser,
            force,
        )?;
        self.snapshot = SelectionSnapshot::read(dom);
        if written {
            self.suppress();
        }
        Ok(written)
    }

    /// Re-read the native selection without dispatching anything
    pub fn resync(&mut self, dom: &DomTree) {
        self.snapshot = SelectionSnapshot::read(dom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{KeyRegistry, NodeViews, RenderRegistry};
    use crate::view::RenderCtx;
    use editview_model::DecorationSource;
    use editview_model::builders::{basic_schema, doc, hr, pt};
    use pretty_assertions::assert_eq;

    struct Fixture {
        dom: DomTree,
        tree: DescTree,
        clock: ManualClock,
        sync: SelectionSync,
    }

    fn fixture() -> Fixture {
        let d = doc(vec![pt("abc"), hr(), pt("de")]);
        let mut dom = DomTree::new();
        let root = dom.create_element("div");
        let keys = KeyRegistry::new(&d);
        let rules = RenderRegistry::new(&basic_schema(), &NodeViews::new()).unwrap();
        let ctx = RenderCtx {
            keys: &keys,
            rules: &rules,
            composition: None,
        };
        let tree = DescTree::new(&mut dom, root, &d, &DecorationSource::empty(), &ctx).unwrap();
        let clock = ManualClock::new();
        let sync = SelectionSync::new(Duration::from_millis(50), Rc::new(clock.clone()));
        dom.focus();
        Fixture {
            dom,
            tree,
            clock,
            sync,
        }
    }

    fn first_text(f: &Fixture) -> DomId {
        let paragraph = f.dom.child(f.tree.root_dom(), 0).unwrap();
        f.dom.child(paragraph, 0).unwrap()
    }

    #[test]
    fn test_unfocused_changes_are_ignored() {
        let mut f = fixture();
        let text = first_text(&f);
        f.dom.collapse_selection(DomPoint::new(text, 1)).unwrap();

        assert_eq!(f.sync.on_selection_change(&f.dom, &f.tree), None);
        assert_eq!(f.sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_change_resolves_to_document_selection() {
        let mut f = fixture();
        f.sync.focus();
        f.sync.set_origin(SelectionOrigin::Keyboard);
        let text = first_text(&f);
        f.dom.collapse_selection(DomPoint::new(text, 2)).unwrap();

        let read = f.sync.on_selection_change(&f.dom, &f.tree).unwrap();

        assert_eq!(read.selection, Selection::cursor(3));
        assert_eq!(read.origin, Some(SelectionOrigin::Keyboard));
        assert_eq!(f.sync.on_selection_change(&f.dom, &f.tree), None);
    }

    #[test]
    fn test_push_suppresses_its_own_echo_until_window_lapses() {
        let mut f = fixture();
        f.sync.focus();
        let root = f.tree.root_dom();
        let config = ViewConfig::default();

        let written = f
            .sync
            .push(&mut f.dom, &f.tree, root, &Selection::text(1, 3), &config, false)
            .unwrap();
        assert!(written);
        assert!(matches!(f.sync.state(), SyncState::Suppressed { .. }));
        assert_eq!(f.sync.on_selection_change(&f.dom, &f.tree), None);

        f.clock.advance(Duration::from_millis(50));
        assert_eq!(f.sync.state(), SyncState::Observing);
        assert_eq!(f.sync.on_selection_change(&f.dom, &f.tree), None);
    }

    #[test]
    fn test_node_selection_hides_native_caret() {
        let mut f = fixture();
        f.sync.focus();
        let root = f.tree.root_dom();
        let config = ViewConfig::default();

        f.sync
            .push(&mut f.dom, &f.tree, root, &Selection::Node { from: 5, to: 6 }, &config, false)
            .unwrap();
        assert!(f.dom.has_class(root, "ProseMirror-hideselection"));

        f.sync
            .push(&mut f.dom, &f.tree, root, &Selection::cursor(2), &config, false)
            .unwrap();
        assert!(!f.dom.has_class(root, "ProseMirror-hideselection"));
    }

    #[test]
    fn test_composition_guards_selection() {
        let mut f = fixture();
        f.sync.focus();
        f.sync.composition_start();
        let text = first_text(&f);
        f.dom.collapse_selection(DomPoint::new(text, 1)).unwrap();

        assert_eq!(f.sync.on_selection_change(&f.dom, &f.tree), None);
        let root = f.tree.root_dom();
        let pushed = f
            .sync
            .push(&mut f.dom, &f.tree, root, &Selection::cursor(4), &ViewConfig::default(), false)
            .unwrap();
        assert!(!pushed);

        f.sync.blur();
        assert_eq!(f.sync.state(), SyncState::ComposingGuard);
        f.sync.composition_end();
        assert!(matches!(f.sync.state(), SyncState::Suppressed { .. }));
    }
}
