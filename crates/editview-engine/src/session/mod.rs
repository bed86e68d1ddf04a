//! Editor session: owns one document state and runs every commit in a
//! fixed order, key derivation first and side effects last.

pub mod effects;

use std::rc::Rc;

use editview_config::ViewConfig;
use editview_model::{
    Assoc, DecorationSet, DecorationSource, EditorState, Node, SelectionOrigin, Transaction,
};
use log::{debug, trace, warn};
use uuid::Uuid;

pub use effects::{CommitPhase, PluginView, ScrollRequest};

use crate::dom::{DomId, DomPoint, DomTree, GridLayout, Layout, MutationRecord, Rect};
use crate::error::ViewError;
use crate::input::{CompositionState, InputIntent, intent_transaction};
use crate::render::{KeyRegistry, NodeViews, RenderRegistry};
use crate::sync::{Clock, SelectionSync, SyncState, SystemClock};
use crate::view::{CompositionGuard, DescId, DescTree, RenderCtx};

/// What the host hands the view on every render.
#[derive(Debug, Clone)]
pub struct ViewProps {
    pub state: EditorState,
    pub node_views: NodeViews,
    /// Decorations drawn on top of the state's own
    pub decorations: DecorationSet,
    /// Dispatched transactions are handed to the owner instead of applied
    pub controlled: bool,
}

impl ViewProps {
    pub fn new(state: EditorState) -> Self {
        Self {
            state,
            node_views: NodeViews::new(),
            decorations: DecorationSet::empty(),
            controlled: false,
        }
    }

    pub fn with_node_views(mut self, node_views: NodeViews) -> Self {
        self.node_views = node_views;
        self
    }

    pub fn with_decorations(mut self, decorations: DecorationSet) -> Self {
        self.decorations = decorations;
        self
    }

    pub fn controlled(mut self) -> Self {
        self.controlled = true;
        self
    }

    fn decoration_source(&self) -> DecorationSource {
        DecorationSource::from_sets(&[&self.state.decorations, &self.decorations])
    }
}

/// The part of a session that is thrown away when it cannot be reconciled.
struct Mounted {
    root: DomId,
    keys: KeyRegistry,
    rules: RenderRegistry,
    tree: DescTree,
}

fn mount(dom: &mut DomTree, config: &ViewConfig, props: &ViewProps) -> Result<Mounted, ViewError> {
    let root = dom.create_element("div");
    dom.add_class(root, &config.root_class)?;
    dom.set_attr(root, "contenteditable", if config.editable { "true" } else { "false" })?;
    dom.set_attr(root, "translate", "no")?;
    let keys = KeyRegistry::new(&props.state.doc);
    let rules = RenderRegistry::new(&props.state.schema, &props.node_views)?;
    let ctx = RenderCtx {
        keys: &keys,
        rules: &rules,
        composition: None,
    };
    let tree = DescTree::new(dom, root, &props.state.doc, &props.decoration_source(), &ctx)?;
    dom.observe(root);
    Ok(Mounted {
        root,
        keys,
        rules,
        tree,
    })
}

/// Common prefix and suffix of two texts, as `(start, old_end, inserted)`
fn text_diff(old: &str, new: &str) -> Option<(usize, usize, String)> {
    if old == new {
        return None;
    }
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();
    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    let inserted = new[prefix..new.len() - suffix].iter().collect();
    Some((prefix, old.len() - suffix, inserted))
}

/// One editor bound to one editable surface.
#[derive(Debug)]
pub struct EditorView {
    id: Uuid,
    config: ViewConfig,
    props: ViewProps,
    dom: DomTree,
    root: DomId,
    keys: KeyRegistry,
    rules: RenderRegistry,
    tree: DescTree,
    sync: SelectionSync,
    composition: CompositionState,
    plugins: Vec<Box<dyn PluginView>>,
    layout: Box<dyn Layout>,
    /// Handed to the owner, not yet taken
    outbox: Vec<Transaction>,
    /// Handed to the owner, not yet seen back in a state update
    in_flight: Vec<Transaction>,
    commit_log: Vec<CommitPhase>,
    scroll_requests: Vec<ScrollRequest>,
    minted: Vec<usize>,
}

impl EditorView {
    pub fn new(config: ViewConfig, props: ViewProps) -> Result<Self, ViewError> {
        Self::with_clock(config, props, Rc::new(SystemClock::new()))
    }

    pub fn with_clock(
        config: ViewConfig,
        props: ViewProps,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, ViewError> {
        let mut dom = DomTree::new();
        dom.selection_mut().set_supports_extend(config.browser.selection_extend);
        let Mounted {
            root,
            keys,
            rules,
            tree,
        } = mount(&mut dom, &config, &props)?;
        let sync = SelectionSync::new(config.suppression_window(), clock);
        let id = Uuid::new_v4();
        debug!("editor session {id} mounted, {} keyed nodes", keys.len());
        Ok(Self {
            id,
            config,
            props,
            dom,
            root,
            keys,
            rules,
            tree,
            sync,
            composition: CompositionState::Idle,
            plugins: Vec::new(),
            layout: Box::new(GridLayout::default()),
            outbox: Vec::new(),
            in_flight: Vec::new(),
            commit_log: Vec::new(),
            scroll_requests: Vec::new(),
            minted: Vec::new(),
        })
    }

    pub fn with_layout(mut self, layout: Box<dyn Layout>) -> Self {
        self.layout = layout;
        self
    }

    pub fn add_plugin_view(&mut self, view: Box<dyn PluginView>) {
        self.plugins.push(view);
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &EditorState {
        &self.props.state
    }

    pub fn props(&self) -> &ViewProps {
        &self.props
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn dom(&self) -> &DomTree {
        &self.dom
    }

    /// The surface as the browser and user see it. Changes made here reach
    /// the view through the event handlers and [`EditorView::flush_dom_observer`].
    pub fn dom_mut(&mut self) -> &mut DomTree {
        &mut self.dom
    }

    pub fn root(&self) -> DomId {
        self.root
    }

    pub fn tree(&self) -> &DescTree {
        &self.tree
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    pub fn composition(&self) -> &CompositionState {
        &self.composition
    }

    pub fn sync_state(&mut self) -> SyncState {
        self.sync.state()
    }

    /// Phases of the last commit
    pub fn commit_log(&self) -> &[CommitPhase] {
        &self.commit_log
    }

    /// Positions that got a fresh key in the last key derivation
    pub fn last_minted(&self) -> &[usize] {
        &self.minted
    }

    pub fn take_dispatched(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_scroll_requests(&mut self) -> Vec<ScrollRequest> {
        std::mem::take(&mut self.scroll_requests)
    }

    pub fn pos_at_dom(&self, node: DomId, offset: usize, bias: i32) -> Result<usize, ViewError> {
        self.tree.pos_from_dom(&self.dom, node, offset, bias)
    }

    pub fn dom_at_pos(&self, pos: usize, side: i32) -> Result<DomPoint, ViewError> {
        self.tree.dom_from_pos(&self.dom, pos, side)
    }

    /// DOM node rendering the document node that starts at `pos`
    pub fn node_dom(&self, pos: usize) -> Option<DomId> {
        self.tree.node_dom_at(pos)
    }

    pub fn coords_at_pos(&self, pos: usize, side: i32) -> Result<Option<Rect>, ViewError> {
        let point = self.dom_at_pos(pos, side)?;
        Ok(self.layout.caret_rect(&self.dom, self.root, point))
    }

    pub fn pos_at_coords(&self, x: f64, y: f64) -> Result<Option<usize>, ViewError> {
        match self.layout.hit_test(&self.dom, self.root, x, y) {
            Some(point) => self.pos_at_dom(point.node, point.offset, 1).map(Some),
            None => Ok(None),
        }
    }

    /// Hand a transaction to the owner, or apply it when uncontrolled.
    pub fn dispatch(&mut self, tr: Transaction) -> Result<(), ViewError> {
        if self.props.controlled {
            trace!("transaction handed to owner");
            self.in_flight.push(tr.clone());
            self.outbox.push(tr);
            return Ok(());
        }
        let state = self.props.state.apply(&tr);
        let prev = std::mem::replace(&mut self.props.state, state);
        self.commit(prev, &[tr], false)
    }

    pub fn update_state(&mut self, state: EditorState) -> Result<(), ViewError> {
        let mut props = self.props.clone();
        props.state = state;
        self.update(props)
    }

    /// Render new props. A changed set of node view overrides cannot be
    /// reconciled in place and replaces the whole session.
    pub fn update(&mut self, props: ViewProps) -> Result<(), ViewError> {
        if !props.node_views.same_as(&self.props.node_views) {
            return self.rebuild(props);
        }
        let applied = self.take_applied(&props.state.doc);
        let prev = std::mem::replace(&mut self.props, props);
        self.commit(prev.state, &applied, false)
    }

    pub fn set_editable(&mut self, editable: bool) -> Result<(), ViewError> {
        if self.config.editable == editable {
            return Ok(());
        }
        self.config.editable = editable;
        self.dom
            .set_attr(self.root, "contenteditable", if editable { "true" } else { "false" })?;
        debug!("session {} editable: {editable}", self.id);
        Ok(())
    }

    /// Tear the session down, letting plugin views clean up
    pub fn destroy(mut self) {
        for plugin in &mut self.plugins {
            plugin.destroy();
        }
        self.dom.set_observing(false);
        debug!("editor session {} destroyed", self.id);
    }

    /// Owner-applied transactions that led to `doc`, oldest first
    fn take_applied(&mut self, doc: &Node) -> Vec<Transaction> {
        match self.in_flight.iter().position(|tr| tr.doc().ptr_eq(doc)) {
            Some(index) => self.in_flight.drain(..=index).collect(),
            None => {
                self.in_flight.clear();
                Vec::new()
            }
        }
    }

    fn rebuild(&mut self, props: ViewProps) -> Result<(), ViewError> {
        let mounted = mount(&mut self.dom, &self.config, &props)?;
        let old_root = std::mem::replace(&mut self.root, mounted.root);
        self.dom.set_observing(false);
        self.dom.remove_children(old_root)?;
        self.dom.observe(self.root);
        self.keys = mounted.keys;
        self.rules = mounted.rules;
        self.tree = mounted.tree;
        self.composition = CompositionState::Idle;
        self.in_flight.clear();
        let old = std::mem::replace(&mut self.id, Uuid::new_v4());
        debug!("node views changed, session {old} replaced by {}", self.id);
        let prev = std::mem::replace(&mut self.props, props);
        self.commit(prev.state, &[], true)
    }

    fn composition_guard(&self) -> Option<CompositionGuard> {
        if !self.composition.is_composing() {
            return None;
        }
        Some(CompositionGuard {
            text_dom: self.composition.anchor()?,
            pos: self.composition.start_pos()?,
        })
    }

    fn commit(
        &mut self,
        prev: EditorState,
        applied: &[Transaction],
        force_push: bool,
    ) -> Result<(), ViewError> {
        self.commit_log.clear();
        self.dom.set_observing(false);
        let result = self
            .render(&prev, applied)
            .and_then(|()| self.post_commit(&prev, applied, force_push));
        self.dom.set_observing(true);
        self.commit_log.push(CommitPhase::ObserverRearm);
        trace!("commit phases {:?}", self.commit_log);
        result
    }

    fn render(&mut self, prev: &EditorState, applied: &[Transaction]) -> Result<(), ViewError> {
        let doc = &self.props.state.doc;
        self.minted.clear();
        if !applied.is_empty() {
            for tr in applied {
                let minted = self.keys.apply(tr);
                self.minted.extend(minted);
                if self.composition.is_composing() {
                    self.composition.map(tr.mapping());
                }
            }
        } else if !prev.doc.ptr_eq(doc) && prev.doc != *doc {
            debug!("document replaced without a transaction, keys reset");
            self.keys.reset(doc);
        }
        self.commit_log.push(CommitPhase::KeyDerivation);

        let source = self.props.decoration_source();
        self.commit_log.push(CommitPhase::DecorationProjection);

        let ctx = RenderCtx {
            keys: &self.keys,
            rules: &self.rules,
            composition: self.composition_guard(),
        };
        let changed = self.tree.update(&mut self.dom, &ctx, doc, &source)?;
        self.commit_log.push(CommitPhase::TreeReconciliation);
        trace!("descriptor tree {}", if changed { "updated" } else { "unchanged" });
        Ok(())
    }

    fn post_commit(
        &mut self,
        prev: &EditorState,
        applied: &[Transaction],
        force_push: bool,
    ) -> Result<(), ViewError> {
        let state = &self.props.state;
        let moved = prev.selection != state.selection || !prev.doc.ptr_eq(&state.doc);
        if (moved || force_push) && self.dom.has_focus() {
            self.sync.push(
                &mut self.dom,
                &self.tree,
                self.root,
                &state.selection,
                &self.config,
                force_push,
            )?;
        }
        self.commit_log.push(CommitPhase::SelectionPush);

        let keyboard_scroll = applied.iter().any(|tr| {
            tr.meta.scroll_into_view && tr.meta.origin == Some(SelectionOrigin::Keyboard)
        });
        if keyboard_scroll {
            let head = state.selection.head();
            let rect = self.coords_at_pos(head, 1).unwrap_or_else(|err| {
                trace!("no caret rect for scroll: {err}");
                None
            });
            self.scroll_requests.push(ScrollRequest {
                pos: head,
                rect,
                margin: self.config.scroll_margin,
            });
        }

        for plugin in &mut self.plugins {
            plugin.update(&self.props.state, prev);
        }
        self.commit_log.push(CommitPhase::PluginViews);
        Ok(())
    }

    /// Re-derive whatever is marked dirty and put the selection back
    fn rerender(&mut self) -> Result<(), ViewError> {
        let prev = self.props.state.clone();
        self.commit(prev, &[], true)
    }

    pub fn focus(&mut self) {
        self.dom.focus();
        self.sync.focus();
    }

    pub fn blur(&mut self) {
        self.dom.blur();
        self.sync.blur();
    }

    pub fn pointer_down(&mut self) {
        self.sync.set_origin(SelectionOrigin::Pointer);
    }

    pub fn key_down(&mut self) {
        self.sync.set_origin(SelectionOrigin::Keyboard);
    }

    /// Handle a `beforeinput` event. Returns whether the browser's default
    /// action must be prevented.
    pub fn before_input(
        &mut self,
        input_type: &str,
        data: Option<&str>,
        target: Option<(usize, usize)>,
    ) -> Result<bool, ViewError> {
        match InputIntent::from_input_type(input_type, data, target) {
            Some(intent) => self.handle_intent(&intent),
            None => Ok(false),
        }
    }

    pub fn handle_intent(&mut self, intent: &InputIntent) -> Result<bool, ViewError> {
        if !self.config.editable {
            trace!("{intent:?} ignored, view is not editable");
            return Ok(false);
        }
        if self.composition.is_composing() {
            trace!("{intent:?} left to the input method");
            return Ok(false);
        }
        if let Some(tr) = intent_transaction(&self.props.state, intent)? {
            self.dispatch(tr)?;
        }
        Ok(true)
    }

    pub fn composition_start(&mut self) {
        if !self.config.editable {
            return;
        }
        let selection = self.props.state.selection;
        if self.composition.start(selection.from(), selection.to()) {
            self.keys.freeze();
            self.sync.composition_start();
        }
    }

    pub fn composition_update(&mut self, data: &str) {
        let anchor = self
            .dom
            .selection()
            .focus()
            .map(|point| point.node)
            .filter(|node| self.dom.is_text(*node));
        self.composition.update(data, anchor);
    }

    /// Finish an input method session. The composed text becomes one
    /// transaction; a session without text just gets its block redrawn.
    pub fn composition_end(&mut self, data: Option<&str>) -> Result<(), ViewError> {
        if !self.composition.is_composing() {
            return Ok(());
        }
        let start = self.composition.start_pos();
        self.composition.end(data);
        let authored = self.dom.take_records();
        trace!("dropped {} mutation records from the input method", authored.len());
        self.sync.composition_end();
        let tr = self.composition.flush(&self.props.state)?;
        let thawed = self.keys.thaw(&self.props.state.doc);
        if !thawed.is_empty() {
            debug!("{} keys minted after composition", thawed.len());
        }
        match (tr, start) {
            (Some(tr), _) => self.dispatch(tr),
            (None, Some(start)) => self.redraw_block(start),
            (None, None) => Ok(()),
        }
    }

    fn redraw_block(&mut self, pos: usize) -> Result<(), ViewError> {
        let resolved = self.props.state.doc.resolve(pos)?;
        let (from, to) = match resolved.textblock_depth().filter(|depth| *depth > 0) {
            Some(depth) => (resolved.before(depth), resolved.after(depth)),
            None => (pos, pos),
        };
        self.tree.mark_dirty(&self.dom, from, to);
        self.rerender()
    }

    /// Handle a `selectionchange`. Returns whether a transaction was
    /// dispatched.
    pub fn selection_change(&mut self) -> Result<bool, ViewError> {
        if !self.dom.selection_mut().take_change() {
            return Ok(false);
        }
        let Some(read) = self.sync.on_selection_change(&self.dom, &self.tree) else {
            return Ok(false);
        };
        if read.selection == self.props.state.selection {
            return Ok(false);
        }
        let mut tr = self.props.state.tr();
        tr.set_selection(read.selection);
        if let Some(origin) = read.origin {
            tr.set_origin(origin);
            if origin == SelectionOrigin::Keyboard {
                tr.scroll_into_view();
            }
        }
        self.dispatch(tr)?;
        Ok(true)
    }

    /// Deliver queued mutation records, as a `MutationObserver` callback
    /// would after a microtask. Text the browser edited becomes a
    /// transaction; structural changes are undone by re-deriving the
    /// affected descriptors.
    pub fn flush_dom_observer(&mut self) -> Result<(), ViewError> {
        if self.composition.is_composing() {
            return Ok(());
        }
        let records = self.dom.take_records();
        if records.is_empty() {
            return Ok(());
        }
        let mut edited: Vec<DomId> = Vec::new();
        let mut structural = false;
        for record in &records {
            match record {
                MutationRecord::CharacterData { target, .. } => {
                    if !edited.contains(target) {
                        edited.push(*target);
                    }
                }
                MutationRecord::ChildList { target, .. } => {
                    match self.tree.nearest_desc(&self.dom, *target) {
                        Some(id) => {
                            let pos = self.tree.pos_at_start(id);
                            self.tree.mark_dirty(&self.dom, pos, pos);
                            structural = true;
                        }
                        None => warn!("child list change outside the document at {target:?}"),
                    }
                }
                MutationRecord::Attributes { target, name } => {
                    trace!("attribute {name} changed on {target:?}, ignored");
                }
            }
        }

        let mut tr = self.props.state.tr();
        for target in edited {
            let Some(id) = self.text_desc(target) else {
                continue;
            };
            let old = self.tree.desc(id).node().and_then(Node::text).unwrap_or_default();
            let new = self.dom.text(target).unwrap_or_default();
            let Some((start, end, inserted)) = text_diff(old, new) else {
                continue;
            };
            let base = self.tree.pos_before(id);
            let from = tr.mapping().map(base + start, Assoc::Left);
            let to = tr.mapping().map(base + end, Assoc::Right);
            if inserted.is_empty() {
                tr.delete(from, to)?;
            } else {
                tr.insert_text(&inserted, from, to)?;
            }
        }

        let mut redrawn = false;
        if tr.doc_changed() {
            debug!("browser edited text, {} steps read back", tr.steps().len());
            tr.meta.from_dom = true;
            redrawn = !self.props.controlled;
            self.dispatch(tr)?;
        }
        if structural && !redrawn {
            self.rerender()?;
        }
        Ok(())
    }

    fn text_desc(&self, text_dom: DomId) -> Option<DescId> {
        self.tree
            .live()
            .find(|(_, desc)| desc.is_text() && desc.node_dom == text_dom)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ManualClock;
    use editview_model::builders::{basic_schema, doc, p, pt, txt};
    use editview_model::{DecoAttrs, Decoration, Selection};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn view(d: Node, selection: Selection) -> EditorView {
        init_logging();
        let state = EditorState::create(basic_schema(), d).with_selection(selection);
        EditorView::with_clock(
            ViewConfig::default(),
            ViewProps::new(state),
            Rc::new(ManualClock::new()),
        )
        .unwrap()
    }

    fn html(view: &EditorView) -> String {
        view.dom().inner_html(view.root())
    }

    fn text_dom(view: &EditorView, pos: usize) -> DomId {
        view.dom_at_pos(pos, 1).unwrap().node
    }

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl PluginView for Recorder {
        fn update(&mut self, state: &EditorState, prev: &EditorState) {
            self.seen
                .borrow_mut()
                .push(format!("{} -> {}", prev.doc.text_content(), state.doc.text_content()));
        }
    }

    #[test]
    fn test_mount_renders_root() {
        let v = view(doc(vec![pt("hi")]), Selection::cursor(1));
        assert_eq!(v.dom().attr(v.root(), "contenteditable"), Some("true"));
        assert!(v.dom().has_class(v.root(), "ProseMirror"));
        assert_eq!(html(&v), "<p>hi</p>");
    }

    #[test]
    fn test_commit_runs_phases_in_order() {
        let mut v = view(doc(vec![pt("hi")]), Selection::cursor(1));
        let mut tr = v.state().tr();
        tr.insert_text("!", 3, 3).unwrap();
        v.dispatch(tr).unwrap();

        assert_eq!(
            v.commit_log(),
            &[
                CommitPhase::KeyDerivation,
                CommitPhase::DecorationProjection,
                CommitPhase::TreeReconciliation,
                CommitPhase::SelectionPush,
                CommitPhase::PluginViews,
                CommitPhase::ObserverRearm,
            ]
        );
        assert_eq!(html(&v), "<p>hi!</p>");
        assert!(!v.dom().has_records());
        assert!(v.dom().is_observing());
    }

    #[test]
    fn test_controlled_view_waits_for_owner() {
        init_logging();
        let state = EditorState::create(basic_schema(), doc(vec![pt("one"), pt("two")]));
        let mut v = EditorView::with_clock(
            ViewConfig::default(),
            ViewProps::new(state.clone()).controlled(),
            Rc::new(ManualClock::new()),
        )
        .unwrap();
        let key = v.keys().key_at(5);

        let mut tr = v.state().tr();
        tr.insert_text("x", 6, 6).unwrap();
        v.dispatch(tr).unwrap();
        assert_eq!(html(&v), "<p>one</p><p>two</p>");

        let dispatched = v.take_dispatched();
        assert_eq!(dispatched.len(), 1);
        let next = state.apply(&dispatched[0]);
        v.update_state(next).unwrap();

        assert_eq!(html(&v), "<p>one</p><p>xtwo</p>");
        assert_eq!(v.keys().key_at(5), key);
        assert!(v.last_minted().is_empty());
    }

    #[test]
    fn test_replaced_document_resets_keys() {
        let mut v = view(doc(vec![pt("one")]), Selection::cursor(1));
        let key = v.keys().key_at(0);
        let next = EditorState::create(basic_schema(), doc(vec![pt("other")]));

        v.update_state(next).unwrap();

        assert_ne!(v.keys().key_at(0), key);
        assert_eq!(html(&v), "<p>other</p>");
    }

    #[test]
    fn test_new_node_views_replace_the_session() {
        #[derive(Debug)]
        struct Rule;
        impl crate::render::NodeViewOverride for Rule {
            fn render(&self, _node: &Node) -> editview_model::DomOutput {
                editview_model::DomOutput::leaf("hr").with_attr("class", "rule")
            }
        }

        let mut v = view(doc(vec![pt("a"), editview_model::builders::hr()]), Selection::cursor(1));
        let id = v.session_id();
        let old_root = v.root();
        let props = v
            .props()
            .clone()
            .with_node_views(NodeViews::new().with("horizontal_rule", std::sync::Arc::new(Rule)));

        v.update(props).unwrap();

        assert_ne!(v.session_id(), id);
        assert_ne!(v.root(), old_root);
        assert_eq!(html(&v), "<p>a</p><hr class=\"rule\" contenteditable=\"false\">");
        assert!(v.dom().children(old_root).is_empty());
    }

    #[test]
    fn test_plugin_views_see_every_commit() {
        let mut v = view(doc(vec![pt("a")]), Selection::cursor(2));
        let seen = Rc::new(RefCell::new(Vec::new()));
        v.add_plugin_view(Box::new(Recorder { seen: seen.clone() }));

        v.handle_intent(&InputIntent::InsertText("b".to_string())).unwrap();

        assert_eq!(*seen.borrow(), vec!["a -> ab".to_string()]);
    }

    #[test]
    fn test_not_editable_ignores_intents() {
        let mut v = view(doc(vec![pt("a")]), Selection::cursor(2));
        v.set_editable(false).unwrap();

        let handled = v.before_input("insertText", Some("b"), None).unwrap();

        assert!(!handled);
        assert_eq!(v.dom().attr(v.root(), "contenteditable"), Some("false"));
        assert_eq!(v.state().doc, doc(vec![pt("a")]));
    }

    #[test]
    fn test_keyboard_selection_requests_scroll_pointer_does_not() {
        let mut v = view(doc(vec![pt("abc")]), Selection::cursor(1));
        v.focus();
        let text = text_dom(&v, 1);

        v.pointer_down();
        v.dom_mut().collapse_selection(DomPoint::new(text, 2)).unwrap();
        assert!(v.selection_change().unwrap());
        assert_eq!(v.state().selection, Selection::cursor(3));
        assert!(v.take_scroll_requests().is_empty());

        v.key_down();
        v.dom_mut().collapse_selection(DomPoint::new(text, 1)).unwrap();
        assert!(v.selection_change().unwrap());
        let requests = v.take_scroll_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].pos, 2);
        assert_eq!(requests[0].margin, 5.0);
    }

    #[test]
    fn test_pushed_selection_does_not_echo() {
        let clock = ManualClock::new();
        let state = EditorState::create(basic_schema(), doc(vec![pt("abc")]));
        let mut v = EditorView::with_clock(
            ViewConfig::default(),
            ViewProps::new(state),
            Rc::new(clock.clone()),
        )
        .unwrap();
        v.focus();

        let mut tr = v.state().tr();
        tr.set_selection(Selection::text(1, 3));
        v.dispatch(tr).unwrap();

        assert!(!v.selection_change().unwrap());
        clock.advance(Duration::from_millis(60));
        assert!(!v.selection_change().unwrap());
        assert_eq!(v.state().selection, Selection::text(1, 3));
    }

    #[test]
    fn test_browser_text_edit_is_read_back() {
        let mut v = view(doc(vec![pt("one"), pt("tow")]), Selection::cursor(6));
        let p2 = v.keys().key_at(5);
        let text = text_dom(&v, 6);

        v.dom_mut().delete_text(text, 1, 3).unwrap();
        v.dom_mut().insert_text(text, 1, "wo").unwrap();
        v.flush_dom_observer().unwrap();

        assert_eq!(v.state().doc, doc(vec![pt("one"), pt("two")]));
        assert_eq!(v.keys().key_at(5), p2);
        assert_eq!(html(&v), "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_foreign_dom_nodes_are_removed() {
        let mut v = view(doc(vec![pt("one")]), Selection::cursor(1));
        let paragraph = v.dom().child(v.root(), 0).unwrap();
        let stray = v.dom_mut().create_element("span");
        v.dom_mut().append_child(paragraph, stray).unwrap();

        v.flush_dom_observer().unwrap();

        assert_eq!(html(&v), "<p>one</p>");
        assert_eq!(v.state().doc, doc(vec![pt("one")]));
    }

    #[test]
    fn test_abandoned_composition_restores_block() {
        let mut v = view(doc(vec![pt("foo")]), Selection::cursor(3));
        v.focus();
        let text = text_dom(&v, 3);

        v.composition_start();
        v.dom_mut().type_text(DomPoint::new(text, 2), "x").unwrap();
        v.composition_update("x");
        v.composition_end(Some("")).unwrap();

        assert_eq!(v.state().doc, doc(vec![pt("foo")]));
        assert_eq!(v.composition(), &CompositionState::Idle);
        assert!(!v.keys().is_frozen());
        assert_eq!(html(&v), "<p>foo</p>");
    }

    #[test]
    fn test_intents_wait_for_composition() {
        let mut v = view(doc(vec![pt("foo")]), Selection::cursor(3));
        v.composition_start();
        assert!(!v.handle_intent(&InputIntent::DeleteContentBackward).unwrap());
        assert_eq!(v.state().doc, doc(vec![pt("foo")]));
    }

    #[test]
    fn test_decorations_from_props_are_drawn() {
        let mut v = view(doc(vec![p(vec![txt("abc")])]), Selection::cursor(1));
        let highlight = Decoration::inline(2, 3, DecoAttrs::class("hl"));
        let props = v
            .props()
            .clone()
            .with_decorations(DecorationSet::create(vec![highlight]));

        v.update(props).unwrap();

        assert_eq!(html(&v), "<p>a<span class=\"hl\">b</span>c</p>");
    }

    #[test]
    fn test_coords_round_trip() {
        let v = view(doc(vec![pt("abc"), pt("de")]), Selection::cursor(1));
        let rect = v.coords_at_pos(7, 1).unwrap().unwrap();
        assert_eq!(v.pos_at_coords(rect.left, rect.top + 1.0).unwrap(), Some(7));
    }

    #[rstest::rstest]
    #[case("abc", "abc", None)]
    #[case("abc", "abXc", Some((2, 2, "X")))]
    #[case("abc", "ac", Some((1, 2, "")))]
    #[case("aaa", "aaaa", Some((3, 3, "a")))]
    #[case("tow", "two", Some((1, 3, "wo")))]
    fn test_text_diff(
        #[case] old: &str,
        #[case] new: &str,
        #[case] expected: Option<(usize, usize, &str)>,
    ) {
        let expected = expected.map(|(start, end, text)| (start, end, text.to_string()));
        assert_eq!(text_diff(old, new), expected);
    }
}
