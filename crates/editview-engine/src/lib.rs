pub mod dom;
pub mod error;
pub mod input;
pub mod render;
pub mod session;
pub mod sync;
pub mod view;

// Re-export key types for easier usage
pub use dom::{DomId, DomPoint, DomTree, GridLayout, Layout, MutationRecord, Rect};
pub use error::{DomError, ViewError};
pub use input::{CompositionState, InputIntent};
pub use render::{KeyRegistry, NodeKey, NodeViewOverride, NodeViews, RenderRegistry};
pub use session::{CommitPhase, EditorView, PluginView, ScrollRequest, ViewProps};
pub use sync::{Clock, ManualClock, SelectionSync, SyncState, SystemClock};
pub use view::{DescId, DescKind, DescSnapshot, DescTree, Dirty};
