//! Render-phase derivations: node identities, decoration projection, mark
//! grouping and render rules. Nothing in here touches the DOM.

pub mod grouper;
pub mod keys;
pub mod projector;
pub mod rules;

pub use grouper::{Group, flatten, group, resolve_marks};
pub use keys::{KeyRegistry, NodeKey};
pub use projector::{Projected, Segment, project};
pub use rules::{NodeViewOverride, NodeViews, RenderRegistry};
