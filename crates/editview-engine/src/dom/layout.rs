use serde::Serialize;

use super::selection::DomPoint;
use super::tree::{DomId, DomNodeKind, DomTree};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn caret(x: f64, top: f64, height: f64) -> Self {
        Self {
            left: x,
            top,
            right: x,
            bottom: top + height,
        }
    }
}

/// Geometry of the rendered surface, the part of the browser the view asks
/// for coordinates.
pub trait Layout: std::fmt::Debug {
    /// Caret rectangle for a DOM point under `root`
    fn caret_rect(&self, dom: &DomTree, root: DomId, point: DomPoint) -> Option<Rect>;

    /// Closest DOM point under `root` to the coordinates
    fn hit_test(&self, dom: &DomTree, root: DomId, x: f64, y: f64) -> Option<DomPoint>;
}

const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "ul", "ol", "pre",
];

/// Monospace layout: every char and inline leaf is one cell wide, blocks
/// and `<br>` start a new line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 16.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Stop {
    point: DomPoint,
    line: usize,
    col: usize,
}

#[derive(Default)]
struct Cursor {
    line: usize,
    col: usize,
    line_used: bool,
    /// A block ended; the next content starts a new line
    pending_break: bool,
}

impl Cursor {
    fn break_line(&mut self) {
        self.pending_break = false;
        if self.line_used {
            self.line += 1;
            self.col = 0;
            self.line_used = false;
        }
    }

    fn settle(&mut self) {
        if self.pending_break {
            self.break_line();
        }
    }
}

impl GridLayout {
    pub fn new(char_width: f64, line_height: f64) -> Self {
        Self {
            char_width,
            line_height,
        }
    }

    fn stops(&self, dom: &DomTree, root: DomId) -> Vec<Stop> {
        let mut stops = Vec::new();
        let mut cursor = Cursor::default();
        collect(dom, root, &mut cursor, &mut stops);
        stops
    }

    fn rect(&self, stop: &Stop) -> Rect {
        Rect::caret(
            stop.col as f64 * self.char_width,
            stop.line as f64 * self.line_height,
            self.line_height,
        )
    }
}

fn collect(dom: &DomTree, id: DomId, cursor: &mut Cursor, stops: &mut Vec<Stop>) {
    match dom.kind(id) {
        Some(DomNodeKind::Text(text)) => {
            let len = text.chars().count();
            if len > 0 {
                cursor.settle();
            }
            for offset in 0..=len {
                stops.push(Stop {
                    point: DomPoint::new(id, offset),
                    line: cursor.line,
                    col: cursor.col + offset,
                });
            }
            cursor.col += len;
            cursor.line_used |= len > 0;
        }
        Some(DomNodeKind::Element { tag, .. }) => {
            let block = BLOCK_TAGS.contains(&tag.as_str());
            if block {
                cursor.break_line();
            }
            cursor.settle();
            match tag.as_str() {
                "br" | "hr" => {
                    cursor.line_used = true;
                    cursor.pending_break = true;
                    return;
                }
                "img" | "input" => {
                    cursor.col += 1;
                    cursor.line_used = true;
                    return;
                }
                _ => {}
            }
            let children = dom.children(id);
            for (index, child) in children.iter().enumerate() {
                stops.push(Stop {
                    point: DomPoint::new(id, index),
                    line: cursor.line,
                    col: cursor.col,
                });
                collect(dom, *child, cursor, stops);
            }
            stops.push(Stop {
                point: DomPoint::new(id, children.len()),
                line: cursor.line,
                col: cursor.col,
            });
            if block {
                cursor.line_used = true;
                cursor.pending_break = true;
            }
        }
        None => {}
    }
}

impl Layout for GridLayout {
    fn caret_rect(&self, dom: &DomTree, root: DomId, point: DomPoint) -> Option<Rect> {
        self.stops(dom, root)
            .iter()
            .find(|stop| stop.point == point)
            .map(|stop| self.rect(stop))
    }

    fn hit_test(&self, dom: &DomTree, root: DomId, x: f64, y: f64) -> Option<DomPoint> {
        let stops = self.stops(dom, root);
        let target_line = (y.max(0.0) / self.line_height).floor() as usize;
        let line = stops
            .iter()
            .map(|stop| stop.line)
            .min_by_key(|line| line.abs_diff(target_line))?;
        let col = (x.max(0.0) / self.char_width).round() as usize;
        // Text stops win ties, they are where a browser would put the caret.
        stops
            .iter()
            .filter(|stop| stop.line == line)
            .min_by_key(|stop| (stop.col.abs_diff(col), !dom.is_text(stop.point.node)))
            .map(|stop| stop.point)
    }
}
