use editview_model::Mark;

use super::projector::Projected;

/// Inline content nested into mark wrappers.
#[derive(Debug, Clone, PartialEq)]
pub enum Group<T> {
    Item(T),
    Mark { mark: Mark, children: Vec<Group<T>> },
}

/// Partition `items` into maximal runs sharing their first mark, wrap each
/// run, and recurse on the remaining marks.
pub fn group<T>(items: Vec<(Vec<Mark>, T)>) -> Vec<Group<T>> {
    let mut out: Vec<Group<T>> = Vec::new();
    let mut run: Option<(Mark, Vec<(Vec<Mark>, T)>)> = None;

    for (mut marks, item) in items {
        if marks.is_empty() {
            flush(&mut run, &mut out);
            out.push(Group::Item(item));
            continue;
        }
        let leading = marks.remove(0);
        match &mut run {
            Some((mark, members)) if *mark == leading => members.push((marks, item)),
            _ => {
                flush(&mut run, &mut out);
                run = Some((leading, vec![(marks, item)]));
            }
        }
    }
    flush(&mut run, &mut out);
    out
}

fn flush<T>(run: &mut Option<(Mark, Vec<(Vec<Mark>, T)>)>, out: &mut Vec<Group<T>>) {
    if let Some((mark, members)) = run.take() {
        out.push(Group::Mark {
            mark,
            children: group(members),
        });
    }
}

/// Inverse of [`group`]: every item with its full mark list.
pub fn flatten<T>(groups: Vec<Group<T>>) -> Vec<(Vec<Mark>, T)> {
    let mut out = Vec::new();
    flatten_into(groups, &[], &mut out);
    out
}

fn flatten_into<T>(groups: Vec<Group<T>>, outer: &[Mark], out: &mut Vec<(Vec<Mark>, T)>) {
    for group in groups {
        match group {
            Group::Item(item) => out.push((outer.to_vec(), item)),
            Group::Mark { mark, children } => {
                let mut marks = outer.to_vec();
                marks.push(mark);
                flatten_into(children, &marks, out);
            }
        }
    }
}

/// Marks to render each projected item inside.
///
/// Nodes use their own marks and widgets with explicit marks keep them.
/// Other widgets pick marks up from the nearest inline node at the same
/// position, looking past neighbouring widgets:
/// - a widget with a negative side takes the marks of the node before it
///   (spread forward from that node);
/// - a widget with a non-negative side takes the marks of the node after
///   it (spread backward from that node).
pub fn resolve_marks(projected: &[Projected]) -> Vec<Vec<Mark>> {
    let node_marks = |item: &Projected| -> Option<Vec<Mark>> {
        item.segment()
            .filter(|segment| segment.node.is_inline())
            .map(|segment| segment.node.marks().to_vec())
    };

    projected
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Projected::Node(segment) => segment.node.marks().to_vec(),
            Projected::Widget { deco, offset, .. } => {
                let Some(widget) = deco.widget_spec() else {
                    return Vec::new();
                };
                if let Some(marks) = &widget.marks {
                    return marks.clone();
                }
                let inherited = if widget.side < 0 {
                    projected[..i]
                        .iter()
                        .rev()
                        .find(|other| !matches!(other, Projected::Widget { .. }))
                        .filter(|other| {
                            other
                                .segment()
                                .is_some_and(|s| s.offset + s.node.node_size() == *offset)
                        })
                        .and_then(node_marks)
                } else {
                    projected[i + 1..]
                        .iter()
                        .find(|other| !matches!(other, Projected::Widget { .. }))
                        .filter(|other| other.offset() == *offset)
                        .and_then(node_marks)
                };
                inherited.unwrap_or_default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::projector::project;
    use editview_model::builders::{code_mark, doc, em, em_mark, p, strong, strong_mark, txt};
    use editview_model::{Decoration, DecorationSet, Node, Widget, WidgetContent};
    use pretty_assertions::assert_eq;

    fn shape(groups: &[Group<&str>]) -> String {
        groups
            .iter()
            .map(|group| match group {
                Group::Item(item) => item.to_string(),
                Group::Mark { mark, children } => {
                    format!("{}({})", mark.type_name(), shape(children))
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_runs_share_leading_mark() {
        let groups = group(vec![
            (vec![em_mark()], "a"),
            (vec![em_mark(), strong_mark()], "b"),
            (vec![em_mark()], "c"),
            (vec![], "d"),
            (vec![strong_mark()], "e"),
        ]);
        assert_eq!(shape(&groups), "em(a strong(b) c) d strong(e)");
    }

    #[test]
    fn test_regrouping_flattened_output_is_noop() {
        let items = vec![
            (vec![em_mark(), strong_mark()], "a"),
            (vec![em_mark(), strong_mark(), code_mark()], "b"),
            (vec![strong_mark()], "c"),
            (vec![strong_mark(), code_mark()], "d"),
        ];
        let once = group(items.clone());
        let flat = flatten(once.clone());
        assert_eq!(flat, items);

        let twice = group(flat);
        assert_eq!(twice, once);
    }

    fn block_projection(d: &Node, decos: Vec<Decoration>) -> Vec<Projected> {
        let source = DecorationSet::create(decos).source();
        let block = d.child(0);
        project(block, &source.for_child(0, block))
    }

    fn widget(pos: usize, side: i32) -> Decoration {
        Decoration::widget(pos, Widget::new(WidgetContent::element("span")).side(side))
    }

    #[test]
    fn test_negative_widget_takes_marks_of_node_before() {
        // p(em("ab"), "cd"): em text 1..3, plain 3..5
        let d = doc(vec![p(vec![em(txt("ab")), txt("cd")])]);
        let projected = block_projection(&d, vec![widget(3, -1)]);

        let marks = resolve_marks(&projected);
        assert_eq!(marks[1], vec![em_mark()]);
    }

    #[test]
    fn test_positive_widget_takes_marks_of_node_after() {
        let d = doc(vec![p(vec![txt("ab"), strong(txt("cd"))])]);
        let projected = block_projection(&d, vec![widget(3, 0)]);

        let marks = resolve_marks(&projected);
        assert_eq!(marks[1], vec![strong_mark()]);
    }

    #[test]
    fn test_directions_are_independent() {
        // A positive widget after marked text does not take its marks.
        let d = doc(vec![p(vec![em(txt("ab")), txt("cd")])]);
        let projected = block_projection(&d, vec![widget(3, 1)]);
        assert_eq!(resolve_marks(&projected)[1], Vec::<Mark>::new());

        // A negative widget before marked text does not either.
        let d = doc(vec![p(vec![txt("ab"), strong(txt("cd"))])]);
        let projected = block_projection(&d, vec![widget(3, -1)]);
        assert_eq!(resolve_marks(&projected)[1], Vec::<Mark>::new());
    }

    #[test]
    fn test_explicit_widget_marks_win() {
        let d = doc(vec![p(vec![em(txt("ab")), txt("cd")])]);
        let deco = Decoration::widget(
            3,
            Widget::new(WidgetContent::element("span"))
                .side(-1)
                .marks(vec![strong_mark()]),
        );
        let projected = block_projection(&d, vec![deco]);
        assert_eq!(resolve_marks(&projected)[1], vec![strong_mark()]);
    }
}
