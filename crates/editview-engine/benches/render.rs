use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use editview_config::ViewConfig;
use editview_engine::{EditorView, ViewProps};
use editview_model::builders::{basic_schema, doc, em, p, strong, txt};
use editview_model::{DecoAttrs, Decoration, DecorationSet, EditorState, Node, Selection};

fn generate_document(paragraphs: usize) -> Node {
    let children = (0..paragraphs)
        .map(|i| {
            p(vec![
                txt(&format!("Paragraph {i} with ")),
                em(txt("some emphasis")),
                txt(" and "),
                strong(em(txt("nested marks"))),
            ])
        })
        .collect();
    doc(children)
}

fn highlights(doc: &Node) -> DecorationSet {
    let size = doc.content_size();
    let decos = (0..size)
        .step_by(37)
        .map(|from| Decoration::inline(from, (from + 5).min(size), DecoAttrs::class("hl")))
        .collect();
    DecorationSet::create(decos)
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount");
    group.sample_size(10);

    for paragraphs in [10, 100] {
        let d = generate_document(paragraphs);
        let decos = highlights(&d);
        group.bench_function(format!("{paragraphs}_paragraphs"), |b| {
            b.iter(|| {
                let state = EditorState::create(basic_schema(), d.clone())
                    .with_decorations(decos.clone());
                let view = EditorView::new(ViewConfig::default(), ViewProps::new(state)).unwrap();
                black_box(view);
            });
        });
    }

    group.finish();
}

fn bench_typing(c: &mut Criterion) {
    let mut group = c.benchmark_group("typing");
    group.sample_size(10);

    let d = generate_document(100);
    let state = EditorState::create(basic_schema(), d).with_selection(Selection::cursor(3));
    let mut view = EditorView::new(ViewConfig::default(), ViewProps::new(state)).unwrap();

    group.bench_function("insert_char", |b| {
        b.iter(|| {
            let mut tr = view.state().tr();
            tr.insert_text("x", 3, 3).unwrap();
            view.dispatch(black_box(tr)).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_mount, bench_typing);
criterion_main!(benches);
