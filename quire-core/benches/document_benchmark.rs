use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use quire_core::{Block, Document, Edit};
use uuid::Uuid;

/// Template plus `n` filler paragraphs.
fn large_document(n: usize) -> Document {
    let mut doc = Document::ieee_template(Uuid::new_v4());
    for i in 0..n {
        let index = doc.content.len();
        doc.apply(Edit::InsertBlock {
            index,
            block: Block::paragraph(format!(
                "Paragraph {i}: the quick brown fox jumps over the lazy dog."
            )),
        })
        .unwrap();
    }
    doc
}

fn bench_serialize(c: &mut Criterion) {
    let doc = large_document(500);

    c.bench_function("serialize_500_blocks", |b| {
        b.iter(|| black_box(doc.serialized_content()))
    });
}

fn bench_apply_serialized(c: &mut Criterion) {
    let value = large_document(500).serialized_content();

    c.bench_function("apply_serialized_500_blocks", |b| {
        b.iter(|| {
            let mut doc = Document::new(Uuid::nil(), "bench");
            doc.apply_serialized(black_box(value.clone())).unwrap();
            black_box(doc)
        })
    });
}

fn bench_append_text(c: &mut Criterion) {
    c.bench_function("append_text_keystroke", |b| {
        let mut doc = Document::new(Uuid::nil(), "bench");
        doc.apply(Edit::InsertBlock {
            index: 0,
            block: Block::paragraph(""),
        })
        .unwrap();
        b.iter(|| {
            doc.apply(black_box(Edit::AppendText {
                index: 0,
                text: "a".into(),
            }))
            .unwrap();
        })
    });
}

criterion_group!(benches, bench_serialize, bench_apply_serialized, bench_append_text);
criterion_main!(benches);
