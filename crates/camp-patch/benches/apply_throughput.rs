use camp_patch::{Change, Document, Element, PatchSet};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn arena(robots: usize) -> Document {
    let mut arena = Element::new("arena");
    for id in 0..robots {
        arena = arena.with_child(Element::new("robot").with_attr("id", id.to_string()));
    }
    Document::new(
        Element::new("config")
            .with_child(arena)
            .with_child(Element::new("noise").with_attr("level", "0")),
    )
}

fn bench_apply(c: &mut Criterion) {
    let doc = arena(256);
    let set: PatchSet = (0..64)
        .map(|i| Change::add(".//arena", "robot", [("id", format!("extra{i}"))]))
        .chain([
            Change::attribute(".//noise", "level", "0.1"),
            Change::attribute(".//arena/robot[@id='17']", "kind", "leader"),
            Change::remove(".//arena", "robot"),
        ])
        .collect();
    c.bench_function("apply_patch_set", |b| {
        b.iter(|| black_box(set.apply(black_box(&doc)).expect("apply")));
    });
    c.bench_function("render_xml", |b| {
        b.iter(|| black_box(doc.to_xml()));
    });
}

criterion_group!(benches, bench_apply);
criterion_main!(benches);
