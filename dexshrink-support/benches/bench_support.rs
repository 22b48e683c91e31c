use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dexshrink_support::{BitSet, StringInterner};

fn bench_intern(c: &mut Criterion) {
    let interner = StringInterner::new();
    c.bench_function("intern_descriptor", |b| {
        b.iter(|| {
            let s = interner.intern(black_box("Ljava/lang/Object;"));
            black_box(s);
        })
    });
}

fn bench_bitset_worklist(c: &mut Criterion) {
    c.bench_function("bitset_insert_4096", |b| {
        b.iter(|| {
            let mut seen = BitSet::new_empty(4096);
            for i in 0..4096 {
                black_box(seen.insert(black_box(i * 7 % 4096)));
            }
            black_box(seen.count())
        })
    });
}

criterion_group!(benches, bench_intern, bench_bitset_worklist);
criterion_main!(benches);
