use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustypsi::genomic::is_homopolymer;
use rustypsi::stats::{bh_adjust_descending, binomial_pval};

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("binomial_pval deep", |b| {
        b.iter(|| binomial_pval(black_box(5000), black_box(40), black_box(0.001)))
    });
    c.bench_function("binomial_pval shallow", |b| {
        b.iter(|| binomial_pval(black_box(20), black_box(5), black_box(0.001)))
    });

    let mut pvals: Vec<f64> = (1..=10_000).map(|i| 1.0 / i as f64).collect();
    pvals.sort_by(|a, b| b.partial_cmp(a).unwrap());
    c.bench_function("bh_adjust_descending 10k", |b| {
        b.iter(|| bh_adjust_descending(black_box(&pvals)))
    });

    let seq = b"CCTCTCGA";
    c.bench_function("is_homopolymer", |b| {
        b.iter(|| is_homopolymer(black_box(&seq[..6])))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
