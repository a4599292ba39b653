use criterion::{criterion_group, criterion_main, Criterion};
use powledger_core::{mine::mine, CandidateBlock, Transaction};

fn bench_pow(c: &mut Criterion) {
    let txs: Vec<Transaction> = (0..10)
        .map(|i| Transaction {
            author: format!("alice-{i}"),
            content: "hello from the bench".into(),
            timestamp: 1_700_000_000.0 + i as f64,
        })
        .collect();
    let candidate = CandidateBlock::new(1, "0".repeat(64), txs);

    for difficulty in [2u32, 3] {
        c.bench_function(&format!("mine_difficulty_{difficulty}"), |b| {
            b.iter(|| {
                let mut block = candidate.clone();
                mine(&mut block, difficulty)
            });
        });
    }
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
