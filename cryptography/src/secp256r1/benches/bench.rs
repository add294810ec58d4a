use criterion::criterion_main;

mod commit_sum;

criterion_main!(commit::benches, commit_sum::benches);
