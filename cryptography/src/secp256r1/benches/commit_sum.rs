use criterion::{criterion_group, BatchSize, Criterion};
use mweb_cryptography::{add_commitments, BlindingFactor, CommitmentAlgebra, Secp256r1};
use rand::{rngs::StdRng, RngCore, SeedableRng};

fn benchmark_commit_sum(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let algebra = Secp256r1::new().unwrap();
    for n in [2, 16, 128] {
        let commitments: Vec<_> = (0..n)
            .map(|_| {
                algebra
                    .commit(rng.next_u32() as u64, &BlindingFactor::random(&mut rng))
                    .unwrap()
            })
            .collect();
        let (positive, negative) = commitments.split_at(n / 2);
        c.bench_function(&format!("{}/commitments={}", module_path!(), n), |b| {
            b.iter_batched(
                || (positive.to_vec(), negative.to_vec()),
                |(positive, negative)| add_commitments(&algebra, &positive, &negative).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, benchmark_commit_sum);
