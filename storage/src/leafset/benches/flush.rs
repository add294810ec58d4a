use criterion::{criterion_group, BatchSize, Criterion};
use mweb_runtime::storage::memory;
use mweb_storage::{
    leafset::{Config, DurableLeafSet, LeafSet},
    mmr::LeafIndex,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const LEAVES: u64 = 100_000;

fn bench_flush(c: &mut Criterion) {
    for spends in [10, 1_000] {
        c.bench_function(
            &format!("{}/leaves={} spends={}", module_path!(), LEAVES, spends),
            |b| {
                b.iter_batched(
                    || {
                        let storage = memory::Storage::default();
                        let mut set = DurableLeafSet::init(
                            storage,
                            Config {
                                partition: "bench".into(),
                            },
                        )
                        .unwrap();
                        for i in 0..LEAVES {
                            set.add(LeafIndex::new(i).unwrap());
                        }
                        set.flush().unwrap();

                        let mut rng = StdRng::seed_from_u64(0);
                        for _ in 0..spends {
                            let leaf = LeafIndex::new(rng.gen_range(0..LEAVES)).unwrap();
                            set.remove(leaf).unwrap();
                        }
                        set
                    },
                    |mut set| set.flush().unwrap(),
                    BatchSize::LargeInput,
                );
            },
        );
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_flush
}
