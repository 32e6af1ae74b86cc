use asset_pool::assets::MemorySource;
use asset_pool::{
    AssetHandle, ContainerHandle, Context, Instantiator, NativeHandle, Placement, PoolConfig,
};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

/// Do-nothing provider: the benchmark measures pool bookkeeping, not the host
struct NopProvider {
    next: u64,
}

impl Instantiator for NopProvider {
    fn create(
        &mut self,
        _asset: AssetHandle,
        _container: ContainerHandle,
    ) -> asset_pool::Result<NativeHandle> {
        let handle = NativeHandle(self.next);
        self.next += 1;
        Ok(handle)
    }

    fn destroy(&mut self, _instance: NativeHandle) -> asset_pool::Result<()> {
        Ok(())
    }

    fn activate(&mut self, _instance: NativeHandle) {}
    fn deactivate(&mut self, _instance: NativeHandle) {}

    fn set_placement(
        &mut self,
        _instance: NativeHandle,
        _placement: Placement,
    ) -> asset_pool::Result<()> {
        Ok(())
    }

    fn reparent(&mut self, _instance: NativeHandle, _container: ContainerHandle) {}
}

fn context_with_pool(initial: u32) -> Context {
    let mut source = MemorySource::new();
    source.register("bench/unit");
    let mut ctx = Context::new(Box::new(source), Box::new(NopProvider { next: 1 }));
    let asset = ctx.load("bench/unit").unwrap();
    ctx.create_pool(
        PoolConfig::new("bench/unit", asset).with_sizes(initial, u32::MAX, true),
    )
    .unwrap();
    ctx
}

fn spawn_despawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_despawn");

    group.bench_function("cycle_warm_pool", |b| {
        b.iter_batched(
            || context_with_pool(64),
            |mut ctx| {
                for _ in 0..10_000 {
                    let key = ctx.spawn("bench/unit").unwrap();
                    ctx.despawn("bench/unit", key).unwrap();
                }
                ctx
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("cycle_cold_expanding_pool", |b| {
        b.iter_batched(
            || context_with_pool(0),
            |mut ctx| {
                let mut keys = Vec::with_capacity(1_000);
                for _ in 0..1_000 {
                    keys.push(ctx.spawn("bench/unit").unwrap());
                }
                for key in keys {
                    ctx.despawn("bench/unit", key).unwrap();
                }
                ctx
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn cache_hit_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_lookup");

    group.bench_function("load_cached_key", |b| {
        let mut source = MemorySource::new();
        source.register("bench/unit");
        let mut ctx = Context::new(Box::new(source), Box::new(NopProvider { next: 1 }));
        ctx.load("bench/unit").unwrap();

        b.iter(|| {
            for _ in 0..10_000 {
                std::hint::black_box(ctx.load("bench/unit").unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, spawn_despawn_benchmark, cache_hit_benchmark);
criterion_main!(benches);
