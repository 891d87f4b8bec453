// Plugin registry benchmarks
//
// Run with: cargo bench -p nimbus-client --bench registry

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nimbus_client::prelude::*;
use nimbus_client::ClientHandle;
use nimbus_transport::testing::MockEngine;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Debug)]
struct BenchPlugin;

impl Plugin for BenchPlugin {}

struct BenchDescriptor(PluginKey);

impl PluginDescriptor for BenchDescriptor {
    type Config = ();
    type Plugin = BenchPlugin;

    fn key(&self) -> PluginKey {
        self.0.clone()
    }

    fn create(&self, _client: ClientHandle, _config: ()) -> PluginResult<BenchPlugin> {
        Ok(BenchPlugin)
    }
}

fn build_client(rt: &Runtime, plugins: usize) -> NimbusClient {
    let mut builder = NimbusClient::builder("abc.nimbus.dev", "anon-key")
        .engine(Arc::new(MockEngine::new()));

    for i in 0..plugins {
        builder = builder
            .install_default(BenchDescriptor(PluginKey::new(format!("plugin-{i}"))))
            .unwrap();
    }

    rt.block_on(builder.build()).unwrap()
}

fn benchmark_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("registry_lookup");

    for size in [1, 8, 64] {
        let client = build_client(&rt, size);
        let descriptor = BenchDescriptor(PluginKey::new(format!("plugin-{}", size - 1)));

        group.bench_with_input(BenchmarkId::new("get", size), &size, |b, _| {
            b.iter(|| black_box(client.plugin(&descriptor).unwrap()))
        });
    }

    group.finish();
}

fn benchmark_build(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("build_and_close_8_plugins", |b| {
        b.iter(|| {
            let client = build_client(&rt, 8);
            rt.block_on(client.close()).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_lookup, benchmark_build);
criterion_main!(benches);
