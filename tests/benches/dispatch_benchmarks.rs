//! Dispatch Benchmarks
//!
//! Measures the per-invocation overhead of the registry (lookup, auth check,
//! envelope construction, metrics) and of the IPC transport on top of it.
//!
//! Run with: cargo bench -p dispatch-tests

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dispatch_core::{
    AuthContext, OperationRecord, OperationRegistry, PlanTable, RegistryConfig, Transport,
};
use dispatch_transport::{
    InProcessIpc, IpcEvent, IpcTransport, IpcTransportConfig, DEFAULT_IPC_CHANNEL,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn registry_with(operations: usize) -> Arc<OperationRegistry> {
    let registry = Arc::new(OperationRegistry::new(RegistryConfig::default()));
    let plan = Arc::new(PlanTable::new("bench").raw_method("echo", |req: Value| async move {
        Ok(req)
    }));
    for i in 0..operations {
        registry
            .register(
                OperationRecord::new(format!("domain{}", i), "echo", plan.clone())
                    .with_capability("bench:run"),
            )
            .unwrap();
    }
    registry
}

// ============================================================================
// REGISTRY BENCHMARKS
// ============================================================================

fn bench_registry_invoke(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let auth = AuthContext::new("bench", "s").with_capability("bench:run");
    let request = json!({"topicId": "t", "limit": 50});

    let mut group = c.benchmark_group("registry_invoke");
    group.throughput(Throughput::Elements(1));

    for size in [1usize, 100, 1_000] {
        let registry = registry_with(size);
        group.bench_with_input(BenchmarkId::new("authorized", size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(registry.invoke(
                    black_box("domain0:echo"),
                    request.clone(),
                    Some(&auth),
                ))
            })
        });
    }

    let registry = registry_with(1);
    group.bench_function("not_found", |b| {
        b.iter(|| rt.block_on(registry.invoke(black_box("missing:op"), Value::Null, Some(&auth))))
    });
    group.bench_function("unauthorized", |b| {
        b.iter(|| rt.block_on(registry.invoke(black_box("domain0:echo"), Value::Null, None)))
    });

    group.finish();
}

// ============================================================================
// TRANSPORT BENCHMARKS
// ============================================================================

fn bench_ipc_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let registry = registry_with(1);
    let ipc = Arc::new(InProcessIpc::new());
    let transport = IpcTransport::new(
        registry,
        Arc::clone(&ipc) as _,
        IpcTransportConfig::default().with_dev_mode(true),
        None,
    );
    rt.block_on(transport.start()).unwrap();

    let mut group = c.benchmark_group("ipc_round_trip");
    group.throughput(Throughput::Elements(1));
    group.bench_function("echo", |b| {
        b.iter(|| {
            rt.block_on(ipc.invoke(
                DEFAULT_IPC_CHANNEL,
                IpcEvent::new(1),
                "domain0:echo",
                json!({"n": 1}),
            ))
            .unwrap()
        })
    });
    group.finish();

    rt.block_on(transport.stop()).unwrap();
}

criterion_group!(benches, bench_registry_invoke, bench_ipc_round_trip);
criterion_main!(benches);
