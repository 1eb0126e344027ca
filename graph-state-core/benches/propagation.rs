use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use graph_state_core::reactive::{GraphNode, Listener, Resolved, Store};

/// A chain of `len` derived nodes, each adding one to the previous.
fn chain(len: usize) -> (GraphNode<u64>, GraphNode<u64>) {
    let source = GraphNode::constant(0_u64);
    let mut tail = source.clone();
    for _ in 0..len {
        let prev = tail.clone();
        tail = GraphNode::derived(move |ctx| Ok(ctx.get(&prev)? + 1));
    }
    (source, tail)
}

/// One source feeding `width` independent derived nodes.
fn fan_out(width: usize) -> (GraphNode<u64>, Vec<GraphNode<u64>>) {
    let source = GraphNode::constant(0_u64);
    let leaves = (0..width as u64)
        .map(|offset| {
            let source = source.clone();
            GraphNode::derived(move |ctx| Ok(ctx.get(&source)? + offset))
        })
        .collect();
    (source, leaves)
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_update");
    for len in [10, 100, 500] {
        let (source, tail) = chain(len);
        let store = Store::new();
        store.get_state(&tail).unwrap();
        store
            .add_listener(&tail, &Listener::new(|value: &Resolved<u64>| {
                black_box(value);
            }))
            .unwrap();

        let mut next = 0_u64;
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                next += 1;
                store.update_state(&source, next).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_update");
    for width in [10, 100, 1000] {
        let (source, leaves) = fan_out(width);
        let store = Store::new();
        for leaf in &leaves {
            store.get_state(leaf).unwrap();
        }

        let mut next = 0_u64;
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                next += 1;
                store.update_state(&source, next).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_cold_read(c: &mut Criterion) {
    let (_, tail) = chain(100);
    c.bench_function("cold_read_chain_100", |b| {
        b.iter(|| {
            let store = Store::new();
            black_box(store.get_state(&tail).unwrap())
        })
    });
}

criterion_group!(benches, bench_chain, bench_fan_out, bench_cold_read);
criterion_main!(benches);
