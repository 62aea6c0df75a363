use criterion::{criterion_group, criterion_main, Criterion};

use outcome_exchange::{MarketId, OrderBook, Side};

fn setup_order_book(depth: u64, orders_per_level: u64) -> OrderBook {
    let market = MarketId::new(1, 480);
    let mut ob = OrderBook::new(market);
    let mut order_id = 0u64;
    for price in 1..=depth as i64 {
        for _ in 0..orders_per_level {
            order_id += 1;
            ob.add_resting(Side::Sell, price, 1, order_id, 1).unwrap();
            order_id += 1;
            ob.add_resting(Side::Buy, price, 1, order_id, 2).unwrap();
        }
    }
    ob
}

fn bench_process_order(c: &mut Criterion) {
    let depth = 100;
    let orders_per_level = 10;

    c.bench_function("crossing buy sweeps half the book", |b| {
        b.iter_batched(
            || (setup_order_book(depth, orders_per_level), 1_000_000u64),
            |(mut ob, mut order_id)| {
                order_id += 1;
                ob.process_order(
                    Side::Buy,
                    depth as i64,
                    depth * orders_per_level / 2,
                    order_id,
                    3,
                )
                .unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("limit order rests with no match", |b| {
        b.iter_batched(
            || (setup_order_book(depth, orders_per_level), 2_000_000u64),
            |(mut ob, mut order_id)| {
                order_id += 1;
                ob.process_order(Side::Buy, 0, 1, order_id, 3).unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_process_order);
criterion_main!(benches);
