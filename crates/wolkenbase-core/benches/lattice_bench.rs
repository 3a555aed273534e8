use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wolkenbase_core::lattice::{flow_address, Eisenstein, Flowsnake, HexArray};

fn bench_division(c: &mut Criterion) {
    let divisors = [Eisenstein::new(2, -1), Eisenstein::new(7, 13), Eisenstein::new(-31, 5)];
    let mut group = c.benchmark_group("eisenstein_div_rem");
    for d in divisors {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{:?}", (d.x(), d.y()))), &d, |b, &d| {
            let mut n = Eisenstein::new(123_457, -98_765);
            b.iter(|| {
                n = n + Eisenstein::ONE;
                black_box(n.div_rem(black_box(d)))
            });
        });
    }
    group.finish();
}

fn bench_flow_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_address");
    for &digits in &[3u32, 6, 11] {
        group.bench_with_input(BenchmarkId::from_parameter(digits), &digits, |b, &digits| {
            let mut n = 0i64;
            b.iter(|| {
                n += 1;
                black_box(flow_address(black_box(n), digits))
            });
        });
    }
    group.finish();
}

fn bench_concurrent_next(c: &mut Criterion) {
    c.bench_function("flowsnake_next_4_threads", |b| {
        b.iter(|| {
            let snake = Flowsnake::with_range(5, -8181, 8181);
            std::thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| while black_box(snake.next()).is_some() {});
                }
            });
        });
    });
}

fn bench_hex_array(c: &mut Criterion) {
    c.bench_function("hex_array_fill_radius_60", |b| {
        b.iter(|| {
            let mut map: HexArray<u32> = HexArray::new();
            for (i, a) in Eisenstein::hexagon(60).enumerate() {
                *map.get_mut(a) = i as u32;
            }
            black_box(map.page_count())
        });
    });
}

criterion_group!(benches, bench_division, bench_flow_address, bench_concurrent_next, bench_hex_array);
criterion_main!(benches);
