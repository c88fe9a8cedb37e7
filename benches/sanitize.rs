use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sensor_entropy::sink::sanitize_into;

fn bench_sanitize(c: &mut Criterion) {
    // One low-resolution YUYV plane.
    let plane: Vec<u8> = (0..192u32 * 144 * 2).map(|i| (i * 31 % 251) as u8).collect();
    let mut out = Vec::with_capacity(plane.len());

    let mut group = c.benchmark_group("sanitize");
    group.throughput(Throughput::Bytes(plane.len() as u64));
    group.bench_function("yuyv_plane", |b| {
        b.iter(|| {
            out.clear();
            sanitize_into(black_box(&plane), &mut out)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_sanitize);
criterion_main!(benches);
