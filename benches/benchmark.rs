use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use raster_cmd::engine::{convolution, resample, sepia};
use raster_cmd::{PixelBuffer, SepiaOptions};
use std::hint::black_box;

fn create_test_image(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        [(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 255]
    })
}

pub fn blur_benchmark(c: &mut Criterion) {
    let src = create_test_image(512, 512);
    let mut group = c.benchmark_group("blur");
    for sigma in [1.0, 3.0, 8.0] {
        group.bench_with_input(BenchmarkId::from_parameter(sigma), &sigma, |b, &s| {
            b.iter(|| convolution::blur(black_box(&src), s))
        });
    }
    group.finish();
}

pub fn resize_benchmark(c: &mut Criterion) {
    let src = create_test_image(1024, 768);
    let mut group = c.benchmark_group("lanczos_resize");
    for (w, h) in [(256, 192), (800, 600), (2048, 1536)] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &(w, h), |b, &(w, h)| {
            b.iter(|| resample::resize_lanczos(black_box(&src), w, h, resample::DEFAULT_LANCZOS_A))
        });
    }
    group.finish();
}

pub fn median_benchmark(c: &mut Criterion) {
    let src = create_test_image(512, 512);
    let mut group = c.benchmark_group("median");
    for radius in [1i64, 3, 7] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &r| {
            b.iter(|| convolution::median(black_box(&src), r))
        });
    }
    group.finish();
}

pub fn sepia_benchmark(c: &mut Criterion) {
    let src = create_test_image(1024, 1024);
    let opts = SepiaOptions::default();
    c.bench_function("sepia 1024x1024", |b| b.iter(|| sepia::sepia(black_box(&src), &opts)));
}

criterion_group!(
    benches,
    blur_benchmark,
    resize_benchmark,
    median_benchmark,
    sepia_benchmark
);
criterion_main!(benches);
