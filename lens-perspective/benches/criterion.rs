use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lens_core::Modifier;
use lens_perspective::nalgebra::Point2;
use lens_perspective::PerspectiveCorrection;

const WIDTH: usize = 1500;
const HEIGHT: usize = 1000;

fn control_points() -> [Point2<f64>; 8] {
    [
        Point2::new(400.0, 900.0),
        Point2::new(430.0, 150.0),
        Point2::new(1100.0, 900.0),
        Point2::new(1070.0, 150.0),
        Point2::new(200.0, 500.0),
        Point2::new(1300.0, 540.0),
        Point2::new(200.0, 800.0),
        Point2::new(1300.0, 780.0),
    ]
}

fn corrected_modifier() -> Modifier {
    let mut modifier = Modifier::new(24.0, 1.5, WIDTH, HEIGHT);
    modifier
        .enable_perspective_correction(&control_points(), 0.0)
        .unwrap();
    modifier
}

fn solve(c: &mut Criterion) {
    c.bench_function("enable_perspective_correction", |b| {
        b.iter(|| {
            let mut modifier = Modifier::new(24.0, 1.5, WIDTH, HEIGHT);
            modifier
                .enable_perspective_correction(black_box(&control_points()), black_box(0.0))
                .unwrap();
            modifier
        })
    });
}

fn remap_rows(c: &mut Criterion) {
    let modifier = corrected_modifier();
    let mut res = vec![0.0f32; 2 * WIDTH * 16];
    c.bench_function("apply_geometry_distortion 16 rows", |b| {
        b.iter(|| modifier.apply_geometry_distortion(0.0, black_box(400.0), WIDTH, 16, &mut res))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = solve, remap_rows
);
criterion_main!(benches);
