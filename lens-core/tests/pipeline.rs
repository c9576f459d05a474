use approx::assert_relative_eq;
use lens_core::nalgebra::Point2;
use lens_core::{Modifier, NormalizedGeometry, NormalizedPoint};
use std::thread;

fn swirl(params: &[f32], iocoord: &mut [f32]) {
    let (sin, cos) = params[0].sin_cos();
    for pair in iocoord.chunks_exact_mut(2) {
        let (x, y) = (pair[0], pair[1]);
        pair[0] = cos * x - sin * y;
        pair[1] = sin * x + cos * y;
    }
}

#[test]
fn normalization_round_trip() {
    let geometry = NormalizedGeometry::from_camera(24.0, 1.6, 600, 400);
    for &(x, y) in &[(0.0, 0.0), (599.0, 399.0), (123.5, 77.25)] {
        let pixel = Point2::new(x, y);
        assert_relative_eq!(
            geometry.denormalize(geometry.normalize(pixel)),
            pixel,
            epsilon = 1e-9
        );
    }
    // The shorter side spans two units.
    let top = geometry.normalize(Point2::new(300.0, 0.0));
    let bottom = geometry.normalize(Point2::new(300.0, 400.0));
    assert_relative_eq!(bottom.y - top.y, 2.0, epsilon = 1e-9);
    let NormalizedPoint(center) = geometry.normalize(Point2::new(300.0, 200.0));
    assert_relative_eq!(center, Point2::origin(), epsilon = 1e-9);
}

#[test]
fn rows_from_many_threads() {
    let mut modifier = Modifier::new(24.0, 1.6, 60, 40);
    modifier.add_coord_callback(swirl, 100, &[0.1]);
    let mut whole = vec![0.0f32; 2 * 60 * 40];
    assert!(modifier.apply_geometry_distortion(0.0, 0.0, 60, 40, &mut whole));

    let mut split = vec![0.0f32; 2 * 60 * 40];
    thread::scope(|scope| {
        for (band, chunk) in split.chunks_mut(2 * 60 * 10).enumerate() {
            let modifier = &modifier;
            scope.spawn(move || {
                assert!(modifier.apply_geometry_distortion(
                    0.0,
                    10.0 * band as f64,
                    60,
                    10,
                    chunk
                ));
            });
        }
    });
    assert_eq!(whole, split);
}
