use nalgebra::{Point2, Rotation3, Vector2, Vector3};

/// Scales `(x, y)` to unit length.
///
/// The caller must make sure the vector is not zero, otherwise the result is NaN.
#[inline]
pub fn normalize(x: f64, y: f64) -> Vector2<f64> {
    let norm = (x * x + y * y).sqrt();
    Vector2::new(x / norm, y / norm)
}

/// Projects `coordinates` through the origin onto the plane `z = plane_distance`.
///
/// ```
/// use lens_geom::central_projection;
/// use lens_geom::nalgebra::{Point2, Vector3};
/// let projected = central_projection(&Vector3::new(1.0, -2.0, 4.0), 2.0);
/// assert_eq!(projected, Point2::new(0.5, -1.0));
/// ```
#[inline]
pub fn central_projection(coordinates: &Vector3<f64>, plane_distance: f64) -> Point2<f64> {
    let stretch_factor = plane_distance / coordinates.z;
    Point2::new(
        coordinates.x * stretch_factor,
        coordinates.y * stretch_factor,
    )
}

/// Intersects the line through `a0` and `a1` with the line through `b0` and `b1`.
///
/// The result is homogeneous: `(x, y, w)` stands for the point `(x / w, y / w)`. Parallel lines
/// give `w == 0` with `(x, y)` pointing along the lines. Coinciding lines give all zeros.
pub fn intersection_homogeneous(
    a0: Point2<f64>,
    a1: Point2<f64>,
    b0: Point2<f64>,
    b1: Point2<f64>,
) -> Vector3<f64> {
    let a = a0.x * a1.y - a0.y * a1.x;
    let b = b0.x * b1.y - b0.y * b1.x;
    let denominator = (a0.x - a1.x) * (b0.y - b1.y) - (a0.y - a1.y) * (b0.x - b1.x);
    Vector3::new(
        a * (b0.x - b1.x) - b * (a0.x - a1.x),
        a * (b0.y - b1.y) - b * (a0.y - a1.y),
        denominator,
    )
}

/// Intersects the line through `a0` and `a1` with the line through `b0` and `b1`.
///
/// Parallel lines produce non-finite coordinates; use [`intersection_homogeneous`] where that
/// can happen.
///
/// ```
/// use lens_geom::intersection;
/// use lens_geom::nalgebra::Point2;
/// let crossing = intersection(
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 1.0),
///     Point2::new(0.0, 1.0),
///     Point2::new(1.0, 0.0),
/// );
/// assert_eq!(crossing, Point2::new(0.5, 0.5));
/// ```
pub fn intersection(
    a0: Point2<f64>,
    a1: Point2<f64>,
    b0: Point2<f64>,
    b1: Point2<f64>,
) -> Point2<f64> {
    let h = intersection_homogeneous(a0, a1, b0, b1);
    Point2::new(h.x / h.z, h.y / h.z)
}

/// Rotation about the X axis (pitch):
///
/// ```text
///          ⎛ 1     0         0   ⎞
/// Rₓ(ϑ) =  ⎜ 0   cos ϑ   - sin ϑ ⎟
///          ⎝ 0   sin ϑ     cos ϑ ⎠
/// ```
#[inline]
pub fn rotation_x(angle: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), angle)
}

/// Rotation about the Y axis (yaw):
///
/// ```text
///          ⎛  cos ϑ   0   sin ϑ ⎞
/// R_y(ϑ) = ⎜   0      1    0    ⎟
///          ⎝- sin ϑ   0   cos ϑ ⎠
/// ```
#[inline]
pub fn rotation_y(angle: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::y_axis(), angle)
}

/// Rotation about the Z axis (roll in the image plane):
///
/// ```text
///          ⎛ cos ϑ   - sin ϑ  0 ⎞
/// R_z(ϑ) = ⎜ sin ϑ     cos ϑ  0 ⎟
///          ⎝   0         0    1 ⎠
/// ```
#[inline]
pub fn rotation_z(angle: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle)
}
