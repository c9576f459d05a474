use crate::svd;
use core::f64::consts::{FRAC_PI_2, PI};
use log::debug;
use nalgebra::{Point2, SMatrix, Vector2, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// General conic `A x² + B xy + C y² + D x + E y + F = 0`, stored as `[A, B, C, D, E, F]`.
///
/// The coefficients are only defined up to scale.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Conic(pub [f64; 6]);

/// Geometric ellipse parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Ellipse {
    pub center: Point2<f64>,
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Angle of the major axis from +x in radians, within (−π/2, π/2].
    pub angle: f64,
}

impl Ellipse {
    /// The point at parameter `t` on the boundary, `t = 0` being the end of the major axis.
    pub fn point_at(&self, t: f64) -> Point2<f64> {
        let (sin_angle, cos_angle) = self.angle.sin_cos();
        let (x, y) = (self.semi_major * t.cos(), self.semi_minor * t.sin());
        self.center + Vector2::new(x * cos_angle - y * sin_angle, x * sin_angle + y * cos_angle)
    }

    /// Unit vector along the minor axis, rotated a quarter turn from the major axis.
    pub fn minor_axis(&self) -> Vector2<f64> {
        let (sin_angle, cos_angle) = self.angle.sin_cos();
        Vector2::new(-sin_angle, cos_angle)
    }
}

impl Conic {
    /// Fits the conic passing through five points.
    ///
    /// Each point contributes the row `[x², xy, y², x, y, 1]` of a 5x6 design matrix whose
    /// null vector holds the coefficients.
    ///
    /// ```
    /// use lens_geom::Conic;
    /// use lens_geom::nalgebra::Point2;
    /// let unit_circle = [
    ///     Point2::new(1.0, 0.0),
    ///     Point2::new(0.0, 1.0),
    ///     Point2::new(-1.0, 0.0),
    ///     Point2::new(0.0, -1.0),
    ///     Point2::new(0.6, 0.8),
    /// ];
    /// let conic = Conic::fit_five(&unit_circle);
    /// assert!(conic.evaluate(Point2::new(-0.8, 0.6)).abs() < 1e-12);
    /// ```
    pub fn fit_five(points: &[Point2<f64>; 5]) -> Self {
        let design = SMatrix::<f64, 5, 6>::from_fn(|row, column| {
            let p = points[row];
            match column {
                0 => p.x * p.x,
                1 => p.x * p.y,
                2 => p.y * p.y,
                3 => p.x,
                4 => p.y,
                _ => 1.0,
            }
        });
        let v = svd(&design);
        Self([v[0], v[1], v[2], v[3], v[4], v[5]])
    }

    /// Value of the conic polynomial at `point`. Zero on the curve.
    pub fn evaluate(&self, point: Point2<f64>) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        let (x, y) = (point.x, point.y);
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// The coefficients in the symmetric form `a x² + 2b xy + c y² + 2d x + 2f y + g = 0`,
    /// returned as `(a, b, c, d, f, g)`.
    fn halved(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a, b / 2.0, c, d / 2.0, e / 2.0, f)
    }

    /// Center of symmetry. `None` for parabolas and degenerate conics.
    pub fn center(&self) -> Option<Point2<f64>> {
        let (a, b, c, d, f, _) = self.halved();
        let discriminant = b * b - a * c;
        let center = Point2::new(
            (c * d - b * f) / discriminant,
            (a * f - b * d) / discriminant,
        );
        if discriminant != 0.0 && center.x.is_finite() && center.y.is_finite() {
            Some(center)
        } else {
            None
        }
    }

    /// Converts the conic into geometric ellipse parameters.
    ///
    /// Returns `None` unless both semi-axes come out finite and positive, which rules out
    /// hyperbolas, parabolas and imaginary or degenerate conics.
    pub fn ellipse(&self) -> Option<Ellipse> {
        let (a, b, c, d, f, g) = self.halved();
        let center = self.center()?;
        let discriminant = b * b - a * c;

        let numerator =
            2.0 * (a * f * f + c * d * d + g * b * b - 2.0 * b * d * f - a * c * g) / discriminant;
        let spread = ((a - c) * (a - c) + 4.0 * b * b).sqrt();
        let mut semi_major = (numerator / (spread - (a + c))).sqrt();
        let mut semi_minor = (numerator / (-spread - (a + c))).sqrt();

        let mut angle = if b == 0.0 && a == c {
            0.0
        } else {
            let angle = 0.5 * (2.0 * b / (a - c)).atan();
            if a > c {
                angle + FRAC_PI_2
            } else {
                angle
            }
        };
        if semi_major < semi_minor {
            core::mem::swap(&mut semi_major, &mut semi_minor);
            angle -= FRAC_PI_2;
        }
        let angle = FRAC_PI_2 - (FRAC_PI_2 - angle).rem_euclid(PI);

        let valid = |axis: f64| axis.is_finite() && axis > 0.0;
        if valid(semi_major) && valid(semi_minor) && angle.is_finite() {
            Some(Ellipse {
                center,
                semi_major,
                semi_minor,
                angle,
            })
        } else {
            None
        }
    }
}

/// What [`ellipse_analysis`] recovers from five points on an ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseVanishing {
    /// Homogeneous `(x, y, w)` with `w ≥ 0`. A circle gives `w = 0`.
    pub vanishing_point: Vector3<f64>,
    /// Center of the fitted ellipse.
    pub center: Point2<f64>,
}

/// Treats the ellipse through `points` as the image of a circle and finds the vanishing point
/// of the circle's plane normal.
///
/// The vanishing point lies on the minor axis at distance `f / √((a/b)² − 1)` from the origin,
/// `a` and `b` being the semi-axes. By default it is placed towards the top of the image
/// (negative `y`); when the first two points run clockwise around the center it is put on the
/// opposite side.
///
/// Returns `None` if the points do not determine an ellipse.
pub fn ellipse_analysis(
    points: &[Point2<f64>; 5],
    f_normalized: f64,
) -> Option<EllipseVanishing> {
    let ellipse = Conic::fit_five(points).ellipse()?;
    debug!("fitted ellipse {:?}", ellipse);

    let ratio = ellipse.semi_major / ellipse.semi_minor;
    let tan_tilt = (ratio * ratio - 1.0).max(0.0).sqrt();
    let to_first = points[0] - ellipse.center;
    let to_second = points[1] - ellipse.center;
    let orientation = if to_first.perp(&to_second) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let towards = -orientation * f_normalized * ellipse.minor_axis();
    Some(EllipseVanishing {
        vanishing_point: Vector3::new(towards.x, towards.y, tan_tilt),
        center: ellipse.center,
    })
}
