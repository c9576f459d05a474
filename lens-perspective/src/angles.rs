use crate::PerspectiveError;
use arrayvec::ArrayVec;
use core::f64::consts::{FRAC_PI_2, PI};
use lens_geom::{
    central_projection, ellipse_analysis, intersection_homogeneous, normalize, rotation_x,
    rotation_y, rotation_z,
};
use log::trace;
use nalgebra::{Point2, Rotation3, Vector2, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Most control points a correction accepts.
pub const MAX_CONTROL_POINTS: usize = 8;

/// The control points of one correction, in normalized coordinates.
pub type ControlPoints = ArrayVec<Point2<f64>, MAX_CONTROL_POINTS>;

/// What the control points mean. The mode is implied by their number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum ControlPointMode {
    /// Points 0–1 and 2–3 lie on two lines that should become parallel, vertical or horizontal.
    TwoLines,
    /// Five points on an ellipse that should become a circle.
    Ellipse,
    /// Like [`ControlPointMode::TwoLines`], with points 4–5 on a line to become horizontal.
    TwoLinesAndHorizon,
    /// Like [`ControlPointMode::Ellipse`], with points 5–6 giving the direction to straighten.
    EllipseAndDirection,
    /// Points 0–3 on two verticals and points 4–7 on two horizontals. The focal length
    /// can be recovered from the two vanishing points.
    VerticalsAndHorizontals,
}

impl ControlPointMode {
    pub fn number_of_points(self) -> usize {
        match self {
            Self::TwoLines => 4,
            Self::Ellipse => 5,
            Self::TwoLinesAndHorizon => 6,
            Self::EllipseAndDirection => 7,
            Self::VerticalsAndHorizontals => 8,
        }
    }
}

impl TryFrom<usize> for ControlPointMode {
    type Error = PerspectiveError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Ok(match count {
            4 => Self::TwoLines,
            5 => Self::Ellipse,
            6 => Self::TwoLinesAndHorizon,
            7 => Self::EllipseAndDirection,
            8 => Self::VerticalsAndHorizontals,
            _ => return Err(PerspectiveError::ControlPointCount(count)),
        })
    }
}

/// The angles a set of control points asks for, together with what they were measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CorrectionAngles {
    /// Yaw about the vertical image axis.
    pub rho: f64,
    /// Pitch about the horizontal image axis.
    pub delta: f64,
    /// Yaw applied after the pitch, which levels the horizon.
    pub rho_h: f64,
    /// Roll in the image plane.
    pub alpha: f64,
    /// Center of the control points, or of the fitted ellipse.
    pub center: Point2<f64>,
    /// The focal length used. Only differs from the input for
    /// [`ControlPointMode::VerticalsAndHorizontals`].
    pub f_normalized: f64,
    /// The two lines turned out to be horizontals rather than verticals.
    pub swapped_verticals_and_horizontals: bool,
}

/// `Rₓ(δ) · R_y(ρ)`, which moves the vanishing point into the zenith or nadir.
pub fn rotate_rho_delta(rho: f64, delta: f64) -> Rotation3<f64> {
    rotation_x(delta) * rotation_y(rho)
}

/// `R_y(ρₕ) · Rₓ(δ) · R_y(ρ)`
pub fn rotate_rho_delta_rho_h(rho: f64, delta: f64, rho_h: f64) -> Rotation3<f64> {
    rotation_y(rho_h) * rotate_rho_delta(rho, delta)
}

/// Relative height difference below which a rotated segment counts as level.
const LEVEL_EPSILON: f64 = 1e-9;

/// Direction from `from` towards the homogeneous point `to`, valid at infinity as well.
fn towards(to: &Vector3<f64>, from: Point2<f64>) -> Vector2<f64> {
    Vector2::new(to.x - to.z * from.x, to.y - to.z * from.y)
}

/// Intersects the lines 0–1 and 2–3 of `points`, with `w ≥ 0`.
///
/// A negative zero `w` is flipped as well, so that `atan2` never sees it.
fn vanishing_point(points: &[Point2<f64>]) -> Vector3<f64> {
    let v = intersection_homogeneous(points[0], points[1], points[2], points[3]);
    if v.z.is_sign_negative() {
        -v
    } else {
        v
    }
}

/// Rotation angle in `[−π/2, π/2)` that differs from `angle` by a multiple of π.
fn reduce_half_turn(angle: f64) -> f64 {
    (angle + FRAC_PI_2).rem_euclid(PI) - FRAC_PI_2
}

fn mean(points: &[Point2<f64>]) -> Point2<f64> {
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |sum, point| sum + point.coords);
    Point2::from(sum / points.len() as f64)
}

/// Whether `segment` has the same height on the sphere after `rotation`, up to rounding.
fn is_level(rotation: &Rotation3<f64>, segment: [Point2<f64>; 2], f_normalized: f64) -> bool {
    let p0 = rotation * segment[0].coords.push(f_normalized);
    let p1 = rotation * segment[1].coords.push(f_normalized);
    (p1.y - p0.y).abs() <= LEVEL_EPSILON * (p0.norm() + p1.norm())
}

/// The yaw that turns the optical axis back into the `y`-`z` plane after `rotation`.
fn yaw_to_optical_axis(rotation: &Rotation3<f64>, f_normalized: f64) -> f64 {
    let axis = rotation * Vector3::new(0.0, 0.0, f_normalized);
    (-axis.x).atan2(axis.z)
}

/// Finds the yaw `ρₕ` which, applied after `Rₓ(δ) · R_y(ρ)`, makes `segment` horizontal.
///
/// The segment is rotated onto the sphere and intersected with the equator. Returns NaN when the
/// rotated segment lies on the equator already and so does not determine a direction.
pub fn determine_rho_h(
    rho: f64,
    delta: f64,
    segment: [Point2<f64>; 2],
    f_normalized: f64,
    center: Point2<f64>,
) -> f64 {
    let rotation = rotate_rho_delta(rho, delta);
    let p0 = rotation * Vector3::new(segment[0].x, segment[0].y, f_normalized);
    let p1 = rotation * Vector3::new(segment[1].x, segment[1].y, f_normalized);
    if p0.y == p1.y {
        return if p0.y == 0.0 { f64::NAN } else { 0.0 };
    }
    let step = central_projection(&Vector3::new(p1.x - p0.x, p1.z - p0.z, p1.y - p0.y), -p0.y);
    let x_h = p0.x + step.x;
    let z_h = p0.z + step.y;
    let mut rho_h = if z_h == 0.0 {
        if x_h > 0.0 {
            0.0
        } else {
            PI
        }
    } else {
        FRAC_PI_2 - (x_h / z_h).atan()
    };
    let center = rotate_rho_delta_rho_h(rho, delta, rho_h)
        * Vector3::new(center.x, center.y, f_normalized);
    if center.z < 0.0 {
        rho_h -= PI;
    }
    rho_h
}

/// One way of rectifying the vanishing point, scored by [`Candidate::score`].
#[derive(Debug, Clone, Copy)]
struct Candidate {
    delta: f64,
    rho_h: f64,
    alpha: f64,
}

impl Candidate {
    /// Sorts candidates that keep the center in front of the camera first, then by how far the
    /// whole correction turns the camera.
    fn score(&self, rho: f64, center: Point2<f64>, f_normalized: f64) -> (bool, f64) {
        let correction =
            rotation_z(-self.alpha) * rotate_rho_delta_rho_h(rho, self.delta, self.rho_h);
        let behind = (correction * center.coords.push(f_normalized)).z < 0.0;
        (behind, correction.angle())
    }
}

/// Solves the correction angles for normalized control points.
///
/// The number of points selects the [`ControlPointMode`]. For
/// [`ControlPointMode::VerticalsAndHorizontals`] the focal length is replaced by the one that
/// makes the two vanishing points perpendicular, if there is such a focal length.
///
/// The vanishing point can be rotated into the zenith or into the nadir, and two horizontals can
/// be rolled upright either way. Of these the correction that keeps the control points in front of
/// the camera with the smallest overall rotation wins, so the image never comes out upside down.
pub fn calculate_angles(
    points: &[Point2<f64>],
    f_normalized: f64,
) -> Result<CorrectionAngles, PerspectiveError> {
    let mode = ControlPointMode::try_from(points.len())?;
    let mut f_normalized = f_normalized;

    let mut center = match mode {
        ControlPointMode::TwoLinesAndHorizon => mean(&points[..4]),
        _ => mean(points),
    };

    let v = match mode {
        ControlPointMode::Ellipse | ControlPointMode::EllipseAndDirection => {
            let five = [points[0], points[1], points[2], points[3], points[4]];
            let analysis =
                ellipse_analysis(&five, f_normalized).ok_or(PerspectiveError::DegenerateConic)?;
            center = analysis.center;
            analysis.vanishing_point
        }
        _ => {
            let v = vanishing_point(&points[..4]);
            if mode == ControlPointMode::VerticalsAndHorizontals {
                let h = vanishing_point(&points[4..8]);
                let radicand = -(h.x / h.z) * (v.x / v.z) - (h.y / h.z) * (v.y / v.z);
                if radicand.is_finite() && radicand > 0.0 {
                    f_normalized = radicand.sqrt();
                    trace!("focal length from vanishing points: {}", f_normalized);
                }
            }
            v
        }
    };
    if !v.iter().all(|c| c.is_finite()) || v == Vector3::zeros() {
        return Err(PerspectiveError::DegenerateVanishingPoint);
    }

    let rho = (-v.x).atan2(v.z * f_normalized);
    let zenith = FRAC_PI_2 - (-v.y).atan2(v.x.hypot(v.z * f_normalized));

    let c = match mode {
        ControlPointMode::Ellipse => towards(&v, center),
        ControlPointMode::EllipseAndDirection => points[5] - points[6],
        _ => {
            let a = towards(&v, points[0]);
            let b = towards(&v, points[2]);
            normalize(a.x, a.y) + normalize(b.x, b.y)
        }
    };
    let mostly_horizontal = c.x.abs() > c.y.abs();
    let swapped_verticals_and_horizontals =
        mostly_horizontal && mode != ControlPointMode::EllipseAndDirection;

    let rho_h_for = |delta: f64| {
        let rho_h_of = |segment: [Point2<f64>; 2]| {
            determine_rho_h(rho, delta, segment, f_normalized, center)
        };
        let rho_h = match mode {
            ControlPointMode::TwoLines => {
                let offset = if swapped_verticals_and_horizontals {
                    Vector2::<f64>::y()
                } else {
                    Vector2::<f64>::x()
                };
                let segment = [center - offset, center + offset];
                let rotation = rotate_rho_delta(rho, delta);
                if swapped_verticals_and_horizontals && is_level(&rotation, segment, f_normalized)
                {
                    // Horizontals vanishing on the horizon leave the helper on a parallel circle.
                    yaw_to_optical_axis(&rotation, f_normalized)
                } else {
                    rho_h_of(segment)
                }
            }
            ControlPointMode::Ellipse | ControlPointMode::EllipseAndDirection => 0.0,
            ControlPointMode::TwoLinesAndHorizon => rho_h_of([points[4], points[5]]),
            ControlPointMode::VerticalsAndHorizontals => {
                let rho_h = rho_h_of([points[4], points[5]]);
                if rho_h.is_nan() {
                    rho_h_of([points[6], points[7]])
                } else {
                    rho_h
                }
            }
        };
        if rho_h.is_nan() {
            0.0
        } else {
            rho_h
        }
    };
    let direction_alpha = |delta: f64| {
        let rotation = rotate_rho_delta(rho, delta);
        let project = |p: Point2<f64>| {
            central_projection(&(rotation * p.coords.push(f_normalized)), f_normalized)
        };
        let direction = project(points[6]) - project(points[5]);
        let beta = direction.y.atan2(direction.x);
        if mostly_horizontal {
            reduce_half_turn(beta)
        } else {
            reduce_half_turn(beta - FRAC_PI_2)
        }
    };
    let upright = if rho > 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 };

    let mut candidates: ArrayVec<Candidate, 4> = ArrayVec::new();
    for delta in [zenith, zenith - PI] {
        let rho_h = rho_h_for(delta);
        if mode == ControlPointMode::EllipseAndDirection {
            candidates.push(Candidate {
                delta,
                rho_h,
                alpha: direction_alpha(delta),
            });
        } else if swapped_verticals_and_horizontals {
            for alpha in [upright, -upright] {
                candidates.push(Candidate { delta, rho_h, alpha });
            }
        } else {
            candidates.push(Candidate {
                delta,
                rho_h,
                alpha: 0.0,
            });
        }
    }
    let mut best = candidates[0];
    let mut best_score = best.score(rho, center, f_normalized);
    for candidate in &candidates[1..] {
        let score = candidate.score(rho, center, f_normalized);
        if score < best_score {
            best = *candidate;
            best_score = score;
        }
    }
    trace!(
        "picked delta = {} out of {} candidates, correction angle {}",
        best.delta,
        candidates.len(),
        best_score.1
    );

    Ok(CorrectionAngles {
        rho,
        delta: best.delta,
        rho_h: best.rho_h,
        alpha: best.alpha,
        center,
        f_normalized,
        swapped_verticals_and_horizontals,
    })
}

/// Copies `points` into bounded storage, rejecting counts the solver does not handle.
pub fn control_points(points: &[Point2<f64>]) -> Result<ControlPoints, PerspectiveError> {
    ControlPointMode::try_from(points.len())?;
    Ok(points.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mode_from_count() {
        assert_eq!(ControlPointMode::try_from(4), Ok(ControlPointMode::TwoLines));
        assert_eq!(
            ControlPointMode::try_from(8),
            Ok(ControlPointMode::VerticalsAndHorizontals)
        );
        assert_eq!(
            ControlPointMode::try_from(3),
            Err(PerspectiveError::ControlPointCount(3))
        );
        assert_eq!(
            ControlPointMode::try_from(9),
            Err(PerspectiveError::ControlPointCount(9))
        );
        for count in 4..=8 {
            let mode = ControlPointMode::try_from(count).unwrap();
            assert_eq!(mode.number_of_points(), count);
        }
    }

    #[test]
    fn half_turn_reduction() {
        assert_relative_eq!(reduce_half_turn(0.1), 0.1);
        assert_relative_eq!(reduce_half_turn(3.0), 3.0 - PI);
        assert_relative_eq!(reduce_half_turn(-3.0), PI - 3.0);
        assert_relative_eq!(reduce_half_turn(FRAC_PI_2), -FRAC_PI_2);
    }

    #[test]
    fn rotations_compose_in_order() {
        let (rho, delta, rho_h) = (0.3, -0.2, 0.1);
        let v = Vector3::new(0.1, 0.2, 1.0);
        let step_by_step = rotation_y(rho_h) * (rotation_x(delta) * (rotation_y(rho) * v));
        assert_relative_eq!(
            rotate_rho_delta_rho_h(rho, delta, rho_h) * v,
            step_by_step,
            epsilon = 1e-15
        );
        // Row 2 of Rₓ(δ) · R_y(ρ) is (sin ρ sin δ, cos δ, −cos ρ sin δ).
        let m = rotate_rho_delta(rho, delta);
        assert_relative_eq!(m[(1, 0)], rho.sin() * delta.sin(), epsilon = 1e-15);
        assert_relative_eq!(m[(1, 1)], delta.cos(), epsilon = 1e-15);
        assert_relative_eq!(m[(1, 2)], -rho.cos() * delta.sin(), epsilon = 1e-15);
    }

    #[test]
    fn rho_h_of_level_segment() {
        // Without rotation a segment through the optical axis stays on the equator.
        let segment = [Point2::new(-1.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(determine_rho_h(0.0, 0.0, segment, 1.0, Point2::origin()).is_nan());
        // A level segment off the equator never crosses it.
        let segment = [Point2::new(-1.0, 0.5), Point2::new(1.0, 0.5)];
        assert_eq!(determine_rho_h(0.0, 0.0, segment, 1.0, Point2::origin()), 0.0);
    }

    #[test]
    fn rho_h_uses_both_endpoints() {
        // A tilted segment crosses the equator at (x_h, 0, z_h) = (0.4, 0, 1).
        let segment = [Point2::new(0.2, -0.2), Point2::new(0.6, 0.2)];
        let rho_h = determine_rho_h(0.0, 0.0, segment, 1.0, Point2::origin());
        assert_relative_eq!(rho_h, FRAC_PI_2 - 0.4f64.atan(), epsilon = 1e-12);
    }

    #[test]
    fn parallel_verticals_need_no_rotation() {
        let points = [
            Point2::new(-0.5, -0.5),
            Point2::new(-0.5, 0.5),
            Point2::new(0.5, -0.5),
            Point2::new(0.5, 0.5),
        ];
        let angles = calculate_angles(&points, 1.0).unwrap();
        assert_eq!(angles.rho, 0.0);
        assert_relative_eq!(angles.delta, 0.0, epsilon = 1e-15);
        assert_eq!(angles.rho_h, 0.0);
        assert_eq!(angles.alpha, 0.0);
        assert!(!angles.swapped_verticals_and_horizontals);
        assert_eq!(angles.center, Point2::origin());
    }

    #[test]
    fn converging_horizontals_are_swapped() {
        // Two lines meeting far to the right.
        let v = Point2::new(3.0, 0.1);
        let p0 = Point2::new(-0.4, -0.3);
        let p2 = Point2::new(-0.4, 0.35);
        let points = [p0, p0 + (v - p0) * 0.2, p2, p2 + (v - p2) * 0.2];
        let angles = calculate_angles(&points, 1.0).unwrap();
        assert!(angles.swapped_verticals_and_horizontals);
        assert!(angles.rho < 0.0);
        assert_eq!(angles.alpha, -FRAC_PI_2);
    }

    #[test]
    fn vanishing_point_at_infinity_has_positive_w() {
        let left = [Point2::new(-0.5, -0.5), Point2::new(-0.5, 0.5)];
        let right = [Point2::new(0.5, -0.5), Point2::new(0.5, 0.5)];
        for points in [
            [left[0], left[1], right[0], right[1]],
            [right[0], right[1], left[0], left[1]],
            [left[1], left[0], right[1], right[0]],
        ] {
            let v = vanishing_point(&points);
            assert_eq!(v.z, 0.0);
            assert!(!v.z.is_sign_negative());
        }
    }

    #[test]
    fn level_helper_turns_back_to_front() {
        let points = [
            Point2::new(-0.5, -0.5),
            Point2::new(0.5, -0.5),
            Point2::new(-0.5, 0.5),
            Point2::new(0.5, 0.5),
        ];
        let angles = calculate_angles(&points, 1.0).unwrap();
        assert!(angles.swapped_verticals_and_horizontals);
        assert_relative_eq!(angles.rho.abs(), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(angles.rho_h, -angles.rho, epsilon = 1e-12);
        let net = rotation_z(-angles.alpha)
            * rotate_rho_delta_rho_h(angles.rho, angles.delta, angles.rho_h);
        assert_relative_eq!(net, Rotation3::identity(), epsilon = 1e-12);

        let rotation = rotate_rho_delta(angles.rho, angles.delta);
        let helper = [Point2::new(0.0, -1.0), Point2::new(0.0, 1.0)];
        assert!(is_level(&rotation, helper, 1.0));
        assert!(!is_level(&Rotation3::identity(), helper, 1.0));
    }

    #[test]
    fn sideways_lines_stay_upright() {
        // Vanishing point on the horizon, to the right.
        let v = Point2::new(3.0, 0.0);
        let p0 = Point2::new(-0.4, -0.35);
        let p2 = Point2::new(-0.4, 0.3);
        let points = [p0, p0 + (v - p0) * 0.2, p2, p2 + (v - p2) * 0.2];
        let angles = calculate_angles(&points, 1.0).unwrap();
        let net = rotation_z(-angles.alpha)
            * rotate_rho_delta_rho_h(angles.rho, angles.delta, angles.rho_h);
        // Only the yaw towards the vanishing point is undone, about the vertical axis.
        assert!(net.angle() < FRAC_PI_2);
        let up = net * Vector3::new(0.0, -1.0, 0.0);
        assert_relative_eq!(up, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-9);
        let x_axis = net * Vector3::x();
        assert!(x_axis.x > 0.0);
    }

    #[test]
    fn coinciding_lines_rejected() {
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(
            calculate_angles(&points, 1.0),
            Err(PerspectiveError::DegenerateVanishingPoint)
        );
    }

    #[test]
    fn too_many_points_rejected() {
        let points = [Point2::origin(); 9];
        assert_eq!(
            control_points(&points),
            Err(PerspectiveError::ControlPointCount(9))
        );
        assert_eq!(control_points(&points[..5]).unwrap().len(), 5);
    }
}
