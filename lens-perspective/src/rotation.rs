use core::f64::consts::PI;
use nalgebra::{Rotation3, UnitQuaternion, Vector3};

/// How hard large positive strengths are compressed.
const COMPRESSION: f64 = 10.0;

/// Largest rotation angle a correction may reach. Turning the camera much further would put
/// parts of the image behind it.
pub const MAX_ROTATION_ANGLE: f64 = 0.9 * PI;

/// Factor by which a correction strength `d` scales the rotation angle.
///
/// `d = -1` switches the correction off, `d = 0` applies it exactly and positive values
/// overcorrect with logarithmic damping:
///
/// ```text
/// k(d) = d + 1                    for d ≤ 0
/// k(d) = 1 + ln(10 d + 1) / 10    for d > 0
/// ```
pub fn strength_factor(d: f64) -> f64 {
    if d <= 0.0 {
        d + 1.0
    } else {
        1.0 + (COMPRESSION * d + 1.0).ln() / COMPRESSION
    }
}

/// Rotation angle `theta` scaled by [`strength_factor`] and clamped to [`MAX_ROTATION_ANGLE`].
pub fn effective_rotation_angle(theta: f64, d: f64) -> f64 {
    (theta * strength_factor(d)).clamp(-MAX_ROTATION_ANGLE, MAX_ROTATION_ANGLE)
}

fn yaw_pitch_yaw(rho_1: f64, delta: f64, rho_2: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rho_2)
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), delta)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rho_1)
}

/// Scales the angle of `rotation` by the strength `d`, keeping its axis.
fn apply_strength(rotation: UnitQuaternion<f64>, d: f64) -> Rotation3<f64> {
    match rotation.axis_angle() {
        Some((axis, theta)) => {
            UnitQuaternion::from_axis_angle(&axis, effective_rotation_angle(theta, d))
                .to_rotation_matrix()
        }
        None => Rotation3::identity(),
    }
}

/// Builds `R_y(ρ₂) · Rₓ(δ) · R_y(ρ₁)` with its rotation angle adjusted by the strength `d`.
///
/// The three rotations are composed as quaternions, so that the strength can act on the
/// angle of the combined rotation while its axis stays fixed.
///
/// ```
/// use lens_perspective::generate_rotation_matrix;
/// use lens_perspective::nalgebra::Vector3;
/// // A pure pitch, half applied.
/// let half = generate_rotation_matrix(0.0, 0.4, 0.0, -0.5);
/// assert!((half.angle() - 0.2).abs() < 1e-12);
/// assert!((half.axis().unwrap().into_inner() - Vector3::x()).norm() < 1e-12);
/// ```
pub fn generate_rotation_matrix(rho_1: f64, delta: f64, rho_2: f64, d: f64) -> Rotation3<f64> {
    apply_strength(yaw_pitch_yaw(rho_1, delta, rho_2), d)
}

/// The whole correction `R_z(-α) · R_y(ρₕ) · Rₓ(δ) · R_y(ρ)`, from the original image into the
/// corrected one, with its rotation angle adjusted by the strength `d`.
///
/// The roll is part of the scaled rotation, so `d = -1` always gives the identity even when the
/// yaws and the roll cancel out only together.
pub fn generate_correction_rotation(
    rho: f64,
    delta: f64,
    rho_h: f64,
    alpha: f64,
    d: f64,
) -> Rotation3<f64> {
    let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -alpha);
    apply_strength(roll * yaw_pitch_yaw(rho, delta, rho_h), d)
}
