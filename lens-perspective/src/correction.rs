use crate::{
    calculate_angles, control_points, generate_correction_rotation, rotate_rho_delta_rho_h,
    CorrectionAngles, PerspectiveError,
};
use lens_core::{Modifier, NormalizedGeometry};
use lens_geom::central_projection;
use log::debug;
use nalgebra::{Matrix3, Point2, Vector2, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Priority of the perspective correction in the coordinate callback chain.
pub const PERSPECTIVE_CORRECTION_PRIORITY: i32 = 200;

/// Number of floats in the parameter block of [`perspective_correction_callback`].
pub const PARAMETER_BLOCK_LEN: usize = 12;

/// Largest ratio between focal length and depth of the rotated optical axis for which the old
/// image center stays the center of the corrected image.
const MAX_CENTER_MAGNIFICATION: f64 = 10.0;

/// Which point becomes the center of the corrected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum ReferenceCenter {
    /// The optical axis of the original image.
    OldImageCenter,
    /// The center of the control points. Used when the optical axis would end up far outside
    /// the corrected image or behind the camera.
    ControlPointsCenter,
}

/// Everything the per-pixel callback needs, in double precision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PerspectiveParameters {
    /// The solved angles.
    pub angles: CorrectionAngles,
    pub reference: ReferenceCenter,
    /// Backward rotation, from the corrected image into the original, including the roll.
    pub rotation: Matrix3<f64>,
    /// Magnification at the reference center, which the correction compensates.
    pub mapping_scale: f64,
    /// Where the reference center lands in the corrected image.
    pub shift: Vector2<f64>,
}

impl PerspectiveParameters {
    /// Solves a correction for control points given in image coordinates.
    ///
    /// `d` is the strength in `[-1, 1]`: `-1` leaves the image alone, `0` corrects fully and
    /// positive values overcorrect. Values outside the range are clamped.
    pub fn solve(
        geometry: &NormalizedGeometry,
        points: &[Point2<f64>],
        d: f64,
    ) -> Result<Self, PerspectiveError> {
        let f_normalized = geometry.f_normalized;
        if f_normalized.is_nan() || f_normalized <= 0.0 {
            return Err(PerspectiveError::InvalidFocalLength(f_normalized));
        }
        let mut points = control_points(points)?;
        if d.is_nan() {
            return Err(PerspectiveError::InvalidStrength);
        }
        let d = d.clamp(-1.0, 1.0);
        for point in &mut points {
            *point = geometry.normalize(*point).0;
        }

        let angles = calculate_angles(&points, f_normalized)?;
        let CorrectionAngles {
            rho,
            delta,
            rho_h,
            alpha,
            f_normalized,
            ..
        } = angles;
        debug!(
            "perspective angles: rho = {}, delta = {}, rho_h = {}, alpha = {}, f = {}",
            rho, delta, rho_h, alpha, f_normalized
        );

        let axis_depth =
            (rotate_rho_delta_rho_h(rho, delta, rho_h) * Vector3::new(0.0, 0.0, f_normalized)).z;
        let (reference, reference_point) =
            if axis_depth <= 0.0 || f_normalized / axis_depth > MAX_CENTER_MAGNIFICATION {
                (ReferenceCenter::ControlPointsCenter, angles.center)
            } else {
                (ReferenceCenter::OldImageCenter, Point2::origin())
            };
        debug!("reference center {:?} at {}", reference, reference_point);

        let forward = generate_correction_rotation(rho, delta, rho_h, alpha, d);
        let center_coords =
            forward * Vector3::new(reference_point.x, reference_point.y, f_normalized);
        if center_coords.z <= 0.0 {
            return Err(PerspectiveError::CenterBehindCamera(center_coords.z));
        }
        let mapping_scale = f_normalized / center_coords.z;

        let backward = forward.inverse();
        let shift = central_projection(&center_coords, f_normalized).coords;

        Ok(Self {
            angles,
            reference,
            rotation: backward.into_inner(),
            mapping_scale,
            shift,
        })
    }

    /// The focal length the correction works with.
    pub fn f_normalized(&self) -> f64 {
        self.angles.f_normalized
    }

    /// Packs the parameters for [`perspective_correction_callback`].
    ///
    /// The first two columns of the rotation and the shift are premultiplied by the mapping scale
    /// so the callback gets away with one multiplication less per coordinate.
    pub fn to_array(&self) -> [f32; PARAMETER_BLOCK_LEN] {
        let a = &self.rotation;
        let s = self.mapping_scale;
        [
            (a[(0, 0)] * s) as f32,
            (a[(0, 1)] * s) as f32,
            a[(0, 2)] as f32,
            (a[(1, 0)] * s) as f32,
            (a[(1, 1)] * s) as f32,
            a[(1, 2)] as f32,
            (a[(2, 0)] * s) as f32,
            (a[(2, 1)] * s) as f32,
            a[(2, 2)] as f32,
            self.f_normalized() as f32,
            (self.shift.x / s) as f32,
            (self.shift.y / s) as f32,
        ]
    }
}

/// Maps normalized coordinates of the corrected image back into the original image.
///
/// `params` is the block produced by [`PerspectiveParameters::to_array`].
pub fn perspective_correction_callback(params: &[f32], iocoord: &mut [f32]) {
    let &[a00, a01, a02, a10, a11, a12, a20, a21, a22, f, delta_a, delta_b] = params else {
        return;
    };
    for pair in iocoord.chunks_exact_mut(2) {
        let x = pair[0] + delta_a;
        let y = pair[1] + delta_b;
        let z = a20 * x + a21 * y + a22 * f;
        let stretch = f / z;
        pair[0] = (a00 * x + a01 * y + a02 * f) * stretch;
        pair[1] = (a10 * x + a11 * y + a12 * f) * stretch;
    }
}

/// Adds perspective correction to a [`Modifier`].
pub trait PerspectiveCorrection {
    /// Registers a perspective correction for the given control points, in image coordinates.
    ///
    /// See [`PerspectiveParameters::solve`] for the meaning of `d`. On error the modifier is left
    /// unchanged.
    fn enable_perspective_correction(
        &mut self,
        points: &[Point2<f64>],
        d: f64,
    ) -> Result<(), PerspectiveError>;
}

impl PerspectiveCorrection for Modifier {
    fn enable_perspective_correction(
        &mut self,
        points: &[Point2<f64>],
        d: f64,
    ) -> Result<(), PerspectiveError> {
        let parameters = PerspectiveParameters::solve(self.geometry(), points, d)?;
        self.add_coord_callback(
            perspective_correction_callback,
            PERSPECTIVE_CORRECTION_PRIORITY,
            &parameters.to_array(),
        );
        Ok(())
    }
}
