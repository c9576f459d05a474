use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::Point2;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Diagonal of a full-frame 36x24 mm sensor.
const FULL_FRAME_DIAGONAL: f64 = 43.266_615_305_567_87;

/// A point in normalized image coordinates.
///
/// The optical axis is at the origin and one unit is half of the shorter image side.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedPoint(pub Point2<f64>);

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self(Point2::new(x, y))
    }
}

/// Describes how image coordinates map into normalized coordinates.
///
/// A pixel `(x, y)` becomes `(x * norm_scale - center_x, y * norm_scale - center_y)`.
/// The focal length is stored in the same normalized units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedGeometry {
    pub f_normalized: f64,
    pub norm_scale: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl NormalizedGeometry {
    /// Geometry in which image coordinates already are normalized coordinates
    /// and the focal length is one unit.
    pub fn identity() -> Self {
        Self {
            f_normalized: 1.0,
            norm_scale: 1.0,
            center_x: 0.0,
            center_y: 0.0,
        }
    }

    /// Derives the geometry of an image of `width`x`height` pixels taken with a lens of
    /// `focal_length` millimeters on a sensor with the given `crop_factor`.
    ///
    /// The optical axis is assumed to pass through the middle of the image.
    ///
    /// ```
    /// use lens_core::NormalizedGeometry;
    /// // A 3:2 full-frame image: the short sensor side is 24 mm, so one unit is 12 mm.
    /// let geometry = NormalizedGeometry::from_camera(24.0, 1.0, 6000, 4000);
    /// assert!((geometry.f_normalized - 2.0).abs() < 1e-9);
    /// assert!((geometry.norm_scale - 2.0 / 4000.0).abs() < 1e-12);
    /// ```
    pub fn from_camera(focal_length: f64, crop_factor: f64, width: usize, height: usize) -> Self {
        let (width, height) = (width as f64, height as f64);
        let size = width.min(height);
        let aspect_ratio = width.max(height) / size;
        let normalized_in_millimeters = FULL_FRAME_DIAGONAL
            / 2.0
            / (aspect_ratio * aspect_ratio + 1.0).sqrt()
            / crop_factor;
        Self {
            f_normalized: focal_length / normalized_in_millimeters,
            norm_scale: 2.0 / size,
            center_x: width / size,
            center_y: height / size,
        }
    }

    #[must_use]
    pub fn f_normalized(self, f_normalized: f64) -> Self {
        Self {
            f_normalized,
            ..self
        }
    }

    #[must_use]
    pub fn norm_scale(self, norm_scale: f64) -> Self {
        Self { norm_scale, ..self }
    }

    #[must_use]
    pub fn center(self, center_x: f64, center_y: f64) -> Self {
        Self {
            center_x,
            center_y,
            ..self
        }
    }

    /// Maps a point from image coordinates into normalized coordinates.
    pub fn normalize(&self, point: Point2<f64>) -> NormalizedPoint {
        NormalizedPoint::new(
            point.x * self.norm_scale - self.center_x,
            point.y * self.norm_scale - self.center_y,
        )
    }

    /// Maps a point from normalized coordinates back into image coordinates.
    pub fn denormalize(&self, point: NormalizedPoint) -> Point2<f64> {
        Point2::new(
            (point.x + self.center_x) / self.norm_scale,
            (point.y + self.center_y) / self.norm_scale,
        )
    }
}

impl Default for NormalizedGeometry {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn image_center_is_origin() {
        let geometry = NormalizedGeometry::from_camera(50.0, 1.5, 3000, 2000);
        let center = geometry.normalize(Point2::new(1500.0, 1000.0));
        assert_relative_eq!(center.0, Point2::origin(), epsilon = 1e-12);
        let corner = geometry.normalize(Point2::new(1500.0, 0.0));
        assert_relative_eq!(corner.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn normalize_denormalize() {
        let geometry = NormalizedGeometry::identity()
            .norm_scale(0.002)
            .center(1.25, 0.75);
        let pixel = Point2::new(417.0, 1203.5);
        let back = geometry.denormalize(geometry.normalize(pixel));
        assert_relative_eq!(back, pixel, epsilon = 1e-9);
    }

    #[test]
    fn crop_factor_lengthens_focal() {
        let full_frame = NormalizedGeometry::from_camera(35.0, 1.0, 4000, 3000);
        let cropped = NormalizedGeometry::from_camera(35.0, 2.0, 4000, 3000);
        assert_relative_eq!(cropped.f_normalized, 2.0 * full_frame.f_normalized, epsilon = 1e-12);
    }
}
