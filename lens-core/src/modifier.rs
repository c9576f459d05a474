use crate::NormalizedGeometry;
use log::trace;
use nalgebra::Point2;

/// Signature of a coordinate callback.
///
/// `params` is the parameter block the callback was registered with and `iocoord` holds
/// interleaved `(x, y)` pairs of normalized coordinates which are rewritten in place.
pub type CoordCallbackFn = fn(params: &[f32], iocoord: &mut [f32]);

/// One stage of the coordinate pipeline of a [`Modifier`].
#[derive(Clone, Debug)]
pub struct CoordCallback {
    callback: CoordCallbackFn,
    priority: i32,
    params: Vec<f32>,
}

impl CoordCallback {
    pub fn new(callback: CoordCallbackFn, priority: i32, params: &[f32]) -> Self {
        Self {
            callback,
            priority,
            params: params.to_vec(),
        }
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The copy of the parameter block taken at registration.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Runs the callback over interleaved `(x, y)` pairs.
    pub fn apply(&self, iocoord: &mut [f32]) {
        (self.callback)(&self.params, iocoord);
    }
}

/// An image modifier for a single image size and lens setting.
///
/// The modifier captures the [`NormalizedGeometry`] of the image and collects the coordinate
/// callbacks that corrections register on it. Once configured, [`Modifier::apply_geometry_distortion`]
/// tells for every pixel of the corrected image where it has to be sampled in the original.
#[derive(Clone, Debug)]
pub struct Modifier {
    geometry: NormalizedGeometry,
    width: usize,
    height: usize,
    coord_callbacks: Vec<CoordCallback>,
}

impl Modifier {
    /// Creates a modifier for an image of `width`x`height` pixels taken at `focal_length`
    /// millimeters with a camera of the given `crop_factor`.
    pub fn new(focal_length: f64, crop_factor: f64, width: usize, height: usize) -> Self {
        Self::with_geometry(
            NormalizedGeometry::from_camera(focal_length, crop_factor, width, height),
            width,
            height,
        )
    }

    /// Creates a modifier from an explicit normalized geometry.
    pub fn with_geometry(geometry: NormalizedGeometry, width: usize, height: usize) -> Self {
        Self {
            geometry,
            width,
            height,
            coord_callbacks: Vec::new(),
        }
    }

    pub fn geometry(&self) -> &NormalizedGeometry {
        &self.geometry
    }

    pub fn f_normalized(&self) -> f64 {
        self.geometry.f_normalized
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Registers a coordinate callback.
    ///
    /// The parameter block is copied. Callbacks run in ascending order of `priority`;
    /// callbacks of equal priority run in the order they were added.
    pub fn add_coord_callback(&mut self, callback: CoordCallbackFn, priority: i32, params: &[f32]) {
        let index = self
            .coord_callbacks
            .partition_point(|existing| existing.priority <= priority);
        trace!(
            "registering coordinate callback with priority {} and {} parameters at position {}",
            priority,
            params.len(),
            index
        );
        self.coord_callbacks
            .insert(index, CoordCallback::new(callback, priority, params));
    }

    pub fn coord_callbacks(&self) -> &[CoordCallback] {
        &self.coord_callbacks
    }

    pub fn has_coord_callbacks(&self) -> bool {
        !self.coord_callbacks.is_empty()
    }

    /// Runs the whole callback chain over interleaved normalized `(x, y)` pairs.
    pub fn apply_coord_callbacks(&self, iocoord: &mut [f32]) {
        for callback in &self.coord_callbacks {
            callback.apply(iocoord);
        }
    }

    /// Computes source pixel coordinates for the `width`x`height` rectangle of the corrected
    /// image whose top left pixel is `(xu, yu)`.
    ///
    /// `res` receives `width * height` interleaved `(x, y)` pairs in row-major order.
    /// Returns `false` and leaves `res` untouched when no callback is registered or `res`
    /// is too small.
    ///
    /// ```
    /// use lens_core::{Modifier, NormalizedGeometry};
    ///
    /// fn shift_right(params: &[f32], iocoord: &mut [f32]) {
    ///     for pair in iocoord.chunks_exact_mut(2) {
    ///         pair[0] += params[0];
    ///     }
    /// }
    ///
    /// let geometry = NormalizedGeometry::identity().norm_scale(0.5).center(1.0, 1.0);
    /// let mut modifier = Modifier::with_geometry(geometry, 4, 4);
    /// modifier.add_coord_callback(shift_right, 100, &[0.5]);
    /// let mut res = [0.0f32; 4];
    /// assert!(modifier.apply_geometry_distortion(1.0, 2.0, 2, 1, &mut res));
    /// // Half a normalized unit is one pixel at this scale.
    /// assert_eq!(res, [2.0, 2.0, 3.0, 2.0]);
    /// ```
    pub fn apply_geometry_distortion(
        &self,
        xu: f64,
        yu: f64,
        width: usize,
        height: usize,
        res: &mut [f32],
    ) -> bool {
        let row_len = 2 * width;
        if self.coord_callbacks.is_empty() || res.len() < row_len * height {
            return false;
        }
        if row_len == 0 {
            return true;
        }
        for (row, coords) in res.chunks_exact_mut(row_len).take(height).enumerate() {
            let y = yu + row as f64;
            for (column, pair) in coords.chunks_exact_mut(2).enumerate() {
                let normalized = self
                    .geometry
                    .normalize(Point2::new(xu + column as f64, y));
                pair[0] = normalized.x as f32;
                pair[1] = normalized.y as f32;
            }
            self.apply_coord_callbacks(coords);
            let norm_scale = self.geometry.norm_scale as f32;
            let center_x = self.geometry.center_x as f32;
            let center_y = self.geometry.center_y as f32;
            for pair in coords.chunks_exact_mut(2) {
                pair[0] = (pair[0] + center_x) / norm_scale;
                pair[1] = (pair[1] + center_y) / norm_scale;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(params: &[f32], iocoord: &mut [f32]) {
        for value in iocoord.iter_mut() {
            *value *= params[0];
        }
    }

    fn offset(params: &[f32], iocoord: &mut [f32]) {
        for value in iocoord.iter_mut() {
            *value += params[0];
        }
    }

    #[test]
    fn callbacks_sorted_by_priority() {
        let mut modifier = Modifier::with_geometry(NormalizedGeometry::identity(), 8, 8);
        modifier.add_coord_callback(offset, 300, &[1.0]);
        modifier.add_coord_callback(scale, 100, &[2.0]);
        modifier.add_coord_callback(offset, 300, &[3.0]);
        let priorities: Vec<i32> = modifier
            .coord_callbacks()
            .iter()
            .map(CoordCallback::priority)
            .collect();
        assert_eq!(priorities, [100, 300, 300]);
        assert_eq!(modifier.coord_callbacks()[1].params(), &[1.0]);
        assert_eq!(modifier.coord_callbacks()[2].params(), &[3.0]);

        // (x * 2 + 1) + 3
        let mut coords = [1.0, -1.0];
        modifier.apply_coord_callbacks(&mut coords);
        assert_eq!(coords, [6.0, 2.0]);
    }

    #[test]
    fn params_are_copied() {
        let mut modifier = Modifier::with_geometry(NormalizedGeometry::identity(), 8, 8);
        let mut params = vec![2.0];
        modifier.add_coord_callback(scale, 200, &params);
        params[0] = 5.0;
        assert_eq!(modifier.coord_callbacks()[0].params(), &[2.0]);
    }

    #[test]
    fn geometry_distortion_without_callbacks() {
        let modifier = Modifier::new(50.0, 1.0, 30, 20);
        let mut res = [7.0f32; 12];
        assert!(!modifier.apply_geometry_distortion(0.0, 0.0, 3, 2, &mut res));
        assert_eq!(res, [7.0; 12]);
    }

    #[test]
    fn geometry_distortion_buffer_too_small() {
        let mut modifier = Modifier::new(50.0, 1.0, 30, 20);
        modifier.add_coord_callback(scale, 100, &[1.0]);
        let mut res = [0.0f32; 10];
        assert!(!modifier.apply_geometry_distortion(0.0, 0.0, 3, 2, &mut res));
    }

    #[test]
    fn geometry_distortion_identity_chain() {
        let mut modifier = Modifier::new(50.0, 1.0, 30, 20);
        modifier.add_coord_callback(scale, 100, &[1.0]);
        let mut res = [0.0f32; 12];
        assert!(modifier.apply_geometry_distortion(4.0, 7.0, 3, 2, &mut res));
        let expected = [4.0, 7.0, 5.0, 7.0, 6.0, 7.0, 4.0, 8.0, 5.0, 8.0, 6.0, 8.0];
        for (actual, expected) in res.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-4, "{} != {}", actual, expected);
        }
    }
}
