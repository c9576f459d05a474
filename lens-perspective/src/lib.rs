//! Perspective correction for the lens [`Modifier`](lens_core::Modifier).
//!
//! A handful of control points marks lines that should be vertical or horizontal, or an ellipse
//! that should be a circle. From those this crate finds the vanishing point, solves the rotation
//! of the virtual camera that rectifies it and registers a coordinate callback which maps every
//! pixel of the corrected image back into the original.
//!
//! ```
//! use lens_core::{Modifier, NormalizedGeometry};
//! use lens_perspective::{nalgebra::Point2, PerspectiveCorrection};
//!
//! let mut modifier = Modifier::with_geometry(NormalizedGeometry::identity(), 2, 2);
//! // Two verticals leaning towards each other at the top.
//! let points = [
//!     Point2::new(-0.5, 0.5),
//!     Point2::new(-0.45, -0.5),
//!     Point2::new(0.5, 0.5),
//!     Point2::new(0.45, -0.5),
//! ];
//! modifier.enable_perspective_correction(&points, 0.0).unwrap();
//! assert!(modifier.has_coord_callbacks());
//! ```
//!
//! The number of control points selects the [`ControlPointMode`]. The strength `d` scales the
//! correction between none (`-1`), exact (`0`) and damped overcorrection (`1`).

mod angles;
mod correction;
mod error;
mod rotation;

pub use angles::*;
pub use correction::*;
pub use error::*;
pub use rotation::*;
pub use nalgebra;
