//! This crate contains the small numerical kernels that lens corrections are built from.
//!
//! Everything here works on fixed-size `nalgebra` types and never allocates:
//!
//! * [`normalize`], [`central_projection`] and [`intersection`] are the pinhole and line primitives.
//! * [`rotation_x`], [`rotation_y`], [`rotation_z`] are the elementary rotations all angles refer to.
//! * [`svd`] is a one-sided Jacobi SVD for matrices of at most a handful of columns, used to find
//!   null vectors.
//! * [`Conic`] and [`ellipse_analysis`] fit a conic through five points and recover the vanishing
//!   point belonging to an ellipse.
//!
//! Coordinates are normalized image coordinates: X right, Y down, Z along the optical axis.

mod conic;
mod primitives;
mod svd;

pub use conic::*;
pub use primitives::*;
pub use svd::*;
pub use nalgebra;
