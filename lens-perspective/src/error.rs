use thiserror::Error;

/// Reasons why a perspective correction cannot be set up.
///
/// When any of these is returned, nothing has been registered on the modifier.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PerspectiveError {
    #[error("normalized focal length must be positive, got {0}")]
    InvalidFocalLength(f64),
    #[error("perspective correction needs 4 to 8 control points, got {0}")]
    ControlPointCount(usize),
    #[error("correction strength is NaN")]
    InvalidStrength,
    #[error("control lines do not determine a vanishing point")]
    DegenerateVanishingPoint,
    #[error("control points do not lie on an ellipse")]
    DegenerateConic,
    #[error("reference center ends up behind the camera (z = {0})")]
    CenterBehindCamera(f64),
}
