use log::warn;
use nalgebra::{SMatrix, SVector};

/// Finds the right-singular vector of `matrix` that belongs to its smallest singular value.
///
/// For a matrix with a one-dimensional null space this is the null vector, which is what the
/// conic fit needs. The decomposition is a one-sided Jacobi SVD (Nash, "A one-sided
/// transformation method for the singular value decomposition and algebraic eigenproblem",
/// 1975) that orthogonalizes the columns of `matrix` pairwise while accumulating the
/// rotations in a `C`x`C` basis. The columns end up sorted by decreasing norm, so the last
/// basis column is the result.
///
/// The routine is meant for a handful of columns. All storage is on the stack. Should it fail
/// to converge, a warning is logged and the best estimate so far is returned.
///
/// # Panics
///
/// Panics if `matrix` has more rows than columns.
///
/// ```
/// use lens_geom::svd;
/// use lens_geom::nalgebra::{Matrix2x3, Vector3};
/// // The null space of these two rows is spanned by (1, 1, -1).
/// let matrix = Matrix2x3::new(
///     1.0, 0.0, 1.0,
///     0.0, 1.0, 1.0,
/// );
/// let v = svd(&matrix);
/// let expected = Vector3::new(1.0, 1.0, -1.0).normalize();
/// assert!((v.dot(&expected).abs() - 1.0).abs() < 1e-12);
/// assert!((matrix * v).norm() < 1e-12);
/// ```
pub fn svd<const R: usize, const C: usize>(matrix: &SMatrix<f64, R, C>) -> SVector<f64, C> {
    assert!(
        R <= C,
        "svd expects at most as many rows as columns, got {}x{}",
        R,
        C
    );
    let n = C;
    let epsilon = 10.0 * f64::EPSILON;
    let e2 = 10.0 * n as f64 * epsilon * epsilon;
    let threshold = 0.1 * epsilon;
    let max_cycles = if n < 120 { 30 } else { n / 4 };

    // The input padded to a square with zero rows. The padding rows keep the column norms.
    let mut upper = SMatrix::<f64, C, C>::zeros();
    for i in 0..R {
        for j in 0..C {
            upper[(i, j)] = matrix[(i, j)];
        }
    }
    let mut basis = SMatrix::<f64, C, C>::identity();
    let mut s2 = [0.0f64; C];

    let mut estimated_column_rank = n;
    let mut converged = false;
    for _ in 0..=max_cycles {
        let mut counter = estimated_column_rank * estimated_column_rank.saturating_sub(1) / 2;
        for j in 0..estimated_column_rank.saturating_sub(1) {
            for k in j + 1..estimated_column_rank {
                let pair = JacobiPair {
                    j,
                    k,
                    e2,
                    threshold,
                };
                if pair.orthogonalize(&mut upper, &mut basis, &mut s2) {
                    counter -= 1;
                }
            }
        }
        while estimated_column_rank > 2
            && s2[estimated_column_rank - 1] <= s2[0] * threshold + threshold * threshold
        {
            estimated_column_rank -= 1;
        }
        if counter == 0 {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(
            "SVD: iterations did not converge within {} sweeps for a {}x{} matrix",
            max_cycles + 1,
            R,
            C
        );
    }

    // Columns dropped from the sweeps stop being rotated, so the last one is no longer
    // orthogonal to the others to working precision. One more pass against every column fixes it.
    if estimated_column_rank < n {
        for j in 0..n - 1 {
            let pair = JacobiPair {
                j,
                k: n - 1,
                e2,
                threshold,
            };
            pair.orthogonalize(&mut upper, &mut basis, &mut s2);
        }
    }

    basis.column(n - 1).into_owned()
}

struct JacobiPair {
    j: usize,
    k: usize,
    e2: f64,
    threshold: f64,
}

impl JacobiPair {
    /// Rotates columns `j` and `k` so they become orthogonal with the larger one first.
    ///
    /// Returns `true` if the pair already was orthogonal and nothing was rotated.
    fn orthogonalize<const C: usize>(
        &self,
        upper: &mut SMatrix<f64, C, C>,
        basis: &mut SMatrix<f64, C, C>,
        s2: &mut [f64; C],
    ) -> bool {
        let Self { j, k, e2, threshold } = *self;
        let (mut p, mut q, mut r) = (0.0, 0.0, 0.0);
        for i in 0..C {
            let x0 = upper[(i, j)];
            let y0 = upper[(i, k)];
            p += x0 * y0;
            q += x0 * x0;
            r += y0 * y0;
        }
        s2[j] = q;
        s2[k] = r;
        let (c0, s0) = if q >= r {
            if q <= e2 * s2[0] || p.abs() <= threshold * q {
                return true;
            }
            p /= q;
            r = 1.0 - r / q;
            let vt = (4.0 * p * p + r * r).sqrt();
            let c0 = (0.5 * (1.0 + r / vt)).sqrt();
            (c0, p / (vt * c0))
        } else {
            p /= r;
            q = q / r - 1.0;
            let vt = (4.0 * p * p + q * q).sqrt();
            let mut s0 = (0.5 * (1.0 - q / vt)).sqrt();
            if p < 0.0 {
                s0 = -s0;
            }
            (p / (vt * s0), s0)
        };
        rotate_columns(upper, j, k, c0, s0);
        rotate_columns(basis, j, k, c0, s0);
        false
    }
}

/// Applies the plane rotation `(c, s)` to columns `j` and `k`.
#[inline]
fn rotate_columns<const C: usize>(m: &mut SMatrix<f64, C, C>, j: usize, k: usize, c: f64, s: f64) {
    for i in 0..C {
        let d1 = m[(i, j)];
        let d2 = m[(i, k)];
        m[(i, j)] = d1 * c + d2 * s;
        m[(i, k)] = -d1 * s + d2 * c;
    }
}
