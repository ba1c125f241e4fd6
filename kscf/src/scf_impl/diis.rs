use crate::linalg::CMatrix;
use nalgebra::{DMatrix, DVector};
use std::collections::VecDeque;
use tracing::debug;

/// DIIS (Direct Inversion in the Iterative Subspace) convergence accelerator
/// over k-point sampled Fock matrices.
///
/// # Algorithm
///
/// The error of step `i` is the commutator `e_i^k = F_k D_k S_k - S_k D_k F_k`
/// at every k-point; the error vector of a step stacks all k-points.
///
/// The extrapolated Fock matrices are `F^k = sum_i c_i F_i^k` with `c`
/// minimizing `||sum_i c_i e_i||^2` subject to `sum_i c_i = 1`.
#[derive(Clone, Debug)]
pub struct DIIS {
    error_matrices: VecDeque<Vec<CMatrix>>,
    fock_matrices: VecDeque<Vec<CMatrix>>,
    max_subspace_size: usize,
}

impl DIIS {
    /// Create a new DIIS accelerator keeping at most `max_subspace_size` steps.
    pub fn new(max_subspace_size: usize) -> Self {
        DIIS {
            error_matrices: VecDeque::new(),
            fock_matrices: VecDeque::new(),
            max_subspace_size,
        }
    }

    /// DIIS error matrix `FDS - SDF` of one k-point.
    pub fn calculate_error_matrix(fock: &CMatrix, density: &CMatrix, overlap: &CMatrix) -> CMatrix {
        let fds = fock * density * overlap;
        let sdf = overlap * density * fock;
        fds - sdf
    }

    /// Push a step; the oldest one is dropped once the window is full.
    pub fn update(&mut self, fock: Vec<CMatrix>, density: &[CMatrix], overlap: &[CMatrix]) {
        let errors: Vec<CMatrix> = fock
            .iter()
            .zip(density)
            .zip(overlap)
            .map(|((f, d), s)| Self::calculate_error_matrix(f, d, s))
            .collect();

        if self.error_matrices.len() >= self.max_subspace_size {
            self.error_matrices.pop_front();
            self.fock_matrices.pop_front();
        }
        self.error_matrices.push_back(errors);
        self.fock_matrices.push_back(fock);
    }

    /// Norm of the newest stacked error vector.
    pub fn last_error_norm(&self) -> Option<f64> {
        self.error_matrices
            .back()
            .map(|errors| errors.iter().map(|e| e.norm_squared()).sum::<f64>().sqrt())
    }

    fn overlap_of(&self, i: usize, j: usize) -> f64 {
        self.error_matrices[i]
            .iter()
            .zip(&self.error_matrices[j])
            .map(|(a, b)| a.dotc(b).re)
            .sum()
    }

    /// Solve the bordered DIIS equations and return the mixed Fock matrices.
    ///
    /// Returns None with fewer than two stored steps or when the B matrix is
    /// singular; the caller then keeps the unmixed Fock matrices.
    pub fn extrapolate(&self) -> Option<Vec<CMatrix>> {
        let n = self.error_matrices.len();
        if n < 2 {
            return None;
        }

        // B_ij = <e_i|e_j>, bordered by the constraint sum_i c_i = 1
        let mut b = DMatrix::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..=i {
                let value = self.overlap_of(i, j);
                b[(i, j)] = value;
                b[(j, i)] = value;
            }
            b[(i, n)] = -1.0;
            b[(n, i)] = -1.0;
        }

        // rescaling B leaves the coefficients unchanged but keeps LU well scaled
        // when the errors become tiny near convergence
        let scale = (0..n).map(|i| b[(i, i)]).fold(0.0_f64, f64::max);
        if scale <= 0.0 {
            return None;
        }
        b.view_mut((0, 0), (n, n)).scale_mut(1.0 / scale);

        let mut rhs = DVector::zeros(n + 1);
        rhs[n] = -1.0;

        let coeffs = match b.lu().solve(&rhs) {
            Some(x) if x.iter().all(|c: &f64| c.is_finite()) => x,
            _ => {
                debug!("DIIS extrapolation failed: singular B matrix");
                return None;
            }
        };

        let nk = self.fock_matrices[0].len();
        let mixed = (0..nk)
            .map(|k| {
                let shape = self.fock_matrices[0][k].shape();
                let mut f = CMatrix::zeros(shape.0, shape.1);
                for (i, focks) in self.fock_matrices.iter().enumerate() {
                    f += focks[k].map(|z| z * coeffs[i]);
                }
                f
            })
            .collect();

        debug!("DIIS extrapolation with {} vectors", n);
        Some(mixed)
    }

    /// Clear the DIIS history
    pub fn reset(&mut self) {
        self.error_matrices.clear();
        self.fock_matrices.clear();
    }

    /// Number of steps currently in the subspace
    pub fn size(&self) -> usize {
        self.error_matrices.len()
    }
}
