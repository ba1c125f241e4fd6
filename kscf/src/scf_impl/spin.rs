//! Spin layouts of the Kohn-Sham matrices.
//!
//! The driver is generic over [`SpinLayout`]; everything that depends on how
//! spin is stored (matrix dimension, electrons per orbital, how Mulliken
//! populations are read off the density and how the site potentials enter the
//! Fock matrix) lives here.

use crate::hamiltonian::SpinTreatment;
use crate::linalg::{block_diag, c64, diag_of_product, scale, CMatrix};
use nalgebra::DVector;

pub trait SpinLayout: Send + Sync + 'static {
    const NAME: &'static str;
    const TREATMENT: SpinTreatment;
    /// Electrons per occupied orbital.
    const OCCUPANCY: f64;

    /// Mulliken populations `(q_alpha, q_beta)` per AO, k-point averaged.
    fn populations(
        density: &[CMatrix],
        overlap: &[CMatrix],
        weights: &[f64],
        nao: usize,
    ) -> (DVector<f64>, DVector<f64>);

    /// `F = h + 1/2 (v_a + v_b) S_ab`, per spin block.
    fn fock(
        hcore: &CMatrix,
        overlap: &CMatrix,
        v_alpha: &DVector<f64>,
        v_beta: &DVector<f64>,
    ) -> CMatrix;

    /// Diagonal density reproducing the given per-AO populations.
    fn density_from_populations(populations: &DVector<f64>, diag_overlap: &DVector<f64>) -> CMatrix;
}

/// KRKS: one spatial density per k-point, two electrons per orbital.
#[derive(Debug, Clone, Copy, Default)]
pub struct Restricted;

/// KGKS: one `2n x 2n` spinor density per k-point, one electron per orbital.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generalized;

/// `P_ab = 1/2 (v_a + v_b) S_ab`
fn site_potential(v: &DVector<f64>, overlap: &CMatrix) -> CMatrix {
    CMatrix::from_fn(overlap.nrows(), overlap.ncols(), |a, b| {
        overlap[(a, b)] * (0.5 * (v[a] + v[b]))
    })
}

fn weighted_mulliken(blocks: impl Iterator<Item = (CMatrix, f64)>, overlap: &[CMatrix], nao: usize) -> DVector<f64> {
    let mut q = DVector::zeros(nao);
    for ((d, w), s) in blocks.zip(overlap) {
        let diag = diag_of_product(&d, s);
        for a in 0..nao {
            q[a] += w * diag[a].re;
        }
    }
    q
}

fn diagonal_density(populations: &DVector<f64>, diag_overlap: &DVector<f64>) -> CMatrix {
    let values = populations.zip_map(diag_overlap, |q, s| c64::new(q / s, 0.0));
    CMatrix::from_diagonal(&values)
}

impl SpinLayout for Restricted {
    const NAME: &'static str = "KRKS";
    const TREATMENT: SpinTreatment = SpinTreatment::Restricted;
    const OCCUPANCY: f64 = 2.0;

    fn populations(
        density: &[CMatrix],
        overlap: &[CMatrix],
        weights: &[f64],
        nao: usize,
    ) -> (DVector<f64>, DVector<f64>) {
        let blocks = density.iter().cloned().zip(weights.iter().copied());
        let half = weighted_mulliken(blocks, overlap, nao) * 0.5;
        (half.clone(), half)
    }

    fn fock(
        hcore: &CMatrix,
        overlap: &CMatrix,
        v_alpha: &DVector<f64>,
        v_beta: &DVector<f64>,
    ) -> CMatrix {
        let v = (v_alpha + v_beta) * 0.5;
        hcore + site_potential(&v, overlap)
    }

    fn density_from_populations(populations: &DVector<f64>, diag_overlap: &DVector<f64>) -> CMatrix {
        diagonal_density(populations, diag_overlap)
    }
}

impl SpinLayout for Generalized {
    const NAME: &'static str = "KGKS";
    const TREATMENT: SpinTreatment = SpinTreatment::Generalized;
    const OCCUPANCY: f64 = 1.0;

    fn populations(
        density: &[CMatrix],
        overlap: &[CMatrix],
        weights: &[f64],
        nao: usize,
    ) -> (DVector<f64>, DVector<f64>) {
        // the spinor overlap is block diagonal, so only the diagonal spin
        // blocks of D contribute
        let block = |offset: usize| {
            density
                .iter()
                .map(move |d| d.view((offset, offset), (nao, nao)).clone_owned())
                .zip(weights.iter().copied())
        };
        let spatial: Vec<CMatrix> = overlap
            .iter()
            .map(|s| s.view((0, 0), (nao, nao)).clone_owned())
            .collect();
        (
            weighted_mulliken(block(0), &spatial, nao),
            weighted_mulliken(block(nao), &spatial, nao),
        )
    }

    fn fock(
        hcore: &CMatrix,
        overlap: &CMatrix,
        v_alpha: &DVector<f64>,
        v_beta: &DVector<f64>,
    ) -> CMatrix {
        let nao = v_alpha.len();
        let s = overlap.view((0, 0), (nao, nao)).clone_owned();
        hcore + block_diag(&site_potential(v_alpha, &s), &site_potential(v_beta, &s))
    }

    fn density_from_populations(populations: &DVector<f64>, diag_overlap: &DVector<f64>) -> CMatrix {
        let d = scale(&diagonal_density(populations, diag_overlap), 0.5);
        block_diag(&d, &d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::real_trace_product;

    fn overlap() -> CMatrix {
        let mut s = CMatrix::identity(2, 2);
        s[(0, 1)] = c64::new(0.3, 0.1);
        s[(1, 0)] = c64::new(0.3, -0.1);
        s
    }

    #[test]
    fn test_generalized_matches_restricted_for_spin_symmetric_density() {
        let s = overlap();
        let mut d = CMatrix::zeros(2, 2);
        d[(0, 0)] = c64::new(1.2, 0.0);
        d[(1, 1)] = c64::new(0.6, 0.0);
        d[(0, 1)] = c64::new(0.2, 0.05);
        d[(1, 0)] = c64::new(0.2, -0.05);

        let (ra, rb) = Restricted::populations(&[d.clone()], &[s.clone()], &[1.0], 2);
        let d4 = block_diag(&scale(&d, 0.5), &scale(&d, 0.5));
        let s4 = block_diag(&s, &s);
        let (ga, gb) = Generalized::populations(&[d4.clone()], &[s4.clone()], &[1.0], 2);
        assert!((&ra - &ga).norm() < 1e-14);
        assert!((&rb - &gb).norm() < 1e-14);

        // populations add up to tr(D S)
        let total = ra.sum() + rb.sum();
        assert!((total - real_trace_product(&d, &s)).abs() < 1e-14);

        let h = CMatrix::identity(2, 2);
        let v = DVector::from_vec(vec![0.4, -0.2]);
        let fr = Restricted::fock(&h, &s, &v, &v);
        let fg = Generalized::fock(&block_diag(&h, &h), &s4, &v, &v);
        assert!((fg - block_diag(&fr, &fr)).norm() < 1e-14);
    }

    #[test]
    fn test_guess_density_population() {
        let q = DVector::from_vec(vec![1.5, 0.5]);
        let diag = DVector::from_vec(vec![1.0, 0.8]);
        let d = Restricted::density_from_populations(&q, &diag);
        assert!((d[(1, 1)].re - 0.625).abs() < 1e-14);
        let g = Generalized::density_from_populations(&q, &diag);
        assert_eq!(g.shape(), (4, 4));
        assert!((g.trace().re - d.trace().re).abs() < 1e-14);
    }
}
