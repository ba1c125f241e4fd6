//! Lattice-summed one-electron integrals over contracted Cartesian Gaussians.
//!
//! Every k-point matrix is the Bloch sum `M_k(a, b) = sum_L exp(i k.L) <a(r)|O|b(r - L)>`
//! over lattice translations `L`, truncated where primitive products fall
//! below the cell precision.

use crate::cell::{Cell, PlacedShell};
use crate::gto::{product_prefactor, PairElements, PairTables};
use crate::kpts::KPoints;
use itertools::iproduct;
use nalgebra::{DMatrix, Vector3};
use num_complex::Complex;
use rayon::prelude::*;
use tracing::debug;

pub type CMatrix = DMatrix<Complex<f64>>;

/// Overlap and kinetic matrices per k-point.
#[derive(Debug, Clone)]
pub struct OneElectronIntegrals {
    pub overlap: Vec<CMatrix>,
    pub kinetic: Vec<CMatrix>,
}

/// Matrix elements of a local potential `W` per k-point: `<a|W|b>`,
/// `<a|p.Wp|b>` and the three components of `<a|p W x p|b>`. The latter are
/// anti-Hermitian.
#[derive(Debug, Clone)]
pub struct PotentialIntegrals {
    pub potential: Vec<CMatrix>,
    pub pvp: Vec<CMatrix>,
    pub pvxp: Vec<[CMatrix; 3]>,
}

/// Weight `coef * exp(-gamma |r - center|^2)`.
type Weight = (f64, f64, Vector3<f64>);

const NQ: usize = 5;

pub fn overlap_kinetic(cell: &Cell, kpts: &KPoints) -> OneElectronIntegrals {
    let unit = [(1.0, 0.0, Vector3::zeros())];
    let threshold = screening_threshold(cell);
    let mut sums = bloch_sums(cell, kpts, [1.0; NQ], |si, sj, shift| {
        contracted_block(si, sj, shift, &unit, threshold).map(|block| {
            block
                .iter()
                .map(|e| [e.overlap, e.kinetic(), 0.0, 0.0, 0.0])
                .collect()
        })
    });

    let mut overlap = Vec::with_capacity(sums.len());
    let mut kinetic = Vec::with_capacity(sums.len());
    for [s, t, ..] in sums.drain(..) {
        overlap.push(s);
        kinetic.push(t);
    }
    OneElectronIntegrals { overlap, kinetic }
}

/// Integrals of the local potential `sum_A W_A(r - R_A)` where atom `A`
/// contributes the s-type Gaussian expansion `expansions[A] = [(c_j, g_j)]`,
/// `W_A(r) = sum_j c_j exp(-g_j r^2)`.
///
/// Two-center approximation: the element between `a` on atom `A` and `b` on
/// atom `B` (in image `L`) only sees `W_A + W_{B+L}`.
pub fn local_potential(
    cell: &Cell,
    kpts: &KPoints,
    expansions: &[Vec<(f64, f64)>],
) -> PotentialIntegrals {
    let threshold = screening_threshold(cell);
    let atoms = cell.atoms();
    let mut sums = bloch_sums(cell, kpts, [1.0, 1.0, -1.0, -1.0, -1.0], |si, sj, shift| {
        let same_site = si.atom == sj.atom && shift.norm_squared() < 1e-20;
        let mut centers = vec![(si.atom, atoms[si.atom].position)];
        if !same_site {
            centers.push((sj.atom, atoms[sj.atom].position + shift));
        }
        let weights: Vec<Weight> = centers
            .iter()
            .flat_map(|(atom, center)| {
                expansions[*atom]
                    .iter()
                    .map(move |&(coef, gamma)| (coef, gamma, *center))
            })
            .collect();
        contracted_block(si, sj, shift, &weights, threshold).map(|block| {
            block
                .iter()
                .map(|e| [e.overlap, e.grad_trace(), e.curl(0), e.curl(1), e.curl(2)])
                .collect()
        })
    });

    let mut potential = Vec::with_capacity(sums.len());
    let mut pvp = Vec::with_capacity(sums.len());
    let mut pvxp = Vec::with_capacity(sums.len());
    for [v, w, x, y, z] in sums.drain(..) {
        potential.push(v);
        pvp.push(w);
        pvxp.push([x, y, z]);
    }
    PotentialIntegrals {
        potential,
        pvp,
        pvxp,
    }
}

fn screening_threshold(cell: &Cell) -> f64 {
    cell.precision() * 1e-2
}

/// Radius covering every translation in which some primitive product can
/// survive screening.
fn image_radius(cell: &Cell) -> f64 {
    let min_exp = cell
        .shells()
        .iter()
        .map(|s| s.shell.min_exponent())
        .fold(f64::INFINITY, f64::min);
    let mu = 0.5 * min_exp;
    let reach = ((1.0 / screening_threshold(cell)).ln() / mu).sqrt();
    let positions: Vec<Vector3<f64>> = cell.atoms().iter().map(|a| a.position).collect();
    let span = iproduct!(positions.iter(), positions.iter())
        .map(|(a, b)| (a - b).norm())
        .fold(0.0, f64::max);
    reach + span
}

/// Contracted real-space block `<a|sum_w w|b(r - shift)>` for all component
/// pairs, row-major over (component of `si`, component of `sj`). `None` when
/// every primitive product is screened out.
fn contracted_block(
    si: &PlacedShell,
    sj: &PlacedShell,
    shift: &Vector3<f64>,
    weights: &[Weight],
    threshold: f64,
) -> Option<Vec<PairElements>> {
    let a_center = si.center;
    let b_center = sj.center + shift;
    let comps_a = si.shell.components();
    let comps_b = sj.shell.components();
    let coef_a = si.shell.component_coefficients();
    let coef_b = sj.shell.component_coefficients();
    let nb = comps_b.len();

    let mut block = vec![PairElements::default(); comps_a.len() * nb];
    let mut touched = false;
    for (p, &alpha) in si.shell.exponents.iter().enumerate() {
        for (q, &beta) in sj.shell.exponents.iter().enumerate() {
            for (coef, gamma, center) in weights {
                let k = product_prefactor((alpha, &a_center), (beta, &b_center), (*gamma, center));
                if k * coef.abs() < threshold {
                    continue;
                }
                touched = true;
                let tables = PairTables::new(
                    (alpha, &a_center, si.shell.l),
                    (beta, &b_center, sj.shell.l),
                    Some((*gamma, *center)),
                );
                for (ia, lmn_a) in comps_a.iter().enumerate() {
                    for (ib, lmn_b) in comps_b.iter().enumerate() {
                        let factor = coef * coef_a[ia][p] * coef_b[ib][q];
                        block[ia * nb + ib].add_scaled(&tables.elements(*lmn_a, *lmn_b), factor);
                    }
                }
            }
        }
    }
    touched.then_some(block)
}

/// Bloch-sum shell-pair blocks into `NQ` matrices per k-point. Only pairs
/// `i <= j` are evaluated; the lower triangle is `signs[q] * conj` of the upper,
/// so `signs` is `+1` for Hermitian and `-1` for anti-Hermitian quantities.
fn bloch_sums<F>(cell: &Cell, kpts: &KPoints, signs: [f64; NQ], element: F) -> Vec<[CMatrix; NQ]>
where
    F: Fn(&PlacedShell, &PlacedShell, &Vector3<f64>) -> Option<Vec<[f64; NQ]>> + Sync,
{
    let shells = cell.shells();
    let images = cell.lattice().translations(image_radius(cell));
    debug!("Lattice sums over {} translations", images.len());

    let pairs: Vec<(usize, usize)> = iproduct!(0..shells.len(), 0..shells.len())
        .filter(|(i, j)| i <= j)
        .collect();
    let zero = Complex::new(0.0, 0.0);

    let blocks: Vec<(usize, usize, Vec<Vec<[Complex<f64>; NQ]>>)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let (si, sj) = (&shells[i], &shells[j]);
            let n = si.shell.ncart() * sj.shell.ncart();
            let mut per_k = vec![vec![[zero; NQ]; n]; kpts.len()];
            for shift in &images {
                let Some(block) = element(si, sj, shift) else {
                    continue;
                };
                for (acc_k, k) in per_k.iter_mut().zip(kpts.kpts()) {
                    let phase = Complex::from_polar(1.0, k.dot(shift));
                    for (acc, values) in acc_k.iter_mut().zip(&block) {
                        for q in 0..NQ {
                            acc[q] += phase * values[q];
                        }
                    }
                }
            }
            (i, j, per_k)
        })
        .collect();

    let nao = cell.nao();
    let mut out: Vec<[CMatrix; NQ]> = (0..kpts.len())
        .map(|_| std::array::from_fn(|_| CMatrix::zeros(nao, nao)))
        .collect();
    for (i, j, per_k) in blocks {
        let (oi, oj) = (shells[i].ao_offset, shells[j].ao_offset);
        let (ni, nj) = (shells[i].shell.ncart(), shells[j].shell.ncart());
        for (mats, values) in out.iter_mut().zip(&per_k) {
            for (a, b) in iproduct!(0..ni, 0..nj) {
                let v = values[a * nj + b];
                for q in 0..NQ {
                    mats[q][(oi + a, oj + b)] = v[q];
                    if i != j {
                        mats[q][(oj + b, oi + a)] = v[q].conj() * signs[q];
                    }
                }
            }
        }
    }
    out
}
