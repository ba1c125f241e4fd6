//! Range-separated Coulomb kernel as a sum of Gaussians.
//!
//! `1/r = 2/sqrt(pi) int_0^inf exp(-t^2 r^2) dt`; truncating the integral to
//! `[t_min, t_max]` removes the long-range tail and regularizes the origin.
//! The remaining integral is a trapezoid rule in `s = ln t`, giving
//! `K(r) = sum_j w_j exp(-t_j^2 r^2)`.

use cell::{Cell, Lattice};
use nalgebra::{DMatrix, Vector3};
use rayon::prelude::*;

/// Lower cutoff shared by every kernel so that long-range parts cancel in a
/// neutral cell.
pub const T_MIN: f64 = 0.25;
/// Upper cutoff of the electron-electron kernel.
pub const T_MAX_ELECTRONIC: f64 = 32.0;
/// Upper cutoff of the bare nuclear attraction in all-electron cells.
pub const T_MAX_ALL_ELECTRON: f64 = 8.0;

const STEP: f64 = 0.5;
const LATTICE_SUM_THRESHOLD: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct CoulombQuadrature {
    /// `(w_j, t_j)`
    nodes: Vec<(f64, f64)>,
}

impl CoulombQuadrature {
    pub fn new(t_min: f64, t_max: f64) -> Self {
        let (s_min, s_max) = (t_min.ln(), t_max.max(t_min).ln());
        let intervals = ((s_max - s_min) / STEP).ceil().max(1.0) as usize;
        let h = (s_max - s_min) / intervals as f64;
        let prefactor = 2.0 / std::f64::consts::PI.sqrt();
        let nodes = (0..=intervals)
            .map(|j| {
                let t = (s_min + j as f64 * h).exp();
                let end = if j == 0 || j == intervals { 0.5 } else { 1.0 };
                (prefactor * h * t * end, t)
            })
            .collect();
        Self { nodes }
    }

    /// Kernel between electronic charge distributions.
    pub fn electronic() -> Self {
        Self::new(T_MIN, T_MAX_ELECTRONIC)
    }

    /// Attraction to the ion core of `atom`: the smeared GTH core when a
    /// pseudopotential is attached, a regularized point charge otherwise.
    pub fn ionic(cell: &Cell, atom: usize) -> Self {
        let t_max = match cell.pseudopotential(atom) {
            Some(pp) => 1.0 / (std::f64::consts::SQRT_2 * pp.r_loc),
            None => T_MAX_ALL_ELECTRON,
        };
        Self::new(T_MIN, t_max)
    }

    pub fn nodes(&self) -> &[(f64, f64)] {
        &self.nodes
    }

    pub fn kernel(&self, r: f64) -> f64 {
        self.nodes
            .iter()
            .map(|&(w, t)| w * (-t * t * r * r).exp())
            .sum()
    }

    /// Interaction of two unit Gaussian charges at distance `r` whose
    /// exponents combine to `mu = za zb / (za + zb)`.
    pub fn gaussian_pair(&self, r: f64, mu: f64) -> f64 {
        self.nodes
            .iter()
            .map(|&(w, t)| {
                let t2 = t * t;
                let ratio = mu / (mu + t2);
                w * ratio.powf(1.5) * (-ratio * t2 * r * r).exp()
            })
            .sum()
    }

    /// Distance beyond which the kernel drops below `threshold`.
    pub fn range(&self, threshold: f64) -> f64 {
        let total: f64 = self.nodes.iter().map(|(w, _)| w).sum();
        let t_min = self.nodes.first().map(|n| n.1).unwrap_or(T_MIN);
        ((total / threshold).ln().max(0.0)).sqrt() / t_min
    }

    /// Gaussian expansion `[(c_j, t_j^2)]` of the potential of a charge `-charge`.
    pub fn potential_expansion(&self, charge: f64) -> Vec<(f64, f64)> {
        self.nodes.iter().map(|&(w, t)| (-charge * w, t * t)).collect()
    }
}

/// Normalized s-type Gaussian charge `(z/pi)^{3/2} exp(-z |r - position|^2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSite {
    pub position: Vector3<f64>,
    pub exponent: f64,
}

/// Lattice-summed interaction `U_ab = sum_L <a|K|b + L>` between two sets of
/// Gaussian charges.
pub fn charge_interaction(
    lattice: &Lattice,
    a: &[ChargeSite],
    b: &[ChargeSite],
    quad: &CoulombQuadrature,
) -> DMatrix<f64> {
    let span = a
        .iter()
        .flat_map(|x| b.iter().map(move |y| (x.position - y.position).norm()))
        .fold(0.0, f64::max);
    let images = lattice.translations(quad.range(LATTICE_SUM_THRESHOLD) + span);

    let rows: Vec<Vec<f64>> = a
        .par_iter()
        .map(|x| {
            b.iter()
                .map(|y| {
                    let mu = x.exponent * y.exponent / (x.exponent + y.exponent);
                    images
                        .iter()
                        .map(|l| quad.gaussian_pair((x.position - y.position - l).norm(), mu))
                        .sum()
                })
                .collect()
        })
        .collect();
    DMatrix::from_fn(a.len(), b.len(), |i, j| rows[i][j])
}

/// Repulsion between the ion cores of one cell and all their images.
pub fn ion_repulsion(cell: &Cell, quad: &CoulombQuadrature) -> f64 {
    let atoms = cell.atoms();
    let span = atoms
        .iter()
        .flat_map(|x| atoms.iter().map(move |y| (x.position - y.position).norm()))
        .fold(0.0, f64::max);
    let images = cell
        .lattice()
        .translations(quad.range(LATTICE_SUM_THRESHOLD) + span);

    let mut energy = 0.0;
    for (i, ai) in atoms.iter().enumerate() {
        for (j, aj) in atoms.iter().enumerate() {
            let zz = cell.atom_charge(i) * cell.atom_charge(j);
            for l in &images {
                if i == j && l.norm_squared() < 1e-20 {
                    continue;
                }
                energy += 0.5 * zz * quad.kernel((ai.position - aj.position - l).norm());
            }
        }
    }
    energy
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn truncated_coulomb(r: f64, t_min: f64, t_max: f64) -> f64 {
        (libm::erf(t_max * r) - libm::erf(t_min * r)) / r
    }

    #[test]
    fn test_kernel_matches_truncated_coulomb() {
        let quad = CoulombQuadrature::electronic();
        for r in [0.3, 1.0, 2.5] {
            let exact = truncated_coulomb(r, T_MIN, T_MAX_ELECTRONIC);
            let approx = quad.kernel(r);
            assert!(
                ((approx - exact) / exact).abs() < 2e-2,
                "r = {r}: {approx} vs {exact}"
            );
        }
    }

    #[test]
    fn test_point_limit_of_gaussian_pair() {
        let quad = CoulombQuadrature::electronic();
        // very compact charges interact like point charges
        let r = 1.7;
        assert!((quad.gaussian_pair(r, 1e6) - quad.kernel(r)).abs() < 1e-4);
        // diffuse charges interact more weakly
        assert!(quad.gaussian_pair(0.0, 0.5) < quad.kernel(0.0));
    }

    #[test]
    fn test_range_bounds_kernel() {
        let quad = CoulombQuadrature::electronic();
        let r = quad.range(1e-10);
        assert!(quad.kernel(r) <= 1e-10);
        assert!(quad.kernel(0.5 * r) > 1e-10);
    }

    #[test]
    fn test_interaction_matrix_is_symmetric_positive() {
        let lattice = Lattice::new(Matrix3::from_diagonal_element(5.0)).unwrap();
        let sites = vec![
            ChargeSite {
                position: Vector3::zeros(),
                exponent: 1.2,
            },
            ChargeSite {
                position: Vector3::new(1.0, 0.5, 0.0),
                exponent: 0.4,
            },
            ChargeSite {
                position: Vector3::new(1.0, 0.5, 0.0),
                exponent: 3.0,
            },
        ];
        let u = charge_interaction(&lattice, &sites, &sites, &CoulombQuadrature::electronic());
        assert!((&u - u.transpose()).norm() < 1e-12);
        let eig = u.clone().symmetric_eigen();
        assert!(eig.eigenvalues.iter().all(|&e| e > 0.0));
    }
}
