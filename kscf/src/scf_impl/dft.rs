//! Hartree and exchange terms evaluated on AO Mulliken populations.
//!
//! Every AO carries a Gaussian charge cloud `q_a (z_a/pi)^{3/2} exp(-z_a r^2)`.
//! Integrating the Slater exchange energy density over one such cloud gives
//! `f_a c_x q_a^{4/3}` with the site factor `f_a = (3/4)^{3/2} sqrt(z_a / pi)`,
//! so no integration grid is needed.

use super::settings::XcFunctional;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// Exchange-only LDA (Slater exchange), unpolarized.
///
/// Energy density:  e_x(rho) = c_x rho^(4/3),  c_x = -(3/4) (3/pi)^(1/3)
/// Potential:       v_x(rho) = d e_x / d rho = -(3/pi)^(1/3) rho^(1/3)
pub(crate) fn lda_x_energy_density(rho: f64) -> f64 {
    if rho <= 0.0 {
        return 0.0;
    }
    let cx = -0.75 * (3.0 / PI).powf(1.0 / 3.0);
    cx * rho.powf(4.0 / 3.0)
}

pub(crate) fn lda_x_potential(rho: f64) -> f64 {
    if rho <= 0.0 {
        return 0.0;
    }
    -(3.0 / PI).powf(1.0 / 3.0) * rho.powf(1.0 / 3.0)
}

/// `int e_x(rho_a(r)) dr / e_x(q_a)` for a unit-normalized Gaussian cloud.
fn site_factor(zeta: f64) -> f64 {
    0.75_f64.powf(1.5) * (zeta / PI).sqrt()
}

/// Energies and per-AO potentials `v_sigma,a = dE / dq_sigma,a`.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePotential {
    pub e_hartree: f64,
    pub e_xc: f64,
    pub v_alpha: DVector<f64>,
    pub v_beta: DVector<f64>,
}

/// Hartree energy `1/2 q^T U q` of the total population plus spin-scaled
/// exchange `1/2 (E_x[2 q_alpha] + E_x[2 q_beta])`.
pub fn effective_potential(
    xc: XcFunctional,
    kernel: &DMatrix<f64>,
    exponents: &[f64],
    q_alpha: &DVector<f64>,
    q_beta: &DVector<f64>,
) -> EffectivePotential {
    let q = q_alpha + q_beta;
    let v_hartree = kernel * &q;
    let e_hartree = 0.5 * q.dot(&v_hartree);

    let mut v_alpha = v_hartree.clone();
    let mut v_beta = v_hartree;
    let mut e_xc = 0.0;
    if xc == XcFunctional::Lda {
        for (a, &zeta) in exponents.iter().enumerate() {
            let f = site_factor(zeta);
            let (ra, rb) = (2.0 * q_alpha[a], 2.0 * q_beta[a]);
            e_xc += 0.5 * f * (lda_x_energy_density(ra) + lda_x_energy_density(rb));
            v_alpha[a] += f * lda_x_potential(ra);
            v_beta[a] += f * lda_x_potential(rb);
        }
    }

    EffectivePotential {
        e_hartree,
        e_xc,
        v_alpha,
        v_beta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.0, 0.3, 0.1, 0.3, 0.8, 0.2, 0.1, 0.2, 0.9])
    }

    #[test]
    fn test_lda_potential_is_derivative() {
        for rho in [0.01, 0.3, 2.0] {
            let h = 1e-6;
            let fd = (lda_x_energy_density(rho + h) - lda_x_energy_density(rho - h)) / (2.0 * h);
            assert!((fd - lda_x_potential(rho)).abs() < 1e-6);
        }
        assert_eq!(lda_x_energy_density(-0.1), 0.0);
        assert_eq!(lda_x_potential(0.0), 0.0);
    }

    #[test]
    fn test_site_factor_integrates_gaussian() {
        // int (z/pi)^2 exp(-4/3 z r^2) d^3r by radial Simpson quadrature
        let zeta = 1.7;
        let n = 4000;
        let r_max = 8.0;
        let h = r_max / n as f64;
        let f = |r: f64| {
            let rho = (zeta / PI).powf(1.5) * (-zeta * r * r).exp();
            4.0 * PI * r * r * rho.powf(4.0 / 3.0)
        };
        let mut integral = f(0.0) + f(r_max);
        for i in 1..n {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            integral += w * f(i as f64 * h);
        }
        integral *= h / 3.0;
        assert!((integral - site_factor(zeta)).abs() < 1e-8);
    }

    #[test]
    fn test_potentials_are_gradients() {
        let u = kernel();
        let z = [2.0, 0.7, 5.0];
        let qa = DVector::from_vec(vec![0.9, 0.4, 0.6]);
        let qb = DVector::from_vec(vec![0.5, 0.45, 0.3]);
        let total = |qa: &DVector<f64>, qb: &DVector<f64>| {
            let v = effective_potential(XcFunctional::Lda, &u, &z, qa, qb);
            v.e_hartree + v.e_xc
        };
        let v = effective_potential(XcFunctional::Lda, &u, &z, &qa, &qb);
        let h = 1e-6;
        for a in 0..3 {
            let mut plus = qa.clone();
            let mut minus = qa.clone();
            plus[a] += h;
            minus[a] -= h;
            let fd = (total(&plus, &qb) - total(&minus, &qb)) / (2.0 * h);
            assert!((fd - v.v_alpha[a]).abs() < 1e-6, "alpha {a}: {fd} vs {}", v.v_alpha[a]);

            let mut plus = qb.clone();
            let mut minus = qb.clone();
            plus[a] += h;
            minus[a] -= h;
            let fd = (total(&qa, &plus) - total(&qa, &minus)) / (2.0 * h);
            assert!((fd - v.v_beta[a]).abs() < 1e-6, "beta {a}: {fd} vs {}", v.v_beta[a]);
        }
    }

    #[test]
    fn test_closed_shell_spin_symmetry() {
        let u = kernel();
        let z = [2.0, 0.7, 5.0];
        let q = DVector::from_vec(vec![1.2, 0.8, 2.0]);
        let half = &q * 0.5;
        let v = effective_potential(XcFunctional::Lda, &u, &z, &half, &half);
        assert_eq!(v.v_alpha, v.v_beta);

        let expected: f64 = z
            .iter()
            .zip(q.iter())
            .map(|(&zeta, &qa)| site_factor(zeta) * lda_x_energy_density(qa))
            .sum();
        assert!((v.e_xc - expected).abs() < 1e-14);
        assert!((v.e_hartree - 0.5 * q.dot(&(&u * &q))).abs() < 1e-14);

        let hartree = effective_potential(XcFunctional::Hartree, &u, &z, &half, &half);
        assert_eq!(hartree.e_xc, 0.0);
        assert_eq!(hartree.e_hartree, v.e_hartree);
    }
}
