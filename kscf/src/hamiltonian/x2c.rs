//! One-electron exact two-component (X2C-1e) core Hamiltonians.
//!
//! The modified Dirac equation in the restricted kinetically balanced basis
//!
//! ```text
//! [ V   T             ] [C_L]   [ S   0          ] [C_L]
//! [ T   W/(4c^2) - T  ] [C_S] = [ 0   T/(2c^2)   ] [C_S] e
//! ```
//!
//! is solved per k-point. Its positive-energy solutions define the coupling
//! `X = C_S C_L^{-1}`, and the decoupled Hamiltonian is renormalized by
//! `R = S^{-1/2} (S^{-1/2} S~ S^{-1/2})^{-1/2} S^{1/2}`. The spin-free variant
//! uses `W = p.V p`; the spin-dependent one adds `i sigma . (p V x p)`.

use super::{HamiltonianBuilder, SpinTreatment};
use crate::error::{Result, ScfError};
use crate::linalg::{
    block_diag, c64, eigh_generalized, hermitian_power, hermitize, orthogonalizer, pauli_kron,
    scale, CMatrix,
};
use cell::{Cell, KPoints};
use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::info;

const X2C_LINDEP: f64 = 1e-12;

fn check_light_speed(c: f64) -> Result<()> {
    if c.is_finite() && c > 0.0 {
        Ok(())
    } else {
        Err(ScfError::InvalidConfiguration(format!(
            "speed of light must be positive and finite, got {c}"
        )))
    }
}

/// Decoupled positive-energy Hamiltonian for one k-point (or one spinor block).
pub fn x2c_core_hamiltonian(
    t: &CMatrix,
    v: &CMatrix,
    w: &CMatrix,
    s: &CMatrix,
    c: f64,
) -> Result<CMatrix> {
    let n = s.nrows();
    let c2 = c * c;

    let mut h = CMatrix::zeros(2 * n, 2 * n);
    h.view_mut((0, 0), (n, n)).copy_from(v);
    h.view_mut((0, n), (n, n)).copy_from(t);
    h.view_mut((n, 0), (n, n)).copy_from(t);
    h.view_mut((n, n), (n, n))
        .copy_from(&(scale(w, 0.25 / c2) - t));

    // metric diag(S, T / 2c^2) is orthogonalized blockwise
    let x_large = orthogonalizer(s, X2C_LINDEP)?;
    let x_small = scale(&orthogonalizer(t, X2C_LINDEP)?, (2.0 * c2).sqrt());
    let (_, coeffs) = eigh_generalized(&h, &block_diag(&x_large, &x_small))?;

    let c_large = coeffs.view((0, n), (n, n)).into_owned();
    let c_small = coeffs.view((n, n), (n, n)).into_owned();
    let c_large_inv = c_large.try_inverse().ok_or_else(|| {
        ScfError::NumericalInstability(
            "large component of the positive-energy states is singular".to_string(),
        )
    })?;
    let x = c_small * c_large_inv;
    let x_adj = x.adjoint();

    let xtx = &x_adj * t * &x;
    let s_tilde = s + scale(&xtx, 0.5 / c2);
    let tx = t * &x;
    let h_fw = v + &tx + tx.adjoint() + scale(&(&x_adj * w * &x), 0.25 / c2) - xtx;

    let r = renormalization(s, &s_tilde)?;
    Ok(hermitize(&(r.adjoint() * h_fw * r)))
}

/// `R` with `R^H S~ R = S`.
fn renormalization(s: &CMatrix, s_tilde: &CMatrix) -> Result<CMatrix> {
    let s_half = hermitian_power(s, 0.5)?;
    let s_inv_half = hermitian_power(s, -0.5)?;
    let middle = hermitian_power(&hermitize(&(&s_inv_half * s_tilde * &s_inv_half)), -0.5)?;
    Ok(s_inv_half * middle * s_half)
}

/// Spin-free X2C-1e decorator.
#[derive(Debug, Clone)]
pub struct SpinFreeX2c<H> {
    inner: H,
    c: f64,
}

impl<H: HamiltonianBuilder> SpinFreeX2c<H> {
    pub fn new(inner: H, c: f64) -> Result<Self> {
        check_light_speed(c)?;
        Ok(Self { inner, c })
    }

    pub fn light_speed(&self) -> f64 {
        self.c
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: HamiltonianBuilder> HamiltonianBuilder for SpinFreeX2c<H> {
    forward_to_inner!(
        cell -> &Cell,
        kpts -> &KPoints,
        nao -> usize,
        nelectron -> usize,
        overlap -> &[CMatrix],
        kinetic -> &[CMatrix],
        potential -> &[CMatrix],
        pvp -> &[CMatrix],
        pvxp -> &[[CMatrix; 3]],
        coulomb_kernel -> &DMatrix<f64>,
        charge_exponents -> &[f64],
        energy_nuc -> f64,
    );

    fn core_hamiltonian(&self, spin: SpinTreatment) -> Result<Vec<CMatrix>> {
        info!("sfX2C-1e core Hamiltonian, c = {}", self.c);
        let (t, v, w, s) = (self.kinetic(), self.potential(), self.pvp(), self.overlap());
        (0..s.len())
            .into_par_iter()
            .map(|k| Ok(spin.embed(&x2c_core_hamiltonian(&t[k], &v[k], &w[k], &s[k], self.c)?)))
            .collect()
    }

    fn describe(&self) -> String {
        format!("sfX2C-1e (c = {}) {}", self.c, self.inner.describe())
    }
}

/// Spin-dependent X2C-1e decorator. Its core Hamiltonian couples the spins
/// and therefore only exists in the generalized layout.
#[derive(Debug, Clone)]
pub struct X2c<H> {
    inner: H,
    c: f64,
}

impl<H: HamiltonianBuilder> X2c<H> {
    pub fn new(inner: H, c: f64) -> Result<Self> {
        check_light_speed(c)?;
        Ok(Self { inner, c })
    }

    pub fn light_speed(&self) -> f64 {
        self.c
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

/// `W = 1 (x) p.V p + i sum_c sigma_c (x) (p V x p)_c`
fn spinor_w(pvp: &CMatrix, pvxp: &[CMatrix; 3]) -> CMatrix {
    let i = c64::new(0.0, 1.0);
    let mut w = block_diag(pvp, pvp);
    for (axis, m) in pvxp.iter().enumerate() {
        w += pauli_kron(axis, &m.map(|z| z * i));
    }
    w
}

impl<H: HamiltonianBuilder> HamiltonianBuilder for X2c<H> {
    forward_to_inner!(
        cell -> &Cell,
        kpts -> &KPoints,
        nao -> usize,
        nelectron -> usize,
        overlap -> &[CMatrix],
        kinetic -> &[CMatrix],
        potential -> &[CMatrix],
        pvp -> &[CMatrix],
        pvxp -> &[[CMatrix; 3]],
        coulomb_kernel -> &DMatrix<f64>,
        charge_exponents -> &[f64],
        energy_nuc -> f64,
    );

    fn core_hamiltonian(&self, spin: SpinTreatment) -> Result<Vec<CMatrix>> {
        if spin == SpinTreatment::Restricted {
            return Err(ScfError::InvalidConfiguration(
                "spin-dependent X2C requires the generalized spin layout".to_string(),
            ));
        }
        info!("X2C-1e core Hamiltonian, c = {}", self.c);
        let (t, v, s) = (self.kinetic(), self.potential(), self.overlap());
        let (pvp, pvxp) = (self.pvp(), self.pvxp());
        (0..s.len())
            .into_par_iter()
            .map(|k| {
                let two = SpinTreatment::Generalized;
                x2c_core_hamiltonian(
                    &two.embed(&t[k]),
                    &two.embed(&v[k]),
                    &spinor_w(&pvp[k], &pvxp[k]),
                    &two.embed(&s[k]),
                    self.c,
                )
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("X2C-1e (c = {}) {}", self.c, self.inner.describe())
    }
}
