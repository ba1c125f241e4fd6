//! One-electron Hamiltonians and Coulomb kernels fed to the SCF driver.
//!
//! [`HamiltonianBuilder`] is the seam between the solver and whatever
//! produces the matrices. [`GaussianModel`] is the concrete builder; the
//! decorators in [`density_fit`] and [`x2c`] wrap any builder and replace one
//! piece of it.

/// Forward the listed no-argument builder methods to `self.inner`.
macro_rules! forward_to_inner {
    ($($method:ident -> $ret:ty),* $(,)?) => {
        $(
            fn $method(&self) -> $ret {
                self.inner.$method()
            }
        )*
    };
}

pub mod coulomb;
pub mod density_fit;
pub mod model;
pub mod x2c;


pub use density_fit::DensityFitted;
pub use model::GaussianModel;
pub use x2c::{SpinFreeX2c, X2c};

use crate::error::Result;
use crate::linalg::{block_diag, CMatrix};
use cell::{Cell, KPoints};
use nalgebra::DMatrix;

/// How spin enters a one-electron matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinTreatment {
    /// `n x n` spatial matrices; both spins share them
    Restricted,
    /// `2n x 2n` spinor matrices ordered `[alpha | beta]`
    Generalized,
}

impl SpinTreatment {
    /// Lift a spatial matrix into this layout: unchanged, or `1 (x) m`.
    pub fn embed(&self, m: &CMatrix) -> CMatrix {
        match self {
            SpinTreatment::Restricted => m.clone(),
            SpinTreatment::Generalized => block_diag(m, m),
        }
    }

    pub fn dimension(&self, nao: usize) -> usize {
        match self {
            SpinTreatment::Restricted => nao,
            SpinTreatment::Generalized => 2 * nao,
        }
    }
}

/// Source of every matrix the Kohn-Sham driver needs. All per-k-point slices
/// follow the order of [`HamiltonianBuilder::kpts`].
pub trait HamiltonianBuilder: Send + Sync {
    fn cell(&self) -> &Cell;

    fn kpts(&self) -> &KPoints;

    fn nao(&self) -> usize {
        self.cell().nao()
    }

    fn nelectron(&self) -> usize {
        self.cell().nelectron()
    }

    fn overlap(&self) -> &[CMatrix];

    fn kinetic(&self) -> &[CMatrix];

    /// Ion-core attraction `V`.
    fn potential(&self) -> &[CMatrix];

    /// `<a|p.V p|b>`
    fn pvp(&self) -> &[CMatrix];

    /// Cartesian components of `<a|p V x p|b>`; anti-Hermitian.
    fn pvxp(&self) -> &[[CMatrix; 3]];

    /// Core Hamiltonian per k-point, `T + V` unless a decorator says otherwise.
    fn core_hamiltonian(&self, spin: SpinTreatment) -> Result<Vec<CMatrix>> {
        Ok(self
            .kinetic()
            .iter()
            .zip(self.potential())
            .map(|(t, v)| spin.embed(&(t + v)))
            .collect())
    }

    /// Symmetric positive semi-definite interaction between the charge
    /// distributions of the AOs.
    fn coulomb_kernel(&self) -> &DMatrix<f64>;

    /// Gaussian exponent of every AO charge distribution.
    fn charge_exponents(&self) -> &[f64];

    fn energy_nuc(&self) -> f64;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

impl<H: HamiltonianBuilder + ?Sized> HamiltonianBuilder for &H {
    fn cell(&self) -> &Cell {
        (**self).cell()
    }
    fn kpts(&self) -> &KPoints {
        (**self).kpts()
    }
    fn nao(&self) -> usize {
        (**self).nao()
    }
    fn nelectron(&self) -> usize {
        (**self).nelectron()
    }
    fn overlap(&self) -> &[CMatrix] {
        (**self).overlap()
    }
    fn kinetic(&self) -> &[CMatrix] {
        (**self).kinetic()
    }
    fn potential(&self) -> &[CMatrix] {
        (**self).potential()
    }
    fn pvp(&self) -> &[CMatrix] {
        (**self).pvp()
    }
    fn pvxp(&self) -> &[[CMatrix; 3]] {
        (**self).pvxp()
    }
    fn core_hamiltonian(&self, spin: SpinTreatment) -> Result<Vec<CMatrix>> {
        (**self).core_hamiltonian(spin)
    }
    fn coulomb_kernel(&self) -> &DMatrix<f64> {
        (**self).coulomb_kernel()
    }
    fn charge_exponents(&self) -> &[f64] {
        (**self).charge_exponents()
    }
    fn energy_nuc(&self) -> f64 {
        (**self).energy_nuc()
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<H: HamiltonianBuilder + ?Sized> HamiltonianBuilder for Box<H> {
    fn cell(&self) -> &Cell {
        (**self).cell()
    }
    fn kpts(&self) -> &KPoints {
        (**self).kpts()
    }
    fn nao(&self) -> usize {
        (**self).nao()
    }
    fn nelectron(&self) -> usize {
        (**self).nelectron()
    }
    fn overlap(&self) -> &[CMatrix] {
        (**self).overlap()
    }
    fn kinetic(&self) -> &[CMatrix] {
        (**self).kinetic()
    }
    fn potential(&self) -> &[CMatrix] {
        (**self).potential()
    }
    fn pvp(&self) -> &[CMatrix] {
        (**self).pvp()
    }
    fn pvxp(&self) -> &[[CMatrix; 3]] {
        (**self).pvxp()
    }
    fn core_hamiltonian(&self, spin: SpinTreatment) -> Result<Vec<CMatrix>> {
        (**self).core_hamiltonian(spin)
    }
    fn coulomb_kernel(&self) -> &DMatrix<f64> {
        (**self).coulomb_kernel()
    }
    fn charge_exponents(&self) -> &[f64] {
        (**self).charge_exponents()
    }
    fn energy_nuc(&self) -> f64 {
        (**self).energy_nuc()
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Decorator constructors available on every builder.
pub trait HamiltonianBuilderExt: HamiltonianBuilder + Sized {
    /// Density-fitted Coulomb kernel over an even-tempered auxiliary basis.
    fn density_fit(self) -> Result<DensityFitted<Self>> {
        DensityFitted::new(self)
    }

    /// Spin-free one-electron X2C core Hamiltonian with speed of light `c`.
    fn sfx2c1e(self, c: f64) -> Result<SpinFreeX2c<Self>> {
        SpinFreeX2c::new(self, c)
    }

    /// Spin-dependent one-electron X2C; generalized spin only.
    fn x2c1e(self, c: f64) -> Result<X2c<Self>> {
        X2c::new(self, c)
    }
}

impl<H: HamiltonianBuilder + Sized> HamiltonianBuilderExt for H {}
