//! Self-consistent field solvers for periodic Kohn-Sham systems
//!
//! This module provides the SCF trait, DIIS (Direct Inversion in the Iterative Subspace)
//! convergence acceleration, orbital occupation and the k-point Kohn-Sham driver
//! in its restricted (KRKS) and generalized-spin (KGKS) layouts.

extern crate nalgebra as na;

use crate::error::Result;
use na::DVector;

pub mod dft;
pub mod diis;
pub mod kohn_sham;
pub mod occupation;
pub mod settings;
pub mod spin;

#[cfg(test)]
mod tests;

pub use diis::DIIS;
pub use kohn_sham::{CycleRecord, EnergyComponents, Kgks, KohnShamScf, Krks};
pub use occupation::Occupations;
pub use settings::{InitGuess, ScfSettings, ScfSettingsBuilder, Smearing, XcFunctional};
pub use spin::{Generalized, Restricted, SpinLayout};

/// The SCF trait defines the interface for Self-Consistent Field calculations
pub trait SCF {
    /// Iterate to self-consistency and return the converged energy.
    ///
    /// On [`crate::error::ScfError::NotConverged`] the solver still holds the
    /// last density, so calling `kernel` again continues from it.
    fn kernel(&mut self) -> Result<f64>;

    /// Energy of the most recent density; the free energy with smearing.
    fn energy_tot(&self) -> f64;
    fn converged(&self) -> bool;
    fn cycles(&self) -> usize;
    fn mo_energy(&self) -> &[DVector<f64>];
    fn method(&self) -> &'static str;
}
