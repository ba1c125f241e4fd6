// Periodic k-point Kohn-Sham SCF

pub mod app;
pub mod config;
pub mod error;
pub mod hamiltonian;
pub mod io;
pub mod linalg;
pub mod scf_impl;

pub use error::{Result, ScfError, StopReason};
pub use hamiltonian::{
    DensityFitted, GaussianModel, HamiltonianBuilder, HamiltonianBuilderExt, SpinFreeX2c,
    SpinTreatment, X2c,
};
pub use scf_impl::{
    Generalized, InitGuess, Kgks, KohnShamScf, Krks, Restricted, ScfSettings, Smearing,
    XcFunctional, SCF,
};
