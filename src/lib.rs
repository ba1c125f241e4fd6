//! Periodic k-point Kohn-Sham SCF.
//!
//! [`cell`] describes the unit cell, basis and k-point mesh and evaluates the
//! one-electron lattice sums; [`kscf`] holds the Hamiltonian builders, the
//! KRKS/KGKS drivers and the command-line front end.

pub use cell;
pub use kscf;

pub use cell::{Cell, KPoints};
pub use kscf::{
    GaussianModel, HamiltonianBuilder, HamiltonianBuilderExt, Kgks, KohnShamScf, Krks,
    ScfError, ScfSettings, SCF,
};
