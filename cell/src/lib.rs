//! Periodic cells, k-point meshes and lattice-summed Gaussian one-electron integrals.

pub mod cell;
pub mod cgto;
pub mod error;
pub mod gto;
pub mod int1e;
pub mod kpts;
pub mod lattice;
pub mod pseudo;

pub use cell::{Atom, Cell, CellBuilder, PlacedShell, Unit, BOHR};
pub use cgto::{BasisSet, ContractedShell};
pub use error::CellError;
pub use int1e::{OneElectronIntegrals, PotentialIntegrals};
pub use kpts::KPoints;
pub use lattice::Lattice;
pub use pseudo::Pseudopotential;
