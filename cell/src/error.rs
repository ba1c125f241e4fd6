//! Errors raised while describing a periodic cell.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CellError {
    /// An atom entry could not be parsed (`"<symbol> x y z"` expected).
    InvalidAtom(String),

    /// Lattice vectors are malformed or span no volume.
    InvalidLattice(String),

    /// Element symbol not found in the periodic table.
    UnknownElement(String),

    /// Basis set name is not in the built-in library.
    UnknownBasis(String),

    /// The basis library has no functions for an element.
    MissingBasis { basis: String, element: String },

    /// Pseudopotential family or element not tabulated.
    UnknownPseudo { pseudo: String, element: String },

    /// A k-point mesh with a zero dimension.
    InvalidMesh([usize; 3]),

    /// The cell has no atoms.
    EmptyCell,

    /// Net charge removes more electrons than the cell has.
    InvalidCharge(i32),

    /// Basis file text could not be parsed.
    BasisParse(String),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAtom(entry) => write!(f, "Invalid atom entry: '{entry}'"),
            Self::InvalidLattice(msg) => write!(f, "Invalid lattice: {msg}"),
            Self::UnknownElement(sym) => write!(f, "Unknown element symbol: {sym}"),
            Self::UnknownBasis(name) => write!(f, "Unknown basis set: {name}"),
            Self::MissingBasis { basis, element } => {
                write!(f, "Basis set {basis} has no functions for {element}")
            }
            Self::UnknownPseudo { pseudo, element } => {
                write!(f, "Pseudopotential {pseudo} is not available for {element}")
            }
            Self::InvalidMesh(mesh) => write!(
                f,
                "Invalid k-point mesh [{}, {}, {}]: every dimension must be positive",
                mesh[0], mesh[1], mesh[2]
            ),
            Self::EmptyCell => write!(f, "Cell contains no atoms"),
            Self::InvalidCharge(charge) => {
                write!(f, "Net charge {charge} exceeds the number of electrons")
            }
            Self::BasisParse(msg) => write!(f, "Failed to parse basis data: {msg}"),
        }
    }
}

impl std::error::Error for CellError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_basis() {
        let err = CellError::MissingBasis {
            basis: "sto-3g".into(),
            element: "Xe".into(),
        };
        assert_eq!(err.to_string(), "Basis set sto-3g has no functions for Xe");
    }

    #[test]
    fn display_invalid_mesh() {
        let err = CellError::InvalidMesh([2, 0, 1]);
        assert!(err.to_string().contains("[2, 0, 1]"));
    }

    #[test]
    fn error_trait_works() {
        let err = CellError::EmptyCell;
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "Cell contains no atoms");
    }
}
