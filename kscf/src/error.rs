//! Typed errors for the Kohn-Sham SCF driver and its Hamiltonian builders.
//!
//! A run that stops early is reported with the last energy and residuals so
//! callers can decide whether a loosely converged result is usable.

use cell::CellError;
use std::fmt;

/// Why an SCF run stopped before meeting its tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxCycles,
    WallTime,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxCycles => write!(f, "maximum number of cycles reached"),
            Self::WallTime => write!(f, "wall-time budget exhausted"),
        }
    }
}

#[derive(Debug)]
pub enum ScfError {
    /// Tolerances not met; carries the state of the last completed cycle.
    NotConverged {
        reason: StopReason,
        cycles: usize,
        energy: f64,
        delta_e: f64,
        delta_dm: f64,
    },

    /// Non-positive-definite overlap, failed eigendecomposition or a broken
    /// electron-count invariant.
    NumericalInstability(String),

    /// Settings or system rejected before the first cycle.
    InvalidConfiguration(String),

    /// The cell description is malformed.
    Cell(CellError),
}

impl ScfError {
    /// Energy of the last completed cycle, when the run got that far.
    pub fn last_energy(&self) -> Option<f64> {
        match self {
            Self::NotConverged { energy, .. } => Some(*energy),
            _ => None,
        }
    }

    /// Everything except non-convergence aborts the calculation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotConverged { .. })
    }
}

impl fmt::Display for ScfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged {
                reason,
                cycles,
                energy,
                delta_e,
                delta_dm,
            } => write!(
                f,
                "SCF not converged after {cycles} cycles ({reason}): E = {energy:.12} au, dE = {delta_e:.3e}, |dD| = {delta_dm:.3e}"
            ),
            Self::NumericalInstability(msg) => write!(f, "Numerical instability: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::Cell(err) => write!(f, "Invalid cell: {err}"),
        }
    }
}

impl std::error::Error for ScfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cell(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CellError> for ScfError {
    fn from(err: CellError) -> Self {
        Self::Cell(err)
    }
}

pub type Result<T> = std::result::Result<T, ScfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_converged() {
        let err = ScfError::NotConverged {
            reason: StopReason::MaxCycles,
            cycles: 3,
            energy: -1.5,
            delta_e: 1e-3,
            delta_dm: 2e-2,
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 cycles"));
        assert!(msg.contains("maximum number of cycles"));
        assert_eq!(err.last_energy(), Some(-1.5));
        assert!(!err.is_fatal());
    }

    #[test]
    fn display_invalid_configuration() {
        let err = ScfError::InvalidConfiguration("odd electron count".into());
        assert_eq!(err.to_string(), "Invalid configuration: odd electron count");
        assert!(err.is_fatal());
        assert_eq!(err.last_energy(), None);
    }

    #[test]
    fn cell_error_is_source() {
        let err: ScfError = CellError::EmptyCell.into();
        let dyn_err: &dyn std::error::Error = &err;
        assert!(dyn_err.source().is_some());
        assert_eq!(err.to_string(), "Invalid cell: Cell contains no atoms");
    }
}
