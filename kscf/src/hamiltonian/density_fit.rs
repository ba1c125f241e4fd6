use super::coulomb::{charge_interaction, ChargeSite, CoulombQuadrature};
use super::{HamiltonianBuilder, SpinTreatment};
use crate::error::{Result, ScfError};
use crate::linalg::CMatrix;
use cell::{Cell, KPoints};
use nalgebra::{DMatrix, SymmetricEigen};
use tracing::info;

/// Ratio between consecutive auxiliary exponents.
const EVEN_TEMPERED_BETA: f64 = 2.0;
/// Relative cutoff on the auxiliary metric spectrum.
const METRIC_LINDEP: f64 = 1e-10;

/// Coulomb kernel fitted in an auxiliary basis of Gaussian charges:
/// `U_fit = V^T M^+ V` with metric `M_PQ = (P|Q)` and `V_Pa = (P|a)`.
///
/// The fit is a Coulomb-metric projection, so `U - U_fit` is positive
/// semi-definite and an auxiliary basis containing every AO charge gives back
/// the exact kernel.
#[derive(Debug, Clone)]
pub struct DensityFitted<H> {
    inner: H,
    kernel: DMatrix<f64>,
    naux: usize,
}

impl<H: HamiltonianBuilder> DensityFitted<H> {
    pub fn new(inner: H) -> Result<Self> {
        let aux = even_tempered_auxiliary(inner.cell(), inner.charge_exponents());
        Self::with_auxiliary(inner, aux)
    }

    pub fn with_auxiliary(inner: H, aux: Vec<ChargeSite>) -> Result<Self> {
        if aux.is_empty() {
            return Err(ScfError::InvalidConfiguration(
                "density fitting needs at least one auxiliary function".to_string(),
            ));
        }
        let quad = CoulombQuadrature::electronic();
        let ao = ao_sites(inner.cell(), inner.charge_exponents());
        let lattice = inner.cell().lattice();
        let metric = charge_interaction(lattice, &aux, &aux, &quad);
        let coupling = charge_interaction(lattice, &aux, &ao, &quad);

        let eig = SymmetricEigen::try_new(metric, f64::EPSILON, 10_000).ok_or_else(|| {
            ScfError::NumericalInstability(
                "eigendecomposition of the auxiliary metric did not converge".to_string(),
            )
        })?;
        let largest = eig.eigenvalues.iter().copied().fold(0.0, f64::max);
        let kept: Vec<usize> = (0..eig.eigenvalues.len())
            .filter(|&i| eig.eigenvalues[i] > METRIC_LINDEP * largest)
            .collect();

        // W = lambda^{-1/2} U^T V over the kept eigenvectors; U_fit = W^T W
        let mut w = DMatrix::zeros(kept.len(), ao.len());
        for (row, &i) in kept.iter().enumerate() {
            let scale = 1.0 / eig.eigenvalues[i].sqrt();
            let projected = eig.eigenvectors.column(i).transpose() * &coupling;
            w.row_mut(row).copy_from(&(projected * scale));
        }
        let kernel = w.transpose() * &w;

        info!(
            "Density fitting: {} auxiliary charges, {} kept after metric screening",
            aux.len(),
            kept.len()
        );
        Ok(Self {
            inner,
            kernel,
            naux: aux.len(),
        })
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn naux(&self) -> usize {
        self.naux
    }
}

fn ao_sites(cell: &Cell, exponents: &[f64]) -> Vec<ChargeSite> {
    cell.ao_atom_map()
        .into_iter()
        .zip(exponents)
        .map(|(atom, &exponent)| ChargeSite {
            position: cell.atoms()[atom].position,
            exponent,
        })
        .collect()
}

/// Even-tempered s-type charges on every atom spanning the exponent range
/// of that atom's AO charges.
pub fn even_tempered_auxiliary(cell: &Cell, exponents: &[f64]) -> Vec<ChargeSite> {
    let ao_atom = cell.ao_atom_map();
    let mut aux = Vec::new();
    for (i, atom) in cell.atoms().iter().enumerate() {
        let (lo, hi) = ao_atom
            .iter()
            .zip(exponents)
            .filter(|(a, _)| **a == i)
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), (_, &z)| (lo.min(z), hi.max(z)));
        if !lo.is_finite() {
            continue;
        }
        let mut zeta = lo;
        while zeta < hi * EVEN_TEMPERED_BETA {
            aux.push(ChargeSite {
                position: atom.position,
                exponent: zeta,
            });
            zeta *= EVEN_TEMPERED_BETA;
        }
    }
    aux
}

impl<H: HamiltonianBuilder> HamiltonianBuilder for DensityFitted<H> {
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
        charge_exponents -> &[f64],
        energy_nuc -> f64,
    );

    fn core_hamiltonian(&self, spin: SpinTreatment) -> Result<Vec<CMatrix>> {
        self.inner.core_hamiltonian(spin)
    }

    fn coulomb_kernel(&self) -> &DMatrix<f64> {
        &self.kernel
    }

    fn describe(&self) -> String {
        format!("density-fitted {}", self.inner.describe())
    }
}
