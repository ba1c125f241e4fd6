use super::coulomb::{charge_interaction, ion_repulsion, ChargeSite, CoulombQuadrature};
use super::HamiltonianBuilder;
use crate::error::{Result, ScfError};
use crate::linalg::CMatrix;
use cell::int1e::{local_potential, overlap_kinetic};
use cell::{Cell, KPoints};
use nalgebra::DMatrix;
use tracing::info;

/// Gaussian model Hamiltonian of a periodic cell.
///
/// One-electron matrices are exact lattice sums over the cell's contracted
/// Gaussians. The ion cores attract through the truncated kernel of
/// [`CoulombQuadrature::ionic`] plus, with a pseudopotential, its short-range
/// Gaussian terms; electrons interact through Gaussian charge
/// clouds, one per AO, whose exponent is twice the shell's mean exponent.
#[derive(Debug, Clone)]
pub struct GaussianModel {
    cell: Cell,
    kpts: KPoints,
    overlap: Vec<CMatrix>,
    kinetic: Vec<CMatrix>,
    potential: Vec<CMatrix>,
    pvp: Vec<CMatrix>,
    pvxp: Vec<[CMatrix; 3]>,
    coulomb: DMatrix<f64>,
    exponents: Vec<f64>,
    energy_nuc: f64,
}

impl GaussianModel {
    pub fn new(cell: Cell, kpts: KPoints) -> Result<Self> {
        if kpts.is_empty() {
            return Err(ScfError::InvalidConfiguration(
                "at least one k-point is required".to_string(),
            ));
        }
        info!(
            "Building Gaussian model: {} AOs, {} electrons, {} k-points",
            cell.nao(),
            cell.nelectron(),
            kpts.len()
        );

        let one_e = overlap_kinetic(&cell, &kpts);
        let expansions: Vec<Vec<(f64, f64)>> = (0..cell.natm())
            .map(|i| {
                let mut terms =
                    CoulombQuadrature::ionic(&cell, i).potential_expansion(cell.atom_charge(i));
                if let Some(pp) = cell.pseudopotential(i) {
                    terms.extend(pp.local_gaussians());
                }
                terms
            })
            .collect();
        let pot = local_potential(&cell, &kpts, &expansions);

        let sites = ao_charge_sites(&cell);
        let exponents: Vec<f64> = sites.iter().map(|s| s.exponent).collect();
        let quad = CoulombQuadrature::electronic();
        let coulomb = charge_interaction(cell.lattice(), &sites, &sites, &quad);
        let energy_nuc = ion_repulsion(&cell, &quad);
        info!("Nuclear repulsion energy: {:.10} au", energy_nuc);

        Ok(Self {
            cell,
            kpts,
            overlap: one_e.overlap,
            kinetic: one_e.kinetic,
            potential: pot.potential,
            pvp: pot.pvp,
            pvxp: pot.pvxp,
            coulomb,
            exponents,
            energy_nuc,
        })
    }
}

/// One Gaussian charge per AO, at its atom.
pub fn ao_charge_sites(cell: &Cell) -> Vec<ChargeSite> {
    cell.shells()
        .iter()
        .flat_map(|s| {
            let site = ChargeSite {
                position: s.center,
                exponent: 2.0 * s.shell.mean_exponent(),
            };
            std::iter::repeat(site).take(s.shell.ncart())
        })
        .collect()
}

impl HamiltonianBuilder for GaussianModel {
    fn cell(&self) -> &Cell {
        &self.cell
    }

    fn kpts(&self) -> &KPoints {
        &self.kpts
    }

    fn overlap(&self) -> &[CMatrix] {
        &self.overlap
    }

    fn kinetic(&self) -> &[CMatrix] {
        &self.kinetic
    }

    fn potential(&self) -> &[CMatrix] {
        &self.potential
    }

    fn pvp(&self) -> &[CMatrix] {
        &self.pvp
    }

    fn pvxp(&self) -> &[[CMatrix; 3]] {
        &self.pvxp
    }

    fn coulomb_kernel(&self) -> &DMatrix<f64> {
        &self.coulomb
    }

    fn charge_exponents(&self) -> &[f64] {
        &self.exponents
    }

    fn energy_nuc(&self) -> f64 {
        self.energy_nuc
    }

    fn describe(&self) -> String {
        let pseudo = if self.cell.has_pseudo() { ", pseudopotential" } else { "" };
        format!(
            "Gaussian model ({}{}, {} k-points)",
            self.cell.basis_name(),
            pseudo,
            self.kpts.len()
        )
    }
}
