//! The k-point Kohn-Sham SCF driver.

use super::dft::effective_potential;
use super::diis::DIIS;
use super::occupation::{aufbau, smeared, Occupations};
use super::settings::{InitGuess, ScfSettings};
use super::spin::{Generalized, Restricted, SpinLayout};
use super::SCF;
use crate::error::{Result, ScfError, StopReason};
use crate::hamiltonian::{HamiltonianBuilder, SpinTreatment};
use crate::linalg::{eigh_generalized, orthogonalizer, real_trace_product, scale, CMatrix};
use cell::Cell;
use nalgebra::DVector;
use rayon::prelude::*;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{info, warn};

/// Relative tolerance of the electron-count check after each density build.
const ELECTRON_COUNT_TOL: f64 = 1e-6;

/// Energy terms of one density, in Hartree.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyComponents {
    /// `sum_k w_k Re tr(D_k h_k)`
    pub one_electron: f64,
    pub hartree: f64,
    pub xc: f64,
    pub nuclear: f64,
    /// `sigma * S` of smeared occupations; zero otherwise.
    pub smearing: f64,
}

impl EnergyComponents {
    pub fn total(&self) -> f64 {
        self.one_electron + self.hartree + self.xc + self.nuclear
    }

    /// `total - sigma S`, the quantity minimized with smeared occupations.
    pub fn free_energy(&self) -> f64 {
        self.total() - self.smearing
    }
}

/// One completed SCF cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    pub cycle: usize,
    pub energy: f64,
    pub delta_e: f64,
    pub delta_dm: f64,
    pub diis_error: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct ScfState {
    density: Vec<CMatrix>,
    mo_energy: Vec<DVector<f64>>,
    mo_coeff: Vec<CMatrix>,
    mo_occ: Vec<DVector<f64>>,
    energy: EnergyComponents,
    e_tot: f64,
    fermi: f64,
    cycles: usize,
    converged: bool,
    history: Vec<CycleRecord>,
}

/// Periodic Kohn-Sham solver over a Hamiltonian builder `H` and spin layout `L`.
///
/// The builder's matrices, the core Hamiltonian and the orthogonalizers are
/// fixed at construction; each call to [`SCF::kernel`] iterates from the
/// current density (or the initial guess on the first call).
pub struct KohnShamScf<H, L> {
    builder: H,
    settings: ScfSettings,
    overlap: Vec<CMatrix>,
    hcore: Vec<CMatrix>,
    orthogonalizers: Vec<CMatrix>,
    weights: Vec<f64>,
    nelectron: usize,
    state: ScfState,
    layout: PhantomData<L>,
}

pub type Krks<H> = KohnShamScf<H, Restricted>;
pub type Kgks<H> = KohnShamScf<H, Generalized>;

impl<H: HamiltonianBuilder> KohnShamScf<H, Restricted> {
    /// Restricted closed-shell solver.
    pub fn krks(builder: H, settings: ScfSettings) -> Result<Self> {
        Self::new(builder, settings)
    }
}

impl<H: HamiltonianBuilder> KohnShamScf<H, Generalized> {
    /// Generalized-spin solver over `2n x 2n` spinor matrices.
    pub fn kgks(builder: H, settings: ScfSettings) -> Result<Self> {
        Self::new(builder, settings)
    }
}

impl<H: HamiltonianBuilder, L: SpinLayout> KohnShamScf<H, L> {
    /// Validate the system against the settings and precompute everything
    /// that does not depend on the density.
    pub fn new(builder: H, settings: ScfSettings) -> Result<Self> {
        settings.validate()?;

        let nk = builder.kpts().len();
        let nao = builder.nao();
        let per_k = [
            ("overlap", builder.overlap().len()),
            ("kinetic", builder.kinetic().len()),
            ("potential", builder.potential().len()),
        ];
        if nk == 0 {
            return Err(ScfError::InvalidConfiguration(
                "at least one k-point is required".to_string(),
            ));
        }
        if let Some((name, n)) = per_k.iter().find(|(_, n)| *n != nk) {
            return Err(ScfError::InvalidConfiguration(format!(
                "k-point count mismatch: {nk} k-points but {n} {name} matrices"
            )));
        }

        let nelectron = builder.nelectron();
        if nelectron == 0 {
            return Err(ScfError::InvalidConfiguration(
                "the cell has no electrons".to_string(),
            ));
        }
        if L::TREATMENT == SpinTreatment::Restricted && nelectron % 2 != 0 {
            return Err(ScfError::InvalidConfiguration(format!(
                "restricted spin needs an even electron count, got {nelectron}"
            )));
        }
        let dim = L::TREATMENT.dimension(nao);
        if nelectron as f64 > L::OCCUPANCY * dim as f64 {
            return Err(ScfError::InvalidConfiguration(format!(
                "{nelectron} electrons do not fit into {dim} orbitals"
            )));
        }

        let hcore = builder.core_hamiltonian(L::TREATMENT)?;
        if hcore.len() != nk || hcore.iter().any(|h| h.shape() != (dim, dim)) {
            return Err(ScfError::InvalidConfiguration(format!(
                "core Hamiltonian does not match {nk} k-points of dimension {dim}"
            )));
        }
        let overlap: Vec<CMatrix> = builder
            .overlap()
            .iter()
            .map(|s| L::TREATMENT.embed(s))
            .collect();
        let lindep = settings.lindep();
        let orthogonalizers = overlap
            .par_iter()
            .map(|s| orthogonalizer(s, lindep))
            .collect::<Result<Vec<_>>>()?;
        let weights = builder.kpts().weights().to_vec();

        info!(
            "{} on {}: {} electrons, {} k-points, xc = {}",
            L::NAME,
            builder.describe(),
            nelectron,
            nk,
            settings.xc()
        );

        Ok(Self {
            builder,
            settings,
            overlap,
            hcore,
            orthogonalizers,
            weights,
            nelectron,
            state: ScfState::default(),
            layout: PhantomData,
        })
    }

    /// Run from an explicit starting density (one matrix per k-point).
    pub fn kernel_with(&mut self, dm0: Vec<CMatrix>) -> Result<f64> {
        let dim = L::TREATMENT.dimension(self.builder.nao());
        if dm0.len() != self.weights.len() || dm0.iter().any(|d| d.shape() != (dim, dim)) {
            return Err(ScfError::InvalidConfiguration(format!(
                "initial density must hold {} matrices of dimension {dim}",
                self.weights.len()
            )));
        }
        if let Some(mismatch) = self.electron_count_mismatch(&dm0) {
            return Err(ScfError::InvalidConfiguration(format!("initial {mismatch}")));
        }
        self.run(dm0)
    }

    pub fn builder(&self) -> &H {
        &self.builder
    }

    pub fn settings(&self) -> &ScfSettings {
        &self.settings
    }

    pub fn cell(&self) -> &Cell {
        self.builder.cell()
    }

    pub fn density(&self) -> &[CMatrix] {
        &self.state.density
    }

    pub fn mo_coeff(&self) -> &[CMatrix] {
        &self.state.mo_coeff
    }

    pub fn mo_occ(&self) -> &[DVector<f64>] {
        &self.state.mo_occ
    }

    pub fn energy_components(&self) -> EnergyComponents {
        self.state.energy
    }

    /// Highest occupied level, or the chemical potential with smearing.
    pub fn fermi_level(&self) -> f64 {
        self.state.fermi
    }

    pub fn history(&self) -> &[CycleRecord] {
        &self.state.history
    }

    /// `sum_k w_k Re tr(D_k S_k)`
    pub fn electron_count(&self, density: &[CMatrix]) -> f64 {
        density
            .iter()
            .zip(&self.overlap)
            .zip(&self.weights)
            .map(|((d, s), w)| w * real_trace_product(d, s))
            .sum()
    }

    fn electron_count_mismatch(&self, density: &[CMatrix]) -> Option<String> {
        let count = self.electron_count(density);
        let n = self.nelectron as f64;
        ((count - n).abs() > ELECTRON_COUNT_TOL * n.max(1.0))
            .then(|| format!("density holds {count:.8} electrons, expected {n}"))
    }

    fn check_electron_count(&self, density: &[CMatrix]) -> Result<()> {
        match self.electron_count_mismatch(density) {
            Some(mismatch) => Err(ScfError::NumericalInstability(mismatch)),
            None => Ok(()),
        }
    }

    fn initial_guess(&self) -> Result<Vec<CMatrix>> {
        match self.settings.init_guess() {
            InitGuess::Core => {
                info!("Initial guess from the core Hamiltonian");
                let (mo_energy, mo_coeff) = self.diagonalize(&self.hcore)?;
                let occ = self.occupy(&mo_energy)?;
                Ok(make_density(&mo_coeff, &occ.mo_occ))
            }
            InitGuess::Atom => {
                info!("Initial guess from neutral atomic populations");
                let populations = atom_populations(self.cell(), self.nelectron)?;
                // k-averaged diagonal overlap; the populations then sum to N
                let nao = self.builder.nao();
                let diag = self
                    .builder
                    .overlap()
                    .iter()
                    .zip(&self.weights)
                    .fold(DVector::zeros(nao), |acc: DVector<f64>, (s, w)| {
                        acc + s.diagonal().map(|z| z.re * w)
                    });
                let d = L::density_from_populations(&populations, &diag);
                Ok(vec![d; self.weights.len()])
            }
        }
    }

    /// Fock matrices and energy terms of a density.
    fn build_fock(&self, density: &[CMatrix]) -> (Vec<CMatrix>, EnergyComponents) {
        let nao = self.builder.nao();
        let (q_alpha, q_beta) = L::populations(density, &self.overlap, &self.weights, nao);
        let veff = effective_potential(
            self.settings.xc(),
            self.builder.coulomb_kernel(),
            self.builder.charge_exponents(),
            &q_alpha,
            &q_beta,
        );

        let fock = self
            .hcore
            .par_iter()
            .zip(&self.overlap)
            .map(|(h, s)| L::fock(h, s, &veff.v_alpha, &veff.v_beta))
            .collect();

        let one_electron = density
            .iter()
            .zip(&self.hcore)
            .zip(&self.weights)
            .map(|((d, h), w)| w * real_trace_product(d, h))
            .sum();

        let energy = EnergyComponents {
            one_electron,
            hartree: veff.e_hartree,
            xc: veff.e_xc,
            nuclear: self.builder.energy_nuc(),
            smearing: 0.0,
        };
        (fock, energy)
    }

    fn diagonalize(&self, fock: &[CMatrix]) -> Result<(Vec<DVector<f64>>, Vec<CMatrix>)> {
        let solutions = fock
            .par_iter()
            .zip(&self.orthogonalizers)
            .map(|(f, x)| eigh_generalized(f, x))
            .collect::<Result<Vec<_>>>()?;
        Ok(solutions.into_iter().unzip())
    }

    fn occupy(&self, mo_energy: &[DVector<f64>]) -> Result<Occupations> {
        match self.settings.smearing() {
            Some(smearing) => smeared(
                mo_energy,
                &self.weights,
                self.nelectron,
                L::OCCUPANCY,
                smearing,
            ),
            None => aufbau(mo_energy, self.nelectron, L::OCCUPANCY),
        }
    }

    /// `F + shift (S - S D S / occupancy)` raises the virtual space.
    fn level_shift(&self, fock: Vec<CMatrix>, density: &[CMatrix], shift: f64) -> Vec<CMatrix> {
        fock.into_iter()
            .zip(density)
            .zip(&self.overlap)
            .map(|((f, d), s)| {
                let sds = s * d * s;
                f + scale(&(s - scale(&sds, 1.0 / L::OCCUPANCY)), shift)
            })
            .collect()
    }

    /// `sqrt(sum_k w_k ||D_k - D'_k||_F^2)`
    fn density_change(&self, new: &[CMatrix], old: &[CMatrix]) -> f64 {
        new.iter()
            .zip(old)
            .zip(&self.weights)
            .map(|((a, b), w)| w * (a - b).norm_squared())
            .sum::<f64>()
            .sqrt()
    }

    fn run(&mut self, dm0: Vec<CMatrix>) -> Result<f64> {
        let start = Instant::now();
        let settings = self.settings.clone();
        let mut diis = DIIS::new(settings.diis_space().max(1));

        self.check_electron_count(&dm0)?;
        let mut density = dm0;
        let (mut fock, energy) = self.build_fock(&density);
        let mut e_tot = energy.free_energy();
        self.state.density = density.clone();
        self.state.energy = energy;
        self.state.e_tot = e_tot;
        self.state.cycles = 0;
        self.state.converged = false;
        self.state.history.clear();
        info!("Initial energy: E = {:.12} au", e_tot);

        let mut previous_fock: Option<Vec<CMatrix>> = None;
        let mut delta_e = f64::INFINITY;
        let mut delta_dm = f64::INFINITY;

        for cycle in 0..settings.max_cycle() {
            let mut f = fock.clone();
            if settings.damping() > 0.0 && cycle < settings.diis_start_cycle() {
                if let Some(prev) = &previous_fock {
                    let d = settings.damping();
                    f = f
                        .iter()
                        .zip(prev)
                        .map(|(new, old)| scale(new, 1.0 - d) + scale(old, d))
                        .collect();
                }
            }

            let mut diis_error = None;
            if settings.diis() && cycle >= settings.diis_start_cycle() {
                diis.update(f.clone(), &density, &self.overlap);
                diis_error = diis.last_error_norm();
                if let Some(mixed) = diis.extrapolate() {
                    f = mixed;
                }
            }
            previous_fock = Some(f.clone());

            if settings.level_shift() > 0.0 {
                f = self.level_shift(f, &density, settings.level_shift());
            }

            let (mo_energy, mo_coeff) = self.diagonalize(&f)?;
            let occ = self.occupy(&mo_energy)?;
            let new_density = make_density(&mo_coeff, &occ.mo_occ);
            self.check_electron_count(&new_density)?;

            let (new_fock, mut energy) = self.build_fock(&new_density);
            if let Some(smearing) = settings.smearing() {
                energy.smearing = smearing.sigma() * occ.entropy;
            }
            let new_e = energy.free_energy();
            delta_e = new_e - e_tot;
            delta_dm = self.density_change(&new_density, &density);

            info!(
                "Cycle {}: E = {:.12} au, dE = {:.3e}, |dD| = {:.3e}",
                cycle + 1,
                new_e,
                delta_e,
                delta_dm
            );

            density = new_density;
            fock = new_fock;
            e_tot = new_e;
            self.state.density = density.clone();
            self.state.mo_energy = mo_energy;
            self.state.mo_coeff = mo_coeff;
            self.state.mo_occ = occ.mo_occ;
            self.state.fermi = occ.fermi;
            self.state.energy = energy;
            self.state.e_tot = e_tot;
            self.state.cycles = cycle + 1;
            self.state.history.push(CycleRecord {
                cycle: cycle + 1,
                energy: e_tot,
                delta_e,
                delta_dm,
                diis_error,
            });

            if delta_e.abs() < settings.conv_tol() && delta_dm < settings.conv_tol_density() {
                self.state.converged = true;
                info!("{} converged in {} cycles.", L::NAME, cycle + 1);
                info!("Total energy: {:.12} au", e_tot);
                return Ok(e_tot);
            }

            if let Some(limit) = settings.max_wall_time() {
                if start.elapsed() > limit {
                    warn!("{} stopped after {} cycles: wall-time budget exhausted", L::NAME, cycle + 1);
                    return Err(ScfError::NotConverged {
                        reason: StopReason::WallTime,
                        cycles: cycle + 1,
                        energy: e_tot,
                        delta_e,
                        delta_dm,
                    });
                }
            }
        }

        warn!(
            "{} not converged in {} cycles (dE = {:.3e}, |dD| = {:.3e})",
            L::NAME,
            settings.max_cycle(),
            delta_e,
            delta_dm
        );
        Err(ScfError::NotConverged {
            reason: StopReason::MaxCycles,
            cycles: settings.max_cycle(),
            energy: e_tot,
            delta_e,
            delta_dm,
        })
    }
}

impl<H: HamiltonianBuilder, L: SpinLayout> SCF for KohnShamScf<H, L> {
    fn kernel(&mut self) -> Result<f64> {
        let dm0 = if self.state.density.is_empty() {
            self.initial_guess()?
        } else {
            self.state.density.clone()
        };
        self.run(dm0)
    }

    fn energy_tot(&self) -> f64 {
        self.state.e_tot
    }

    fn converged(&self) -> bool {
        self.state.converged
    }

    fn cycles(&self) -> usize {
        self.state.cycles
    }

    fn mo_energy(&self) -> &[DVector<f64>] {
        &self.state.mo_energy
    }

    fn method(&self) -> &'static str {
        L::NAME
    }
}

/// `D_k = sum_i n_ki c_ki c_ki^H`
fn make_density(mo_coeff: &[CMatrix], mo_occ: &[DVector<f64>]) -> Vec<CMatrix> {
    mo_coeff
        .par_iter()
        .zip(mo_occ)
        .map(|(c, occ)| {
            let occupied: Vec<usize> = (0..occ.len()).filter(|&i| occ[i] > 0.0).collect();
            let c_occ = c.select_columns(&occupied);
            let mut weighted = c_occ.clone();
            for (col, &i) in occupied.iter().enumerate() {
                weighted.column_mut(col).iter_mut().for_each(|z| *z *= occ[i]);
            }
            weighted * c_occ.adjoint()
        })
        .collect()
}

/// Neutral-atom populations per AO: each atom's electrons fill its shells
/// in basis order, two per spherical orbital, spread evenly over a shell's
/// Cartesian components. Scaled to `nelectron` for charged cells.
fn atom_populations(cell: &Cell, nelectron: usize) -> Result<DVector<f64>> {
    let mut q = DVector::zeros(cell.nao());
    let mut remaining: Vec<f64> = (0..cell.natm()).map(|i| cell.atom_charge(i)).collect();
    for placed in cell.shells() {
        let ncart = placed.shell.ncart();
        let capacity = 2.0 * (2 * placed.shell.l + 1) as f64;
        let take = remaining[placed.atom].clamp(0.0, capacity);
        remaining[placed.atom] -= take;
        for a in 0..ncart {
            q[placed.ao_offset + a] = take / ncart as f64;
        }
    }

    let total = q.sum();
    if total <= 0.0 {
        return Err(ScfError::InvalidConfiguration(
            "atomic guess found no electrons to place".to_string(),
        ));
    }
    Ok(q * (nelectron as f64 / total))
}
