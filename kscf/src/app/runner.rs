use crate::config::{Config, Relativity, SpinMethod};
use crate::hamiltonian::{GaussianModel, HamiltonianBuilder, HamiltonianBuilderExt};
use crate::scf_impl::{EnergyComponents, KohnShamScf, ScfSettings, SpinLayout, SCF};
use crate::scf_impl::{Generalized, Restricted};
use cell::{Cell, KPoints};
use color_eyre::eyre::{Result, WrapErr};
use nalgebra::Vector3;
use tracing::{info, warn};

/// Frontier levels at one k-point.
#[derive(Debug, Clone, PartialEq)]
pub struct BandEdges {
    pub kpt: Vector3<f64>,
    pub weight: f64,
    pub homo: Option<f64>,
    pub lumo: Option<f64>,
}

/// Result of one SCF run, converged or not.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub method: &'static str,
    pub description: String,
    pub energy: f64,
    pub components: EnergyComponents,
    pub converged: bool,
    pub cycles: usize,
    pub fermi: f64,
    pub bands: Vec<BandEdges>,
}

impl RunSummary {
    pub fn from_scf<H: HamiltonianBuilder, L: SpinLayout>(scf: &KohnShamScf<H, L>) -> Self {
        let kpts = scf.builder().kpts();
        let bands = scf
            .mo_energy()
            .iter()
            .zip(scf.mo_occ())
            .zip(kpts.iter())
            .map(|((energies, occ), (k, weight))| {
                let occupied = energies.iter().zip(occ.iter());
                BandEdges {
                    kpt: *k,
                    weight,
                    homo: occupied
                        .clone()
                        .filter(|&(_, &n)| n > 0.0)
                        .map(|(&e, _)| e)
                        .reduce(f64::max),
                    lumo: occupied
                        .filter(|&(_, &n)| n == 0.0)
                        .map(|(&e, _)| e)
                        .reduce(f64::min),
                }
            })
            .collect();

        RunSummary {
            method: scf.method(),
            description: scf.builder().describe(),
            energy: scf.energy_tot(),
            components: scf.energy_components(),
            converged: scf.converged(),
            cycles: scf.cycles(),
            fermi: scf.fermi_level(),
            bands,
        }
    }
}

/// Compose the Hamiltonian builder requested by the configuration.
pub fn build_hamiltonian(
    cell: Cell,
    kpts: KPoints,
    config: &Config,
) -> Result<Box<dyn HamiltonianBuilder>> {
    let model = GaussianModel::new(cell, kpts).wrap_err("Failed to build the model Hamiltonian")?;
    let mut builder: Box<dyn HamiltonianBuilder> = Box::new(model);

    if config.density_fit() {
        builder = Box::new(builder.density_fit().wrap_err("Density fitting failed")?);
    }
    let c = config.light_speed();
    builder = match config.relativity() {
        Relativity::None => builder,
        Relativity::Sfx2c1e => Box::new(builder.sfx2c1e(c)?),
        Relativity::X2c1e => Box::new(builder.x2c1e(c)?),
    };
    info!("Hamiltonian: {}", builder.describe());
    Ok(builder)
}

pub fn run_calculation(
    builder: Box<dyn HamiltonianBuilder>,
    spin: SpinMethod,
    settings: ScfSettings,
) -> Result<RunSummary> {
    match spin {
        SpinMethod::Krks => solve::<Restricted>(builder, settings),
        SpinMethod::Kgks => solve::<Generalized>(builder, settings),
    }
}

fn solve<L: SpinLayout>(
    builder: Box<dyn HamiltonianBuilder>,
    settings: ScfSettings,
) -> Result<RunSummary> {
    let mut scf = KohnShamScf::<_, L>::new(builder, settings)?;

    info!("\nStarting {} cycle...\n", L::NAME);
    match scf.kernel() {
        Ok(_) => {}
        Err(err) if !err.is_fatal() => warn!("{}", err),
        Err(err) => return Err(err).wrap_err(format!("{} calculation failed", L::NAME)),
    }
    Ok(RunSummary::from_scf(&scf))
}
