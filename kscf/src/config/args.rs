//! Command-line argument parsing for periodic SCF calculations

use super::{Relativity, SpinMethod};
use clap::Parser;

/// Periodic k-point Kohn-Sham SCF with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override the spin layout
    #[arg(long, value_enum)]
    pub spin: Option<SpinMethod>,

    /// Override the exchange-correlation functional (lda, hartree)
    #[arg(long)]
    pub xc: Option<String>,

    /// Override the k-point mesh, e.g. `2,1,1`
    #[arg(long, value_delimiter = ',')]
    pub kmesh: Option<Vec<usize>>,

    /// Fit the Coulomb kernel in an auxiliary basis
    #[arg(long)]
    pub density_fit: bool,

    /// Override the relativistic treatment
    #[arg(long, value_enum)]
    pub relativity: Option<Relativity>,

    /// Override the speed of light (atomic units)
    #[arg(long)]
    pub light_speed: Option<f64>,

    /// Override maximum SCF cycles
    #[arg(long)]
    pub max_cycle: Option<usize>,

    /// Override the energy convergence threshold
    #[arg(long)]
    pub conv_tol: Option<f64>,

    /// Override DIIS subspace size
    #[arg(long)]
    pub diis_space: Option<usize>,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write a plain-text result summary to this file
    #[arg(short, long)]
    pub summary: Option<String>,
}

impl Args {
    pub fn kmesh(&self) -> Option<[usize; 3]> {
        match self.kmesh.as_deref() {
            Some(&[a, b, c]) => Some([a, b, c]),
            _ => None,
        }
    }
}
