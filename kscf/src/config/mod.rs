//! Configuration management for periodic Kohn-Sham calculations
//!
//! A run is described by a YAML file with four sections (`cell`, `kmesh`,
//! `method`, `scf_params`); missing values take the defaults below and
//! command-line arguments override the file.

mod args;

pub use args::Args;

use crate::error::{Result, ScfError};
use crate::scf_impl::{InitGuess, ScfSettings, Smearing, XcFunctional};
use cell::{Cell, Unit};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Speed of light in atomic units.
pub const LIGHT_SPEED: f64 = 137.035999084;

/// Main configuration structure for periodic SCF calculations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub cell: CellConfig,
    #[serde(default)]
    pub kmesh: Option<[usize; 3]>,
    #[serde(default)]
    pub method: MethodConfig,
    #[serde(default)]
    pub scf_params: ScfParams,
}

/// Unit cell description, in the same notation as [`cell::CellBuilder`]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellConfig {
    /// `"C 0 0 0; C 0.89 0.89 0.89"`
    pub atom: String,
    /// Lattice vectors as three rows
    pub a: String,
    pub basis: String,
    #[serde(default)]
    pub pseudo: Option<String>,
    /// `angstrom` (default) or `bohr`
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub charge: Option<i32>,
}

impl CellConfig {
    pub fn build(&self) -> Result<Cell> {
        let mut builder = Cell::builder()
            .atom(&self.atom)
            .a(&self.a)
            .basis(&self.basis)
            .unit(parse_unit(self.unit.as_deref())?)
            .charge(self.charge.unwrap_or(0));
        if let Some(pseudo) = &self.pseudo {
            builder = builder.pseudo(pseudo);
        }
        Ok(builder.build()?)
    }
}

fn parse_unit(unit: Option<&str>) -> Result<Unit> {
    match unit.map(|u| u.trim().to_lowercase()).as_deref() {
        None | Some("angstrom") | Some("a") => Ok(Unit::Angstrom),
        Some("bohr") | Some("b") | Some("au") => Ok(Unit::Bohr),
        Some(other) => Err(ScfError::InvalidConfiguration(format!(
            "unknown length unit '{other}'"
        ))),
    }
}

/// Spin layout of the Kohn-Sham matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpinMethod {
    #[default]
    Krks,
    Kgks,
}

/// Relativistic treatment of the core Hamiltonian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Relativity {
    #[default]
    None,
    #[value(name = "sfx2c1e")]
    Sfx2c1e,
    #[value(name = "x2c1e")]
    X2c1e,
}

/// Which solver and Hamiltonian decorators to use
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MethodConfig {
    pub spin: Option<SpinMethod>,
    pub xc: Option<String>,
    pub density_fit: Option<bool>,
    pub relativity: Option<Relativity>,
    pub light_speed: Option<f64>,
}

impl MethodConfig {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        self.spin.get_or_insert(SpinMethod::Krks);
        self.xc.get_or_insert_with(|| "lda".to_string());
        self.density_fit.get_or_insert(false);
        self.relativity.get_or_insert(Relativity::None);
        self.light_speed.get_or_insert(LIGHT_SPEED);
        self
    }

    pub fn xc(&self) -> Result<XcFunctional> {
        self.xc.as_deref().unwrap_or("lda").parse()
    }
}

/// SCF-specific parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScfParams {
    pub conv_tol: Option<f64>,
    /// Defaults to `sqrt(conv_tol)` when absent
    pub conv_tol_density: Option<f64>,
    pub max_cycle: Option<usize>,
    pub diis: Option<bool>,
    pub diis_space: Option<usize>,
    pub diis_start_cycle: Option<usize>,
    pub damping: Option<f64>,
    pub level_shift: Option<f64>,
    pub smearing: Option<Smearing>,
    pub init_guess: Option<String>,
    /// Seconds
    pub max_wall_time: Option<f64>,
}

impl Default for ScfParams {
    fn default() -> Self {
        ScfParams {
            conv_tol: Some(1e-9),
            conv_tol_density: None,
            max_cycle: Some(50),
            diis: Some(true),
            diis_space: Some(8),
            diis_start_cycle: Some(1),
            damping: Some(0.0),
            level_shift: Some(0.0),
            smearing: None,
            init_guess: Some("atom".to_string()),
            max_wall_time: None,
        }
    }
}

impl ScfParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.conv_tol.is_none() {
            self.conv_tol = defaults.conv_tol;
        }
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.diis.is_none() {
            self.diis = defaults.diis;
        }
        if self.diis_space.is_none() {
            self.diis_space = defaults.diis_space;
        }
        if self.diis_start_cycle.is_none() {
            self.diis_start_cycle = defaults.diis_start_cycle;
        }
        if self.damping.is_none() {
            self.damping = defaults.damping;
        }
        if self.level_shift.is_none() {
            self.level_shift = defaults.level_shift;
        }
        if self.init_guess.is_none() {
            self.init_guess = defaults.init_guess;
        }
        self
    }

    /// Validated solver settings for the given functional.
    pub fn to_settings(&self, xc: XcFunctional) -> Result<ScfSettings> {
        let defaults = Self::default();
        let init_guess = match self.init_guess.as_deref() {
            Some(guess) => guess.parse()?,
            None => InitGuess::default(),
        };
        let max_wall_time = match self.max_wall_time {
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(ScfError::InvalidConfiguration(format!(
                    "max_wall_time must be positive seconds, got {secs}"
                )))
            }
            None => None,
        };

        let mut builder = ScfSettings::builder()
            .xc(xc)
            .conv_tol(self.conv_tol.or(defaults.conv_tol).unwrap_or(1e-9))
            .max_cycle(self.max_cycle.or(defaults.max_cycle).unwrap_or(50))
            .diis(self.diis.unwrap_or(true))
            .diis_space(self.diis_space.or(defaults.diis_space).unwrap_or(8))
            .diis_start_cycle(self.diis_start_cycle.unwrap_or(1))
            .damping(self.damping.unwrap_or(0.0))
            .level_shift(self.level_shift.unwrap_or(0.0))
            .smearing(self.smearing)
            .init_guess(init_guess)
            .max_wall_time(max_wall_time);
        if let Some(tol) = self.conv_tol_density {
            builder = builder.conv_tol_density(tol);
        }
        builder.build()
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.kmesh.get_or_insert([1, 1, 1]);
        self.method = self.method.with_defaults();
        self.scf_params = self.scf_params.with_defaults();
        self
    }

    /// Command-line values take precedence over the file
    pub fn apply_args(mut self, args: &Args) -> Self {
        if let Some(mesh) = args.kmesh() {
            self.kmesh = Some(mesh);
        }
        if let Some(spin) = args.spin {
            self.method.spin = Some(spin);
        }
        if let Some(xc) = &args.xc {
            self.method.xc = Some(xc.clone());
        }
        if args.density_fit {
            self.method.density_fit = Some(true);
        }
        if let Some(relativity) = args.relativity {
            self.method.relativity = Some(relativity);
        }
        if let Some(c) = args.light_speed {
            self.method.light_speed = Some(c);
        }
        if let Some(max_cycle) = args.max_cycle {
            self.scf_params.max_cycle = Some(max_cycle);
        }
        if let Some(conv_tol) = args.conv_tol {
            self.scf_params.conv_tol = Some(conv_tol);
        }
        if let Some(diis_space) = args.diis_space {
            self.scf_params.diis_space = Some(diis_space);
        }
        self
    }

    pub fn kmesh(&self) -> [usize; 3] {
        self.kmesh.unwrap_or([1, 1, 1])
    }

    pub fn spin(&self) -> SpinMethod {
        self.method.spin.unwrap_or_default()
    }

    pub fn relativity(&self) -> Relativity {
        self.method.relativity.unwrap_or_default()
    }

    pub fn light_speed(&self) -> f64 {
        self.method.light_speed.unwrap_or(LIGHT_SPEED)
    }

    pub fn density_fit(&self) -> bool {
        self.method.density_fit.unwrap_or(false)
    }

    pub fn settings(&self) -> Result<ScfSettings> {
        self.scf_params.to_settings(self.method.xc()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const DIAMOND: &str = r#"
cell:
  atom: "C 0 0 0; C 0.8917 0.8917 0.8917"
  a: |
    0 1.7834 1.7834
    1.7834 0 1.7834
    1.7834 1.7834 0
  basis: gth-szv
  pseudo: gth-pade

kmesh: [2, 1, 1]

method:
  spin: kgks
  density_fit: true
  relativity: sfx2c1e

scf_params:
  conv_tol: 1.0e-10
  smearing:
    method: fermi_dirac
    sigma: 0.01
"#;

    #[test]
    fn test_yaml_parsing() {
        let config: Config = serde_yml::from_str::<Config>(DIAMOND).unwrap().with_defaults();
        assert_eq!(config.kmesh(), [2, 1, 1]);
        assert_eq!(config.spin(), SpinMethod::Kgks);
        assert_eq!(config.relativity(), Relativity::Sfx2c1e);
        assert!(config.density_fit());
        assert_eq!(config.light_speed(), LIGHT_SPEED);
        assert_eq!(config.scf_params.smearing, Some(Smearing::FermiDirac(0.01)));

        let settings = config.settings().unwrap();
        assert_eq!(settings.xc(), XcFunctional::Lda);
        assert_eq!(settings.conv_tol(), 1e-10);
        assert!((settings.conv_tol_density() - 1e-5).abs() < 1e-15);
        assert_eq!(settings.diis_space(), 8);

        let cell = config.cell.build().unwrap();
        assert_eq!(cell.natm(), 2);
        assert!(cell.has_pseudo());
    }

    #[test]
    fn test_config_defaults() {
        let yaml = r#"
cell:
  atom: "H 0 0 0; H 0.74 0 0"
  a: "4 0 0; 0 4 0; 0 0 4"
  basis: sto-3g
"#;
        let config: Config = serde_yml::from_str::<Config>(yaml).unwrap().with_defaults();
        assert_eq!(config.kmesh(), [1, 1, 1]);
        assert_eq!(config.spin(), SpinMethod::Krks);
        assert_eq!(config.relativity(), Relativity::None);
        assert!(!config.density_fit());
        assert_eq!(config.scf_params.max_cycle, Some(50));
        assert_eq!(config.scf_params.diis_space, Some(8));
        assert_eq!(config.settings().unwrap(), ScfSettings::default());
    }

    #[test]
    fn test_command_line_overrides() {
        let config: Config = serde_yml::from_str::<Config>(DIAMOND).unwrap().with_defaults();
        let args = Args::parse_from([
            "kscf",
            "-c",
            "run.yaml",
            "--spin",
            "krks",
            "--relativity",
            "x2c1e",
            "--light-speed",
            "10",
            "--kmesh",
            "1,1,1",
            "--max-cycle",
            "7",
        ]);
        let config = config.apply_args(&args);
        assert_eq!(config.spin(), SpinMethod::Krks);
        assert_eq!(config.relativity(), Relativity::X2c1e);
        assert_eq!(config.light_speed(), 10.0);
        assert_eq!(config.kmesh(), [1, 1, 1]);
        assert_eq!(config.settings().unwrap().max_cycle(), 7);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut params = ScfParams::default();
        params.diis_space = Some(1);
        assert!(matches!(
            params.to_settings(XcFunctional::Lda),
            Err(ScfError::InvalidConfiguration(_))
        ));

        let mut params = ScfParams::default();
        params.init_guess = Some("huckel".to_string());
        assert!(params.to_settings(XcFunctional::Lda).is_err());

        let method = MethodConfig {
            xc: Some("b3lyp".to_string()),
            ..MethodConfig::default()
        };
        assert!(method.xc().is_err());
        assert!(parse_unit(Some("parsec")).is_err());
    }
}
