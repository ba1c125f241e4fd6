//! Immutable solver settings and their builder.

use crate::error::{Result, ScfError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Exchange-correlation treatment of the effective potential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XcFunctional {
    /// Slater (LDA) exchange
    Lda,
    /// Hartree term only
    Hartree,
}

impl FromStr for XcFunctional {
    type Err = ScfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lda" | "lda,vwn" | "slater" | "lda_x" => Ok(XcFunctional::Lda),
            "hartree" | "none" => Ok(XcFunctional::Hartree),
            other => Err(ScfError::InvalidConfiguration(format!(
                "unsupported exchange-correlation functional '{other}'"
            ))),
        }
    }
}

impl fmt::Display for XcFunctional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XcFunctional::Lda => write!(f, "lda"),
            XcFunctional::Hartree => write!(f, "hartree"),
        }
    }
}

/// Starting density when none is supplied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitGuess {
    /// Occupied eigenvectors of the core Hamiltonian
    Core,
    /// Superposition of neutral-atom populations
    #[default]
    Atom,
}

impl FromStr for InitGuess {
    type Err = ScfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" | "hcore" | "1e" => Ok(InitGuess::Core),
            "atom" | "minao" => Ok(InitGuess::Atom),
            other => Err(ScfError::InvalidConfiguration(format!(
                "unknown initial guess '{other}'"
            ))),
        }
    }
}

/// Occupation smearing with width `sigma` in Hartree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method", content = "sigma")]
pub enum Smearing {
    FermiDirac(f64),
    Gaussian(f64),
}

impl Smearing {
    pub fn sigma(&self) -> f64 {
        match self {
            Smearing::FermiDirac(sigma) | Smearing::Gaussian(sigma) => *sigma,
        }
    }
}

/// Settings of one SCF run. Only constructible through [`ScfSettingsBuilder`],
/// which validates every field.
#[derive(Clone, Debug, PartialEq)]
pub struct ScfSettings {
    xc: XcFunctional,
    conv_tol: f64,
    conv_tol_density: f64,
    max_cycle: usize,
    diis: bool,
    diis_space: usize,
    diis_start_cycle: usize,
    damping: f64,
    level_shift: f64,
    smearing: Option<Smearing>,
    init_guess: InitGuess,
    max_wall_time: Option<Duration>,
    lindep: f64,
}

impl Default for ScfSettings {
    fn default() -> Self {
        ScfSettings {
            xc: XcFunctional::Lda,
            conv_tol: 1e-9,
            conv_tol_density: 1e-9_f64.sqrt(),
            max_cycle: 50,
            diis: true,
            diis_space: 8,
            diis_start_cycle: 1,
            damping: 0.0,
            level_shift: 0.0,
            smearing: None,
            init_guess: InitGuess::Atom,
            max_wall_time: None,
            lindep: 1e-10,
        }
    }
}

impl ScfSettings {
    pub fn builder() -> ScfSettingsBuilder {
        ScfSettingsBuilder::default()
    }

    pub fn xc(&self) -> XcFunctional {
        self.xc
    }

    pub fn conv_tol(&self) -> f64 {
        self.conv_tol
    }

    /// Threshold on `sqrt(sum_k w_k ||D_k - D_k^old||_F^2)`.
    pub fn conv_tol_density(&self) -> f64 {
        self.conv_tol_density
    }

    pub fn max_cycle(&self) -> usize {
        self.max_cycle
    }

    pub fn diis(&self) -> bool {
        self.diis
    }

    pub fn diis_space(&self) -> usize {
        self.diis_space
    }

    /// First cycle (counted from zero) at which DIIS extrapolation is used.
    pub fn diis_start_cycle(&self) -> usize {
        self.diis_start_cycle
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn level_shift(&self) -> f64 {
        self.level_shift
    }

    pub fn smearing(&self) -> Option<&Smearing> {
        self.smearing.as_ref()
    }

    pub fn init_guess(&self) -> InitGuess {
        self.init_guess
    }

    pub fn max_wall_time(&self) -> Option<Duration> {
        self.max_wall_time
    }

    /// Smallest overlap eigenvalue accepted by the orthogonalizer.
    pub fn lindep(&self) -> f64 {
        self.lindep
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ScfError::InvalidConfiguration(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        };
        positive("conv_tol", self.conv_tol)?;
        positive("conv_tol_density", self.conv_tol_density)?;
        positive("lindep", self.lindep)?;
        if self.max_cycle == 0 {
            return Err(ScfError::InvalidConfiguration(
                "max_cycle must be at least 1".to_string(),
            ));
        }
        if self.diis && self.diis_space < 2 {
            return Err(ScfError::InvalidConfiguration(format!(
                "diis_space must be at least 2 when DIIS is enabled, got {}",
                self.diis_space
            )));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(ScfError::InvalidConfiguration(format!(
                "damping must lie in [0, 1), got {}",
                self.damping
            )));
        }
        if !self.level_shift.is_finite() || self.level_shift < 0.0 {
            return Err(ScfError::InvalidConfiguration(format!(
                "level_shift must be non-negative, got {}",
                self.level_shift
            )));
        }
        if let Some(smearing) = &self.smearing {
            positive("smearing width", smearing.sigma())?;
        }
        if self.max_wall_time == Some(Duration::ZERO) {
            return Err(ScfError::InvalidConfiguration(
                "max_wall_time must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ScfSettings`]; `conv_tol_density` defaults to `sqrt(conv_tol)`.
#[derive(Clone, Debug, Default)]
pub struct ScfSettingsBuilder {
    settings: ScfSettings,
    conv_tol_density: Option<f64>,
}

impl ScfSettingsBuilder {
    pub fn xc(mut self, xc: XcFunctional) -> Self {
        self.settings.xc = xc;
        self
    }

    pub fn conv_tol(mut self, conv_tol: f64) -> Self {
        self.settings.conv_tol = conv_tol;
        self
    }

    pub fn conv_tol_density(mut self, conv_tol_density: f64) -> Self {
        self.conv_tol_density = Some(conv_tol_density);
        self
    }

    pub fn max_cycle(mut self, max_cycle: usize) -> Self {
        self.settings.max_cycle = max_cycle;
        self
    }

    pub fn diis(mut self, enabled: bool) -> Self {
        self.settings.diis = enabled;
        self
    }

    pub fn diis_space(mut self, diis_space: usize) -> Self {
        self.settings.diis_space = diis_space;
        self
    }

    pub fn diis_start_cycle(mut self, cycle: usize) -> Self {
        self.settings.diis_start_cycle = cycle;
        self
    }

    pub fn damping(mut self, damping: f64) -> Self {
        self.settings.damping = damping;
        self
    }

    pub fn level_shift(mut self, level_shift: f64) -> Self {
        self.settings.level_shift = level_shift;
        self
    }

    pub fn smearing(mut self, smearing: Option<Smearing>) -> Self {
        self.settings.smearing = smearing;
        self
    }

    pub fn init_guess(mut self, init_guess: InitGuess) -> Self {
        self.settings.init_guess = init_guess;
        self
    }

    pub fn max_wall_time(mut self, limit: Option<Duration>) -> Self {
        self.settings.max_wall_time = limit;
        self
    }

    pub fn lindep(mut self, lindep: f64) -> Self {
        self.settings.lindep = lindep;
        self
    }

    pub fn build(self) -> Result<ScfSettings> {
        let mut settings = self.settings;
        settings.conv_tol_density = self
            .conv_tol_density
            .unwrap_or_else(|| settings.conv_tol.sqrt());
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ScfSettings::builder().build().unwrap();
        assert_eq!(settings.xc(), XcFunctional::Lda);
        assert_eq!(settings.diis_space(), 8);
        assert_eq!(settings.diis_start_cycle(), 1);
        assert_eq!(settings.max_cycle(), 50);
        assert!((settings.conv_tol_density() - 1e-9_f64.sqrt()).abs() < 1e-18);
    }

    #[test]
    fn test_density_tolerance_follows_energy_tolerance() {
        let settings = ScfSettings::builder().conv_tol(1e-10).build().unwrap();
        assert!((settings.conv_tol_density() - 1e-5).abs() < 1e-15);
        let explicit = ScfSettings::builder()
            .conv_tol(1e-10)
            .conv_tol_density(1e-7)
            .build()
            .unwrap();
        assert_eq!(explicit.conv_tol_density(), 1e-7);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let cases = [
            ScfSettings::builder().conv_tol(0.0),
            ScfSettings::builder().conv_tol(-1e-8),
            ScfSettings::builder().max_cycle(0),
            ScfSettings::builder().diis_space(1),
            ScfSettings::builder().damping(1.0),
            ScfSettings::builder().level_shift(-0.1),
            ScfSettings::builder().smearing(Some(Smearing::FermiDirac(-0.01))),
            ScfSettings::builder().max_wall_time(Some(Duration::ZERO)),
        ];
        for builder in cases {
            assert!(matches!(
                builder.build(),
                Err(ScfError::InvalidConfiguration(_))
            ));
        }
        // a one-vector window is fine when DIIS is off
        assert!(ScfSettings::builder().diis(false).diis_space(1).build().is_ok());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("LDA".parse::<XcFunctional>().unwrap(), XcFunctional::Lda);
        assert_eq!("hartree".parse::<XcFunctional>().unwrap(), XcFunctional::Hartree);
        assert!("b3lyp".parse::<XcFunctional>().is_err());
        assert_eq!("minao".parse::<InitGuess>().unwrap(), InitGuess::Atom);
        assert_eq!("1e".parse::<InitGuess>().unwrap(), InitGuess::Core);
    }
}
