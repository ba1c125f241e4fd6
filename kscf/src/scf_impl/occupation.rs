//! Orbital occupations over all k-points: aufbau filling or smeared
//! occupations around a bisected Fermi level.

use super::settings::Smearing;
use crate::error::{Result, ScfError};
use nalgebra::DVector;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Occupation numbers per k-point plus the quantities derived while filling.
#[derive(Debug, Clone)]
pub struct Occupations {
    pub mo_occ: Vec<DVector<f64>>,
    /// Highest occupied level (aufbau) or chemical potential (smearing).
    pub fermi: f64,
    /// Electronic entropy in units of k_B; zero without smearing.
    pub entropy: f64,
}

impl Occupations {
    /// Weighted electron count `sum_k w_k sum_i n_ki`.
    pub fn electron_count(&self, weights: &[f64]) -> f64 {
        self.mo_occ
            .iter()
            .zip(weights)
            .map(|(occ, w)| w * occ.sum())
            .sum()
    }
}

/// Levels closer than this are one degenerate group when filling.
pub const DEGENERACY_TOL: f64 = 1e-8;

/// Fill the lowest `nk * nelectron / occupancy` orbitals across all k-points.
///
/// Levels within [`DEGENERACY_TOL`] of the highest occupied level form one
/// group. When that group has more members than remaining electrons, each
/// member receives the same fractional occupation, so the density does not
/// depend on how the eigensolver rotates a degenerate set.
pub fn aufbau(mo_energy: &[DVector<f64>], nelectron: usize, occupancy: f64) -> Result<Occupations> {
    let nk = mo_energy.len();
    let per_cell = nelectron as f64 / occupancy;
    if per_cell.fract() != 0.0 {
        return Err(ScfError::InvalidConfiguration(format!(
            "{nelectron} electrons cannot fill orbitals of occupancy {occupancy}"
        )));
    }
    let nocc = nk * per_cell as usize;
    let norb: usize = mo_energy.iter().map(|e| e.len()).sum();
    if nocc > norb {
        return Err(ScfError::InvalidConfiguration(format!(
            "{nocc} occupied orbitals requested but only {norb} available"
        )));
    }

    let mut levels: Vec<(f64, usize, usize)> = mo_energy
        .iter()
        .enumerate()
        .flat_map(|(k, e)| e.iter().enumerate().map(move |(i, &v)| (v, k, i)))
        .collect();
    levels.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });

    let mut mo_occ: Vec<DVector<f64>> = mo_energy.iter().map(|e| DVector::zeros(e.len())).collect();
    if nocc == 0 {
        return Ok(Occupations {
            mo_occ,
            fermi: f64::NEG_INFINITY,
            entropy: 0.0,
        });
    }

    let homo = levels[nocc - 1].0;
    let lower = levels.partition_point(|l| l.0 < homo - DEGENERACY_TOL);
    let upper = levels.partition_point(|l| l.0 <= homo + DEGENERACY_TOL);
    let fraction = occupancy * (nocc - lower) as f64 / (upper - lower) as f64;
    for &(_, k, i) in &levels[..lower] {
        mo_occ[k][i] = occupancy;
    }
    for &(_, k, i) in &levels[lower..upper] {
        mo_occ[k][i] = fraction;
    }
    if upper > nocc {
        warn!(
            "{} degenerate levels at {:.8} au share {} electrons per cell",
            upper - lower,
            homo,
            occupancy * (nocc - lower) as f64 / nk as f64
        );
    }

    if let Some(&(lumo, _, _)) = levels.get(upper) {
        debug!("HOMO = {:.8}, LUMO = {:.8}, gap = {:.6}", homo, lumo, lumo - homo);
    }

    Ok(Occupations {
        mo_occ,
        fermi: homo,
        entropy: 0.0,
    })
}

impl Smearing {
    /// Occupation fraction at `x = (e - mu) / sigma`.
    fn fraction(&self, x: f64) -> f64 {
        match self {
            Smearing::FermiDirac(_) => {
                if x > 0.0 {
                    let t = (-x).exp();
                    t / (1.0 + t)
                } else {
                    1.0 / (1.0 + x.exp())
                }
            }
            Smearing::Gaussian(_) => 0.5 * libm::erfc(x),
        }
    }

    /// Entropy contribution of one orbital at `x`.
    fn entropy(&self, x: f64) -> f64 {
        match self {
            Smearing::FermiDirac(_) => {
                let f = self.fraction(x);
                let mut s = 0.0;
                if f > 0.0 {
                    s -= f * f.ln();
                }
                if f < 1.0 {
                    s -= (1.0 - f) * (1.0 - f).ln();
                }
                s
            }
            Smearing::Gaussian(_) => (-x * x).exp() / (2.0 * std::f64::consts::PI.sqrt()),
        }
    }
}

const FERMI_MAX_ITER: usize = 200;

/// Smeared occupations `occupancy * f((e - mu) / sigma)` with `mu` bisected so
/// that the weighted electron count equals `nelectron`.
pub fn smeared(
    mo_energy: &[DVector<f64>],
    weights: &[f64],
    nelectron: usize,
    occupancy: f64,
    smearing: &Smearing,
) -> Result<Occupations> {
    let sigma = smearing.sigma();
    let target = nelectron as f64;
    let capacity: f64 = mo_energy
        .iter()
        .zip(weights)
        .map(|(e, w)| w * occupancy * e.len() as f64)
        .sum();
    if target > capacity + 1e-12 {
        return Err(ScfError::InvalidConfiguration(format!(
            "{nelectron} electrons exceed the {capacity} available states"
        )));
    }

    let count = |mu: f64| -> f64 {
        mo_energy
            .iter()
            .zip(weights)
            .map(|(e, w)| w * occupancy * e.iter().map(|&v| smearing.fraction((v - mu) / sigma)).sum::<f64>())
            .sum()
    };

    let (lowest, highest) = mo_energy
        .iter()
        .flat_map(|e| e.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let mut lo = lowest - 50.0 * sigma;
    let mut hi = highest + 50.0 * sigma;
    let mut mu = 0.5 * (lo + hi);
    for _ in 0..FERMI_MAX_ITER {
        mu = 0.5 * (lo + hi);
        match count(mu).partial_cmp(&target) {
            Some(Ordering::Less) => lo = mu,
            Some(Ordering::Greater) => hi = mu,
            _ => break,
        }
        if hi - lo < 1e-15 * (1.0 + mu.abs()) {
            break;
        }
    }
    if (count(mu) - target).abs() > 1e-8 * target.max(1.0) {
        return Err(ScfError::NumericalInstability(format!(
            "Fermi level bisection failed: {} electrons at mu = {mu}",
            count(mu)
        )));
    }

    let mo_occ = mo_energy
        .iter()
        .map(|e| e.map(|v| occupancy * smearing.fraction((v - mu) / sigma)))
        .collect();
    let entropy = mo_energy
        .iter()
        .zip(weights)
        .map(|(e, w)| w * occupancy * e.iter().map(|&v| smearing.entropy((v - mu) / sigma)).sum::<f64>())
        .sum();
    debug!("Fermi level {:.8} au, entropy {:.6e}", mu, entropy);

    Ok(Occupations {
        mo_occ,
        fermi: mu,
        entropy,
    })
}
