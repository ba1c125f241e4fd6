use super::runner::RunSummary;
use tracing::info;

pub fn report_summary(summary: &RunSummary) {
    if summary.converged {
        info!("\n{} calculation finished.", summary.method);
    } else {
        info!("\n{} calculation stopped without converging.", summary.method);
    }

    info!("\nFrontier levels per k-point:");
    for (k, band) in summary.bands.iter().enumerate() {
        info!(
            "  k {:>3} [{:+.4}, {:+.4}, {:+.4}]: HOMO = {} LUMO = {}",
            k + 1,
            band.kpt.x,
            band.kpt.y,
            band.kpt.z,
            format_level(band.homo),
            format_level(band.lumo)
        );
    }
    if let Some(gap) = band_gap(summary) {
        info!("Band gap: {:.6} au", gap);
    }
    info!("Fermi level: {:.8} au", summary.fermi);

    let parts = &summary.components;
    info!("\nEnergy components:");
    info!("  One-electron: {:>20.12} au", parts.one_electron);
    info!("  Hartree:      {:>20.12} au", parts.hartree);
    info!("  Exchange:     {:>20.12} au", parts.xc);
    info!("  Nuclear:      {:>20.12} au", parts.nuclear);
    if parts.smearing != 0.0 {
        info!("  -sigma S:     {:>20.12} au", -parts.smearing);
    }
    info!("\n{} Total Energy: {:.10} au", summary.method, summary.energy);
}

fn format_level(level: Option<f64>) -> String {
    level.map_or_else(|| "-".to_string(), |e| format!("{e:.8}"))
}

/// Lowest unoccupied minus highest occupied level over all k-points.
fn band_gap(summary: &RunSummary) -> Option<f64> {
    let homo = summary.bands.iter().filter_map(|b| b.homo).reduce(f64::max)?;
    let lumo = summary.bands.iter().filter_map(|b| b.lumo).reduce(f64::min)?;
    Some(lumo - homo)
}
