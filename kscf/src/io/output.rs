//! Output formatting and logging utilities

use crate::app::RunSummary;
use color_eyre::eyre::Result;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Setup output logging to file or stdout
pub fn setup_output(output_path: Option<&String>) {
    match output_path {
        Some(path) => {
            if let Ok(log) = File::create(path) {
                let file_layer = layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false);
                Registry::default().with(file_layer).init();
                info!("Output will be written to: {}", path);
            } else {
                eprintln!("Could not create output file: {}", path);
            }
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true);
            Registry::default().with(stdout_layer).init();
            info!("Output will be printed to stdout");
        }
    }
}

/// Write a plain-text summary of a finished run
pub fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(writer, "{} / {}", summary.method, summary.description)?;
    writeln!(writer, "==================\n")?;
    writeln!(
        writer,
        "Converged: {} ({} cycles)",
        if summary.converged { "yes" } else { "no" },
        summary.cycles
    )?;
    writeln!(writer, "Total energy:      {:>20.12} au", summary.energy)?;
    writeln!(writer, "  one-electron:    {:>20.12} au", summary.components.one_electron)?;
    writeln!(writer, "  Hartree:         {:>20.12} au", summary.components.hartree)?;
    writeln!(writer, "  exchange:        {:>20.12} au", summary.components.xc)?;
    writeln!(writer, "  nuclear:         {:>20.12} au", summary.components.nuclear)?;
    if summary.components.smearing != 0.0 {
        writeln!(writer, "  -sigma S:        {:>20.12} au", -summary.components.smearing)?;
    }
    writeln!(writer, "Fermi level:       {:>20.12} au\n", summary.fermi)?;

    writeln!(
        writer,
        "{:>4} {:>10} {:>10} {:>10} {:>8} {:>16} {:>16}",
        "k", "kx", "ky", "kz", "weight", "HOMO", "LUMO"
    )?;
    writeln!(writer, "{}", "-".repeat(80))?;
    for (k, band) in summary.bands.iter().enumerate() {
        let level = |e: Option<f64>| {
            e.map(|e| format!("{e:>16.8}"))
                .unwrap_or_else(|| format!("{:>16}", "-"))
        };
        writeln!(
            writer,
            "{:>4} {:>10.6} {:>10.6} {:>10.6} {:>8.4} {} {}",
            k + 1,
            band.kpt.x,
            band.kpt.y,
            band.kpt.z,
            band.weight,
            level(band.homo),
            level(band.lumo)
        )?;
    }
    Ok(())
}
