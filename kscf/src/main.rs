//! Periodic Kohn-Sham SCF command-line interface
//!
//! Reads a YAML description of the cell, k-mesh and method and runs the
//! corresponding KRKS or KGKS calculation.

use color_eyre::eyre::Result;
use kscf::app::ScfApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    ScfApplication::from_cli()?.run()
}
