mod report;
mod runner;

pub use runner::{build_hamiltonian, run_calculation, BandEdges, RunSummary};

use self::report::report_summary;
use crate::config::{Args, Config};
use crate::io::{setup_output, write_summary};
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use std::fs::{self, File};
use tracing::info;

pub struct ScfApplication {
    args: Args,
    config: Config,
}

impl ScfApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref());
        info!("Configuration loaded:\n{:?}", self.config);

        let cell = self
            .config
            .cell
            .build()
            .wrap_err("Failed to build the unit cell")?;
        let mesh = self.config.kmesh();
        let kpts = cell
            .make_kpts(mesh, true)
            .wrap_err_with(|| format!("Invalid k-point mesh {:?}", mesh))?;
        info!(
            "Cell: {} atoms, {} AOs, {} electrons, {} k-points",
            cell.natm(),
            cell.nao(),
            cell.nelectron(),
            kpts.len()
        );

        let settings = self.config.settings()?;
        let builder = build_hamiltonian(cell, kpts, &self.config)?;
        let summary = run_calculation(builder, self.config.spin(), settings)?;
        report_summary(&summary);

        if let Some(path) = &self.args.summary {
            let mut file = File::create(path)
                .wrap_err_with(|| format!("Unable to create summary file: {}", path))?;
            write_summary(&mut file, &summary)?;
            info!("Summary written to: {}", path);
        }
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    if args.kmesh.is_some() && args.kmesh().is_none() {
        return Err(eyre!("--kmesh takes exactly three values, e.g. 2,1,1"));
    }

    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults()
        .apply_args(args);

    Ok(config)
}
