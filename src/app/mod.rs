mod report;
mod runner;

pub use runner::{run_diagonalization, run_optimization, RunMode};

use crate::config::{Args, Config};
use crate::io::{load_integrals, setup_output};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::str::FromStr;
use tracing::info;

pub struct DociApplication {
    args: Args,
    config: Config,
}

impl DociApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref(), self.config.verbosity(&self.args))?;

        let mode = RunMode::from_str(&self.config.mode(&self.args))?;

        info!("Reading integrals from: {}", self.args.integrals);
        let integrals = load_integrals(&self.args.integrals)?;

        match mode {
            RunMode::Diagonalize => run_diagonalization(integrals, &self.args)?,
            RunMode::Optimize(algorithm) => {
                run_optimization(integrals, algorithm, &self.args, &self.config)?
            }
        }

        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let Some(config_file) = &args.config_file else {
        return Ok(Config::default().with_defaults());
    };

    let config_content = fs::read_to_string(config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}
