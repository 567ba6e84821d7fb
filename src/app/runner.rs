use super::report::{report_ground_state, report_optimization};
use crate::config::{Args, Config};
use crate::dm2_impl::DM2;
use crate::hamiltonian_impl::DOCIHamiltonian;
use crate::integrals_impl::{OrbitalTransform, SymmetricIntegrals, UnitaryMatrix};
use crate::io::Checkpoints;
use crate::optim_impl::{create_optimizer, OptimizationAlgorithm};
use color_eyre::eyre::{eyre, Result};
use std::str::FromStr;
use tracing::info;

/// Read the sparse Hamiltonian from this file instead of building it.
pub const READ_SPARSE_ENV: &str = "DOCI_READ_SPARSE_FILE";
/// Save the sparse Hamiltonian to this file after building it.
pub const SAVE_SPARSE_ENV: &str = "DOCI_SAVE_SPARSE_FILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Diagonalize,
    Optimize(OptimizationAlgorithm),
}

impl FromStr for RunMode {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "diag" | "single" => Ok(RunMode::Diagonalize),
            other => OptimizationAlgorithm::from_str(other)
                .map(RunMode::Optimize)
                .map_err(|_| eyre!("Unknown mode: {} (expected diag, anneal or local)", s)),
        }
    }
}

fn env_path(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|path| !path.is_empty())
}

/// One diagonalization in the given (optionally transformed) orbital basis.
pub fn run_diagonalization(mut integrals: SymmetricIntegrals, args: &Args) -> Result<()> {
    if let Some(path) = &args.unitary {
        info!("Reading orbital transform from: {}", path);
        let mut transform = OrbitalTransform::new(integrals.clone());
        transform.set_unitary(UnitaryMatrix::load_from_file(path)?)?;
        transform.fill_integrals(&mut integrals);
    }

    let mut ham = DOCIHamiltonian::new(integrals)?;

    match env_path(READ_SPARSE_ENV) {
        Some(path) => {
            info!("Reading sparse Hamiltonian from: {}", path);
            ham.read_from_file(&path)?;
        }
        None => {
            ham.build()?;
            if let Some(path) = env_path(SAVE_SPARSE_ENV) {
                info!("Saving sparse Hamiltonian to: {}", path);
                ham.save_to_file(&path)?;
            }
        }
    }

    let (energy, eigv) = ham.diagonalize()?;

    let mut rdm = DM2::from_integrals(ham.integrals())?;
    rdm.build(ham.permutation(), &eigv)?;

    report_ground_state(ham.integrals(), energy, &rdm)?;
    write_rdm(&rdm, args)
}

/// Optimize the orbital basis, then report the ground state in the optimized
/// basis.
pub fn run_optimization(
    integrals: SymmetricIntegrals,
    algorithm: OptimizationAlgorithm,
    args: &Args,
    config: &Config,
) -> Result<()> {
    let settings = config.optimizer_settings(args);
    let name = match algorithm {
        OptimizationAlgorithm::SimulatedAnnealing => "anneal",
        OptimizationAlgorithm::LocalMinimizer => "local",
    };

    let mut optimizer = create_optimizer(name, integrals, &settings)?;

    let checkpoints = Checkpoints::resolve(config.checkpoint_dir(args).as_deref());
    match &checkpoints {
        Some(checkpoints) => info!("Checkpoints go to: {}", checkpoints.dir().display()),
        None => info!("No checkpoint directory set, not writing checkpoints"),
    }
    optimizer.set_checkpoints(checkpoints);

    if let Some(path) = &args.unitary {
        info!("Reading orbital transform from: {}", path);
        optimizer.load_unitary(UnitaryMatrix::load_from_file(path)?)?;
    }

    let energy = optimizer.optimize()?;
    report_optimization(optimizer.name(), energy);

    let ham = optimizer.hamiltonian_mut();
    ham.build()?;
    let (energy, eigv) = ham.diagonalize()?;

    let mut rdm = DM2::from_integrals(ham.integrals())?;
    rdm.build(ham.permutation(), &eigv)?;

    report_ground_state(ham.integrals(), energy, &rdm)?;
    write_rdm(&rdm, args)
}

fn write_rdm(rdm: &DM2, args: &Args) -> Result<()> {
    if let Some(path) = &args.rdm {
        info!("Writing 2-RDM to: {}", path);
        rdm.write_to_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_from_str() {
        assert_eq!(RunMode::from_str("diag").unwrap(), RunMode::Diagonalize);
        assert_eq!(
            RunMode::from_str("local").unwrap(),
            RunMode::Optimize(OptimizationAlgorithm::LocalMinimizer)
        );
        assert_eq!(
            RunMode::from_str("Anneal").unwrap(),
            RunMode::Optimize(OptimizationAlgorithm::SimulatedAnnealing)
        );
        assert!(RunMode::from_str("scf").is_err());
    }
}
