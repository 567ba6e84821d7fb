//! Orbital optimization
//!
//! The DOCI energy depends on the orbital basis. Both optimizers rotate pairs
//! of orbitals of the same irrep, tracking the accumulated transform in an
//! [`OrbitalTransform`], and rediagonalize after every accepted rotation:
//!
//! - **local**: Jacobi pair search. The 2-RDM of the current ground state
//!   predicts the energy of every allowed pair rotation; the best one (or a
//!   randomly drawn good one) is applied.
//! - **anneal**: simulated annealing over random pair rotations.

mod annealing;
mod local_min;
mod tests;

pub use annealing::{AnnealingSettings, SimulatedAnnealing};
pub use local_min::{
    parse_allowed_irreps, select_pair, LocalMinimizer, LocalSettings, PairRotation,
    ALLOWED_IRREPS_ENV,
};

use crate::hamiltonian_impl::DOCIHamiltonian;
use crate::integrals_impl::{OrbitalTransform, SymmetricIntegrals, UnitaryMatrix};
use crate::io::Checkpoints;
use color_eyre::eyre::{eyre, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationAlgorithm {
    SimulatedAnnealing,
    LocalMinimizer,
}

impl FromStr for OptimizationAlgorithm {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anneal" | "sa" => Ok(Self::SimulatedAnnealing),
            "local" | "jacobi" => Ok(Self::LocalMinimizer),
            _ => Err(eyre!("Unknown orbital optimizer: {}", s)),
        }
    }
}

/// Settings of both optimizers; only the chosen one is used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizerSettings {
    pub local: LocalSettings,
    pub anneal: AnnealingSettings,
}

/// Create an optimizer based on algorithm choice
pub fn create_optimizer(
    algorithm: &str,
    integrals: SymmetricIntegrals,
    settings: &OptimizerSettings,
) -> Result<Box<dyn OrbitalOptimizer>> {
    let algo = OptimizationAlgorithm::from_str(algorithm)?;

    match algo {
        OptimizationAlgorithm::SimulatedAnnealing => Ok(Box::new(SimulatedAnnealing::new(
            integrals,
            settings.anneal.clone(),
        )?)),
        OptimizationAlgorithm::LocalMinimizer => Ok(Box::new(LocalMinimizer::new(
            integrals,
            settings.local.clone(),
        )?)),
    }
}

/// An optimizer of the orbital basis of a DOCI wavefunction.
pub trait OrbitalOptimizer {
    fn name(&self) -> &'static str;

    /// Run to convergence; returns the final energy including the nuclear
    /// repulsion.
    fn optimize(&mut self) -> Result<f64>;

    /// Current energy including the nuclear repulsion.
    fn get_energy(&self) -> f64;

    fn transform(&self) -> &OrbitalTransform;

    fn hamiltonian(&self) -> &DOCIHamiltonian<SymmetricIntegrals>;

    /// The Hamiltonian, holding the integrals in the current orbital basis.
    fn hamiltonian_mut(&mut self) -> &mut DOCIHamiltonian<SymmetricIntegrals>;

    /// Start from `unitary` instead of the identity.
    fn load_unitary(&mut self, unitary: UnitaryMatrix) -> Result<()>;

    /// Directory for periodic dumps; `None` disables them.
    fn set_checkpoints(&mut self, checkpoints: Option<Checkpoints>);
}
