// Main library file for DOCI calculations

pub mod app;
pub mod config;
pub mod dm2_impl;
pub mod hamiltonian_impl;
pub mod integrals_impl;
pub mod io;
pub mod optim_impl;
pub mod permutation;
pub mod sparse_impl;

#[cfg(test)]
mod test_support;

pub use dm2_impl::DM2;
pub use hamiltonian_impl::{DOCIHamiltonian, LanczosSolver};
pub use integrals_impl::{IntegralProvider, Integrals, SymmetricIntegrals};
pub use optim_impl::{LocalMinimizer, OrbitalOptimizer, SimulatedAnnealing};
pub use permutation::BitPermutation;
pub use sparse_impl::SparseMatrixCRS;
