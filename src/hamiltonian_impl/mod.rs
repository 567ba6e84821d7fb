//! DOCI Hamiltonian and its lowest eigenpair
//!
//! The Hamiltonian is stored as an upper-triangle [`SparseMatrixCRS`]
//! built in parallel from an [`IntegralProvider`]. Its ground state is found
//! by a restarted Lanczos iteration that only needs matrix-vector products;
//! small spaces can also be diagonalized densely for verification.
//!
//! # Usage
//!
//! ```rust,ignore
//! use doci::hamiltonian_impl::DOCIHamiltonian;
//!
//! let mut ham = DOCIHamiltonian::new(integrals)?;
//! ham.build()?;
//! let (energy, eigv) = ham.diagonalize()?;
//! let total = energy + ham.integrals().nucl_rep();
//! ```
//!
//! [`SparseMatrixCRS`]: crate::sparse_impl::SparseMatrixCRS
//! [`IntegralProvider`]: crate::integrals_impl::IntegralProvider

mod doci;
mod eigensolver;

pub use doci::{calc_sign, count_bits, DOCIHamiltonian};
pub use eigensolver::{LanczosSolver, LanczosStep, SolverStatus, DEFAULT_NCV};
