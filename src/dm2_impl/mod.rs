//! Second-order reduced density matrix of a DOCI wavefunction
//!
//! A [`DM2`] is accumulated from the ground-state vector of a
//! [`DOCIHamiltonian`](crate::hamiltonian_impl::DOCIHamiltonian), or filled
//! analytically with the reduced Hamiltonian of a set of integrals; the dot
//! product of the two is the energy. With the density matrix held fixed, the
//! energy after a Jacobi rotation of two orbitals is a trigonometric
//! polynomial in the angle, which the orbital optimizers minimize.
//!
//! # Usage
//!
//! ```rust,ignore
//! let (energy, eigv) = ham.diagonalize()?;
//!
//! let mut rdm = DM2::from_integrals(ham.integrals())?;
//! rdm.build(ham.permutation(), &eigv)?;
//!
//! let mut reduced = rdm.zeros_like();
//! reduced.build_hamiltonian(ham.integrals())?;
//! assert!((rdm.dot(&reduced) - energy).abs() < 1e-8);
//!
//! let (theta, is_minimum) = rdm.find_min_angle(0, 1, 0.3, ham.integrals());
//! ```

mod dm2;
mod index_map;
mod rotation;
mod tests;

pub use dm2::DM2;
pub use index_map::SpinOrbitalIndexMap;
pub use rotation::{RotatedIntegrals, RotationPolynomial};
