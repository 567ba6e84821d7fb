//! Molecular integrals in an orthonormal orbital basis
//!
//! The DOCI machinery only ever asks for one-electron elements `T(a, b)` and
//! two-electron elements `V(a, b, c, d)` (physicist notation,
//! `V(a, b, c, d) = <ab|cd>`), together with the orbital and electron counts.
//! That capability set is the [`IntegralProvider`] trait, implemented by the
//! flat tables of [`Integrals`] and by the symmetry-labelled
//! [`SymmetricIntegrals`] used by the orbital optimizers.
//!
//! A [`UnitaryMatrix`] tracks the accumulated orthogonal transform of the
//! orbitals and an [`OrbitalTransform`] applies it, or a single Jacobi
//! rotation, to a set of integrals.

mod integrals;
mod transform;

pub use integrals::{Integrals, SymmetricIntegrals};
pub use transform::{OrbitalTransform, UnitaryMatrix};

/// Read access to the integrals of a molecule.
///
/// Implementations are shared read-only between the worker threads of the
/// Hamiltonian and density-matrix builds, hence `Send + Sync`.
pub trait IntegralProvider: Send + Sync {
    /// One-electron integral `T(a, b)`.
    fn get_t(&self, a: usize, b: usize) -> f64;

    /// Two-electron integral `<ab|cd>`.
    fn get_v(&self, a: usize, b: usize, c: usize, d: usize) -> f64;

    /// Number of spatial orbitals L.
    fn n_sp(&self) -> usize;

    /// Number of electrons N.
    fn n_electrons(&self) -> usize;

    /// Nuclear repulsion energy, added to every reported electronic energy.
    fn nucl_rep(&self) -> f64;
}
