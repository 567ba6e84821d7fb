use super::SymmetricIntegrals;
use crate::io::{read_container, write_container};
use color_eyre::eyre::{ensure, Result, WrapErr};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Orthogonal transform from the reference orbitals to the current ones,
/// `phi_a = sum_b U(a, b) phi_ref_b`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitaryMatrix {
    u: DMatrix<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitaryContainer {
    n: u64,
    // row-major
    data: Vec<f64>,
}

impl UnitaryMatrix {
    pub fn identity(n: usize) -> Self {
        UnitaryMatrix {
            u: DMatrix::identity(n, n),
        }
    }

    pub fn from_matrix(u: DMatrix<f64>) -> Result<Self> {
        ensure!(u.is_square(), "A {}x{} matrix is not a valid orbital transform", u.nrows(), u.ncols());
        let unitary = UnitaryMatrix { u };
        ensure!(
            unitary.is_orthogonal(1e-8),
            "Orbital transform is not orthogonal"
        );
        Ok(unitary)
    }

    pub fn n(&self) -> usize {
        self.u.nrows()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.u
    }

    /// `U <- R U` with `R` the Jacobi rotation of orbitals `k` and `l`.
    pub fn jacobi_rotation(&mut self, k: usize, l: usize, theta: f64) {
        let (s, c) = theta.sin_cos();
        for x in 0..self.u.ncols() {
            let (a, b) = (self.u[(k, x)], self.u[(l, x)]);
            self.u[(k, x)] = c * a + s * b;
            self.u[(l, x)] = -s * a + c * b;
        }
    }

    pub fn is_orthogonal(&self, tol: f64) -> bool {
        let n = self.n();
        let deviation = &self.u * self.u.transpose() - DMatrix::<f64>::identity(n, n);
        deviation.iter().all(|x| x.abs() < tol)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let n = self.n();
        let container = UnitaryContainer {
            n: n as u64,
            data: (0..n)
                .flat_map(|i| (0..n).map(move |j| (i, j)))
                .map(|(i, j)| self.u[(i, j)])
                .collect(),
        };
        write_container(filename, &container)
    }

    pub fn load_from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let filename = filename.as_ref();
        let container: UnitaryContainer = read_container(filename)
            .wrap_err_with(|| format!("Unable to read unitary from {}", filename.display()))?;

        let n = container.n as usize;
        ensure!(
            container.data.len() == n * n,
            "Unitary in {} has {} elements, expected {}",
            filename.display(),
            container.data.len(),
            n * n
        );

        Ok(UnitaryMatrix {
            u: DMatrix::from_row_slice(n, n, &container.data),
        })
    }
}

/// Reference integrals together with the accumulated orbital transform.
#[derive(Debug, Clone)]
pub struct OrbitalTransform {
    reference: SymmetricIntegrals,
    unitary: UnitaryMatrix,
}

impl OrbitalTransform {
    pub fn new(reference: SymmetricIntegrals) -> Self {
        let n = reference.irreps().len();
        OrbitalTransform {
            reference,
            unitary: UnitaryMatrix::identity(n),
        }
    }

    pub fn reference(&self) -> &SymmetricIntegrals {
        &self.reference
    }

    pub fn unitary(&self) -> &UnitaryMatrix {
        &self.unitary
    }

    pub fn unitary_mut(&mut self) -> &mut UnitaryMatrix {
        &mut self.unitary
    }

    pub fn set_unitary(&mut self, unitary: UnitaryMatrix) -> Result<()> {
        ensure!(
            unitary.n() == self.unitary.n(),
            "Unitary of dimension {} does not match {} orbitals",
            unitary.n(),
            self.unitary.n()
        );
        self.unitary = unitary;
        Ok(())
    }

    /// Overwrite `target` with the reference integrals in the current basis.
    pub fn fill_integrals(&self, target: &mut SymmetricIntegrals) {
        *target = self.reference.transformed(self.unitary.matrix());
    }

    /// Rotate `target` in place, leaving the tracked unitary alone.
    pub fn do_jacobi_rotation(
        &self,
        target: &mut SymmetricIntegrals,
        k: usize,
        l: usize,
        theta: f64,
    ) -> Result<()> {
        target.jacobi_rotation(k, l, theta)
    }

    /// Rotate `target` in place and record the rotation in the unitary.
    pub fn rotate(
        &mut self,
        target: &mut SymmetricIntegrals,
        k: usize,
        l: usize,
        theta: f64,
    ) -> Result<()> {
        self.do_jacobi_rotation(target, k, l, theta)?;
        self.unitary.jacobi_rotation(k, l, theta);
        Ok(())
    }
}
