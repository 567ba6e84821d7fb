//! Sparse DOCI Hamiltonian over the paired occupation basis

use super::eigensolver::{LanczosSolver, LanczosStep, SolverStatus};
use crate::integrals_impl::IntegralProvider;
use crate::permutation::{balanced_workload, calc_combinations, BitPermutation};
use crate::sparse_impl::SparseMatrixCRS;
use color_eyre::eyre::{ensure, eyre, Result, WrapErr};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

const MATRIX_GROUP: &str = "ham";

/// DOCI Hamiltonian in the basis of all placements of N/2 electron pairs in
/// L spatial orbitals.
///
/// Basis state `i` is the `i`-th pattern of a [`BitPermutation`]; bit `s` set
/// means orbital `s` is doubly occupied.
#[derive(Debug)]
pub struct DOCIHamiltonian<I: IntegralProvider> {
    integrals: I,
    permutation: BitPermutation,
    dim: usize,
    mat: SparseMatrixCRS,
}

impl<I: IntegralProvider> DOCIHamiltonian<I> {
    /// Set up the basis for `integrals`; the matrix stays empty until
    /// [`build`](Self::build).
    pub fn new(integrals: I) -> Result<Self> {
        let n_electrons = integrals.n_electrons();
        let n_sp = integrals.n_sp();

        ensure!(
            n_electrons % 2 == 0,
            "DOCI needs an even number of electrons, got {}",
            n_electrons
        );

        let permutation = BitPermutation::new(n_electrons / 2, n_sp)?;
        let dim = usize::try_from(calc_combinations(n_sp, n_electrons / 2)?)
            .map_err(|_| eyre!("Basis dimension does not fit in usize"))?;

        info!(
            "DOCI space: {} orbitals, {} electrons, dimension {}",
            n_sp, n_electrons, dim
        );

        Ok(DOCIHamiltonian {
            integrals,
            permutation,
            dim,
            mat: SparseMatrixCRS::new(dim),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn integrals(&self) -> &I {
        &self.integrals
    }

    /// Mutable integrals; call [`build`](Self::build) afterwards.
    pub fn integrals_mut(&mut self) -> &mut I {
        &mut self.integrals
    }

    pub fn into_integrals(self) -> I {
        self.integrals
    }

    /// Enumerator positioned on the first basis state.
    pub fn permutation(&self) -> BitPermutation {
        self.permutation
    }

    pub fn matrix(&self) -> &SparseMatrixCRS {
        &self.mat
    }

    /// Fill the sparse matrix from the current integrals.
    ///
    /// Rows are split over the rayon pool so that every worker examines about
    /// the same number of (bra, ket) pairs. Each worker jumps its own
    /// enumerator to its first row and produces a shard; shards are stacked in
    /// row order.
    pub fn build(&mut self) -> Result<()> {
        let num_t = rayon::current_num_threads().max(1);
        let workload = balanced_workload(self.dim, num_t);
        info!("Running with {} threads", num_t);

        let start = Instant::now();

        let shards = (0..num_t)
            .into_par_iter()
            .map(|me| -> Result<SparseMatrixCRS> {
                let worker_start = Instant::now();
                let (first, last) = (workload[me], workload[me + 1]);

                let mut perm = self.permutation;
                if first < last {
                    perm.seek(first as u64)?;
                }
                let shard = self.build_rows(perm, first, last);

                debug!(
                    "Worker {} built rows {}..{} in {:.3} s",
                    me,
                    first,
                    last,
                    worker_start.elapsed().as_secs_f64()
                );
                Ok(shard)
            })
            .collect::<Result<Vec<_>>>()?;

        self.mat = SparseMatrixCRS::concat(shards)?;

        info!(
            "Hamiltonian built in {:.3} s: {} stored elements",
            start.elapsed().as_secs_f64(),
            self.mat.nnz()
        );

        Ok(())
    }

    /// Rows `first..last` as a shard; `perm` is positioned on row `first`.
    fn build_rows(&self, mut perm: BitPermutation, first: usize, last: usize) -> SparseMatrixCRS {
        let mut shard = SparseMatrixCRS::new_shard(last - first);
        shard.new_row();

        for i in first..last {
            let bra = perm.get();
            shard.push_to_row_next(i, self.diagonal_element(bra));

            let mut kets = perm;
            for j in (i + 1)..self.dim {
                let Some(ket) = kets.next() else { break };
                let diff = bra ^ ket;

                // exactly one pair moved from orbital r to s (or back)
                if count_bits(diff) == 2 {
                    let r = diff.trailing_zeros() as usize;
                    let s = (diff & (diff - 1)).trailing_zeros() as usize;
                    shard.push_to_row_next(j, self.integrals.get_v(s, s, r, r));
                }
            }

            shard.new_row();
            perm.next();
        }

        shard
    }

    /// `<bra|H|bra>` for the doubly occupied orbitals set in `bra`.
    pub fn diagonal_element(&self, bra: u64) -> f64 {
        let ints = &self.integrals;
        let mut result = 0.0;

        let mut occupied = bra;
        while occupied != 0 {
            let s = occupied.trailing_zeros() as usize;
            occupied &= occupied - 1;

            result += 2.0 * ints.get_t(s, s) + ints.get_v(s, s, s, s);

            let mut others = occupied;
            while others != 0 {
                let r = others.trailing_zeros() as usize;
                others &= others - 1;
                result += 4.0 * ints.get_v(r, s, r, s) - 2.0 * ints.get_v(r, s, s, r);
            }
        }

        result
    }

    /// Lowest eigenvalue and its normalized eigenvector. The energy excludes
    /// the nuclear repulsion.
    pub fn diagonalize(&self) -> Result<(f64, DVector<f64>)> {
        let solver = self.run_lanczos(1)?;
        let energy = solver.eigenvalues()[0];
        let eigv = solver
            .into_eigenvector(0)
            .ok_or_else(|| eyre!("Eigensolver returned no eigenvector"))?;

        Ok((energy, eigv))
    }

    /// Lowest eigenvalue only.
    pub fn calc_energy(&self) -> Result<f64> {
        Ok(self.run_lanczos(1)?.eigenvalues()[0])
    }

    /// Lowest `nev` eigenvalues in ascending order.
    pub fn calc_energies(&self, nev: usize) -> Result<Vec<f64>> {
        Ok(self.run_lanczos(nev)?.eigenvalues().to_vec())
    }

    fn run_lanczos(&self, nev: usize) -> Result<LanczosSolver> {
        ensure!(
            self.mat.is_complete() && self.mat.n() == self.dim,
            "The Hamiltonian has not been built"
        );

        let start = Instant::now();
        let mut solver = LanczosSolver::new(self.dim, nev)?;

        while let LanczosStep::MatVec { x, y } = solver.step() {
            self.mat.mvprod(x, y, 0.0);
        }

        if solver.status() == SolverStatus::MaxRestarts {
            warn!(
                "Lanczos reached the restart limit ({} restarts), residual {:.3e}",
                solver.restarts(),
                solver.residuals().first().copied().unwrap_or(f64::NAN)
            );
        }
        ensure!(
            solver.eigenvalues().len() == nev,
            "Eigensolver produced {} of {} eigenvalues",
            solver.eigenvalues().len(),
            nev
        );

        info!(
            "Diagonalization took {:.3} s ({} products, {} restarts)",
            start.elapsed().as_secs_f64(),
            solver.matvecs(),
            solver.restarts()
        );

        Ok(solver)
    }

    /// Full spectrum by dense diagonalization, eigenvalues ascending with the
    /// eigenvectors in matching columns. Only meant for small spaces.
    pub fn diagonalize_full(&self) -> (Vec<f64>, DMatrix<f64>) {
        let eigen = SymmetricEigen::new(self.mat.to_dense());

        let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        let values = order.iter().map(|&k| eigen.eigenvalues[k]).collect();
        let vectors = DMatrix::from_fn(self.dim, order.len(), |row, col| {
            eigen.eigenvectors[(row, order[col])]
        });

        (values, vectors)
    }

    /// Write the sparse matrix to `filename`.
    pub fn save_to_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        self.mat.write_to_file(filename, MATRIX_GROUP)
    }

    /// Replace the matrix by the one stored in `filename`.
    pub fn read_from_file<P: AsRef<Path>>(&mut self, filename: P) -> Result<()> {
        let filename = filename.as_ref();
        let mat = SparseMatrixCRS::read_from_file(filename, MATRIX_GROUP)
            .wrap_err("Failed to read the Hamiltonian")?;

        ensure!(
            mat.n() == self.dim,
            "Hamiltonian in {} has dimension {}, expected {}",
            filename.display(),
            mat.n(),
            self.dim
        );

        self.mat = mat;
        Ok(())
    }
}

/// Number of set bits.
#[inline]
pub fn count_bits(bits: u64) -> u32 {
    bits.count_ones()
}

/// `(-1)^k` with `k` the number of bits of `bits` strictly between positions
/// `i < j`.
pub fn calc_sign(i: usize, j: usize, bits: u64) -> i32 {
    debug_assert!(i < j && j < 64, "order of i and j is wrong");

    let below_j = (1u64 << j) - 1;
    let up_to_i = if i + 1 >= 64 { u64::MAX } else { (1u64 << (i + 1)) - 1 };

    if count_bits(bits & below_j & !up_to_i) % 2 == 0 {
        1
    } else {
        -1
    }
}
