//! Restarted Lanczos eigensolver driven by reverse communication
//!
//! The solver never sees the matrix. Every call to [`LanczosSolver::step`]
//! either asks the caller for one product `y = A x` on solver-owned buffers
//! or reports that it is done:
//!
//! ```rust,ignore
//! let mut solver = LanczosSolver::new(dim, 1)?;
//! while let LanczosStep::MatVec { x, y } = solver.step() {
//!     matrix.mvprod(x, y, 0.0);
//! }
//! let energy = solver.eigenvalues()[0];
//! ```
//!
//! The Krylov basis is kept fully orthogonal (classical Gram-Schmidt applied
//! twice) together with its image under `A`, so the projected matrix is the
//! exact Rayleigh quotient of the basis. When the basis reaches `ncv` vectors
//! it is contracted onto the wanted Ritz vectors plus half of the remaining
//! ones and expansion continues from their residual direction.

use color_eyre::eyre::{ensure, Result};
use nalgebra::{DMatrix, DVector, Dyn, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Krylov subspace size used when the problem is large enough.
pub const DEFAULT_NCV: usize = 42;

const DEFAULT_SEED: u64 = 0x0d0c_1dea;

// relative norm below which a new direction counts as linearly dependent
const BREAKDOWN: f64 = 1e-10;

/// Request handed to the caller by [`LanczosSolver::step`].
pub enum LanczosStep<'a> {
    /// Store `A x` in `y`, then call `step` again.
    MatVec { x: &'a [f64], y: &'a mut [f64] },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Running,
    Converged,
    /// Restart budget exhausted; the Ritz pairs are the best approximation.
    MaxRestarts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Product,
    Expand,
    Done,
}

/// Lowest `nev` eigenpairs of a real symmetric operator of dimension `dim`.
#[derive(Debug)]
pub struct LanczosSolver {
    dim: usize,
    nev: usize,
    ncv: usize,
    tol: f64,
    max_restarts: usize,
    rng: StdRng,
    basis: Vec<DVector<f64>>,
    images: Vec<DVector<f64>>,
    product: DVector<f64>,
    stage: Stage,
    status: SolverStatus,
    restarts: usize,
    matvecs: usize,
    ritz_values: Vec<f64>,
    ritz_vectors: Vec<DVector<f64>>,
    residuals: Vec<f64>,
}

impl LanczosSolver {
    /// Solver for the `nev` algebraically smallest eigenvalues with
    /// `ncv = min(42, dim)` Krylov vectors, tolerance 0 (working precision)
    /// and at most `3 dim` restarts. Above `nev = 20` the subspace widens to
    /// `min(dim, 2 nev + 1)` so that it still exceeds `nev`.
    pub fn new(dim: usize, nev: usize) -> Result<Self> {
        ensure!(dim > 0, "Cannot diagonalize an empty matrix");
        ensure!(
            nev >= 1 && nev <= dim,
            "Cannot compute {} eigenvalues of a {}x{} matrix",
            nev,
            dim,
            dim
        );

        Ok(LanczosSolver {
            dim,
            nev,
            ncv: DEFAULT_NCV.max(2 * nev + 1).min(dim),
            tol: 0.0,
            max_restarts: 3 * dim,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            basis: Vec::new(),
            images: Vec::new(),
            product: DVector::zeros(dim),
            stage: Stage::Start,
            status: SolverStatus::Running,
            restarts: 0,
            matvecs: 0,
            ritz_values: Vec::new(),
            ritz_vectors: Vec::new(),
            residuals: Vec::new(),
        })
    }

    pub fn with_ncv(mut self, ncv: usize) -> Result<Self> {
        ensure!(
            ncv <= self.dim && (ncv > self.nev || ncv == self.dim),
            "ncv = {} must exceed nev = {} and not exceed the dimension {}",
            ncv,
            self.nev,
            self.dim
        );
        self.ncv = ncv;
        Ok(self)
    }

    /// Residual tolerance relative to the spectrum scale; 0 means working
    /// precision.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tol = tol.max(0.0);
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: usize) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Seed of the random start vector.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn ncv(&self) -> usize {
        self.ncv
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn matvecs(&self) -> usize {
        self.matvecs
    }

    /// Ritz values in ascending order, available once done.
    pub fn eigenvalues(&self) -> &[f64] {
        &self.ritz_values
    }

    /// Normalized Ritz vector belonging to `eigenvalues()[idx]`.
    pub fn eigenvector(&self, idx: usize) -> Option<&DVector<f64>> {
        self.ritz_vectors.get(idx)
    }

    pub fn into_eigenvector(mut self, idx: usize) -> Option<DVector<f64>> {
        if idx < self.ritz_vectors.len() {
            Some(self.ritz_vectors.swap_remove(idx))
        } else {
            None
        }
    }

    /// Residual norms `|A y - theta y|` of the Ritz pairs.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Advance the iteration up to the next matrix-vector product.
    pub fn step(&mut self) -> LanczosStep<'_> {
        loop {
            match self.stage {
                Stage::Start => {
                    let start = self.random_direction();
                    match start {
                        Some(v) => {
                            self.basis.push(v);
                            self.stage = Stage::Product;
                            return self.request();
                        }
                        None => {
                            self.finish(SolverStatus::Converged);
                        }
                    }
                }
                Stage::Product => {
                    self.images.push(self.product.clone());
                    self.matvecs += 1;
                    self.stage = Stage::Expand;
                }
                Stage::Expand => {
                    if self.basis.len() >= self.ncv {
                        if self.rayleigh_ritz() {
                            self.finish(SolverStatus::Converged);
                        } else if self.restarts >= self.max_restarts || self.basis.len() < 2 {
                            self.finish(SolverStatus::MaxRestarts);
                        } else {
                            self.restart();
                        }
                        continue;
                    }

                    let next = self
                        .images
                        .last()
                        .cloned()
                        .and_then(|w| self.orthogonalize(w));

                    let next = match next {
                        Some(v) => Some(v),
                        None => {
                            // invariant subspace reached
                            if self.basis.len() >= self.nev && self.rayleigh_ritz() {
                                self.finish(SolverStatus::Converged);
                                continue;
                            }
                            self.random_direction()
                        }
                    };

                    match next {
                        Some(v) => {
                            self.basis.push(v);
                            self.stage = Stage::Product;
                            return self.request();
                        }
                        None => {
                            // the basis spans the whole space
                            self.rayleigh_ritz();
                            self.finish(SolverStatus::Converged);
                        }
                    }
                }
                Stage::Done => return LanczosStep::Done,
            }
        }
    }

    fn request(&mut self) -> LanczosStep<'_> {
        match self.basis.last() {
            Some(x) => LanczosStep::MatVec {
                x: x.as_slice(),
                y: self.product.as_mut_slice(),
            },
            None => LanczosStep::Done,
        }
    }

    fn finish(&mut self, status: SolverStatus) {
        self.status = status;
        self.stage = Stage::Done;
        // the Krylov basis is no longer needed
        self.basis.clear();
        self.images.clear();
    }

    /// Orthogonalize `w` against the basis, twice; `None` on linear dependence.
    fn orthogonalize(&self, mut w: DVector<f64>) -> Option<DVector<f64>> {
        let scale = w.norm();
        if scale == 0.0 {
            return None;
        }

        for _ in 0..2 {
            for v in &self.basis {
                let overlap = v.dot(&w);
                w.axpy(-overlap, v, 1.0);
            }
        }

        let norm = w.norm();
        if norm <= BREAKDOWN * scale {
            None
        } else {
            Some(w / norm)
        }
    }

    fn random_direction(&mut self) -> Option<DVector<f64>> {
        let rng = &mut self.rng;
        let w = DVector::from_fn(self.dim, |_, _| rng.gen_range(-1.0..1.0));
        self.orthogonalize(w)
    }

    /// Eigen-decomposition of the projected matrix `V^T A V`, with the
    /// column order that sorts the eigenvalues ascending.
    fn projected_eigen(&self) -> (SymmetricEigen<f64, Dyn>, Vec<usize>) {
        let m = self.basis.len();
        let projected = DMatrix::from_fn(m, m, |i, j| {
            0.5 * (self.basis[i].dot(&self.images[j]) + self.basis[j].dot(&self.images[i]))
        });
        let eigen = SymmetricEigen::new(projected);

        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        (eigen, order)
    }

    /// Ritz vector `V s` and its image `A V s`.
    fn combine(&self, coeffs: &[f64]) -> (DVector<f64>, DVector<f64>) {
        let mut y = DVector::zeros(self.dim);
        let mut ay = DVector::zeros(self.dim);
        for (i, &c) in coeffs.iter().enumerate() {
            y.axpy(c, &self.basis[i], 1.0);
            ay.axpy(c, &self.images[i], 1.0);
        }
        (y, ay)
    }

    /// Rayleigh-Ritz on the current basis; true when the wanted pairs have
    /// converged.
    fn rayleigh_ritz(&mut self) -> bool {
        let m = self.basis.len();
        if m == 0 {
            return false;
        }

        let (eigen, order) = self.projected_eigen();

        let anorm = eigen
            .eigenvalues
            .iter()
            .fold(0.0f64, |acc, x| acc.max(x.abs()));
        let floor = 64.0 * f64::EPSILON * (self.dim as f64).sqrt();
        let threshold = self.tol.max(floor) * anorm.max(f64::EPSILON.powf(2.0 / 3.0));

        let wanted = self.nev.min(m);
        let mut values = Vec::with_capacity(wanted);
        let mut vectors = Vec::with_capacity(wanted);
        let mut residuals = Vec::with_capacity(wanted);

        for &col in order.iter().take(wanted) {
            let theta = eigen.eigenvalues[col];
            let coeffs: Vec<f64> = eigen.eigenvectors.column(col).iter().copied().collect();
            let (y, ay) = self.combine(&coeffs);

            residuals.push((&ay - &y * theta).norm());
            values.push(theta);
            vectors.push(y);
        }

        self.ritz_values = values;
        self.ritz_vectors = vectors;
        self.residuals = residuals;

        debug!(
            "Lanczos: restart {}, basis {}, lowest Ritz value {:.12}, residual {:.3e}",
            self.restarts,
            m,
            self.ritz_values[0],
            self.residuals[0]
        );

        wanted == self.nev && self.residuals.iter().all(|&r| r <= threshold)
    }

    /// Contract the basis onto its lowest Ritz vectors.
    fn restart(&mut self) {
        let m = self.basis.len();
        let keep = ((self.nev + m) / 2).clamp(1, m - 1);
        let (eigen, order) = self.projected_eigen();

        let (basis, images): (Vec<_>, Vec<_>) = order
            .iter()
            .take(keep)
            .map(|&col| {
                let coeffs: Vec<f64> = eigen.eigenvectors.column(col).iter().copied().collect();
                self.combine(&coeffs)
            })
            .unzip();

        self.basis = basis;
        self.images = images;
        self.restarts += 1;
    }
}
