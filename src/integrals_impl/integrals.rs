use super::IntegralProvider;
use color_eyre::eyre::{bail, ensure, Result};
use nalgebra::DMatrix;

/// One- and two-electron integrals without symmetry information.
///
/// `oei` is the L x L one-electron table. `tei` stores `<ab|cd>` at row
/// `a * L + b`, column `c * L + d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Integrals {
    n_sp: usize,
    n_electrons: usize,
    nucl_rep: f64,
    oei: DMatrix<f64>,
    tei: DMatrix<f64>,
}

impl Integrals {
    /// All integrals zero.
    pub fn new(n_sp: usize, n_electrons: usize, nucl_rep: f64) -> Self {
        Integrals {
            n_sp,
            n_electrons,
            nucl_rep,
            oei: DMatrix::zeros(n_sp, n_sp),
            tei: DMatrix::zeros(n_sp * n_sp, n_sp * n_sp),
        }
    }

    pub fn from_tables(
        n_sp: usize,
        n_electrons: usize,
        nucl_rep: f64,
        oei: DMatrix<f64>,
        tei: DMatrix<f64>,
    ) -> Result<Self> {
        ensure!(
            oei.nrows() == n_sp && oei.ncols() == n_sp,
            "One-electron table is {}x{}, expected {}x{}",
            oei.nrows(),
            oei.ncols(),
            n_sp,
            n_sp
        );
        ensure!(
            tei.nrows() == n_sp * n_sp && tei.ncols() == n_sp * n_sp,
            "Two-electron table is {}x{}, expected {}x{}",
            tei.nrows(),
            tei.ncols(),
            n_sp * n_sp,
            n_sp * n_sp
        );

        Ok(Integrals {
            n_sp,
            n_electrons,
            nucl_rep,
            oei,
            tei,
        })
    }

    pub fn oei(&self) -> &DMatrix<f64> {
        &self.oei
    }

    pub fn tei(&self) -> &DMatrix<f64> {
        &self.tei
    }

    pub fn set_nucl_rep(&mut self, nucl_rep: f64) {
        self.nucl_rep = nucl_rep;
    }

    /// Set `T(a, b)` and `T(b, a)`.
    pub fn set_t(&mut self, a: usize, b: usize, value: f64) {
        self.oei[(a, b)] = value;
        self.oei[(b, a)] = value;
    }

    /// Set `<ab|cd>` and its seven partners under the permutational symmetry
    /// of real orbitals.
    pub fn set_v(&mut self, a: usize, b: usize, c: usize, d: usize, value: f64) {
        let l = self.n_sp;
        for (p, q, r, s) in [
            (a, b, c, d),
            (b, a, d, c),
            (c, d, a, b),
            (d, c, b, a),
            (c, b, a, d),
            (a, d, c, b),
            (b, c, d, a),
            (d, a, b, c),
        ] {
            self.tei[(p * l + q, r * l + s)] = value;
        }
    }

    /// Rotate orbitals `k` and `l` over `theta`:
    /// `phi_k <- cos * phi_k + sin * phi_l`, `phi_l <- -sin * phi_k + cos * phi_l`.
    pub fn jacobi_rotation(&mut self, k: usize, l: usize, theta: f64) {
        let (s, c) = theta.sin_cos();
        let n = self.n_sp;

        mix_rows(&mut self.oei, k, l, c, s);
        mix_cols(&mut self.oei, k, l, c, s);

        for x in 0..n {
            // first index
            mix_rows(&mut self.tei, k * n + x, l * n + x, c, s);
            // third index
            mix_cols(&mut self.tei, k * n + x, l * n + x, c, s);
        }
        for x in 0..n {
            // second index
            mix_rows(&mut self.tei, x * n + k, x * n + l, c, s);
            // fourth index
            mix_cols(&mut self.tei, x * n + k, x * n + l, c, s);
        }
    }

    /// Integrals in the orbital basis `phi'_a = sum_b U(a, b) phi_b`.
    pub fn transformed(&self, u: &DMatrix<f64>) -> Self {
        let kron = u.kronecker(u);

        Integrals {
            n_sp: self.n_sp,
            n_electrons: self.n_electrons,
            nucl_rep: self.nucl_rep,
            oei: u * &self.oei * u.transpose(),
            tei: &kron * &self.tei * kron.transpose(),
        }
    }
}

fn mix_rows(m: &mut DMatrix<f64>, r1: usize, r2: usize, c: f64, s: f64) {
    for x in 0..m.ncols() {
        let (a, b) = (m[(r1, x)], m[(r2, x)]);
        m[(r1, x)] = c * a + s * b;
        m[(r2, x)] = -s * a + c * b;
    }
}

fn mix_cols(m: &mut DMatrix<f64>, c1: usize, c2: usize, c: f64, s: f64) {
    for x in 0..m.nrows() {
        let (a, b) = (m[(x, c1)], m[(x, c2)]);
        m[(x, c1)] = c * a + s * b;
        m[(x, c2)] = -s * a + c * b;
    }
}

impl IntegralProvider for Integrals {
    #[inline]
    fn get_t(&self, a: usize, b: usize) -> f64 {
        self.oei[(a, b)]
    }

    #[inline]
    fn get_v(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        self.tei[(a * self.n_sp + b, c * self.n_sp + d)]
    }

    fn n_sp(&self) -> usize {
        self.n_sp
    }

    fn n_electrons(&self) -> usize {
        self.n_electrons
    }

    fn nucl_rep(&self) -> f64 {
        self.nucl_rep
    }
}

/// Integrals with a point-group irrep label per orbital.
///
/// Only orbitals sharing an irrep may be mixed by a rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricIntegrals {
    integrals: Integrals,
    irreps: Vec<usize>,
    n_irreps: usize,
}

impl SymmetricIntegrals {
    pub fn new(integrals: Integrals, irreps: Vec<usize>, n_irreps: usize) -> Result<Self> {
        ensure!(
            irreps.len() == integrals.n_sp(),
            "Got {} irrep labels for {} orbitals",
            irreps.len(),
            integrals.n_sp()
        );
        if let Some(bad) = irreps.iter().find(|&&irrep| irrep >= n_irreps) {
            bail!("Irrep label {} outside a group with {} irreps", bad, n_irreps);
        }

        Ok(SymmetricIntegrals {
            integrals,
            irreps,
            n_irreps,
        })
    }

    /// All orbitals in the single irrep of C1.
    pub fn c1(integrals: Integrals) -> Self {
        let irreps = vec![0; integrals.n_sp()];
        SymmetricIntegrals {
            integrals,
            irreps,
            n_irreps: 1,
        }
    }

    pub fn integrals(&self) -> &Integrals {
        &self.integrals
    }

    pub fn integrals_mut(&mut self) -> &mut Integrals {
        &mut self.integrals
    }

    pub fn orbital_irrep(&self, idx: usize) -> usize {
        self.irreps[idx]
    }

    pub fn irreps(&self) -> &[usize] {
        &self.irreps
    }

    pub fn n_irreps(&self) -> usize {
        self.n_irreps
    }

    /// Jacobi rotation of two orbitals of the same irrep.
    pub fn jacobi_rotation(&mut self, k: usize, l: usize, theta: f64) -> Result<()> {
        ensure!(
            self.irreps[k] == self.irreps[l],
            "Cannot rotate orbital {} (irrep {}) with orbital {} (irrep {})",
            k,
            self.irreps[k],
            l,
            self.irreps[l]
        );
        self.integrals.jacobi_rotation(k, l, theta);
        Ok(())
    }

    pub fn transformed(&self, u: &DMatrix<f64>) -> Self {
        SymmetricIntegrals {
            integrals: self.integrals.transformed(u),
            irreps: self.irreps.clone(),
            n_irreps: self.n_irreps,
        }
    }
}

impl IntegralProvider for SymmetricIntegrals {
    #[inline]
    fn get_t(&self, a: usize, b: usize) -> f64 {
        self.integrals.get_t(a, b)
    }

    #[inline]
    fn get_v(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        self.integrals.get_v(a, b, c, d)
    }

    fn n_sp(&self) -> usize {
        self.integrals.n_sp()
    }

    fn n_electrons(&self) -> usize {
        self.integrals.n_electrons()
    }

    fn nucl_rep(&self) -> f64 {
        self.integrals.nucl_rep()
    }
}
