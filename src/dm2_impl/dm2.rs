use super::index_map::SpinOrbitalIndexMap;
use super::rotation::{RotatedIntegrals, RotationPolynomial};
use crate::integrals_impl::IntegralProvider;
use crate::io::{read_container, write_container};
use crate::permutation::{balanced_workload, calc_combinations, BitPermutation};
use color_eyre::eyre::{ensure, Result, WrapErr};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const RDM_GROUP: &str = "RDM";

/// Second-order reduced density matrix of a DOCI wavefunction.
///
/// Seniority zero leaves two kinds of nonzero elements. The `L x L` block
/// couples the pairs `a ā` and `b b̄`; the vector holds one value per spatial
/// pair `a < b`, shared by the four spin combinations `ab`, `āb̄`, `ab̄` and
/// `āb` (hence the factor 4 in [`dot`](Self::dot) and [`trace`](Self::trace)).
#[derive(Debug, Clone, PartialEq)]
pub struct DM2 {
    index: Arc<SpinOrbitalIndexMap>,
    n_electrons: usize,
    block: DMatrix<f64>,
    diag: DVector<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Dm2Container {
    group: String,
    #[serde(rename = "Block")]
    block: Vec<f64>,
    #[serde(rename = "Vector")]
    vector: Vec<f64>,
    #[serde(rename = "L")]
    n_sp: u64,
    #[serde(rename = "N")]
    n_electrons: u64,
}

impl DM2 {
    /// Zero density matrix for `n_electrons` electrons in the orbitals of
    /// `index`.
    pub fn new(index: Arc<SpinOrbitalIndexMap>, n_electrons: usize) -> Self {
        let l = index.n_sp();
        let d = index.n_pairs();
        DM2 {
            index,
            n_electrons,
            block: DMatrix::zeros(l, l),
            diag: DVector::zeros(d),
        }
    }

    /// Zero density matrix with an index map of its own.
    pub fn with_size(n_sp: usize, n_electrons: usize) -> Result<Self> {
        Ok(DM2::new(Arc::new(SpinOrbitalIndexMap::new(n_sp)?), n_electrons))
    }

    /// Zero density matrix sized for `integrals`.
    pub fn from_integrals<I: IntegralProvider>(integrals: &I) -> Result<Self> {
        DM2::with_size(integrals.n_sp(), integrals.n_electrons())
    }

    /// Zero density matrix sharing the index map of `self`.
    pub fn zeros_like(&self) -> Self {
        DM2::new(Arc::clone(&self.index), self.n_electrons)
    }

    pub fn index(&self) -> &Arc<SpinOrbitalIndexMap> {
        &self.index
    }

    pub fn n_sp(&self) -> usize {
        self.index.n_sp()
    }

    pub fn n_electrons(&self) -> usize {
        self.n_electrons
    }

    pub fn block(&self) -> &DMatrix<f64> {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.block
    }

    pub fn diag(&self) -> &DVector<f64> {
        &self.diag
    }

    pub fn diag_mut(&mut self) -> &mut DVector<f64> {
        &mut self.diag
    }

    /// Set every stored element to `value`.
    pub fn fill(&mut self, value: f64) {
        self.block.fill(value);
        self.diag.fill(value);
    }

    /// Element `<a†_a a†_b a_d a_c>` over spin orbitals `0..2L`.
    pub fn get(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        if a == b || c == d {
            return 0.0;
        }

        let mut sign = 1.0;
        if a > b {
            sign = -sign;
        }
        if c > d {
            sign = -sign;
        }

        let l = self.n_sp();
        let i = self.index.sp2tp(a, b);
        let j = self.index.sp2tp(c, d);

        if i < l && j < l {
            sign * self.block[(i, j)]
        } else if i == j && i >= l {
            sign * self.diag[self.index.vector_index(i)]
        } else {
            0.0
        }
    }

    /// Accumulate the density matrix of the normalized DOCI vector `eigv`,
    /// whose element `i` belongs to pattern `i` of `perm`.
    ///
    /// Every worker of the rayon pool fills a partial matrix over its own
    /// range of rows; the partial matrices are summed afterwards.
    pub fn build(&mut self, perm: BitPermutation, eigv: &DVector<f64>) -> Result<()> {
        let l = self.n_sp();
        ensure!(
            perm.width() == l && 2 * perm.n_set() == self.n_electrons,
            "Basis of {} pairs in {} orbitals does not match {} electrons in {} orbitals",
            perm.n_set(),
            perm.width(),
            self.n_electrons,
            l
        );
        let dim = calc_combinations(l, self.n_electrons / 2)?;
        ensure!(
            eigv.len() as u64 == dim,
            "Vector of length {} does not match the basis dimension {}",
            eigv.len(),
            dim
        );

        let num_t = rayon::current_num_threads().max(1);
        let workload = balanced_workload(eigv.len(), num_t);
        info!("Running with {} threads", num_t);

        let start = Instant::now();

        let parts = (0..num_t)
            .into_par_iter()
            .map(|me| -> Result<DM2> {
                let worker_start = Instant::now();
                let (first, last) = (workload[me], workload[me + 1]);

                let mut part = self.zeros_like();
                let mut my_perm = perm;
                my_perm.reset();
                if first < last {
                    my_perm.seek(first as u64)?;
                }
                part.build_rows(my_perm, eigv, first, last);

                debug!(
                    "Worker {} accumulated rows {}..{} in {:.3} s",
                    me,
                    first,
                    last,
                    worker_start.elapsed().as_secs_f64()
                );
                Ok(part)
            })
            .collect::<Result<Vec<_>>>()?;

        self.fill(0.0);
        for part in &parts {
            *self += part;
        }

        info!("Building 2DM took {:.3} s", start.elapsed().as_secs_f64());

        Ok(())
    }

    fn build_rows(
        &mut self,
        mut perm: BitPermutation,
        eigv: &DVector<f64>,
        first: usize,
        last: usize,
    ) {
        let dim = eigv.len();

        for i in first..last {
            let bra = perm.get();
            let weight = eigv[i] * eigv[i];

            let mut occupied = bra;
            while occupied != 0 {
                let s = occupied.trailing_zeros() as usize;
                occupied &= occupied - 1;

                self.block[(s, s)] += weight;

                let mut others = occupied;
                while others != 0 {
                    let r = others.trailing_zeros() as usize;
                    others &= others - 1;
                    let slot = self.index.vector_index(self.index.sp2tp(r, s));
                    self.diag[slot] += weight;
                }
            }

            let mut kets = perm;
            for j in (i + 1)..dim {
                let Some(ket) = kets.next() else { break };
                let diff = bra ^ ket;

                if diff.count_ones() == 2 {
                    let r = diff.trailing_zeros() as usize;
                    let s = (diff & (diff - 1)).trailing_zeros() as usize;
                    let value = eigv[i] * eigv[j];
                    self.block[(r, s)] += value;
                    self.block[(s, r)] += value;
                }
            }

            perm.next();
        }
    }

    /// Fill with the reduced Hamiltonian of `integrals`, so that the
    /// [`dot`](Self::dot) with a density matrix is its energy without the
    /// nuclear repulsion.
    pub fn build_hamiltonian<I: IntegralProvider>(&mut self, integrals: &I) -> Result<()> {
        let l = self.n_sp();
        ensure!(
            integrals.n_sp() == l && integrals.n_electrons() == self.n_electrons,
            "Integrals for {} electrons in {} orbitals do not match {} electrons in {} orbitals",
            integrals.n_electrons(),
            integrals.n_sp(),
            self.n_electrons,
            l
        );

        let one_body = one_body_scale(self.n_electrons);
        let index = &self.index;

        let calc_elem = |i: usize, j: usize| -> f64 {
            let (a, b) = index.tp2sp(i);
            let (c, d) = index.tp2sp(j);
            let (a_, b_, c_, d_) = (a % l, b % l, c % l, d % l);

            let mut result = 0.0;

            if i == j {
                result += (integrals.get_t(a_, a_) + integrals.get_t(b_, b_)) * one_body;
            }

            // a ā ; c c̄
            if b == a + l && d == c + l {
                result += integrals.get_v(a_, b_, c_, d_);
            }

            // same spin
            if i == j && a / l == b / l && a != b {
                result += integrals.get_v(a_, b_, c_, d_) - integrals.get_v(a_, b_, d_, c_);
            }

            // opposite spin, different orbitals
            if i == j && a / l != b / l && a_ != b_ {
                result += integrals.get_v(a_, b_, c_, d_);
            }

            result
        };

        let block = DMatrix::from_fn(l, l, |i, j| calc_elem(i.min(j), i.max(j)));
        // each vector slot stands for four elements, two of which carry the
        // exchange term
        let diag = DVector::from_fn(self.index.n_pairs(), |i, _| {
            0.5 * calc_elem(l + i, l + i) + 0.5 * calc_elem(l * l + i, l * l + i)
        });

        self.block = block;
        self.diag = diag;

        Ok(())
    }

    /// Inner product, counting the vector four times.
    pub fn dot(&self, other: &DM2) -> f64 {
        self.block.dot(&other.block) + 4.0 * self.diag.dot(&other.diag)
    }

    /// Trace over ordered pairs of spin orbitals, `N(N-1)` for a normalized
    /// wavefunction.
    pub fn trace(&self) -> f64 {
        2.0 * (self.block.trace() + 4.0 * self.diag.sum())
    }

    /// Energy, without the nuclear repulsion, of this density matrix with
    /// `integrals`; equal to the [`dot`](Self::dot) with the reduced
    /// Hamiltonian of `integrals`.
    pub fn energy<I: IntegralProvider>(&self, integrals: &I) -> f64 {
        let l = self.n_sp();
        let mut result: f64 = (0..l).map(|a| self.orbital_term(integrals, a)).sum();
        for a in 0..l {
            for b in (a + 1)..l {
                result += self.pair_term(integrals, a, b);
            }
        }
        result
    }

    /// The part of [`energy`](Self::energy) that involves orbital `k` or `l`.
    fn touching_energy<I: IntegralProvider>(&self, integrals: &I, k: usize, l: usize) -> f64 {
        let mut result = self.orbital_term(integrals, k)
            + self.orbital_term(integrals, l)
            + self.pair_term(integrals, k.min(l), k.max(l));

        for x in (0..self.n_sp()).filter(|&x| x != k && x != l) {
            result += self.pair_term(integrals, k.min(x), k.max(x));
            result += self.pair_term(integrals, l.min(x), l.max(x));
        }

        result
    }

    fn orbital_term<I: IntegralProvider>(&self, integrals: &I, a: usize) -> f64 {
        let one_body = one_body_scale(self.n_electrons);
        self.block[(a, a)] * (2.0 * integrals.get_t(a, a) * one_body + integrals.get_v(a, a, a, a))
    }

    /// Terms of the pair `a < b`.
    fn pair_term<I: IntegralProvider>(&self, integrals: &I, a: usize, b: usize) -> f64 {
        let one_body = one_body_scale(self.n_electrons);
        let slot = self.index.vector_index(self.index.sp2tp(a, b));

        self.block[(a, b)] * integrals.get_v(a, a, b, b)
            + self.block[(b, a)] * integrals.get_v(b, b, a, a)
            + 4.0
                * self.diag[slot]
                * ((integrals.get_t(a, a) + integrals.get_t(b, b)) * one_body
                    + integrals.get_v(a, b, a, b)
                    - 0.5 * integrals.get_v(a, b, b, a))
    }

    /// Energy as an exact function of the rotation angle of orbitals `k` and
    /// `l`, with this density matrix kept fixed.
    pub fn rotation_polynomial<I: IntegralProvider>(
        &self,
        k: usize,
        l: usize,
        integrals: &I,
    ) -> RotationPolynomial {
        let offset = self.energy(integrals) - self.touching_energy(integrals, k, l);
        RotationPolynomial::from_samples(offset, |theta| {
            self.touching_energy(&RotatedIntegrals::new(integrals, k, l, theta), k, l)
        })
    }

    /// Angle of the rotation of `k` and `l` that minimizes the energy, by
    /// Newton-Raphson from `start_angle`, and whether it is a true minimum.
    pub fn find_min_angle<I: IntegralProvider>(
        &self,
        k: usize,
        l: usize,
        start_angle: f64,
        integrals: &I,
    ) -> (f64, bool) {
        self.rotation_polynomial(k, l, integrals)
            .find_minimum(start_angle)
    }

    /// Energy after rotating orbitals `k` and `l` over `theta`.
    pub fn calc_rotate<I: IntegralProvider>(
        &self,
        k: usize,
        l: usize,
        theta: f64,
        integrals: &I,
    ) -> f64 {
        self.energy(integrals) - self.touching_energy(integrals, k, l)
            + self.touching_energy(&RotatedIntegrals::new(integrals, k, l, theta), k, l)
    }

    /// Write to `filename`, block row-major.
    pub fn write_to_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let l = self.n_sp();
        let container = Dm2Container {
            group: RDM_GROUP.to_string(),
            block: (0..l * l).map(|idx| self.block[(idx / l, idx % l)]).collect(),
            vector: self.diag.iter().copied().collect(),
            n_sp: l as u64,
            n_electrons: self.n_electrons as u64,
        };

        write_container(filename, &container)
    }

    pub fn read_from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let filename = filename.as_ref();
        let container: Dm2Container = read_container(filename)
            .wrap_err_with(|| format!("Unable to read 2DM from {}", filename.display()))?;

        ensure!(
            container.group == RDM_GROUP,
            "File {} holds group '{}', expected '{}'",
            filename.display(),
            container.group,
            RDM_GROUP
        );

        let l = container.n_sp as usize;
        let mut rdm = DM2::with_size(l, container.n_electrons as usize)?;
        ensure!(
            container.block.len() == l * l && container.vector.len() == rdm.diag.len(),
            "Corrupt 2DM in {}: sizes do not match L = {}",
            filename.display(),
            l
        );

        rdm.block = DMatrix::from_row_slice(l, l, &container.block);
        rdm.diag = DVector::from_vec(container.vector);

        Ok(rdm)
    }
}

fn one_body_scale(n_electrons: usize) -> f64 {
    if n_electrons > 1 {
        1.0 / (n_electrons as f64 - 1.0)
    } else {
        0.0
    }
}

impl AddAssign<&DM2> for DM2 {
    fn add_assign(&mut self, other: &DM2) {
        self.block += &other.block;
        self.diag += &other.diag;
    }
}

impl fmt::Display for DM2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = self.n_sp();

        writeln!(f, "Block: ")?;
        for i in 0..l {
            for j in i..l {
                let (a, b) = self.index.tp2sp(i);
                let (c, d) = self.index.tp2sp(j);
                writeln!(
                    f,
                    "{}\t{}\t|\t{}  {} ; {}  {}\t\t{}",
                    i,
                    j,
                    a,
                    b,
                    c,
                    d,
                    self.block[(i, j)]
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Vector (4x): ")?;
        for (i, value) in self.diag.iter().enumerate() {
            let (a, b) = self.index.tp2sp(l + i);
            writeln!(f, "{}\t|\t{}  {}\t\t{}", i, a, b, value)?;
        }

        Ok(())
    }
}
