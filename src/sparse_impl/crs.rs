use crate::io::{read_container, write_container};
use color_eyre::eyre::{ensure, Result, WrapErr};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Entries whose magnitude falls below this are not stored.
pub const PRUNE_THRESHOLD: f64 = 1e-14;

/// Upper-triangle CRS storage of a symmetric matrix.
///
/// `row` holds one offset per started row plus the terminating offset, so a
/// matrix with `n` rows is complete when `row.len() == n + 1`. A shard built
/// by one worker of the Hamiltonian build has `n` equal to its number of rows
/// while its column indices stay global; it gets no lower-triangle mirror and
/// only becomes usable through [`concat`](Self::concat).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseMatrixCRS {
    n: usize,
    shard: bool,
    data: Vec<f64>,
    col: Vec<usize>,
    row: Vec<usize>,
    // strict lower triangle, derived from the upper one on completion
    lower_data: Vec<f64>,
    lower_col: Vec<usize>,
    lower_row: Vec<usize>,
}

/// On-disk layout of a sparse matrix group.
#[derive(Debug, Serialize, Deserialize)]
struct CrsContainer {
    group: String,
    data: Vec<f64>,
    data_size: u64,
    col: Vec<u64>,
    col_size: u64,
    row: Vec<u64>,
    n: u64,
}

impl SparseMatrixCRS {
    /// Empty matrix with `n` rows; no row has been started yet.
    pub fn new(n: usize) -> Self {
        SparseMatrixCRS {
            n,
            row: Vec::with_capacity(n + 1),
            ..Default::default()
        }
    }

    /// Row shard with `n` local rows and global column indices.
    pub fn new_shard(n: usize) -> Self {
        SparseMatrixCRS {
            shard: true,
            ..SparseMatrixCRS::new(n)
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of stored (upper triangle) entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn is_complete(&self) -> bool {
        self.row.len() == self.n + 1
    }

    pub fn is_shard(&self) -> bool {
        self.shard
    }

    /// Whether the lower-triangle mirror used by [`mvprod`](Self::mvprod)
    /// has been built.
    pub fn has_mirror(&self) -> bool {
        self.lower_row.len() == self.n + 1
    }

    /// Close the current row and start the next one.
    ///
    /// Has to be called `n + 1` times in total: once before the first row and
    /// once after every row. Further calls are ignored.
    pub fn new_row(&mut self) {
        if self.is_complete() {
            return;
        }

        self.row.push(self.data.len());

        if self.is_complete() && !self.shard {
            self.build_lower();
        }
    }

    /// Append an element to the current row.
    ///
    /// `j` must be larger than every column already in the row.
    #[inline]
    pub fn push_to_row_next(&mut self, j: usize, value: f64) {
        debug_assert!(
            self.row.last().map_or(true, |&start| start == self.col.len())
                || self.col.last().map_or(true, |&last| last < j),
            "columns must be pushed in increasing order"
        );
        self.data.push(value);
        self.col.push(j);
    }

    /// Add `value` to element `j` of the current row, in any column order.
    ///
    /// An existing entry is accumulated and removed again when the sum drops
    /// below [`PRUNE_THRESHOLD`].
    pub fn push_to_row(&mut self, j: usize, value: f64) {
        let start = self.row.last().copied().unwrap_or(0);

        if start == self.col.len() || self.col.last().map_or(true, |&last| last < j) {
            self.data.push(value);
            self.col.push(j);
            return;
        }

        let pos = start + self.col[start..].partition_point(|&c| c < j);
        if self.col[pos] == j {
            self.data[pos] += value;
            if self.data[pos].abs() < PRUNE_THRESHOLD {
                self.data.remove(pos);
                self.col.remove(pos);
            }
        } else {
            self.col.insert(pos, j);
            self.data.insert(pos, value);
        }
    }

    /// Element `(i, j)` of the symmetric matrix.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        if i + 1 >= self.row.len() {
            return 0.0;
        }

        let range = self.row[i]..self.row[i + 1];
        match self.col[range.clone()].binary_search(&j) {
            Ok(k) => self.data[range.start + k],
            Err(_) => 0.0,
        }
    }

    pub fn num_in_row(&self, i: usize) -> usize {
        self.row[i + 1] - self.row[i]
    }

    pub fn element_in_row(&self, i: usize, k: usize) -> f64 {
        self.data[self.row[i] + k]
    }

    pub fn col_in_row(&self, i: usize, k: usize) -> usize {
        self.col[self.row[i] + k]
    }

    /// Store the upper triangle of a dense symmetric matrix.
    pub fn from_dense(dense: &DMatrix<f64>) -> Result<Self> {
        ensure!(
            dense.is_square(),
            "Cannot store a {}x{} matrix as a symmetric sparse matrix",
            dense.nrows(),
            dense.ncols()
        );

        let n = dense.nrows();
        let mut mat = SparseMatrixCRS::new(n);
        for i in 0..n {
            mat.new_row();
            for j in i..n {
                let value = dense[(i, j)];
                if value.abs() > PRUNE_THRESHOLD {
                    mat.push_to_row_next(j, value);
                }
            }
        }
        mat.new_row();

        Ok(mat)
    }

    /// Expand into a dense matrix, filling the lower triangle by symmetry.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n, self.n);
        for i in 0..self.row.len().saturating_sub(1) {
            for k in self.row[i]..self.row[i + 1] {
                dense[(i, self.col[k])] = self.data[k];
                dense[(self.col[k], i)] = self.data[k];
            }
        }
        dense
    }

    /// `y = beta * y + A * x` with `A` the full symmetric matrix.
    pub fn mvprod(&self, x: &[f64], y: &mut [f64], beta: f64) {
        debug_assert!(self.has_mirror(), "mvprod on an unfinished matrix or a shard");
        debug_assert_eq!(x.len(), self.n);
        debug_assert_eq!(y.len(), self.n);

        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let mut sum = 0.0;
            for k in self.row[i]..self.row[i + 1] {
                sum += self.data[k] * x[self.col[k]];
            }
            for k in self.lower_row[i]..self.lower_row[i + 1] {
                sum += self.lower_data[k] * x[self.lower_col[k]];
            }

            // beta == 0 must not propagate garbage from y
            *yi = if beta == 0.0 { sum } else { beta * *yi + sum };
        });
    }

    /// Stack complete row shards, in order, into one matrix.
    pub fn concat(parts: Vec<SparseMatrixCRS>) -> Result<Self> {
        let n: usize = parts.iter().map(|p| p.n).sum();
        let nnz: usize = parts.iter().map(|p| p.nnz()).sum();

        let mut mat = SparseMatrixCRS {
            n,
            data: Vec::with_capacity(nnz),
            col: Vec::with_capacity(nnz),
            row: Vec::with_capacity(n + 1),
            ..Default::default()
        };

        for (idx, part) in parts.into_iter().enumerate() {
            ensure!(
                part.is_complete(),
                "Shard {} has {} of {} rows closed",
                idx,
                part.row.len().saturating_sub(1),
                part.n
            );
            ensure!(
                part.col.iter().all(|&c| c < n),
                "Shard {} has a column index beyond the {} rows of the matrix",
                idx,
                n
            );

            let offset = mat.data.len();
            mat.row
                .extend(part.row[..part.n].iter().map(|&r| r + offset));
            mat.data.extend(part.data);
            mat.col.extend(part.col);
        }
        mat.row.push(mat.data.len());
        mat.build_lower();

        Ok(mat)
    }

    /// Transpose the strict upper triangle into the lower-triangle mirror.
    fn build_lower(&mut self) {
        let n = self.n;
        let mut counts = vec![0usize; n + 1];
        for i in 0..n {
            for k in self.row[i]..self.row[i + 1] {
                let j = self.col[k];
                if j > i && j < n {
                    counts[j + 1] += 1;
                }
            }
        }
        for i in 0..n {
            counts[i + 1] += counts[i];
        }

        let total = counts[n];
        let mut lower_data = vec![0.0; total];
        let mut lower_col = vec![0usize; total];
        let mut next = counts.clone();
        // rows visited in increasing order keep the mirror columns sorted
        for i in 0..n {
            for k in self.row[i]..self.row[i + 1] {
                let j = self.col[k];
                if j > i && j < n {
                    lower_data[next[j]] = self.data[k];
                    lower_col[next[j]] = i;
                    next[j] += 1;
                }
            }
        }

        self.lower_data = lower_data;
        self.lower_col = lower_col;
        self.lower_row = counts;
    }

    /// Write the matrix into `filename` under the group `name`.
    pub fn write_to_file<P: AsRef<Path>>(&self, filename: P, name: &str) -> Result<()> {
        let container = CrsContainer {
            group: name.to_string(),
            data: self.data.clone(),
            data_size: self.data.len() as u64,
            col: self.col.iter().map(|&c| c as u64).collect(),
            col_size: self.col.len() as u64,
            row: self.row.iter().map(|&r| r as u64).collect(),
            n: self.n as u64,
        };

        write_container(filename, &container)
    }

    /// Read a matrix previously written under the group `name`.
    pub fn read_from_file<P: AsRef<Path>>(filename: P, name: &str) -> Result<Self> {
        let filename = filename.as_ref();
        let container: CrsContainer = read_container(filename)
            .wrap_err_with(|| format!("Unable to read sparse matrix from {}", filename.display()))?;

        ensure!(
            container.group == name,
            "File {} holds group '{}', expected '{}'",
            filename.display(),
            container.group,
            name
        );
        ensure!(
            container.data.len() as u64 == container.data_size
                && container.col.len() as u64 == container.col_size
                && container.data.len() == container.col.len(),
            "Corrupt sparse matrix in {}: data/col sizes disagree",
            filename.display()
        );
        ensure!(
            container.row.len() as u64 == container.n + 1
                && container.row.last().copied() == Some(container.data_size),
            "Corrupt sparse matrix in {}: row offsets do not match n = {}",
            filename.display(),
            container.n
        );
        ensure!(
            container.row.first().copied() == Some(0)
                && container.row.windows(2).all(|w| w[0] <= w[1]),
            "Corrupt sparse matrix in {}: row offsets are not ascending from 0",
            filename.display()
        );
        for (i, w) in container.row.windows(2).enumerate() {
            let cols = &container.col[w[0] as usize..w[1] as usize];
            ensure!(
                cols.iter().all(|&c| c >= i as u64 && c < container.n),
                "Corrupt sparse matrix in {}: row {} has a column outside {}..{}",
                filename.display(),
                i,
                i,
                container.n
            );
        }

        let mut mat = SparseMatrixCRS {
            n: container.n as usize,
            data: container.data,
            col: container.col.into_iter().map(|c| c as usize).collect(),
            row: container.row.into_iter().map(|r| r as usize).collect(),
            ..Default::default()
        };
        mat.build_lower();

        Ok(mat)
    }

    /// The raw CRS arrays, one per line.
    pub fn to_raw_string(&self) -> String {
        let join = |values: Vec<String>| values.join(" ");
        format!(
            "Data({}):\n{}\nCol indices:\n{}\nRow indices:\n{}\n",
            self.data.len(),
            join(self.data.iter().map(|v| v.to_string()).collect()),
            join(self.col.iter().map(|v| v.to_string()).collect()),
            join(self.row.iter().map(|v| v.to_string()).collect())
        )
    }
}

impl fmt::Display for SparseMatrixCRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.row.len().saturating_sub(1) {
            for k in self.row[i]..self.row[i + 1] {
                writeln!(f, "{}\t{}\t{}", i, self.col[k], self.data[k])?;
            }
        }
        Ok(())
    }
}
