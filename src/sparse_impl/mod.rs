//! Sparse symmetric matrices in compressed row storage
//!
//! Only the diagonal and the strict upper triangle are stored. Rows are
//! appended one at a time through [`SparseMatrixCRS::new_row`] and the
//! `push_to_row*` methods; once the last row is closed a mirror of the strict
//! lower triangle is derived so that the matrix-vector product can run row
//! parallel over the full symmetric matrix.
//!
//! # Usage
//!
//! ```rust
//! use doci::sparse_impl::SparseMatrixCRS;
//!
//! let mut mat = SparseMatrixCRS::new(2);
//! mat.new_row();
//! mat.push_to_row_next(0, 1.0);
//! mat.push_to_row_next(1, 0.5);
//! mat.new_row();
//! mat.push_to_row_next(1, 2.0);
//! mat.new_row();
//!
//! let mut y = vec![0.0; 2];
//! mat.mvprod(&[1.0, 1.0], &mut y, 0.0);
//! assert_eq!(y, vec![1.5, 2.5]);
//! ```

mod crs;

pub use crs::{SparseMatrixCRS, PRUNE_THRESHOLD};
