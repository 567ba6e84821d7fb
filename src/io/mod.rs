//! Input/Output operations for DOCI calculations
//!
//! This module handles logging setup, integral files, the binary containers
//! used for density matrices, sparse Hamiltonians and orbital transforms, and
//! the checkpoint directory of long optimizations.

mod checkpoint;
mod container;
mod integrals_loader;
mod output;

pub use checkpoint::{Checkpoints, CHECKPOINT_DIR_ENV};
pub use container::{read_container, write_container};
pub use integrals_loader::{load_integrals, save_integrals, IntegralsFile};
pub use output::setup_output;
