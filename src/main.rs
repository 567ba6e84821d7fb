//! DOCI Calculation Command-Line Interface
//!
//! Computes the DOCI ground state of a set of integrals, optionally after
//! optimizing the orbital basis.

use color_eyre::eyre::Result;
use doci::app::DociApplication;

fn main() -> Result<()> {
    color_eyre::install()?;

    DociApplication::from_cli()?.run()
}
