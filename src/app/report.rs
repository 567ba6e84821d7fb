use crate::dm2_impl::DM2;
use crate::integrals_impl::{IntegralProvider, SymmetricIntegrals};
use color_eyre::eyre::Result;
use tracing::{info, warn};

/// Log the ground-state energy and cross-check it against the 2-RDM.
pub fn report_ground_state(
    integrals: &SymmetricIntegrals,
    energy: f64,
    rdm: &DM2,
) -> Result<()> {
    let nucl_rep = integrals.nucl_rep();
    let n = integrals.n_electrons() as f64;

    let mut reduced = rdm.zeros_like();
    reduced.build_hamiltonian(integrals)?;
    let rdm_energy = rdm.dot(&reduced) + nucl_rep;
    let trace = rdm.trace();

    info!("\nDOCI calculation finished.");
    info!("  Electronic energy:  {:.10} au", energy);
    info!("  Nuclear repulsion:  {:.10} au", nucl_rep);
    info!("\nDOCI Total Energy: {:.10} au", energy + nucl_rep);
    info!("\n2-RDM energy: {:.10} au", rdm_energy);
    info!("2-RDM trace:  {:.10} (expected {})", trace, n * (n - 1.0));

    if (rdm_energy - energy - nucl_rep).abs() > 1e-6 {
        warn!(
            "2-RDM energy differs from the eigenvalue by {:.3e}",
            rdm_energy - energy - nucl_rep
        );
    }

    Ok(())
}

pub fn report_optimization(name: &str, energy: f64) {
    info!("\n===========================================");
    info!("       Orbital optimization ({}) done", name);
    info!("===========================================");
    info!("Optimized energy: {:.10} au", energy);
}
