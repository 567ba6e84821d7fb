//! End-to-end tests on a four-orbital, four-electron model
//!
//! The model is a half-filled Hubbard ring (t = 1, U = 4, site potentials
//! 0 / 0.3 / 0 / 0.3) written in the plane-wave orbitals of the bare ring.
//! The same integrals are stored in `demos/hubbard_ring4.yaml`.

use doci::dm2_impl::DM2;
use doci::hamiltonian_impl::DOCIHamiltonian;
use doci::integrals_impl::{IntegralProvider, Integrals, SymmetricIntegrals};
use doci::io::{load_integrals, save_integrals};
use doci::optim_impl::{LocalMinimizer, LocalSettings, OrbitalOptimizer};
use doci::permutation::BitPermutation;
use std::path::PathBuf;

const LOWEST_EIGENVALUE: f64 = 0.5250151217156607;
const NUCL_REP: f64 = 0.5;

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn demo_path(filename: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("demos")
            .join(filename)
    }

    fn hubbard_ring() -> SymmetricIntegrals {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let orbitals = [
            [0.5, 0.5, 0.5, 0.5],
            [h, 0.0, -h, 0.0],
            [0.0, h, 0.0, -h],
            [0.5, -0.5, 0.5, -0.5],
        ];
        let u = 4.0;

        let mut ints = Integrals::new(4, 4, NUCL_REP);
        ints.set_t(0, 0, -1.85);
        ints.set_t(0, 3, -0.15);
        ints.set_t(2, 2, 0.3);
        ints.set_t(3, 3, 2.15);

        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        let value: f64 = (0..4)
                            .map(|i| {
                                u * orbitals[a][i] * orbitals[b][i] * orbitals[c][i] * orbitals[d][i]
                            })
                            .sum();
                        ints.set_v(a, b, c, d, value);
                    }
                }
            }
        }

        SymmetricIntegrals::c1(ints)
    }

    #[test]
    fn test_basis_enumeration() {
        let mut perm = BitPermutation::new(2, 4).unwrap();
        let mut patterns = vec![perm.get()];
        while let Some(next) = perm.next() {
            patterns.push(next);
        }

        assert_eq!(patterns, vec![0b0011, 0b0101, 0b0110, 0b1001, 0b1010, 0b1100]);
        assert_eq!(perm.get(), perm.max_pattern());
        assert_eq!(perm.count().unwrap(), 6);
    }

    #[test]
    fn test_ground_state_energy() {
        let mut ham = DOCIHamiltonian::new(hubbard_ring()).unwrap();
        assert_eq!(ham.dim(), 6);

        ham.build().unwrap();
        let (energy, eigv) = ham.diagonalize().unwrap();
        assert!((energy - LOWEST_EIGENVALUE).abs() < 1e-8);
        assert!((eigv.norm() - 1.0).abs() < 1e-10);

        let (spectrum, _) = ham.diagonalize_full();
        assert!((spectrum[0] - energy).abs() < 1e-8);
    }

    #[test]
    fn test_rdm_trace_and_energy() {
        let mut ham = DOCIHamiltonian::new(hubbard_ring()).unwrap();
        ham.build().unwrap();
        let (energy, eigv) = ham.diagonalize().unwrap();

        let mut rdm = DM2::from_integrals(ham.integrals()).unwrap();
        rdm.build(ham.permutation(), &eigv).unwrap();
        assert!((rdm.trace() - 12.0).abs() < 1e-10);

        let mut reduced = DM2::from_integrals(ham.integrals()).unwrap();
        reduced.build_hamiltonian(ham.integrals()).unwrap();

        let nucl_rep = ham.integrals().nucl_rep();
        assert!((rdm.dot(&reduced) + nucl_rep - (energy + nucl_rep)).abs() < 1e-6);
    }

    #[test]
    fn test_demo_file_matches_model() {
        let path = demo_path("hubbard_ring4.yaml");
        let loaded = load_integrals(&path).unwrap();
        let expected = hubbard_ring();

        assert_eq!(loaded.n_sp(), 4);
        assert_eq!(loaded.n_electrons(), 4);
        assert_eq!(loaded.nucl_rep(), NUCL_REP);

        let t = (loaded.integrals().oei() - expected.integrals().oei()).abs().max();
        let v = (loaded.integrals().tei() - expected.integrals().tei()).abs().max();
        assert!(t < 1e-12);
        assert!(v < 1e-12);
    }

    #[test]
    fn test_integrals_file_roundtrip() {
        let path = std::env::temp_dir().join("doci_integration_ints.yaml");
        let ints = hubbard_ring();

        save_integrals(&path, &ints).unwrap();
        let back = load_integrals(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back.irreps(), ints.irreps());
        assert!((back.integrals().tei() - ints.integrals().tei()).abs().max() < 1e-14);
    }

    #[test]
    fn test_local_optimization_is_consistent() {
        let settings = LocalSettings {
            max_iterations: 3,
            conv_steps: 2,
            seed: Some(1),
            ..LocalSettings::default()
        };
        let mut opt = LocalMinimizer::new(hubbard_ring(), settings).unwrap();
        let energy = opt.optimize().unwrap();

        assert!(opt.transform().unitary().is_orthogonal(1e-10));

        // a fresh calculation in the optimized basis gives the same energy
        let transformed = opt
            .transform()
            .reference()
            .transformed(opt.transform().unitary().matrix());
        let mut ham = DOCIHamiltonian::new(transformed).unwrap();
        ham.build().unwrap();
        let fresh = ham.calc_energy().unwrap() + ham.integrals().nucl_rep();

        assert!((fresh - energy).abs() < 1e-8);
        assert!((opt.rdm().trace() - 12.0).abs() < 1e-10);
    }
}
