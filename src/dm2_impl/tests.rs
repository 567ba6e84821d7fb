//! Tests for the 2-RDM and the rotated-energy polynomial

#[cfg(test)]
mod tests {
    use super::super::{RotatedIntegrals, SpinOrbitalIndexMap, DM2};
    use crate::hamiltonian_impl::DOCIHamiltonian;
    use crate::integrals_impl::{IntegralProvider, Integrals};
    use crate::test_support::toy_integrals;
    use nalgebra::DVector;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    /// Ground-state energy and density matrix of the toy system.
    fn ground_state(n_sp: usize, n_electrons: usize, seed: u64) -> (Integrals, f64, DM2) {
        let mut ham = DOCIHamiltonian::new(toy_integrals(n_sp, n_electrons, seed)).unwrap();
        ham.build().unwrap();
        let (energy, eigv) = ham.diagonalize().unwrap();

        let mut rdm = DM2::from_integrals(ham.integrals()).unwrap();
        rdm.build(ham.permutation(), &eigv).unwrap();

        (ham.into_integrals(), energy, rdm)
    }

    fn random_dm2(n_sp: usize, n_electrons: usize, seed: u64) -> DM2 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rdm = DM2::with_size(n_sp, n_electrons).unwrap();
        for i in 0..n_sp {
            for j in i..n_sp {
                let value = rng.gen_range(-1.0..1.0);
                rdm.block_mut()[(i, j)] = value;
                rdm.block_mut()[(j, i)] = value;
            }
        }
        for value in rdm.diag_mut().iter_mut() {
            *value = rng.gen_range(0.0..1.0);
        }
        rdm
    }

    #[test]
    fn test_trace() {
        let (_, _, rdm) = ground_state(4, 4, 1);
        assert!((rdm.trace() - 12.0).abs() < 1e-10);

        let (_, _, rdm) = ground_state(7, 6, 2);
        assert!((rdm.trace() - 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_dot_reproduces_energy() {
        let (ints, energy, rdm) = ground_state(6, 6, 3);

        let mut reduced = rdm.zeros_like();
        reduced.build_hamiltonian(&ints).unwrap();

        let from_rdm = rdm.dot(&reduced) + ints.nucl_rep();
        assert!((from_rdm - (energy + ints.nucl_rep())).abs() < 1e-6);
        assert!((rdm.energy(&ints) - rdm.dot(&reduced)).abs() < 1e-10);
    }

    #[test]
    fn test_energy_is_dot_with_reduced_hamiltonian() {
        let ints = toy_integrals(5, 4, 4);
        let rdm = random_dm2(5, 4, 5);

        let mut reduced = DM2::from_integrals(&ints).unwrap();
        reduced.build_hamiltonian(&ints).unwrap();

        assert!((rdm.energy(&ints) - rdm.dot(&reduced)).abs() < 1e-12);
    }

    #[test]
    fn test_build_hamiltonian_rejects_other_size() {
        let mut rdm = DM2::with_size(4, 4).unwrap();
        assert!(rdm.build_hamiltonian(&toy_integrals(5, 4, 1)).is_err());
    }

    #[test]
    fn test_build_rejects_wrong_vector() {
        let ham = DOCIHamiltonian::new(toy_integrals(4, 4, 1)).unwrap();
        let mut rdm = DM2::with_size(4, 4).unwrap();

        assert!(rdm.build(ham.permutation(), &DVector::zeros(5)).is_err());
    }

    #[test]
    fn test_parallel_build_matches_single_thread() {
        let mut ham = DOCIHamiltonian::new(toy_integrals(8, 6, 6)).unwrap();
        ham.build().unwrap();
        let (_, eigv) = ham.diagonalize().unwrap();

        let mut rdm = DM2::from_integrals(ham.integrals()).unwrap();
        rdm.build(ham.permutation(), &eigv).unwrap();

        let mut single = rdm.zeros_like();
        rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| single.build(ham.permutation(), &eigv))
            .unwrap();

        assert!((rdm.block() - single.block()).abs().max() < 1e-13);
        assert!((rdm.diag() - single.diag()).abs().max() < 1e-13);
    }

    #[test]
    fn test_accessor_antisymmetry() {
        let (_, _, rdm) = ground_state(5, 4, 7);
        let m = 10;

        for a in 0..m {
            for b in 0..m {
                for c in 0..m {
                    for d in 0..m {
                        if a == b || c == d {
                            assert_eq!(rdm.get(a, b, c, d), 0.0);
                            continue;
                        }
                        let value = rdm.get(a, b, c, d);
                        assert_eq!(value, -rdm.get(b, a, c, d));
                        assert_eq!(value, -rdm.get(a, b, d, c));
                        assert_eq!(value, rdm.get(b, a, d, c));
                    }
                }
            }
        }
    }

    #[test]
    fn test_accessor_layout() {
        let mut rdm = DM2::with_size(3, 2).unwrap();
        rdm.block_mut()[(0, 2)] = 0.25;
        rdm.diag_mut()[0] = 0.5;

        // a ā ; c c̄
        assert_eq!(rdm.get(0, 3, 2, 5), 0.25);
        assert_eq!(rdm.get(3, 0, 2, 5), -0.25);
        // pair (0, 1) in all four spin combinations
        assert_eq!(rdm.get(0, 1, 0, 1), 0.5);
        assert_eq!(rdm.get(3, 4, 3, 4), 0.5);
        assert_eq!(rdm.get(0, 4, 0, 4), 0.5);
        assert_eq!(rdm.get(3, 1, 3, 1), 0.5);
        // different pairs outside the block
        assert_eq!(rdm.get(0, 1, 0, 2), 0.0);
    }

    #[test]
    fn test_file_roundtrip() {
        let (_, _, rdm) = ground_state(5, 4, 8);
        let path = std::env::temp_dir().join("doci_test_rdm.bin");

        rdm.write_to_file(&path).unwrap();
        let back = DM2::read_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back.n_sp(), 5);
        assert_eq!(back.n_electrons(), 4);
        assert_eq!(back, rdm);
    }

    #[test]
    fn test_fill_and_add() {
        let index = Arc::new(SpinOrbitalIndexMap::new(4).unwrap());
        let mut a = DM2::new(Arc::clone(&index), 4);
        let mut b = DM2::new(index, 4);
        a.fill(1.0);
        b.fill(0.5);
        a += &b;

        assert!(a.block().iter().all(|&x| x == 1.5));
        assert!(a.diag().iter().all(|&x| x == 1.5));
        assert_eq!(a.diag().len(), 6);
    }

    #[test]
    fn test_display() {
        let mut rdm = DM2::with_size(2, 2).unwrap();
        rdm.fill(1.0);
        let out = rdm.to_string();

        assert!(out.starts_with("Block: \n0\t0\t|\t0  2 ; 0  2\t\t1\n"));
        assert!(out.contains("Vector (4x): \n0\t|\t0  1\t\t1\n"));
    }

    #[test]
    fn test_rotated_integrals_view() {
        let ints = toy_integrals(4, 4, 9);
        let (k, l, theta) = (1, 3, 0.37);

        let mut rotated = ints.clone();
        rotated.jacobi_rotation(k, l, theta);
        let view = RotatedIntegrals::new(&ints, k, l, theta);

        for a in 0..4 {
            for b in 0..4 {
                assert!((view.get_t(a, b) - rotated.get_t(a, b)).abs() < 1e-13);
                for c in 0..4 {
                    for d in 0..4 {
                        assert!((view.get_v(a, b, c, d) - rotated.get_v(a, b, c, d)).abs() < 1e-13);
                    }
                }
            }
        }
    }

    #[test]
    fn test_two_orbital_angle_search() {
        let mut ints = Integrals::new(2, 2, 0.0);
        ints.set_t(0, 0, -1.0);
        ints.set_t(1, 1, 0.5);
        ints.set_t(0, 1, 0.2);

        let mut rdm = DM2::with_size(2, 2).unwrap();
        rdm.block_mut()[(0, 0)] = 1.0;

        // E(theta) = -0.5 - 1.5 cos(2 theta) + 0.4 sin(2 theta)
        let exact = 0.5 * (0.4f64 / -1.5).atan();
        let (theta, is_minimum) = rdm.find_min_angle(0, 1, 0.3, &ints);

        assert!(is_minimum);
        assert!((theta - exact).abs() < 1e-10);

        let expected = -0.5 - 1.5 * (2.0 * exact).cos() + 0.4 * (2.0 * exact).sin();
        assert!((rdm.calc_rotate(0, 1, theta, &ints) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_calc_rotate_matches_rotated_integrals() {
        let (ints, _, rdm) = ground_state(6, 4, 10);
        let (k, l) = (0, 4);

        for theta in [-0.8, -0.1, 0.25, 1.1] {
            let mut rotated = ints.clone();
            rotated.jacobi_rotation(k, l, theta);

            let expected = rdm.energy(&rotated);
            assert!((rdm.calc_rotate(k, l, theta, &ints) - expected).abs() < 1e-10);

            let poly = rdm.rotation_polynomial(k, l, &ints);
            assert!((poly.value(theta) - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn test_polynomial_derivatives() {
        let (ints, _, rdm) = ground_state(5, 4, 11);
        let poly = rdm.rotation_polynomial(1, 2, &ints);
        let h = 1e-4;

        for theta in [-0.5, 0.0, 0.3] {
            let numeric = (poly.value(theta + h) - poly.value(theta - h)) / (2.0 * h);
            assert!((poly.gradient(theta) - numeric).abs() < 1e-6);

            let numeric = (poly.gradient(theta + h) - poly.gradient(theta - h)) / (2.0 * h);
            assert!((poly.hessian(theta) - numeric).abs() < 1e-6);
        }
    }

    #[test]
    fn test_min_angle_is_stationary() {
        let (ints, energy, rdm) = ground_state(6, 4, 12);
        assert!((rdm.energy(&ints) - energy).abs() < 1e-8);

        let poly = rdm.rotation_polynomial(0, 3, &ints);
        let (theta, is_minimum) = rdm.find_min_angle(0, 3, 0.3, &ints);

        assert!(poly.gradient(theta).abs() < 1e-8);
        assert_eq!(is_minimum, poly.hessian(theta) > 0.0);
        assert!((poly.value(0.0) - energy).abs() < 1e-8);
    }
}
