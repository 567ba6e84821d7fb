//! Tests for the orbital optimizers

#[cfg(test)]
mod tests {
    use super::super::{
        create_optimizer, parse_allowed_irreps, select_pair, AnnealingSettings, LocalMinimizer,
        LocalSettings, OptimizationAlgorithm, OptimizerSettings, OrbitalOptimizer, PairRotation,
        SimulatedAnnealing,
    };
    use crate::integrals_impl::{IntegralProvider, SymmetricIntegrals};
    use crate::test_support::toy_integrals;
    use std::str::FromStr;

    fn c1_integrals(n_sp: usize, n_electrons: usize, seed: u64) -> SymmetricIntegrals {
        SymmetricIntegrals::c1(toy_integrals(n_sp, n_electrons, seed))
    }

    fn local_settings(max_iterations: usize) -> LocalSettings {
        LocalSettings {
            max_iterations,
            conv_steps: 3,
            seed: Some(7),
            ..LocalSettings::default()
        }
    }

    fn anneal_settings(max_steps: usize) -> AnnealingSettings {
        AnnealingSettings {
            max_steps,
            seed: Some(42),
            ..AnnealingSettings::default()
        }
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(
            OptimizationAlgorithm::from_str("local").unwrap(),
            OptimizationAlgorithm::LocalMinimizer
        );
        assert_eq!(
            OptimizationAlgorithm::from_str("Jacobi").unwrap(),
            OptimizationAlgorithm::LocalMinimizer
        );
        assert_eq!(
            OptimizationAlgorithm::from_str("ANNEAL").unwrap(),
            OptimizationAlgorithm::SimulatedAnnealing
        );
        assert!(OptimizationAlgorithm::from_str("cg").is_err());
    }

    #[test]
    fn test_parse_allowed_irreps() {
        assert_eq!(parse_allowed_irreps("0,2", 4), vec![0, 2]);
        assert_eq!(parse_allowed_irreps(" 3 , 1,1 ,", 4), vec![1, 3]);
        assert_eq!(parse_allowed_irreps("1,x,7", 4), vec![1]);
        assert!(parse_allowed_irreps("", 4).is_empty());
    }

    #[test]
    fn test_default_settings() {
        let local = LocalSettings::default();
        assert_eq!(local.conv_crit, 1e-6);
        assert_eq!(local.conv_steps, 25);
        assert!(!local.dist_choice);

        let anneal = AnnealingSettings::default();
        assert_eq!(anneal.start_temp, 0.1);
        assert_eq!(anneal.max_unaccepted, 1500);
    }

    #[test]
    fn test_create_optimizer() {
        let settings = OptimizerSettings::default();

        let local = create_optimizer("local", c1_integrals(4, 4, 1), &settings).unwrap();
        assert_eq!(local.name(), "local");

        let anneal = create_optimizer("anneal", c1_integrals(4, 4, 1), &settings).unwrap();
        assert_eq!(anneal.name(), "anneal");

        assert!(create_optimizer("newton", c1_integrals(4, 4, 1), &settings).is_err());
        assert!(create_optimizer("local", c1_integrals(4, 3, 1), &settings).is_err());
    }

    #[test]
    fn test_scan_respects_irreps() {
        let ints = SymmetricIntegrals::new(toy_integrals(5, 4, 2), vec![0, 1, 0, 1, 0], 2).unwrap();
        let mut opt = LocalMinimizer::new(ints, local_settings(1)).unwrap();
        opt.calc_new_energy().unwrap();

        for rot in opt.scan_orbitals() {
            assert!(rot.k < rot.l);
            assert_eq!(rot.k % 2, rot.l % 2);
            assert!(rot.angle.abs() <= std::f64::consts::FRAC_PI_2);
        }

        opt.set_allowed_irreps(vec![1]);
        assert_eq!(opt.allowed_irreps(), &[1]);
        for rot in opt.scan_orbitals() {
            assert_eq!((rot.k, rot.l), (1, 3));
        }
    }

    #[test]
    fn test_local_step_reaches_predicted_energy() {
        let mut opt = LocalMinimizer::new(c1_integrals(5, 4, 3), local_settings(1)).unwrap();
        let nucl_rep = opt.hamiltonian().integrals().nucl_rep();

        opt.calc_new_energy().unwrap();
        let mut candidates = opt.scan_orbitals();
        assert!(!candidates.is_empty());
        candidates.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        let best = candidates[0];

        // the rotated old state bounds the new ground state from above
        let energy = opt.optimize().unwrap();
        assert_eq!(opt.iterations(), 1);
        assert!(energy <= best.energy + nucl_rep + 1e-8);
        assert!(opt.transform().unitary().is_orthogonal(1e-12));
    }

    #[test]
    fn test_local_keeps_state_consistent() {
        let mut opt = LocalMinimizer::new(c1_integrals(5, 6, 4), local_settings(4)).unwrap();
        let energy = opt.optimize().unwrap();

        let expected = opt
            .transform()
            .reference()
            .transformed(opt.transform().unitary().matrix());
        let diff = (expected.integrals().tei() - opt.hamiltonian().integrals().integrals().tei())
            .abs()
            .max();
        assert!(diff < 1e-10);

        let nucl_rep = opt.hamiltonian().integrals().nucl_rep();
        assert!((opt.rdm().trace() - 30.0).abs() < 1e-10);
        assert!((opt.rdm().energy(opt.hamiltonian().integrals()) + nucl_rep - energy).abs() < 1e-6);
    }

    #[test]
    fn test_choose_orbitalpair_in_range() {
        let mut opt = LocalMinimizer::new(c1_integrals(5, 4, 5), local_settings(1)).unwrap();
        opt.calc_new_energy().unwrap();
        let candidates = opt.scan_orbitals();

        for _ in 0..20 {
            assert!(opt.choose_orbitalpair(&candidates) < candidates.len().max(1));
        }
    }

    fn rotations(pairs: &[(usize, usize)]) -> Vec<PairRotation> {
        pairs
            .iter()
            .enumerate()
            .map(|(idx, &(k, l))| PairRotation {
                k,
                l,
                angle: 0.1,
                energy: -1.0 + 0.1 * idx as f64,
            })
            .collect()
    }

    #[test]
    fn test_select_pair_never_repeats_previous() {
        let candidates = rotations(&[(0, 1), (1, 2), (0, 3)]);

        for prev_idx in 0..3 {
            let prev = Some((candidates[prev_idx].k, candidates[prev_idx].l));
            for first in 0..3 {
                for second in 0..3 {
                    let idx = select_pair(&candidates, prev, [first, second]).unwrap();
                    assert_ne!(idx, prev_idx);
                }
            }
            let idx = select_pair(&candidates, prev, std::iter::empty()).unwrap();
            assert_ne!(idx, prev_idx);
        }
    }

    #[test]
    fn test_select_pair_fallbacks() {
        let candidates = rotations(&[(0, 1), (1, 2), (0, 3)]);

        // best candidate without draws, the next one when it was rotated last
        assert_eq!(select_pair(&candidates, None, std::iter::empty()), Some(0));
        assert_eq!(select_pair(&candidates, Some((0, 1)), std::iter::empty()), Some(1));

        // a draw that is not the previous pair is kept
        assert_eq!(select_pair(&candidates, Some((1, 2)), [2, 0]), Some(2));
        // one redraw
        assert_eq!(select_pair(&candidates, Some((1, 2)), [1, 2]), Some(2));
        // two hits fall back to the best candidate
        assert_eq!(select_pair(&candidates, Some((1, 2)), [1, 1]), Some(0));
        // ...and step past it when it is the previous pair
        assert_eq!(select_pair(&candidates, Some((0, 1)), [0, 0]), Some(1));
    }

    #[test]
    fn test_select_pair_with_nothing_left() {
        let single = rotations(&[(2, 3)]);
        assert_eq!(select_pair(&single, Some((2, 3)), std::iter::empty()), None);
        assert_eq!(select_pair(&single, Some((2, 3)), [0, 0]), None);
        assert_eq!(select_pair(&single, Some((0, 1)), [0, 0]), Some(0));
        assert_eq!(select_pair(&[], None, [0]), None);
    }

    #[test]
    fn test_local_with_distributed_choice() {
        let settings = LocalSettings {
            dist_choice: true,
            conv_steps: 100,
            ..local_settings(6)
        };
        let mut opt = LocalMinimizer::new(c1_integrals(5, 4, 3), settings).unwrap();
        let energy = opt.optimize().unwrap();

        assert!(opt.iterations() >= 1 && opt.iterations() <= 6);
        assert!(opt.transform().unitary().is_orthogonal(1e-10));

        let nucl_rep = opt.hamiltonian().integrals().nucl_rep();
        assert!((opt.rdm().energy(opt.hamiltonian().integrals()) + nucl_rep - energy).abs() < 1e-6);
    }

    #[test]
    fn test_annealing_state_is_consistent() {
        let mut opt = SimulatedAnnealing::new(c1_integrals(4, 4, 6), anneal_settings(30)).unwrap();
        let energy = opt.optimize().unwrap();

        assert_eq!(opt.steps(), 30);
        assert!(opt.lowest_energy() <= energy + 1e-12);
        assert!(opt.transform().unitary().is_orthogonal(1e-10));

        // the integrals follow the unitary and the energy belongs to them
        let ham = opt.hamiltonian_mut();
        ham.build().unwrap();
        let recomputed = ham.calc_energy().unwrap() + ham.integrals().nucl_rep();
        assert!((recomputed - energy).abs() < 1e-8);
    }

    #[test]
    fn test_annealing_is_reproducible() {
        let run = || {
            let mut opt =
                SimulatedAnnealing::new(c1_integrals(4, 4, 7), anneal_settings(15)).unwrap();
            opt.optimize().unwrap();
            opt.transform().unitary().matrix().clone()
        };

        assert!((run() - run()).abs().max() < 1e-12);
    }

    #[test]
    fn test_annealing_stays_within_irreps() {
        let ints = SymmetricIntegrals::new(toy_integrals(4, 4, 8), vec![0, 0, 1, 1], 2).unwrap();
        let mut opt = SimulatedAnnealing::new(ints, anneal_settings(20)).unwrap();
        opt.optimize().unwrap();

        let u = opt.transform().unitary().matrix();
        for a in 0..2 {
            for b in 2..4 {
                assert_eq!(u[(a, b)], 0.0);
                assert_eq!(u[(b, a)], 0.0);
            }
        }
    }

    #[test]
    fn test_annealing_counts_rejections_in_total() {
        // so cold that every uphill step is rejected
        let settings = AnnealingSettings {
            start_temp: 1e-12,
            max_unaccepted: 2,
            ..anneal_settings(200)
        };
        let mut opt = SimulatedAnnealing::new(c1_integrals(4, 4, 10), settings).unwrap();
        opt.optimize().unwrap();

        assert!(opt.steps() < 200);
        assert_eq!(opt.rejected(), 3);
    }

    #[test]
    fn test_annealing_samples_pairs_symmetrically() {
        let ints = SymmetricIntegrals::new(toy_integrals(4, 4, 11), vec![0, 0, 0, 1], 2).unwrap();
        let mut opt = SimulatedAnnealing::new(ints, anneal_settings(25)).unwrap();
        opt.optimize().unwrap();

        let counts = opt.sample_counts();
        assert_eq!(counts, &counts.transpose());
        assert_eq!(counts[(0, 3)], -1);
        assert_eq!(counts[(2, 2)], 0);

        let drawn: i64 = counts.iter().filter(|&&c| c > 0).sum();
        assert_eq!(drawn, 2 * opt.steps() as i64);
    }

    #[test]
    fn test_annealing_lowest_energy_bounds_run() {
        let ints = c1_integrals(4, 4, 12);
        let mut start = crate::hamiltonian_impl::DOCIHamiltonian::new(ints.clone()).unwrap();
        start.build().unwrap();
        let initial = start.calc_energy().unwrap() + ints.nucl_rep();

        let settings = AnnealingSettings {
            start_temp: 10.0,
            ..anneal_settings(20)
        };
        let mut opt = SimulatedAnnealing::new(ints, settings).unwrap();
        let energy = opt.optimize().unwrap();

        assert!(opt.lowest_energy() <= energy + 1e-12);
        assert!(opt.lowest_energy() <= initial + 1e-10);
    }

    #[test]
    fn test_annealing_rejects_bad_temperature() {
        let settings = AnnealingSettings {
            start_temp: 0.0,
            ..AnnealingSettings::default()
        };
        assert!(SimulatedAnnealing::new(c1_integrals(4, 4, 1), settings).is_err());
    }
}
