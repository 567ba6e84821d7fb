//! Model integrals shared by the unit tests

use crate::integrals_impl::Integrals;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random but physically shaped integrals: ascending orbital energies with a
/// small symmetric coupling, and a two-electron tensor built from a
/// factorized form `(ij|kl) = sum_Q B^Q_ij B^Q_kl`, which carries the full
/// permutational symmetry of real orbitals.
pub fn toy_integrals(n_sp: usize, n_electrons: usize, seed: u64) -> Integrals {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut integrals = Integrals::new(n_sp, n_electrons, 1.25);

    for a in 0..n_sp {
        integrals.set_t(a, a, -2.0 + 0.5 * a as f64);
        for b in (a + 1)..n_sp {
            integrals.set_t(a, b, rng.gen_range(-0.1..0.1));
        }
    }

    let factors: Vec<DMatrix<f64>> = (0..n_sp + 1)
        .map(|q| {
            let mut b = DMatrix::zeros(n_sp, n_sp);
            for i in 0..n_sp {
                for j in i..n_sp {
                    let value = if i == j && q == 0 {
                        0.6 + rng.gen_range(0.0..0.2)
                    } else {
                        rng.gen_range(-0.15..0.15)
                    };
                    b[(i, j)] = value;
                    b[(j, i)] = value;
                }
            }
            b
        })
        .collect();

    let chem = |i: usize, j: usize, k: usize, l: usize| -> f64 {
        factors.iter().map(|b| b[(i, j)] * b[(k, l)]).sum()
    };

    for a in 0..n_sp {
        for b in 0..n_sp {
            for c in 0..n_sp {
                for d in 0..n_sp {
                    // <ab|cd> = (ac|bd)
                    integrals.set_v(a, b, c, d, chem(a, c, b, d));
                }
            }
        }
    }

    integrals
}
