//! Energy of a fixed 2-RDM under a Jacobi rotation of two orbitals

use crate::integrals_impl::IntegralProvider;
use std::f64::consts::PI;
use tracing::debug;

const NEWTON_MAX_ITER: usize = 20;
const NEWTON_TOL: f64 = 1e-12;

// a degree 4 trigonometric polynomial has 9 coefficients
const N_SAMPLES: usize = 9;

/// Read-only view of integrals after rotating orbitals `k` and `l` over
/// `theta`, without touching the underlying tables.
///
/// `phi'_k = cos * phi_k + sin * phi_l`, `phi'_l = -sin * phi_k + cos * phi_l`,
/// so every element with an index in `{k, l}` expands into at most 16
/// elements of the unrotated integrals.
pub struct RotatedIntegrals<'a, I: IntegralProvider> {
    integrals: &'a I,
    k: usize,
    l: usize,
    cos: f64,
    sin: f64,
}

impl<'a, I: IntegralProvider> RotatedIntegrals<'a, I> {
    pub fn new(integrals: &'a I, k: usize, l: usize, theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        RotatedIntegrals {
            integrals,
            k,
            l,
            cos,
            sin,
        }
    }

    /// Unrotated orbitals making up rotated orbital `x`, with coefficients.
    #[inline]
    fn expand(&self, x: usize) -> ([(usize, f64); 2], usize) {
        if x == self.k {
            ([(self.k, self.cos), (self.l, self.sin)], 2)
        } else if x == self.l {
            ([(self.k, -self.sin), (self.l, self.cos)], 2)
        } else {
            ([(x, 1.0), (x, 0.0)], 1)
        }
    }
}

impl<I: IntegralProvider> IntegralProvider for RotatedIntegrals<'_, I> {
    fn get_t(&self, a: usize, b: usize) -> f64 {
        let (ea, na) = self.expand(a);
        let (eb, nb) = self.expand(b);

        let mut result = 0.0;
        for &(p, cp) in &ea[..na] {
            for &(q, cq) in &eb[..nb] {
                result += cp * cq * self.integrals.get_t(p, q);
            }
        }
        result
    }

    fn get_v(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        let (ea, na) = self.expand(a);
        let (eb, nb) = self.expand(b);
        let (ec, nc) = self.expand(c);
        let (ed, nd) = self.expand(d);

        let mut result = 0.0;
        for &(p, cp) in &ea[..na] {
            for &(q, cq) in &eb[..nb] {
                for &(r, cr) in &ec[..nc] {
                    for &(s, cs) in &ed[..nd] {
                        result += cp * cq * cr * cs * self.integrals.get_v(p, q, r, s);
                    }
                }
            }
        }
        result
    }

    fn n_sp(&self) -> usize {
        self.integrals.n_sp()
    }

    fn n_electrons(&self) -> usize {
        self.integrals.n_electrons()
    }

    fn nucl_rep(&self) -> f64 {
        self.integrals.nucl_rep()
    }
}

/// `E(theta) = offset + a0 + sum_m a_m cos(m theta) + b_m sin(m theta)`,
/// `m = 1..=4`: the exact energy of a fixed 2-RDM as a function of the
/// rotation angle of one orbital pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPolynomial {
    offset: f64,
    a0: f64,
    a: [f64; 4],
    b: [f64; 4],
}

impl RotationPolynomial {
    /// Interpolate `offset + f` from equispaced samples of `f` over one
    /// period; the discrete Fourier sums are exact for this degree.
    pub fn from_samples<F: Fn(f64) -> f64>(offset: f64, f: F) -> Self {
        let samples: Vec<(f64, f64)> = (0..N_SAMPLES)
            .map(|j| {
                let theta = 2.0 * PI * j as f64 / N_SAMPLES as f64;
                (theta, f(theta))
            })
            .collect();

        let n = N_SAMPLES as f64;
        let a0 = samples.iter().map(|&(_, v)| v).sum::<f64>() / n;

        let mut a = [0.0; 4];
        let mut b = [0.0; 4];
        for m in 1..=4 {
            let mf = m as f64;
            a[m - 1] = 2.0 / n * samples.iter().map(|&(t, v)| v * (mf * t).cos()).sum::<f64>();
            b[m - 1] = 2.0 / n * samples.iter().map(|&(t, v)| v * (mf * t).sin()).sum::<f64>();
        }

        RotationPolynomial { offset, a0, a, b }
    }

    pub fn value(&self, theta: f64) -> f64 {
        let mut result = self.offset + self.a0;
        for m in 1..=4 {
            let (s, c) = (m as f64 * theta).sin_cos();
            result += self.a[m - 1] * c + self.b[m - 1] * s;
        }
        result
    }

    pub fn gradient(&self, theta: f64) -> f64 {
        let mut result = 0.0;
        for m in 1..=4 {
            let mf = m as f64;
            let (s, c) = (mf * theta).sin_cos();
            result += mf * (self.b[m - 1] * c - self.a[m - 1] * s);
        }
        result
    }

    pub fn hessian(&self, theta: f64) -> f64 {
        let mut result = 0.0;
        for m in 1..=4 {
            let mf = m as f64;
            let (s, c) = (mf * theta).sin_cos();
            result -= mf * mf * (self.a[m - 1] * c + self.b[m - 1] * s);
        }
        result
    }

    /// Newton-Raphson from `start_angle`; the start is mirrored first when
    /// the quadratic model around zero predicts a rise at it.
    ///
    /// Returns the stationary angle and whether it is a minimum.
    pub fn find_minimum(&self, start_angle: f64) -> (f64, bool) {
        let mut theta = start_angle;
        if theta * self.gradient(0.0) + theta * theta * self.hessian(0.0) / 2.0 > 0.0 {
            theta = -theta;
        }

        let mut converged = false;
        for _ in 0..NEWTON_MAX_ITER {
            let step = self.gradient(theta) / self.hessian(theta);
            if !step.is_finite() {
                break;
            }
            theta -= step;
            if step.abs() < NEWTON_TOL {
                converged = true;
                break;
            }
        }
        if !converged {
            debug!("Newton-Raphson stopped at theta = {} without converging", theta);
        }

        (theta, self.hessian(theta) > 0.0)
    }
}
