//! Enumeration of the DOCI occupation basis
//!
//! A basis state is a bit pattern over the L spatial orbitals with exactly
//! N/2 bits set, one bit per doubly occupied orbital. Patterns are generated
//! in strictly increasing integer order, so the basis index of a pattern is
//! its rank in that order and nothing has to be stored.

use color_eyre::eyre::{bail, ensure, Result};

/// Width of the register holding a basis state.
pub const MAX_ORBITALS: usize = u64::BITS as usize;

/// Generator of all bit patterns with `n` bits set inside a register of
/// `width` bits, in increasing order.
///
/// # Usage
///
/// ```rust
/// use doci::permutation::BitPermutation;
///
/// let mut perm = BitPermutation::new(2, 4).unwrap();
/// assert_eq!(perm.get(), 0b0011);
/// assert_eq!(perm.next(), Some(0b0101));
/// assert_eq!(perm.next(), Some(0b0110));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPermutation {
    current: u64,
    n: u32,
    width: u32,
}

impl BitPermutation {
    /// Create the enumerator positioned on the smallest pattern.
    pub fn new(n: usize, width: usize) -> Result<Self> {
        ensure!(
            width <= MAX_ORBITALS,
            "A basis of {} orbitals does not fit in the {}-bit state register",
            width,
            MAX_ORBITALS
        );
        ensure!(
            n <= width,
            "Cannot place {} electron pairs in {} orbitals",
            n,
            width
        );

        let mut perm = BitPermutation {
            current: 0,
            n: n as u32,
            width: width as u32,
        };
        perm.reset();
        Ok(perm)
    }

    /// Number of set bits in every pattern.
    pub fn n_set(&self) -> usize {
        self.n as usize
    }

    /// Width of the register.
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Back to the first pattern: the `n` lowest bits set.
    pub fn reset(&mut self) {
        self.current = low_bits(self.n);
    }

    /// Current pattern, without advancing.
    #[inline]
    pub fn get(&self) -> u64 {
        self.current
    }

    /// Advance to the next larger pattern with the same popcount.
    ///
    /// Returns `None`, leaving the state untouched, when that pattern does not
    /// fit in the register: the enumeration is exhausted.
    #[inline]
    pub fn next(&mut self) -> Option<u64> {
        let v = self.current;
        if v == 0 {
            return None;
        }

        // https://graphics.stanford.edu/~seander/bithacks.html#NextBitPermutation
        let t = v | (v - 1);
        if t == u64::MAX {
            return None;
        }
        let not_t = !t;
        let w = (t + 1) | (((not_t & not_t.wrapping_neg()) - 1) >> (v.trailing_zeros() + 1));

        if self.width < u64::BITS && (w >> self.width) != 0 {
            return None;
        }

        self.current = w;
        Some(w)
    }

    /// The last pattern of the enumeration: the `n` highest bits of the
    /// register set.
    pub fn max_pattern(&self) -> u64 {
        if self.n == 0 {
            0
        } else {
            low_bits(self.n) << (self.width - self.n)
        }
    }

    /// Number of patterns in the enumeration, C(width, n).
    pub fn count(&self) -> Result<u64> {
        calc_combinations(self.width as usize, self.n as usize)
    }

    /// Position of `pattern` in the enumeration order.
    pub fn rank(&self, pattern: u64) -> u64 {
        let mut rank = 0;
        let mut bits = pattern;
        let mut r = 1;
        while bits != 0 {
            let c = bits.trailing_zeros() as u64;
            bits &= bits - 1;
            rank += binomial(c, r);
            r += 1;
        }
        rank
    }

    /// Jump directly to the pattern with the given rank.
    pub fn seek(&mut self, rank: u64) -> Result<()> {
        let total = self.count()?;
        if rank >= total {
            bail!(
                "Basis index {} is out of range for a basis of dimension {}",
                rank,
                total
            );
        }

        let mut remaining = rank;
        let mut pattern = 0u64;
        let mut c = self.width as u64;
        for r in (1..=self.n as u64).rev() {
            // largest c with C(c, r) <= remaining
            c -= 1;
            while binomial(c, r) > remaining {
                c -= 1;
            }
            pattern |= 1u64 << c;
            remaining -= binomial(c, r);
        }

        self.current = pattern;
        Ok(())
    }

    /// Move `offset` patterns forward from the current one.
    pub fn skip(&mut self, offset: u64) -> Result<()> {
        let target = self.rank(self.current) + offset;
        self.seek(target)
    }
}

fn low_bits(n: u32) -> u64 {
    if n >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Binomial coefficient for register-sized arguments, which never overflows.
fn binomial(l: u64, n: u64) -> u64 {
    if n > l {
        return 0;
    }
    let n = n.min(l - n);
    let mut result = 1u64;
    for i in 1..=n {
        let g = gcd(result, i);
        result = (result / g) * ((l - n + i) / (i / g));
    }
    result
}

/// Compute C(l, n).
///
/// The running product is reduced by the gcd with the next divisor before
/// every multiplication, so the only way to fail is a result that does not
/// fit in 64 bits.
pub fn calc_combinations(l: usize, n: usize) -> Result<u64> {
    if n > l {
        return Ok(0);
    }

    let (l, n) = (l as u64, n.min(l - n) as u64);
    let mut result = 1u64;
    for i in 1..=n {
        let g = gcd(result, i);
        let factor = (l - n + i) / (i / g);
        result = match (result / g).checked_mul(factor) {
            Some(value) => value,
            None => bail!("C({}, {}) overflows a 64-bit unsigned integer", l, n),
        };
    }

    Ok(result)
}

/// Split `dim` rows into `num_parts` contiguous ranges of roughly equal
/// triangular work, row `i` costing `dim - i`.
///
/// Returns `num_parts + 1` boundaries; part `p` covers rows
/// `workload[p]..workload[p + 1]`.
pub fn balanced_workload(dim: usize, num_parts: usize) -> Vec<usize> {
    let num_parts = num_parts.max(1);
    let num_elems = (dim as u128 * (dim as u128 + 1)) / 2;
    let size_part = num_elems / num_parts as u128 + 1;

    let mut workload = vec![0usize; num_parts + 1];
    workload[num_parts] = dim;

    for i in 1..num_parts {
        let mut num_lines = workload[i - 1];
        let mut elems = 0u128;

        while elems < size_part && num_lines < dim {
            elems += (dim - num_lines) as u128;
            num_lines += 1;
        }

        workload[i] = num_lines.min(dim);
    }

    workload
}
