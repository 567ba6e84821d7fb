use color_eyre::eyre::{ensure, Result};

const UNSET: usize = usize::MAX;

/// Numbering of the unordered pairs of the `M = 2L` spin orbitals.
///
/// Spin orbital `a < L` is `a` with spin up, `a + L` the same spatial orbital
/// with spin down. Pairs are numbered in blocks:
///
/// | range | pairs |
/// |---|---|
/// | `[0, L)` | `a ā` |
/// | next `D` | `a b`, both up, `a < b` |
/// | next `D` | `ā b̄`, both down |
/// | next `D` | `a b̄` with `a < b` |
/// | next `D` | `ā b` with `a < b` |
///
/// with `D = L(L-1)/2`. The table is immutable once built and shared between
/// all density matrices of the same size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOrbitalIndexMap {
    n_sp: usize,
    sp2tp: Vec<usize>,
    tp2sp: Vec<(usize, usize)>,
}

impl SpinOrbitalIndexMap {
    pub fn new(n_sp: usize) -> Result<Self> {
        ensure!(n_sp > 0, "The index map needs at least one orbital");

        let l = n_sp;
        let m = 2 * l;
        let n_tp = m * (m - 1) / 2;

        let mut sp2tp = vec![UNSET; m * m];
        let mut tel = 0;
        let mut add = |a: usize, b: usize| {
            sp2tp[a * m + b] = tel;
            sp2tp[b * m + a] = tel;
            tel += 1;
        };

        for a in 0..l {
            add(a, a + l);
        }
        for a in 0..l {
            for b in (a + 1)..l {
                add(a, b);
            }
        }
        for a in l..m {
            for b in (a + 1)..m {
                add(a, b);
            }
        }
        for a in 0..l {
            for b in (l + a + 1)..m {
                add(a, b);
            }
        }
        for a in l..m {
            for b in (a % l + 1)..l {
                add(a, b);
            }
        }
        debug_assert_eq!(tel, n_tp);

        let mut tp2sp = vec![(UNSET, UNSET); n_tp];
        for a in 0..m {
            for b in (a + 1)..m {
                tp2sp[sp2tp[a * m + b]] = (a, b);
            }
        }

        Ok(SpinOrbitalIndexMap {
            n_sp,
            sp2tp,
            tp2sp,
        })
    }

    pub fn n_sp(&self) -> usize {
        self.n_sp
    }

    /// Number of spin-orbital pairs, `M(M-1)/2`.
    pub fn n_tp(&self) -> usize {
        self.tp2sp.len()
    }

    /// Size `D` of each block of same-orbital-free pairs.
    pub fn n_pairs(&self) -> usize {
        self.n_sp * (self.n_sp - 1) / 2
    }

    /// Pair index of spin orbitals `a != b`, in either order.
    #[inline]
    pub fn sp2tp(&self, a: usize, b: usize) -> usize {
        debug_assert!(a != b, "a spin orbital cannot pair with itself");
        self.sp2tp[a * 2 * self.n_sp + b]
    }

    /// Spin orbitals `(a, b)`, `a < b`, of pair `i`.
    #[inline]
    pub fn tp2sp(&self, i: usize) -> (usize, usize) {
        self.tp2sp[i]
    }

    /// Slot of pair index `i >= L` in the fourfold degenerate vector.
    #[inline]
    pub fn vector_index(&self, i: usize) -> usize {
        (i - self.n_sp) % self.n_pairs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pair_numbered_once() {
        let map = SpinOrbitalIndexMap::new(5).unwrap();
        let m = 10;
        assert_eq!(map.n_tp(), 45);
        assert_eq!(map.n_pairs(), 10);

        let mut seen = vec![false; map.n_tp()];
        for a in 0..m {
            for b in (a + 1)..m {
                let i = map.sp2tp(a, b);
                assert_eq!(i, map.sp2tp(b, a));
                assert!(!seen[i]);
                seen[i] = true;
                assert_eq!(map.tp2sp(i), (a, b));
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_block_layout() {
        let l = 4;
        let map = SpinOrbitalIndexMap::new(l).unwrap();

        for a in 0..l {
            assert_eq!(map.sp2tp(a, a + l), a);
        }
        // the four spin combinations of a spatial pair share one vector slot
        let slot = map.vector_index(map.sp2tp(1, 3));
        assert_eq!(map.vector_index(map.sp2tp(1 + l, 3 + l)), slot);
        assert_eq!(map.vector_index(map.sp2tp(1, 3 + l)), slot);
        assert_eq!(map.vector_index(map.sp2tp(1 + l, 3)), slot);
        assert_eq!(map.sp2tp(0, 1), l);
    }

    #[test]
    fn test_empty_map_is_rejected() {
        assert!(SpinOrbitalIndexMap::new(0).is_err());
    }
}
