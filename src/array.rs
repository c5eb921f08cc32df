//! Contiguous typed buffers: the fulfilled prefix storage of lists.

use crate::value::V;

/// Element kind of an array or list chain. `V` carries tagged values
/// (a stream), `Z` carries raw 64 bit samples (a signal). The kind is
/// fixed for the lifetime of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    V,
    Z,
}

/// A contiguous run of items, either values or samples. Capacity grows on
/// append; `shrink` commits a short final block when a generator produced
/// fewer items than its block size.
#[derive(Debug, Clone)]
pub enum Array {
    V(Vec<V>),
    Z(Vec<f64>),
}

/// Triangular reflection of `i` into `0..n`.
#[inline]
pub fn fold_index(i: i64, n: i64) -> i64 {
    if n <= 1 {
        return 0;
    }
    let m = 2 * (n - 1);
    let k = i.rem_euclid(m);
    if k < n {
        k
    } else {
        m - k
    }
}

impl Array {
    pub fn new(kind: ItemKind) -> Self {
        Array::with_capacity(kind, 0)
    }

    pub fn with_capacity(kind: ItemKind, cap: usize) -> Self {
        match kind {
            ItemKind::V => Array::V(Vec::with_capacity(cap)),
            ItemKind::Z => Array::Z(Vec::with_capacity(cap)),
        }
    }

    #[inline]
    pub fn kind(&self) -> ItemKind {
        match self {
            Array::V(_) => ItemKind::V,
            Array::Z(_) => ItemKind::Z,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Array::V(v) => v.len(),
            Array::Z(z) => z.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value items. Panics if this is a sample array; callers reach
    /// this only through kind-checked paths.
    #[inline]
    pub fn v(&self) -> &[V] {
        match self {
            Array::V(v) => v,
            Array::Z(_) => unreachable!("value access on a sample array"),
        }
    }

    /// The raw samples. Panics if this is a value array.
    #[inline]
    pub fn z(&self) -> &[f64] {
        match self {
            Array::Z(z) => z,
            Array::V(_) => unreachable!("sample access on a value array"),
        }
    }

    pub fn push(&mut self, item: V) {
        match self {
            Array::V(v) => v.push(item),
            Array::Z(z) => z.push(item.to_float_lossy()),
        }
    }

    pub fn pushz(&mut self, item: f64) {
        match self {
            Array::V(v) => v.push(V::Real(item)),
            Array::Z(z) => z.push(item),
        }
    }

    /// Append the whole of another array of the same kind.
    pub fn append(&mut self, other: &Array) {
        match (self, other) {
            (Array::V(a), Array::V(b)) => a.extend(b.iter().cloned()),
            (Array::Z(a), Array::Z(b)) => a.extend_from_slice(b),
            (Array::V(a), Array::Z(b)) => a.extend(b.iter().map(|&x| V::Real(x))),
            (Array::Z(a), Array::V(b)) => a.extend(b.iter().map(|x| x.to_float_lossy())),
        }
    }

    /// Commit a short block: drop items from the end.
    pub fn shrink(&mut self, shrink_by: usize) {
        let n = self.len().saturating_sub(shrink_by);
        match self {
            Array::V(v) => v.truncate(n),
            Array::Z(z) => z.truncate(n),
        }
    }

    /// Item at `i`; zero outside the bounds.
    pub fn at(&self, i: i64) -> V {
        if i < 0 || i as usize >= self.len() {
            return V::Real(0.0);
        }
        match self {
            Array::V(v) => v[i as usize].clone(),
            Array::Z(z) => V::Real(z[i as usize]),
        }
    }

    pub fn atz(&self, i: i64) -> f64 {
        if i < 0 || i as usize >= self.len() {
            return 0.0;
        }
        match self {
            Array::V(v) => v[i as usize].to_float_lossy(),
            Array::Z(z) => z[i as usize],
        }
    }

    pub fn wrap_at(&self, i: i64) -> V {
        let n = self.len() as i64;
        if n == 0 {
            return V::Real(0.0);
        }
        self.at(i.rem_euclid(n))
    }

    pub fn clip_at(&self, i: i64) -> V {
        let n = self.len() as i64;
        if n == 0 {
            return V::Real(0.0);
        }
        self.at(i.clamp(0, n - 1))
    }

    pub fn fold_at(&self, i: i64) -> V {
        let n = self.len() as i64;
        if n == 0 {
            return V::Real(0.0);
        }
        self.at(fold_index(i, n))
    }

    pub fn wrap_atz(&self, i: i64) -> f64 {
        let n = self.len() as i64;
        if n == 0 {
            return 0.0;
        }
        self.atz(i.rem_euclid(n))
    }

    pub fn clip_atz(&self, i: i64) -> f64 {
        let n = self.len() as i64;
        if n == 0 {
            return 0.0;
        }
        self.atz(i.clamp(0, n - 1))
    }

    pub fn fold_atz(&self, i: i64) -> f64 {
        let n = self.len() as i64;
        if n == 0 {
            return 0.0;
        }
        self.atz(fold_index(i, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_policies() {
        let mut a = Array::new(ItemKind::Z);
        for x in [10.0, 20.0, 30.0, 40.0] {
            a.pushz(x);
        }
        assert_eq!(a.atz(2), 30.0);
        assert_eq!(a.atz(7), 0.0);
        assert_eq!(a.atz(-1), 0.0);
        assert_eq!(a.wrap_atz(5), 20.0);
        assert_eq!(a.wrap_atz(-1), 40.0);
        assert_eq!(a.clip_atz(9), 40.0);
        assert_eq!(a.clip_atz(-3), 10.0);
        // reflection: 0 1 2 3 2 1 0 1 2 ...
        assert_eq!(a.fold_atz(4), 30.0);
        assert_eq!(a.fold_atz(6), 10.0);
        assert_eq!(a.fold_atz(7), 20.0);
    }

    #[test]
    fn shrink_commits_short_block() {
        let mut a = Array::with_capacity(ItemKind::Z, 8);
        for i in 0..8 {
            a.pushz(i as f64);
        }
        a.shrink(3);
        assert_eq!(a.len(), 5);
        assert_eq!(a.atz(4), 4.0);
        assert_eq!(a.atz(5), 0.0);
    }

    #[test]
    fn fold_index_reflects() {
        let got: Vec<i64> = (0..9).map(|i| fold_index(i, 4)).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 2, 1, 0, 1, 2]);
    }
}
