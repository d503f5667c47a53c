use super::{SortState, SparseStorage};
use crate::{
    backend::{AxisKind, Storage},
    toolkit::array::{map, map_inplace, zip_map, AFloat},
};
use std::cmp::Ordering;

impl<T: AFloat> SparseStorage<T> {
    /// elementwise `f(self, other)`.
    ///
    /// When `f(0, 0) == 0` only the stored entries of either side can produce a non-zero,
    /// so both point-sorted streams are walked once; otherwise the result is dense anyway.
    pub(super) fn union_walk(&self, other: &Self, f: &(dyn Fn(T, T) -> T + Send + Sync)) -> Self {
        let zero = T::zero();
        if f(zero, zero) != zero {
            let values = zip_map(self.to_array().view(), other.to_array().view(), f);
            return Self::from_array(values);
        }
        let (lhs, rhs) = (self.access(AxisKind::Point), other.access(AxisKind::Point));
        let (nl, nr) = (lhs.len(), rhs.len());
        let mut out = Self::build(self.shape, vec![], vec![], vec![], SortState::SortedByPoint);
        let (mut i, mut j) = (0, 0);
        while i < nl || j < nr {
            let a = (i < nl).then(|| lhs.entry(i));
            let b = (j < nr).then(|| rhs.entry(j));
            let ordering = match (a, b) {
                (Some(a), Some(b)) => {
                    (self.row[a], self.col[a]).cmp(&(other.row[b], other.col[b]))
                }
                (Some(_), None) => Ordering::Less,
                _ => Ordering::Greater,
            };
            match (ordering, a, b) {
                (Ordering::Less, Some(a), _) => {
                    out.push(self.row[a], self.col[a], f(self.data[a], zero));
                    i += 1;
                }
                (Ordering::Greater, _, Some(b)) => {
                    out.push(other.row[b], other.col[b], f(zero, other.data[b]));
                    j += 1;
                }
                (Ordering::Equal, Some(a), Some(b)) => {
                    out.push(self.row[a], self.col[a], f(self.data[a], other.data[b]));
                    i += 1;
                    j += 1;
                }
                _ => break,
            }
        }
        out
    }

    /// elementwise `f(self)`, staying sparse when `f(0) == 0`
    pub(super) fn map_values(&self, f: &(dyn Fn(T) -> T + Send + Sync)) -> Self {
        let zero = T::zero();
        if f(zero) != zero {
            return Self::from_array(map(self.to_array().view(), f));
        }
        let mut out = self.clone();
        map_inplace(&mut out.data, f);
        out.drop_zeros();
        out
    }
}
