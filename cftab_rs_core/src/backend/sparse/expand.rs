use super::SparseStorage;
use crate::toolkit::array::{same_value, AFloat};
use ndarray::Array2;

impl<T: AFloat> SparseStorage<T> {
    /// replaces `feature` with `categories.len()` indicator features, in one pass over the
    /// triples plus one pass over the points when `0` is one of the categories
    pub(super) fn expand_categories(&mut self, feature: usize, categories: &[T]) {
        let width = categories.len();
        let zero_category = categories.iter().position(|&c| c == T::zero());
        let mut covered = vec![false; self.shape.0];
        let mut indicators = Vec::new();
        let (rows, cols, data) = (self.row.clone(), self.col.clone(), self.data.clone());
        self.retain_entries(|e| cols[e] != feature);
        for e in 0..data.len() {
            if cols[e] == feature {
                covered[rows[e]] = true;
                if let Some(k) = categories.iter().position(|&c| same_value(c, data[e])) {
                    indicators.push((rows[e], feature + k));
                }
            }
        }
        self.col
            .iter_mut()
            .filter(|c| **c > feature)
            .for_each(|c| *c = *c + width - 1);
        if let Some(k) = zero_category {
            covered
                .iter()
                .enumerate()
                .filter(|(_, &covered)| !covered)
                .for_each(|(r, _)| indicators.push((r, feature + k)));
        }
        for (r, c) in indicators {
            self.push(r, c, T::one());
        }
        self.shape.1 = self.shape.1 + width - 1;
        self.invalidate();
    }

    /// replaces `feature` with the columns of `parts`: the triples of the other features
    /// are kept and shifted, then the non-zero parts are appended column by column
    pub(super) fn expand_parts(&mut self, feature: usize, parts: &Array2<T>) {
        let width = parts.ncols();
        let cols = self.col.clone();
        self.retain_entries(|e| cols[e] != feature);
        self.col
            .iter_mut()
            .filter(|c| **c > feature)
            .for_each(|c| *c = *c + width - 1);
        for (k, column) in parts.columns().into_iter().enumerate() {
            for (r, &v) in column.iter().enumerate() {
                self.push(r, feature + k, v);
            }
        }
        self.shape.1 = self.shape.1 + width - 1;
        self.invalidate();
    }
}
