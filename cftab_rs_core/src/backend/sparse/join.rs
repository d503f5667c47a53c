use super::{SortState, SparseStorage};
use crate::{
    backend::{AxisKind, JoinPlan, Storage},
    toolkit::array::AFloat,
};

impl<T: AFloat> SparseStorage<T> {
    /// emits the joined triples row by row, walking the point runs of both sides.
    ///
    /// A side that feeds a cell but holds no entry there contributes `0`; a cell fed by
    /// neither side is stored as a missing value.
    pub(crate) fn join(&self, right: &Self, plan: &JoinPlan) -> Self {
        let (n_rows, n_cols) = plan.shape();
        let mut left_out = vec![None; self.shape.1];
        let mut right_out = vec![None; right.shape.1];
        let mut without_left = Vec::new();
        let mut without_right = Vec::new();
        for (oc, &(lf, rf)) in plan.columns.iter().enumerate() {
            match lf {
                Some(lf) => left_out[lf] = Some(oc),
                None => without_left.push(oc),
            }
            match rf {
                Some(rf) => right_out[rf] = Some(oc),
                None => without_right.push(oc),
            }
        }

        let mut out = Self::build((n_rows, n_cols), vec![], vec![], vec![], SortState::SortedByPoint);
        let mut entries: Vec<(usize, T)> = Vec::new();
        for (or, &(lp, rp)) in plan.rows.iter().enumerate() {
            entries.clear();
            if let Some(lp) = lp {
                for e in self.run(AxisKind::Point, lp) {
                    let Some(oc) = left_out[self.col[e]] else {
                        continue;
                    };
                    let mut value = self.data[e];
                    if value.is_nan() {
                        if let (Some(rp), Some(rf)) = (rp, plan.columns[oc].1) {
                            value = right.get(rp, rf);
                        }
                    }
                    entries.push((oc, value));
                }
            }
            if let Some(rp) = rp {
                for e in right.run(AxisKind::Point, rp) {
                    let Some(oc) = right_out[right.col[e]] else {
                        continue;
                    };
                    if lp.is_none() || plan.columns[oc].0.is_none() {
                        entries.push((oc, right.data[e]));
                    }
                }
            }
            let padded = match (lp, rp) {
                (Some(_), Some(_)) => &[][..],
                (Some(_), None) => &without_left[..],
                (None, Some(_)) => &without_right[..],
                (None, None) => &[][..],
            };
            entries.extend(padded.iter().map(|&oc| (oc, T::nan())));
            if lp.is_none() && rp.is_none() {
                entries.extend((0..n_cols).map(|oc| (oc, T::nan())));
            }
            entries.sort_unstable_by_key(|&(oc, _)| oc);
            for &(oc, value) in &entries {
                out.push(or, oc, value);
            }
        }
        out
    }
}
