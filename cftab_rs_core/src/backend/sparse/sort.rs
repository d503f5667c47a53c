//! ordering of the coordinate triples.
//!
//! The physical order of the triples is tracked by [`SortState`]. On top of that, each axis
//! can hold an [`AccessIndex`] (built lazily through `&self`) that lists the entries in
//! lexicographic order for that axis together with the run offsets of every position, so
//! element access is a binary search inside a single run.

use super::SparseStorage;
use crate::{backend::AxisKind, toolkit::array::AFloat};
use std::{ops::Range, sync::atomic::Ordering};
use tracing::trace;

/// the physical order of the coordinate triples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortState {
    Unsorted,
    SortedByPoint,
    SortedByFeature,
}

impl SortState {
    pub fn by(axis: AxisKind) -> Self {
        match axis {
            AxisKind::Point => SortState::SortedByPoint,
            AxisKind::Feature => SortState::SortedByFeature,
        }
    }

    pub fn axis(self) -> Option<AxisKind> {
        match self {
            SortState::Unsorted => None,
            SortState::SortedByPoint => Some(AxisKind::Point),
            SortState::SortedByFeature => Some(AxisKind::Feature),
        }
    }

    pub(super) fn transposed(self) -> Self {
        match self {
            SortState::Unsorted => SortState::Unsorted,
            SortState::SortedByPoint => SortState::SortedByFeature,
            SortState::SortedByFeature => SortState::SortedByPoint,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AccessIndex {
    /// entry ids in lexicographic order, `None` when the triples already are in that order
    order: Option<Vec<usize>>,
    /// `offsets[k]..offsets[k + 1]` are the ranks of position `k`
    offsets: Vec<usize>,
}

impl AccessIndex {
    #[inline]
    pub(crate) fn entry(&self, rank: usize) -> usize {
        match &self.order {
            Some(order) => order[rank],
            None => rank,
        }
    }

    #[inline]
    pub(crate) fn ranks(&self, position: usize) -> Range<usize> {
        self.offsets[position]..self.offsets[position + 1]
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }
}

fn offsets(primary: &[usize], len: usize) -> Vec<usize> {
    let mut offsets = vec![0usize; len + 1];
    primary.iter().for_each(|&p| offsets[p + 1] += 1);
    for k in 0..len {
        offsets[k + 1] += offsets[k];
    }
    offsets
}

impl<T: AFloat> SparseStorage<T> {
    pub fn sort_state(&self) -> SortState {
        self.state
    }

    /// how many sorting passes this storage went through, physical or not
    pub fn sort_passes(&self) -> usize {
        self.sort_passes.load(Ordering::Relaxed)
    }

    /// (primary, secondary) indices when ordering along `axis`
    #[inline]
    pub(crate) fn keys(&self, axis: AxisKind) -> (&[usize], &[usize]) {
        match axis {
            AxisKind::Point => (&self.row, &self.col),
            AxisKind::Feature => (&self.col, &self.row),
        }
    }

    fn lexsort(&self, axis: AxisKind) -> Vec<usize> {
        self.sort_passes.fetch_add(1, Ordering::Relaxed);
        trace!(%axis, nnz = self.data.len(), "sorting sparse triples");
        let (primary, secondary) = self.keys(axis);
        let mut order: Vec<usize> = (0..self.data.len()).collect();
        order.sort_by_key(|&e| (primary[e], secondary[e]));
        order
    }

    fn build_index(&self, axis: AxisKind) -> AccessIndex {
        let order = if self.state.axis() == Some(axis) {
            None
        } else {
            Some(self.lexsort(axis))
        };
        let (primary, _) = self.keys(axis);
        AccessIndex {
            order,
            offsets: offsets(primary, self.axis_len(axis)),
        }
    }

    /// the access index of `axis`, sorting (once) if needed
    pub(crate) fn access(&self, axis: AxisKind) -> &AccessIndex {
        self.indexes[axis.index()].get_or_init(|| self.build_index(axis))
    }

    /// entry ids of the run of `position` along `axis`, ordered by the other axis
    pub(crate) fn run(&self, axis: AxisKind, position: usize) -> impl Iterator<Item = usize> + '_ {
        let index = self.access(axis);
        index.ranks(position).map(move |rank| index.entry(rank))
    }

    /// the entry id stored at `(point, feature)`, if any
    pub(crate) fn find(&self, point: usize, feature: usize) -> Option<usize> {
        let index = self.access(AxisKind::Point);
        let ranks = index.ranks(point);
        match &index.order {
            None => self.col[ranks.clone()]
                .binary_search(&feature)
                .ok()
                .map(|i| ranks.start + i),
            Some(order) => order[ranks]
                .binary_search_by_key(&feature, |&e| self.col[e])
                .ok()
                .map(|i| order[index.offsets[point] + i]),
        }
    }

    /// physically reorders the triples along `axis` (primary) and the other axis
    /// (secondary); a no-op when they already are in that order
    pub fn sort_internal(&mut self, axis: AxisKind, with_offsets: bool) {
        if self.state.axis() != Some(axis) {
            let order = match self.indexes[axis.index()].take() {
                Some(AccessIndex {
                    order: Some(order), ..
                }) => order,
                _ => self.lexsort(axis),
            };
            self.data = order.iter().map(|&e| self.data[e]).collect();
            self.row = order.iter().map(|&e| self.row[e]).collect();
            self.col = order.iter().map(|&e| self.col[e]).collect();
            self.invalidate();
            self.state = SortState::by(axis);
        }
        if with_offsets {
            self.access(axis);
        }
    }

    /// forgets every ordering guarantee, called after each structural edit
    pub(crate) fn invalidate(&mut self) {
        self.state = SortState::Unsorted;
        self.indexes = Default::default();
    }

    /// keeps the physical order but drops the access indexes
    pub(crate) fn reset_indexes(&mut self) {
        self.indexes = Default::default();
    }
}
