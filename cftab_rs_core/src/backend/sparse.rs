//! # sparse
//!
//! coordinate-list storage: three parallel arrays `(data, row, col)`.
//!
//! # Design
//!
//! Invariants held after every primitive:
//! - no stored entry is `0` (`NaN` is a value, it is stored),
//! - no `(row, col)` pair appears twice,
//! - every index is inside `shape`.
//!
//! Structural primitives run in one (or two, filter + rebuild) passes over the triples
//! and leave the triples [`SortState::Unsorted`] unless they document otherwise.

use super::{AxisKind, BackendKind, Rect, Replacement, Storage};
use crate::{
    error::{ensure, Result},
    toolkit::array::{same_value, AFloat},
};
use ndarray::Array2;
use std::{
    collections::HashSet,
    sync::{atomic::AtomicUsize, OnceLock},
};

mod expand;
mod ops;
mod rectangle;
mod sort;

pub(crate) mod join;

pub use sort::SortState;
pub(crate) use sort::AccessIndex;

#[derive(Debug)]
pub struct SparseStorage<T: AFloat> {
    data: Vec<T>,
    row: Vec<usize>,
    col: Vec<usize>,
    shape: (usize, usize),
    state: SortState,
    indexes: [OnceLock<AccessIndex>; 2],
    sort_passes: AtomicUsize,
}

impl<T: AFloat> Clone for SparseStorage<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            row: self.row.clone(),
            col: self.col.clone(),
            shape: self.shape,
            state: self.state,
            indexes: self.indexes.clone(),
            sort_passes: AtomicUsize::new(self.sort_passes()),
        }
    }
}

/// maps old positions to their new position, `None` for positions not listed
fn targets(len: usize, positions: &[usize]) -> Vec<Option<usize>> {
    let mut targets = vec![None; len];
    positions
        .iter()
        .enumerate()
        .for_each(|(new, &old)| targets[old] = Some(new));
    targets
}

impl<T: AFloat> SparseStorage<T> {
    fn build(
        shape: (usize, usize),
        data: Vec<T>,
        row: Vec<usize>,
        col: Vec<usize>,
        state: SortState,
    ) -> Self {
        Self {
            data,
            row,
            col,
            shape,
            state,
            indexes: Default::default(),
            sort_passes: AtomicUsize::new(0),
        }
    }

    pub fn empty(shape: (usize, usize)) -> Self {
        Self::build(shape, vec![], vec![], vec![], SortState::SortedByPoint)
    }

    /// builds storage from raw triples, dropping zeros; the triples keep the given order
    pub fn from_triplets(
        shape: (usize, usize),
        data: Vec<T>,
        row: Vec<usize>,
        col: Vec<usize>,
    ) -> Result<Self> {
        ensure!(
            data.len() == row.len() && data.len() == col.len(),
            ShapeMismatch,
            "`data`, `row` and `col` should have the same length, got {}, {} and {}",
            data.len(),
            row.len(),
            col.len()
        );
        let mut seen = HashSet::with_capacity(data.len());
        for (&r, &c) in row.iter().zip(&col) {
            ensure!(
                r < shape.0 && c < shape.1,
                InvalidIdentifier,
                "entry ({r}, {c}) is outside of the shape {shape:?}"
            );
            ensure!(
                seen.insert((r, c)),
                ArgumentValue,
                "entry ({r}, {c}) appears more than once"
            );
        }
        let mut storage = Self::build(shape, data, row, col, SortState::Unsorted);
        storage.drop_zeros();
        Ok(storage)
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }
    pub fn data(&self) -> &[T] {
        &self.data
    }
    pub fn row(&self) -> &[usize] {
        &self.row
    }
    pub fn col(&self) -> &[usize] {
        &self.col
    }

    #[inline]
    pub(crate) fn axis_len(&self, axis: AxisKind) -> usize {
        match axis {
            AxisKind::Point => self.shape.0,
            AxisKind::Feature => self.shape.1,
        }
    }

    #[inline]
    fn primary_mut(&mut self, axis: AxisKind) -> &mut Vec<usize> {
        match axis {
            AxisKind::Point => &mut self.row,
            AxisKind::Feature => &mut self.col,
        }
    }

    /// in-place compaction keeping the entries for which `keep(entry)` holds; the
    /// relative order of the kept entries is preserved
    fn retain_entries(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let mut write = 0;
        for read in 0..self.data.len() {
            if keep(read) {
                self.data[write] = self.data[read];
                self.row[write] = self.row[read];
                self.col[write] = self.col[read];
                write += 1;
            }
        }
        self.data.truncate(write);
        self.row.truncate(write);
        self.col.truncate(write);
    }

    fn drop_zeros(&mut self) {
        if self.data.iter().any(|&v| v == T::zero()) {
            let keep: Vec<bool> = self.data.iter().map(|&v| v != T::zero()).collect();
            self.retain_entries(|e| keep[e]);
            self.reset_indexes();
        }
    }

    fn push(&mut self, point: usize, feature: usize, value: T) {
        if value != T::zero() {
            self.data.push(value);
            self.row.push(point);
            self.col.push(feature);
        }
    }

    /// every `(point, feature, value)` in point-major order
    pub fn triplets(&self) -> Vec<(usize, usize, T)> {
        let index = self.access(AxisKind::Point);
        (0..index.len())
            .map(|rank| {
                let e = index.entry(rank);
                (self.row[e], self.col[e], self.data[e])
            })
            .collect()
    }

    /// whether the storage invariants hold
    pub fn is_canonical(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.data.len());
        self.data.len() == self.row.len()
            && self.data.len() == self.col.len()
            && self.data.iter().all(|&v| v != T::zero())
            && self
                .row
                .iter()
                .zip(&self.col)
                .all(|(&r, &c)| r < self.shape.0 && c < self.shape.1 && seen.insert((r, c)))
    }

    pub(crate) fn set(&mut self, point: usize, feature: usize, value: T) {
        let rect = Rect::new((point, point + 1), (feature, feature + 1));
        self.replace_rectangle(rect, Replacement::Constant(value));
    }
}

impl<T: AFloat> Storage<T> for SparseStorage<T> {
    const KIND: BackendKind = BackendKind::Sparse;

    fn from_array(values: Array2<T>) -> Self {
        let mut storage = Self::empty(values.dim());
        for ((i, j), &value) in values.indexed_iter() {
            storage.push(i, j, value);
        }
        storage
    }

    fn from_vectors(axis: AxisKind, vectors: Vec<Vec<T>>, off_len: usize) -> Self {
        let shape = match axis {
            AxisKind::Point => (vectors.len(), off_len),
            AxisKind::Feature => (off_len, vectors.len()),
        };
        let mut storage = Self::build(shape, vec![], vec![], vec![], SortState::by(axis));
        for (k, vector) in vectors.into_iter().enumerate() {
            for (m, value) in vector.into_iter().enumerate() {
                match axis {
                    AxisKind::Point => storage.push(k, m, value),
                    AxisKind::Feature => storage.push(m, k, value),
                }
            }
        }
        storage
    }

    fn to_array(&self) -> Array2<T> {
        let mut values = Array2::zeros(self.shape);
        for ((&value, &r), &c) in self.data.iter().zip(&self.row).zip(&self.col) {
            values[[r, c]] = value;
        }
        values
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn get(&self, point: usize, feature: usize) -> T {
        match self.find(point, feature) {
            Some(e) => self.data[e],
            None => T::zero(),
        }
    }

    fn vector(&self, axis: AxisKind, position: usize) -> Vec<T> {
        let mut vector = vec![T::zero(); self.axis_len(axis.other())];
        let (_, secondary) = self.keys(axis);
        for e in self.run(axis, position) {
            vector[secondary[e]] = self.data[e];
        }
        vector
    }

    fn take(&self, axis: AxisKind, positions: &[usize]) -> Self {
        let targets = targets(self.axis_len(axis), positions);
        let (primary, _) = self.keys(axis);
        let mut taken = Self::build(
            self.shape,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            SortState::Unsorted,
        );
        for e in 0..self.data.len() {
            if let Some(new) = targets[primary[e]] {
                match axis {
                    AxisKind::Point => taken.push(new, self.col[e], self.data[e]),
                    AxisKind::Feature => taken.push(self.row[e], new, self.data[e]),
                }
            }
        }
        match axis {
            AxisKind::Point => taken.shape.0 = positions.len(),
            AxisKind::Feature => taken.shape.1 = positions.len(),
        }
        taken
    }

    fn split_off(&mut self, axis: AxisKind, positions: &[usize]) -> Self {
        let len = self.axis_len(axis);
        let taken_targets = targets(len, positions);
        let mut kept_targets = vec![0usize; len];
        let mut next = 0;
        for (p, target) in taken_targets.iter().enumerate() {
            if target.is_none() {
                kept_targets[p] = next;
                next += 1;
            }
        }
        let taken = self.take(axis, positions);
        let (primary, _) = self.keys(axis);
        let primary = primary.to_vec();
        self.retain_entries(|e| taken_targets[primary[e]].is_none());
        self.primary_mut(axis)
            .iter_mut()
            .for_each(|p| *p = kept_targets[*p]);
        match axis {
            AxisKind::Point => self.shape.0 = next,
            AxisKind::Feature => self.shape.1 = next,
        }
        self.invalidate();
        taken
    }

    fn permute(&mut self, axis: AxisKind, order: &[usize]) {
        let mut inverse = vec![0usize; order.len()];
        order
            .iter()
            .enumerate()
            .for_each(|(new, &old)| inverse[old] = new);
        self.primary_mut(axis)
            .iter_mut()
            .for_each(|p| *p = inverse[*p]);
        self.invalidate();
    }

    fn transform(&mut self, axis: AxisKind, updates: Vec<(usize, Vec<T>)>) {
        let mut updated = vec![false; self.axis_len(axis)];
        updates.iter().for_each(|(p, _)| updated[*p] = true);
        let primary = self.keys(axis).0.to_vec();
        self.retain_entries(|e| !updated[primary[e]]);
        for (position, vector) in updates {
            for (m, value) in vector.into_iter().enumerate() {
                match axis {
                    AxisKind::Point => self.push(position, m, value),
                    AxisKind::Feature => self.push(m, position, value),
                }
            }
        }
        self.invalidate();
    }

    fn insert(&mut self, axis: AxisKind, before: usize, other: &Self) {
        let added = other.axis_len(axis);
        self.primary_mut(axis)
            .iter_mut()
            .filter(|p| **p >= before)
            .for_each(|p| *p += added);
        for e in 0..other.data.len() {
            match axis {
                AxisKind::Point => self.push(other.row[e] + before, other.col[e], other.data[e]),
                AxisKind::Feature => self.push(other.row[e], other.col[e] + before, other.data[e]),
            }
        }
        match axis {
            AxisKind::Point => self.shape.0 += added,
            AxisKind::Feature => self.shape.1 += added,
        }
        self.invalidate();
    }

    fn repeat(&self, axis: AxisKind, copies: usize, by_value: bool) -> Self {
        let len = self.axis_len(axis);
        let nnz = self.data.len() * copies;
        let mut repeated = Self::build(
            self.shape,
            Vec::with_capacity(nnz),
            Vec::with_capacity(nnz),
            Vec::with_capacity(nnz),
            SortState::Unsorted,
        );
        let (primary, _) = self.keys(axis);
        for k in 0..copies {
            for e in 0..self.data.len() {
                let p = if by_value {
                    primary[e] * copies + k
                } else {
                    k * len + primary[e]
                };
                match axis {
                    AxisKind::Point => repeated.push(p, self.col[e], self.data[e]),
                    AxisKind::Feature => repeated.push(self.row[e], p, self.data[e]),
                }
            }
        }
        match axis {
            AxisKind::Point => repeated.shape.0 *= copies,
            AxisKind::Feature => repeated.shape.1 *= copies,
        }
        repeated
    }

    fn transpose(&mut self) {
        std::mem::swap(&mut self.row, &mut self.col);
        self.shape = (self.shape.1, self.shape.0);
        self.state = self.state.transposed();
        self.indexes.swap(0, 1);
    }

    fn window(&self, rect: Rect) -> Self {
        let mut window = Self::build(rect.shape(), vec![], vec![], vec![], self.state);
        for e in 0..self.data.len() {
            let (r, c) = (self.row[e], self.col[e]);
            if rect.contains(r, c) {
                window.push(r - rect.point_start, c - rect.feature_start, self.data[e]);
            }
        }
        window
    }

    fn replace_rectangle(&mut self, rect: Rect, with: Replacement<'_, T, Self>) {
        match with {
            Replacement::Constant(value) => self.fill_rectangle(rect, value),
            Replacement::Values(other) => self.merge_rectangle(rect, other),
        }
    }

    fn map_elements(
        &mut self,
        points: &[usize],
        features: &[usize],
        skip_zeros: bool,
        f: &mut dyn FnMut(T, usize, usize) -> T,
    ) {
        if skip_zeros {
            let mut selected_points = vec![false; self.shape.0];
            let mut selected_features = vec![false; self.shape.1];
            points.iter().for_each(|&p| selected_points[p] = true);
            features.iter().for_each(|&p| selected_features[p] = true);
            for e in 0..self.data.len() {
                let (r, c) = (self.row[e], self.col[e]);
                if selected_points[r] && selected_features[c] {
                    self.data[e] = f(self.data[e], r, c);
                }
            }
            self.drop_zeros();
            return;
        }
        let mut updates = Vec::new();
        let mut additions = Vec::new();
        for &i in points {
            for &j in features {
                match self.find(i, j) {
                    Some(e) => updates.push((e, f(self.data[e], i, j))),
                    None => additions.push((i, j, f(T::zero(), i, j))),
                }
            }
        }
        updates.into_iter().for_each(|(e, v)| self.data[e] = v);
        additions
            .into_iter()
            .for_each(|(i, j, v)| self.push(i, j, v));
        self.drop_zeros();
        self.invalidate();
    }

    fn one_hot(&mut self, feature: usize, categories: &[T]) {
        self.expand_categories(feature, categories);
    }

    fn split_feature(&mut self, feature: usize, parts: &Array2<T>) {
        self.expand_parts(feature, parts);
    }

    fn combine(&self, other: &Self, f: &(dyn Fn(T, T) -> T + Send + Sync)) -> Self {
        self.union_walk(other, f)
    }

    fn map(&self, f: &(dyn Fn(T) -> T + Send + Sync)) -> Self {
        self.map_values(f)
    }

    fn contains_zero(&self) -> bool {
        self.shape.0 * self.shape.1 > self.data.len()
    }

    fn equals(&self, other: &Self) -> bool {
        if self.shape != other.shape || self.data.len() != other.data.len() {
            return false;
        }
        let (lhs, rhs) = (self.access(AxisKind::Point), other.access(AxisKind::Point));
        (0..lhs.len()).all(|rank| {
            let (a, b) = (lhs.entry(rank), rhs.entry(rank));
            self.row[a] == other.row[b]
                && self.col[a] == other.col[b]
                && same_value(self.data[a], other.data[b])
        })
    }
}
