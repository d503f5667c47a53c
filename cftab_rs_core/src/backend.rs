//! # backend
//!
//! physical storage behind a [`crate::Base`].
//!
//! # Design
//!
//! Every representation implements [`Storage`], a small set of primitives the axis layer
//! is written against. [`Backend`] is the closed set of representations a container can
//! hold, and simply forwards each primitive to the variant it wraps. Primitives assume
//! validated arguments: positions are in range and unique, shapes agree.

use crate::toolkit::array::{same_value, AFloat};
use ndarray::{Array2, Axis};
use std::fmt;

pub mod dense;
pub mod sparse;

pub use dense::DenseStorage;
pub use sparse::{SortState, SparseStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    Point,
    Feature,
}

impl AxisKind {
    #[inline]
    pub fn other(self) -> Self {
        match self {
            AxisKind::Point => AxisKind::Feature,
            AxisKind::Feature => AxisKind::Point,
        }
    }
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            AxisKind::Point => 0,
            AxisKind::Feature => 1,
        }
    }
    #[inline]
    pub(crate) fn ndarray(self) -> Axis {
        Axis(self.index())
    }
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisKind::Point => write!(f, "point"),
            AxisKind::Feature => write!(f, "feature"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Dense,
    Sparse,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Dense => write!(f, "Dense"),
            BackendKind::Sparse => write!(f, "Sparse"),
        }
    }
}

/// a half-open rectangle of positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub point_start: usize,
    pub point_end: usize,
    pub feature_start: usize,
    pub feature_end: usize,
}

impl Rect {
    pub fn new(points: (usize, usize), features: (usize, usize)) -> Self {
        Self {
            point_start: points.0,
            point_end: points.1,
            feature_start: features.0,
            feature_end: features.1,
        }
    }
    pub fn full((rows, cols): (usize, usize)) -> Self {
        Self::new((0, rows), (0, cols))
    }
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (
            self.point_end - self.point_start,
            self.feature_end - self.feature_start,
        )
    }
    #[inline]
    pub fn contains(&self, point: usize, feature: usize) -> bool {
        (self.point_start..self.point_end).contains(&point)
            && (self.feature_start..self.feature_end).contains(&feature)
    }
}

/// which left / right position feeds every output point and feature of a join
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinPlan {
    pub rows: Vec<(Option<usize>, Option<usize>)>,
    pub columns: Vec<(Option<usize>, Option<usize>)>,
}

impl JoinPlan {
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// the left value wins unless it is missing, cells fed by neither side are missing
    #[inline]
    pub fn cell<T: AFloat>(left: Option<T>, right: Option<T>) -> T {
        match (left, right) {
            (Some(l), Some(r)) if l.is_nan() => r,
            (Some(l), _) => l,
            (None, Some(r)) => r,
            (None, None) => T::nan(),
        }
    }
}

/// what a rectangle gets overwritten with
pub enum Replacement<'a, T: AFloat, S> {
    Constant(T),
    Values(&'a S),
}

/// the primitives the axis layer needs from a storage representation
pub trait Storage<T: AFloat>: Clone + Sized {
    const KIND: BackendKind;

    fn from_array(values: Array2<T>) -> Self;
    /// builds storage from vectors laid along `axis`, each `off_len` long
    fn from_vectors(axis: AxisKind, vectors: Vec<Vec<T>>, off_len: usize) -> Self;
    fn to_array(&self) -> Array2<T>;

    fn shape(&self) -> (usize, usize);
    fn get(&self, point: usize, feature: usize) -> T;
    /// the dense content of one point / feature
    fn vector(&self, axis: AxisKind, position: usize) -> Vec<T>;

    /// copies the given positions, in the given order
    fn take(&self, axis: AxisKind, positions: &[usize]) -> Self;
    /// removes the given positions and returns them, in the given order
    fn split_off(&mut self, axis: AxisKind, positions: &[usize]) -> Self;
    /// new position `i` holds the old `order[i]`
    fn permute(&mut self, axis: AxisKind, order: &[usize]);
    /// overwrites whole vectors along `axis`
    fn transform(&mut self, axis: AxisKind, updates: Vec<(usize, Vec<T>)>);
    fn insert(&mut self, axis: AxisKind, before: usize, other: &Self);
    fn repeat(&self, axis: AxisKind, copies: usize, by_value: bool) -> Self;
    fn transpose(&mut self);
    /// owned copy of a rectangle, re-based at the origin
    fn window(&self, rect: Rect) -> Self;
    fn replace_rectangle(&mut self, rect: Rect, with: Replacement<'_, T, Self>);
    /// applies `f(value, point, feature)` to every selected element; when `skip_zeros`
    /// is set, zeros are left as they are
    fn map_elements(
        &mut self,
        points: &[usize],
        features: &[usize],
        skip_zeros: bool,
        f: &mut dyn FnMut(T, usize, usize) -> T,
    );
    /// replaces `feature` with one 0/1 feature per entry of `categories`
    fn one_hot(&mut self, feature: usize, categories: &[T]);
    /// replaces `feature` with the columns of `parts`, one row per point
    fn split_feature(&mut self, feature: usize, parts: &Array2<T>);
    /// elementwise `f(self, other)` over equally shaped storages
    fn combine(&self, other: &Self, f: &(dyn Fn(T, T) -> T + Send + Sync)) -> Self;
    /// elementwise `f(self)`
    fn map(&self, f: &(dyn Fn(T) -> T + Send + Sync)) -> Self;

    fn contains_zero(&self) -> bool;
    fn equals(&self, other: &Self) -> bool;
}

/// the storage of a container
#[derive(Debug, Clone)]
pub enum Backend<T: AFloat> {
    Dense(DenseStorage<T>),
    Sparse(SparseStorage<T>),
}

macro_rules! dispatch {
    ($self:expr, $storage:ident => $body:expr) => {
        match $self {
            Backend::Dense($storage) => $body,
            Backend::Sparse($storage) => $body,
        }
    };
}

impl<T: AFloat> Backend<T> {
    pub fn from_array(kind: BackendKind, values: Array2<T>) -> Self {
        match kind {
            BackendKind::Dense => Backend::Dense(DenseStorage::from_array(values)),
            BackendKind::Sparse => Backend::Sparse(SparseStorage::from_array(values)),
        }
    }

    pub fn from_vectors(
        kind: BackendKind,
        axis: AxisKind,
        vectors: Vec<Vec<T>>,
        off_len: usize,
    ) -> Self {
        match kind {
            BackendKind::Dense => {
                Backend::Dense(DenseStorage::from_vectors(axis, vectors, off_len))
            }
            BackendKind::Sparse => {
                Backend::Sparse(SparseStorage::from_vectors(axis, vectors, off_len))
            }
        }
    }

    pub fn zeros(kind: BackendKind, shape: (usize, usize)) -> Self {
        match kind {
            BackendKind::Dense => Backend::Dense(DenseStorage::from_array(Array2::zeros(shape))),
            BackendKind::Sparse => Backend::Sparse(SparseStorage::empty(shape)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Dense(_) => BackendKind::Dense,
            Backend::Sparse(_) => BackendKind::Sparse,
        }
    }

    /// converts to `kind`, returning `self` untouched if it already is of that kind
    pub fn into_kind(self, kind: BackendKind) -> Self {
        if self.kind() == kind {
            return self;
        }
        let values = self.to_array();
        Self::from_array(kind, values)
    }

    pub fn to_kind(&self, kind: BackendKind) -> Self {
        if self.kind() == kind {
            return self.clone();
        }
        Self::from_array(kind, self.to_array())
    }

    pub fn to_array(&self) -> Array2<T> {
        dispatch!(self, s => s.to_array())
    }
    pub fn shape(&self) -> (usize, usize) {
        dispatch!(self, s => s.shape())
    }
    pub fn get(&self, point: usize, feature: usize) -> T {
        dispatch!(self, s => s.get(point, feature))
    }
    pub(crate) fn set(&mut self, point: usize, feature: usize, value: T) {
        dispatch!(self, s => s.set(point, feature, value))
    }
    pub fn vector(&self, axis: AxisKind, position: usize) -> Vec<T> {
        dispatch!(self, s => s.vector(axis, position))
    }
    pub fn take(&self, axis: AxisKind, positions: &[usize]) -> Self {
        match self {
            Backend::Dense(s) => Backend::Dense(s.take(axis, positions)),
            Backend::Sparse(s) => Backend::Sparse(s.take(axis, positions)),
        }
    }
    pub fn split_off(&mut self, axis: AxisKind, positions: &[usize]) -> Self {
        match self {
            Backend::Dense(s) => Backend::Dense(s.split_off(axis, positions)),
            Backend::Sparse(s) => Backend::Sparse(s.split_off(axis, positions)),
        }
    }
    pub fn permute(&mut self, axis: AxisKind, order: &[usize]) {
        dispatch!(self, s => s.permute(axis, order))
    }
    pub fn transform(&mut self, axis: AxisKind, updates: Vec<(usize, Vec<T>)>) {
        dispatch!(self, s => s.transform(axis, updates))
    }
    /// inserts `other`, converting it to this backend's kind first
    pub fn insert(&mut self, axis: AxisKind, before: usize, other: &Backend<T>) {
        match (self, other) {
            (Backend::Dense(s), Backend::Dense(o)) => s.insert(axis, before, o),
            (Backend::Sparse(s), Backend::Sparse(o)) => s.insert(axis, before, o),
            (Backend::Dense(s), o) => s.insert(axis, before, &DenseStorage::from_array(o.to_array())),
            (Backend::Sparse(s), o) => {
                s.insert(axis, before, &SparseStorage::from_array(o.to_array()))
            }
        }
    }
    pub fn repeat(&self, axis: AxisKind, copies: usize, by_value: bool) -> Self {
        match self {
            Backend::Dense(s) => Backend::Dense(s.repeat(axis, copies, by_value)),
            Backend::Sparse(s) => Backend::Sparse(s.repeat(axis, copies, by_value)),
        }
    }
    pub fn transpose(&mut self) {
        dispatch!(self, s => s.transpose())
    }
    pub fn window(&self, rect: Rect) -> Self {
        match self {
            Backend::Dense(s) => Backend::Dense(s.window(rect)),
            Backend::Sparse(s) => Backend::Sparse(s.window(rect)),
        }
    }
    pub fn fill_rectangle(&mut self, rect: Rect, value: T) {
        dispatch!(self, s => s.replace_rectangle(rect, Replacement::Constant(value)))
    }
    /// overwrites `rect` with `values`, converting them to this backend's kind first
    pub fn replace_rectangle(&mut self, rect: Rect, values: &Backend<T>) {
        match (self, values) {
            (Backend::Dense(s), Backend::Dense(v)) => s.replace_rectangle(rect, Replacement::Values(v)),
            (Backend::Sparse(s), Backend::Sparse(v)) => {
                s.replace_rectangle(rect, Replacement::Values(v))
            }
            (Backend::Dense(s), v) => {
                let v = DenseStorage::from_array(v.to_array());
                s.replace_rectangle(rect, Replacement::Values(&v))
            }
            (Backend::Sparse(s), v) => {
                let v = SparseStorage::from_array(v.to_array());
                s.replace_rectangle(rect, Replacement::Values(&v))
            }
        }
    }
    pub fn map_elements(
        &mut self,
        points: &[usize],
        features: &[usize],
        skip_zeros: bool,
        f: &mut dyn FnMut(T, usize, usize) -> T,
    ) {
        dispatch!(self, s => s.map_elements(points, features, skip_zeros, f))
    }
    pub fn one_hot(&mut self, feature: usize, categories: &[T]) {
        dispatch!(self, s => s.one_hot(feature, categories))
    }
    pub fn split_feature(&mut self, feature: usize, parts: &Array2<T>) {
        dispatch!(self, s => s.split_feature(feature, parts))
    }
    /// elementwise `f(self, other)`; the result has the kind of `self`
    pub fn combine(&self, other: &Backend<T>, f: &(dyn Fn(T, T) -> T + Send + Sync)) -> Self {
        match (self, other) {
            (Backend::Dense(s), Backend::Dense(o)) => Backend::Dense(s.combine(o, f)),
            (Backend::Sparse(s), Backend::Sparse(o)) => Backend::Sparse(s.combine(o, f)),
            (Backend::Dense(s), o) => {
                Backend::Dense(s.combine(&DenseStorage::from_array(o.to_array()), f))
            }
            (Backend::Sparse(s), o) => {
                Backend::Sparse(s.combine(&SparseStorage::from_array(o.to_array()), f))
            }
        }
    }
    pub fn map(&self, f: &(dyn Fn(T) -> T + Send + Sync)) -> Self {
        match self {
            Backend::Dense(s) => Backend::Dense(s.map(f)),
            Backend::Sparse(s) => Backend::Sparse(s.map(f)),
        }
    }
    /// builds the output of a join; the result has the kind of `self`
    pub fn join(&self, right: &Backend<T>, plan: &JoinPlan) -> Self {
        match (self, right) {
            (Backend::Dense(s), Backend::Dense(r)) => Backend::Dense(s.join(r, plan)),
            (Backend::Sparse(s), Backend::Sparse(r)) => Backend::Sparse(s.join(r, plan)),
            (Backend::Dense(s), r) => {
                Backend::Dense(s.join(&DenseStorage::from_array(r.to_array()), plan))
            }
            (Backend::Sparse(s), r) => {
                Backend::Sparse(s.join(&SparseStorage::from_array(r.to_array()), plan))
            }
        }
    }
    pub fn contains_zero(&self) -> bool {
        dispatch!(self, s => s.contains_zero())
    }
    /// value equality across kinds, two missing values being equal
    pub fn equals(&self, other: &Backend<T>) -> bool {
        match (self, other) {
            (Backend::Dense(s), Backend::Dense(o)) => s.equals(o),
            (Backend::Sparse(s), Backend::Sparse(o)) => s.equals(o),
            (s, o) => {
                s.shape() == o.shape()
                    && s.to_array()
                        .iter()
                        .zip(o.to_array().iter())
                        .all(|(&a, &b)| same_value(a, b))
            }
        }
    }

    /// every element in point-major order
    pub fn values(&self) -> Vec<T> {
        match self {
            Backend::Dense(s) => s.array().iter().copied().collect(),
            Backend::Sparse(s) => s.to_array().iter().copied().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    pub(crate) fn get_test_array() -> Array2<f64> {
        array![[1., 0., 3.], [0., 0., 6.], [7., f64::NAN, 0.], [0., 11., 12.]]
    }

    pub(crate) fn both_kinds() -> [Backend<f64>; 2] {
        [
            Backend::from_array(BackendKind::Dense, get_test_array()),
            Backend::from_array(BackendKind::Sparse, get_test_array()),
        ]
    }

    #[test]
    fn test_conversions() {
        for backend in both_kinds() {
            for kind in [BackendKind::Dense, BackendKind::Sparse] {
                let converted = backend.to_kind(kind);
                assert_eq!(converted.kind(), kind);
                assert!(converted.equals(&backend));
                assert!(backend.equals(&converted));
            }
        }
    }

    #[test]
    fn test_primitives_agree() {
        let [mut dense, mut sparse] = both_kinds();
        for (point, feature) in [(0, 0), (1, 1), (2, 0), (3, 2)] {
            assert_eq!(dense.get(point, feature), sparse.get(point, feature));
        }
        assert!(sparse.get(2, 1).is_nan());
        assert_eq!(dense.vector(AxisKind::Feature, 2), sparse.vector(AxisKind::Feature, 2));

        let taken = [dense.take(AxisKind::Point, &[3, 0]), sparse.take(AxisKind::Point, &[3, 0])];
        assert!(taken[0].equals(&taken[1]));
        assert_eq!(taken[0].shape(), (2, 3));

        let removed = [
            dense.split_off(AxisKind::Feature, &[1]),
            sparse.split_off(AxisKind::Feature, &[1]),
        ];
        assert!(removed[0].equals(&removed[1]));
        assert!(dense.equals(&sparse));
        assert_eq!(sparse.shape(), (4, 2));

        dense.insert(AxisKind::Feature, 1, &removed[1]);
        sparse.insert(AxisKind::Feature, 1, &removed[0]);
        assert!(dense.equals(&sparse));
        assert!(dense.equals(&Backend::from_array(BackendKind::Dense, get_test_array())));

        let repeated = [
            dense.repeat(AxisKind::Point, 2, true),
            sparse.repeat(AxisKind::Point, 2, true),
        ];
        assert!(repeated[0].equals(&repeated[1]));
        assert_eq!(repeated[1].vector(AxisKind::Point, 7), vec![0., 11., 12.]);

        dense.transpose();
        sparse.transpose();
        assert_eq!(sparse.shape(), (3, 4));
        assert!(dense.equals(&sparse));
        assert_eq!(sparse.get(2, 1), 6.);
    }

    #[test]
    fn test_combine_mixed() {
        let [dense, sparse] = both_kinds();
        let sum = sparse.combine(&dense, &|a, b| a + b);
        assert_eq!(sum.kind(), BackendKind::Sparse);
        assert_eq!(sum.get(3, 2), 24.);
        assert!(sum.get(2, 1).is_nan());
        let product = dense.combine(&sparse, &|a, b| a * b);
        assert_eq!(product.kind(), BackendKind::Dense);
        assert_eq!(product.get(0, 2), 9.);
    }
}
