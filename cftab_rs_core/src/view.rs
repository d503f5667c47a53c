//! # view
//!
//! a read-only window over a rectangle of a [`Base`].
//!
//! # Design
//!
//! A [`View`] is a shared borrow of its source plus the bounds of the window, so creating
//! one never copies storage. While a view is alive its source cannot be mutated, and the
//! view itself exposes no mutating method:
//!
//! ```compile_fail
//! use cftab_core::{Base, BackendKind};
//!
//! let mut base = Base::<f64>::zeros((4, 2), BackendKind::Dense);
//! let view = base.view(1..3, ..).unwrap();
//! base.set(1, 0, 5.).unwrap();
//! assert_eq!(view.get(0, 0).unwrap(), 5.);
//! ```
//!
//! ```compile_fail
//! use cftab_core::{Base, BackendKind};
//!
//! let base = Base::<f64>::zeros((4, 2), BackendKind::Dense);
//! let view = base.view(.., ..).unwrap();
//! view.points_mut();
//! ```

use crate::{
    backend::{AxisKind, Backend, BackendKind, Rect},
    base::Base,
    error::{bail, ensure, Result},
    names::Identifier,
    toolkit::array::{same_value, AFloat},
};
use ndarray::{s, ArrayView2};
use std::ops::{Bound, RangeBounds};

/// resolves `range` against an axis of length `len`
fn bounds(range: impl RangeBounds<usize>, len: usize, axis: AxisKind) -> Result<(usize, usize)> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e + 1,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    ensure!(
        end <= len,
        InvalidIdentifier,
        "{axis} bound {end} is out of range for an axis of length {len}"
    );
    ensure!(
        start <= end,
        ArgumentValue,
        "{axis} range starts at {start} but ends at {end}"
    );
    Ok((start, end))
}

#[derive(Debug, Clone, Copy)]
pub struct View<'a, T: AFloat> {
    source: &'a Base<T>,
    rect: Rect,
}

impl<T: AFloat> Base<T> {
    /// a view over the given half-open point / feature ranges
    pub fn view(
        &self,
        points: impl RangeBounds<usize>,
        features: impl RangeBounds<usize>,
    ) -> Result<View<'_, T>> {
        let (p0, p1) = bounds(points, self.point_count(), AxisKind::Point)?;
        let (f0, f1) = bounds(features, self.feature_count(), AxisKind::Feature)?;
        Ok(View::new(self, Rect::new((p0, p1), (f0, f1))))
    }

    pub fn point_view(&self, point: impl Into<Identifier>) -> Result<View<'_, T>> {
        self.points().view(point)
    }

    pub fn feature_view(&self, feature: impl Into<Identifier>) -> Result<View<'_, T>> {
        self.features().view(feature)
    }
}

impl<'a, T: AFloat> View<'a, T> {
    pub(crate) fn new(source: &'a Base<T>, rect: Rect) -> Self {
        Self { source, rect }
    }

    /// the view over one whole point / feature of `source`
    pub(crate) fn vector(source: &'a Base<T>, axis: AxisKind, position: usize) -> Self {
        let (points, features) = source.shape();
        let rect = match axis {
            AxisKind::Point => Rect::new((position, position + 1), (0, features)),
            AxisKind::Feature => Rect::new((0, points), (position, position + 1)),
        };
        Self::new(source, rect)
    }

    pub fn source(&self) -> &'a Base<T> {
        self.source
    }
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.rect.shape()
    }
    #[inline]
    pub fn len(&self) -> usize {
        let (points, features) = self.shape();
        points * features
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn name(&self) -> Option<&'a str> {
        self.source.name()
    }

    fn local(&self, axis: AxisKind, identifier: &Identifier) -> Result<usize> {
        let (start, end) = match axis {
            AxisKind::Point => (self.rect.point_start, self.rect.point_end),
            AxisKind::Feature => (self.rect.feature_start, self.rect.feature_end),
        };
        let len = end - start;
        match identifier {
            Identifier::Index(index) => {
                let resolved = if *index < 0 { index + len as i64 } else { *index };
                ensure!(
                    resolved >= 0 && (resolved as usize) < len,
                    InvalidIdentifier,
                    "{axis} index {index} is out of range for a view of length {len}"
                );
                Ok(resolved as usize)
            }
            Identifier::Name(_) => {
                let position = self.source.registry(axis).index_of(identifier)?;
                ensure!(
                    (start..end).contains(&position),
                    InvalidIdentifier,
                    "{axis} {identifier} lies outside of this view"
                );
                Ok(position - start)
            }
        }
    }

    #[inline]
    fn at(&self, point: usize, feature: usize) -> T {
        self.source
            .backend
            .get(self.rect.point_start + point, self.rect.feature_start + feature)
    }

    /// an element, identifiers being relative to the view (names are looked up in the source)
    pub fn get(&self, point: impl Into<Identifier>, feature: impl Into<Identifier>) -> Result<T> {
        let point = self.local(AxisKind::Point, &point.into())?;
        let feature = self.local(AxisKind::Feature, &feature.into())?;
        Ok(self.at(point, feature))
    }

    /// the axis a one-dimensional view runs along
    fn long_axis(&self) -> Result<AxisKind> {
        match self.shape() {
            (1, _) => Ok(AxisKind::Feature),
            (_, 1) => Ok(AxisKind::Point),
            shape => bail!(
                ImproperAction,
                "a view of shape {shape:?} is not one-dimensional"
            ),
        }
    }

    /// the `k`-th value of a one-dimensional view
    pub fn value(&self, k: usize) -> Result<T> {
        match self.long_axis()? {
            AxisKind::Feature => self.get(0, k),
            AxisKind::Point => self.get(k, 0),
        }
    }

    /// the value of a one-dimensional view at the given name along its length
    pub fn named(&self, name: &str) -> Result<T> {
        match self.long_axis()? {
            AxisKind::Feature => self.get(0, name),
            AxisKind::Point => self.get(name, 0),
        }
    }

    pub fn point_names(&self) -> Vec<String> {
        self.source.point_names.names()[self.rect.point_start..self.rect.point_end].to_vec()
    }
    pub fn feature_names(&self) -> Vec<String> {
        self.source.feature_names.names()[self.rect.feature_start..self.rect.feature_end].to_vec()
    }

    /// every value, point-major
    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let view = *self;
        let (points, features) = self.shape();
        (0..points).flat_map(move |i| (0..features).map(move |j| view.at(i, j)))
    }

    pub fn values(&self) -> Vec<T> {
        match self.as_array() {
            Some(array) => array.iter().copied().collect(),
            None => self.iter().collect(),
        }
    }

    /// zero-copy access to the underlying block, for dense sources only
    pub fn as_array(&self) -> Option<ArrayView2<'a, T>> {
        match &self.source.backend {
            Backend::Dense(storage) => Some(storage.view().slice_move(s![
                self.rect.point_start..self.rect.point_end,
                self.rect.feature_start..self.rect.feature_end
            ])),
            Backend::Sparse(_) => None,
        }
    }

    /// a nested view, ranges being relative to this one
    pub fn view(
        &self,
        points: impl RangeBounds<usize>,
        features: impl RangeBounds<usize>,
    ) -> Result<View<'a, T>> {
        let (rows, cols) = self.shape();
        let (p0, p1) = bounds(points, rows, AxisKind::Point)?;
        let (f0, f1) = bounds(features, cols, AxisKind::Feature)?;
        let (dp, df) = (self.rect.point_start, self.rect.feature_start);
        Ok(View::new(
            self.source,
            Rect::new((dp + p0, dp + p1), (df + f0, df + f1)),
        ))
    }

    pub fn point_view(&self, point: impl Into<Identifier>) -> Result<View<'a, T>> {
        let i = self.local(AxisKind::Point, &point.into())?;
        self.view(i..=i, ..)
    }
    pub fn feature_view(&self, feature: impl Into<Identifier>) -> Result<View<'a, T>> {
        let j = self.local(AxisKind::Feature, &feature.into())?;
        self.view(.., j..=j)
    }

    pub fn contains_zero(&self) -> bool {
        self.iter().any(|v| v == T::zero())
    }

    /// whether `other` holds the same names and values as this window
    pub fn is_identical(&self, other: &Base<T>) -> bool {
        self.shape() == other.shape()
            && self.point_names() == other.point_names.names()
            && self.feature_names() == other.feature_names.names()
            && self
                .iter()
                .zip(other.backend.values())
                .all(|(a, b)| same_value(a, b))
    }

    /// materializes the window into an owned object of the same kind as the source
    pub fn copy(&self) -> Base<T> {
        self.copy_to(self.source.kind())
    }

    pub fn copy_to(&self, kind: BackendKind) -> Base<T> {
        let backend = self.source.backend.window(self.rect).into_kind(kind);
        let points = (self.rect.point_start..self.rect.point_end).collect::<Vec<_>>();
        let features = (self.rect.feature_start..self.rect.feature_end).collect::<Vec<_>>();
        self.source.derive(
            backend,
            self.source.point_names.select(&points),
            self.source.feature_names.select(&features),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::tests::{get_test_base, KINDS},
        error::Error,
    };

    #[test]
    fn test_view_reads() {
        for kind in KINDS {
            let base = get_test_base(kind);
            let view = base.view(1..3, 1..).unwrap();
            assert_eq!(view.shape(), (2, 2));
            assert_eq!(view.get(0, 1).unwrap(), 6.);
            assert_eq!(view.get("p2", "c").unwrap(), 0.);
            assert!(view.get(-1, "b").unwrap().is_nan());
            assert!(matches!(view.get("p0", "b"), Err(Error::InvalidIdentifier(_))));
            assert!(matches!(view.get(2, 0), Err(Error::InvalidIdentifier(_))));
            assert_eq!(view.point_names(), ["p1", "p2"]);
            assert_eq!(view.feature_names(), ["b", "c"]);
            assert_eq!(view.iter().count(), 4);
            assert!(view.contains_zero());
            assert_eq!(view.as_array().is_some(), kind == BackendKind::Dense);

            let nested = view.view(1.., ..1).unwrap();
            assert_eq!(nested.shape(), (1, 1));
            assert!(nested.value(0).unwrap().is_nan());
            assert!(matches!(base.view(0..5, ..), Err(Error::InvalidIdentifier(_))));
        }
    }

    #[test]
    fn test_vector_views() {
        for kind in KINDS {
            let base = get_test_base(kind);
            let point = base.point_view("p3").unwrap();
            assert_eq!(point.values(), vec![0., 11., 12.]);
            assert_eq!(point.named("c").unwrap(), 12.);
            assert_eq!(point.value(1).unwrap(), 11.);
            let feature = base.feature_view(-1).unwrap();
            assert_eq!(feature.values(), vec![3., 6., 0., 12.]);
            assert_eq!(feature.named("p1").unwrap(), 6.);
            let block = base.view(.., ..).unwrap();
            assert!(matches!(block.value(0), Err(Error::ImproperAction(_))));
        }
    }

    #[test]
    fn test_copy() {
        for kind in KINDS {
            let base = get_test_base(kind);
            let view = base.view(2..4, 0..2).unwrap();
            for to in KINDS {
                let copied = view.copy_to(to);
                assert_eq!(copied.kind(), to);
                assert_eq!(copied.shape(), (2, 2));
                assert_eq!(copied.points().names(), ["p2", "p3"]);
                assert!(view.is_identical(&copied));
                assert_eq!(copied.get("p3", "b").unwrap(), 11.);
            }
            assert_eq!(view.copy().kind(), kind);
        }
    }

    #[test]
    fn test_reflects_source_changes() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            assert_eq!(base.view(1..3, ..).unwrap().get(0, 0).unwrap(), 0.);
            base.set(1, 0, 42.).unwrap();
            let view = base.view(1..3, ..).unwrap();
            assert_eq!(view.get(0, 0).unwrap(), 42.);
        }
    }
}
