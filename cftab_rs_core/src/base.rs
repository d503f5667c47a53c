//! # base
//!
//! the public container: values, one name registry per axis, an optional object name and
//! the paths it was loaded from.
//!
//! # Design
//!
//! `dims[0]` is always the number of points and the product of `dims[1..]` the number of
//! features, so objects with more than two dimensions are stored flattened. Such objects
//! only accept point-axis edits until [`Base::collapse_dimensions`] is called.

use crate::{
    axis::{Axis, AxisMut},
    backend::{AxisKind, Backend, BackendKind, SparseStorage},
    error::{bail, ensure, Result},
    names::{Identifier, NameAssignment, NameRegistry},
    toolkit::array::AFloat,
};
use ndarray::Array2;

mod elements;
mod io;
mod meta;
mod ops;

pub use io::FORMAT_MAGIC;
pub use ops::{BinaryOp, Operand};

/// where an object was loaded from, if anywhere
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paths {
    pub absolute: Option<String>,
    pub relative: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Base<T: AFloat> {
    pub(crate) dims: Vec<usize>,
    pub(crate) point_names: NameRegistry,
    pub(crate) feature_names: NameRegistry,
    pub(crate) name: Option<String>,
    pub(crate) paths: Paths,
    pub(crate) backend: Backend<T>,
}

impl<T: AFloat> Base<T> {
    pub fn new(backend: Backend<T>) -> Self {
        let (points, features) = backend.shape();
        Self {
            dims: vec![points, features],
            point_names: NameRegistry::new(points),
            feature_names: NameRegistry::new(features),
            name: None,
            paths: Paths::default(),
            backend,
        }
    }

    pub fn from_array(values: Array2<T>, kind: BackendKind) -> Self {
        Self::new(Backend::from_array(kind, values))
    }

    pub fn from_rows(rows: Vec<Vec<T>>, kind: BackendKind) -> Result<Self> {
        let features = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != features) {
            bail!(
                ShapeMismatch,
                "point {i} holds {} values while the first point holds {features}",
                row.len()
            );
        }
        Ok(Self::new(Backend::from_vectors(
            kind,
            AxisKind::Point,
            rows,
            features,
        )))
    }

    /// a sparse object from coordinate triples
    pub fn from_triplets(
        shape: (usize, usize),
        data: Vec<T>,
        row: Vec<usize>,
        col: Vec<usize>,
    ) -> Result<Self> {
        let storage = SparseStorage::from_triplets(shape, data, row, col)?;
        Ok(Self::new(Backend::Sparse(storage)))
    }

    pub fn zeros(shape: (usize, usize), kind: BackendKind) -> Self {
        Self::new(Backend::zeros(kind, shape))
    }

    /// an object with more than two dimensions, `values` laid out point-major
    pub fn from_dimensions(dims: Vec<usize>, values: Vec<T>, kind: BackendKind) -> Result<Self> {
        ensure!(
            dims.len() >= 2,
            ArgumentValue,
            "at least two dimensions are required, got {}",
            dims.len()
        );
        let points = dims[0];
        let features: usize = dims[1..].iter().product();
        ensure!(
            values.len() == points * features,
            ShapeMismatch,
            "dimensions {dims:?} require {} values, got {}",
            points * features,
            values.len()
        );
        let values = Array2::from_shape_vec((points, features), values).map_err(|e| {
            crate::error::Error::ShapeMismatch(format!("invalid dimensions {dims:?}: {e}"))
        })?;
        let mut base = Self::from_array(values, kind);
        base.dims = dims;
        Ok(base)
    }

    pub fn with_point_names(mut self, names: impl Into<NameAssignment>) -> Result<Self> {
        self.point_names.set_names(names.into())?;
        Ok(self)
    }
    pub fn with_feature_names(mut self, names: impl Into<NameAssignment>) -> Result<Self> {
        self.feature_names.set_names(names.into())?;
        Ok(self)
    }
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn with_paths(mut self, absolute: Option<String>, relative: Option<String>) -> Self {
        self.paths = Paths { absolute, relative };
        self
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.backend.shape()
    }
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }
    #[inline]
    pub fn point_count(&self) -> usize {
        self.shape().0
    }
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.shape().1
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        let (points, features) = self.shape();
        points == 0 || features == 0
    }
    #[inline]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }
    pub fn backend(&self) -> &Backend<T> {
        &self.backend
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn points(&self) -> Axis<'_, T> {
        Axis::new(self, AxisKind::Point)
    }
    pub fn features(&self) -> Axis<'_, T> {
        Axis::new(self, AxisKind::Feature)
    }
    pub fn points_mut(&mut self) -> AxisMut<'_, T> {
        AxisMut::new(self, AxisKind::Point)
    }
    pub fn features_mut(&mut self) -> AxisMut<'_, T> {
        AxisMut::new(self, AxisKind::Feature)
    }

    pub fn get(&self, point: impl Into<Identifier>, feature: impl Into<Identifier>) -> Result<T> {
        let point = self.point_names.index_of(&point.into())?;
        let feature = self.feature_names.index_of(&feature.into())?;
        Ok(self.backend.get(point, feature))
    }

    pub fn set(
        &mut self,
        point: impl Into<Identifier>,
        feature: impl Into<Identifier>,
        value: T,
    ) -> Result<()> {
        let point = self.point_names.index_of(&point.into())?;
        let feature = self.feature_names.index_of(&feature.into())?;
        self.backend.set(point, feature, value);
        Ok(())
    }

    #[inline]
    pub(crate) fn registry(&self, axis: AxisKind) -> &NameRegistry {
        match axis {
            AxisKind::Point => &self.point_names,
            AxisKind::Feature => &self.feature_names,
        }
    }
    #[inline]
    pub(crate) fn registry_mut(&mut self, axis: AxisKind) -> &mut NameRegistry {
        match axis {
            AxisKind::Point => &mut self.point_names,
            AxisKind::Feature => &mut self.feature_names,
        }
    }
    #[inline]
    pub(crate) fn axis_len(&self, axis: AxisKind) -> usize {
        match axis {
            AxisKind::Point => self.shape().0,
            AxisKind::Feature => self.shape().1,
        }
    }

    pub(crate) fn ensure_2d(&self, action: &str) -> Result<()> {
        ensure!(
            self.dims.len() == 2,
            ImproperAction,
            "{action} is not allowed for an object with {} dimensions",
            self.dims.len()
        );
        Ok(())
    }

    /// re-derives `dims` after the backend changed shape
    pub(crate) fn sync_dims(&mut self) {
        let (points, features) = self.backend.shape();
        self.dims[0] = points;
        if self.dims.len() == 2 {
            self.dims[1] = features;
        }
    }

    /// a new object holding `backend` and the given registries, inheriting name and paths
    pub(crate) fn derive(
        &self,
        backend: Backend<T>,
        point_names: NameRegistry,
        feature_names: NameRegistry,
    ) -> Self {
        let (points, features) = backend.shape();
        let dims = if self.dims.len() > 2 && features == self.feature_count() {
            let mut dims = self.dims.clone();
            dims[0] = points;
            dims
        } else {
            vec![points, features]
        };
        Self {
            dims,
            point_names,
            feature_names,
            name: self.name.clone(),
            paths: self.paths.clone(),
            backend,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{backend::tests::get_test_array, error::Error};

    /// 4 points (`p0..p3`) by 3 features (`a`, `b`, `c`)
    pub(crate) fn get_test_base(kind: BackendKind) -> Base<f64> {
        Base::from_array(get_test_array(), kind)
            .with_point_names(["p0", "p1", "p2", "p3"])
            .unwrap()
            .with_feature_names(["a", "b", "c"])
            .unwrap()
    }

    pub(crate) const KINDS: [BackendKind; 2] = [BackendKind::Dense, BackendKind::Sparse];

    #[test]
    fn test_construction() {
        for kind in KINDS {
            let base = Base::from_rows(vec![vec![1., 2.], vec![3., 4.], vec![5., 6.]], kind)
                .unwrap()
                .with_name("t");
            assert_eq!(base.shape(), (3, 2));
            assert_eq!(base.dimensions(), [3, 2]);
            assert_eq!(base.kind(), kind);
            assert_eq!(base.name(), Some("t"));
            assert_eq!(base.get(2, 1).unwrap(), 6.);
            assert_eq!(base.get(-1, -2).unwrap(), 5.);
            assert!(matches!(
                Base::from_rows(vec![vec![1., 2.], vec![3.]], kind),
                Err(Error::ShapeMismatch(_))
            ));
            assert_eq!(Base::<f64>::from_rows(vec![], kind).unwrap().shape(), (0, 0));
        }
        let sparse = Base::from_triplets((3, 3), vec![1., 2.], vec![0, 2], vec![2, 0]).unwrap();
        assert_eq!(sparse.kind(), BackendKind::Sparse);
        assert_eq!(sparse.get(2, 0).unwrap(), 2.);
        assert_eq!(sparse.get(1, 1).unwrap(), 0.);
    }

    #[test]
    fn test_names() {
        let base = get_test_base(BackendKind::Dense);
        assert_eq!(base.get("p2", "a").unwrap(), 7.);
        assert!(base.get("p2", "z").is_err());
        assert!(matches!(
            Base::<f64>::zeros((2, 2), BackendKind::Dense).with_point_names(["a", "a"]),
            Err(Error::NameConflict(_))
        ));
        assert!(matches!(
            Base::<f64>::zeros((2, 2), BackendKind::Dense).with_feature_names(["a"]),
            Err(Error::ArgumentValue(_))
        ));
    }

    #[test]
    fn test_set() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            base.set("p1", "b", 4.).unwrap();
            base.set(0, 0, 0.).unwrap();
            assert_eq!(base.get(1, 1).unwrap(), 4.);
            assert_eq!(base.get(0, 0).unwrap(), 0.);
            assert!(base.set(4, 0, 1.).is_err());
        }
    }

    #[test]
    fn test_dimensions() {
        let values = (0..12).map(|v| v as f64).collect();
        let mut base = Base::from_dimensions(vec![2, 3, 2], values, BackendKind::Dense).unwrap();
        assert_eq!(base.shape(), (2, 6));
        assert_eq!(base.dimensions(), [2, 3, 2]);
        assert!(matches!(base.ensure_2d("transpose"), Err(Error::ImproperAction(_))));
        assert!(matches!(
            Base::<f64>::from_dimensions(vec![2, 3, 2], vec![0.; 5], BackendKind::Dense),
            Err(Error::ShapeMismatch(_))
        ));
        base.collapse_dimensions();
        assert_eq!(base.dimensions(), [2, 6]);
        assert!(base.ensure_2d("transpose").is_ok());
    }
}
