use super::Base;
use crate::{
    backend::{AxisKind, Rect},
    error::{bail, ensure, Result},
    names::{Identifier, NameRegistry},
    toolkit::array::{cmp_missing_last, value_key, AFloat},
};
use itertools::Itertools;
use ndarray::Array2;
use std::collections::{hash_map::Entry, HashMap};
use tracing::debug;

impl<T: AFloat> Base<T> {
    /// resolves `ids` along `axis`, `None` meaning every position
    pub(crate) fn resolve_positions(
        &self,
        axis: AxisKind,
        ids: Option<&[Identifier]>,
    ) -> Result<Vec<usize>> {
        let registry = self.registry(axis);
        let Some(ids) = ids else {
            return Ok((0..registry.len()).collect());
        };
        let positions = ids
            .iter()
            .map(|id| registry.index_of(id))
            .collect::<Result<Vec<_>>>()?;
        if let Some(duplicate) = positions.iter().duplicates().next() {
            bail!(
                ArgumentValue,
                "{axis} {duplicate} is selected more than once"
            );
        }
        Ok(positions)
    }

    fn rectangle_start(
        &self,
        point: impl Into<Identifier>,
        feature: impl Into<Identifier>,
    ) -> Result<(usize, usize)> {
        Ok((
            self.point_names.index_of(&point.into())?,
            self.feature_names.index_of(&feature.into())?,
        ))
    }

    /// overwrites the block starting at (`point_start`, `feature_start`) with `values`
    pub fn replace_rectangle(
        &mut self,
        values: &Base<T>,
        point_start: impl Into<Identifier>,
        feature_start: impl Into<Identifier>,
    ) -> Result<()> {
        self.ensure_2d("replace_rectangle")?;
        let (p0, f0) = self.rectangle_start(point_start, feature_start)?;
        let (rows, cols) = values.shape();
        ensure!(
            rows > 0 && cols > 0,
            ArgumentValue,
            "the replacement values are empty"
        );
        ensure!(
            p0 + rows <= self.point_count() && f0 + cols <= self.feature_count(),
            ArgumentValue,
            "a {rows}x{cols} block starting at ({p0}, {f0}) does not fit in shape {:?}",
            self.shape()
        );
        let rect = Rect::new((p0, p0 + rows), (f0, f0 + cols));
        debug!(?rect, "replacing rectangle");
        self.backend.replace_rectangle(rect, &values.backend);
        Ok(())
    }

    /// sets every element between the two corners (both inclusive) to `value`
    pub fn fill_rectangle(
        &mut self,
        value: T,
        start: (impl Into<Identifier>, impl Into<Identifier>),
        end: (impl Into<Identifier>, impl Into<Identifier>),
    ) -> Result<()> {
        self.ensure_2d("fill_rectangle")?;
        let (p0, f0) = self.rectangle_start(start.0, start.1)?;
        let (p1, f1) = self.rectangle_start(end.0, end.1)?;
        ensure!(
            p0 <= p1 && f0 <= f1,
            ArgumentValue,
            "the start ({p0}, {f0}) lies after the end ({p1}, {f1})"
        );
        let rect = Rect::new((p0, p1 + 1), (f0, f1 + 1));
        debug!(?rect, "filling rectangle");
        self.backend.fill_rectangle(rect, value);
        Ok(())
    }

    /// applies `f` to the selected elements in place; zeros are skipped when
    /// `preserve_zeros` is set
    pub fn transform_elements(
        &mut self,
        mut f: impl FnMut(T) -> T,
        points: Option<&[Identifier]>,
        features: Option<&[Identifier]>,
        preserve_zeros: bool,
    ) -> Result<()> {
        self.ensure_2d("transform_elements")?;
        let points = self.resolve_positions(AxisKind::Point, points)?;
        let features = self.resolve_positions(AxisKind::Feature, features)?;
        self.backend
            .map_elements(&points, &features, preserve_zeros, &mut |v, _, _| f(v));
        Ok(())
    }

    /// a new object holding `f` of the selected elements
    pub fn calculate_on_elements(
        &self,
        mut f: impl FnMut(T) -> T,
        points: Option<&[Identifier]>,
        features: Option<&[Identifier]>,
        preserve_zeros: bool,
    ) -> Result<Base<T>> {
        self.ensure_2d("calculate_on_elements")?;
        let points = self.resolve_positions(AxisKind::Point, points)?;
        let features = self.resolve_positions(AxisKind::Feature, features)?;
        let mut backend = self
            .backend
            .take(AxisKind::Point, &points)
            .take(AxisKind::Feature, &features);
        let all_points = (0..points.len()).collect_vec();
        let all_features = (0..features.len()).collect_vec();
        backend.map_elements(&all_points, &all_features, preserve_zeros, &mut |v, _, _| f(v));
        Ok(self.derive(
            backend,
            self.point_names.select(&points),
            self.feature_names.select(&features),
        ))
    }

    pub fn count_elements(&self, predicate: impl Fn(T) -> bool) -> usize {
        self.backend.values().into_iter().filter(|&v| predicate(v)).count()
    }

    /// every distinct value with its number of occurrences, in ascending order (missing
    /// values last)
    pub fn count_unique_elements(&self) -> Vec<(T, usize)> {
        unique_counts(self.backend.values())
    }

    /// replaces `feature` with one 0/1 feature per distinct value it holds, named
    /// `<feature>=<value>`; returns the new feature names
    pub fn replace_feature_with_binary_features(
        &mut self,
        feature: impl Into<Identifier>,
    ) -> Result<Vec<String>> {
        self.ensure_2d("replace_feature_with_binary_features")?;
        ensure!(
            self.point_count() > 0,
            ImproperAction,
            "this action is impossible, the object has 0 points"
        );
        let index = self.feature_names.index_of(&feature.into())?;
        let categories = unique_counts(self.backend.vector(AxisKind::Feature, index))
            .into_iter()
            .map(|(value, _)| value)
            .collect_vec();
        let prefix = match self.feature_names.names_if_created() {
            Some(names) => names[index].clone(),
            None => index.to_string(),
        };
        let names = categories
            .iter()
            .map(|value| format!("{prefix}={value}"))
            .collect_vec();
        for name in &names {
            if let Some(existing) = self.feature_names.lookup(name) {
                ensure!(
                    existing == index,
                    NameConflict,
                    "the feature name '{name}' already exists at position {existing}"
                );
            }
        }
        let incoming = NameRegistry::from_names(names.iter().cloned().map(Some).collect())?;
        debug!(index, categories = categories.len(), "one-hot encoding feature");
        self.backend.one_hot(index, &categories);
        self.feature_names.remove(&[index]);
        self.feature_names.insert(index, &incoming);
        self.sync_dims();
        Ok(names)
    }

    /// replaces `feature` with `resulting_names.len()` features holding the parts `rule`
    /// splits each of its values into
    pub fn split_feature_by_parsing<S: AsRef<str>>(
        &mut self,
        feature: impl Into<Identifier>,
        rule: impl Fn(T) -> Vec<T>,
        resulting_names: &[S],
    ) -> Result<()> {
        self.ensure_2d("split_feature_by_parsing")?;
        let index = self.feature_names.index_of(&feature.into())?;
        let width = resulting_names.len();
        ensure!(width > 0, ArgumentValue, "resulting_names is empty");
        let column = self.backend.vector(AxisKind::Feature, index);
        let mut parts = Array2::zeros((column.len(), width));
        for (i, value) in column.into_iter().enumerate() {
            let split = rule(value);
            ensure!(
                split.len() == width,
                ArgumentValue,
                "the value at index {i} split into {} values, but resulting_names contains {width} features",
                split.len()
            );
            parts
                .row_mut(i)
                .iter_mut()
                .zip(split)
                .for_each(|(cell, part)| *cell = part);
        }
        let names = resulting_names
            .iter()
            .map(|name| name.as_ref().to_string())
            .collect_vec();
        for name in &names {
            if let Some(existing) = self.feature_names.lookup(name) {
                ensure!(
                    existing == index,
                    NameConflict,
                    "the feature name '{name}' already exists at position {existing}"
                );
            }
        }
        let incoming = NameRegistry::from_names(names.into_iter().map(Some).collect())?;
        debug!(index, width, "splitting feature");
        self.backend.split_feature(index, &parts);
        self.feature_names.remove(&[index]);
        self.feature_names.insert(index, &incoming);
        self.sync_dims();
        Ok(())
    }

    /// replaces the values of `feature` by integer codes and returns `(code, value)` pairs.
    ///
    /// `0` always maps to `0`; the other values get codes in first-seen order, starting
    /// at `1` when the feature holds a zero and at `0` otherwise.
    pub fn transform_feature_to_integers(
        &mut self,
        feature: impl Into<Identifier>,
    ) -> Result<Vec<(usize, T)>> {
        self.ensure_2d("transform_feature_to_integers")?;
        ensure!(
            self.point_count() > 0,
            ImproperAction,
            "this action is impossible, the object has 0 points"
        );
        let index = self.feature_names.index_of(&feature.into())?;
        let column = self.backend.vector(AxisKind::Feature, index);
        let zero = T::zero();
        let has_zero = column.iter().any(|&v| v == zero);
        let mut mapping = Vec::new();
        if has_zero {
            mapping.push((0, zero));
        }
        let mut codes: HashMap<u64, usize> = HashMap::new();
        let encoded = column
            .into_iter()
            .map(|v| {
                if v == zero {
                    return zero;
                }
                let code = match codes.entry(value_key(v)) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        let code = mapping.len();
                        mapping.push((code, v));
                        *entry.insert(code)
                    }
                };
                T::from_usize(code).unwrap_or_else(T::nan)
            })
            .collect();
        self.backend.transform(AxisKind::Feature, vec![(index, encoded)]);
        Ok(mapping)
    }
}

fn unique_counts<T: AFloat>(values: Vec<T>) -> Vec<(T, usize)> {
    let mut counts: HashMap<u64, (T, usize)> = HashMap::new();
    for v in values {
        counts.entry(value_key(v)).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .sorted_by(|&(a, _), &(b, _)| cmp_missing_last(a, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::BackendKind,
        base::tests::{get_test_base, KINDS},
        error::Error,
    };

    #[test]
    fn test_rectangles() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            let block = Base::from_rows(vec![vec![-1., -2.], vec![-3., 0.]], BackendKind::Dense)
                .unwrap();
            base.replace_rectangle(&block, "p1", "b").unwrap();
            assert_eq!(base.to_rows()[1], vec![0., -1., -2.]);
            assert_eq!(base.to_rows()[2], vec![7., -3., 0.]);
            assert!(matches!(
                base.replace_rectangle(&block, "p3", 0),
                Err(Error::ArgumentValue(_))
            ));
            base.fill_rectangle(5., (0, 0), ("p1", "a")).unwrap();
            assert_eq!(base.get(1, 0).unwrap(), 5.);
            base.fill_rectangle(0., (2, 1), (3, 2)).unwrap();
            assert_eq!(base.to_rows()[3], vec![0., 0., 0.]);
            assert!(matches!(
                base.fill_rectangle(1., (2, 0), (1, 0)),
                Err(Error::ArgumentValue(_))
            ));
        }
    }

    #[test]
    fn test_transform_elements() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            base.transform_elements(|v| v + 1., None, Some(&[Identifier::from("c")]), true)
                .unwrap();
            assert_eq!(base.features().vector_values("c").unwrap(), vec![4., 7., 0., 13.]);
            base.transform_elements(|v| v * 10., Some(&[Identifier::from(0)]), None, false)
                .unwrap();
            assert_eq!(base.to_rows()[0], vec![10., 0., 40.]);
            let duplicated = [Identifier::from(0), Identifier::from("p0")];
            assert!(base
                .transform_elements(|v| v, Some(&duplicated), None, false)
                .is_err());
        }
    }

    #[test]
    fn test_calculate_on_elements() {
        for kind in KINDS {
            let base = get_test_base(kind);
            let points = [Identifier::from("p3"), Identifier::from("p0")];
            let out = base
                .calculate_on_elements(|v| v - 1., Some(&points), None, true)
                .unwrap();
            assert_eq!(out.shape(), (2, 3));
            assert_eq!(out.to_rows(), vec![vec![0., 10., 11.], vec![0., 0., 2.]]);
            assert_eq!(out.points().names(), ["p3", "p0"]);
            assert_eq!(out.features().names(), ["a", "b", "c"]);
        }
    }

    #[test]
    fn test_counts() {
        let base = get_test_base(BackendKind::Sparse);
        assert_eq!(base.count_elements(|v| v > 5.), 4);
        let unique = base.count_unique_elements();
        assert_eq!(unique.len(), 8);
        assert_eq!(unique[0], (0., 5));
        assert!(unique[7].0.is_nan());
    }

    #[test]
    fn test_binary_features() {
        for kind in KINDS {
            let mut base = Base::from_rows(
                vec![vec![1., 3., 9.], vec![2., 0., 8.], vec![3., 3., 7.]],
                kind,
            )
            .unwrap()
            .with_feature_names(["x", "cat", "y"])
            .unwrap();
            let names = base.replace_feature_with_binary_features("cat").unwrap();
            assert_eq!(names, ["cat=0", "cat=3"]);
            assert_eq!(base.features().names(), ["x", "cat=0", "cat=3", "y"]);
            assert_eq!(
                base.to_rows(),
                vec![
                    vec![1., 0., 1., 9.],
                    vec![2., 1., 0., 8.],
                    vec![3., 0., 1., 7.]
                ]
            );
            assert_eq!(base.dimensions(), [3, 4]);
        }
        let mut empty = Base::<f64>::zeros((0, 2), BackendKind::Dense);
        assert!(matches!(
            empty.replace_feature_with_binary_features(0),
            Err(Error::ImproperAction(_))
        ));
    }

    #[test]
    fn test_split_by_parsing() {
        let digits = |v: f64| vec![(v / 100.).floor(), v % 100.];
        for kind in KINDS {
            let mut base = Base::from_rows(
                vec![vec![932., 44.], vec![734., 11.], vec![0., 1.], vec![805., 2.]],
                kind,
            )
            .unwrap()
            .with_feature_names(["product", "quantity"])
            .unwrap();
            base.split_feature_by_parsing("product", digits, &["category", "id"])
                .unwrap();
            assert_eq!(base.features().names(), ["category", "id", "quantity"]);
            assert_eq!(
                base.to_rows(),
                vec![
                    vec![9., 32., 44.],
                    vec![7., 34., 11.],
                    vec![0., 0., 1.],
                    vec![8., 5., 2.]
                ]
            );
            assert_eq!(base.dimensions(), [4, 3]);

            let mut base = get_test_base(kind);
            base.split_feature_by_parsing("c", |v| vec![v, -v, 0.], &["c", "neg", "zero"])
                .unwrap();
            assert_eq!(base.features().names(), ["a", "b", "c", "neg", "zero"]);
            assert_eq!(base.points().vector_values("p3").unwrap(), vec![0., 11., 12., -12., 0.]);
        }
    }

    #[test]
    fn test_split_by_parsing_errors() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            assert!(matches!(
                base.split_feature_by_parsing("a", |v| vec![v], &["x", "y"]),
                Err(Error::ArgumentValue(_))
            ));
            assert!(matches!(
                base.split_feature_by_parsing("a", |v| vec![v, v], &["x", "b"]),
                Err(Error::NameConflict(_))
            ));
            assert!(matches!(
                base.split_feature_by_parsing("a", |_: f64| vec![], &[] as &[&str]),
                Err(Error::ArgumentValue(_))
            ));
            assert!(base
                .split_feature_by_parsing("missing", |v| vec![v], &["x"])
                .is_err());
            assert_eq!(base.features().names(), ["a", "b", "c"]);
            assert_eq!(base.shape(), (4, 3));
        }
    }

    #[test]
    fn test_feature_to_integers() {
        for kind in KINDS {
            let mut base = Base::from_rows(
                vec![vec![5.], vec![7.], vec![0.], vec![5.], vec![2.]],
                kind,
            )
            .unwrap();
            let mapping = base.transform_feature_to_integers(0).unwrap();
            assert_eq!(mapping, vec![(0, 0.), (1, 5.), (2, 7.), (3, 2.)]);
            assert_eq!(
                base.features().vector_values(0).unwrap(),
                vec![1., 2., 0., 1., 3.]
            );

            let mut base = Base::from_rows(vec![vec![5.], vec![7.], vec![5.]], kind).unwrap();
            let mapping = base.transform_feature_to_integers(0).unwrap();
            assert_eq!(mapping, vec![(0, 5.), (1, 7.)]);
            assert_eq!(base.features().vector_values(0).unwrap(), vec![0., 1., 0.]);
        }
    }
}
