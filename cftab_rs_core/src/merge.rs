//! # merge
//!
//! joins another object into this one, along points and features at once.
//!
//! # Design
//!
//! Both axes are paired the same way: every left position gets the (possibly empty) list
//! of right positions it matches. Points match by name, by the value of a join feature or,
//! for forced strict merges, by position. Features match by shared user names. A policy
//! then turns each pairing into the `(left, right)` sources of the output positions, and
//! the backend emits the result from that [`JoinPlan`] in a single pass. Every check
//! runs before the plan is built, so a failed merge leaves the object untouched.

use crate::{
    backend::{AxisKind, JoinPlan},
    base::Base,
    error::{bail, ensure, Result},
    names::{is_default_name, Identifier, NameRegistry},
    toolkit::array::{value_key, AFloat},
};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// both objects hold the same positions, possibly reordered
    Strict,
    Left,
    Union,
    Intersection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub point: MergePolicy,
    pub feature: MergePolicy,
    /// the feature whose values identify points; point names are used when absent
    pub on_feature: Option<Identifier>,
    /// lets a strict merge pair positions by index when default names are present
    pub force: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new(MergePolicy::Strict, MergePolicy::Union)
    }
}

impl MergeOptions {
    pub fn new(point: MergePolicy, feature: MergePolicy) -> Self {
        Self {
            point,
            feature,
            on_feature: None,
            force: false,
        }
    }
    pub fn on_feature(mut self, feature: impl Into<Identifier>) -> Self {
        self.on_feature = Some(feature.into());
        self
    }
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// how the positions of one axis pair up between the two objects
#[derive(Debug)]
struct Pairing {
    /// the matched right positions of every left position
    matches: Vec<Vec<usize>>,
    /// output names of the left positions, `None` for a default name
    names: Vec<Option<String>>,
    /// output names are discarded in favor of defaults
    reset: bool,
}

impl Pairing {
    /// equal user names match, default names never do
    fn by_names(left: &NameRegistry, right: &NameRegistry) -> Self {
        let names = left.assignment();
        let matches = names
            .iter()
            .map(|name| {
                name.as_deref()
                    .and_then(|name| right.lookup(name))
                    .into_iter()
                    .collect()
            })
            .collect();
        Self {
            matches,
            names,
            reset: false,
        }
    }

    /// equal values match, missing values never do
    fn by_key<T: AFloat>(left: &[T], right: &[T]) -> Self {
        let mut index: HashMap<u64, Vec<usize>> = HashMap::new();
        for (r, &value) in right.iter().enumerate() {
            if !value.is_nan() {
                index.entry(value_key(value)).or_default().push(r);
            }
        }
        let matches = left
            .iter()
            .map(|&value| {
                if value.is_nan() {
                    return vec![];
                }
                index.get(&value_key(value)).cloned().unwrap_or_default()
            })
            .collect();
        Self {
            matches,
            names: vec![None; left.len()],
            reset: true,
        }
    }

    /// strict pairing: the same user names in any order, or (when forced) by position
    fn strict(axis: AxisKind, left: &NameRegistry, right: &NameRegistry, force: bool) -> Result<Self> {
        ensure!(
            left.len() == right.len(),
            ArgumentValue,
            "both objects must have the same number of {axis}s for a strict merge, got {} and {}",
            left.len(),
            right.len()
        );
        if !left.any_default() && !right.any_default() {
            let pairing = Self::by_names(left, right);
            ensure!(
                pairing.matches.iter().all(|m| m.len() == 1),
                ArgumentValue,
                "for a strict merge the {axis} names may be reordered but must match exactly"
            );
            return Ok(pairing);
        }
        ensure!(
            force,
            ArgumentValue,
            "user {axis} names are required in both objects for a strict merge, unless it is forced"
        );
        ensure!(
            left.is_consistent_with(right),
            ArgumentValue,
            "when default {axis} names exist, {axis} names must agree at every position"
        );
        Ok(Self {
            matches: (0..left.len()).map(|i| vec![i]).collect(),
            names: left.merged_with(right),
            reset: false,
        })
    }

    /// the `(left, right)` source of every output position under `policy`
    fn plan(&self, right_len: usize, policy: MergePolicy) -> Vec<(Option<usize>, Option<usize>)> {
        let mut plan = Vec::new();
        for (l, matches) in self.matches.iter().enumerate() {
            if matches.is_empty() {
                if matches!(policy, MergePolicy::Left | MergePolicy::Union) {
                    plan.push((Some(l), None));
                }
            } else {
                plan.extend(matches.iter().map(|&r| (Some(l), Some(r))));
            }
        }
        if policy == MergePolicy::Union {
            let mut matched = vec![false; right_len];
            self.matches.iter().flatten().for_each(|&r| matched[r] = true);
            plan.extend((0..right_len).filter(|&r| !matched[r]).map(|r| (None, Some(r))));
        }
        plan
    }

    fn registry(
        &self,
        plan: &[(Option<usize>, Option<usize>)],
        right: &NameRegistry,
    ) -> Result<NameRegistry> {
        if self.reset {
            return Ok(NameRegistry::new(plan.len()));
        }
        let right = right.assignment();
        let names: Vec<Option<String>> = plan
            .iter()
            .map(|&source| match source {
                (Some(l), _) => self.names[l].clone(),
                (None, Some(r)) => right[r].clone(),
                (None, None) => None,
            })
            .collect();
        if names.iter().all(Option::is_none) {
            return Ok(NameRegistry::new(names.len()));
        }
        NameRegistry::from_names(names)
    }
}

fn user_names_required(axis: AxisKind, left: &NameRegistry, right: &NameRegistry) -> Result<()> {
    let named = |registry: &NameRegistry| registry.is_empty() || !registry.all_default();
    ensure!(
        named(left) && named(right),
        ArgumentValue,
        "{axis} names are required in both objects"
    );
    Ok(())
}

impl<T: AFloat> Base<T> {
    /// the positions of the join feature in both objects
    fn join_key(&self, other: &Base<T>, feature: &Identifier) -> Result<(usize, usize)> {
        match feature {
            Identifier::Name(name) => {
                match (self.feature_names.lookup(name), other.feature_names.lookup(name)) {
                    (Some(l), Some(r)) => Ok((l, r)),
                    _ => bail!(
                        ArgumentValue,
                        "could not locate the feature '{name}' in both objects"
                    ),
                }
            }
            Identifier::Index(_) => {
                let l = self.feature_names.index_of(feature)?;
                let r = other.feature_names.index_of(feature)?;
                let name = self.feature_names.name(l)?;
                ensure!(
                    !is_default_name(name) && other.feature_names.name(r)? == name,
                    ArgumentValue,
                    "the feature names at index {feature} do not match in both objects"
                );
                Ok((l, r))
            }
        }
    }

    fn point_pairing(&self, other: &Base<T>, options: &MergeOptions) -> Result<Pairing> {
        let key = match &options.on_feature {
            Some(feature) => Some(self.join_key(other, feature)?),
            None => None,
        };
        let Some((l, r)) = key else {
            if options.point == MergePolicy::Strict {
                return Pairing::strict(
                    AxisKind::Point,
                    &self.point_names,
                    &other.point_names,
                    options.force,
                );
            }
            user_names_required(AxisKind::Point, &self.point_names, &other.point_names)?;
            return Ok(Pairing::by_names(&self.point_names, &other.point_names));
        };
        let left = self.backend.vector(AxisKind::Feature, l);
        let right = other.backend.vector(AxisKind::Feature, r);
        let unique = |values: &[T]| values.iter().map(|&v| value_key(v)).all_unique();
        if options.point == MergePolicy::Strict {
            ensure!(
                left.len() == right.len(),
                ArgumentValue,
                "both objects must have the same number of points for a strict merge, got {} and {}",
                left.len(),
                right.len()
            );
            ensure!(
                unique(&left),
                ArgumentValue,
                "the join feature must hold unique values for a strict merge"
            );
            let sorted = |values: &[T]| values.iter().map(|&v| value_key(v)).sorted().collect_vec();
            ensure!(
                sorted(&left) == sorted(&right),
                ArgumentValue,
                "the join feature must hold a unique, matching value in each object for a strict merge"
            );
        } else {
            ensure!(
                unique(&left) || unique(&right),
                ArgumentValue,
                "ambiguous join key: the join feature must hold unique values in at least one object"
            );
        }
        Ok(Pairing::by_key(&left, &right))
    }

    /// every matched cell of a shared feature must agree, missing values aside
    fn check_conflicts(&self, other: &Base<T>, points: &Pairing, features: &Pairing) -> Result<()> {
        for (l, rows) in points.matches.iter().enumerate() {
            for &r in rows {
                for (lf, columns) in features.matches.iter().enumerate() {
                    for &rf in columns {
                        let (lv, rv) = (self.backend.get(l, lf), other.backend.get(r, rf));
                        if !lv.is_nan() && !rv.is_nan() && lv != rv {
                            bail!(
                                ArgumentValue,
                                "conflicting values for shared feature '{}': {lv} vs {rv}",
                                self.feature_names.name(lf)?
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// merges `other` into this object
    pub fn merge(&mut self, other: &Base<T>, options: MergeOptions) -> Result<()> {
        ensure!(
            !(options.point == MergePolicy::Strict && options.feature == MergePolicy::Strict),
            ArgumentValue,
            "point and feature cannot both be strict"
        );
        self.ensure_2d("merging")?;
        other.ensure_2d("merging")?;
        let features = match options.feature {
            MergePolicy::Strict => Pairing::strict(
                AxisKind::Feature,
                &self.feature_names,
                &other.feature_names,
                options.force,
            )?,
            _ => {
                user_names_required(AxisKind::Feature, &self.feature_names, &other.feature_names)?;
                Pairing::by_names(&self.feature_names, &other.feature_names)
            }
        };
        let points = self.point_pairing(other, &options)?;
        self.check_conflicts(other, &points, &features)?;

        let policy = |policy| match policy {
            MergePolicy::Strict => MergePolicy::Intersection,
            policy => policy,
        };
        let plan = JoinPlan {
            rows: points.plan(other.point_count(), policy(options.point)),
            columns: features.plan(other.feature_count(), policy(options.feature)),
        };
        let point_names = points.registry(&plan.rows, &other.point_names)?;
        let feature_names = features.registry(&plan.columns, &other.feature_names)?;
        debug!(
            point = ?options.point,
            feature = ?options.feature,
            from = ?self.shape(),
            to = ?plan.shape(),
            "merging"
        );
        self.backend = self.backend.join(&other.backend, &plan);
        self.point_names = point_names;
        self.feature_names = feature_names;
        self.dims = vec![plan.rows.len(), plan.columns.len()];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::BackendKind, base::tests::KINDS, error::Error};

    fn keyed(rows: Vec<Vec<f64>>, features: [&str; 2], kind: BackendKind) -> Base<f64> {
        Base::from_rows(rows, kind)
            .unwrap()
            .with_feature_names(features)
            .unwrap()
    }

    #[test]
    fn test_merge_on_feature() {
        for kind in KINDS {
            let left = keyed(vec![vec![1., 10.], vec![2., 20.], vec![3., 30.]], ["key", "x"], kind);
            let right = keyed(vec![vec![2., -2.], vec![4., -4.]], ["key", "y"], BackendKind::Dense);

            let mut union = left.copy();
            let options = MergeOptions::new(MergePolicy::Union, MergePolicy::Union).on_feature("key");
            union.merge(&right, options).unwrap();
            assert_eq!(union.shape(), (4, 3));
            assert_eq!(union.kind(), kind);
            assert_eq!(union.features().names(), ["key", "x", "y"]);
            assert_eq!(union.features().vector_values("key").unwrap(), [1., 2., 3., 4.]);
            assert_eq!(union.get(1, "y").unwrap(), -2.);
            assert!(union.get(0, "y").unwrap().is_nan());
            assert!(union.get(3, "x").unwrap().is_nan());

            let mut intersection = left.copy();
            let options =
                MergeOptions::new(MergePolicy::Intersection, MergePolicy::Union).on_feature("key");
            intersection.merge(&right, options).unwrap();
            assert_eq!(intersection.shape(), (1, 3));
            assert_eq!(intersection.to_rows(), vec![vec![2., 20., -2.]]);

            let mut shared = left.copy();
            let options =
                MergeOptions::new(MergePolicy::Left, MergePolicy::Intersection).on_feature(0);
            shared.merge(&right, options).unwrap();
            assert_eq!(shared.features().names(), ["key"]);
            assert_eq!(shared.features().vector_values(0).unwrap(), [1., 2., 3.]);
        }
    }

    #[test]
    fn test_merge_on_names() {
        let left = keyed(vec![vec![1., 2.], vec![3., 4.]], ["a", "b"], BackendKind::Sparse)
            .with_point_names(["p", "q"])
            .unwrap();
        let right = keyed(vec![vec![4., 5.], vec![6., 7.]], ["b", "c"], BackendKind::Sparse)
            .with_point_names(["q", "r"])
            .unwrap();
        let mut merged = left.copy();
        merged
            .merge(&right, MergeOptions::new(MergePolicy::Union, MergePolicy::Union))
            .unwrap();
        assert_eq!(merged.points().names(), ["p", "q", "r"]);
        assert_eq!(merged.features().names(), ["a", "b", "c"]);
        assert_eq!(merged.points().vector_values("q").unwrap(), [3., 4., 5.]);
        assert_eq!(merged.get("r", "b").unwrap(), 6.);
        assert!(merged.get("r", "a").unwrap().is_nan());

        let mut merged = left.copy();
        merged
            .merge(&right, MergeOptions::new(MergePolicy::Left, MergePolicy::Left))
            .unwrap();
        assert_eq!(merged.points().names(), ["p", "q"]);
        assert_eq!(merged.features().names(), ["a", "b"]);

        let unnamed = Base::<f64>::zeros((2, 2), BackendKind::Dense)
            .with_feature_names(["a", "b"])
            .unwrap();
        let mut merged = left.copy();
        assert!(matches!(
            merged.merge(&unnamed, MergeOptions::new(MergePolicy::Union, MergePolicy::Union)),
            Err(Error::ArgumentValue(_))
        ));
    }

    #[test]
    fn test_strict() {
        for kind in KINDS {
            let left = keyed(vec![vec![1., 2.], vec![3., 4.], vec![5., 6.]], ["x", "y"], kind)
                .with_point_names(["a", "b", "c"])
                .unwrap();
            let right = keyed(vec![vec![5., 60.], vec![3., 40.], vec![1., 20.]], ["x", "z"], kind)
                .with_point_names(["c", "b", "a"])
                .unwrap();
            let mut merged = left.copy();
            merged.merge(&right, MergeOptions::default()).unwrap();
            assert_eq!(merged.points().names(), ["a", "b", "c"]);
            assert_eq!(merged.features().names(), ["x", "y", "z"]);
            assert_eq!(
                merged.to_rows(),
                vec![vec![1., 2., 20.], vec![3., 4., 40.], vec![5., 6., 60.]]
            );

            let other = right.copy().with_point_names(["a", "b", "d"]).unwrap();
            let mut merged = left.copy();
            assert!(matches!(
                merged.merge(&other, MergeOptions::default()),
                Err(Error::ArgumentValue(_))
            ));
            assert!(merged.is_identical(&left));

            let both = MergeOptions::new(MergePolicy::Strict, MergePolicy::Strict);
            assert!(matches!(
                merged.merge(&right, both),
                Err(Error::ArgumentValue(_))
            ));
        }
    }

    #[test]
    fn test_strict_forced() {
        let left = keyed(vec![vec![1., 2.], vec![3., 4.]], ["x", "y"], BackendKind::Dense);
        let right = keyed(vec![vec![1., 7.], vec![3., 8.]], ["x", "z"], BackendKind::Dense);
        let mut merged = left.copy();
        assert!(matches!(
            merged.merge(&right, MergeOptions::default()),
            Err(Error::ArgumentValue(_))
        ));
        merged
            .merge(&right, MergeOptions::default().force(true))
            .unwrap();
        assert_eq!(merged.to_rows(), vec![vec![1., 2., 7.], vec![3., 4., 8.]]);
        assert!(merged.points().names().iter().all(|n| is_default_name(n)));

        let mut merged = left.copy();
        let options = MergeOptions::new(MergePolicy::Strict, MergePolicy::Left).on_feature("x");
        merged.merge(&right, options).unwrap();
        assert_eq!(merged.to_rows(), vec![vec![1., 2.], vec![3., 4.]]);
        let duplicated = keyed(vec![vec![1., 7.], vec![1., 8.]], ["x", "z"], BackendKind::Dense);
        let options = MergeOptions::new(MergePolicy::Strict, MergePolicy::Left).on_feature("x");
        assert!(matches!(
            merged.merge(&duplicated, options),
            Err(Error::ArgumentValue(_))
        ));
    }

    #[test]
    fn test_conflicts_and_missing_values() {
        for kind in KINDS {
            let left = keyed(vec![vec![1., f64::NAN], vec![2., 5.]], ["key", "v"], kind);
            let right = keyed(vec![vec![1., 3.], vec![2., 5.]], ["key", "v"], kind);
            let options =
                MergeOptions::new(MergePolicy::Union, MergePolicy::Union).on_feature("key");
            let mut merged = left.copy();
            merged.merge(&right, options.clone()).unwrap();
            assert_eq!(merged.to_rows(), vec![vec![1., 3.], vec![2., 5.]]);

            let clashing = keyed(vec![vec![2., 6.]], ["key", "v"], kind);
            let mut merged = left.copy();
            assert!(matches!(
                merged.merge(&clashing, options.clone()),
                Err(Error::ArgumentValue(_))
            ));
            assert!(merged.is_identical(&left));

            let ambiguous = keyed(vec![vec![1., 0.], vec![1., 0.]], ["key", "w"], kind);
            let mut repeated = ambiguous.copy();
            assert!(matches!(
                repeated.merge(&ambiguous, options.clone()),
                Err(Error::ArgumentValue(_))
            ));
            assert!(matches!(
                merged.merge(&right, options.clone().on_feature("missing")),
                Err(Error::ArgumentValue(_))
            ));
        }
    }
}
