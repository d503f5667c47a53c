use super::{Axis, AxisMut};
use crate::{
    error::{bail, ensure, Result},
    names::Identifier,
    toolkit::array::{cmp_missing_last, AFloat},
    view::View,
};
use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{cmp::Ordering, fmt};
use tracing::debug;

pub type Scorer<'f, T> = Box<dyn Fn(&View<'_, T>) -> T + 'f>;
pub type Comparator<'f, T> = Box<dyn Fn(&View<'_, T>, &View<'_, T>) -> Ordering + 'f>;

/// how to order an axis; every variant sorts stably
pub enum SortBy<'f, T: AFloat> {
    /// ascending values of one off-axis vector, missing values last
    Identifier(Identifier),
    /// ascending scores, missing scores last
    Scorer(Scorer<'f, T>),
    Comparator(Comparator<'f, T>),
    /// the new order, as a full permutation of the axis
    Permutation(Vec<Identifier>),
}

impl<T: AFloat> fmt::Debug for SortBy<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
            Self::Scorer(_) => write!(f, "Scorer(..)"),
            Self::Comparator(_) => write!(f, "Comparator(..)"),
            Self::Permutation(ids) => f.debug_tuple("Permutation").field(ids).finish(),
        }
    }
}

impl<'f, T: AFloat> SortBy<'f, T> {
    pub fn scorer(f: impl Fn(&View<'_, T>) -> T + 'f) -> Self {
        Self::Scorer(Box::new(f))
    }
    pub fn comparator(f: impl Fn(&View<'_, T>, &View<'_, T>) -> Ordering + 'f) -> Self {
        Self::Comparator(Box::new(f))
    }
}

fn ascending<T: AFloat>(keys: &[T]) -> Vec<usize> {
    (0..keys.len())
        .sorted_by(|&a, &b| cmp_missing_last(keys[a], keys[b]))
        .collect()
}

impl<T: AFloat> Axis<'_, T> {
    /// the positions in their sorted order
    pub fn sorted_order(&self, by: &SortBy<'_, T>) -> Result<Vec<usize>> {
        let order = match by {
            SortBy::Identifier(id) => {
                let across = self.kind.other();
                let position = self.base.registry(across).index_of(id)?;
                ascending(&self.base.backend.vector(across, position))
            }
            SortBy::Scorer(scorer) => {
                let scores: Vec<T> = self.iter().map(|view| scorer(&view)).collect();
                ascending(&scores)
            }
            SortBy::Comparator(comparator) => {
                let views: Vec<View<'_, T>> = self.iter().collect();
                (0..views.len())
                    .sorted_by(|&a, &b| comparator(&views[a], &views[b]))
                    .collect()
            }
            SortBy::Permutation(ids) => {
                ensure!(
                    ids.len() == self.len(),
                    ArgumentValue,
                    "a permutation of {} {}s was given for an axis of length {}",
                    ids.len(),
                    self.kind,
                    self.len()
                );
                let order = ids
                    .iter()
                    .map(|id| self.registry().index_of(id))
                    .collect::<Result<Vec<_>>>()?;
                if let Some(duplicate) = order.iter().duplicates().next() {
                    bail!(
                        ArgumentValue,
                        "{} {duplicate} appears more than once in the permutation",
                        self.kind
                    );
                }
                order
            }
        };
        Ok(order)
    }
}

impl<T: AFloat> AxisMut<'_, T> {
    pub fn sort(&mut self, by: SortBy<'_, T>) -> Result<()> {
        self.as_axis().ensure_editable("sorting features")?;
        let order = self.as_axis().sorted_order(&by)?;
        self.reorder(&order);
        Ok(())
    }

    /// moves `order[i]` to position `i`
    pub fn permute<I: Into<Identifier>>(&mut self, order: impl IntoIterator<Item = I>) -> Result<()> {
        self.sort(SortBy::Permutation(order.into_iter().map(Into::into).collect()))
    }

    /// a seeded random reordering
    pub fn shuffle(&mut self, seed: u64) -> Result<()> {
        self.as_axis().ensure_editable("shuffling features")?;
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        self.reorder(&order);
        Ok(())
    }

    fn reorder(&mut self, order: &[usize]) {
        let kind = self.kind;
        self.base.backend.permute(kind, order);
        self.base.registry_mut(kind).permute(order);
        debug!(axis = %kind, len = order.len(), "reordered");
    }
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
    fn test_sort_by_vector() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            base.points_mut()
                .sort(SortBy::Identifier("b".into()))
                .unwrap();
            assert_eq!(base.points().names(), ["p0", "p1", "p3", "p2"]);
            assert_eq!(base.features().vector_values("a").unwrap(), [1., 0., 0., 7.]);
            base.features_mut()
                .sort(SortBy::Identifier("p3".into()))
                .unwrap();
            assert_eq!(base.features().names(), ["a", "b", "c"]);
        }
    }

    #[test]
    fn test_sort_by_functions() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            base.points_mut()
                .sort(SortBy::<f64>::scorer(|view| -view.named("c").unwrap()))
                .unwrap();
            assert_eq!(base.points().names(), ["p3", "p1", "p0", "p2"]);
            base.features_mut()
                .sort(SortBy::comparator(|l, r| {
                    r.feature_names()[0].cmp(&l.feature_names()[0])
                }))
                .unwrap();
            assert_eq!(base.features().names(), ["c", "b", "a"]);
            assert_eq!(base.points().vector_values("p3").unwrap(), [12., 11., 0.]);
        }
    }

    #[test]
    fn test_permute_and_shuffle() {
        let mut base = get_test_base(BackendKind::Dense);
        base.points_mut().permute(["p2", "p3", "p0", "p1"]).unwrap();
        assert_eq!(base.features().vector_values("c").unwrap(), [0., 12., 3., 6.]);
        assert!(matches!(
            base.points_mut().permute([0, 0, 1, 2]),
            Err(Error::ArgumentValue(_))
        ));
        assert!(matches!(
            base.points_mut().permute([0, 1]),
            Err(Error::ArgumentValue(_))
        ));

        let mut left = get_test_base(BackendKind::Dense);
        let mut right = get_test_base(BackendKind::Sparse);
        left.points_mut().shuffle(7).unwrap();
        right.points_mut().shuffle(7).unwrap();
        assert!(left.is_identical(&right));
        let mut names = left.points().names().to_vec();
        names.sort();
        assert_eq!(names, ["p0", "p1", "p2", "p3"]);
    }
}
