use super::{AxisKind, BackendKind, JoinPlan, Rect, Replacement, Storage};
use crate::toolkit::array::{map, same_value, zip_map, AFloat};
use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis, Slice};

/// a contiguous point-major array where every cell is meaningful
#[derive(Debug, Clone, PartialEq)]
pub struct DenseStorage<T: AFloat> {
    values: Array2<T>,
}

fn repeat_order(len: usize, copies: usize, by_value: bool) -> Vec<usize> {
    if by_value {
        (0..len).flat_map(|i| std::iter::repeat(i).take(copies)).collect()
    } else {
        (0..copies).flat_map(|_| 0..len).collect()
    }
}

fn complement(len: usize, positions: &[usize]) -> Vec<usize> {
    let mut removed = vec![false; len];
    positions.iter().for_each(|&p| removed[p] = true);
    (0..len).filter(|&p| !removed[p]).collect()
}

impl<T: AFloat> DenseStorage<T> {
    #[inline]
    pub fn array(&self) -> &Array2<T> {
        &self.values
    }
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.values.view()
    }
    pub(crate) fn array_mut(&mut self) -> &mut Array2<T> {
        &mut self.values
    }
    pub fn into_array(self) -> Array2<T> {
        self.values
    }
    pub(crate) fn set(&mut self, point: usize, feature: usize, value: T) {
        self.values[[point, feature]] = value;
    }

    pub(crate) fn join(&self, right: &Self, plan: &JoinPlan) -> Self {
        let values = Array2::from_shape_fn(plan.shape(), |(i, j)| {
            let (lp, rp) = plan.rows[i];
            let (lf, rf) = plan.columns[j];
            let left = lp.zip(lf).map(|(p, f)| self.values[[p, f]]);
            let right = rp.zip(rf).map(|(p, f)| right.values[[p, f]]);
            JoinPlan::cell(left, right)
        });
        Self { values }
    }
}

impl<T: AFloat> Storage<T> for DenseStorage<T> {
    const KIND: BackendKind = BackendKind::Dense;

    fn from_array(values: Array2<T>) -> Self {
        let values = if values.is_standard_layout() {
            values
        } else {
            values.as_standard_layout().into_owned()
        };
        Self { values }
    }

    fn from_vectors(axis: AxisKind, vectors: Vec<Vec<T>>, off_len: usize) -> Self {
        let len = vectors.len();
        let values = match axis {
            AxisKind::Point => Array2::from_shape_fn((len, off_len), |(i, j)| vectors[i][j]),
            AxisKind::Feature => Array2::from_shape_fn((off_len, len), |(i, j)| vectors[j][i]),
        };
        Self { values }
    }

    fn to_array(&self) -> Array2<T> {
        self.values.clone()
    }

    fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    #[inline]
    fn get(&self, point: usize, feature: usize) -> T {
        self.values[[point, feature]]
    }

    fn vector(&self, axis: AxisKind, position: usize) -> Vec<T> {
        self.values.index_axis(axis.ndarray(), position).to_vec()
    }

    fn take(&self, axis: AxisKind, positions: &[usize]) -> Self {
        Self {
            values: self.values.select(axis.ndarray(), positions),
        }
    }

    fn split_off(&mut self, axis: AxisKind, positions: &[usize]) -> Self {
        let len = self.values.len_of(axis.ndarray());
        let taken = self.take(axis, positions);
        let kept = complement(len, positions);
        self.values = self.values.select(axis.ndarray(), &kept);
        taken
    }

    fn permute(&mut self, axis: AxisKind, order: &[usize]) {
        self.values = self.values.select(axis.ndarray(), order);
    }

    fn transform(&mut self, axis: AxisKind, updates: Vec<(usize, Vec<T>)>) {
        for (position, vector) in updates {
            self.values
                .index_axis_mut(axis.ndarray(), position)
                .assign(&ArrayView1::from(&vector));
        }
    }

    fn insert(&mut self, axis: AxisKind, before: usize, other: &Self) {
        let ax = axis.ndarray();
        let (rows, cols) = self.shape();
        let added = other.values.len_of(ax);
        let shape = match axis {
            AxisKind::Point => (rows + added, cols),
            AxisKind::Feature => (rows, cols + added),
        };
        let len = self.values.len_of(ax);
        let mut out = Array2::<T>::zeros(shape);
        out.slice_axis_mut(ax, Slice::from(0..before))
            .assign(&self.values.slice_axis(ax, Slice::from(0..before)));
        out.slice_axis_mut(ax, Slice::from(before..before + added))
            .assign(&other.values);
        out.slice_axis_mut(ax, Slice::from(before + added..len + added))
            .assign(&self.values.slice_axis(ax, Slice::from(before..len)));
        self.values = out;
    }

    fn repeat(&self, axis: AxisKind, copies: usize, by_value: bool) -> Self {
        let len = self.values.len_of(axis.ndarray());
        self.take(axis, &repeat_order(len, copies, by_value))
    }

    fn transpose(&mut self) {
        self.values = self.values.t().as_standard_layout().into_owned();
    }

    fn window(&self, rect: Rect) -> Self {
        let values = self.values.slice(s![
            rect.point_start..rect.point_end,
            rect.feature_start..rect.feature_end
        ]);
        Self {
            values: values.to_owned(),
        }
    }

    fn replace_rectangle(&mut self, rect: Rect, with: Replacement<'_, T, Self>) {
        let mut target = self.values.slice_mut(s![
            rect.point_start..rect.point_end,
            rect.feature_start..rect.feature_end
        ]);
        match with {
            Replacement::Constant(value) => target.fill(value),
            Replacement::Values(other) => target.assign(&other.values),
        }
    }

    fn map_elements(
        &mut self,
        points: &[usize],
        features: &[usize],
        skip_zeros: bool,
        f: &mut dyn FnMut(T, usize, usize) -> T,
    ) {
        for &i in points {
            for &j in features {
                let value = self.values[[i, j]];
                if skip_zeros && value == T::zero() {
                    continue;
                }
                self.values[[i, j]] = f(value, i, j);
            }
        }
    }

    fn one_hot(&mut self, feature: usize, categories: &[T]) {
        let column = self.values.column(feature).to_owned();
        let expanded = Array2::from_shape_fn((column.len(), categories.len()), |(i, k)| {
            if same_value(column[i], categories[k]) {
                T::one()
            } else {
                T::zero()
            }
        });
        self.split_feature(feature, &expanded);
    }

    fn split_feature(&mut self, feature: usize, parts: &Array2<T>) {
        let kept = complement(self.values.ncols(), &[feature]);
        self.values = self.values.select(Axis(1), &kept);
        self.insert(
            AxisKind::Feature,
            feature,
            &Self {
                values: parts.clone(),
            },
        );
    }

    fn combine(&self, other: &Self, f: &(dyn Fn(T, T) -> T + Send + Sync)) -> Self {
        Self {
            values: zip_map(self.values.view(), other.values.view(), f),
        }
    }

    fn map(&self, f: &(dyn Fn(T) -> T + Send + Sync)) -> Self {
        Self {
            values: map(self.values.view(), f),
        }
    }

    fn contains_zero(&self) -> bool {
        self.values.iter().any(|&v| v == T::zero())
    }

    fn equals(&self, other: &Self) -> bool {
        self.values.dim() == other.values.dim()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(&a, &b)| same_value(a, b))
    }
}
