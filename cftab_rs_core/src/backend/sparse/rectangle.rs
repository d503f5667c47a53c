use super::{SortState, SparseStorage};
use crate::{
    backend::{AxisKind, Rect},
    toolkit::array::AFloat,
};
use tracing::trace;

type Entry<T> = (usize, usize, T);

/// destination of the merge-walk: in place while there is room behind the read cursor,
/// in an overflow buffer otherwise
struct Writer<T> {
    write: usize,
    overflow: Vec<Entry<T>>,
}

impl<T: AFloat> Writer<T> {
    #[inline]
    fn emit(&mut self, storage: &mut SparseStorage<T>, read: usize, (r, c, v): Entry<T>) {
        if self.write < read {
            storage.row[self.write] = r;
            storage.col[self.write] = c;
            storage.data[self.write] = v;
            self.write += 1;
        } else {
            self.overflow.push((r, c, v));
        }
    }
}

impl<T: AFloat> SparseStorage<T> {
    pub(super) fn fill_rectangle(&mut self, rect: Rect, value: T) {
        if value == T::zero() {
            // pure removal, the relative order of the survivors is kept
            let (rows, cols) = (self.row.clone(), self.col.clone());
            self.retain_entries(|e| !rect.contains(rows[e], cols[e]));
            self.reset_indexes();
            return;
        }
        let cells = (rect.point_start..rect.point_end).flat_map(move |r| {
            (rect.feature_start..rect.feature_end).map(move |c| (r, c, value))
        });
        self.merge_walk(rect, cells);
    }

    pub(super) fn merge_rectangle(&mut self, rect: Rect, values: &SparseStorage<T>) {
        let index = values.access(AxisKind::Point);
        let entries = (0..index.len()).map(|rank| {
            let e = index.entry(rank);
            (
                values.row[e] + rect.point_start,
                values.col[e] + rect.feature_start,
                values.data[e],
            )
        });
        self.merge_walk(rect, entries);
    }

    /// merges the point-sorted `incoming` entries (all inside `rect`) with the existing
    /// triples: existing entries inside `rect` are dropped, everything else is kept
    fn merge_walk(&mut self, rect: Rect, incoming: impl Iterator<Item = Entry<T>>) {
        self.sort_internal(AxisKind::Point, false);
        let len = self.data.len();
        let mut incoming = incoming.peekable();
        let mut writer = Writer {
            write: 0,
            overflow: Vec::new(),
        };
        let mut read = 0;
        loop {
            let current = (read < len).then(|| (self.row[read], self.col[read]));
            let next = incoming.peek().map(|&(r, c, _)| (r, c));
            match (current, next) {
                (None, None) => break,
                (Some(key), next) if next.map_or(true, |next| key < next) => {
                    read += 1;
                    if !rect.contains(key.0, key.1) {
                        let entry = (key.0, key.1, self.data[read - 1]);
                        writer.emit(self, read, entry);
                    }
                }
                (Some(key), Some(next)) if key == next => {
                    read += 1;
                    if let Some(entry) = incoming.next() {
                        writer.emit(self, read, entry);
                    }
                }
                _ => {
                    if let Some(entry) = incoming.next() {
                        writer.emit(self, read, entry);
                    }
                }
            }
        }
        let Writer { write, overflow } = writer;
        trace!(kept = write, appended = overflow.len(), "rectangle merge-walk done");
        self.data.truncate(write);
        self.row.truncate(write);
        self.col.truncate(write);
        let sorted = overflow.is_empty();
        for (r, c, v) in overflow {
            self.push(r, c, v);
        }
        self.invalidate();
        if sorted {
            self.state = SortState::SortedByPoint;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Replacement, Storage};
    use ndarray::array;

    #[test]
    fn test_fill_constant() {
        let mut storage = SparseStorage::from_array(array![
            [1., 0., 2.],
            [0., 3., 0.],
            [4., 0., 5.]
        ]);
        storage.replace_rectangle(Rect::new((0, 2), (1, 3)), Replacement::Constant(9.));
        assert!(storage.is_canonical());
        assert_eq!(
            storage.to_array(),
            array![[1., 9., 9.], [0., 9., 9.], [4., 0., 5.]]
        );
        storage.replace_rectangle(Rect::new((1, 3), (0, 2)), Replacement::Constant(0.));
        assert!(storage.is_canonical());
        assert_eq!(
            storage.to_array(),
            array![[1., 9., 9.], [0., 0., 9.], [0., 0., 5.]]
        );
        assert_eq!(storage.nnz(), 5);
    }

    #[test]
    fn test_merge_values() {
        let mut storage = SparseStorage::from_array(array![
            [1., 0., 0., 0.],
            [0., 2., 0., 3.],
            [0., 0., 0., 0.],
            [4., 0., 5., 6.]
        ]);
        let values = SparseStorage::from_array(array![[7., 0.], [0., 8.], [9., 10.]]);
        storage.replace_rectangle(Rect::new((1, 4), (1, 3)), Replacement::Values(&values));
        assert!(storage.is_canonical());
        assert_eq!(
            storage.to_array(),
            array![
                [1., 0., 0., 0.],
                [0., 7., 0., 3.],
                [0., 0., 8., 0.],
                [4., 9., 10., 6.]
            ]
        );
        assert_eq!(storage.get(2, 2), 8.);
        assert_eq!(storage.get(3, 2), 10.);
    }

    #[test]
    fn test_overflow_into_empty() {
        let mut storage = SparseStorage::<f64>::empty((2, 2));
        storage.replace_rectangle(Rect::full((2, 2)), Replacement::Constant(f64::NAN));
        assert_eq!(storage.nnz(), 4);
        assert!(storage.is_canonical());
        assert!(storage.get(1, 0).is_nan());
    }
}
