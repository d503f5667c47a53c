use super::Base;
use crate::{
    backend::{Backend, BackendKind},
    error::Result,
    toolkit::{
        array::{value_key, AFloat},
        convert::put_usize,
        misc::hash_code,
    },
};
use bytes::BufMut;
use ndarray::Array2;
use std::{collections::HashMap, mem};
use tracing::debug;

impl<T: AFloat> Base<T> {
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// a copy backed by `kind`; names, shape and values are kept
    pub fn copy_to(&self, kind: BackendKind) -> Self {
        let mut copied = self.clone();
        copied.backend = self.backend.to_kind(kind);
        copied
    }

    /// converts the backend in place
    pub fn convert_to(&mut self, kind: BackendKind) {
        if self.kind() == kind {
            return;
        }
        debug!(from = %self.kind(), to = %kind, "converting backend");
        let backend = mem::replace(&mut self.backend, Backend::zeros(kind, (0, 0)));
        self.backend = backend.into_kind(kind);
    }

    pub fn to_array(&self) -> Array2<T> {
        self.backend.to_array()
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.to_array()
            .outer_iter()
            .map(|row| row.to_vec())
            .collect()
    }

    /// one `feature name -> value` map per point
    pub fn to_records(&self) -> Vec<HashMap<String, T>> {
        let names = self.feature_names.names();
        self.to_array()
            .outer_iter()
            .map(|row| names.iter().cloned().zip(row.iter().copied()).collect())
            .collect()
    }

    /// same dimensions, same user names and the same values, whatever the backends
    pub fn is_identical(&self, other: &Base<T>) -> bool {
        self.dims == other.dims
            && self.point_names == other.point_names
            && self.feature_names == other.feature_names
            && self.backend.equals(&other.backend)
    }

    /// md5 of the dimensions and values; equal for identical values on either backend
    pub fn hash_code(&self) -> String {
        let mut bytes: Vec<u8> = Vec::with_capacity(8 * (self.dims.len() + 1));
        put_usize(&mut bytes, self.dims.len());
        self.dims.iter().for_each(|&d| put_usize(&mut bytes, d));
        self.backend
            .values()
            .into_iter()
            .for_each(|v| bytes.put_u64(value_key(v)));
        hash_code(&bytes)
    }

    pub fn contains_zero(&self) -> bool {
        self.backend.contains_zero()
    }

    pub fn transpose(&mut self) -> Result<()> {
        self.ensure_2d("transpose")?;
        self.backend.transpose();
        mem::swap(&mut self.point_names, &mut self.feature_names);
        self.dims.swap(0, 1);
        debug!(shape = ?self.shape(), "transposed");
        Ok(())
    }

    /// forgets the extra dimensions, so the object behaves as a plain 2d table
    pub fn collapse_dimensions(&mut self) {
        if self.dims.len() > 2 {
            debug!(dims = ?self.dims, "collapsing dimensions");
            let (points, features) = self.shape();
            self.dims = vec![points, features];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::tests::{get_test_base, KINDS};

    #[test]
    fn test_copy_round_trip() {
        for kind in KINDS {
            let base = get_test_base(kind);
            for to in KINDS {
                let copied = base.copy_to(to);
                assert_eq!(copied.kind(), to);
                assert!(copied.is_identical(&base));
                assert_eq!(copied.hash_code(), base.hash_code());
                let back = copied.copy_to(kind);
                assert!(back.is_identical(&base));
                assert_eq!(back.points().names(), ["p0", "p1", "p2", "p3"]);
            }
        }
    }

    #[test]
    fn test_convert_to() {
        let mut base = get_test_base(BackendKind::Dense);
        let expected = base.copy();
        base.convert_to(BackendKind::Sparse);
        assert_eq!(base.kind(), BackendKind::Sparse);
        assert!(base.is_identical(&expected));
    }

    #[test]
    fn test_outputs() {
        let base = get_test_base(BackendKind::Sparse);
        let rows = base.to_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3], vec![0., 11., 12.]);
        let records = base.to_records();
        assert_eq!(records[1]["c"], 6.);
        assert!(records[2]["b"].is_nan());
        assert!(base.contains_zero());
    }

    #[test]
    fn test_identical() {
        let base = get_test_base(BackendKind::Dense);
        let mut other = base.copy();
        assert!(base.is_identical(&other));
        other.set(0, 0, 2.).unwrap();
        assert!(!base.is_identical(&other));
        assert_ne!(base.hash_code(), other.hash_code());
        let renamed = base.copy().with_point_names(["x", "p1", "p2", "p3"]).unwrap();
        assert!(!base.is_identical(&renamed));
        assert_eq!(base.hash_code(), renamed.hash_code());
    }

    #[test]
    fn test_transpose() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            base.transpose().unwrap();
            assert_eq!(base.shape(), (3, 4));
            assert_eq!(base.points().names(), ["a", "b", "c"]);
            assert_eq!(base.get("c", "p3").unwrap(), 12.);
            base.transpose().unwrap();
            assert!(base.is_identical(&get_test_base(kind)));
        }
    }
}
