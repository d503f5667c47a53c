use bytes::{Buf, BufMut};
use ndarray::{Array2, ArrayView2, Zip};
use num_traits::{Float, FromPrimitive};
use rayon::prelude::*;
use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
};

/// element count above which dense elementwise kernels run on the rayon pool
pub const PARALLEL_THRESHOLD: usize = 1 << 16;

/// the element type of every container: a float where `NaN` marks a missing value
pub trait AFloat:
    Float + FromPrimitive + Default + Debug + Display + Send + Sync + 'static
{
    const NBYTES: usize;

    fn put_be(self, buf: &mut impl BufMut);
    fn get_be(buf: &mut impl Buf) -> Self;
}

macro_rules! afloat_impl {
    ($dtype:ty, $put:ident, $get:ident) => {
        impl AFloat for $dtype {
            const NBYTES: usize = core::mem::size_of::<$dtype>();

            #[inline]
            fn put_be(self, buf: &mut impl BufMut) {
                buf.$put(self);
            }
            #[inline]
            fn get_be(buf: &mut impl Buf) -> Self {
                buf.$get()
            }
        }
    };
}

afloat_impl!(f32, put_f32, get_f32);
afloat_impl!(f64, put_f64, get_f64);

/// equality where two missing values are considered the same
#[inline]
pub fn same_value<T: AFloat>(a: T, b: T) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// bit pattern used for hashing values, with `-0.0` folded into `0.0`
#[inline]
pub fn value_key<T: AFloat>(value: T) -> u64 {
    let value = value.to_f64().unwrap_or(f64::NAN);
    if value == 0. {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

/// ascending order with missing values last
#[inline]
pub fn cmp_missing_last<T: AFloat>(a: T, b: T) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}

/// whether every element is `0` or `1`
pub fn is_binary<T: AFloat>(values: impl IntoIterator<Item = T>) -> bool {
    values
        .into_iter()
        .all(|v| v == T::zero() || v == T::one())
}

/// elementwise `f(a, b)`, spread over rayon when the arrays are large enough
pub fn zip_map<T: AFloat>(
    a: ArrayView2<T>,
    b: ArrayView2<T>,
    f: impl Fn(T, T) -> T + Send + Sync,
) -> Array2<T> {
    let mut out = Array2::<T>::zeros(a.raw_dim());
    let zip = Zip::from(&mut out).and(&a).and(&b);
    if a.len() >= PARALLEL_THRESHOLD {
        zip.par_for_each(|o, &x, &y| *o = f(x, y));
    } else {
        zip.for_each(|o, &x, &y| *o = f(x, y));
    }
    out
}

/// in-place `a = f(a, b)`, spread over rayon when the arrays are large enough
pub fn zip_apply<T: AFloat>(
    a: &mut Array2<T>,
    b: ArrayView2<T>,
    f: impl Fn(T, T) -> T + Send + Sync,
) {
    let parallel = a.len() >= PARALLEL_THRESHOLD;
    let zip = Zip::from(a).and(&b);
    if parallel {
        zip.par_for_each(|x, &y| *x = f(*x, y));
    } else {
        zip.for_each(|x, &y| *x = f(*x, y));
    }
}

/// elementwise `f(a)`, spread over rayon when the array is large enough
pub fn map<T: AFloat>(a: ArrayView2<T>, f: impl Fn(T) -> T + Send + Sync) -> Array2<T> {
    if a.len() >= PARALLEL_THRESHOLD {
        let mut out = a.to_owned();
        out.par_mapv_inplace(f);
        out
    } else {
        a.mapv(f)
    }
}

/// in-place `v = f(v)` over a flat buffer, spread over rayon when it is large enough
pub fn map_inplace<T: AFloat>(values: &mut [T], f: impl Fn(T) -> T + Send + Sync) {
    if values.len() >= PARALLEL_THRESHOLD {
        values.par_iter_mut().for_each(|v| *v = f(*v));
    } else {
        values.iter_mut().for_each(|v| *v = f(*v));
    }
}
