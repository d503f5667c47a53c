use super::array::AFloat;
use anyhow::{bail, Result};
use bytes::{Buf, BufMut};
use core::mem::size_of;

#[inline]
pub fn to_nbytes<T: Sized>(values_len: usize) -> usize {
    values_len * size_of::<T>()
}

#[inline]
pub fn put_usize(bytes: &mut impl BufMut, value: usize) {
    bytes.put_i64(value as i64);
}

pub fn put_values<T: AFloat>(bytes: &mut impl BufMut, values: impl IntoIterator<Item = T>) {
    values.into_iter().for_each(|v| v.put_be(bytes));
}

pub fn put_str(bytes: &mut impl BufMut, value: &str) {
    put_usize(bytes, value.len());
    bytes.put_slice(value.as_bytes());
}

/// the byte size of `len` items of `size` bytes, rejecting lengths that overflow
fn checked_nbytes(len: usize, size: usize, what: &str) -> Result<usize> {
    match len.checked_mul(size) {
        Some(nbytes) => Ok(nbytes),
        None => bail!("invalid length while reading {what}: {len} items of {size} bytes"),
    }
}

fn check_remaining(bytes: &impl Buf, nbytes: usize, what: &str) -> Result<()> {
    if bytes.remaining() < nbytes {
        bail!(
            "truncated buffer while reading {what}: need {nbytes} bytes, {} left",
            bytes.remaining()
        );
    }
    Ok(())
}

pub fn get_usize(bytes: &mut impl Buf) -> Result<usize> {
    check_remaining(bytes, to_nbytes::<i64>(1), "length")?;
    let value = bytes.get_i64();
    if value < 0 {
        bail!("negative length ({value}) found in buffer");
    }
    Ok(value as usize)
}

pub fn get_values<T: AFloat>(bytes: &mut impl Buf, len: usize) -> Result<Vec<T>> {
    check_remaining(bytes, checked_nbytes(len, T::NBYTES, "values")?, "values")?;
    Ok((0..len).map(|_| T::get_be(bytes)).collect())
}

pub fn get_indices(bytes: &mut impl Buf, len: usize) -> Result<Vec<usize>> {
    let nbytes = checked_nbytes(len, size_of::<i64>(), "indices")?;
    check_remaining(bytes, nbytes, "indices")?;
    (0..len).map(|_| get_usize(bytes)).collect()
}

pub fn get_str(bytes: &mut impl Buf) -> Result<String> {
    let len = get_usize(bytes)?;
    check_remaining(bytes, len, "string")?;
    let mut buffer = vec![0u8; len];
    bytes.copy_to_slice(&mut buffer);
    Ok(String::from_utf8(buffer)?)
}
