//! binary persistence: every integer is a big-endian `i64`, every value a big-endian float.
//!
//! ```text
//! magic | dtype nbytes | kind | ndims | dims.. | name | absolute | relative
//!       | point names | feature names | values
//! ```
//!
//! Optional strings and name lists start with a `0`/`1` flag byte. Dense values are
//! written point-major; sparse values as `nnz` followed by rows, cols and data.

use super::{Base, Paths};
use crate::{
    backend::{Backend, BackendKind, SparseStorage},
    names::NameRegistry,
    toolkit::{
        array::AFloat,
        convert::{get_indices, get_str, get_usize, get_values, put_str, put_usize, put_values},
    },
};
use anyhow::{bail, Context, Result};
use bytes::{Buf, BufMut};
use ndarray::Array2;
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};
use tracing::debug;

pub const FORMAT_MAGIC: &[u8; 8] = b"CFTAB\x00\x00\x01";

fn put_flag(bytes: &mut impl BufMut, flag: bool) {
    bytes.put_u8(flag as u8);
}

fn get_flag(bytes: &mut impl Buf) -> Result<bool> {
    if !bytes.has_remaining() {
        bail!("truncated buffer while reading a flag");
    }
    match bytes.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => bail!("invalid flag byte {other}"),
    }
}

fn put_optional_str(bytes: &mut impl BufMut, value: Option<&str>) {
    put_flag(bytes, value.is_some());
    if let Some(value) = value {
        put_str(bytes, value);
    }
}

fn get_optional_str(bytes: &mut impl Buf) -> Result<Option<String>> {
    if get_flag(bytes)? {
        Ok(Some(get_str(bytes)?))
    } else {
        Ok(None)
    }
}

/// only user names are written, default names are regenerated on load
fn put_names(bytes: &mut impl BufMut, registry: &NameRegistry) {
    let created = registry.is_materialized() && !registry.all_default();
    put_flag(bytes, created);
    if created {
        put_usize(bytes, registry.len());
        for name in registry.assignment() {
            put_optional_str(bytes, name.as_deref());
        }
    }
}

fn get_names(bytes: &mut impl Buf, len: usize) -> Result<NameRegistry> {
    if !get_flag(bytes)? {
        return Ok(NameRegistry::new(len));
    }
    let stored = get_usize(bytes)?;
    if stored != len {
        bail!("{stored} names are stored for an axis of length {len}");
    }
    let names = (0..len)
        .map(|_| get_optional_str(bytes))
        .collect::<Result<Vec<_>>>()?;
    Ok(NameRegistry::from_names(names)?)
}

impl<T: AFloat> Base<T> {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.put_slice(FORMAT_MAGIC);
        put_usize(&mut bytes, T::NBYTES);
        bytes.put_u8(match self.kind() {
            BackendKind::Dense => 0,
            BackendKind::Sparse => 1,
        });
        put_usize(&mut bytes, self.dims.len());
        self.dims.iter().for_each(|&d| put_usize(&mut bytes, d));
        put_optional_str(&mut bytes, self.name());
        put_optional_str(&mut bytes, self.paths.absolute.as_deref());
        put_optional_str(&mut bytes, self.paths.relative.as_deref());
        put_names(&mut bytes, &self.point_names);
        put_names(&mut bytes, &self.feature_names);
        match &self.backend {
            Backend::Dense(storage) => put_values(&mut bytes, storage.array().iter().copied()),
            Backend::Sparse(storage) => {
                let triplets = storage.triplets();
                put_usize(&mut bytes, triplets.len());
                triplets.iter().for_each(|&(r, _, _)| put_usize(&mut bytes, r));
                triplets.iter().for_each(|&(_, c, _)| put_usize(&mut bytes, c));
                put_values(&mut bytes, triplets.iter().map(|&(_, _, v)| v));
            }
        }
        bytes
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        let buf = &mut bytes;
        if buf.remaining() < FORMAT_MAGIC.len() || &buf[..FORMAT_MAGIC.len()] != FORMAT_MAGIC {
            bail!("not a cftab buffer (magic bytes mismatch)");
        }
        buf.advance(FORMAT_MAGIC.len());
        let nbytes = get_usize(buf)?;
        if nbytes != T::NBYTES {
            bail!(
                "the buffer holds {nbytes}-byte values, {}-byte values were requested",
                T::NBYTES
            );
        }
        if !buf.has_remaining() {
            bail!("truncated buffer while reading the backend kind");
        }
        let kind = match buf.get_u8() {
            0 => BackendKind::Dense,
            1 => BackendKind::Sparse,
            other => bail!("unknown backend kind {other}"),
        };
        let ndims = get_usize(buf)?;
        if ndims < 2 {
            bail!("at least two dimensions are required, got {ndims}");
        }
        let dims = get_indices(buf, ndims)?;
        let points = dims[0];
        let Some(features) = dims[1..].iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
        else {
            bail!("the dimensions {dims:?} overflow the feature count");
        };
        let Some(size) = points.checked_mul(features) else {
            bail!("the dimensions {dims:?} overflow the element count");
        };
        let name = get_optional_str(buf)?;
        let absolute = get_optional_str(buf)?;
        let relative = get_optional_str(buf)?;
        let point_names = get_names(buf, points)?;
        let feature_names = get_names(buf, features)?;
        let backend = match kind {
            BackendKind::Dense => {
                let values = get_values(buf, size)?;
                Backend::from_array(kind, Array2::from_shape_vec((points, features), values)?)
            }
            BackendKind::Sparse => {
                let nnz = get_usize(buf)?;
                let row = get_indices(buf, nnz)?;
                let col = get_indices(buf, nnz)?;
                let data = get_values(buf, nnz)?;
                Backend::Sparse(SparseStorage::from_triplets(
                    (points, features),
                    data,
                    row,
                    col,
                )?)
            }
        };
        if buf.has_remaining() {
            bail!("{} trailing bytes found after the values", buf.remaining());
        }
        Ok(Self {
            dims,
            point_names,
            feature_names,
            name,
            paths: Paths { absolute, relative },
            backend,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file =
            File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;
        self.save_to(&mut file)
            .with_context(|| format!("failed to save to '{}'", path.display()))
    }

    /// loads an object, recording `path` (and its canonical form) as the object's paths
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
        let mut base = Self::load_from(&mut file)
            .with_context(|| format!("failed to load from '{}'", path.display()))?;
        base.paths = Paths {
            absolute: path
                .canonicalize()
                .ok()
                .map(|p| p.to_string_lossy().into_owned()),
            relative: Some(path.to_string_lossy().into_owned()),
        };
        Ok(base)
    }

    pub fn save_to(&self, file: &mut impl Write) -> Result<()> {
        let bytes = self.to_bytes();
        debug!(nbytes = bytes.len(), "saving object");
        file.write_all(&bytes)?;
        Ok(())
    }

    pub fn load_from(file: &mut impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        debug!(nbytes = bytes.len(), "loading object");
        Self::from_bytes(&bytes)
    }
}
