use super::{Axis, AxisMut, Selection};
use crate::{
    backend::{AxisKind, Backend},
    base::Base,
    error::{bail, ensure, Result},
    names::{Identifier, NameRegistry},
    toolkit::array::{value_key, AFloat},
};
use std::{borrow::Cow, collections::HashSet};
use tracing::debug;

impl<'a, T: AFloat> Axis<'a, T> {
    /// a new object holding the selected positions
    pub fn copy(&self, selection: &Selection<'_, T>) -> Result<Base<T>> {
        self.ensure_editable("copying features")?;
        let positions = self.resolve(selection)?;
        Ok(self.take(&positions))
    }

    /// a new object keeping the first occurrence of every distinct vector
    pub fn unique(&self) -> Result<Base<T>> {
        self.ensure_editable("unique features")?;
        let mut seen = HashSet::new();
        let positions: Vec<usize> = (0..self.len())
            .filter(|&position| {
                let key: Vec<u64> = self
                    .base
                    .backend
                    .vector(self.kind, position)
                    .into_iter()
                    .map(value_key)
                    .collect();
                seen.insert(key)
            })
            .collect();
        Ok(self.take(&positions))
    }

    /// a new object with every vector repeated `copies` times, either each vector in
    /// turn (`by_value`) or the whole axis as a block
    pub fn repeat(&self, copies: usize, by_value: bool) -> Result<Base<T>> {
        ensure!(
            copies > 0,
            ArgumentValue,
            "the number of copies must be positive"
        );
        self.ensure_editable("repeating features")?;
        if copies == 1 {
            return Ok(self.base.clone());
        }
        let backend = self.base.backend.repeat(self.kind, copies, by_value);
        let names = self.registry().repeated(copies, by_value);
        Ok(self.assemble(backend, names, None))
    }
}

impl<'a, T: AFloat> AxisMut<'a, T> {
    fn ensure_editable(&self, action: &str) -> Result<()> {
        self.as_axis().ensure_editable(action)
    }

    /// removes the selected positions and returns them as a new object, in selection order
    pub fn extract(&mut self, selection: &Selection<'_, T>) -> Result<Base<T>> {
        self.ensure_editable("extracting features")?;
        let positions = self.as_axis().resolve(selection)?;
        let kind = self.kind;
        let along = self.base.registry(kind).select(&positions);
        let across = self.base.registry(kind.other()).clone();
        let extracted = self.base.backend.split_off(kind, &positions);
        let mut sorted = positions;
        sorted.sort_unstable();
        self.base.registry_mut(kind).remove(&sorted);
        self.base.sync_dims();
        debug!(axis = %kind, count = sorted.len(), "extracted");
        Ok(Axis::new(self.base, kind).assemble(extracted, along, Some(across)))
    }

    /// removes the selected positions
    pub fn delete(&mut self, selection: &Selection<'_, T>) -> Result<()> {
        self.extract(selection).map(|_| ())
    }

    /// keeps only the selected positions, in selection order
    pub fn retain(&mut self, selection: &Selection<'_, T>) -> Result<()> {
        self.ensure_editable("retaining features")?;
        let positions = self.as_axis().resolve(selection)?;
        let kind = self.kind;
        self.base.backend = self.base.backend.take(kind, &positions);
        let retained = self.base.registry(kind).select(&positions);
        *self.base.registry_mut(kind) = retained;
        self.base.sync_dims();
        debug!(axis = %kind, count = positions.len(), "retained");
        Ok(())
    }

    /// inserts the vectors of `other` before `before`
    pub fn insert(&mut self, before: impl Into<Identifier>, other: &Base<T>) -> Result<()> {
        let position = self.base.registry(self.kind).index_of(&before.into())?;
        self.insert_at(position, other)
    }

    /// inserts the vectors of `other` after the last position
    pub fn append(&mut self, other: &Base<T>) -> Result<()> {
        self.insert_at(self.len(), other)
    }

    fn insert_at(&mut self, position: usize, other: &Base<T>) -> Result<()> {
        let kind = self.kind;
        let across = kind.other();
        match kind {
            AxisKind::Feature => {
                self.base.ensure_2d("inserting features")?;
                other.ensure_2d("inserting features")?;
            }
            AxisKind::Point => ensure!(
                self.base.dims[1..] == other.dims[1..],
                ShapeMismatch,
                "cannot insert points of dimensions {:?} into an object of dimensions {:?}",
                other.dims,
                self.base.dims
            ),
        }
        ensure!(
            other.axis_len(across) == self.base.axis_len(across),
            ShapeMismatch,
            "the inserted object has {} {across}s, {} are required",
            other.axis_len(across),
            self.base.axis_len(across)
        );
        let own = self.base.registry(kind);
        if let Some(conflict) = other
            .registry(kind)
            .non_default()
            .into_iter()
            .find(|name| own.has_name(name))
        {
            bail!(NameConflict, "the {kind} name '{conflict}' already exists");
        }
        let (order, across_names) = align(self.base.registry(across), other.registry(across))?;
        let incoming = match order {
            None => Cow::Borrowed(&other.backend),
            Some(order) => {
                let mut backend = other.backend.clone();
                backend.permute(across, &order);
                Cow::<Backend<T>>::Owned(backend)
            }
        };
        self.base.backend.insert(kind, position, &incoming);
        self.base
            .registry_mut(kind)
            .insert(position, other.registry(kind));
        if let Some(names) = across_names {
            *self.base.registry_mut(across) = names;
        }
        self.base.sync_dims();
        debug!(axis = %kind, position, count = other.axis_len(kind), "inserted");
        Ok(())
    }
}

/// how the off-axis of an inserted object lines up with ours: an optional reordering of
/// the incoming vectors, and the registry to adopt if ours changes
fn align(
    own: &NameRegistry,
    incoming: &NameRegistry,
) -> Result<(Option<Vec<usize>>, Option<NameRegistry>)> {
    if incoming.all_default() {
        return Ok((None, None));
    }
    if own.all_default() {
        return Ok((None, Some(NameRegistry::from_names(incoming.assignment())?)));
    }
    if !own.any_default() && !incoming.any_default() {
        let Some(order) = own
            .names()
            .iter()
            .map(|name| incoming.lookup(name))
            .collect::<Option<Vec<_>>>()
        else {
            bail!(
                ArgumentValue,
                "the inserted object uses different names: {:?} vs {:?}",
                incoming.non_default(),
                own.non_default()
            );
        };
        let identity = order.iter().enumerate().all(|(i, &o)| i == o);
        return Ok(((!identity).then_some(order), None));
    }
    ensure!(
        own.is_consistent_with(incoming),
        ImproperAction,
        "names of the inserted object are inconsistent with the existing ones"
    );
    let merged = own.merged_with(incoming);
    if merged == own.assignment() {
        return Ok((None, None));
    }
    Ok((None, Some(NameRegistry::from_names(merged)?)))
}
