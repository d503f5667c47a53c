//! # axis
//!
//! per-axis operations: naming, selection, structural edits, ordering and vector-wise
//! calculations.
//!
//! # Design
//!
//! The same code serves both axes. [`Axis`] borrows its object immutably and only reads
//! or builds new objects, while [`AxisMut`] holds the exclusive borrow needed to edit
//! the object in place. Positions along the axis are always resolved through the axis'
//! name registry, so indices and names can be mixed freely.

use crate::{
    backend::AxisKind,
    base::Base,
    error::Result,
    names::{Identifier, NameAssignment, NameRegistry},
    toolkit::array::AFloat,
    view::View,
};

mod apply;
mod order;
mod selection;
mod structure;

pub use order::SortBy;
pub use selection::{Selection, Target};

#[derive(Debug, Clone, Copy)]
pub struct Axis<'a, T: AFloat> {
    base: &'a Base<T>,
    kind: AxisKind,
}

#[derive(Debug)]
pub struct AxisMut<'a, T: AFloat> {
    base: &'a mut Base<T>,
    kind: AxisKind,
}

impl<'a, T: AFloat> Axis<'a, T> {
    pub(crate) fn new(base: &'a Base<T>, kind: AxisKind) -> Self {
        Self { base, kind }
    }

    #[inline]
    pub fn kind(&self) -> AxisKind {
        self.kind
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.base.axis_len(self.kind)
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn registry(&self) -> &'a NameRegistry {
        self.base.registry(self.kind)
    }

    /// every name along the axis, default names included
    pub fn names(&self) -> &'a [String] {
        self.registry().names()
    }
    pub fn name(&self, id: impl Into<Identifier>) -> Result<&'a str> {
        let registry = self.registry();
        registry.name(registry.index_of(&id.into())?)
    }
    pub fn index(&self, id: impl Into<Identifier>) -> Result<usize> {
        self.registry().index_of(&id.into())
    }
    pub fn has_name(&self, name: &str) -> bool {
        self.registry().has_name(name)
    }

    /// the view over one point / feature
    pub fn view(&self, id: impl Into<Identifier>) -> Result<View<'a, T>> {
        let position = self.index(id)?;
        Ok(View::vector(self.base, self.kind, position))
    }
    pub fn vector_values(&self, id: impl Into<Identifier>) -> Result<Vec<T>> {
        let position = self.index(id)?;
        Ok(self.base.backend.vector(self.kind, position))
    }

    pub fn iter(&self) -> impl Iterator<Item = View<'a, T>> + 'a {
        let (base, kind) = (self.base, self.kind);
        (0..self.len()).map(move |position| View::vector(base, kind, position))
    }

    /// the object holding only `positions` along this axis, in the given order
    pub(crate) fn take(&self, positions: &[usize]) -> Base<T> {
        let backend = self.base.backend.take(self.kind, positions);
        let selected = self.registry().select(positions);
        self.assemble(backend, selected, None)
    }

    /// arranges registries into a derived object, the off-axis defaulting to ours
    fn assemble(
        &self,
        backend: crate::backend::Backend<T>,
        along: NameRegistry,
        across: Option<NameRegistry>,
    ) -> Base<T> {
        let across = across.unwrap_or_else(|| self.base.registry(self.kind.other()).clone());
        match self.kind {
            AxisKind::Point => self.base.derive(backend, along, across),
            AxisKind::Feature => self.base.derive(backend, across, along),
        }
    }

    /// structural feature edits are limited to 2d objects
    fn ensure_editable(&self, action: &str) -> Result<()> {
        match self.kind {
            AxisKind::Point => Ok(()),
            AxisKind::Feature => self.base.ensure_2d(action),
        }
    }
}

impl<'a, T: AFloat> AxisMut<'a, T> {
    pub(crate) fn new(base: &'a mut Base<T>, kind: AxisKind) -> Self {
        Self { base, kind }
    }

    /// the read-only side of this axis
    pub fn as_axis(&self) -> Axis<'_, T> {
        Axis::new(self.base, self.kind)
    }

    #[inline]
    pub fn kind(&self) -> AxisKind {
        self.kind
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.base.axis_len(self.kind)
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// renames one position, `None` restoring a default name
    pub fn set_name(&mut self, id: impl Into<Identifier>, name: Option<&str>) -> Result<()> {
        let registry = self.base.registry_mut(self.kind);
        let position = registry.index_of(&id.into())?;
        registry.set_name(position, name)
    }

    pub fn set_names(&mut self, names: impl Into<NameAssignment>) -> Result<()> {
        self.base.registry_mut(self.kind).set_names(names.into())
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
    fn test_names() {
        let base = get_test_base(BackendKind::Dense);
        let points = base.points();
        assert_eq!(points.len(), 4);
        assert_eq!(points.name(-1).unwrap(), "p3");
        assert_eq!(points.index("p2").unwrap(), 2);
        assert!(points.has_name("p0"));
        assert!(!points.has_name("a"));
        assert!(matches!(points.index(4), Err(Error::InvalidIdentifier(_))));
        assert_eq!(base.features().names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_set_names() {
        let mut base = get_test_base(BackendKind::Dense);
        base.features_mut().set_name("b", Some("x")).unwrap();
        assert_eq!(base.features().names(), ["a", "x", "c"]);
        assert!(matches!(
            base.features_mut().set_name(0, Some("c")),
            Err(Error::NameConflict(_))
        ));
        base.points_mut().set_names(["w", "x", "y", "z"]).unwrap();
        assert_eq!(base.get("z", "c").unwrap(), 12.);
        base.points_mut().set_name("w", None).unwrap();
        assert!(!base.points().has_name("w"));
    }

    #[test]
    fn test_vectors() {
        for kind in KINDS {
            let base = get_test_base(kind);
            assert_eq!(base.points().vector_values("p1").unwrap(), [0., 0., 6.]);
            assert_eq!(base.features().vector_values("c").unwrap(), [3., 6., 0., 12.]);
            let view = base.features().view("a").unwrap();
            assert_eq!(view.shape(), (4, 1));
            let totals: Vec<f64> = base
                .points()
                .iter()
                .map(|view| view.iter().filter(|v| !v.is_nan()).sum())
                .collect();
            assert_eq!(totals, [4., 6., 7., 23.]);
        }
    }
}
