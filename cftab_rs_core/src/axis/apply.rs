use super::{Axis, AxisMut};
use crate::{
    backend::Backend,
    base::Base,
    error::{bail, ensure, Result},
    names::{Identifier, NameRegistry},
    toolkit::array::AFloat,
    view::View,
};
use tracing::debug;

impl<'a, T: AFloat> Axis<'a, T> {
    /// a new object with one vector per visited position, holding `f` of that position
    ///
    /// Every output must have the same length. The off-axis keeps its names when the
    /// outputs are as long as the original vectors.
    pub fn calculate(
        &self,
        mut f: impl FnMut(&View<'a, T>) -> Vec<T>,
        limit_to: Option<&[Identifier]>,
    ) -> Result<Base<T>> {
        let positions = self.base.resolve_positions(self.kind, limit_to)?;
        let outputs: Vec<Vec<T>> = positions
            .iter()
            .map(|&position| f(&View::vector(self.base, self.kind, position)))
            .collect();
        let len = outputs.first().map_or(0, Vec::len);
        if let Some(i) = outputs.iter().position(|output| output.len() != len) {
            bail!(
                ArgumentValue,
                "the calculation returned {} values at {} {}, {len} elsewhere",
                outputs[i].len(),
                self.kind,
                positions[i]
            );
        }
        let backend = Backend::from_vectors(self.base.kind(), self.kind, outputs, len);
        let along = self.registry().select(&positions);
        let across = self.base.registry(self.kind.other());
        let across = if across.len() == len {
            across.clone()
        } else {
            NameRegistry::new(len)
        };
        Ok(self.assemble(backend, along, Some(across)))
    }
}

impl<T: AFloat> AxisMut<'_, T> {
    /// replaces every visited vector by `f` of it, in place
    pub fn transform(
        &mut self,
        mut f: impl FnMut(&View<'_, T>) -> Vec<T>,
        limit_to: Option<&[Identifier]>,
    ) -> Result<()> {
        let kind = self.kind;
        self.as_axis().ensure_editable("transforming features")?;
        ensure!(
            !self.base.is_empty(),
            ImproperAction,
            "cannot transform the {kind}s of an empty object"
        );
        let expected = self.base.axis_len(kind.other());
        let positions = self.base.resolve_positions(kind, limit_to)?;
        let mut updates = Vec::with_capacity(positions.len());
        for position in positions {
            let output = f(&View::vector(self.base, kind, position));
            ensure!(
                output.len() == expected,
                ArgumentValue,
                "the transformation returned {} values for {kind} {position}, {expected} are required",
                output.len()
            );
            updates.push((position, output));
        }
        debug!(axis = %kind, count = updates.len(), "transforming");
        self.base.backend.transform(kind, updates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::tests::{get_test_base, KINDS},
        error::Error,
    };

    #[test]
    fn test_calculate() {
        for kind in KINDS {
            let base = get_test_base(kind);
            let totals = base
                .features()
                .calculate(|view| vec![view.iter().filter(|v| !v.is_nan()).sum()], None)
                .unwrap();
            assert_eq!(totals.shape(), (1, 3));
            assert_eq!(totals.kind(), kind);
            assert_eq!(totals.features().names(), ["a", "b", "c"]);
            assert_eq!(totals.to_rows(), vec![vec![8., 11., 21.]]);

            let limit = [Identifier::from("p3"), Identifier::from("p0")];
            let doubled = base
                .points()
                .calculate(|view| view.iter().map(|v| v * 2.).collect(), Some(&limit))
                .unwrap();
            assert_eq!(doubled.points().names(), ["p3", "p0"]);
            assert_eq!(doubled.features().names(), ["a", "b", "c"]);
            assert_eq!(doubled.get("p0", "c").unwrap(), 6.);

            let ragged = base.points().calculate(
                |view| vec![0.; if view.value(0).unwrap() > 0. { 1 } else { 2 }],
                None,
            );
            assert!(matches!(ragged, Err(Error::ArgumentValue(_))));
        }
    }

    #[test]
    fn test_transform() {
        for kind in KINDS {
            let mut base = get_test_base(kind);
            let limit = [Identifier::from("c")];
            base.features_mut()
                .transform(|view| view.iter().map(|v| v + 1.).collect(), Some(&limit))
                .unwrap();
            assert_eq!(base.features().vector_values("c").unwrap(), [4., 7., 1., 13.]);
            assert_eq!(base.features().vector_values("a").unwrap(), [1., 0., 7., 0.]);
            assert!(matches!(
                base.points_mut().transform(|_| vec![0.], None),
                Err(Error::ArgumentValue(_))
            ));
            let mut empty = Base::<f64>::zeros((0, 2), kind);
            assert!(matches!(
                empty.points_mut().transform(|view| view.values(), None),
                Err(Error::ImproperAction(_))
            ));
        }
    }
}
