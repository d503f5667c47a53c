//! # stretch
//!
//! broadcasting of a one-dimensional object against a full object, or of a single point
//! against a single feature.
//!
//! # Design
//!
//! Broadcasting is materialized: the vector is repeated with the axis-repeat primitive
//! until both operands share a shape, and the ordinary elementwise kernels run on the
//! result. The kernels themselves never see mismatched shapes.

use crate::{
    backend::AxisKind,
    base::{Base, BinaryOp, Operand},
    error::{bail, ensure, Result},
    names::NameRegistry,
    toolkit::array::AFloat,
};
use std::{
    borrow::Cow,
    ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Rem, Sub},
};

/// a one-dimensional object, ready to be repeated to fit its counterpart
#[derive(Debug, Clone, Copy)]
pub struct Stretch<'a, T: AFloat> {
    source: &'a Base<T>,
}

/// the counterpart of a stretched operation
#[derive(Debug, Clone, Copy)]
pub enum StretchOperand<'o, T: AFloat> {
    Base(&'o Base<T>),
    Stretch(Stretch<'o, T>),
}

impl<'o, T: AFloat> From<&'o Base<T>> for StretchOperand<'o, T> {
    fn from(base: &'o Base<T>) -> Self {
        StretchOperand::Base(base)
    }
}
impl<'o, T: AFloat> From<Stretch<'o, T>> for StretchOperand<'o, T> {
    fn from(stretch: Stretch<'o, T>) -> Self {
        StretchOperand::Stretch(stretch)
    }
}

impl<T: AFloat> Base<T> {
    pub fn stretch(&self) -> Result<Stretch<'_, T>> {
        self.ensure_2d("stretching")?;
        let (points, features) = self.shape();
        ensure!(
            points > 0 && features > 0,
            ImproperAction,
            "empty objects of shape {:?} cannot be stretched",
            self.shape()
        );
        ensure!(
            points == 1 || features == 1,
            ImproperAction,
            "only one-dimensional objects can be stretched, got shape {:?}",
            self.shape()
        );
        Ok(Stretch { source: self })
    }
}

/// output names along one axis; a single user name spread over several positions gets
/// `_1.._k` suffixes
fn stretched_names(
    own: &NameRegistry,
    other: &NameRegistry,
    len: usize,
    other_stretched: bool,
) -> Result<NameRegistry> {
    let repeated = |name: &str| {
        NameRegistry::from_names((1..=len).map(|i| Some(format!("{name}_{i}"))).collect())
    };
    let (own_default, other_default) = (own.all_default(), other.all_default());
    if own_default && other_default {
        return Ok(NameRegistry::new(len));
    }
    if own.len() == other.len() && own.assignment() == other.assignment() {
        return NameRegistry::from_names(own.assignment());
    }
    if own_default {
        if other_stretched && other.len() != len {
            return repeated(other.name(0)?);
        }
        return NameRegistry::from_names(other.assignment());
    }
    if other_default {
        if own.len() > 1 || len == 1 {
            return NameRegistry::from_names(own.assignment());
        }
        return repeated(own.name(0)?);
    }
    if own.len() == other.len() {
        return NameRegistry::from_names(own.merged_with(other));
    }
    Ok(NameRegistry::new(len))
}

impl<'a, T: AFloat> Stretch<'a, T> {
    pub fn source(&self) -> &'a Base<T> {
        self.source
    }
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.source.shape()
    }

    fn validate(&self, other: StretchOperand<'_, T>) -> Result<()> {
        let (points, features) = self.shape();
        match other {
            StretchOperand::Stretch(other) => {
                let (other_points, other_features) = other.shape();
                ensure!(
                    (points == 1 && other_features == 1) || (features == 1 && other_points == 1),
                    ImproperAction,
                    "two stretched objects can only be combined when one is a single point and \
                     the other a single feature, got shapes {:?} and {:?}",
                    self.shape(),
                    other.shape()
                );
            }
            StretchOperand::Base(other) => {
                let (other_points, other_features) = other.shape();
                let axis = if points == 1 && features == 1 {
                    ensure!(
                        other_points == 1 || other_features == 1,
                        ArgumentValue,
                        "a single value can only be stretched against a vector, got shape {:?}",
                        other.shape()
                    );
                    if other_features == 1 {
                        AxisKind::Feature
                    } else {
                        AxisKind::Point
                    }
                } else if points == 1 {
                    AxisKind::Feature
                } else {
                    AxisKind::Point
                };
                let (own, theirs) = (self.source.axis_len(axis), other.axis_len(axis));
                ensure!(
                    own == theirs,
                    ArgumentValue,
                    "unable to stretch {own} {axis}s to fit an object with {theirs} {axis}s"
                );
                ensure!(
                    self.source
                        .registry(axis)
                        .is_consistent_with(other.registry(axis)),
                    ArgumentValue,
                    "the {axis} names of both objects must match"
                );
            }
        }
        Ok(())
    }

    /// both operands repeated to the output shape
    fn materialize<'s>(
        &'s self,
        other: StretchOperand<'s, T>,
    ) -> Result<(Cow<'s, Base<T>>, Cow<'s, Base<T>>)> {
        let (points, features) = self.shape();
        match other {
            StretchOperand::Base(other) => {
                let lhs = fit(self.source, other.shape())?;
                Ok((lhs, Cow::Borrowed(other)))
            }
            StretchOperand::Stretch(other) => {
                let (other_points, other_features) = other.shape();
                let shape = (points.max(other_points), features.max(other_features));
                Ok((fit(self.source, shape)?, fit(other.source, shape)?))
            }
        }
    }

    fn output_names(&self, other: StretchOperand<'_, T>) -> Result<(NameRegistry, NameRegistry)> {
        let (theirs, stretched) = match other {
            StretchOperand::Base(base) => (base, false),
            StretchOperand::Stretch(stretch) => (stretch.source, true),
        };
        let (points, features) = self.shape();
        let (other_points, other_features) = theirs.shape();
        Ok((
            stretched_names(
                &self.source.point_names,
                &theirs.point_names,
                points.max(other_points),
                stretched,
            )?,
            stretched_names(
                &self.source.feature_names,
                &theirs.feature_names,
                features.max(other_features),
                stretched,
            )?,
        ))
    }

    /// elementwise `stretched ⊕ other`, backed like the stretched source
    pub fn binary<'o>(&self, op: BinaryOp, other: impl Into<StretchOperand<'o, T>>) -> Result<Base<T>> {
        let other = other.into();
        self.validate(other)?;
        let names = self.output_names(other)?;
        let (lhs, rhs) = self.materialize(other)?;
        combine(op, &lhs, &rhs, names)
    }

    /// elementwise `other ⊕ stretched`, backed like `other`
    pub fn binary_reversed(&self, op: BinaryOp, other: &Base<T>) -> Result<Base<T>> {
        let other = StretchOperand::Base(other);
        self.validate(other)?;
        let names = self.output_names(other)?;
        let (stretched, other) = self.materialize(other)?;
        combine(op, &other, &stretched, names)
    }
}

/// `base` repeated along each of its length-one axes until it has `shape`
fn fit<T: AFloat>(base: &Base<T>, (points, features): (usize, usize)) -> Result<Cow<'_, Base<T>>> {
    let mut fitted = Cow::Borrowed(base);
    if fitted.point_count() == 1 && points > 1 {
        let repeated = fitted.points().repeat(points, true)?;
        fitted = Cow::Owned(repeated);
    }
    if fitted.feature_count() == 1 && features > 1 {
        let repeated = fitted.features().repeat(features, true)?;
        fitted = Cow::Owned(repeated);
    }
    Ok(fitted)
}

fn combine<T: AFloat>(
    op: BinaryOp,
    lhs: &Base<T>,
    rhs: &Base<T>,
    (point_names, feature_names): (NameRegistry, NameRegistry),
) -> Result<Base<T>> {
    if lhs.shape() != rhs.shape() {
        bail!(
            ShapeMismatch,
            "stretched shapes {:?} and {:?} do not align",
            lhs.shape(),
            rhs.shape()
        );
    }
    lhs.validate_binary(op, &Operand::Base(rhs))?;
    let backend = lhs.backend.combine(&rhs.backend, &move |a: T, b: T| op.apply(a, b));
    Ok(lhs.derive(backend, point_names, feature_names))
}

macro_rules! stretch_operator_impl {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<'a, 'b, T: AFloat> $trait<&'b Base<T>> for Stretch<'a, T> {
            type Output = Result<Base<T>>;

            fn $method(self, rhs: &'b Base<T>) -> Self::Output {
                self.binary($op, rhs)
            }
        }
        impl<'a, 'b, T: AFloat> $trait<Stretch<'b, T>> for Stretch<'a, T> {
            type Output = Result<Base<T>>;

            fn $method(self, rhs: Stretch<'b, T>) -> Self::Output {
                self.binary($op, rhs)
            }
        }
        impl<'a, 'b, T: AFloat> $trait<Stretch<'b, T>> for &'a Base<T> {
            type Output = Result<Base<T>>;

            fn $method(self, rhs: Stretch<'b, T>) -> Self::Output {
                rhs.binary_reversed($op, self)
            }
        }
    };
}

stretch_operator_impl!(Add, add, BinaryOp::Add);
stretch_operator_impl!(Sub, sub, BinaryOp::Sub);
stretch_operator_impl!(Mul, mul, BinaryOp::Mul);
stretch_operator_impl!(Div, div, BinaryOp::Div);
stretch_operator_impl!(Rem, rem, BinaryOp::Rem);
stretch_operator_impl!(BitAnd, bitand, BinaryOp::And);
stretch_operator_impl!(BitOr, bitor, BinaryOp::Or);
stretch_operator_impl!(BitXor, bitxor, BinaryOp::Xor);
