use super::Base;
use crate::{
    error::{bail, ensure, Result},
    names::NameRegistry,
    toolkit::array::{is_binary, AFloat},
};
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Sub};

/// elementwise binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    /// remainder carrying the sign of the divisor
    Rem,
    Pow,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    #[inline]
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
    #[inline]
    fn divides(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem)
    }

    #[inline]
    pub fn apply<T: AFloat>(self, a: T, b: T) -> T {
        let truth = |v: bool| if v { T::one() } else { T::zero() };
        let zero = T::zero();
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::FloorDiv => (a / b).floor(),
            BinaryOp::Rem => {
                let r = a % b;
                if r != zero && (r < zero) != (b < zero) {
                    r + b
                } else {
                    r
                }
            }
            BinaryOp::Pow => a.powf(b),
            BinaryOp::And => truth(a != zero && b != zero),
            BinaryOp::Or => truth(a != zero || b != zero),
            BinaryOp::Xor => truth((a != zero) != (b != zero)),
        }
    }
}

/// the right hand side of a binary operation
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a, T: AFloat> {
    Scalar(T),
    Base(&'a Base<T>),
}

impl<'a, T: AFloat> From<&'a Base<T>> for Operand<'a, T> {
    fn from(base: &'a Base<T>) -> Self {
        Operand::Base(base)
    }
}

macro_rules! operand_from_scalar {
    ($($dtype:ty),*) => {
        $(
            impl<'a> From<$dtype> for Operand<'a, $dtype> {
                fn from(value: $dtype) -> Self {
                    Operand::Scalar(value)
                }
            }
        )*
    };
}
operand_from_scalar!(f32, f64);

/// output names along one axis of `lhs ⊕ rhs`
fn reconciled(lhs: &NameRegistry, rhs: &NameRegistry, consistent: bool) -> Result<NameRegistry> {
    if !consistent {
        return Ok(NameRegistry::new(lhs.len()));
    }
    if rhs.all_default() {
        return Ok(lhs.clone());
    }
    NameRegistry::from_names(lhs.merged_with(rhs))
}

impl<T: AFloat> Base<T> {
    pub(crate) fn validate_binary(&self, op: BinaryOp, operand: &Operand<'_, T>) -> Result<()> {
        ensure!(
            !self.is_empty(),
            ImproperAction,
            "cannot apply {op:?} to an empty object of shape {:?}",
            self.shape()
        );
        match operand {
            Operand::Scalar(value) => {
                if op.divides() {
                    ensure!(*value != T::zero(), ZeroDivision, "cannot apply {op:?} with 0");
                }
                if op.is_logical() {
                    ensure!(
                        *value == T::zero() || *value == T::one(),
                        ImproperAction,
                        "logical operations require 0/1 values, got {value}"
                    );
                }
            }
            Operand::Base(other) => {
                ensure!(
                    !other.is_empty(),
                    ImproperAction,
                    "cannot apply {op:?} with an empty object of shape {:?}",
                    other.shape()
                );
                ensure!(
                    self.shape() == other.shape(),
                    ShapeMismatch,
                    "cannot apply {op:?} to objects of shapes {:?} and {:?}",
                    self.shape(),
                    other.shape()
                );
                if op.divides() {
                    ensure!(
                        !other.contains_zero(),
                        ZeroDivision,
                        "cannot apply {op:?} with an object containing 0"
                    );
                }
                if op.is_logical() {
                    ensure!(
                        is_binary(other.backend.values()),
                        ImproperAction,
                        "logical operations require 0/1 values on both sides"
                    );
                }
            }
        }
        if op == BinaryOp::Pow && self.contains_zero() {
            let negative = match operand {
                Operand::Scalar(value) => *value < T::zero(),
                Operand::Base(other) => self
                    .backend
                    .values()
                    .into_iter()
                    .zip(other.backend.values())
                    .any(|(a, b)| a == T::zero() && b < T::zero()),
            };
            ensure!(!negative, ZeroDivision, "cannot raise 0 to a negative power");
        }
        if op.is_logical() {
            ensure!(
                is_binary(self.backend.values()),
                ImproperAction,
                "logical operations require 0/1 values on both sides"
            );
        }
        Ok(())
    }

    /// output registries of `self ⊕ other`: names must be consistent along at least one
    /// axis, and the user names along the other one must not overlap
    fn binary_names(&self, other: &Base<T>) -> Result<(NameRegistry, NameRegistry)> {
        let points = self.point_names.is_consistent_with(&other.point_names);
        let features = self.feature_names.is_consistent_with(&other.feature_names);
        if !points && !features {
            bail!(
                ArgumentValue,
                "point and feature names are both inconsistent between the two objects"
            );
        }
        for (consistent, lhs, rhs, axis) in [
            (points, &self.point_names, &other.point_names, "point"),
            (features, &self.feature_names, &other.feature_names, "feature"),
        ] {
            if !consistent {
                let lhs = lhs.non_default();
                if let Some(shared) = rhs.non_default().iter().find(|n| lhs.contains(n)) {
                    bail!(
                        ArgumentValue,
                        "the {axis} name '{shared}' is found at different positions"
                    );
                }
            }
        }
        Ok((
            reconciled(&self.point_names, &other.point_names, points)?,
            reconciled(&self.feature_names, &other.feature_names, features)?,
        ))
    }

    /// elementwise `self ⊕ operand`
    pub fn binary<'o>(&self, op: BinaryOp, operand: impl Into<Operand<'o, T>>) -> Result<Base<T>> {
        let operand = operand.into();
        self.validate_binary(op, &operand)?;
        let f = move |a: T, b: T| op.apply(a, b);
        match operand {
            Operand::Scalar(value) => {
                let backend = self.backend.map(&move |a: T| op.apply(a, value));
                Ok(self.derive(backend, self.point_names.clone(), self.feature_names.clone()))
            }
            Operand::Base(other) => {
                let (point_names, feature_names) = self.binary_names(other)?;
                let backend = self.backend.combine(&other.backend, &f);
                Ok(self.derive(backend, point_names, feature_names))
            }
        }
    }

    /// elementwise `self = self ⊕ operand`
    pub fn binary_in_place<'o>(
        &mut self,
        op: BinaryOp,
        operand: impl Into<Operand<'o, T>>,
    ) -> Result<()> {
        let result = self.binary(op, operand)?;
        self.backend = result.backend;
        self.point_names = result.point_names;
        self.feature_names = result.feature_names;
        Ok(())
    }

    pub fn logical_not(&self) -> Result<Base<T>> {
        ensure!(
            is_binary(self.backend.values()),
            ImproperAction,
            "logical operations require 0/1 values"
        );
        let backend = self.backend.map(&|v: T| T::one() - v);
        Ok(self.derive(backend, self.point_names.clone(), self.feature_names.clone()))
    }

    pub fn neg(&self) -> Result<Base<T>> {
        ensure!(!self.is_empty(), ImproperAction, "cannot negate an empty object");
        let backend = self.backend.map(&|v: T| -v);
        Ok(self.derive(backend, self.point_names.clone(), self.feature_names.clone()))
    }

    pub fn abs(&self) -> Result<Base<T>> {
        ensure!(!self.is_empty(), ImproperAction, "cannot apply abs to an empty object");
        let backend = self.backend.map(&|v: T| v.abs());
        Ok(self.derive(backend, self.point_names.clone(), self.feature_names.clone()))
    }
}

macro_rules! binary_operator_impl {
    (@scalar $trait:ident, $method:ident, $op:expr, $dtype:ty) => {
        impl<'a> $trait<$dtype> for &'a Base<$dtype> {
            type Output = Result<Base<$dtype>>;

            fn $method(self, rhs: $dtype) -> Self::Output {
                self.binary($op, rhs)
            }
        }
    };
    ($trait:ident, $method:ident, $op:expr) => {
        impl<'a, 'b, T: AFloat> $trait<&'b Base<T>> for &'a Base<T> {
            type Output = Result<Base<T>>;

            fn $method(self, rhs: &'b Base<T>) -> Self::Output {
                self.binary($op, rhs)
            }
        }
        binary_operator_impl!(@scalar $trait, $method, $op, f32);
        binary_operator_impl!(@scalar $trait, $method, $op, f64);
    };
}

binary_operator_impl!(Add, add, BinaryOp::Add);
binary_operator_impl!(Sub, sub, BinaryOp::Sub);
binary_operator_impl!(Mul, mul, BinaryOp::Mul);
binary_operator_impl!(Div, div, BinaryOp::Div);
binary_operator_impl!(Rem, rem, BinaryOp::Rem);
binary_operator_impl!(BitAnd, bitand, BinaryOp::And);
binary_operator_impl!(BitOr, bitor, BinaryOp::Or);
binary_operator_impl!(BitXor, bitxor, BinaryOp::Xor);

impl<'a, T: AFloat> Neg for &'a Base<T> {
    type Output = Result<Base<T>>;

    fn neg(self) -> Self::Output {
        Base::neg(self)
    }
}

impl<'a, T: AFloat> Not for &'a Base<T> {
    type Output = Result<Base<T>>;

    fn not(self) -> Self::Output {
        self.logical_not()
    }
}
