//! Error kinds raised by container operations.
//!
//! Every fallible operation validates its arguments before touching any storage, so an
//! `Err` always leaves the receiver unchanged.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// unknown name, or an index outside of the axis
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// an argument of the wrong kind for the requested operation
    #[error("argument type mismatch: {0}")]
    ArgumentType(String),

    /// an argument of the right kind holding a disallowed value
    #[error("argument value mismatch: {0}")]
    ArgumentValue(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("name conflict: {0}")]
    NameConflict(String),

    /// the operation is not allowed given the state of the object
    #[error("improper action: {0}")]
    ImproperAction(String),

    #[error("zero division: {0}")]
    ZeroDivision(String),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// returns early with the given [`Error`] kind and a formatted message
macro_rules! bail {
    ($kind:ident, $($arg:tt)*) => {
        return Err($crate::error::Error::$kind(format!($($arg)*)))
    };
}
pub(crate) use bail;

/// like [`bail!`], but only when `$cond` does not hold
macro_rules! ensure {
    ($cond:expr, $kind:ident, $($arg:tt)*) => {
        if !$cond {
            $crate::error::bail!($kind, $($arg)*);
        }
    };
}
pub(crate) use ensure;
