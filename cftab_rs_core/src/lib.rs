//! # cftab_core
//!
//! a two-axis tabular container engine: named points (rows) and features (columns) laid
//! over either a dense array or a sparse coordinate list.
//!
//! # Design
//!
//! [`Base`] owns one [`backend::Backend`] plus a [`names::NameRegistry`] per axis. Axis
//! generic operations live in [`axis`] and are written once against [`AxisKind`]; the
//! backend only exposes positional primitives. [`View`] and [`Stretch`] borrow a `Base`,
//! so the borrow checker keeps them from outliving (or observing a mutation of) their
//! source.

pub mod axis;
pub mod backend;
pub mod base;
pub mod error;
pub mod merge;
pub mod names;
pub mod stretch;
pub mod toolkit;
pub mod view;

pub use axis::{Axis, AxisMut, Selection, SortBy, Target};
pub use backend::{AxisKind, BackendKind};
pub use base::{BinaryOp, Operand, Paths, FORMAT_MAGIC};
pub use error::{Error, Result};
pub use merge::{MergeOptions, MergePolicy};
pub use names::{Identifier, NameAssignment, DEFAULT_PREFIX};
pub use stretch::{Stretch, StretchOperand};
pub use view::View;

pub use base::Base;
