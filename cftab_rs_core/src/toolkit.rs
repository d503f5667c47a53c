pub mod array;
pub mod convert;
pub mod misc;
