//! Command-line arguments for each binary.

pub mod ctl;
pub mod map;
pub mod reduce;
