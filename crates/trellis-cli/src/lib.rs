//! Library half of the `trellis` binary: CSV input and logging setup.

pub mod input;
pub mod logging;
