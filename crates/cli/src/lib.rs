//! Library half of the `mmm-cli` binary: option parsing and plain-text
//! rendering of explorer state.

pub mod options;
pub mod report;
