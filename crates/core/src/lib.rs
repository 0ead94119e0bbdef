//! Domain model for the media-mix job explorer.
//!
//! Pure logic only: job records and their wire vocabulary, chart and
//! budget payloads, the client error taxonomy, and the job submission
//! form with its validation rules. Nothing in this crate performs I/O.

pub mod budget;
pub mod error;
pub mod form;
pub mod job;
pub mod payload;
pub mod query;
pub mod tables;

mod wire;
