//! Job selection and derived-query orchestration.
//!
//! - [`JobCatalog`] owns the job list and the selected job.
//! - [`QuerySlot`] is the latest-wins primitive behind every derived
//!   query; [`DerivedSlots`] holds the attribution, media-metrics and
//!   budget slots and follows the catalog's selection.
//! - [`JobSubmissionFlow`] validates and submits new jobs.
//! - [`Explorer`] wires them to one [`JobService`](mmm_client::JobService).

pub mod catalog;
pub mod derived;
pub mod explorer;
pub mod slot;
pub mod submission;

pub use catalog::{CatalogStatus, JobCatalog, SelectError, SelectionObserver};
pub use derived::{BudgetControl, BudgetSlot, ChartSlot, DerivedSlots};
pub use explorer::Explorer;
pub use slot::{Fetcher, IssueOutcome, QueryResult, QuerySlot, SlotView};
pub use submission::JobSubmissionFlow;
