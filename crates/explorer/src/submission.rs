//! Creating new training jobs.

use std::sync::{Arc, Mutex, MutexGuard};

use mmm_client::JobService;
use mmm_core::error::ClientError;
use mmm_core::form::{JobForm, JobSubmission};
use mmm_core::tables::{TableCatalog, TableRole};
use mmm_events::{EventBus, EventKind};

/// Validates and submits job forms.
///
/// Submitting does not refresh the job catalog; callers refresh when they
/// want the new job to appear.
pub struct JobSubmissionFlow {
    service: Arc<dyn JobService>,
    events: Arc<EventBus>,
    tables: Mutex<Option<TableCatalog>>,
}

impl JobSubmissionFlow {
    pub fn new(service: Arc<dyn JobService>, events: Arc<EventBus>) -> Self {
        Self {
            service,
            events,
            tables: Mutex::new(None),
        }
    }

    /// Fetch the available source tables. The result replaces any
    /// previously loaded catalog and is used to validate later submissions.
    pub async fn load_table_catalog(&self) -> Result<TableCatalog, ClientError> {
        let catalog = TableCatalog::new(self.service.list_tables().await?);
        tracing::debug!(count = catalog.len(), "Loaded table catalog");
        *self.tables() = Some(catalog.clone());
        Ok(catalog)
    }

    pub fn table_catalog(&self) -> Option<TableCatalog> {
        self.tables().clone()
    }

    /// Tables offered for `role`; empty until the catalog is loaded.
    pub fn candidates(&self, role: TableRole) -> Vec<String> {
        self.tables()
            .as_ref()
            .map(|catalog| {
                catalog
                    .candidates(role)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate `form` and submit it.
    ///
    /// Validation failures are recorded on the form and returned as
    /// [`ClientError::Validation`] without any request being made.
    pub async fn submit(&self, form: &mut JobForm) -> Result<JobSubmission, ClientError> {
        let submission = {
            let tables = self.tables();
            form.validate(tables.as_ref())
        };
        let submission = match submission {
            Ok(submission) => submission,
            Err(err) => {
                tracing::debug!(field = %err.field, "Job form rejected");
                return Err(err.into());
            }
        };

        self.service.submit_job(&submission).await?;

        tracing::info!(
            job_name = %submission.job_name,
            compute_type = %submission.compute_type,
            compute_cores = submission.compute_cores,
            "Job submitted",
        );
        self.events.publish(EventKind::JobSubmitted {
            job_name: submission.job_name.clone(),
        });
        Ok(submission)
    }

    fn tables(&self) -> MutexGuard<'_, Option<TableCatalog>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}
