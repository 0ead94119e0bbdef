//! New-job form state and submit-time validation.
//!
//! The form owns every field value plus the error message (if any) for
//! each field. Validation runs on a submit attempt, not per edit, and
//! records all failing fields at once; the caller gets the first one.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;
use crate::job::ComputeType;
use crate::tables::{TableCatalog, TableRole};

pub const WARMUP_RANGE: (u32, u32) = (1, 10_000);
pub const SAMPLES_RANGE: (u32, u32) = (1, 10_000);
pub const CHAINS_RANGE: (u32, u32) = (1, 12);

pub const DEFAULT_WARMUP: u32 = 1_000;
pub const DEFAULT_SAMPLES: u32 = 1_000;
pub const DEFAULT_CHAINS: u32 = 2;
pub const DEFAULT_MEMORY_MULTIPLIER: u32 = 2;

/// Inputs that can fail client-side validation, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FormField {
    JobName,
    KpiTable,
    CostTable,
    FeatureTable,
    MediaTable,
    WarmupCycles,
    Samples,
    Chains,
    ComputeType,
    ComputeCores,
    MemoryMultiplier,
    /// The budget slider, which stages a value outside the job form.
    Budget,
}

impl FormField {
    /// Wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobName => "job_name",
            Self::KpiTable => "req_kpi_table",
            Self::CostTable => "req_cost_table",
            Self::FeatureTable => "req_feature_table",
            Self::MediaTable => "req_media_table",
            Self::WarmupCycles => "req_number_warmup",
            Self::Samples => "req_number_samples",
            Self::Chains => "req_number_chains",
            Self::ComputeType => "req_compute_type",
            Self::ComputeCores => "req_compute_cores",
            Self::MemoryMultiplier => "req_memory_multp",
            Self::Budget => "budget",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated request body for `PUT /frontend/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSubmission {
    pub job_name: String,
    #[serde(rename = "req_media_table")]
    pub media_table: String,
    #[serde(rename = "req_kpi_table")]
    pub kpi_table: String,
    #[serde(rename = "req_cost_table")]
    pub cost_table: String,
    #[serde(rename = "req_feature_table")]
    pub feature_table: String,
    #[serde(rename = "req_number_warmup")]
    pub warmup_cycles: u32,
    #[serde(rename = "req_number_samples")]
    pub samples: u32,
    #[serde(rename = "req_number_chains")]
    pub chains: u32,
    #[serde(rename = "req_compute_type")]
    pub compute_type: ComputeType,
    #[serde(rename = "req_compute_cores")]
    pub compute_cores: u32,
    #[serde(rename = "req_memory_multp")]
    pub memory_multiplier: u32,
}

/// Editable state of the "train new model" form.
///
/// Compute type and core count are coupled: changing the compute type to
/// one with a different core range discards the chosen core count, so the
/// user has to pick again from the new option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobForm {
    pub job_name: String,
    pub kpi_table: Option<String>,
    pub cost_table: Option<String>,
    pub feature_table: Option<String>,
    pub media_table: Option<String>,
    pub warmup_cycles: Option<u32>,
    pub samples: Option<u32>,
    pub chains: Option<u32>,
    pub memory_multiplier: Option<u32>,
    compute_type: ComputeType,
    compute_cores: Option<u32>,
    errors: BTreeMap<FormField, String>,
}

impl Default for JobForm {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            kpi_table: None,
            cost_table: None,
            feature_table: None,
            media_table: None,
            warmup_cycles: Some(DEFAULT_WARMUP),
            samples: Some(DEFAULT_SAMPLES),
            chains: Some(DEFAULT_CHAINS),
            memory_multiplier: Some(DEFAULT_MEMORY_MULTIPLIER),
            compute_type: ComputeType::default(),
            compute_cores: None,
            errors: BTreeMap::new(),
        }
    }
}

impl JobForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, role: TableRole) -> Option<&str> {
        match role {
            TableRole::Kpi => self.kpi_table.as_deref(),
            TableRole::Cost => self.cost_table.as_deref(),
            TableRole::Feature => self.feature_table.as_deref(),
            TableRole::Media => self.media_table.as_deref(),
        }
    }

    pub fn set_table(&mut self, role: TableRole, name: impl Into<String>) {
        let slot = match role {
            TableRole::Kpi => &mut self.kpi_table,
            TableRole::Cost => &mut self.cost_table,
            TableRole::Feature => &mut self.feature_table,
            TableRole::Media => &mut self.media_table,
        };
        *slot = Some(name.into());
    }

    pub fn compute_type(&self) -> ComputeType {
        self.compute_type
    }

    pub fn compute_cores(&self) -> Option<u32> {
        self.compute_cores
    }

    /// Change the compute class. Returns `true` if a previously chosen
    /// core count was discarded.
    pub fn set_compute_type(&mut self, compute_type: ComputeType) -> bool {
        let previous = std::mem::replace(&mut self.compute_type, compute_type);
        if self.compute_cores.is_some() && !previous.shares_core_range(compute_type) {
            self.compute_cores = None;
            return true;
        }
        false
    }

    pub fn set_compute_cores(&mut self, cores: u32) {
        self.compute_cores = Some(cores);
    }

    /// Core counts to offer for the current compute type.
    pub fn core_options(&self) -> &'static [u32] {
        self.compute_type.core_options()
    }

    /// Messages recorded by the last [`validate`](Self::validate) call.
    pub fn errors(&self) -> &BTreeMap<FormField, String> {
        &self.errors
    }

    pub fn error(&self, field: FormField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Check every field against its rules.
    ///
    /// Replaces the recorded errors with this attempt's failures and
    /// returns the first failing field in form order, or the request body
    /// when everything passes. `tables` is the catalog loaded for the
    /// form; without it no table reference can be accepted.
    pub fn validate(&mut self, tables: Option<&TableCatalog>) -> Result<JobSubmission, ValidationError> {
        let mut errors = BTreeMap::new();

        let job_name = self.job_name.trim().to_string();
        if job_name.is_empty() {
            errors.insert(FormField::JobName, "Please enter a job description".to_string());
        }

        for role in TableRole::ALL {
            if let Some(message) = check_table(role, self.table(role), tables) {
                errors.insert(role.field(), message);
            }
        }

        let warmup = check_range(
            &mut errors,
            FormField::WarmupCycles,
            self.warmup_cycles,
            WARMUP_RANGE,
            "warmup cycles",
        );
        let samples = check_range(
            &mut errors,
            FormField::Samples,
            self.samples,
            SAMPLES_RANGE,
            "samples",
        );
        let chains = check_range(
            &mut errors,
            FormField::Chains,
            self.chains,
            CHAINS_RANGE,
            "chains",
        );

        let max_cores = self.compute_type.max_cores();
        let cores = check_range(
            &mut errors,
            FormField::ComputeCores,
            self.compute_cores,
            (1, max_cores),
            &format!("{} cores", self.compute_type),
        );

        let memory_multiplier = match self.memory_multiplier {
            Some(m) if m >= 1 => Some(m),
            _ => {
                errors.insert(
                    FormField::MemoryMultiplier,
                    "Please choose a memory multiplier".to_string(),
                );
                None
            }
        };

        let first = errors
            .iter()
            .next()
            .map(|(field, message)| ValidationError::new(*field, message.clone()));
        self.errors = errors;
        if let Some(err) = first {
            return Err(err);
        }

        // Every value was checked above; a missing one here means an error
        // was recorded and we already returned.
        match (warmup, samples, chains, cores, memory_multiplier) {
            (Some(warmup_cycles), Some(samples), Some(chains), Some(compute_cores), Some(memory_multiplier)) => {
                Ok(JobSubmission {
                    job_name,
                    media_table: self.media_table.clone().unwrap_or_default(),
                    kpi_table: self.kpi_table.clone().unwrap_or_default(),
                    cost_table: self.cost_table.clone().unwrap_or_default(),
                    feature_table: self.feature_table.clone().unwrap_or_default(),
                    warmup_cycles,
                    samples,
                    chains,
                    compute_type: self.compute_type,
                    compute_cores,
                    memory_multiplier,
                })
            }
            _ => Err(ValidationError::new(
                FormField::JobName,
                "Form is incomplete",
            )),
        }
    }
}

fn check_table(role: TableRole, value: Option<&str>, tables: Option<&TableCatalog>) -> Option<String> {
    let name = match value.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Some(format!(
                "Please choose a source table for {} data",
                role.label()
            ))
        }
    };
    match tables {
        None => Some("Table catalog has not been loaded".to_string()),
        Some(catalog) if !catalog.offers(role, name) => {
            Some(format!("{name} is not an available {role} table"))
        }
        Some(_) => None,
    }
}

fn check_range(
    errors: &mut BTreeMap<FormField, String>,
    field: FormField,
    value: Option<u32>,
    (min, max): (u32, u32),
    what: &str,
) -> Option<u32> {
    match value {
        Some(v) if (min..=max).contains(&v) => Some(v),
        _ => {
            errors.insert(
                field,
                format!("Please choose a valid number of {what} ({min} - {max})"),
            );
            None
        }
    }
}
