//! Job records as reported by the remote compute service.
//!
//! The client never mutates a [`JobRecord`]; a catalog refresh replaces
//! its local copy wholesale.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::{opt_text_from_scalar, opt_u32_from_scalar, u32_from_scalar};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle phase the client distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Running,
    Completed,
    Failed,
    Other,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other => "other",
        }
    }
}

/// Status of a remote job as the service reported it.
///
/// The service vocabulary is wider than the phases the client cares
/// about, so the raw value is kept next to its [`JobPhase`] and is what
/// serializes back out. Only [`JobPhase::Completed`] unlocks the derived
/// chart and budget queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct JobStatus {
    phase: JobPhase,
    raw: String,
}

impl JobStatus {
    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn is_completed(&self) -> bool {
        self.phase == JobPhase::Completed
    }

    /// `true` once the job can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, JobPhase::Completed | JobPhase::Failed)
    }

    /// The value exactly as the service sent it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        let phase = match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "submitted" | "runnable" | "starting" => JobPhase::Queued,
            "in_progress" | "running" => JobPhase::Running,
            "completed" => JobPhase::Completed,
            "failed" => JobPhase::Failed,
            _ => JobPhase::Other,
        };
        Self { phase, raw }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        raw.to_string().into()
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.raw
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ComputeType
// ---------------------------------------------------------------------------

const CPU_CORE_OPTIONS: &[u32] = &[1, 4, 8, 16, 32, 48, 64, 96, 128, 192];
const GPU_CORE_OPTIONS: &[u32] = &[1, 2, 4, 8];

/// Requested compute class for a training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComputeType {
    #[default]
    Cpu,
    GpuA10,
    GpuH100,
}

impl ComputeType {
    pub const ALL: [ComputeType; 3] = [Self::Cpu, Self::GpuA10, Self::GpuH100];

    /// Wire and display label, e.g. `"GPU (A10)"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::GpuA10 => "GPU (A10)",
            Self::GpuH100 => "GPU (H100)",
        }
    }

    pub fn is_gpu(self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Largest core count this compute class accepts.
    pub fn max_cores(self) -> u32 {
        if self.is_gpu() {
            8
        } else {
            192
        }
    }

    /// Core counts offered for selection with this compute class.
    pub fn core_options(self) -> &'static [u32] {
        if self.is_gpu() {
            GPU_CORE_OPTIONS
        } else {
            CPU_CORE_OPTIONS
        }
    }

    /// Whether a core count chosen under `self` stays meaningful under
    /// `other`.
    pub fn shares_core_range(self, other: ComputeType) -> bool {
        self.max_cores() == other.max_cores()
    }
}

impl TryFrom<String> for ComputeType {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown compute type {raw:?}"))
    }
}

impl From<ComputeType> for String {
    fn from(value: ComputeType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Compute class recorded on a listed job.
///
/// The service may report classes the form does not offer; those are kept
/// verbatim instead of failing the whole job list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestedCompute {
    Known(ComputeType),
    Other(String),
}

impl RequestedCompute {
    pub fn known(&self) -> Option<ComputeType> {
        match self {
            Self::Known(compute_type) => Some(*compute_type),
            Self::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(compute_type) => compute_type.as_str(),
            Self::Other(raw) => raw,
        }
    }
}

impl From<ComputeType> for RequestedCompute {
    fn from(compute_type: ComputeType) -> Self {
        Self::Known(compute_type)
    }
}

impl From<String> for RequestedCompute {
    fn from(raw: String) -> Self {
        match ComputeType::try_from(raw.clone()) {
            Ok(compute_type) => Self::Known(compute_type),
            Err(_) => Self::Other(raw),
        }
    }
}

impl From<RequestedCompute> for String {
    fn from(value: RequestedCompute) -> Self {
        match value {
            RequestedCompute::Known(compute_type) => compute_type.into(),
            RequestedCompute::Other(raw) => raw,
        }
    }
}

impl fmt::Display for RequestedCompute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// A training job known to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque, unique job identifier.
    pub job_id: String,
    #[serde(default)]
    pub job_name: String,

    #[serde(rename = "req_media_table")]
    pub media_table: String,
    #[serde(rename = "req_kpi_table")]
    pub kpi_table: String,
    #[serde(rename = "req_cost_table")]
    pub cost_table: String,
    #[serde(rename = "req_feature_table")]
    pub feature_table: String,

    #[serde(rename = "req_number_warmup", deserialize_with = "u32_from_scalar")]
    pub warmup_cycles: u32,
    #[serde(rename = "req_number_samples", deserialize_with = "u32_from_scalar")]
    pub samples: u32,
    #[serde(rename = "req_number_chains", deserialize_with = "u32_from_scalar")]
    pub chains: u32,

    #[serde(rename = "req_compute_type")]
    pub compute_type: RequestedCompute,
    #[serde(rename = "req_compute_cores", deserialize_with = "u32_from_scalar")]
    pub compute_cores: u32,
    #[serde(
        rename = "req_memory_multp",
        default,
        deserialize_with = "opt_u32_from_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_multiplier: Option<u32>,

    pub job_status: JobStatus,

    /// Post-hoc fields filled in by the service as execution finishes.
    #[serde(flatten)]
    pub details: ExecutionDetails,
}

impl JobRecord {
    pub fn is_completed(&self) -> bool {
        self.job_status.is_completed()
    }
}

/// Optional fields populated once a job has run.
///
/// They are meant to arrive together, but the service writes them
/// piecemeal, so any subset may be present at a given moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDetails {
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub batch_job_id: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub batch_job_status: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub batch_job_status_time: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub model_uri: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub proc_data_size: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub proc_n_media_channels: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub proc_n_geos: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub proc_compute_type: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub proc_compute_cores: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub proc_instance_type: Option<String>,
    #[serde(default, deserialize_with = "opt_text_from_scalar")]
    pub execution_time: Option<String>,
}

impl ExecutionDetails {
    /// `(wire name, value)` for every field, in display order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 11] {
        [
            ("batch_job_id", self.batch_job_id.as_deref()),
            ("batch_job_status", self.batch_job_status.as_deref()),
            ("batch_job_status_time", self.batch_job_status_time.as_deref()),
            ("model_uri", self.model_uri.as_deref()),
            ("proc_data_size", self.proc_data_size.as_deref()),
            ("proc_n_media_channels", self.proc_n_media_channels.as_deref()),
            ("proc_n_geos", self.proc_n_geos.as_deref()),
            ("proc_compute_type", self.proc_compute_type.as_deref()),
            ("proc_compute_cores", self.proc_compute_cores.as_deref()),
            ("proc_instance_type", self.proc_instance_type.as_deref()),
            ("execution_time", self.execution_time.as_deref()),
        ]
    }

    /// The fields that have arrived so far.
    pub fn present(&self) -> Vec<(&'static str, &str)> {
        self.fields()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_some())
    }
}

/// Body of `GET /frontend/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobList {
    pub items: Vec<JobRecord>,
    /// Pagination cursor; the client reads a single page.
    #[serde(default)]
    pub next_key: Option<serde_json::Value>,
}
