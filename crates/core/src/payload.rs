//! Chart and budget payloads returned by the analytics endpoints.
//!
//! The explorer only transports these; presentation decides how to draw
//! them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chart variants served by `GET /frontend/jobs/{job_id}/graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphType {
    /// Baseline and per-channel attribution over time (stacked area).
    #[serde(rename = "media_baseline_contribution_area_plot")]
    AttributionArea,
    /// Per-channel contribution percentage with credibility intervals.
    #[serde(rename = "bars_media_metrics")]
    MediaMetrics,
}

impl GraphType {
    /// Value of the `graph_type` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttributionArea => "media_baseline_contribution_area_plot",
            Self::MediaMetrics => "bars_media_metrics",
        }
    }

    /// Decode a response body for this graph type.
    pub fn decode(self, body: serde_json::Value) -> Result<GraphPayload, serde_json::Error> {
        Ok(match self {
            Self::AttributionArea => GraphPayload::Attribution(serde_json::from_value(body)?),
            Self::MediaMetrics => GraphPayload::MediaMetrics(serde_json::from_value(body)?),
        })
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: String,
    pub y: f64,
}

/// A named series, e.g. one media channel's attribution per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub data: Vec<DataPoint>,
}

/// One bar of the contribution-percentage chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBar {
    /// Channel name.
    pub x: String,
    /// Contribution percentage.
    pub y: f64,
    #[serde(rename = "errorX", default)]
    pub error_x: f64,
    /// Half-width of the 0.05 - 0.95 credibility interval.
    #[serde(rename = "errorY", default)]
    pub error_y: f64,
}

/// Decoded chart body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphPayload {
    Attribution(Vec<Series>),
    MediaMetrics(Vec<MetricBar>),
}

impl GraphPayload {
    pub fn graph_type(&self) -> GraphType {
        match self {
            Self::Attribution(_) => GraphType::AttributionArea,
            Self::MediaMetrics(_) => GraphType::MediaMetrics,
        }
    }

    /// Number of series (attribution) or bars (media metrics).
    pub fn len(&self) -> usize {
        match self {
            Self::Attribution(series) => series.len(),
            Self::MediaMetrics(bars) => bars.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Budget optimization
// ---------------------------------------------------------------------------

pub const OPTIMAL_ALLOCATION_ID: &str = "optimal_budget_allocation";
pub const PREVIOUS_ALLOCATION_ID: &str = "previous_budget_allocation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPoint {
    /// Channel name.
    pub x: String,
    /// Budget amount allocated to the channel.
    pub y: f64,
    /// Share of the total budget, `0.0 ..= 1.0`.
    #[serde(default)]
    pub y1_label: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSeries {
    pub id: String,
    pub data: Vec<AllocationPoint>,
}

/// Predicted target before and after optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetComparison {
    pub data: Vec<DataPoint>,
}

/// Body of `GET /backend/budget`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPayload {
    /// Optimal and previous allocation, one series each.
    pub graph1: Vec<AllocationSeries>,
    pub graph2: TargetComparison,
}

impl BudgetPayload {
    pub fn optimal(&self) -> Option<&AllocationSeries> {
        self.allocation(OPTIMAL_ALLOCATION_ID)
    }

    pub fn previous(&self) -> Option<&AllocationSeries> {
        self.allocation(PREVIOUS_ALLOCATION_ID)
    }

    fn allocation(&self, id: &str) -> Option<&AllocationSeries> {
        self.graph1.iter().find(|s| s.id == id)
    }

    /// Post-optimization minus pre-optimization predicted target.
    ///
    /// `None` unless both predictions are present.
    pub fn target_delta(&self) -> Option<f64> {
        match self.graph2.data.as_slice() {
            [pre, post, ..] => Some(post.y - pre.y),
            _ => None,
        }
    }
}
