//! Plain-text rendering of catalog and slot state.

use std::fmt::Write;

use mmm_core::budget::format_budget;
use mmm_core::job::JobRecord;
use mmm_core::payload::{BudgetPayload, GraphPayload};
use mmm_explorer::QueryResult;

const ID_WIDTH: usize = 12;
const NAME_WIDTH: usize = 28;

/// One line per job in service order.
pub fn job_table(jobs: &[JobRecord]) -> String {
    if jobs.is_empty() {
        return "No jobs found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<ID_WIDTH$} {:<NAME_WIDTH$} {:<12} {:<11} {:>5}",
        "JOB ID", "NAME", "STATUS", "COMPUTE", "CORES"
    );
    for job in jobs {
        let _ = writeln!(
            out,
            "{:<ID_WIDTH$} {:<NAME_WIDTH$} {:<12} {:<11} {:>5}",
            clip(&job.job_id, ID_WIDTH),
            clip(&job.job_name, NAME_WIDTH),
            job.job_status,
            job.compute_type,
            job.compute_cores,
        );
    }
    out
}

/// Source tables, run parameters and whatever execution details the
/// service has filled in so far.
pub fn job_details(job: &JobRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", job.job_name, job.job_id);
    let _ = writeln!(out, "  status:   {}", job.job_status);
    let _ = writeln!(
        out,
        "  tables:   kpi={} cost={} feature={} media={}",
        job.kpi_table, job.cost_table, job.feature_table, job.media_table
    );
    let _ = writeln!(
        out,
        "  sampling: warmup={} samples={} chains={}",
        job.warmup_cycles, job.samples, job.chains
    );
    let _ = writeln!(out, "  compute:  {} x{}", job.compute_type, job.compute_cores);
    for (name, value) in job.details.present() {
        let _ = writeln!(out, "  {name}: {value}");
    }
    out
}

/// One line summarizing a chart slot.
pub fn chart_summary(label: &str, result: &QueryResult<GraphPayload>) -> String {
    match result {
        QueryResult::Idle => format!("{label}: idle"),
        QueryResult::Loading => format!("{label}: loading"),
        QueryResult::Failed(err) => format!("{label}: failed ({err})"),
        QueryResult::Ready(payload) => match payload.as_ref() {
            GraphPayload::Attribution(series) => {
                let periods = series.iter().map(|s| s.data.len()).max().unwrap_or(0);
                format!("{label}: {} series over {periods} periods", series.len())
            }
            GraphPayload::MediaMetrics(bars) => {
                let top = bars
                    .iter()
                    .max_by(|a, b| a.y.total_cmp(&b.y))
                    .map(|bar| format!(", top {} at {:.1}%", bar.x, bar.y * 100.0))
                    .unwrap_or_default();
                format!("{label}: {} channels{top}", bars.len())
            }
        },
    }
}

/// The optimal allocation per channel and the predicted target change.
pub fn budget_report(amount: u32, payload: &BudgetPayload) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Optimized budget {}", format_budget(amount));
    if let Some(optimal) = payload.optimal() {
        for point in &optimal.data {
            let _ = writeln!(
                out,
                "  {:<16} {:>16} {:>6.1}%",
                point.x,
                format_budget(point.y.max(0.0).round() as u32),
                point.y1_label * 100.0
            );
        }
    }
    if let Some(delta) = payload.target_delta() {
        let _ = writeln!(out, "Predicted target change: {delta:+.2}");
    }
    out
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(1)).collect();
    clipped.push('~');
    clipped
}
