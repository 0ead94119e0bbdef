use mmm_client::ConfigError;
use mmm_core::budget::validate_budget;

/// What the binary does after the first catalog refresh.
///
/// | Env Var               | Default |
/// |-----------------------|---------|
/// | `MMM_SELECT_JOB`      | unset   |
/// | `MMM_OPTIMIZE_BUDGET` | unset   |
/// | `MMM_LOG_FORMAT`      | `text`  |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Job to select once the catalog is loaded.
    pub select_job: Option<String>,
    /// Budget to commit for the selected job.
    pub optimize_budget: Option<u32>,
    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl CliOptions {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let select_job = lookup("MMM_SELECT_JOB")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let optimize_budget = lookup("MMM_OPTIMIZE_BUDGET")
            .map(|raw| {
                let invalid = |reason: String| ConfigError::Invalid {
                    var: "MMM_OPTIMIZE_BUDGET",
                    reason,
                };
                let amount = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| invalid(format!("{raw:?}: {e}")))?;
                validate_budget(amount).map_err(|e| invalid(e.message))
            })
            .transpose()?;

        if optimize_budget.is_some() && select_job.is_none() {
            return Err(ConfigError::Invalid {
                var: "MMM_OPTIMIZE_BUDGET",
                reason: "requires MMM_SELECT_JOB".into(),
            });
        }

        let json_logs = lookup("MMM_LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            select_job,
            optimize_budget,
            json_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn nothing_set_means_list_only() {
        assert_eq!(CliOptions::from_lookup(lookup(&[])).unwrap(), CliOptions::default());
    }

    #[test]
    fn selection_and_budget_are_parsed() {
        let options = CliOptions::from_lookup(lookup(&[
            ("MMM_SELECT_JOB", " job-42 "),
            ("MMM_OPTIMIZE_BUDGET", "75000"),
            ("MMM_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(options.select_job.as_deref(), Some("job-42"));
        assert_eq!(options.optimize_budget, Some(75_000));
        assert!(options.json_logs);
    }

    #[test]
    fn budget_outside_slider_domain_is_invalid() {
        for raw in ["0", "1000001", "lots"] {
            let err = CliOptions::from_lookup(lookup(&[
                ("MMM_SELECT_JOB", "job-42"),
                ("MMM_OPTIMIZE_BUDGET", raw),
            ]))
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { var: "MMM_OPTIMIZE_BUDGET", .. }),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn budget_without_selection_is_invalid() {
        let err = CliOptions::from_lookup(lookup(&[("MMM_OPTIMIZE_BUDGET", "75000")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "MMM_OPTIMIZE_BUDGET", .. }));
    }
}
