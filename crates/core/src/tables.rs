//! Source-table roles and the table catalog offered to the job form.

use std::fmt;

use crate::form::FormField;

/// The four source tables a training job reads.
///
/// A table is offered for a role only when its name starts with the
/// role's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableRole {
    Kpi,
    Cost,
    Feature,
    Media,
}

impl TableRole {
    /// Form order.
    pub const ALL: [TableRole; 4] = [Self::Kpi, Self::Cost, Self::Feature, Self::Media];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Kpi => "kpi",
            Self::Cost => "cost",
            Self::Feature => "feature",
            Self::Media => "media",
        }
    }

    pub fn field(self) -> FormField {
        match self {
            Self::Kpi => FormField::KpiTable,
            Self::Cost => FormField::CostTable,
            Self::Feature => FormField::FeatureTable,
            Self::Media => FormField::MediaTable,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Kpi => "KPI",
            Self::Cost => "cost",
            Self::Feature => "Feature",
            Self::Media => "Media",
        }
    }
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Table names available in the source database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCatalog {
    names: Vec<String>,
}

impl TableCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Tables offered for `role`, in catalog order.
    pub fn candidates(&self, role: TableRole) -> Vec<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| name.starts_with(role.prefix()))
            .collect()
    }

    pub fn offers(&self, role: TableRole, name: &str) -> bool {
        name.starts_with(role.prefix()) && self.names.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TableCatalog {
        TableCatalog::new(vec![
            "kpi_sales".into(),
            "media_weekly".into(),
            "cost_weekly".into(),
            "feature_macro".into(),
            "kpi_signups".into(),
            "contribution_graph_data".into(),
        ])
    }

    #[test]
    fn candidates_filtered_by_prefix() {
        let c = catalog();
        assert_eq!(c.candidates(TableRole::Kpi), vec!["kpi_sales", "kpi_signups"]);
        assert_eq!(c.candidates(TableRole::Cost), vec!["cost_weekly"]);
        assert!(c.candidates(TableRole::Media).contains(&"media_weekly"));
    }

    #[test]
    fn offers_requires_prefix_and_membership() {
        let c = catalog();
        assert!(c.offers(TableRole::Feature, "feature_macro"));
        assert!(!c.offers(TableRole::Kpi, "feature_macro"));
        assert!(!c.offers(TableRole::Kpi, "kpi_missing"));
        assert!(!c.offers(TableRole::Cost, "contribution_graph_data"));
    }
}
