use std::collections::BTreeMap;

use serde::Serialize;

/// The two mutually exclusive work categories used for distribution reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Maintenance,
    NewProduct,
}

/// Share of work in each category, as percentages of the full issue set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub maintenance: f64,
    pub new_product: f64,
}

/// One cohort's delivery record in the change-impact split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CohortStats {
    pub on_time: u64,
    pub late: u64,
    /// On-time percentage within this cohort.
    pub percentage: f64,
}

/// Delivery outcomes split by whether the target date was (estimated to have
/// been) revised, which is the key analytical output of the delivery metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChangeImpact {
    pub no_changes: CohortStats,
    pub with_changes: CohortStats,
}

/// Delivery-against-target metrics over completed issues that carry a
/// resolvable target delivery date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EddDeliveryMetrics {
    pub total_with_edd: u64,
    pub delivered_on_time: u64,
    pub delivered_late: u64,
    pub on_time_percentage: f64,
    /// Mean estimated target-date revisions per issue.
    pub average_edd_changes: f64,
    pub issues_with_changes: u64,
    pub issues_without_changes: u64,
    pub change_impact: ChangeImpact,
}

/// The aggregate KPI result. Entirely derived; recomputed from scratch on
/// every call.
#[derive(Debug, Clone, Serialize)]
pub struct KpiReport {
    pub distribution: Distribution,
    /// Mean cycle time in days formatted to one decimal; `"0"` when no
    /// completed issue has a defined cycle time.
    pub avg_cycle_time: String,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    /// Completed tasks per week over the observed resolution span.
    pub throughput: f64,
    pub maintenance_types: BTreeMap<String, u64>,
    pub new_product_types: BTreeMap<String, u64>,
    pub edd_delivery: EddDeliveryMetrics,
}

impl KpiReport {
    /// The defined all-zero result for an empty issue set.
    pub fn empty() -> Self {
        Self {
            distribution: Distribution::default(),
            avg_cycle_time: "0".to_string(),
            total_tasks: 0,
            completed_tasks: 0,
            throughput: 0.0,
            maintenance_types: BTreeMap::new(),
            new_product_types: BTreeMap::new(),
            edd_delivery: EddDeliveryMetrics::default(),
        }
    }
}

/// Per-issue cycle time row for detail tables.
#[derive(Debug, Clone, Serialize)]
pub struct CycleTimeDetail {
    pub issue_key: String,
    pub cycle_time: f64,
    pub issue_type: String,
    pub category: Category,
}

/// Per-issue delivery row for the target-date analysis table.
#[derive(Debug, Clone, Serialize)]
pub struct EddAnalysisRow {
    pub issue_key: String,
    pub target_date: chrono::NaiveDate,
    pub actual_delivery: chrono::NaiveDate,
    pub edd_changes: u32,
    pub delivered_on_time: bool,
    pub days_late: u64,
    pub issue_type: String,
    pub category: Category,
}
