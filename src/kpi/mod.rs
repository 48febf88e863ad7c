pub mod edd;
pub mod types;

pub use edd::{target_delivery_date, ChangeEstimator, HeuristicEstimator};
pub use types::*;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::date_util::{days_between, parse_date, parse_datetime, round2};
use crate::issue::Issue;

/// Default membership list for the maintenance category. Issue types not on
/// this list count as new-product work. Matching is case-sensitive and exact.
pub const MAINTENANCE_ISSUE_TYPES: &[&str] = &[
    "Bug",
    "Support",
    "Incident",
    "Hotfix",
    "Technical Debt",
    "Maintenance",
];

/// The KPI derivation engine: pure computation over issue collections.
///
/// Holds the only two substitutable pieces: the maintenance membership list
/// and the target-date change estimator. Everything else is a function of the
/// input; the engine keeps no state between calls and callers may invoke it
/// concurrently on independent inputs.
pub struct KpiEngine {
    maintenance_types: Vec<String>,
    estimator: Box<dyn ChangeEstimator>,
}

impl Default for KpiEngine {
    fn default() -> Self {
        Self::new(
            MAINTENANCE_ISSUE_TYPES.iter().map(|s| s.to_string()).collect(),
            Box::new(HeuristicEstimator),
        )
    }
}

impl KpiEngine {
    pub fn new(maintenance_types: Vec<String>, estimator: Box<dyn ChangeEstimator>) -> Self {
        Self {
            maintenance_types,
            estimator,
        }
    }

    /// Categorize an issue as maintenance or new-product work. Total: unknown
    /// issue types fall through to new-product.
    pub fn categorize(&self, issue: &Issue) -> Category {
        if self.maintenance_types.iter().any(|t| t == issue.issue_type()) {
            Category::Maintenance
        } else {
            Category::NewProduct
        }
    }

    /// Category shares over the full issue set. `{0, 0}` for an empty set.
    pub fn distribution(&self, all_issues: &[Issue]) -> Distribution {
        let total = all_issues.len();
        if total == 0 {
            return Distribution::default();
        }
        let maintenance = all_issues
            .iter()
            .filter(|i| self.categorize(i) == Category::Maintenance)
            .count();
        let new_product = total - maintenance;
        Distribution {
            maintenance: round2(maintenance as f64 / total as f64 * 100.0),
            new_product: round2(new_product as f64 / total as f64 * 100.0),
        }
    }

    /// Per-issue-type counts within each category. Type names pass through
    /// verbatim: strings differing in case or whitespace are distinct keys.
    pub fn group_by_type(
        &self,
        all_issues: &[Issue],
    ) -> (BTreeMap<String, u64>, BTreeMap<String, u64>) {
        let mut maintenance_types = BTreeMap::new();
        let mut new_product_types = BTreeMap::new();
        for issue in all_issues {
            let counts = match self.categorize(issue) {
                Category::Maintenance => &mut maintenance_types,
                Category::NewProduct => &mut new_product_types,
            };
            *counts.entry(issue.issue_type().to_string()).or_insert(0) += 1;
        }
        (maintenance_types, new_product_types)
    }

    /// Delivery-against-target metrics for a completed set. Exposed on its
    /// own so callers can recompute just this sub-metric over a differently
    /// scoped issue set (e.g. a narrower team filter).
    pub fn edd_delivery_metrics(&self, completed_issues: &[Issue]) -> EddDeliveryMetrics {
        edd::delivery_metrics(self.estimator.as_ref(), completed_issues)
    }

    /// Compute all KPIs. `completed_issues` is a caller-selected subset of
    /// the work in scope; it is not re-derived here. An empty `all_issues`
    /// short-circuits to the all-zero report.
    pub fn calculate_kpis(&self, all_issues: &[Issue], completed_issues: &[Issue]) -> KpiReport {
        if all_issues.is_empty() {
            return KpiReport::empty();
        }

        let (maintenance_types, new_product_types) = self.group_by_type(all_issues);

        KpiReport {
            distribution: self.distribution(all_issues),
            avg_cycle_time: avg_cycle_time(completed_issues),
            total_tasks: all_issues.len() as u64,
            completed_tasks: completed_issues.len() as u64,
            throughput: throughput(completed_issues),
            maintenance_types,
            new_product_types,
            edd_delivery: self.edd_delivery_metrics(completed_issues),
        }
    }

    /// Compute KPIs restricted to a date window: `all_issues` by creation
    /// date, `completed_issues` by resolution date, both inclusive.
    pub fn calculate_kpis_for_period(
        &self,
        all_issues: &[Issue],
        completed_issues: &[Issue],
        start: NaiveDate,
        end: NaiveDate,
    ) -> KpiReport {
        let all: Vec<Issue> = all_issues
            .iter()
            .filter(|i| {
                parse_date(&i.fields.created).is_some_and(|d| d >= start && d <= end)
            })
            .cloned()
            .collect();
        let completed: Vec<Issue> = completed_issues
            .iter()
            .filter(|i| {
                i.fields
                    .resolutiondate
                    .as_deref()
                    .and_then(parse_date)
                    .is_some_and(|d| d >= start && d <= end)
            })
            .cloned()
            .collect();
        self.calculate_kpis(&all, &completed)
    }

    /// Per-issue cycle time rows for completed issues with a defined cycle
    /// time.
    pub fn cycle_time_details(&self, completed_issues: &[Issue]) -> Vec<CycleTimeDetail> {
        completed_issues
            .iter()
            .filter_map(|issue| {
                Some(CycleTimeDetail {
                    issue_key: issue.key.clone(),
                    cycle_time: cycle_time(issue)?,
                    issue_type: issue.issue_type().to_string(),
                    category: self.categorize(issue),
                })
            })
            .collect()
    }

    /// Per-issue delivery rows for completed issues with both a target date
    /// and a resolution date.
    pub fn edd_analysis_details(&self, completed_issues: &[Issue]) -> Vec<EddAnalysisRow> {
        completed_issues
            .iter()
            .filter_map(|issue| {
                let target_date = target_delivery_date(issue)?;
                let actual_delivery = issue.fields.resolutiondate.as_deref().and_then(parse_date)?;
                Some(EddAnalysisRow {
                    issue_key: issue.key.clone(),
                    target_date,
                    actual_delivery,
                    edd_changes: self.estimator.estimate(issue),
                    delivered_on_time: actual_delivery <= target_date,
                    days_late: edd::days_late(target_date, actual_delivery),
                    issue_type: issue.issue_type().to_string(),
                    category: self.categorize(issue),
                })
            })
            .collect()
    }
}

/// Elapsed days from creation to resolution, fractional, rounded to 2
/// decimals. `None` until the issue is resolved; callers filter, never
/// substitute zero.
pub fn cycle_time(issue: &Issue) -> Option<f64> {
    let resolved = issue.fields.resolutiondate.as_deref()?;
    let start = parse_datetime(&issue.fields.created)?;
    let end = parse_datetime(resolved)?;
    Some(round2(days_between(start, end)))
}

/// Completed tasks per week over the observed resolution span.
///
/// This is a span-based rate, not a calendar-week bucket rate: the window is
/// the gap between the earliest and latest resolution, floored at one week so
/// a burst of same-day resolutions doesn't divide by near-zero.
pub fn throughput(completed_issues: &[Issue]) -> f64 {
    if completed_issues.is_empty() {
        return 0.0;
    }

    let mut resolutions: Vec<_> = completed_issues
        .iter()
        .filter_map(|i| i.fields.resolutiondate.as_deref().and_then(parse_datetime))
        .collect();
    if resolutions.is_empty() {
        return 0.0;
    }
    resolutions.sort();

    let first = resolutions[0];
    let last = resolutions[resolutions.len() - 1];
    let weeks = (days_between(first, last) / 7.0).max(1.0);

    round2(completed_issues.len() as f64 / weeks)
}

fn avg_cycle_time(completed_issues: &[Issue]) -> String {
    let cycle_times: Vec<f64> = completed_issues.iter().filter_map(cycle_time).collect();
    if cycle_times.is_empty() {
        return "0".to_string();
    }
    let mean = cycle_times.iter().sum::<f64>() / cycle_times.len() as f64;
    format!("{mean:.1}")
}

// ── Conveniences over a default engine ─────────────────────────────

pub fn calculate_kpis(all_issues: &[Issue], completed_issues: &[Issue]) -> KpiReport {
    KpiEngine::default().calculate_kpis(all_issues, completed_issues)
}

pub fn cycle_time_details(completed_issues: &[Issue]) -> Vec<CycleTimeDetail> {
    KpiEngine::default().cycle_time_details(completed_issues)
}

pub fn edd_analysis_details(completed_issues: &[Issue]) -> Vec<EddAnalysisRow> {
    KpiEngine::default().edd_analysis_details(completed_issues)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use serde_json::Value;

    use crate::issue::{Fields, Issue, NamedEntity};

    pub fn issue(
        key: &str,
        issue_type: &str,
        status: &str,
        created: &str,
        resolved: Option<&str>,
    ) -> Issue {
        Issue {
            key: key.to_string(),
            fields: Fields {
                issuetype: NamedEntity {
                    name: issue_type.to_string(),
                    id: None,
                },
                status: NamedEntity {
                    name: status.to_string(),
                    id: None,
                },
                summary: String::new(),
                created: created.to_string(),
                resolutiondate: resolved.map(str::to_string),
                priority: None,
                assignee: None,
                custom: HashMap::new(),
            },
        }
    }

    pub fn with_field(mut issue: Issue, name: &str, value: Value) -> Issue {
        issue.fields.custom.insert(name.to_string(), value);
        issue
    }
}
