use chrono::NaiveDate;

use crate::date_util::{parse_date, round2};
use crate::issue::{unwrap_field_value, Issue};

use super::types::{ChangeImpact, CohortStats, EddDeliveryMetrics};

/// Field slots checked for a target delivery date, in priority order. The
/// source system stores this date under different slots depending on tenant
/// configuration; the first slot holding a usable value wins. Standard
/// `duedate` is the last resort.
pub const TARGET_DATE_FIELDS: &[&str] = &[
    "customfield_13587",
    "customfield_14219",
    "customfield_10003",
    "customfield_10002",
    "EDD Dev",
    "Expected Development Delivery Date",
    "Development Due Date",
    "Dev Due Date",
    "duedate",
];

/// Resolve an issue's target delivery date via the prioritized field list.
/// Returns `None` when no candidate field holds a parseable date.
pub fn target_delivery_date(issue: &Issue) -> Option<NaiveDate> {
    for field in TARGET_DATE_FIELDS {
        let Some(raw) = issue.field(field) else {
            continue;
        };
        if let Some(text) = unwrap_field_value(raw) {
            if let Some(date) = parse_date(&text) {
                log::debug!("target date for {} from {field}: {date}", issue.key);
                return Some(date);
            }
        }
    }
    None
}

/// Days past the target date, floored at zero.
pub fn days_late(target: NaiveDate, resolved: NaiveDate) -> u64 {
    (resolved - target).num_days().max(0) as u64
}

/// Estimates how many times an issue's target delivery date was revised.
///
/// Behind a trait so the structural heuristic below can be swapped for a
/// changelog-based count without touching the aggregation.
pub trait ChangeEstimator: Send + Sync {
    fn estimate(&self, issue: &Issue) -> u32;
}

/// Structural proxy for target-date revisions: long cycle times, epic/feature
/// issue types, and blocked-ish statuses each add one. Not ground truth:
/// the tracker's field history is never consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl ChangeEstimator for HeuristicEstimator {
    fn estimate(&self, issue: &Issue) -> u32 {
        let age = super::cycle_time(issue).unwrap_or(0.0);

        let mut changes = 0;
        if age > 30.0 {
            changes += 1;
        }
        if age > 60.0 {
            changes += 1;
        }
        if age > 90.0 {
            changes += 1;
        }

        let issue_type = issue.issue_type().to_lowercase();
        if issue_type.contains("epic") || issue_type.contains("feature") {
            changes += 1;
        }

        let status = issue.status().to_lowercase();
        if status.contains("blocked") || status.contains("hold") || status.contains("more info") {
            changes += 1;
        }

        changes
    }
}

/// Compute delivery-against-target metrics for a completed issue set.
///
/// An issue enters the population only when it has both a resolvable target
/// date and a resolution timestamp; issues missing either are excluded from
/// every count here (they still contribute to the other KPIs). On-time is
/// non-strict: resolving exactly on the target date counts.
pub(super) fn delivery_metrics(
    estimator: &dyn ChangeEstimator,
    completed: &[Issue],
) -> EddDeliveryMetrics {
    let qualified: Vec<(&Issue, NaiveDate, NaiveDate)> = completed
        .iter()
        .filter_map(|issue| {
            let target = target_delivery_date(issue)?;
            let resolved = issue.fields.resolutiondate.as_deref().and_then(parse_date)?;
            Some((issue, target, resolved))
        })
        .collect();

    log::debug!(
        "{} of {} completed issues have a target delivery date",
        qualified.len(),
        completed.len()
    );

    if qualified.is_empty() {
        return EddDeliveryMetrics::default();
    }

    let mut on_time = 0u64;
    let mut late = 0u64;
    let mut total_changes = 0u64;
    let mut with_changes = 0u64;
    let mut without_changes = 0u64;
    let mut impact = ChangeImpact::default();

    for (issue, target, resolved) in &qualified {
        let changes = estimator.estimate(issue);
        total_changes += u64::from(changes);

        let cohort = if changes > 0 {
            with_changes += 1;
            &mut impact.with_changes
        } else {
            without_changes += 1;
            &mut impact.no_changes
        };

        if resolved <= target {
            on_time += 1;
            cohort.on_time += 1;
        } else {
            late += 1;
            cohort.late += 1;
        }
    }

    impact.no_changes.percentage = cohort_percentage(&impact.no_changes);
    impact.with_changes.percentage = cohort_percentage(&impact.with_changes);

    let total = qualified.len() as u64;
    EddDeliveryMetrics {
        total_with_edd: total,
        delivered_on_time: on_time,
        delivered_late: late,
        on_time_percentage: round2(on_time as f64 / total as f64 * 100.0),
        average_edd_changes: round2(total_changes as f64 / total as f64),
        issues_with_changes: with_changes,
        issues_without_changes: without_changes,
        change_impact: impact,
    }
}

fn cohort_percentage(cohort: &CohortStats) -> f64 {
    let total = cohort.on_time + cohort.late;
    if total == 0 {
        0.0
    } else {
        round2(cohort.on_time as f64 / total as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::test_support::{issue, with_field};
    use serde_json::json;

    #[test]
    fn test_target_date_priority_order() {
        let mut it = issue("A-1", "Story", "Done", "2024-01-01T00:00:00Z", None);
        it = with_field(it, "duedate", json!("2024-03-01"));
        it = with_field(it, "customfield_13587", json!("2024-02-01"));
        // The tenant slot outranks the standard due date
        assert_eq!(
            target_delivery_date(&it),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn test_target_date_unwraps_all_shapes() {
        let raw = with_field(
            issue("A-1", "Story", "Done", "2024-01-01T00:00:00Z", None),
            "customfield_14219",
            json!("2024-02-01"),
        );
        let value = with_field(
            issue("A-2", "Story", "Done", "2024-01-01T00:00:00Z", None),
            "customfield_14219",
            json!({"value": "2024-02-01"}),
        );
        let name = with_field(
            issue("A-3", "Story", "Done", "2024-01-01T00:00:00Z", None),
            "customfield_14219",
            json!({"name": "2024-02-01"}),
        );
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert_eq!(target_delivery_date(&raw), expected);
        assert_eq!(target_delivery_date(&value), expected);
        assert_eq!(target_delivery_date(&name), expected);
    }

    #[test]
    fn test_target_date_skips_unparseable_candidate() {
        let mut it = issue("A-1", "Story", "Done", "2024-01-01T00:00:00Z", None);
        it = with_field(it, "customfield_13587", json!("TBD"));
        it = with_field(it, "duedate", json!("2024-02-01"));
        assert_eq!(
            target_delivery_date(&it),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn test_target_date_absent() {
        let it = issue("A-1", "Story", "Done", "2024-01-01T00:00:00Z", None);
        assert_eq!(target_delivery_date(&it), None);
    }

    #[test]
    fn test_days_late_floors_at_zero() {
        let target = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let early = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let day_after = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        assert_eq!(days_late(target, early), 0);
        assert_eq!(days_late(target, target), 0);
        assert_eq!(days_late(target, day_after), 1);
    }

    #[test]
    fn test_estimator_cycle_time_thresholds_are_cumulative() {
        let short = issue(
            "A-1",
            "Story",
            "Done",
            "2024-01-01T00:00:00Z",
            Some("2024-01-11T00:00:00Z"),
        );
        assert_eq!(HeuristicEstimator.estimate(&short), 0);

        let sixty_five_days = issue(
            "A-2",
            "Story",
            "Done",
            "2024-01-01T00:00:00Z",
            Some("2024-03-06T00:00:00Z"),
        );
        assert_eq!(HeuristicEstimator.estimate(&sixty_five_days), 2);

        let ninety_five_days = issue(
            "A-3",
            "Story",
            "Done",
            "2024-01-01T00:00:00Z",
            Some("2024-04-05T00:00:00Z"),
        );
        assert_eq!(HeuristicEstimator.estimate(&ninety_five_days), 3);
    }

    #[test]
    fn test_estimator_type_and_status_signals() {
        let epic = issue(
            "A-1",
            "Epic",
            "Done",
            "2024-01-01T00:00:00Z",
            Some("2024-01-05T00:00:00Z"),
        );
        assert_eq!(HeuristicEstimator.estimate(&epic), 1);

        let blocked = issue(
            "A-2",
            "Story",
            "Blocked",
            "2024-01-01T00:00:00Z",
            Some("2024-01-05T00:00:00Z"),
        );
        assert_eq!(HeuristicEstimator.estimate(&blocked), 1);

        // Substring matches are case-insensitive
        let feature_on_hold = issue(
            "A-3",
            "New Feature",
            "On Hold",
            "2024-01-01T00:00:00Z",
            Some("2024-01-05T00:00:00Z"),
        );
        assert_eq!(HeuristicEstimator.estimate(&feature_on_hold), 2);
    }

    #[test]
    fn test_delivery_metrics_empty_population() {
        let no_target = issue(
            "A-1",
            "Story",
            "Done",
            "2024-01-01T00:00:00Z",
            Some("2024-01-05T00:00:00Z"),
        );
        let metrics = delivery_metrics(&HeuristicEstimator, &[no_target]);
        assert_eq!(metrics, EddDeliveryMetrics::default());
        assert_eq!(metrics.total_with_edd, 0);
        assert_eq!(metrics.on_time_percentage, 0.0);
    }

    #[test]
    fn test_delivery_metrics_on_time_boundary() {
        // Resolving exactly on the target date is on time
        let boundary = with_field(
            issue(
                "A-1",
                "Story",
                "Done",
                "2024-01-01T00:00:00Z",
                Some("2024-02-01T12:00:00Z"),
            ),
            "customfield_13587",
            json!("2024-02-01"),
        );
        let metrics = delivery_metrics(&HeuristicEstimator, &[boundary]);
        assert_eq!(metrics.total_with_edd, 1);
        assert_eq!(metrics.delivered_on_time, 1);
        assert_eq!(metrics.delivered_late, 0);
        assert_eq!(metrics.on_time_percentage, 100.0);
    }

    #[test]
    fn test_delivery_metrics_one_day_late() {
        let late = with_field(
            issue(
                "A-1",
                "Story",
                "Done",
                "2024-01-01T00:00:00Z",
                Some("2024-02-02T00:00:00Z"),
            ),
            "customfield_13587",
            json!("2024-02-01"),
        );
        let metrics = delivery_metrics(&HeuristicEstimator, &[late]);
        assert_eq!(metrics.delivered_on_time, 0);
        assert_eq!(metrics.delivered_late, 1);
        assert_eq!(metrics.on_time_percentage, 0.0);
    }

    #[test]
    fn test_delivery_metrics_excludes_unresolved_issue() {
        // Target date but no resolution timestamp: not counted anywhere
        let unresolved = with_field(
            issue("A-1", "Story", "In Progress", "2024-01-01T00:00:00Z", None),
            "customfield_13587",
            json!("2024-02-01"),
        );
        let resolved = with_field(
            issue(
                "A-2",
                "Story",
                "Done",
                "2024-01-01T00:00:00Z",
                Some("2024-01-20T00:00:00Z"),
            ),
            "customfield_13587",
            json!("2024-02-01"),
        );
        let metrics = delivery_metrics(&HeuristicEstimator, &[unresolved, resolved]);
        assert_eq!(metrics.total_with_edd, 1);
        assert_eq!(
            metrics.issues_with_changes + metrics.issues_without_changes,
            1
        );
    }

    #[test]
    fn test_change_impact_cohort_split() {
        // Two stable issues delivered on time, two revised issues delivered late
        let stable = |key: &str| {
            with_field(
                issue(
                    key,
                    "Story",
                    "Done",
                    "2024-01-01T00:00:00Z",
                    Some("2024-01-20T00:00:00Z"),
                ),
                "customfield_13587",
                json!("2024-02-01"),
            )
        };
        // 60+ day cycle time trips the estimator; target long past
        let revised = |key: &str| {
            with_field(
                issue(
                    key,
                    "Story",
                    "Done",
                    "2024-01-01T00:00:00Z",
                    Some("2024-03-06T00:00:00Z"),
                ),
                "customfield_13587",
                json!("2024-02-01"),
            )
        };

        let issues = vec![stable("A-1"), stable("A-2"), revised("A-3"), revised("A-4")];
        let metrics = delivery_metrics(&HeuristicEstimator, &issues);

        assert_eq!(metrics.total_with_edd, 4);
        assert_eq!(metrics.issues_without_changes, 2);
        assert_eq!(metrics.issues_with_changes, 2);
        assert_eq!(metrics.change_impact.no_changes.on_time, 2);
        assert_eq!(metrics.change_impact.no_changes.late, 0);
        assert_eq!(metrics.change_impact.no_changes.percentage, 100.0);
        assert_eq!(metrics.change_impact.with_changes.on_time, 0);
        assert_eq!(metrics.change_impact.with_changes.late, 2);
        assert_eq!(metrics.change_impact.with_changes.percentage, 0.0);
        assert_eq!(metrics.on_time_percentage, 50.0);
        // 0 + 0 + 2 + 2 changes across 4 issues
        assert_eq!(metrics.average_edd_changes, 1.0);
    }
}
