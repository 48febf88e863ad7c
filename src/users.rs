use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::issue::{unwrap_field_value, Issue};

static RE_ROLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)role:\s*([^\n\r,]+)").unwrap());

/// Field slots that may carry a team-role label, in priority order.
const ROLE_FIELDS: &[&str] = &[
    "Role",
    "Position",
    "Job Title",
    "Team Role",
    "Developer Role",
    "User Role",
];

/// A team member derived from issue assignees.
#[derive(Debug, Clone, Serialize)]
pub struct TeamUser {
    pub account_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Collect the unique assignees across an issue set, first-seen order.
/// `allowed` filters by email, case-insensitively; an empty list admits
/// everyone.
pub fn team_users_from_issues(issues: &[Issue], allowed: &[String]) -> Vec<TeamUser> {
    let mut users: Vec<TeamUser> = Vec::new();
    for issue in issues {
        let Some(assignee) = &issue.fields.assignee else {
            continue;
        };
        if users.iter().any(|u| u.account_id == assignee.account_id) {
            continue;
        }
        if !allowed.is_empty() {
            let Some(email) = &assignee.email_address else {
                continue;
            };
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(email)) {
                continue;
            }
        }
        users.push(TeamUser {
            account_id: assignee.account_id.clone(),
            display_name: assignee.display_name.clone(),
            email: assignee.email_address.clone(),
            role: extract_role(issue),
        });
    }
    log::info!("extracted {} team members from issue assignees", users.len());
    users
}

/// Best-effort role lookup: role-ish fields first, then a `role: …` marker
/// in the issue description.
pub fn extract_role(issue: &Issue) -> Option<String> {
    for field in ROLE_FIELDS {
        if let Some(value) = issue.field(field).and_then(unwrap_field_value) {
            return Some(value.trim().to_string());
        }
    }
    if let Some(Value::String(description)) = issue.field("description") {
        if let Some(caps) = RE_ROLE.captures(description) {
            return Some(caps[1].trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Assignee;
    use crate::kpi::test_support::{issue, with_field};
    use serde_json::json;

    fn assigned(key: &str, account_id: &str, name: &str, email: Option<&str>) -> Issue {
        let mut it = issue(key, "Story", "Open", "2024-01-01T00:00:00Z", None);
        it.fields.assignee = Some(Assignee {
            account_id: account_id.to_string(),
            display_name: name.to_string(),
            email_address: email.map(str::to_string),
        });
        it
    }

    #[test]
    fn test_unique_by_account_id_first_seen_order() {
        let issues = vec![
            assigned("A-1", "u1", "Alice", Some("alice@example.com")),
            assigned("A-2", "u2", "Bob", Some("bob@example.com")),
            assigned("A-3", "u1", "Alice", Some("alice@example.com")),
            issue("A-4", "Story", "Open", "2024-01-01T00:00:00Z", None),
        ];
        let users = team_users_from_issues(&issues, &[]);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].display_name, "Alice");
        assert_eq!(users[1].display_name, "Bob");
    }

    #[test]
    fn test_allow_list_filters_by_email() {
        let issues = vec![
            assigned("A-1", "u1", "Alice", Some("Alice@Example.com")),
            assigned("A-2", "u2", "Bob", Some("bob@example.com")),
            assigned("A-3", "u3", "Carol", None),
        ];
        let allowed = vec!["alice@example.com".to_string()];
        let users = team_users_from_issues(&issues, &allowed);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].account_id, "u1");
    }

    #[test]
    fn test_role_from_field() {
        let it = with_field(
            assigned("A-1", "u1", "Alice", None),
            "Team Role",
            json!({"value": "Tech Lead"}),
        );
        assert_eq!(extract_role(&it), Some("Tech Lead".to_string()));
    }

    #[test]
    fn test_role_from_description_marker() {
        let it = with_field(
            assigned("A-1", "u1", "Alice", None),
            "description",
            json!("Handover notes.\nRole: QA Engineer, second line"),
        );
        assert_eq!(extract_role(&it), Some("QA Engineer".to_string()));
    }

    #[test]
    fn test_role_absent() {
        assert_eq!(extract_role(&assigned("A-1", "u1", "Alice", None)), None);
    }
}
