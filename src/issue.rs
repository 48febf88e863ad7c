use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A name-bearing reference from the tracker (issue type, status, priority).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedEntity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The person an issue is assigned to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub account_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// Issue fields as they arrive from the search API. Field names stay in wire
/// form (`issuetype`, `resolutiondate`) so the payload round-trips untouched.
/// Timestamps are kept as strings and parsed where they are consumed.
///
/// Anything not modeled explicitly (tenant custom fields, `duedate`,
/// description) is captured in `custom`, which is what the prioritized
/// target-date fallback walks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Fields {
    pub issuetype: NamedEntity,
    pub status: NamedEntity,
    #[serde(default)]
    pub summary: String,
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolutiondate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<NamedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Assignee>,
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

/// One unit of tracked work, read-only for the lifetime of a computation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Issue {
    pub key: String,
    pub fields: Fields,
}

impl Issue {
    pub fn issue_type(&self) -> &str {
        &self.fields.issuetype.name
    }

    pub fn status(&self) -> &str {
        &self.fields.status.name
    }

    /// Look up an unmodeled field by its wire name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.custom.get(name)
    }
}

/// Envelope of the issue search endpoint, used for pagination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
}

/// Normalize the three wire shapes a field value can take (a raw scalar, an
/// object exposing `value`, or an object exposing `name`) into a plain
/// string. Nulls, empty strings, and unrecognized shapes yield `None`.
pub fn unwrap_field_value(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => {
            for key in ["value", "name"] {
                if let Some(Value::String(s)) = map.get(key) {
                    if !s.trim().is_empty() {
                        return Some(s.clone());
                    }
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_search_response() {
        let payload = json!({
            "issues": [{
                "key": "PIX-101",
                "fields": {
                    "issuetype": {"name": "Story", "id": "10001"},
                    "status": {"name": "Done"},
                    "summary": "Ship the thing",
                    "created": "2024-01-01T09:00:00.000+0000",
                    "resolutiondate": "2024-01-11T09:00:00.000+0000",
                    "assignee": {
                        "accountId": "abc123",
                        "displayName": "Alice",
                        "emailAddress": "alice@example.com"
                    },
                    "duedate": "2024-01-15",
                    "customfield_13587": {"value": "2024-01-10"}
                }
            }],
            "total": 1,
            "startAt": 0,
            "maxResults": 100
        });

        let resp: SearchResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(resp.total, 1);
        let issue = &resp.issues[0];
        assert_eq!(issue.key, "PIX-101");
        assert_eq!(issue.issue_type(), "Story");
        assert_eq!(issue.status(), "Done");
        assert_eq!(issue.fields.assignee.as_ref().unwrap().display_name, "Alice");
        // Unmodeled fields land in the custom map
        assert!(issue.field("duedate").is_some());
        assert!(issue.field("customfield_13587").is_some());
        assert!(issue.field("customfield_99999").is_none());
    }

    #[test]
    fn test_deserialize_minimal_issue() {
        let payload = json!({
            "key": "PIX-1",
            "fields": {
                "issuetype": {"name": "Bug"},
                "status": {"name": "Open"},
                "created": "2024-01-01T09:00:00.000+0000"
            }
        });
        let issue: Issue = serde_json::from_value(payload).unwrap();
        assert!(issue.fields.resolutiondate.is_none());
        assert!(issue.fields.assignee.is_none());
        assert!(issue.fields.priority.is_none());
    }

    #[test]
    fn test_unwrap_field_value_string() {
        assert_eq!(unwrap_field_value(&json!("2024-01-10")), Some("2024-01-10".into()));
    }

    #[test]
    fn test_unwrap_field_value_object_value() {
        assert_eq!(
            unwrap_field_value(&json!({"value": "2024-01-10"})),
            Some("2024-01-10".into())
        );
    }

    #[test]
    fn test_unwrap_field_value_object_name() {
        assert_eq!(
            unwrap_field_value(&json!({"name": "2024-01-10"})),
            Some("2024-01-10".into())
        );
    }

    #[test]
    fn test_unwrap_field_value_prefers_value_over_name() {
        assert_eq!(
            unwrap_field_value(&json!({"value": "a", "name": "b"})),
            Some("a".into())
        );
    }

    #[test]
    fn test_unwrap_field_value_empty_shapes() {
        assert_eq!(unwrap_field_value(&json!(null)), None);
        assert_eq!(unwrap_field_value(&json!("")), None);
        assert_eq!(unwrap_field_value(&json!("   ")), None);
        assert_eq!(unwrap_field_value(&json!({"other": "x"})), None);
        assert_eq!(unwrap_field_value(&json!(42)), None);
    }
}
