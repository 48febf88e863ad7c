use std::env;

use crate::error::{Error, Result};

/// Builder for constructing issue-tracker search queries with optional
/// filters, assembled into a JQL string by [`build`](JqlBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct JqlBuilder {
    project: Option<String>,
    raw_clauses: Vec<String>,
    statuses: Vec<String>,
    issue_types: Vec<String>,
    assignees: Vec<String>,
    created_within_days: Option<u32>,
    resolved_within_days: Option<u32>,
    order_by: Option<String>,
    order_desc: bool,
}

impl JqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, key: &str) -> Self {
        self.project = Some(key.to_string());
        self
    }

    /// Append a pre-assembled clause verbatim. The caller is responsible for
    /// parenthesizing disjunctions.
    pub fn clause(mut self, raw: &str) -> Self {
        self.raw_clauses.push(raw.to_string());
        self
    }

    pub fn field_eq(mut self, field: &str, value: &str) -> Self {
        self.raw_clauses
            .push(format!("{} = {}", quote_field(field), quote_value(value)));
        self
    }

    pub fn field_in(mut self, field: &str, values: &[&str]) -> Self {
        self.raw_clauses.push(format!(
            "{} in ({})",
            quote_field(field),
            values.iter().map(|v| quote_value(v)).collect::<Vec<_>>().join(", ")
        ));
        self
    }

    pub fn status_in(mut self, statuses: &[&str]) -> Self {
        self.statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn issue_type_in(mut self, types: &[&str]) -> Self {
        self.issue_types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn assignee_in(mut self, account_ids: &[String]) -> Self {
        self.assignees = account_ids.to_vec();
        self
    }

    /// Restrict to issues created within the last `days` days.
    pub fn created_within_days(mut self, days: u32) -> Self {
        self.created_within_days = Some(days);
        self
    }

    /// Restrict to issues resolved within the last `days` days.
    pub fn resolved_within_days(mut self, days: u32) -> Self {
        self.resolved_within_days = Some(days);
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }

    pub fn descending(mut self) -> Self {
        self.order_desc = true;
        self
    }

    /// Assemble the JQL string.
    pub fn build(&self) -> String {
        let mut clauses = Vec::new();

        if let Some(ref project) = self.project {
            clauses.push(format!("project = {}", quote_value(project)));
        }
        clauses.extend(self.raw_clauses.iter().cloned());
        if !self.statuses.is_empty() {
            clauses.push(format!(
                "status in ({})",
                self.statuses.iter().map(|s| quote_value(s)).collect::<Vec<_>>().join(", ")
            ));
        }
        if !self.issue_types.is_empty() {
            clauses.push(format!(
                "issuetype in ({})",
                self.issue_types.iter().map(|s| quote_value(s)).collect::<Vec<_>>().join(", ")
            ));
        }
        if !self.assignees.is_empty() {
            clauses.push(format!(
                "assignee in ({})",
                self.assignees.iter().map(|s| quote_value(s)).collect::<Vec<_>>().join(", ")
            ));
        }
        if let Some(days) = self.created_within_days {
            clauses.push(format!("created >= -{days}d"));
        }
        if let Some(days) = self.resolved_within_days {
            clauses.push(format!("resolutiondate >= -{days}d"));
        }

        let mut jql = clauses.join(" AND ");
        if let Some(ref field) = self.order_by {
            let dir = if self.order_desc { "DESC" } else { "ASC" };
            jql.push_str(&format!(" ORDER BY {field} {dir}"));
        }
        jql
    }
}

/// The configured team filter: project plus a team dropdown and/or an
/// explicit assignee list, optionally narrowed by a platform dropdown.
#[derive(Debug, Clone, Default)]
pub struct TeamScope {
    pub project: String,
    /// Custom field holding the team assignment, e.g. `Team (GOLD)[Dropdown]`.
    pub team_field: Option<String>,
    pub team: Option<String>,
    /// Account IDs OR'd with the team field, for members the dropdown misses.
    pub assignees: Vec<String>,
    pub platform_field: Option<String>,
    pub platforms: Vec<String>,
    /// Known member emails, used to filter the roster extracted from
    /// assignees. Not part of the query filter. Empty means no filtering.
    pub member_emails: Vec<String>,
}

impl TeamScope {
    /// Build the scope from `JIRA_PROJECT`, `JIRA_TEAM_FIELD`, `JIRA_TEAM`,
    /// `JIRA_TEAM_ASSIGNEES` (comma-separated), `JIRA_PLATFORM_FIELD`,
    /// `JIRA_PLATFORMS`, and `JIRA_TEAM_EMAILS` (comma-separated).
    pub fn from_env() -> Result<Self> {
        let project = env::var("JIRA_PROJECT")
            .map_err(|_| Error::Config("JIRA_PROJECT is not set".into()))?;
        Ok(Self {
            project,
            team_field: env::var("JIRA_TEAM_FIELD").ok(),
            team: env::var("JIRA_TEAM").ok(),
            assignees: split_csv(env::var("JIRA_TEAM_ASSIGNEES").ok()),
            platform_field: env::var("JIRA_PLATFORM_FIELD").ok(),
            platforms: split_csv(env::var("JIRA_PLATFORMS").ok()),
            member_emails: split_csv(env::var("JIRA_TEAM_EMAILS").ok()),
        })
    }

    /// Seed a query with this scope's filter clauses.
    pub fn filter(&self) -> JqlBuilder {
        let mut jql = JqlBuilder::new().project(&self.project);

        let team_clause = self
            .team_field
            .as_deref()
            .zip(self.team.as_deref())
            .map(|(field, team)| format!("{} = {}", quote_field(field), quote_value(team)));

        match (team_clause, self.assignees.is_empty()) {
            (Some(team), false) => {
                let ids = self
                    .assignees
                    .iter()
                    .map(|a| quote_value(a))
                    .collect::<Vec<_>>()
                    .join(", ");
                jql = jql.clause(&format!("({team} OR assignee in ({ids}))"));
            }
            (Some(team), true) => jql = jql.clause(&team),
            (None, false) => jql = jql.assignee_in(&self.assignees),
            (None, true) => {}
        }

        if let Some(ref field) = self.platform_field {
            if !self.platforms.is_empty() {
                let platforms: Vec<&str> = self.platforms.iter().map(String::as_str).collect();
                jql = jql.field_in(field, &platforms);
            }
        }
        jql
    }
}

fn split_csv(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Quote a field name when it needs quoting in JQL (spaces, brackets, or
/// anything beyond plain identifier characters).
fn quote_field(field: &str) -> String {
    if is_bare(field) {
        field.to_string()
    } else {
        format!("\"{}\"", field.replace('"', "\\\""))
    }
}

/// Quote a value unless it is a plain identifier.
fn quote_value(value: &str) -> String {
    if is_bare(value) {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('"', "\\\""))
    }
}

fn is_bare(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
