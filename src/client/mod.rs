pub mod rate_limit;

use std::env;
use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};
use crate::issue::{Issue, SearchResponse};
use crate::query::TeamScope;

/// Fields requested from the search API: everything the KPI engine and the
/// detail reports consume, including the candidate target-date slots.
const SEARCH_FIELDS: &str = "key,issuetype,created,resolutiondate,status,summary,priority,\
                             assignee,duedate,description,customfield_13587,customfield_14219,\
                             customfield_10003,customfield_10002";

/// Page size cap the search API enforces per request.
const PAGE_SIZE: u32 = 100;

/// Statuses that mark an issue as completed in the team's workflow.
const COMPLETED_STATUSES: &[&str] = &["Done", "Completed"];

/// Connection settings for the issue tracker.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: Url,
    pub email: String,
    pub api_token: String,
}

impl JiraConfig {
    /// Build from `JIRA_BASE_URL` (or `JIRA_DOMAIN`), `JIRA_EMAIL`, and
    /// `JIRA_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let base = match env::var("JIRA_BASE_URL") {
            Ok(raw) => raw,
            Err(_) => {
                let domain = env::var("JIRA_DOMAIN").map_err(|_| {
                    Error::Config("JIRA_BASE_URL or JIRA_DOMAIN must be set".into())
                })?;
                format!("https://{domain}")
            }
        };
        let email =
            env::var("JIRA_EMAIL").map_err(|_| Error::Config("JIRA_EMAIL is not set".into()))?;
        let api_token = env::var("JIRA_API_TOKEN")
            .map_err(|_| Error::Config("JIRA_API_TOKEN is not set".into()))?;
        Ok(Self {
            base_url: Url::parse(&base)?,
            email,
            api_token,
        })
    }
}

/// Thin client for the issue tracker's search API. Credentials ride along as
/// basic auth; responses are validated here so downstream consumers only
/// ever see well-formed issue records.
pub struct JiraClient {
    http: reqwest::Client,
    config: JiraConfig,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(JiraConfig::from_env()?)
    }

    /// Fetch issues matching `jql`, up to `max_results`, paginating as
    /// needed.
    pub async fn fetch_issues(&self, jql: &str, max_results: u32) -> Result<Vec<Issue>> {
        log::info!("fetching issues: {jql}");

        let mut issues: Vec<Issue> = Vec::new();
        let mut start_at = 0u32;
        loop {
            let remaining = max_results.saturating_sub(issues.len() as u32);
            if remaining == 0 {
                break;
            }
            let page = self
                .search_page(jql, start_at, PAGE_SIZE.min(remaining))
                .await?;
            let fetched = page.issues.len() as u32;
            issues.extend(page.issues);
            start_at += fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }

        log::info!("fetched {} issues", issues.len());
        Ok(issues)
    }

    async fn search_page(
        &self,
        jql: &str,
        start_at: u32,
        max_results: u32,
    ) -> Result<SearchResponse> {
        let url = self.config.base_url.join("/rest/api/3/search/jql")?;
        let start_at = start_at.to_string();
        let max_results = max_results.to_string();

        let mut attempt = 0u32;
        loop {
            let response = self
                .http
                .get(url.clone())
                .basic_auth(&self.config.email, Some(&self.config.api_token))
                .query(&[
                    ("jql", jql),
                    ("startAt", start_at.as_str()),
                    ("maxResults", max_results.as_str()),
                    ("fields", SEARCH_FIELDS),
                ])
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }
            if rate_limit::is_retryable(status) && attempt < rate_limit::MAX_RETRIES {
                rate_limit::backoff_sleep(attempt).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    Error::Auth("check your email and API token".into())
                }
                StatusCode::FORBIDDEN => Error::Auth("access denied for this project".into()),
                StatusCode::NOT_FOUND => {
                    Error::NotFound("project not found; check domain and project key".into())
                }
                _ => Error::Api(format!("search failed with {status}: {body}")),
            });
        }
    }

    // ── Scope-based fetches ────────────────────────────────────────

    /// Issues in the team's scope created within the lookback window,
    /// optionally restricted to one status.
    pub async fn fetch_scoped_issues(
        &self,
        scope: &TeamScope,
        status: Option<&str>,
        days: u32,
    ) -> Result<Vec<Issue>> {
        let mut jql = scope.filter().created_within_days(days);
        if let Some(status) = status {
            jql = jql.field_eq("status", status);
        }
        self.fetch_issues(&jql.build(), 100).await
    }

    /// Completed issues in the team's scope resolved within the lookback
    /// window.
    pub async fn fetch_completed_issues(&self, scope: &TeamScope, days: u32) -> Result<Vec<Issue>> {
        let jql = scope
            .filter()
            .status_in(COMPLETED_STATUSES)
            .resolved_within_days(days)
            .build();
        self.fetch_issues(&jql, 100).await
    }

    /// Issues in scope restricted to the given issue types.
    pub async fn fetch_issues_by_type(
        &self,
        scope: &TeamScope,
        types: &[&str],
        days: u32,
    ) -> Result<Vec<Issue>> {
        let jql = scope
            .filter()
            .issue_type_in(types)
            .created_within_days(days)
            .build();
        self.fetch_issues(&jql, 100).await
    }

    /// The narrower completed set used to recompute the delivery sub-metric:
    /// ordered by resolution date with a deeper result window.
    pub async fn fetch_team_completed_issues(
        &self,
        scope: &TeamScope,
        days: u32,
    ) -> Result<Vec<Issue>> {
        let jql = scope
            .filter()
            .status_in(COMPLETED_STATUSES)
            .resolved_within_days(days)
            .order_by("resolutiondate")
            .descending()
            .build();
        self.fetch_issues(&jql, 500).await
    }
}
