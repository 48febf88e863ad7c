pub mod client;
pub mod date_util;
pub mod error;
pub mod issue;
pub mod kpi;
pub mod query;
pub mod settings;
pub mod users;

pub use client::{JiraClient, JiraConfig};
pub use error::{Error, Result};
pub use issue::Issue;
pub use kpi::{calculate_kpis, KpiEngine, KpiReport};
pub use query::{JqlBuilder, TeamScope};
pub use settings::{SettingsStore, TableSettings, TableType};
pub use users::TeamUser;

/// Created-issue lookback for the team-roster extraction.
const TEAM_USERS_LOOKBACK_DAYS: u32 = 180;

/// Lookback windows for the dashboard's issue fetches.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Days of created-issue history feeding distribution and type KPIs.
    pub created_days: u32,
    /// Days of resolution history feeding cycle time and throughput.
    pub resolved_days: u32,
    /// Days of resolution history for the narrower team delivery set.
    pub team_resolved_days: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            created_days: 280,
            resolved_days: 290,
            team_resolved_days: 190,
        }
    }
}

/// Main entry point for the team-reporting dashboard backend: fetches issue
/// sets for the configured team scope and derives KPIs from them.
pub struct JiraKpi {
    client: JiraClient,
    scope: TeamScope,
    engine: KpiEngine,
}

impl JiraKpi {
    pub fn new(client: JiraClient, scope: TeamScope) -> Self {
        Self {
            client,
            scope,
            engine: KpiEngine::default(),
        }
    }

    /// Swap the default engine (custom categorization list or change
    /// estimator).
    pub fn with_engine(mut self, engine: KpiEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(JiraClient::from_env()?, TeamScope::from_env()?))
    }

    pub fn scope(&self) -> &TeamScope {
        &self.scope
    }

    /// Fetch the issue sets concurrently and compute the full KPI report.
    ///
    /// The delivery sub-metric is then recomputed from the narrower
    /// team-completed set, so its scope can differ from the one feeding
    /// cycle time and throughput.
    pub async fn team_kpis(&self, options: &FetchOptions) -> Result<KpiReport> {
        let (all, completed, team_completed) = tokio::try_join!(
            self.client
                .fetch_scoped_issues(&self.scope, None, options.created_days),
            self.client
                .fetch_completed_issues(&self.scope, options.resolved_days),
            self.client
                .fetch_team_completed_issues(&self.scope, options.team_resolved_days),
        )?;

        let mut report = self.engine.calculate_kpis(&all, &completed);
        report.edd_delivery = self.engine.edd_delivery_metrics(&team_completed);
        Ok(report)
    }

    /// Per-issue delivery rows for the team-completed set.
    pub async fn edd_analysis(&self, options: &FetchOptions) -> Result<Vec<kpi::EddAnalysisRow>> {
        let completed = self
            .client
            .fetch_team_completed_issues(&self.scope, options.team_resolved_days)
            .await?;
        Ok(self.engine.edd_analysis_details(&completed))
    }

    /// Per-issue cycle time rows for the completed set.
    pub async fn cycle_times(&self, options: &FetchOptions) -> Result<Vec<kpi::CycleTimeDetail>> {
        let completed = self
            .client
            .fetch_completed_issues(&self.scope, options.resolved_days)
            .await?;
        Ok(self.engine.cycle_time_details(&completed))
    }

    /// Raw issues in scope, optionally restricted to one status.
    pub async fn issues(&self, status: Option<&str>, days: u32) -> Result<Vec<Issue>> {
        self.client
            .fetch_scoped_issues(&self.scope, status, days)
            .await
    }

    /// The team roster, derived from recent issue assignees.
    pub async fn team_users(&self) -> Result<Vec<TeamUser>> {
        let issues = self
            .client
            .fetch_scoped_issues(&self.scope, None, TEAM_USERS_LOOKBACK_DAYS)
            .await?;
        Ok(users::team_users_from_issues(
            &issues,
            &self.scope.member_emails,
        ))
    }
}
