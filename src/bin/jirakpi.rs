use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use jirakpi::kpi::{CycleTimeDetail, EddAnalysisRow, KpiReport};
use jirakpi::settings::{SettingsStore, TableSettings, TableType};
use jirakpi::{FetchOptions, JiraKpi, TeamUser};

#[derive(Parser)]
#[command(name = "jirakpi", about = "Team KPI reporting for Jira")]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings database path (default: ~/.jirakpi/jirakpi.db)
    #[arg(long)]
    db: Option<String>,

    /// Settings API base URL (default: $DASHBOARD_API_URL)
    #[arg(long)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the team KPI report
    Kpis {
        /// Created-issue lookback in days
        #[arg(long, default_value = "280")]
        days: u32,
        /// Resolution lookback for cycle time and throughput
        #[arg(long, default_value = "290")]
        resolved_days: u32,
        /// Resolution lookback for the delivery sub-metric
        #[arg(long, default_value = "190")]
        team_days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-issue delivery-against-target analysis
    Edd {
        /// Resolution lookback in days
        #[arg(long, default_value = "190")]
        team_days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-issue cycle times
    CycleTimes {
        /// Resolution lookback in days
        #[arg(long, default_value = "290")]
        resolved_days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List issues in the team scope
    Issues {
        /// Filter by workflow status
        #[arg(long)]
        status: Option<String>,
        /// Created-issue lookback in days
        #[arg(long, default_value = "280")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List team members derived from issue assignees
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage dashboard table settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print settings for a table (factory defaults when none are saved)
    Get {
        /// Table: in-progress, awaiting-prod, to-take, more-info-request
        table: String,
        /// Per-user settings instead of the table's global ones
        #[arg(long)]
        user: Option<String>,
    },
    /// Save settings from a JSON file ("-" reads stdin)
    Set { file: String },
    /// Delete saved settings for a table
    Delete {
        table: String,
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Kpis {
            days,
            resolved_days,
            team_days,
            json,
        } => {
            let dashboard = JiraKpi::from_env()?;
            let options = FetchOptions {
                created_days: days,
                resolved_days,
                team_resolved_days: team_days,
            };
            let report = dashboard.team_kpis(&options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Edd { team_days, json } => {
            let dashboard = JiraKpi::from_env()?;
            let options = FetchOptions {
                team_resolved_days: team_days,
                ..Default::default()
            };
            let rows = dashboard.edd_analysis(&options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_edd_rows(&rows);
            }
        }
        Commands::CycleTimes {
            resolved_days,
            json,
        } => {
            let dashboard = JiraKpi::from_env()?;
            let options = FetchOptions {
                resolved_days,
                ..Default::default()
            };
            let rows = dashboard.cycle_times(&options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_cycle_times(&rows);
            }
        }
        Commands::Issues { status, days, json } => {
            let dashboard = JiraKpi::from_env()?;
            let issues = dashboard.issues(status.as_deref(), days).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else if issues.is_empty() {
                println!("No issues found.");
            } else {
                for issue in &issues {
                    let assignee = issue
                        .fields
                        .assignee
                        .as_ref()
                        .map(|a| a.display_name.as_str())
                        .unwrap_or("unassigned");
                    println!(
                        "[{}] {} {} ({}) - {assignee}",
                        issue.status(),
                        issue.key,
                        issue.fields.summary,
                        issue.issue_type(),
                    );
                }
                println!("\n{} issues", issues.len());
            }
        }
        Commands::Users { json } => {
            let dashboard = JiraKpi::from_env()?;
            let users = dashboard.team_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                print_users(&users);
            }
        }
        Commands::Settings { action } => {
            let store = open_store(cli.api.as_deref(), cli.db.as_deref()).await?;
            handle_settings(&store, action).await?;
        }
    }

    Ok(())
}

async fn open_store(api: Option<&str>, db: Option<&str>) -> anyhow::Result<SettingsStore> {
    let api_base = match api.map(str::to_string).or_else(|| std::env::var("DASHBOARD_API_URL").ok()) {
        Some(raw) => Some(Url::parse(&raw)?),
        None => None,
    };
    let db_path = db.map(PathBuf::from);
    Ok(SettingsStore::connect(api_base, db_path).await?)
}

async fn handle_settings(store: &SettingsStore, action: SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Get { table, user } => {
            let table: TableType = table.parse()?;
            let settings = store
                .get(table, user.as_deref())
                .await?
                .unwrap_or_else(|| TableSettings::default_for(table));
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Set { file } => {
            let raw = if file == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file)?
            };
            let settings: TableSettings = serde_json::from_str(&raw)?;
            store.put(&settings).await?;
            println!("Saved settings for {}.", settings.id);
        }
        SettingsAction::Delete { table, user } => {
            let table: TableType = table.parse()?;
            store.delete(table, user.as_deref()).await?;
            println!("Deleted settings for {table}.");
        }
    }
    Ok(())
}

fn print_report(report: &KpiReport) {
    println!("Team KPI Report");
    println!("  Work distribution:");
    println!("    New product: {:.1}%", report.distribution.new_product);
    println!("    Maintenance: {:.1}%", report.distribution.maintenance);
    println!("  Cycle time (avg): {} days", report.avg_cycle_time);
    println!("  Total tasks:      {}", report.total_tasks);
    println!("  Completed:        {}", report.completed_tasks);
    println!("  Throughput:       {} tasks/week", report.throughput);

    if !report.new_product_types.is_empty() {
        println!("  New product types:");
        for (name, count) in &report.new_product_types {
            println!("    {name}: {count}");
        }
    }
    if !report.maintenance_types.is_empty() {
        println!("  Maintenance types:");
        for (name, count) in &report.maintenance_types {
            println!("    {name}: {count}");
        }
    }

    let edd = &report.edd_delivery;
    println!("  Delivery vs target:");
    if edd.total_with_edd == 0 {
        println!("    No completed issues with a target delivery date");
        return;
    }
    println!("    With target date: {}", edd.total_with_edd);
    println!(
        "    On time:          {} ({:.1}%)",
        edd.delivered_on_time, edd.on_time_percentage
    );
    println!("    Late:             {}", edd.delivered_late);
    println!("    Avg target-date changes: {}", edd.average_edd_changes);
    let no = &edd.change_impact.no_changes;
    let with = &edd.change_impact.with_changes;
    println!(
        "    No-changes cohort:   {} on time, {} late ({:.1}%)",
        no.on_time, no.late, no.percentage
    );
    println!(
        "    With-changes cohort: {} on time, {} late ({:.1}%)",
        with.on_time, with.late, with.percentage
    );
}

fn print_edd_rows(rows: &[EddAnalysisRow]) {
    if rows.is_empty() {
        println!("No completed issues with a target delivery date.");
        return;
    }
    for row in rows {
        let outcome = if row.delivered_on_time {
            "on-time".to_string()
        } else {
            format!("late {}d", row.days_late)
        };
        println!(
            "[{outcome}] {} ({}) target {} resolved {} changes {}",
            row.issue_key, row.issue_type, row.target_date, row.actual_delivery, row.edd_changes
        );
    }
    println!("\n{} issues", rows.len());
}

fn print_cycle_times(rows: &[CycleTimeDetail]) {
    if rows.is_empty() {
        println!("No completed issues with a cycle time.");
        return;
    }
    for row in rows {
        println!(
            "{}  {:.2} days  ({})",
            row.issue_key, row.cycle_time, row.issue_type
        );
    }
    println!("\n{} issues", rows.len());
}

fn print_users(users: &[TeamUser]) {
    if users.is_empty() {
        println!("No team members found.");
        return;
    }
    for user in users {
        let email = user.email.as_deref().unwrap_or("no email");
        match &user.role {
            Some(role) => println!("{} <{email}> ({role})", user.display_name),
            None => println!("{} <{email}>", user.display_name),
        }
    }
}
