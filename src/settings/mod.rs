pub mod api;
pub mod local;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// The dashboard tables that persist per-table UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableType {
    InProgress,
    AwaitingProd,
    ToTake,
    MoreInfoRequest,
}

impl TableType {
    pub const ALL: &'static [TableType] = &[
        TableType::InProgress,
        TableType::AwaitingProd,
        TableType::ToTake,
        TableType::MoreInfoRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableType::InProgress => "in-progress",
            TableType::AwaitingProd => "awaiting-prod",
            TableType::ToTake => "to-take",
            TableType::MoreInfoRequest => "more-info-request",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TableType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown table type: {s}")))
    }
}

/// Width, visibility, and position of one table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSettings {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub visible: bool,
    pub order: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Active filters on a table. Typed lists for the common filters; anything
/// else rides in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSettings {
    pub column: String,
    pub direction: SortDirection,
}

/// One table's persisted UI state. This is the whole settings blob the
/// stores get and put; it carries no KPI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettings {
    pub id: TableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub columns: Vec<ColumnSettings>,
    #[serde(default)]
    pub filters: FilterSettings,
    pub sort: SortSettings,
    pub page_size: u32,
    /// Epoch milliseconds, stamped on save.
    #[serde(default)]
    pub last_updated: i64,
}

impl TableSettings {
    /// Storage key: `{table}` for global settings, `{table}-{user}` per user.
    pub fn settings_id(table: TableType, user_id: Option<&str>) -> String {
        match user_id {
            Some(uid) => format!("{table}-{uid}"),
            None => table.to_string(),
        }
    }

    /// Factory-default settings for a table.
    pub fn default_for(table: TableType) -> Self {
        let col = |key: &str, width: u32, order: u32| ColumnSettings {
            key: key.to_string(),
            width: Some(width),
            visible: true,
            order,
        };
        let (columns, sort_column, page_size) = match table {
            TableType::InProgress => (
                vec![
                    col("key", 120, 0),
                    col("summary", 300, 1),
                    col("assignee", 150, 2),
                    col("status", 120, 3),
                    col("priority", 100, 4),
                    col("created", 120, 5),
                    col("updated", 120, 6),
                ],
                "updated",
                50,
            ),
            TableType::AwaitingProd => (
                vec![
                    col("key", 120, 0),
                    col("summary", 350, 1),
                    col("assignee", 150, 2),
                    col("resolved", 120, 3),
                    col("priority", 100, 4),
                ],
                "resolved",
                25,
            ),
            TableType::ToTake => (
                vec![
                    col("key", 120, 0),
                    col("summary", 400, 1),
                    col("priority", 100, 2),
                    col("created", 120, 3),
                    col("labels", 200, 4),
                ],
                "created",
                30,
            ),
            TableType::MoreInfoRequest => (
                vec![
                    col("number", 60, 0),
                    col("key", 120, 1),
                    col("summary", 350, 2),
                    col("status", 140, 3),
                    col("type", 100, 4),
                    col("priority", 80, 5),
                    col("assignee", 100, 6),
                    col("created", 140, 7),
                ],
                "created",
                25,
            ),
        };
        Self {
            id: table,
            user_id: None,
            columns,
            filters: FilterSettings::default(),
            sort: SortSettings {
                column: sort_column.to_string(),
                direction: SortDirection::Desc,
            },
            page_size,
            last_updated: 0,
        }
    }
}

/// Table-settings persistence, backed by the document-store API when it is
/// reachable and by the local database otherwise.
pub enum SettingsStore {
    Api(api::ApiStore),
    Local(local::LocalStore),
}

impl SettingsStore {
    /// Probe the document-store API when configured and fall back to the
    /// local store.
    pub async fn connect(api_base: Option<Url>, db_path: Option<PathBuf>) -> Result<Self> {
        if let Some(base) = api_base {
            let store = api::ApiStore::new(base)?;
            if store.is_available().await {
                log::info!("using document-store API for table settings");
                return Ok(SettingsStore::Api(store));
            }
            log::warn!("settings API unavailable, falling back to local store");
        }
        let store = match db_path {
            Some(path) => local::LocalStore::open_at(path).await?,
            None => local::LocalStore::open().await?,
        };
        log::info!("using local table-settings store");
        Ok(SettingsStore::Local(store))
    }

    pub async fn get(
        &self,
        table: TableType,
        user_id: Option<&str>,
    ) -> Result<Option<TableSettings>> {
        match self {
            SettingsStore::Api(store) => store.get(table, user_id).await,
            SettingsStore::Local(store) => store.get(table, user_id).await,
        }
    }

    /// Persist a settings blob, stamping `last_updated`.
    pub async fn put(&self, settings: &TableSettings) -> Result<()> {
        let mut settings = settings.clone();
        settings.last_updated = chrono::Utc::now().timestamp_millis();
        match self {
            SettingsStore::Api(store) => store.put(&settings).await,
            SettingsStore::Local(store) => store.put(&settings).await,
        }
    }

    pub async fn delete(&self, table: TableType, user_id: Option<&str>) -> Result<()> {
        match self {
            SettingsStore::Api(store) => store.delete(table, user_id).await,
            SettingsStore::Local(store) => store.delete(table, user_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_type_round_trip() {
        for t in TableType::ALL {
            assert_eq!(t.as_str().parse::<TableType>().unwrap(), *t);
        }
        assert!("nonsense".parse::<TableType>().is_err());
    }

    #[test]
    fn test_settings_id_composition() {
        assert_eq!(
            TableSettings::settings_id(TableType::InProgress, None),
            "in-progress"
        );
        assert_eq!(
            TableSettings::settings_id(TableType::ToTake, Some("u42")),
            "to-take-u42"
        );
    }

    #[test]
    fn test_serialization_uses_wire_casing() {
        let settings = TableSettings::default_for(TableType::AwaitingProd);
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["id"], json!("awaiting-prod"));
        assert_eq!(value["pageSize"], json!(25));
        assert_eq!(value["sort"]["direction"], json!("desc"));
        assert_eq!(value["columns"][0]["key"], json!("key"));
    }

    #[test]
    fn test_deserialize_tolerates_unknown_filter_keys() {
        let value = json!({
            "id": "in-progress",
            "columns": [],
            "filters": {"assignee": ["u1"], "labels": ["infra"]},
            "sort": {"column": "updated", "direction": "desc"},
            "pageSize": 50,
            "lastUpdated": 0
        });
        let settings: TableSettings = serde_json::from_value(value).unwrap();
        assert_eq!(settings.filters.assignee, vec!["u1"]);
        assert!(settings.filters.extra.contains_key("labels"));
    }

    #[test]
    fn test_defaults_cover_every_table() {
        for t in TableType::ALL {
            let settings = TableSettings::default_for(*t);
            assert_eq!(settings.id, *t);
            assert!(!settings.columns.is_empty());
            assert!(settings.page_size > 0);
        }
    }
}
