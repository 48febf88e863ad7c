use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

use super::{TableSettings, TableType};

/// Remote table-settings repository: the dashboard server fronting the
/// document store.
pub struct ApiStore {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct SettingsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    settings: Option<TableSettings>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiStore {
    pub fn new(base_url: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base_url })
    }

    /// Availability probe against the server's health endpoint.
    pub async fn is_available(&self) -> bool {
        let Ok(url) = self.base_url.join("/health") else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("settings API probe failed: {e}");
                false
            }
        }
    }

    pub async fn get(
        &self,
        table: TableType,
        user_id: Option<&str>,
    ) -> Result<Option<TableSettings>> {
        let mut url = self.settings_url(table)?;
        if let Some(uid) = user_id {
            url.query_pairs_mut().append_pair("userId", uid);
        }

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "settings fetch failed with {}",
                response.status()
            )));
        }

        let envelope: SettingsEnvelope = response.json().await?;
        if envelope.success {
            Ok(envelope.settings)
        } else {
            Ok(None)
        }
    }

    pub async fn put(&self, settings: &TableSettings) -> Result<()> {
        let url = self.base_url.join("/api/table-settings")?;
        let response = self.http.post(url).json(settings).send().await?;
        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "settings save failed with {}",
                response.status()
            )));
        }
        let envelope: SettingsEnvelope = response.json().await?;
        if envelope.success {
            log::info!("saved table settings for {}", settings.id);
            Ok(())
        } else {
            Err(Error::Store(
                envelope.error.unwrap_or_else(|| "save rejected".into()),
            ))
        }
    }

    pub async fn delete(&self, table: TableType, user_id: Option<&str>) -> Result<()> {
        let mut url = self.settings_url(table)?;
        if let Some(uid) = user_id {
            url.query_pairs_mut().append_pair("userId", uid);
        }
        let response = self.http.delete(url).send().await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(Error::Store(format!(
                "settings delete failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn settings_url(&self, table: TableType) -> Result<Url> {
        Ok(self.base_url.join(&format!("/api/table-settings/{table}"))?)
    }
}
