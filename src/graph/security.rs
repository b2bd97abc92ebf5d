//! Microsoft 365 Defender alerts (`security/alerts_v2`)
//!
//! Requires SecurityAlert.Read.All.

use crate::error::{DiagError, Result};
use crate::graph::GraphClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub service_source: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub alert_web_url: Option<String>,
}

/// Start of a `days`-long look-back window ending at `now`
pub fn alerts_since(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if days < 1 {
        return Err(DiagError::ConfigError(format!(
            "alert window must be at least one day, got {}",
            days
        )));
    }
    chrono::Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| DiagError::ConfigError(format!("alert window of {} days is out of range", days)))
}

/// Alerts created in the last `days` days, newest first
pub async fn list_alerts(client: &GraphClient, days: i64) -> Result<Vec<SecurityAlert>> {
    let since = alerts_since(Utc::now(), days)?;
    let filter = format!("createdDateTime ge {}", since.format("%Y-%m-%dT%H:%M:%SZ"));
    client
        .get_all_pages(&format!(
            "security/alerts_v2?$filter={}&$orderby={}",
            urlencoding::encode(&filter),
            urlencoding::encode("createdDateTime desc")
        ))
        .await
}
