//! Microsoft 365 usage reports (Exchange Online mailboxes, OneDrive accounts)
//!
//! The beta endpoint serves these reports as JSON when `$format=application/json`
//! is requested; v1.0 only returns CSV downloads.
//!
//! Required permissions:
//! - Reports.Read.All

use crate::error::{DiagError, Result};
use crate::graph::GraphClient;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reporting window accepted by the usage report functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPeriod {
    D7,
    #[default]
    D30,
    D90,
    D180,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::D7 => "D7",
            ReportPeriod::D30 => "D30",
            ReportPeriod::D90 => "D90",
            ReportPeriod::D180 => "D180",
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "D7" | "7" => Ok(ReportPeriod::D7),
            "D30" | "30" => Ok(ReportPeriod::D30),
            "D90" | "90" => Ok(ReportPeriod::D90),
            "D180" | "180" => Ok(ReportPeriod::D180),
            other => Err(DiagError::InvalidConfig(format!(
                "Unknown report period '{}'. Valid periods: D7, D30, D90, D180",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxUsageDetail {
    pub user_principal_name: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
    #[serde(default)]
    pub recipient_type: Option<String>,
    #[serde(default)]
    pub storage_used_in_bytes: Option<u64>,
    #[serde(default)]
    pub item_count: Option<u64>,
    #[serde(default)]
    pub prohibit_send_receive_quota_in_bytes: Option<u64>,
    #[serde(default)]
    pub last_activity_date: Option<String>,
    #[serde(default)]
    pub has_archive: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneDriveUsageDetail {
    pub owner_principal_name: Option<String>,
    pub owner_display_name: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
    #[serde(default)]
    pub file_count: Option<u64>,
    #[serde(default)]
    pub active_file_count: Option<u64>,
    #[serde(default)]
    pub storage_used_in_bytes: Option<u64>,
    #[serde(default)]
    pub storage_allocated_in_bytes: Option<u64>,
    #[serde(default)]
    pub last_activity_date: Option<String>,
}

pub async fn mailbox_usage(
    client: &GraphClient,
    period: ReportPeriod,
) -> Result<Vec<MailboxUsageDetail>> {
    client
        .get_all_pages_beta(&format!(
            "reports/getMailboxUsageDetail(period='{}')?$format=application/json",
            period.as_str()
        ))
        .await
}

pub async fn onedrive_usage(
    client: &GraphClient,
    period: ReportPeriod,
) -> Result<Vec<OneDriveUsageDetail>> {
    client
        .get_all_pages_beta(&format!(
            "reports/getOneDriveUsageAccountDetail(period='{}')?$format=application/json",
            period.as_str()
        ))
        .await
}
