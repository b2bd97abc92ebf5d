//! Typed report rows, one struct per report kind

use crate::graph::directory::{User, UserRegistrationDetail};
use crate::graph::security::SecurityAlert;
use crate::graph::teams::TeamGroup;
use crate::graph::usage::{MailboxUsageDetail, OneDriveUsageDetail};
use crate::report::ReportRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d";
const QUOTA_WARNING_PERCENT: f64 = 90.0;

/// Human readable byte count (binary units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        "0%".to_string()
    } else {
        format!("{:.0}%", part as f64 * 100.0 / total as f64)
    }
}

fn yes_no(value: bool) -> String {
    let answer = if value { "Yes" } else { "No" };
    answer.to_string()
}

fn date(value: &Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub display_name: String,
    pub user_principal_name: String,
    pub mail: Option<String>,
    pub account_enabled: bool,
    pub user_type: String,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub licensed: bool,
    pub created: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn is_guest(&self) -> bool {
        self.user_type.eq_ignore_ascii_case("Guest")
    }
}

impl From<User> for UserRecord {
    fn from(u: User) -> Self {
        Self {
            display_name: u.display_name.unwrap_or_default(),
            user_principal_name: u.user_principal_name.unwrap_or_default(),
            mail: u.mail,
            account_enabled: u.account_enabled.unwrap_or(false),
            user_type: u.user_type.unwrap_or_else(|| "Member".to_string()),
            department: u.department,
            job_title: u.job_title,
            licensed: !u.assigned_licenses.is_empty(),
            created: u.created_date_time,
        }
    }
}

impl ReportRecord for UserRecord {
    const HEADERS: &'static [&'static str] = &[
        "Display Name",
        "User Principal Name",
        "Mail",
        "Enabled",
        "User Type",
        "Department",
        "Job Title",
        "Licensed",
        "Created",
    ];

    fn row(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            self.user_principal_name.clone(),
            text(&self.mail),
            yes_no(self.account_enabled),
            self.user_type.clone(),
            text(&self.department),
            text(&self.job_title),
            yes_no(self.licensed),
            date(&self.created),
        ]
    }

    fn summarize(records: &[Self]) -> Vec<(String, String)> {
        let enabled = records.iter().filter(|r| r.account_enabled).count();
        let guests = records.iter().filter(|r| r.is_guest()).count();
        let unlicensed = records
            .iter()
            .filter(|r| !r.is_guest() && r.account_enabled && !r.licensed)
            .count();

        vec![
            ("Total Users".into(), records.len().to_string()),
            ("Enabled".into(), enabled.to_string()),
            ("Disabled".into(), (records.len() - enabled).to_string()),
            ("Guests".into(), guests.to_string()),
            ("Unlicensed Members".into(), unlicensed.to_string()),
        ]
    }
}

// ============================================================================
// MFA registration
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaRecord {
    pub display_name: String,
    pub user_principal_name: String,
    pub is_admin: bool,
    pub mfa_registered: bool,
    pub mfa_capable: bool,
    pub default_method: Option<String>,
    pub methods: Vec<String>,
}

impl From<UserRegistrationDetail> for MfaRecord {
    fn from(d: UserRegistrationDetail) -> Self {
        Self {
            display_name: d.user_display_name.unwrap_or_default(),
            user_principal_name: d.user_principal_name.unwrap_or_default(),
            is_admin: d.is_admin.unwrap_or(false),
            mfa_registered: d.is_mfa_registered.unwrap_or(false),
            mfa_capable: d.is_mfa_capable.unwrap_or(false),
            default_method: d.default_mfa_method.filter(|m| m != "none"),
            methods: d.methods_registered,
        }
    }
}

impl ReportRecord for MfaRecord {
    const HEADERS: &'static [&'static str] = &[
        "Display Name",
        "User Principal Name",
        "Admin",
        "MFA Registered",
        "MFA Capable",
        "Default Method",
        "Registered Methods",
    ];

    fn row(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            self.user_principal_name.clone(),
            yes_no(self.is_admin),
            yes_no(self.mfa_registered),
            yes_no(self.mfa_capable),
            text(&self.default_method),
            self.methods.join("; "),
        ]
    }

    fn summarize(records: &[Self]) -> Vec<(String, String)> {
        let registered = records.iter().filter(|r| r.mfa_registered).count();
        let admins_without = records
            .iter()
            .filter(|r| r.is_admin && !r.mfa_registered)
            .count();

        vec![
            ("Users".into(), records.len().to_string()),
            (
                "MFA Registered".into(),
                format!("{} ({})", registered, percent(registered, records.len())),
            ),
            (
                "Not Registered".into(),
                (records.len() - registered).to_string(),
            ),
            ("Admins Without MFA".into(), admins_without.to_string()),
        ]
    }
}

// ============================================================================
// Mailboxes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxRecord {
    pub display_name: String,
    pub user_principal_name: String,
    pub recipient_type: String,
    pub storage_used_bytes: u64,
    pub item_count: u64,
    pub quota_bytes: Option<u64>,
    pub has_archive: bool,
    pub last_activity: Option<String>,
}

impl MailboxRecord {
    pub fn quota_used_percent(&self) -> Option<f64> {
        self.quota_bytes
            .filter(|q| *q > 0)
            .map(|q| self.storage_used_bytes as f64 * 100.0 / q as f64)
    }
}

impl From<MailboxUsageDetail> for MailboxRecord {
    fn from(m: MailboxUsageDetail) -> Self {
        Self {
            display_name: m.display_name.unwrap_or_default(),
            user_principal_name: m.user_principal_name.unwrap_or_default(),
            recipient_type: m.recipient_type.unwrap_or_else(|| "User".to_string()),
            storage_used_bytes: m.storage_used_in_bytes.unwrap_or(0),
            item_count: m.item_count.unwrap_or(0),
            quota_bytes: m.prohibit_send_receive_quota_in_bytes,
            has_archive: m.has_archive.unwrap_or(false),
            last_activity: m.last_activity_date.filter(|d| !d.is_empty()),
        }
    }
}

impl ReportRecord for MailboxRecord {
    const HEADERS: &'static [&'static str] = &[
        "Display Name",
        "User Principal Name",
        "Recipient Type",
        "Storage Used",
        "Quota Used",
        "Items",
        "Archive",
        "Last Activity",
    ];

    fn row(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            self.user_principal_name.clone(),
            self.recipient_type.clone(),
            format_bytes(self.storage_used_bytes),
            self.quota_used_percent()
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_default(),
            self.item_count.to_string(),
            yes_no(self.has_archive),
            text(&self.last_activity),
        ]
    }

    fn summarize(records: &[Self]) -> Vec<(String, String)> {
        let total: u64 = records.iter().map(|r| r.storage_used_bytes).sum();
        let near_quota = records
            .iter()
            .filter(|r| r.quota_used_percent().is_some_and(|p| p >= QUOTA_WARNING_PERCENT))
            .count();
        let inactive = records.iter().filter(|r| r.last_activity.is_none()).count();

        vec![
            ("Mailboxes".into(), records.len().to_string()),
            ("Total Storage".into(), format_bytes(total)),
            ("Above 90% Quota".into(), near_quota.to_string()),
            ("No Activity In Period".into(), inactive.to_string()),
        ]
    }
}

// ============================================================================
// OneDrive
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OneDriveRecord {
    pub owner_display_name: String,
    pub owner_principal_name: String,
    pub site_url: Option<String>,
    pub file_count: u64,
    pub active_file_count: u64,
    pub storage_used_bytes: u64,
    pub storage_allocated_bytes: Option<u64>,
    pub last_activity: Option<String>,
}

impl From<OneDriveUsageDetail> for OneDriveRecord {
    fn from(o: OneDriveUsageDetail) -> Self {
        Self {
            owner_display_name: o.owner_display_name.unwrap_or_default(),
            owner_principal_name: o.owner_principal_name.unwrap_or_default(),
            site_url: o.site_url,
            file_count: o.file_count.unwrap_or(0),
            active_file_count: o.active_file_count.unwrap_or(0),
            storage_used_bytes: o.storage_used_in_bytes.unwrap_or(0),
            storage_allocated_bytes: o.storage_allocated_in_bytes,
            last_activity: o.last_activity_date.filter(|d| !d.is_empty()),
        }
    }
}

impl ReportRecord for OneDriveRecord {
    const HEADERS: &'static [&'static str] = &[
        "Owner",
        "Owner Principal Name",
        "Site URL",
        "Files",
        "Active Files",
        "Storage Used",
        "Storage Allocated",
        "Last Activity",
    ];

    fn row(&self) -> Vec<String> {
        vec![
            self.owner_display_name.clone(),
            self.owner_principal_name.clone(),
            text(&self.site_url),
            self.file_count.to_string(),
            self.active_file_count.to_string(),
            format_bytes(self.storage_used_bytes),
            self.storage_allocated_bytes
                .map(format_bytes)
                .unwrap_or_default(),
            text(&self.last_activity),
        ]
    }

    fn summarize(records: &[Self]) -> Vec<(String, String)> {
        let total: u64 = records.iter().map(|r| r.storage_used_bytes).sum();
        let files: u64 = records.iter().map(|r| r.file_count).sum();
        let idle = records.iter().filter(|r| r.active_file_count == 0).count();

        vec![
            ("Accounts".into(), records.len().to_string()),
            ("Total Storage".into(), format_bytes(total)),
            ("Files".into(), files.to_string()),
            ("Accounts Without Activity".into(), idle.to_string()),
        ]
    }
}

// ============================================================================
// Teams
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub display_name: String,
    pub description: Option<String>,
    pub visibility: String,
    pub mail: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl From<TeamGroup> for TeamRecord {
    fn from(t: TeamGroup) -> Self {
        Self {
            display_name: t.display_name.unwrap_or_default(),
            description: t.description.filter(|d| !d.is_empty()),
            visibility: t.visibility.unwrap_or_else(|| "Private".to_string()),
            mail: t.mail,
            created: t.created_date_time,
        }
    }
}

impl ReportRecord for TeamRecord {
    const HEADERS: &'static [&'static str] =
        &["Team", "Description", "Visibility", "Mail", "Created"];

    fn row(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            text(&self.description),
            self.visibility.clone(),
            text(&self.mail),
            date(&self.created),
        ]
    }

    fn summarize(records: &[Self]) -> Vec<(String, String)> {
        let public = records
            .iter()
            .filter(|r| r.visibility.eq_ignore_ascii_case("Public"))
            .count();

        vec![
            ("Teams".into(), records.len().to_string()),
            ("Public".into(), public.to_string()),
            ("Private".into(), (records.len() - public).to_string()),
        ]
    }
}

// ============================================================================
// Security alerts
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub title: String,
    pub severity: String,
    pub status: String,
    pub category: Option<String>,
    pub service_source: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl AlertRecord {
    pub fn is_resolved(&self) -> bool {
        self.status.eq_ignore_ascii_case("resolved")
    }
}

impl From<SecurityAlert> for AlertRecord {
    fn from(a: SecurityAlert) -> Self {
        Self {
            title: a.title.unwrap_or_default(),
            severity: a.severity.unwrap_or_else(|| "unknown".to_string()),
            status: a.status.unwrap_or_else(|| "unknown".to_string()),
            category: a.category,
            service_source: a.service_source,
            created: a.created_date_time,
        }
    }
}

impl ReportRecord for AlertRecord {
    const HEADERS: &'static [&'static str] = &[
        "Title",
        "Severity",
        "Status",
        "Category",
        "Source",
        "Created",
    ];

    fn row(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.severity.clone(),
            self.status.clone(),
            text(&self.category),
            text(&self.service_source),
            date(&self.created),
        ]
    }

    fn summarize(records: &[Self]) -> Vec<(String, String)> {
        let count = |severity: &str| {
            records
                .iter()
                .filter(|r| r.severity.eq_ignore_ascii_case(severity))
                .count()
                .to_string()
        };
        let open = records.iter().filter(|r| !r.is_resolved()).count();

        vec![
            ("Alerts".into(), records.len().to_string()),
            ("Unresolved".into(), open.to_string()),
            ("High".into(), count("high")),
            ("Medium".into(), count("medium")),
            ("Low".into(), count("low")),
        ]
    }
}
