//! [`DataSource`] implementations for each report kind

use crate::error::Result;
use crate::graph::usage::ReportPeriod;
use crate::graph::{GraphClient, directory, security, teams, usage};
use crate::report::records::{
    AlertRecord, MailboxRecord, MfaRecord, OneDriveRecord, TeamRecord, UserRecord,
};
use crate::report::{DataSource, ReportKind};
use chrono::{DateTime, NaiveDate, Utc};

const GB: u64 = 1024 * 1024 * 1024;
const MB: u64 = 1024 * 1024;
const SAMPLE_DOMAIN: &str = "contoso.com";

fn sample_date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .map(|dt| dt.and_utc())
}

fn upn(alias: &str) -> String {
    format!("{}@{}", alias, SAMPLE_DOMAIN)
}

pub struct UsersSource;

impl DataSource for UsersSource {
    type Record = UserRecord;

    fn kind(&self) -> ReportKind {
        ReportKind::Users
    }

    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<UserRecord>> {
        let users = directory::list_users(client).await?;
        Ok(users.into_iter().map(UserRecord::from).collect())
    }

    fn fetch_sample(&self) -> Vec<UserRecord> {
        let user = |name: &str, alias: &str, dept: &str, title: &str, enabled: bool, licensed: bool| {
            UserRecord {
                display_name: name.to_string(),
                user_principal_name: upn(alias),
                mail: Some(upn(alias)),
                account_enabled: enabled,
                user_type: "Member".to_string(),
                department: Some(dept.to_string()),
                job_title: Some(title.to_string()),
                licensed,
                created: sample_date(2023, 3, 14),
            }
        };

        vec![
            user("Adele Vance", "adelev", "Retail", "Retail Manager", true, true),
            user("Alex Wilber", "alexw", "Marketing", "Marketing Assistant", true, true),
            user("Diego Siciliani", "diegos", "HR", "HR Manager", true, true),
            user("Grady Archie", "gradya", "R&D", "Designer", true, false),
            user("Isaiah Langer", "isaiahl", "Sales", "Sales Rep", false, true),
            user("Megan Bowen", "meganb", "Marketing", "Marketing Manager", true, true),
            UserRecord {
                display_name: "Pat External".to_string(),
                user_principal_name: format!("pat_fabrikam.com#EXT#@{}", SAMPLE_DOMAIN),
                mail: Some("pat@fabrikam.com".to_string()),
                account_enabled: true,
                user_type: "Guest".to_string(),
                department: None,
                job_title: None,
                licensed: false,
                created: sample_date(2024, 6, 2),
            },
        ]
    }
}

pub struct MfaSource;

impl DataSource for MfaSource {
    type Record = MfaRecord;

    fn kind(&self) -> ReportKind {
        ReportKind::Mfa
    }

    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<MfaRecord>> {
        let details = directory::list_registration_details(client).await?;
        Ok(details.into_iter().map(MfaRecord::from).collect())
    }

    fn fetch_sample(&self) -> Vec<MfaRecord> {
        // Email alone doesn't count as an MFA method
        fn record(name: &str, alias: &str, admin: bool, methods: &[&str]) -> MfaRecord {
            let registered = methods.iter().any(|m| *m != "email");
            MfaRecord {
                display_name: name.to_string(),
                user_principal_name: upn(alias),
                is_admin: admin,
                mfa_registered: registered,
                mfa_capable: registered,
                default_method: registered.then(|| methods[0].to_string()),
                methods: methods.iter().map(|m| m.to_string()).collect(),
            }
        }

        vec![
            record("Adele Vance", "adelev", false, &["microsoftAuthenticatorPush", "mobilePhone"]),
            record("Alex Wilber", "alexw", false, &["email"]),
            record("Diego Siciliani", "diegos", true, &["fido2", "microsoftAuthenticatorPush"]),
            record("Grady Archie", "gradya", false, &[]),
            record("Megan Bowen", "meganb", true, &[]),
            record("Nestor Wilke", "nestorw", false, &["softwareOneTimePasscode"]),
        ]
    }
}

pub struct MailboxSource {
    pub period: ReportPeriod,
}

impl DataSource for MailboxSource {
    type Record = MailboxRecord;

    fn kind(&self) -> ReportKind {
        ReportKind::Mailboxes
    }

    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<MailboxRecord>> {
        let details = usage::mailbox_usage(client, self.period).await?;
        Ok(details
            .into_iter()
            .filter(|m| m.is_deleted != Some(true))
            .map(MailboxRecord::from)
            .collect())
    }

    fn fetch_sample(&self) -> Vec<MailboxRecord> {
        let mailbox = |name: &str, alias: &str, used: u64, items: u64, archive: bool, last: Option<&str>| {
            MailboxRecord {
                display_name: name.to_string(),
                user_principal_name: upn(alias),
                recipient_type: "User".to_string(),
                storage_used_bytes: used,
                item_count: items,
                quota_bytes: Some(50 * GB),
                has_archive: archive,
                last_activity: last.map(str::to_string),
            }
        };

        vec![
            mailbox("Adele Vance", "adelev", 12 * GB, 48_210, true, Some("2024-09-30")),
            mailbox("Alex Wilber", "alexw", 3 * GB + 512 * MB, 9_870, false, Some("2024-09-29")),
            mailbox("Diego Siciliani", "diegos", 47 * GB, 151_003, false, Some("2024-09-30")),
            mailbox("Isaiah Langer", "isaiahl", 800 * MB, 2_114, false, None),
            MailboxRecord {
                display_name: "Support".to_string(),
                user_principal_name: upn("support"),
                recipient_type: "Shared".to_string(),
                storage_used_bytes: 21 * GB,
                item_count: 88_402,
                quota_bytes: Some(50 * GB),
                has_archive: true,
                last_activity: Some("2024-09-30".to_string()),
            },
        ]
    }
}

pub struct OneDriveSource {
    pub period: ReportPeriod,
}

impl DataSource for OneDriveSource {
    type Record = OneDriveRecord;

    fn kind(&self) -> ReportKind {
        ReportKind::Onedrive
    }

    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<OneDriveRecord>> {
        let details = usage::onedrive_usage(client, self.period).await?;
        Ok(details
            .into_iter()
            .filter(|o| o.is_deleted != Some(true))
            .map(OneDriveRecord::from)
            .collect())
    }

    fn fetch_sample(&self) -> Vec<OneDriveRecord> {
        let drive = |name: &str, alias: &str, files: u64, active: u64, used: u64, last: Option<&str>| {
            OneDriveRecord {
                owner_display_name: name.to_string(),
                owner_principal_name: upn(alias),
                site_url: Some(format!(
                    "https://contoso-my.sharepoint.com/personal/{}_contoso_com",
                    alias
                )),
                file_count: files,
                active_file_count: active,
                storage_used_bytes: used,
                storage_allocated_bytes: Some(1024 * GB),
                last_activity: last.map(str::to_string),
            }
        };

        vec![
            drive("Adele Vance", "adelev", 1_204, 87, 14 * GB, Some("2024-09-30")),
            drive("Alex Wilber", "alexw", 312, 5, 2 * GB, Some("2024-09-12")),
            drive("Diego Siciliani", "diegos", 4_530, 410, 96 * GB, Some("2024-09-30")),
            drive("Grady Archie", "gradya", 18, 0, 120 * MB, None),
        ]
    }
}

pub struct TeamsSource;

impl DataSource for TeamsSource {
    type Record = TeamRecord;

    fn kind(&self) -> ReportKind {
        ReportKind::Teams
    }

    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<TeamRecord>> {
        let groups = teams::list_teams(client).await?;
        Ok(groups.into_iter().map(TeamRecord::from).collect())
    }

    fn fetch_sample(&self) -> Vec<TeamRecord> {
        let team = |name: &str, desc: &str, visibility: &str, alias: &str, created| TeamRecord {
            display_name: name.to_string(),
            description: Some(desc.to_string()),
            visibility: visibility.to_string(),
            mail: Some(upn(alias)),
            created,
        };

        vec![
            team("Mark 8 Project Team", "Product launch coordination", "Public", "mark8project", sample_date(2023, 5, 2)),
            team("Retail", "Store operations", "Private", "retail", sample_date(2022, 11, 20)),
            team("Sales and Marketing", "Campaign planning", "Public", "salesandmarketing", sample_date(2023, 1, 9)),
            team("Leadership", "Executive team", "Private", "leadership", sample_date(2021, 8, 30)),
        ]
    }
}

pub struct AlertsSource {
    pub days: i64,
}

impl DataSource for AlertsSource {
    type Record = AlertRecord;

    fn kind(&self) -> ReportKind {
        ReportKind::Alerts
    }

    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<AlertRecord>> {
        let alerts = security::list_alerts(client, self.days).await?;
        Ok(alerts.into_iter().map(AlertRecord::from).collect())
    }

    fn fetch_sample(&self) -> Vec<AlertRecord> {
        let alert = |title: &str, severity: &str, status: &str, category: &str, source: &str, created| {
            AlertRecord {
                title: title.to_string(),
                severity: severity.to_string(),
                status: status.to_string(),
                category: Some(category.to_string()),
                service_source: Some(source.to_string()),
                created,
            }
        };

        vec![
            alert("Suspicious inbox forwarding rule", "high", "new", "Exfiltration", "microsoftDefenderForOffice365", sample_date(2024, 9, 28)),
            alert("Impossible travel activity", "medium", "inProgress", "InitialAccess", "microsoftDefenderForCloudApps", sample_date(2024, 9, 27)),
            alert("Email messages containing malicious URL removed after delivery", "informational", "resolved", "InitialAccess", "microsoftDefenderForOffice365", sample_date(2024, 9, 25)),
            alert("Unfamiliar sign-in properties", "low", "new", "InitialAccess", "azureAdIdentityProtection", sample_date(2024, 9, 24)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportRecord;

    fn assert_rows_complete<S: DataSource>(source: S) {
        let sample = source.fetch_sample();
        assert!(!sample.is_empty(), "{:?} sample is empty", source.kind());
        for record in &sample {
            assert_eq!(record.row().len(), <S::Record as ReportRecord>::HEADERS.len());
        }
    }

    #[test]
    fn test_every_sample_matches_its_headers() {
        assert_rows_complete(UsersSource);
        assert_rows_complete(MfaSource);
        assert_rows_complete(MailboxSource {
            period: ReportPeriod::D30,
        });
        assert_rows_complete(OneDriveSource {
            period: ReportPeriod::D30,
        });
        assert_rows_complete(TeamsSource);
        assert_rows_complete(AlertsSource { days: 30 });
    }

    #[test]
    fn test_mfa_sample_has_unregistered_admin() {
        let sample = MfaSource.fetch_sample();
        assert!(sample.iter().any(|r| r.is_admin && !r.mfa_registered));
        assert!(sample.iter().any(|r| r.methods == vec!["email".to_string()] && !r.mfa_registered));
    }
}
