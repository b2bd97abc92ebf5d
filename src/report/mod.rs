//! Report generation
//!
//! Every report kind is a typed record ([`ReportRecord`]) produced by a
//! [`DataSource`] that can either query Microsoft Graph or return a built-in
//! sample dataset. [`collect`] applies the [`FallbackPolicy`] that decides
//! which of the two a run ends up with; the renderers in [`csv`], [`html`]
//! and [`pdf`] turn the resulting [`Dataset`] into files.

pub mod csv;
pub mod html;
pub mod pdf;
pub mod records;
pub mod sources;
pub mod template;

use crate::error::{DiagError, Result};
use crate::graph::GraphClient;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Entra ID user inventory
    Users,
    /// MFA registration status per user
    Mfa,
    /// Exchange Online mailbox usage
    Mailboxes,
    /// OneDrive account usage
    Onedrive,
    /// Microsoft Teams inventory
    Teams,
    /// Defender security alerts
    Alerts,
}

impl ReportKind {
    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Users => "users",
            ReportKind::Mfa => "mfa",
            ReportKind::Mailboxes => "mailboxes",
            ReportKind::Onedrive => "onedrive",
            ReportKind::Teams => "teams",
            ReportKind::Alerts => "alerts",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Users => "User Inventory",
            ReportKind::Mfa => "MFA Registration Status",
            ReportKind::Mailboxes => "Mailbox Usage",
            ReportKind::Onedrive => "OneDrive Usage",
            ReportKind::Teams => "Teams Inventory",
            ReportKind::Alerts => "Security Alerts",
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            ReportKind::Users | ReportKind::Mfa => "Entra ID",
            ReportKind::Mailboxes => "Exchange Online",
            ReportKind::Onedrive => "OneDrive",
            ReportKind::Teams => "Microsoft Teams",
            ReportKind::Alerts => "Microsoft Defender",
        }
    }
}

/// A row type that can be rendered as a CSV line or HTML table row
pub trait ReportRecord: Serialize {
    /// Column headers, in the same order as [`ReportRecord::row`]
    const HEADERS: &'static [&'static str];

    fn row(&self) -> Vec<String>;

    /// Headline figures shown above the table
    fn summarize(records: &[Self]) -> Vec<(String, String)>
    where
        Self: Sized;
}

/// Where a report's data can come from
#[allow(async_fn_in_trait)]
pub trait DataSource {
    type Record: ReportRecord;

    fn kind(&self) -> ReportKind;

    /// Query the tenant through Microsoft Graph
    async fn fetch_real(&self, client: &GraphClient) -> Result<Vec<Self::Record>>;

    /// Fixed demonstration data used when the tenant can't be queried
    fn fetch_sample(&self) -> Vec<Self::Record>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Use sample data if authentication or retrieval fails
    #[default]
    SampleOnError,
    /// Propagate the failure
    FailOnError,
    /// Don't contact the tenant at all
    SampleOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Sample { reason: String },
}

impl DataOrigin {
    pub fn is_sample(&self) -> bool {
        matches!(self, DataOrigin::Sample { .. })
    }

    pub fn label(&self) -> String {
        match self {
            DataOrigin::Live => "Live tenant data".to_string(),
            DataOrigin::Sample { reason } => format!("Sample data ({})", reason),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Dataset<R> {
    pub kind: ReportKind,
    #[serde(flatten)]
    pub origin: DataOrigin,
    pub records: Vec<R>,
}

/// Fetch records for `source`, falling back to sample data as `policy` allows.
///
/// `client` is the outcome of connecting to the tenant, so authentication
/// failures go through the same fallback decision as retrieval failures.
pub async fn collect<S: DataSource>(
    source: &S,
    client: std::result::Result<&GraphClient, DiagError>,
    policy: FallbackPolicy,
) -> Result<Dataset<S::Record>> {
    let kind = source.kind();

    if policy == FallbackPolicy::SampleOnly {
        return Ok(Dataset {
            kind,
            origin: DataOrigin::Sample {
                reason: "requested".into(),
            },
            records: source.fetch_sample(),
        });
    }

    let fetched = match client {
        Ok(client) => source.fetch_real(client).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(records) => {
            tracing::info!("Retrieved {} {} record(s)", records.len(), kind.slug());
            Ok(Dataset {
                kind,
                origin: DataOrigin::Live,
                records,
            })
        }
        Err(e) if policy == FallbackPolicy::SampleOnError => {
            tracing::warn!("{} retrieval failed, using sample data: {}", kind.slug(), e);
            Ok(Dataset {
                kind,
                origin: DataOrigin::Sample {
                    reason: e.to_string(),
                },
                records: source.fetch_sample(),
            })
        }
        Err(e) => Err(e),
    }
}
