//! Entra ID directory data
//!
//! Required permissions:
//! - Organization.Read.All - connection test
//! - User.Read.All - user inventory
//! - AuditLog.Read.All - authentication method registration details

use crate::error::Result;
use crate::graph::GraphClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const USER_SELECT: &str = "id,displayName,userPrincipalName,mail,accountEnabled,userType,createdDateTime,jobTitle,department,assignedLicenses";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub verified_domains: Vec<VerifiedDomain>,
    #[serde(default)]
    pub tenant_type: Option<String>,
    #[serde(default)]
    pub country_letter_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDomain {
    pub name: String,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub is_initial: Option<bool>,
}

impl Organization {
    pub fn default_domain(&self) -> Option<&str> {
        self.verified_domains
            .iter()
            .find(|d| d.is_default == Some(true))
            .or_else(|| self.verified_domains.first())
            .map(|d| d.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub account_enabled: Option<bool>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub assigned_licenses: Vec<AssignedLicense>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedLicense {
    pub sku_id: Option<String>,
}

/// Authentication method registration state of one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistrationDetail {
    pub id: String,
    pub user_principal_name: Option<String>,
    pub user_display_name: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub is_mfa_capable: Option<bool>,
    #[serde(default)]
    pub is_mfa_registered: Option<bool>,
    #[serde(default)]
    pub is_passwordless_capable: Option<bool>,
    #[serde(default)]
    pub methods_registered: Vec<String>,
    #[serde(default)]
    pub default_mfa_method: Option<String>,
}

/// Tenant organization record; first entry of `/organization`
pub async fn get_organization(client: &GraphClient) -> Result<Option<Organization>> {
    let orgs: Vec<Organization> = client.get_all_pages("organization").await?;
    Ok(orgs.into_iter().next())
}

pub async fn list_users(client: &GraphClient) -> Result<Vec<User>> {
    client
        .get_all_pages(&format!("users?$select={}&$top=999", USER_SELECT))
        .await
}

pub async fn list_registration_details(client: &GraphClient) -> Result<Vec<UserRegistrationDetail>> {
    client
        .get_all_pages("reports/authenticationMethods/userRegistrationDetails")
        .await
}
