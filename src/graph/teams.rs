//! Microsoft Teams inventory
//!
//! Teams are Microsoft 365 groups whose `resourceProvisioningOptions`
//! contains `Team`. Requires Group.Read.All.

use crate::error::Result;
use crate::graph::GraphClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamGroup {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_provisioning_options: Vec<String>,
}

impl TeamGroup {
    pub fn is_team(&self) -> bool {
        self.resource_provisioning_options
            .iter()
            .any(|o| o.eq_ignore_ascii_case("Team"))
    }
}

pub async fn list_teams(client: &GraphClient) -> Result<Vec<TeamGroup>> {
    let groups: Vec<TeamGroup> = client
        .get_all_pages_beta(
            "groups?$filter=resourceProvisioningOptions/Any(x:x eq 'Team')\
             &$select=id,displayName,description,visibility,mail,createdDateTime,resourceProvisioningOptions",
        )
        .await?;

    // The filter is advisory on some tenants; keep only real teams
    Ok(groups.into_iter().filter(TeamGroup::is_team).collect())
}
