use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    pub host: String,
    pub verified: bool,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDomainRequest {
    pub host: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDomainRequest {
    pub host: Option<String>,
    pub verified: Option<bool>,
    pub is_global: Option<bool>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Placeholders,
    Query,
}

/// URL pattern describing how traffic-source tokens are appended to a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Active,
    Paused,
    Draft,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyCapping {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    Day,
}

/// Binds a traffic-source token (e.g. `{cid}`) to the visit property that
/// carries its value. `parameter` is the name token filters address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficParameter {
    pub id: String,
    pub source_id: String,
    pub token: String,
    pub parameter: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub status: CampaignStatus,
    /// Epoch milliseconds
    pub created_at: i64,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_source: Option<String>,
    #[serde(default)]
    pub traffic_parameters: Vec<TrafficParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
    #[serde(default)]
    pub block_vpn: bool,
    #[serde(default)]
    pub block_abnormal_traffic: bool,
    #[serde(default)]
    pub frequency_capping: FrequencyCapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_visitor_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub domain_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub traffic_source: Option<String>,
    #[serde(default)]
    pub traffic_parameters: Vec<TrafficParameter>,
    #[serde(default)]
    pub destination_url: Option<String>,
    #[serde(default)]
    pub block_vpn: bool,
    #[serde(default)]
    pub block_abnormal_traffic: bool,
    #[serde(default)]
    pub frequency_capping: FrequencyCapping,
    #[serde(default)]
    pub repeat_visitor_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub domain_id: Option<String>,
    pub template_id: Option<String>,
    pub status: Option<CampaignStatus>,
    pub traffic_source: Option<String>,
    pub destination_url: Option<String>,
    pub block_vpn: Option<bool>,
    pub block_abnormal_traffic: Option<bool>,
    pub frequency_capping: Option<FrequencyCapping>,
    pub repeat_visitor_url: Option<String>,
}

impl Campaign {
    pub fn apply(&mut self, update: UpdateCampaignRequest) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(domain_id) = update.domain_id {
            self.domain_id = domain_id;
        }
        if let Some(template_id) = update.template_id {
            self.template_id = Some(template_id);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(traffic_source) = update.traffic_source {
            self.traffic_source = Some(traffic_source);
        }
        if let Some(destination_url) = update.destination_url {
            self.destination_url = Some(destination_url);
        }
        if let Some(block_vpn) = update.block_vpn {
            self.block_vpn = block_vpn;
        }
        if let Some(block_abnormal_traffic) = update.block_abnormal_traffic {
            self.block_abnormal_traffic = block_abnormal_traffic;
        }
        if let Some(frequency_capping) = update.frequency_capping {
            self.frequency_capping = frequency_capping;
        }
        if let Some(repeat_visitor_url) = update.repeat_visitor_url {
            self.repeat_visitor_url = Some(repeat_visitor_url);
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }
}

/// Tracked redirect link, addressed on the redirect server by its slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub campaign_id: String,
    pub slug: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub traffic_parameters: Vec<TrafficParameter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateLinkRequest {
    /// Custom slug; generated when omitted
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}
