use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One recorded hit on a tracked link.
///
/// The fixed dimensions cover everything the redirect server can classify on its
/// own. Tracking tokens whose names are chosen per campaign (`sub1`, `zoneid`, ...)
/// live in `params` and are flattened into the JSON object on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub id: String,
    #[serde(rename = "linkId")]
    pub link_id: String,
    /// Epoch milliseconds
    pub ts: i64,
    #[serde(flatten)]
    pub dimensions: VisitDimensions,
    #[serde(rename = "isVpn", default)]
    pub is_vpn: bool,
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

/// Optional classification attributes of a visit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitDimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Names of the fixed dimensions, as they appear on the wire
pub const DIMENSION_NAMES: &[&str] = &[
    "browser",
    "target_url",
    "keyword",
    "carrier",
    "device_id",
    "visitor_type",
    "traffic_type",
    "source",
    "region",
    "country",
    "city",
    "device",
    "os",
    "language",
    "referrer",
    "connection",
    "ip",
];

/// Wire names of the visit's own fields. The token side-table is flattened
/// next to them, so a token may never reuse one.
const RESERVED_PARAM_NAMES: &[&str] = &["id", "linkId", "ts", "isVpn"];

impl VisitDimensions {
    /// Look up a fixed dimension by its wire name
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "browser" => &self.browser,
            "target_url" => &self.target_url,
            "keyword" => &self.keyword,
            "carrier" => &self.carrier,
            "device_id" => &self.device_id,
            "visitor_type" => &self.visitor_type,
            "traffic_type" => &self.traffic_type,
            "source" => &self.source,
            "region" => &self.region,
            "country" => &self.country,
            "city" => &self.city,
            "device" => &self.device,
            "os" => &self.os,
            "language" => &self.language,
            "referrer" => &self.referrer,
            "connection" => &self.connection,
            "ip" => &self.ip,
            _ => return None,
        };
        value.as_deref()
    }

    /// Set a fixed dimension by wire name. Returns false if `name` is not a
    /// fixed dimension.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "browser" => &mut self.browser,
            "target_url" => &mut self.target_url,
            "keyword" => &mut self.keyword,
            "carrier" => &mut self.carrier,
            "device_id" => &mut self.device_id,
            "visitor_type" => &mut self.visitor_type,
            "traffic_type" => &mut self.traffic_type,
            "source" => &mut self.source,
            "region" => &mut self.region,
            "country" => &mut self.country,
            "city" => &mut self.city,
            "device" => &mut self.device,
            "os" => &mut self.os,
            "language" => &mut self.language,
            "referrer" => &mut self.referrer,
            "connection" => &mut self.connection,
            "ip" => &mut self.ip,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

impl VisitEvent {
    /// Resolve a tracking parameter name against this visit.
    ///
    /// Fixed dimensions win over the token side-table, so a campaign that maps a
    /// traffic-source token onto `browser` is filtered by the browser column.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.id.as_str()),
            "linkId" => Some(self.link_id.as_str()),
            _ => self
                .dimensions
                .get(name)
                .or_else(|| self.params.get(name).map(String::as_str)),
        }
    }

    /// Device id, treating the empty string as absent
    pub fn device_id(&self) -> Option<&str> {
        self.dimensions
            .device_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

/// A visit as submitted by the redirect layer, before `id` and `ts` are stamped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewVisit {
    #[serde(rename = "linkId")]
    pub link_id: String,
    #[serde(flatten)]
    pub dimensions: VisitDimensions,
    #[serde(rename = "isVpn", default)]
    pub is_vpn: bool,
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl NewVisit {
    pub fn new(link_id: impl Into<String>) -> Self {
        Self {
            link_id: link_id.into(),
            ..Default::default()
        }
    }

    /// Route a raw `name=value` pair into a fixed dimension or the token side-table.
    /// Names of the visit's own fields are dropped.
    pub fn insert_param(&mut self, name: &str, value: String) {
        if RESERVED_PARAM_NAMES.contains(&name) {
            tracing::warn!(link_id = %self.link_id, param = %name, "dropped reserved tracking parameter");
            return;
        }
        if !self.dimensions.set(name, value.clone()) {
            self.params.insert(name.to_string(), value);
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        self.dimensions
            .device_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    pub fn into_event(self, id: String, ts: i64) -> VisitEvent {
        VisitEvent {
            id,
            link_id: self.link_id,
            ts,
            dimensions: self.dimensions,
            is_vpn: self.is_vpn,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_prefers_fixed_dimension() {
        let mut visit = VisitEvent {
            id: "v1".to_string(),
            link_id: "l1".to_string(),
            ts: 0,
            ..Default::default()
        };
        visit.dimensions.browser = Some("Chrome".to_string());
        visit.params.insert("sub1".to_string(), "123".to_string());

        assert_eq!(visit.field("browser"), Some("Chrome"));
        assert_eq!(visit.field("sub1"), Some("123"));
        assert_eq!(visit.field("linkId"), Some("l1"));
        assert_eq!(visit.field("sub2"), None);
        assert_eq!(visit.field("country"), None);
    }

    #[test]
    fn test_wire_format_flattens_tokens() {
        let json = r#"{
            "id": "v_1",
            "linkId": "l1",
            "ts": 1700000000000,
            "browser": "Safari",
            "device_id": "abc",
            "isVpn": true,
            "sub1": "zone-9"
        }"#;

        let visit: VisitEvent = serde_json::from_str(json).unwrap();
        assert_eq!(visit.dimensions.browser.as_deref(), Some("Safari"));
        assert!(visit.is_vpn);
        assert_eq!(visit.params.get("sub1").map(String::as_str), Some("zone-9"));
        assert!(!visit.params.contains_key("browser"));

        let value = serde_json::to_value(&visit).unwrap();
        assert_eq!(value["sub1"], "zone-9");
        assert_eq!(value["linkId"], "l1");
    }

    #[test]
    fn test_missing_vpn_flag_defaults_to_false() {
        let json = r#"{"id": "v", "linkId": "l", "ts": 5}"#;
        let visit: VisitEvent = serde_json::from_str(json).unwrap();
        assert!(!visit.is_vpn);
        assert_eq!(visit.device_id(), None);
    }

    #[test]
    fn test_insert_param_drops_reserved_names() {
        let mut visit = NewVisit::new("l1");
        for name in ["id", "linkId", "ts", "isVpn"] {
            visit.insert_param(name, "spoofed".to_string());
        }
        visit.insert_param("sub1", "7".to_string());
        assert_eq!(visit.params.len(), 1);

        let event = visit.into_event("v1".to_string(), 10);
        assert_eq!(event.field("id"), Some("v1"));
        assert_eq!(event.field("linkId"), Some("l1"));

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json.matches("\"id\"").count(), 1);
        let back: VisitEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_insert_param_routes_known_names() {
        let mut visit = NewVisit::new("l1");
        visit.insert_param("country", "US".to_string());
        visit.insert_param("cid", "42".to_string());

        assert_eq!(visit.dimensions.country.as_deref(), Some("US"));
        assert_eq!(visit.params.get("cid").map(String::as_str), Some("42"));
    }
}
