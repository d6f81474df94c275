// Campaign data model.
//
// Campaign records are owned by the remote service. We type the fields
// we read or write and keep everything else in `record` so an update can
// echo the record back without dropping settings we don't model.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Traffic source id the service uses for Facebook.
pub const FACEBOOK_TRAFFIC_SOURCE: &str = "54218f34454c61f813000001";
/// Campaign config version sent on update when the record lacks one.
pub const DEFAULT_CAMPAIGN_VERSION: &str = "1.8.2";

/// Campaign status codes understood by `changeStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    UnderReview,
    Active,
    AllowAll,
    BlockAll,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 4] = [
        CampaignStatus::UnderReview,
        CampaignStatus::Active,
        CampaignStatus::AllowAll,
        CampaignStatus::BlockAll,
    ];

    pub fn code(self) -> i64 {
        match self {
            CampaignStatus::UnderReview => 0,
            CampaignStatus::Active => 1,
            CampaignStatus::AllowAll => 2,
            CampaignStatus::BlockAll => -1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            CampaignStatus::UnderReview => "under review",
            CampaignStatus::Active => "active",
            CampaignStatus::AllowAll => "allow all",
            CampaignStatus::BlockAll => "block all",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    /// Accepts the numeric code or a name such as `active` or `block-all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown status code {}", code));
        }
        match s.to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "review" | "under-review" => Ok(CampaignStatus::UnderReview),
            "active" => Ok(CampaignStatus::Active),
            "allow-all" | "allow" => Ok(CampaignStatus::AllowAll),
            "block-all" | "block" => Ok(CampaignStatus::BlockAll),
            other => Err(format!(
                "unknown status '{}' (expected review, active, allow-all, block-all or 0/1/2/-1)",
                other
            )),
        }
    }
}

impl Serialize for CampaignStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for CampaignStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .and_then(CampaignStatus::from_code)
                .ok_or_else(|| de::Error::custom(format!("unknown status code {}", n))),
            Value::String(s) => s.parse().map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("invalid status {}", other))),
        }
    }
}

/// The API is loose about types: counters and status codes show up as
/// integers, floats or numeric strings depending on the endpoint.
fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Text fields may be null or arrive as numbers (traffic source ids).
fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A campaign as returned by `campaigns.php?a=list`.
///
/// The typed fields are read leniently from `record`, which keeps the
/// listing verbatim. Serializing a campaign writes `record` back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Campaign {
    /// Campaign id, e.g. `xmgbl4i3`.
    pub name: String,
    /// Display name, empty when the service has none.
    pub info: String,
    pub active: Option<i64>,
    pub fakeurl: Option<String>,
    pub traffic: Option<String>,
    pub total: Option<i64>,
    pub block: Option<i64>,
    pub record: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for Campaign {
    type Error = String;

    fn try_from(record: Map<String, Value>) -> Result<Self, Self::Error> {
        let field = |key: &str| record.get(key).unwrap_or(&Value::Null);
        let name = lenient_string(field("name"))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| "campaign record without a name".to_string())?;
        Ok(Campaign {
            name,
            info: lenient_string(field("info")).unwrap_or_default(),
            active: lenient_i64(field("active")),
            fakeurl: lenient_string(field("fakeurl")),
            traffic: lenient_string(field("traffic")),
            total: lenient_i64(field("total")),
            block: lenient_i64(field("block")),
            record,
        })
    }
}

impl From<Campaign> for Map<String, Value> {
    fn from(campaign: Campaign) -> Self {
        campaign.record
    }
}

impl Campaign {
    pub fn status(&self) -> Option<CampaignStatus> {
        self.active.and_then(CampaignStatus::from_code)
    }

    pub fn total_clicks(&self) -> i64 {
        self.total.unwrap_or(0)
    }

    pub fn blocked_clicks(&self) -> i64 {
        self.block.unwrap_or(0)
    }
}

/// Destination URL with its share of traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoneyUrl {
    pub url: String,
    pub perc: u32,
    #[serde(default)]
    pub desc: String,
}

impl MoneyUrl {
    /// A single landing page taking all traffic.
    pub fn single(url: &str) -> Self {
        MoneyUrl {
            url: url.to_string(),
            perc: 100,
            desc: "LP1".into(),
        }
    }
}

/// An allow/deny rule. `values: None` is sent as `null`, which the
/// service reads as "rule not set".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetRule {
    pub allow: bool,
    #[serde(rename = "d")]
    pub values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rules {
    pub mobile: TargetRule,
    pub country: TargetRule,
}

impl Rules {
    pub fn targeting(countries: Vec<String>, mobile_only: bool) -> Self {
        Rules {
            mobile: TargetRule {
                allow: true,
                values: mobile_only.then(Vec::new),
            },
            country: TargetRule {
                allow: true,
                values: Some(countries),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct PageLock {
    enabled: bool,
    action: &'static str,
    url: &'static str,
    timeout: u32,
}

impl Default for PageLock {
    fn default() -> Self {
        PageLock {
            enabled: false,
            action: "blank",
            url: "",
            timeout: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct DynVar {
    name: &'static str,
    value: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct UrlFilter {
    variable: &'static str,
    action: &'static str,
    value: &'static str,
}

/// Body of `campaigns.php?a=create`.
#[derive(Debug, Serialize)]
pub struct CreateCampaignRequest<'a> {
    info: &'a str,
    fakeurl: &'a str,
    active: i64,
    dynautopt: bool,
    dynvar: Vec<DynVar>,
    filters: Vec<Value>,
    lptrack: bool,
    pagelock: PageLock,
    realurl: Vec<MoneyUrl>,
    rules: Rules,
    schedule: Vec<Value>,
    traffic: &'a str,
    urlfilter: Vec<UrlFilter>,
    urlkeyword: &'a str,
}

/// Inputs for a new campaign. New campaigns always start under review.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub safe_url: String,
    pub money_url: String,
    pub countries: Vec<String>,
    pub mobile_only: bool,
    pub traffic_source: String,
}

impl NewCampaign {
    /// Thailand, mobile only, Facebook traffic.
    pub fn new(name: &str, safe_url: &str, money_url: &str) -> Self {
        NewCampaign {
            name: name.to_string(),
            safe_url: safe_url.to_string(),
            money_url: money_url.to_string(),
            countries: vec!["th".into()],
            mobile_only: true,
            traffic_source: FACEBOOK_TRAFFIC_SOURCE.into(),
        }
    }

    pub fn request(&self) -> CreateCampaignRequest<'_> {
        let countries = if self.countries.is_empty() {
            vec!["th".to_string()]
        } else {
            self.countries.clone()
        };
        CreateCampaignRequest {
            info: &self.name,
            fakeurl: &self.safe_url,
            active: CampaignStatus::UnderReview.code(),
            dynautopt: true,
            dynvar: vec![DynVar { name: "", value: "" }],
            filters: Vec::new(),
            lptrack: false,
            pagelock: PageLock::default(),
            realurl: vec![MoneyUrl::single(&self.money_url)],
            rules: Rules::targeting(countries, self.mobile_only),
            schedule: Vec::new(),
            traffic: &self.traffic_source,
            urlfilter: vec![UrlFilter {
                variable: "",
                action: "1",
                value: "",
            }],
            urlkeyword: "",
        }
    }
}

/// Fields that can be changed on an existing campaign. `None` keeps the
/// current value. Field names match the API so bulk files can be written
/// against its documentation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CampaignUpdate {
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub active: Option<CampaignStatus>,
    #[serde(default, rename = "fakeurl")]
    pub safe_url: Option<String>,
    #[serde(default, rename = "realurl")]
    pub money_urls: Option<Vec<MoneyUrl>>,
    #[serde(default)]
    pub rules: Option<Rules>,
    #[serde(default)]
    pub traffic: Option<String>,
}

impl CampaignUpdate {
    pub fn is_empty(&self) -> bool {
        *self == CampaignUpdate::default()
    }
}

/// One entry of a bulk update file.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateItem {
    pub campaign_id: String,
    #[serde(flatten)]
    pub update: CampaignUpdate,
}

/// Merge `update` into `current` and produce the body for
/// `campaigns.php?a=update`. The service replaces the whole record, so
/// every field must be present.
pub fn update_payload(current: &Campaign, update: &CampaignUpdate) -> Value {
    let kept = |key: &str, default: Value| current.record.get(key).cloned().unwrap_or(default);
    let text = |value: &Option<String>, key: &str, default: Value| match value {
        Some(v) => json!(v),
        None => kept(key, default),
    };

    let active = match update.active {
        Some(status) => json!(status.code()),
        None => kept("active", Value::Null),
    };
    let realurl = match &update.money_urls {
        Some(urls) => json!(urls),
        None => kept("realurl", Value::Null),
    };
    let rules = match &update.rules {
        Some(rules) => json!(rules),
        None => kept("rules", Value::Null),
    };

    let mut body = Map::new();
    body.insert("name".into(), json!(current.name));
    body.insert("cv".into(), kept("cv", json!(DEFAULT_CAMPAIGN_VERSION)));
    body.insert("maxrisk".into(), kept("maxrisk", Value::Null));
    body.insert("info".into(), text(&update.info, "info", json!("")));
    body.insert("active".into(), active);
    body.insert("fakeurl".into(), text(&update.safe_url, "fakeurl", Value::Null));
    body.insert("realurl".into(), realurl);
    body.insert("rules".into(), rules);
    body.insert("traffic".into(), text(&update.traffic, "traffic", Value::Null));
    body.insert("filters".into(), kept("filters", json!([])));
    body.insert("dynvar".into(), kept("dynvar", json!([{"name": "", "value": ""}])));
    body.insert("urlfilter".into(), kept("urlfilter", json!([])));
    body.insert("schedule".into(), kept("schedule", json!([])));
    body.insert(
        "pagelock".into(),
        kept(
            "pagelock",
            json!({"enabled": false, "action": "blank", "url": "", "timeout": 10}),
        ),
    );
    body.insert("lptrack".into(), kept("lptrack", json!("")));
    body.insert("dynautopt".into(), kept("dynautopt", json!("1")));
    body.insert("urlkeyword".into(), kept("urlkeyword", json!("")));
    body.insert("allowedcountries".into(), kept("allowedcountries", Value::Null));
    body.insert("allowedref".into(), kept("allowedref", Value::Null));
    body.insert("archived".into(), kept("archived", json!(0)));
    body.insert("device".into(), kept("device", Value::Null));
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed_campaign() -> Campaign {
        serde_json::from_value(json!({
            "name": "xmgbl4i3",
            "info": "TH Shoes",
            "active": "1",
            "fakeurl": "https://safe.example/",
            "traffic": FACEBOOK_TRAFFIC_SOURCE,
            "total": "120",
            "block": 30,
            "cv": "1.9.0",
            "realurl": [{"url": "https://lp.example/", "perc": 100, "desc": "LP1"}],
            "filters": [{"type": "isp"}],
            "maxrisk": null
        }))
        .unwrap()
    }

    #[test]
    fn status_parses_codes_and_names() {
        assert_eq!("1".parse::<CampaignStatus>().unwrap(), CampaignStatus::Active);
        assert_eq!("-1".parse::<CampaignStatus>().unwrap(), CampaignStatus::BlockAll);
        assert_eq!("review".parse::<CampaignStatus>().unwrap(), CampaignStatus::UnderReview);
        assert_eq!("Allow_All".parse::<CampaignStatus>().unwrap(), CampaignStatus::AllowAll);
        assert!("3".parse::<CampaignStatus>().is_err());
        assert!("paused".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn campaign_decodes_stringly_numbers() {
        let campaign = listed_campaign();
        assert_eq!(campaign.status(), Some(CampaignStatus::Active));
        assert_eq!(campaign.total_clicks(), 120);
        assert_eq!(campaign.blocked_clicks(), 30);
        assert_eq!(campaign.record["cv"], json!("1.9.0"));
    }

    #[test]
    fn campaign_with_only_a_name_uses_defaults() {
        let campaign: Campaign = serde_json::from_value(json!({"name": "abc"})).unwrap();
        assert_eq!(campaign.info, "");
        assert_eq!(campaign.status(), None);
        assert_eq!(campaign.total_clicks(), 0);
    }

    #[test]
    fn campaign_tolerates_null_and_numeric_text_fields() {
        let campaigns: Vec<Campaign> = serde_json::from_value(json!([
            {"name": "a1", "info": "Shoes", "traffic": 7, "active": 1},
            {"name": "b2", "info": null, "fakeurl": null, "total": 3.0}
        ]))
        .unwrap();
        assert_eq!(campaigns[0].traffic.as_deref(), Some("7"));
        assert_eq!(campaigns[1].info, "");
        assert_eq!(campaigns[1].fakeurl, None);
        assert_eq!(campaigns[1].total_clicks(), 3);
        assert_eq!(campaigns[1].record["info"], Value::Null);
    }

    #[test]
    fn campaign_without_a_name_is_rejected() {
        assert!(serde_json::from_value::<Campaign>(json!({"info": "nameless"})).is_err());
        assert!(serde_json::from_value::<Campaign>(json!({"name": null})).is_err());
    }

    #[test]
    fn update_payload_echoes_raw_record_values() {
        let current: Campaign = serde_json::from_value(json!({
            "name": "b2",
            "info": null,
            "active": "2",
            "traffic": 7
        }))
        .unwrap();
        let body = update_payload(&current, &CampaignUpdate::default());
        assert_eq!(body["active"], "2");
        assert_eq!(body["traffic"], 7);
        assert_eq!(body["info"], Value::Null);
        assert_eq!(body["fakeurl"], Value::Null);
    }

    #[test]
    fn campaign_serializes_back_to_its_record() {
        let campaign = listed_campaign();
        let value = serde_json::to_value(&campaign).unwrap();
        assert_eq!(value["active"], "1");
        assert_eq!(value["filters"], json!([{"type": "isp"}]));
    }

    #[test]
    fn create_request_matches_service_defaults() {
        let new = NewCampaign::new("Promo", "https://safe.example/", "https://lp.example/");
        let body = serde_json::to_value(new.request()).unwrap();
        assert_eq!(body["info"], "Promo");
        assert_eq!(body["active"], 0);
        assert_eq!(body["traffic"], FACEBOOK_TRAFFIC_SOURCE);
        assert_eq!(body["realurl"], json!([{"url": "https://lp.example/", "perc": 100, "desc": "LP1"}]));
        assert_eq!(body["rules"]["mobile"], json!({"allow": true, "d": []}));
        assert_eq!(body["rules"]["country"], json!({"allow": true, "d": ["th"]}));
        assert_eq!(body["pagelock"]["timeout"], 10);
        assert_eq!(body["urlfilter"][0]["action"], "1");
    }

    #[test]
    fn create_request_without_mobile_rule_sends_null() {
        let mut new = NewCampaign::new("Promo", "https://safe.example/", "https://lp.example/");
        new.mobile_only = false;
        new.countries = vec!["vn".into(), "th".into()];
        let body = serde_json::to_value(new.request()).unwrap();
        assert_eq!(body["rules"]["mobile"]["d"], Value::Null);
        assert_eq!(body["rules"]["country"]["d"], json!(["vn", "th"]));
    }

    #[test]
    fn update_payload_keeps_current_values() {
        let body = update_payload(&listed_campaign(), &CampaignUpdate::default());
        assert_eq!(body["name"], "xmgbl4i3");
        assert_eq!(body["info"], "TH Shoes");
        // the listing sent "1", so that is what goes back
        assert_eq!(body["active"], "1");
        assert_eq!(body["cv"], "1.9.0");
        assert_eq!(body["filters"], json!([{"type": "isp"}]));
        assert_eq!(body["realurl"][0]["url"], "https://lp.example/");
        // present-but-null stays null, missing fields get defaults
        assert_eq!(body["maxrisk"], Value::Null);
        assert_eq!(body["dynautopt"], "1");
        assert_eq!(body["archived"], 0);
        assert_eq!(body["schedule"], json!([]));
    }

    #[test]
    fn update_payload_applies_overrides() {
        let update = CampaignUpdate {
            info: Some("Renamed".into()),
            active: Some(CampaignStatus::BlockAll),
            safe_url: Some("https://other.example/".into()),
            money_urls: Some(vec![MoneyUrl::single("https://lp2.example/")]),
            rules: Some(Rules::targeting(vec!["vn".into()], false)),
            traffic: None,
        };
        let body = update_payload(&listed_campaign(), &update);
        assert_eq!(body["info"], "Renamed");
        assert_eq!(body["active"], -1);
        assert_eq!(body["fakeurl"], "https://other.example/");
        assert_eq!(body["realurl"][0]["url"], "https://lp2.example/");
        assert_eq!(body["rules"]["country"]["d"], json!(["vn"]));
        assert_eq!(body["traffic"], FACEBOOK_TRAFFIC_SOURCE);
    }

    #[test]
    fn bulk_items_use_api_field_names() {
        let items: Vec<BulkUpdateItem> = serde_json::from_value(json!([
            {"campaign_id": "a1", "fakeurl": "https://safe.example/", "active": "block-all"},
            {"campaign_id": "b2", "info": "Second", "active": 2}
        ]))
        .unwrap();
        assert_eq!(items[0].update.safe_url.as_deref(), Some("https://safe.example/"));
        assert_eq!(items[0].update.active, Some(CampaignStatus::BlockAll));
        assert_eq!(items[1].update.active, Some(CampaignStatus::AllowAll));
        assert!(!items[1].update.is_empty());
    }
}
