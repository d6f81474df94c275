// Reports derived from campaign listings: a status overview and a
// per-day block-rate check.

use crate::api::NoIPFraudClient;
use crate::campaign::Campaign;
use crate::error::ApiError;
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Block rate (percent) above which a campaign is flagged.
pub const HIGH_BLOCK_RATE: f64 = 50.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusEntry {
    pub campaign_id: String,
    pub campaign_name: String,
    pub status: Option<i64>,
    pub fakeurl: Option<String>,
    pub traffic: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockFlag {
    High,
    Ok,
}

impl fmt::Display for BlockFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockFlag::High => f.write_str("HIGH"),
            BlockFlag::Ok => f.write_str("OK"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockEntry {
    pub campaign_id: String,
    pub campaign_name: String,
    pub date: NaiveDate,
    pub total: i64,
    pub blocked: i64,
    pub allowed: i64,
    /// Percent of clicks blocked, rounded to two decimals.
    pub block_rate: f64,
    pub flag: BlockFlag,
}

pub fn status_report(campaigns: &[Campaign]) -> Vec<StatusEntry> {
    campaigns
        .iter()
        .map(|c| StatusEntry {
            campaign_id: c.name.clone(),
            campaign_name: c.info.clone(),
            status: c.active,
            fakeurl: c.fakeurl.clone(),
            traffic: c.traffic.clone(),
        })
        .collect()
}

/// Percent of `blocked` in `total`, rounded to two decimals. Zero traffic
/// gives a zero rate.
pub fn block_rate(total: i64, blocked: i64) -> f64 {
    round2(raw_block_rate(total, blocked))
}

fn raw_block_rate(total: i64, blocked: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    blocked as f64 / total as f64 * 100.0
}

fn round2(rate: f64) -> f64 {
    (rate * 100.0).round() / 100.0
}

pub fn block_report(campaigns: &[Campaign], date: NaiveDate) -> Vec<BlockEntry> {
    campaigns
        .iter()
        .map(|c| {
            let total = c.total_clicks();
            let blocked = c.blocked_clicks();
            // flag on the exact rate, rounding can pull 50.001 down to 50
            let rate = raw_block_rate(total, blocked);
            BlockEntry {
                campaign_id: c.name.clone(),
                campaign_name: c.info.clone(),
                date,
                total,
                blocked,
                allowed: total - blocked,
                block_rate: round2(rate),
                flag: if rate > HIGH_BLOCK_RATE { BlockFlag::High } else { BlockFlag::Ok },
            }
        })
        .collect()
}

pub fn yesterday() -> NaiveDate {
    Local::now().date_naive() - Duration::days(1)
}

impl NoIPFraudClient {
    /// Status of every campaign listed today.
    pub fn status_report(&mut self) -> Result<Vec<StatusEntry>, ApiError> {
        let campaigns = self.list_campaigns(None, None)?;
        Ok(status_report(&campaigns))
    }

    /// Block rates for a single day, yesterday by default.
    pub fn block_report(&mut self, date: Option<NaiveDate>) -> Result<Vec<BlockEntry>, ApiError> {
        let date = date.unwrap_or_else(yesterday);
        let campaigns = self.list_campaigns(Some(date), Some(date))?;
        Ok(block_report(&campaigns, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn campaigns() -> Vec<Campaign> {
        serde_json::from_value(json!([
            {"name": "a1", "info": "Alpha", "active": 1, "total": 200, "block": 150, "fakeurl": "https://a.example/"},
            {"name": "b2", "info": "Beta", "active": "-1", "total": "3", "block": "1"},
            {"name": "c3", "info": "Gamma", "active": 0}
        ]))
        .unwrap()
    }

    #[test]
    fn block_rate_rounds_and_handles_zero() {
        assert_eq!(block_rate(0, 0), 0.0);
        assert_eq!(block_rate(3, 1), 33.33);
        assert_eq!(block_rate(200, 150), 75.0);
        assert_eq!(block_rate(2, 1), 50.0);
    }

    #[test]
    fn block_report_flags_high_rates() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 30).unwrap();
        let report = block_report(&campaigns(), date);
        assert_eq!(report.len(), 3);

        assert_eq!(report[0].allowed, 50);
        assert_eq!(report[0].flag, BlockFlag::High);
        assert_eq!(report[1].block_rate, 33.33);
        assert_eq!(report[1].flag, BlockFlag::Ok);
        assert_eq!(report[2].total, 0);
        assert_eq!(report[2].block_rate, 0.0);
        assert!(report.iter().all(|e| e.date == date));
    }

    #[test]
    fn exactly_fifty_percent_is_not_high() {
        let campaigns: Vec<Campaign> =
            serde_json::from_value(json!([{"name": "h", "total": 10, "block": 5}])).unwrap();
        let report = block_report(&campaigns, yesterday());
        assert_eq!(report[0].flag, BlockFlag::Ok);
    }

    #[test]
    fn just_over_fifty_percent_is_high_even_when_it_rounds_to_fifty() {
        let campaigns: Vec<Campaign> =
            serde_json::from_value(json!([{"name": "h", "total": 100000, "block": 50001}])).unwrap();
        let report = block_report(&campaigns, yesterday());
        assert_eq!(report[0].block_rate, 50.0);
        assert_eq!(report[0].flag, BlockFlag::High);
    }

    #[test]
    fn status_report_mirrors_campaign_fields() {
        let report = status_report(&campaigns());
        assert_eq!(report[0].campaign_id, "a1");
        assert_eq!(report[0].campaign_name, "Alpha");
        assert_eq!(report[0].fakeurl.as_deref(), Some("https://a.example/"));
        assert_eq!(report[1].status, Some(-1));
        assert_eq!(report[2].traffic, None);
    }

    #[test]
    fn flag_serializes_uppercase() {
        assert_eq!(serde_json::to_value(BlockFlag::High).unwrap(), json!("HIGH"));
    }
}
