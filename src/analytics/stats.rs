//! Visit statistics rollups

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analytics::devices::DeviceIndex;
use crate::analytics::filter::{select_events, FilterSpec};
use crate::models::VisitEvent;

const HOUR_BUCKET_FORMAT: &str = "%Y-%m-%d %H:00";

/// Counters for one observed value of a token parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub total: u64,
    pub unique: u64,
    pub repeated: u64,
    pub vpn: u64,
    pub legitimate: u64,
}

impl TokenCounts {
    fn record(&mut self, is_vpn: bool, is_repeated: bool) {
        self.total += 1;
        if is_vpn {
            self.vpn += 1;
        } else {
            self.legitimate += 1;
        }
        if is_repeated {
            self.repeated += 1;
        } else {
            self.unique += 1;
        }
    }
}

/// parameter name -> observed value -> counters
pub type TokenStats = BTreeMap<String, BTreeMap<String, TokenCounts>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total: u64,
    /// Distinct non-empty device ids
    pub unique: u64,
    pub repeated: u64,
    pub vpn: u64,
    pub legitimate: u64,
    pub sources: BTreeMap<String, u64>,
    pub regions: BTreeMap<String, u64>,
    pub browsers: BTreeMap<String, u64>,
    /// `yyyy-MM-dd HH:00` in the query time zone
    pub hourly: BTreeMap<String, u64>,
    pub token_stats: TokenStats,
}

fn bump(counts: &mut BTreeMap<String, u64>, key: Option<&str>) {
    if let Some(key) = key.filter(|k| !k.is_empty()) {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
}

fn hour_bucket<Tz: TimeZone>(ts: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp_millis(ts) {
        Some(utc) => utc
            .with_timezone(tz)
            .format(HOUR_BUCKET_FORMAT)
            .to_string(),
        None => "invalid".to_string(),
    }
}

/// Filter `events` with `spec` against the local clock, then summarize
pub fn aggregate(events: &[VisitEvent], spec: &FilterSpec) -> StatsSummary {
    aggregate_at(events, spec, &Local::now())
}

/// Like [`aggregate`] with an explicit reference time. Hour buckets are
/// formatted in the zone of `now`.
pub fn aggregate_at<Tz: TimeZone>(
    events: &[VisitEvent],
    spec: &FilterSpec,
    now: &DateTime<Tz>,
) -> StatsSummary
where
    Tz::Offset: std::fmt::Display,
{
    let selected = select_events(events, spec, now);
    summarize(&selected, &spec.token_parameters(), &now.timezone())
}

/// Reduce an already filtered set of visits.
///
/// `token_parameters` holds one entry per token filter. A parameter listed
/// twice is counted twice.
///
/// Repeat status is computed here over `events` alone, independently of whatever
/// classification the filter used, so the summary always describes the set it
/// was handed.
pub fn summarize<Tz: TimeZone>(
    events: &[&VisitEvent],
    token_parameters: &[&str],
    tz: &Tz,
) -> StatsSummary
where
    Tz::Offset: std::fmt::Display,
{
    let devices = DeviceIndex::build(events.iter().copied());
    let mut summary = StatsSummary::default();

    for event in events {
        summary.total += 1;
        if event.is_vpn {
            summary.vpn += 1;
        }

        bump(&mut summary.sources, event.dimensions.source.as_deref());
        bump(&mut summary.regions, event.dimensions.region.as_deref());
        bump(&mut summary.browsers, event.dimensions.browser.as_deref());
        *summary.hourly.entry(hour_bucket(event.ts, tz)).or_insert(0) += 1;

        for parameter in token_parameters {
            let Some(observed) = event.field(parameter).filter(|v| !v.is_empty()) else {
                continue;
            };
            summary
                .token_stats
                .entry(parameter.to_string())
                .or_default()
                .entry(observed.to_string())
                .or_default()
                .record(event.is_vpn, devices.is_repeated(event));
        }
    }

    summary.unique = devices.unique() as u64;
    summary.repeated = summary.total - summary.unique;
    summary.legitimate = summary.total - summary.vpn;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::filter::{DateRange, TokenFilter};
    use chrono::{FixedOffset, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-20T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn visit(id: &str, device: &str) -> VisitEvent {
        let mut visit = VisitEvent {
            id: id.to_string(),
            link_id: "l1".to_string(),
            ts: now().timestamp_millis(),
            ..Default::default()
        };
        visit.dimensions.device_id = Some(device.to_string());
        visit
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let summary = aggregate_at(&[], &FilterSpec::new(DateRange::Today), &now());
        assert_eq!(summary, StatsSummary::default());
    }

    #[test]
    fn test_histograms_skip_missing_values() {
        let mut a = visit("a", "d1");
        a.dimensions.source = Some("Google".to_string());
        a.dimensions.region = Some("CA".to_string());
        a.dimensions.browser = Some("Chrome".to_string());
        let mut b = visit("b", "d2");
        b.dimensions.source = Some("Google".to_string());
        b.dimensions.region = Some(String::new());
        let c = visit("c", "d3");

        let summary = aggregate_at(&[a, b, c], &FilterSpec::new(DateRange::Today), &now());
        assert_eq!(summary.sources.get("Google"), Some(&2));
        assert_eq!(summary.sources.len(), 1);
        assert_eq!(summary.regions.len(), 1);
        assert_eq!(summary.browsers.get("Chrome"), Some(&1));
        assert!(!summary.sources.contains_key("Unknown"));
    }

    #[test]
    fn test_hourly_buckets_use_query_zone() {
        let mut a = visit("a", "d1");
        a.ts = DateTime::parse_from_rfc3339("2024-03-20T09:15:00Z")
            .unwrap()
            .timestamp_millis();
        let mut b = visit("b", "d2");
        b.ts = DateTime::parse_from_rfc3339("2024-03-20T09:59:59Z")
            .unwrap()
            .timestamp_millis();
        let events = [a, b];

        let summary = aggregate_at(&events, &FilterSpec::new(DateRange::Today), &now());
        assert_eq!(summary.hourly.get("2024-03-20 09:00"), Some(&2));

        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let summary = aggregate_at(
            &events,
            &FilterSpec::new(DateRange::Custom),
            &now().with_timezone(&tz),
        );
        assert_eq!(summary.hourly.get("2024-03-20 04:00"), Some(&2));
    }

    #[test]
    fn test_events_without_device_count_as_repeated() {
        let mut a = visit("a", "d1");
        a.dimensions.device_id = None;
        let b = visit("b", "d2");

        let summary = aggregate_at(&[a, b], &FilterSpec::new(DateRange::Today), &now());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.unique, 1);
        assert_eq!(summary.repeated, 1);
    }

    #[test]
    fn test_token_stats_break_down_observed_values() {
        let mut a = visit("a", "d1");
        a.params.insert("sub1".to_string(), "123".to_string());
        let mut b = visit("b", "d1");
        b.params.insert("sub1".to_string(), "456".to_string());
        b.is_vpn = true;
        let mut c = visit("c", "d2");
        c.params.insert("sub1".to_string(), String::new());
        let d = visit("d", "d3");

        let selected: Vec<&VisitEvent> = vec![&a, &b, &c, &d];
        let summary = summarize(&selected, &["sub1"], &Utc);

        let sub1 = &summary.token_stats["sub1"];
        assert_eq!(sub1.len(), 2);
        assert_eq!(
            sub1["123"],
            TokenCounts {
                total: 1,
                unique: 0,
                repeated: 1,
                vpn: 0,
                legitimate: 1
            }
        );
        assert_eq!(
            sub1["456"],
            TokenCounts {
                total: 1,
                unique: 0,
                repeated: 1,
                vpn: 1,
                legitimate: 0
            }
        );
    }

    #[test]
    fn test_token_stats_absent_without_token_filters() {
        let mut a = visit("a", "d1");
        a.params.insert("sub1".to_string(), "123".to_string());
        let summary = aggregate_at(&[a], &FilterSpec::new(DateRange::Today), &now());
        assert!(summary.token_stats.is_empty());
    }

    #[test]
    fn test_duplicate_token_filter_counts_per_filter() {
        let mut a = visit("a", "d1");
        a.params.insert("sub1".to_string(), "123".to_string());

        let mut spec = FilterSpec::new(DateRange::Today);
        spec.token_filters = vec![TokenFilter::new("sub1", "123"), TokenFilter::new("sub1", "123")];

        let summary = aggregate_at(&[a], &spec, &now());
        assert_eq!(summary.total, 1);
        let counts = summary.token_stats["sub1"]["123"];
        assert_eq!(counts.total, 2);
        assert_eq!(counts.unique, 2);
        assert_eq!(counts.legitimate, 2);
    }

    #[test]
    fn test_summary_wire_format() {
        let summary = aggregate_at(&[visit("a", "d1")], &FilterSpec::new(DateRange::Today), &now());
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["total"], 1);
        assert!(value["tokenStats"].is_object());
        assert!(value["hourly"]["2024-03-20 15:00"].is_number());
    }
}
