//! Visit filter model and evaluator
//!
//! A `FilterSpec` is a partially specified query over visits. Every constraint
//! that is present narrows the result and all constraints are ANDed. A field
//! that is absent means "no constraint on that dimension".

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::analytics::devices::DeviceIndex;
use crate::models::VisitEvent;

pub(crate) const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Time window selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "today")]
    Today,
    #[default]
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "15d")]
    Last15Days,
    #[serde(rename = "month")]
    ThisMonth,
    #[serde(rename = "custom")]
    Custom,
}

impl std::str::FromStr for DateRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(DateRange::Today),
            "7d" => Ok(DateRange::Last7Days),
            "15d" => Ok(DateRange::Last15Days),
            "month" => Ok(DateRange::ThisMonth),
            "custom" => Ok(DateRange::Custom),
            other => Err(anyhow::anyhow!(
                "unknown date range '{other}', expected one of: today, 7d, 15d, month, custom"
            )),
        }
    }
}

/// Resolved inclusive bounds in epoch milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl DateBounds {
    pub fn contains(&self, ts: i64) -> bool {
        self.lower.is_none_or(|lower| ts >= lower) && self.upper.is_none_or(|upper| ts <= upper)
    }
}

/// Epoch milliseconds of 00:00 on `date` in the zone `tz`
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.timestamp_millis(),
        // Midnight skipped by a DST transition
        None => tz.from_utc_datetime(&midnight).timestamp_millis(),
    }
}

/// Epoch milliseconds of 00:00 UTC on `date`
fn utc_start_of_day(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

impl DateRange {
    /// Resolve this range against `now`. `start` and `end` only apply to `Custom`.
    ///
    /// Canned ranges start at a local midnight in the zone of `now`. Custom
    /// calendar dates are UTC days regardless of that zone.
    pub fn bounds<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> DateBounds {
        let tz = now.timezone();
        let today = now.date_naive();
        let today_start = start_of_day(&tz, today);

        match self {
            DateRange::Today => DateBounds {
                lower: Some(today_start),
                upper: None,
            },
            DateRange::Last7Days => DateBounds {
                lower: Some(today_start - 7 * DAY_MS),
                upper: None,
            },
            DateRange::Last15Days => DateBounds {
                lower: Some(today_start - 15 * DAY_MS),
                upper: None,
            },
            DateRange::ThisMonth => {
                let first = today.with_day(1).unwrap_or(today);
                DateBounds {
                    lower: Some(start_of_day(&tz, first)),
                    upper: None,
                }
            }
            DateRange::Custom => DateBounds {
                lower: start.map(utc_start_of_day),
                upper: end.map(|date| utc_start_of_day(date) + DAY_MS - 1),
            },
        }
    }
}

/// Exact match on a dynamically named visit property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFilter {
    pub parameter: String,
    pub value: String,
}

impl TokenFilter {
    pub fn new(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, event: &VisitEvent) -> bool {
        event.field(&self.parameter) == Some(self.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub token_filters: Vec<TokenFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(
        rename = "visitor_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub visitor_type: Option<String>,
    #[serde(
        rename = "traffic_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub traffic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_vpn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeated: Option<bool>,
}

impl FilterSpec {
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            ..Default::default()
        }
    }

    pub fn date_bounds<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateBounds {
        self.date_range.bounds(now, self.start_date, self.end_date)
    }

    /// Dimension constraints that are set. Empty strings carry no constraint.
    pub fn dimension_constraints(&self) -> Vec<(&'static str, &str)> {
        [
            ("country", &self.country),
            ("region", &self.region),
            ("city", &self.city),
            ("device", &self.device),
            ("browser", &self.browser),
            ("language", &self.language),
            ("referrer", &self.referrer),
            ("os", &self.os),
            ("source", &self.source),
            ("visitor_type", &self.visitor_type),
            ("traffic_type", &self.traffic_type),
            ("connection", &self.connection),
            ("carrier", &self.carrier),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }

    /// Parameter name of every token filter, in order. A parameter named by
    /// several filters appears once per filter.
    pub fn token_parameters(&self) -> Vec<&str> {
        self.token_filters
            .iter()
            .map(|filter| filter.parameter.as_str())
            .collect()
    }
}

/// Narrow `events` to those matching `spec`, resolving date ranges against the
/// local clock.
pub fn filter_events(events: &[VisitEvent], spec: &FilterSpec) -> Vec<VisitEvent> {
    filter_events_at(events, spec, &Local::now())
}

/// Like [`filter_events`] with an explicit reference time and time zone
pub fn filter_events_at<Tz: TimeZone>(
    events: &[VisitEvent],
    spec: &FilterSpec,
    now: &DateTime<Tz>,
) -> Vec<VisitEvent> {
    select_events(events, spec, now)
        .into_iter()
        .cloned()
        .collect()
}

/// Borrowing form of the evaluator. Input order is preserved.
pub fn select_events<'a, Tz: TimeZone>(
    events: &'a [VisitEvent],
    spec: &FilterSpec,
    now: &DateTime<Tz>,
) -> Vec<&'a VisitEvent> {
    let bounds = spec.date_bounds(now);
    let dimensions = spec.dimension_constraints();

    let mut selected: Vec<&VisitEvent> = events
        .iter()
        .filter(|event| bounds.contains(event.ts))
        .filter(|event| {
            dimensions
                .iter()
                .all(|(name, value)| event.dimensions.get(name) == Some(*value))
        })
        .filter(|event| spec.token_filters.iter().all(|filter| filter.matches(event)))
        .filter(|event| spec.is_vpn.is_none_or(|vpn| event.is_vpn == vpn))
        .collect();

    // Repeat status is relative to what survived the other constraints, so
    // narrowing any dimension can turn a repeat visitor into a first-time one.
    if let Some(want_repeated) = spec.repeated {
        let devices = DeviceIndex::build(selected.iter().copied());
        selected.retain(|event| devices.is_repeated(event) == want_repeated);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn visit(id: &str, ts: i64) -> VisitEvent {
        VisitEvent {
            id: id.to_string(),
            link_id: "l1".to_string(),
            ts,
            ..Default::default()
        }
    }

    #[test]
    fn test_canned_range_bounds() {
        let now = utc("2024-03-20T15:30:00Z");
        let today = utc("2024-03-20T00:00:00Z").timestamp_millis();

        let b = DateRange::Today.bounds(&now, None, None);
        assert_eq!(b.lower, Some(today));
        assert_eq!(b.upper, None);

        let b = DateRange::Last7Days.bounds(&now, None, None);
        assert_eq!(b.lower, Some(today - 7 * DAY_MS));

        let b = DateRange::Last15Days.bounds(&now, None, None);
        assert_eq!(b.lower, Some(today - 15 * DAY_MS));

        let b = DateRange::ThisMonth.bounds(&now, None, None);
        assert_eq!(b.lower, Some(utc("2024-03-01T00:00:00Z").timestamp_millis()));
    }

    #[test]
    fn test_canned_ranges_ignore_custom_dates() {
        let now = utc("2024-03-20T15:30:00Z");
        let start = NaiveDate::from_ymd_opt(2020, 1, 1);
        let b = DateRange::Today.bounds(&now, start, start);
        assert_eq!(b.upper, None);
        assert_eq!(b.lower, Some(utc("2024-03-20T00:00:00Z").timestamp_millis()));
    }

    #[test]
    fn test_custom_range_is_inclusive_of_end_day() {
        let now = utc("2024-03-20T15:30:00Z");
        let day = NaiveDate::from_ymd_opt(2024, 1, 1);
        let b = DateRange::Custom.bounds(&now, day, day);

        assert!(b.contains(utc("2024-01-01T00:00:00Z").timestamp_millis()));
        assert!(b.contains(utc("2024-01-01T23:59:59.999Z").timestamp_millis()));
        assert!(!b.contains(utc("2024-01-02T00:00:00.001Z").timestamp_millis()));
        assert!(!b.contains(utc("2023-12-31T23:59:59.999Z").timestamp_millis()));
    }

    #[test]
    fn test_custom_dates_are_utc_days_in_any_zone() {
        let tz = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let now = utc("2024-03-20T12:00:00Z").with_timezone(&tz);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1);
        let b = DateRange::Custom.bounds(&now, day, day);
        assert_eq!(b.lower, Some(utc("2024-01-01T00:00:00Z").timestamp_millis()));
        assert_eq!(b.upper, Some(utc("2024-01-01T23:59:59.999Z").timestamp_millis()));

        let mut spec = FilterSpec::new(DateRange::Custom);
        spec.start_date = day;
        spec.end_date = day;
        let events = [
            visit("in", utc("2024-01-01T02:00:00Z").timestamp_millis()),
            visit("after", utc("2024-01-02T03:00:00Z").timestamp_millis()),
        ];
        let kept: Vec<String> = filter_events_at(&events, &spec, &now)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(kept, vec!["in"]);
    }

    #[test]
    fn test_custom_range_without_dates_is_unbounded() {
        let now = utc("2024-03-20T15:30:00Z");
        let b = DateRange::Custom.bounds(&now, None, None);
        assert_eq!(b, DateBounds::default());
        assert!(b.contains(i64::MIN));
        assert!(b.contains(i64::MAX));
    }

    #[test]
    fn test_bounds_follow_time_zone() {
        let tz = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        let now = utc("2024-03-20T23:30:00Z").with_timezone(&tz);
        // 01:30 on the 21st in UTC+2, so today starts at 22:00 UTC on the 20th
        let b = DateRange::Today.bounds(&now, None, None);
        assert_eq!(b.lower, Some(utc("2024-03-20T22:00:00Z").timestamp_millis()));
    }

    #[test]
    fn test_empty_dimension_filter_is_no_constraint() {
        let mut spec = FilterSpec::new(DateRange::Custom);
        spec.country = Some(String::new());
        spec.region = Some("CA".to_string());
        assert_eq!(spec.dimension_constraints(), vec![("region", "CA")]);
    }

    #[test]
    fn test_dimension_filter_is_exact() {
        let now = utc("2024-03-20T15:30:00Z");
        let mut a = visit("a", now.timestamp_millis());
        a.dimensions.browser = Some("Chrome".to_string());
        let mut b = visit("b", now.timestamp_millis());
        b.dimensions.browser = Some("chrome".to_string());
        let c = visit("c", now.timestamp_millis());

        let mut spec = FilterSpec::new(DateRange::Today);
        spec.browser = Some("Chrome".to_string());

        let out = filter_events_at(&[a, b, c], &spec, &now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn test_vpn_tri_state() {
        let now = utc("2024-03-20T15:30:00Z");
        let ts = now.timestamp_millis();
        let mut vpn = visit("vpn", ts);
        vpn.is_vpn = true;
        let events = vec![vpn, visit("direct", ts)];

        let mut spec = FilterSpec::new(DateRange::Today);
        assert_eq!(filter_events_at(&events, &spec, &now).len(), 2);

        spec.is_vpn = Some(true);
        let out = filter_events_at(&events, &spec, &now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "vpn");

        spec.is_vpn = Some(false);
        let out = filter_events_at(&events, &spec, &now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "direct");
    }

    #[test]
    fn test_token_filters_are_anded() {
        let now = utc("2024-03-20T15:30:00Z");
        let ts = now.timestamp_millis();
        let mut a = visit("a", ts);
        a.params.insert("sub1".to_string(), "123".to_string());
        a.params.insert("sub2".to_string(), "x".to_string());
        let mut b = visit("b", ts);
        b.params.insert("sub1".to_string(), "123".to_string());

        let mut spec = FilterSpec::new(DateRange::Today);
        spec.token_filters = vec![TokenFilter::new("sub1", "123"), TokenFilter::new("sub2", "x")];

        let out = filter_events_at(&[a, b], &spec, &now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn test_unknown_token_parameter_never_matches() {
        let now = utc("2024-03-20T15:30:00Z");
        let mut spec = FilterSpec::new(DateRange::Today);
        spec.token_filters = vec![TokenFilter::new("nope", "")];
        let out = filter_events_at(&[visit("a", now.timestamp_millis())], &spec, &now);
        assert!(out.is_empty());
    }

    #[test]
    fn test_repeated_false_keeps_events_without_device() {
        let now = utc("2024-03-20T15:30:00Z");
        let ts = now.timestamp_millis();
        let mut a1 = visit("a1", ts);
        a1.dimensions.device_id = Some("A".to_string());
        let mut a2 = visit("a2", ts);
        a2.dimensions.device_id = Some("A".to_string());
        let mut empty = visit("empty", ts);
        empty.dimensions.device_id = Some(String::new());
        let none = visit("none", ts);
        let events = vec![a1, a2, empty, none];

        let mut spec = FilterSpec::new(DateRange::Today);
        spec.repeated = Some(true);
        let ids: Vec<String> = filter_events_at(&events, &spec, &now)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);

        spec.repeated = Some(false);
        let ids: Vec<String> = filter_events_at(&events, &spec, &now)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["empty", "none"]);
    }

    #[test]
    fn test_filter_spec_wire_format() {
        let json = r#"{
            "dateRange": "custom",
            "startDate": "2024-01-01",
            "endDate": "2024-01-31",
            "visitor_type": "New",
            "isVpn": false,
            "tokenFilters": [{"parameter": "sub1", "value": "123"}]
        }"#;
        let spec: FilterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.date_range, DateRange::Custom);
        assert_eq!(spec.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(spec.visitor_type.as_deref(), Some("New"));
        assert_eq!(spec.is_vpn, Some(false));
        assert_eq!(spec.repeated, None);
        assert_eq!(spec.token_filters, vec![TokenFilter::new("sub1", "123")]);
    }

    #[test]
    fn test_empty_filter_defaults_to_last_week() {
        let spec: FilterSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, FilterSpec::new(DateRange::Last7Days));
    }

    #[test]
    fn test_malformed_custom_date_is_rejected_at_the_boundary() {
        let json = r#"{"dateRange": "custom", "startDate": "01/02/2024"}"#;
        assert!(serde_json::from_str::<FilterSpec>(json).is_err());
    }

    #[test]
    fn test_token_parameters_keep_one_entry_per_filter() {
        let mut spec = FilterSpec::default();
        spec.token_filters = vec![
            TokenFilter::new("sub1", "a"),
            TokenFilter::new("sub2", "b"),
            TokenFilter::new("sub1", "a"),
        ];
        assert_eq!(spec.token_parameters(), vec!["sub1", "sub2", "sub1"]);
    }
}
