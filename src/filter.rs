use chrono::{DateTime, Duration, Local, TimeZone};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// One catalog record as returned by the API, keys in wire order.
pub type Item = Map<String, Value>;

pub const DEFAULT_LANGUAGE: &str = "de_DE";

const IMAGE_FIELD: &str = "im";
const END_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

// ==================== CRITERIA ====================

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    min_bids: Option<i64>,
    max_bids: Option<i64>,
    hours_before_end: Option<f64>,
    locations: Vec<String>,
    language_code: String,
    display_language: String,
}

/// Outcome of the time stage for an item that was accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub end_time: DateTime<Local>,
    pub hours_remaining: f64,
}

/// Criteria as recorded next to persisted results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CriteriaSummary {
    pub hours_before_end: Option<f64>,
    pub min_bids: Option<i64>,
    pub max_bids: Option<i64>,
    pub locations: Vec<String>,
    pub bid_criteria: String,
    pub time_criteria: String,
    pub location_criteria: String,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl FilterCriteria {
    /// Criteria that accept every item with an end time.
    pub fn new(language_code: impl Into<String>) -> Self {
        Self {
            min_bids: None,
            max_bids: None,
            hours_before_end: None,
            locations: Vec::new(),
            language_code: language_code.into(),
            display_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_bids(mut self, min_bids: Option<i64>, max_bids: Option<i64>) -> Self {
        self.min_bids = min_bids;
        self.max_bids = max_bids;
        self
    }

    pub fn with_hours_before_end(mut self, hours: Option<f64>) -> Self {
        self.hours_before_end = hours;
        self
    }

    /// Province codes are trimmed and uppercased; blank entries are dropped.
    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.locations = locations
            .into_iter()
            .map(|loc| loc.as_ref().trim().to_uppercase())
            .filter(|loc| !loc.is_empty())
            .collect();
        self
    }

    /// Language used for the `title` and `description` lookups.
    pub fn with_display_language(mut self, language: impl Into<String>) -> Self {
        self.display_language = language.into();
        self
    }

    pub fn min_bids(&self) -> Option<i64> {
        self.min_bids
    }

    pub fn max_bids(&self) -> Option<i64> {
        self.max_bids
    }

    pub fn hours_before_end(&self) -> Option<f64> {
        self.hours_before_end
    }

    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    pub fn display_language(&self) -> &str {
        &self.display_language
    }

    /// Codes for the upstream `provinces` filter. Not re-checked locally.
    pub fn province_codes(&self) -> &[String] {
        &self.locations
    }

    /// Counts are compared as numbers, so `2.5` is above a maximum of `2`.
    pub fn passes_bid_filter(&self, bid_count: f64) -> bool {
        if self.min_bids.is_some_and(|min| bid_count < min as f64) {
            return false;
        }
        if self.max_bids.is_some_and(|max| bid_count > max as f64) {
            return false;
        }
        true
    }

    /// Without `hours_before_end` every representable end time passes, even one
    /// in the past. With it, the end time must lie in `(now, now + hours]`.
    pub fn time_window(&self, end_timestamp_ms: i64, now: DateTime<Local>) -> Option<TimeWindow> {
        let end_time = Local.timestamp_millis_opt(end_timestamp_ms).single()?;
        let window = TimeWindow {
            end_time,
            hours_remaining: (end_time - now).num_milliseconds() as f64 / MILLIS_PER_HOUR,
        };

        let Some(hours) = self.hours_before_end else {
            return Some(window);
        };

        let within_cutoff = match Duration::try_milliseconds((hours * MILLIS_PER_HOUR).round() as i64)
            .and_then(|span| now.checked_add_signed(span))
        {
            Some(cutoff) => end_time <= cutoff,
            None => true,
        };

        (within_cutoff && end_time > now).then_some(window)
    }

    pub fn describe_bids(&self) -> String {
        match (self.min_bids, self.max_bids) {
            (None, None) => "any number of bids".to_string(),
            (None, Some(max)) => format!("≤{max} bids"),
            (Some(min), None) => format!("≥{min} bids"),
            (Some(min), Some(max)) if min == max => format!("exactly {min} bids"),
            (Some(min), Some(max)) => format!("{min}-{max} bids"),
        }
    }

    pub fn describe_time(&self) -> String {
        match self.hours_before_end {
            None => "any time".to_string(),
            Some(hours) => format!("within {hours} hours"),
        }
    }

    pub fn describe_locations(&self) -> String {
        if self.locations.is_empty() {
            "any location".to_string()
        } else {
            format!("locations: {}", self.locations.join(", "))
        }
    }

    pub fn summary(&self) -> CriteriaSummary {
        CriteriaSummary {
            hours_before_end: self.hours_before_end,
            min_bids: self.min_bids,
            max_bids: self.max_bids,
            locations: self.locations.clone(),
            bid_criteria: self.describe_bids(),
            time_criteria: self.describe_time(),
            location_criteria: self.describe_locations(),
        }
    }
}

// ==================== ENGINE ====================

pub struct FilterEngine<'a> {
    criteria: &'a FilterCriteria,
    link_base: Option<&'a str>,
}

impl<'a> FilterEngine<'a> {
    /// Without a `link_base` the output carries no `auction_url` field.
    pub fn new(criteria: &'a FilterCriteria, link_base: Option<&'a str>) -> Self {
        Self {
            criteria,
            link_base,
        }
    }

    pub fn apply(&self, items: &[Item]) -> Vec<Item> {
        self.apply_at(items, Local::now())
    }

    /// Filters against a fixed `now` so every item is judged at the same instant.
    pub fn apply_at(&self, items: &[Item], now: DateTime<Local>) -> Vec<Item> {
        let mut selected: Vec<(i64, Item)> = items
            .iter()
            .filter_map(|item| self.evaluate(item, now))
            .collect();
        selected.sort_by_key(|(end_timestamp, _)| *end_timestamp);
        selected.into_iter().map(|(_, item)| item).collect()
    }

    fn evaluate(&self, item: &Item, now: DateTime<Local>) -> Option<(i64, Item)> {
        if !self.criteria.passes_bid_filter(bid_count(item)) {
            return None;
        }
        let end_timestamp = end_timestamp(item)?;
        let window = self.criteria.time_window(end_timestamp, now)?;
        Some((end_timestamp, self.enrich(item, &window)))
    }

    fn enrich(&self, item: &Item, window: &TimeWindow) -> Item {
        let language = self.criteria.display_language();
        let mut ordered = Item::new();

        if let Some(lid) = item.get("lid") {
            ordered.insert("lid".to_string(), lid.clone());
        }
        if let Some(base) = self.link_base {
            let url = item
                .get("lid")
                .and_then(lid_segment)
                .map(|lid| format!("{base}/{lid}/item"))
                .unwrap_or_default();
            ordered.insert("auction_url".to_string(), Value::String(url));
        }
        if let Some(title) = localized(item, "ti", language) {
            ordered.insert("title".to_string(), title.clone());
        }
        if let Some(description) = localized(item, "de", language) {
            ordered.insert("description".to_string(), description.clone());
        }
        for key in ["sp", "et"] {
            if let Some(value) = item.get(key) {
                ordered.insert(key.to_string(), value.clone());
            }
        }
        ordered.insert("hours_remaining".to_string(), json!(window.hours_remaining));
        ordered.insert(
            "end_time_formatted".to_string(),
            Value::String(window.end_time.format(END_TIME_FORMAT).to_string()),
        );

        for (key, value) in item {
            if key != IMAGE_FIELD && !ordered.contains_key(key) {
                ordered.insert(key.clone(), value.clone());
            }
        }
        ordered
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn bid_count(item: &Item) -> f64 {
    item.get("bc").and_then(Value::as_f64).unwrap_or(0.0)
}

/// Zero counts as missing.
fn end_timestamp(item: &Item) -> Option<i64> {
    item.get("et")
        .and_then(as_integer)
        .filter(|millis| *millis != 0)
}

fn lid_segment(lid: &Value) -> Option<String> {
    match lid {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn localized<'i>(item: &'i Item, field: &str, language: &str) -> Option<&'i Value> {
    item.get("ld")?.get(field)?.get(language)
}
