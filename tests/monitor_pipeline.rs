use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use aurena_monitor::api_client::{PageRequest, PageResponse};
use aurena_monitor::{AuctionMonitor, Config, FetchError, Item, Logger, PageSource};
use chrono::Utc;
use serde_json::{Value, json};

const HOUR_MS: i64 = 3_600_000;

struct StaticCatalog {
    items: Vec<Item>,
    fail_at_offset: Option<usize>,
    requests: Mutex<Vec<PageRequest>>,
}

impl StaticCatalog {
    fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            fail_at_offset: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PageSource for StaticCatalog {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_at_offset == Some(request.offset) {
            return Err(FetchError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let start = request.offset.min(self.items.len());
        let end = (request.offset + request.limit).min(self.items.len());
        Ok(PageResponse {
            items: self.items[start..end]
                .iter()
                .cloned()
                .map(Value::Object)
                .collect(),
            element_count: json!(self.items.len()),
        })
    }
}

fn item(value: Value) -> Item {
    value.as_object().unwrap().clone()
}

fn config(results_dir: &std::path::Path, extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("API_URL".to_string(), "https://api.test/package/1".to_string()),
        ("BASE_URL".to_string(), "https://x/posten".to_string()),
        ("LIMIT_PER_REQUEST".to_string(), "2".to_string()),
        ("RESULTS_DIR".to_string(), results_dir.display().to_string()),
    ]);
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

fn catalog_items() -> Vec<Item> {
    let now = Utc::now().timestamp_millis();
    vec![
        item(json!({"lid": 1, "bc": 3, "et": now + 48 * HOUR_MS, "im": "x"})),
        item(json!({"lid": 2, "bc": 2, "et": now + 3 * HOUR_MS, "im": "x",
                    "ld": {"ti": {"de_DE": "Werkbank"}}})),
        item(json!({"lid": 3, "bc": 0, "et": now + 2 * HOUR_MS})),
        item(json!({"lid": 4, "bc": 5, "et": now - HOUR_MS})),
        item(json!({"lid": 5, "bc": 1, "et": now + HOUR_MS})),
        item(json!({"lid": 6, "bc": 9})),
    ]
}

#[tokio::test]
async fn fetch_filter_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        &[("MIN_BIDS", "1"), ("HOURS_BEFORE_END", "24"), ("LOCATIONS", "ooe")],
    );
    let catalog = StaticCatalog::new(catalog_items());
    let monitor = AuctionMonitor::new(&config, catalog, Logger::new());

    let summary = monitor.run(true).await.unwrap();

    assert_eq!(summary.fetched, 6);
    assert!(!summary.partial);
    let lids: Vec<i64> = summary
        .matched
        .iter()
        .map(|i| i["lid"].as_i64().unwrap())
        .collect();
    assert_eq!(lids, vec![5, 2]);
    assert_eq!(summary.matched[1]["title"], json!("Werkbank"));
    assert_eq!(summary.matched[1]["auction_url"], json!("https://x/posten/2/item"));
    assert!(summary.matched.iter().all(|i| !i.contains_key("im")));

    assert_eq!(summary.exports.len(), 1);
    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(&summary.exports[0].filename).unwrap())
            .unwrap();
    assert_eq!(saved["total_items"], json!(2));
    assert_eq!(saved["filter_criteria"]["location_criteria"], json!("locations: OOE"));
}

#[tokio::test]
async fn pages_are_requested_in_sequence_with_provinces() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[("LOCATIONS", "w, ooe")]);
    let catalog = StaticCatalog::new(catalog_items());
    let monitor = AuctionMonitor::new(&config, &catalog, Logger::new());

    monitor.run(false).await.unwrap();

    let requests = catalog.requests.lock().unwrap();
    let offsets: Vec<usize> = requests.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![0, 2, 4, 6]);
    assert!(
        requests
            .iter()
            .all(|r| r.filter.provinces == vec!["W".to_string(), "OOE".to_string()])
    );
}

#[tokio::test]
async fn failed_page_still_filters_partial_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[("EXPORT_XLSX", "true")]);
    let mut catalog = StaticCatalog::new(catalog_items());
    catalog.fail_at_offset = Some(4);
    let monitor = AuctionMonitor::new(&config, catalog, Logger::new());

    let summary = monitor.run(true).await.unwrap();

    assert!(summary.partial);
    assert_eq!(summary.fetched, 4);
    // no time bound: the closed item (lid 4) stays, with negative hours
    assert_eq!(summary.matched.len(), 4);
    assert_eq!(summary.matched[0]["lid"], json!(4));
    assert!(summary.matched[0]["hours_remaining"].as_f64().unwrap() < 0.0);
    assert_eq!(summary.exports.len(), 2);
}

#[tokio::test]
async fn nothing_fetched_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");
    let config = config(&results, &[]);
    let monitor = AuctionMonitor::new(&config, StaticCatalog::new(Vec::new()), Logger::new());

    let summary = monitor.run(true).await.unwrap();

    assert_eq!(summary.fetched, 0);
    assert!(summary.matched.is_empty());
    assert!(summary.exports.is_empty());
    assert!(!results.exists());
}
