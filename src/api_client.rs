use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FetchError;
use crate::filter::Item;
use crate::logger::Logger;

// ==================== WIRE TYPES ====================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PageFilter {
    pub auctions: Vec<String>,
    pub brands: Vec<String>,
    pub categories: Vec<String>,
    pub provinces: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    #[serde(rename = "languageCode")]
    pub language_code: String,
    pub filter: PageFilter,
    pub query: String,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize, language_code: &str, provinces: &[String]) -> Self {
        Self {
            offset,
            limit,
            language_code: language_code.to_string(),
            filter: PageFilter {
                provinces: provinces.to_vec(),
                ..PageFilter::default()
            },
            query: String::new(),
        }
    }
}

/// Raw page body. Entries and the total stay untyped so one bad value
/// cannot fail the whole page.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PageResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<Value>,
    #[serde(rename = "elementCount", default)]
    pub element_count: Value,
}

impl PageResponse {
    /// `elementCount` when it is a usable non-negative number.
    pub fn reported_total(&self) -> Option<u64> {
        self.element_count.as_u64().or_else(|| {
            self.element_count
                .as_f64()
                .filter(|total| *total >= 0.0)
                .map(|total| total as u64)
        })
    }

    /// Object entries only; anything else is skipped.
    pub fn into_records(self) -> impl Iterator<Item = Item> {
        self.items.into_iter().filter_map(|entry| match entry {
            Value::Object(record) => Some(record),
            _ => None,
        })
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

// ==================== PAGE SOURCE ====================

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for &T {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        (**self).fetch_page(request).await
    }
}

/// POSTs page requests to the catalog endpoint.
pub struct AuctionApiClient {
    logger: Logger,
    client: Client,
    api_url: String,
}

impl AuctionApiClient {
    pub fn new(logger: Logger, api_url: impl Into<String>) -> Self {
        Self {
            logger,
            client: Client::new(),
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl PageSource for AuctionApiClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        self.logger.increment_request();

        let resp = self.client.post(&self.api_url).json(request).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// ==================== PAGINATOR ====================

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub items: Vec<Item>,
    /// `elementCount` from the first page. Informational only.
    pub reported_total: Option<u64>,
    pub pages_requested: usize,
    /// Set when a page request failed and the fetch stopped early.
    pub aborted: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        self.aborted.is_some()
    }
}

pub struct Paginator<'a, S: PageSource> {
    source: &'a S,
    logger: Logger,
}

impl<'a, S: PageSource> Paginator<'a, S> {
    pub fn new(source: &'a S, logger: Logger) -> Self {
        Self { source, logger }
    }

    /// Walks the catalog from offset 0 until a short or empty page. A failed
    /// request ends the walk and the items gathered so far are returned.
    pub async fn fetch_all<F>(
        &self,
        page_size: usize,
        language_code: &str,
        location_codes: &[String],
        mut progress: F,
    ) -> FetchOutcome
    where
        F: FnMut(usize, u64),
    {
        let page_size = page_size.max(1);
        let mut outcome = FetchOutcome::default();
        let mut offset = 0;

        if location_codes.is_empty() {
            self.logger.info("Starting data fetch (all provinces)");
        } else {
            self.logger.info(&format!(
                "Starting data fetch with province filter: {}",
                location_codes.join(", ")
            ));
        }
        self.logger.info(&format!("{} items per request...", page_size));

        loop {
            let request = PageRequest::new(offset, page_size, language_code, location_codes);
            outcome.pages_requested += 1;

            let page = match self.source.fetch_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    self.logger
                        .error(&format!("Error fetching data at offset {}: {}", offset, e));
                    outcome.aborted = Some(e);
                    break;
                }
            };

            if outcome.reported_total.is_none() {
                outcome.reported_total = Some(page.reported_total().unwrap_or(0));
            }

            // Loop control counts raw entries, malformed ones included.
            let received = page.items.len();
            if received == 0 {
                break;
            }
            outcome.items.extend(page.into_records());

            if let Some(total) = outcome.reported_total.filter(|total| *total > 0) {
                progress(outcome.items.len(), total);
            }

            if received < page_size {
                break;
            }
            offset += page_size;
        }

        self.logger.info(&format!(
            "Fetch complete: {} items retrieved in {} requests",
            outcome.items.len(),
            outcome.pages_requested
        ));
        outcome
    }
}

// ==================== LIMIT PROBE ====================

pub const PROBE_LIMITS: [usize; 8] = [96, 200, 250, 300, 350, 400, 500, 1000];

#[derive(Debug)]
pub struct LimitProbe {
    pub limit: usize,
    pub result: Result<(usize, Option<u64>), FetchError>,
}

/// Requests the first page once per candidate limit to see how many items
/// the API actually returns for each.
pub async fn probe_limits<S: PageSource>(
    source: &S,
    limits: &[usize],
    language_code: &str,
) -> Vec<LimitProbe> {
    let mut probes = Vec::with_capacity(limits.len());
    for &limit in limits {
        let request = PageRequest::new(0, limit, language_code, &[]);
        let result = source
            .fetch_page(&request)
            .await
            .map(|page| (page.items.len(), page.reported_total()));
        probes.push(LimitProbe { limit, result });
    }
    probes
}
