use anyhow::Result;
use chrono::Local;

use crate::adapters::results_exporter::{ExportResult, ResultsExporter};
use crate::api_client::{LimitProbe, PageSource, Paginator, probe_limits};
use crate::config::Config;
use crate::filter::{FilterCriteria, FilterEngine, Item};
use crate::logger::Logger;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub fetched: usize,
    pub matched: Vec<Item>,
    /// The fetch stopped on a failed page; `matched` covers only what arrived.
    pub partial: bool,
    pub exports: Vec<ExportResult>,
}

/// Fetch, filter and persist one snapshot of the catalog.
pub struct AuctionMonitor<'a, S: PageSource> {
    config: &'a Config,
    logger: Logger,
    source: S,
    criteria: FilterCriteria,
    exporter: ResultsExporter,
}

impl<'a, S: PageSource> AuctionMonitor<'a, S> {
    pub fn new(config: &'a Config, source: S, logger: Logger) -> Self {
        Self {
            config,
            criteria: config.criteria(),
            exporter: ResultsExporter::new(logger.clone(), config.results_dir.clone()),
            logger,
            source,
        }
    }

    pub async fn run(&self, save: bool) -> Result<RunSummary> {
        let run_time = Local::now();
        self.logger.info(&"=".repeat(60));
        self.logger.info("Aurena Auction Monitor");
        self.logger.info(&"=".repeat(60));
        self.logger.info(&format!(
            "Searching for items with {} ending {} ({})",
            self.criteria.describe_bids(),
            self.criteria.describe_time(),
            self.criteria.describe_locations()
        ));

        let progress_logger = self.logger.clone();
        let outcome = Paginator::new(&self.source, self.logger.clone())
            .fetch_all(
                self.config.page_size,
                &self.config.language_code,
                self.criteria.province_codes(),
                |current, total| {
                    let percent = current as f64 / total as f64 * 100.0;
                    progress_logger.info(&format!(
                        "Fetching data: {:.1}% ({}/{})",
                        percent, current, total
                    ));
                },
            )
            .await;

        let mut summary = RunSummary {
            fetched: outcome.items.len(),
            partial: outcome.is_partial(),
            ..RunSummary::default()
        };

        if outcome.items.is_empty() {
            self.logger.warn("No data fetched");
            return Ok(summary);
        }
        if summary.partial {
            self.logger.warn(&format!(
                "Continuing with partial data: {} of {} items",
                summary.fetched,
                outcome.reported_total.unwrap_or(0)
            ));
        }

        self.logger
            .info(&format!("Filtering {} items...", summary.fetched));
        let engine = FilterEngine::new(&self.criteria, self.config.link_base.as_deref());
        summary.matched = engine.apply(&outcome.items);

        self.logger.info("Results summary:");
        self.logger
            .info(&format!("  Total items fetched: {}", summary.fetched));
        self.logger
            .info(&format!("  Items matching filter: {}", summary.matched.len()));

        if summary.matched.is_empty() {
            self.logger.info(&format!(
                "No items found with {} ending {}",
                self.criteria.describe_bids(),
                self.criteria.describe_time()
            ));
        } else if save {
            summary.exports.push(self.exporter.export_json(
                &summary.matched,
                &self.criteria,
                run_time,
            )?);
            if self.config.export_xlsx {
                summary
                    .exports
                    .push(self.exporter.export_xlsx(&summary.matched, run_time)?);
            }
        } else {
            self.logger.info("Results not saved (saving disabled)");
        }

        let stats = self.logger.stats();
        self.logger.info(&format!(
            "Duration: {:.1}s, API requests: {}, errors: {}",
            stats.elapsed_secs, stats.requests, stats.errors
        ));
        Ok(summary)
    }

    pub async fn probe(&self, limits: &[usize]) -> Vec<LimitProbe> {
        let probes = probe_limits(&self.source, limits, &self.config.language_code).await;
        for probe in &probes {
            match &probe.result {
                Ok((received, total)) => self.logger.info(&format!(
                    "Limit {}: got {} items (total: {})",
                    probe.limit,
                    received,
                    total.unwrap_or(0)
                )),
                Err(e) => self
                    .logger
                    .error(&format!("Limit {}: {}", probe.limit, e)),
            }
        }
        probes
    }
}
