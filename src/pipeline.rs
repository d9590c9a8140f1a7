//! One reporting run: fetch, normalize, warm up rates, compute, assemble.

use crate::config::{Config, ConfigurationError};
use crate::imports::{FetchError, RowSource};
use crate::model::{ReportRequest, Stats, TransactionRecord};
use crate::normalize::{Normalizer, ValidationError};
use crate::rates::{RateEntry, RateProvider, RateResolver, RateUnavailableError};
use crate::report::{self, ReportEngine, ReportError};
use crate::response::{self, AssembleError, Response};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration")]
    Configuration(#[from] ConfigurationError),

    #[error("Unable to fetch raw rows")]
    Fetch(#[from] FetchError),

    #[error("Invalid input row")]
    Validation(#[from] ValidationError),

    #[error("Rate prefetch failed")]
    RateUnavailable(#[from] RateUnavailableError),

    #[error("Report computation failed")]
    Report(#[from] ReportError),

    #[error("Unable to assemble the response")]
    Assemble(#[from] AssembleError),
}

/// Everything a successful run produces.
#[derive(Debug)]
pub struct RunOutput {
    pub response: Response,

    /// Normalized records, for follow-up queries like search.
    pub records: Vec<TransactionRecord>,

    /// Rows dropped in lenient mode.
    pub skipped: Vec<ValidationError>,

    pub stats: Stats,
}

/// Owns the run configuration and the rate cache shared by its runs.
pub struct Pipeline<P> {
    config: Config,
    resolver: RateResolver<P>,
}

impl<P: RateProvider> Pipeline<P> {
    pub fn new(config: Config, provider: P) -> Result<Self, PipelineError> {
        config.validate()?;
        let resolver = RateResolver::new(config.base_currency, provider);

        Ok(Self { config, resolver })
    }

    /// Seed the rate cache, e.g. from a memo saved by an earlier process.
    pub fn with_memo<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = RateEntry>,
    {
        self.resolver = self.resolver.with_entries(entries);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rates of the configured user currencies on `date`, in configured order.
    ///
    /// Goes through the same cache as the report, so rates it already needed are not fetched
    /// again.
    pub fn currency_rates(&mut self, date: NaiveDate) -> Result<Vec<RateEntry>, PipelineError> {
        self.config
            .user_currencies
            .iter()
            .map(|&currency| {
                let rate = self.resolver.resolve(currency, date)?;

                Ok(RateEntry {
                    currency,
                    date,
                    rate,
                })
            })
            .collect()
    }

    /// Rates resolved so far, for persisting between processes.
    pub fn memo(&self) -> Vec<RateEntry> {
        self.resolver.entries()
    }

    /// Run the whole pipeline. The first failing stage aborts the run.
    ///
    /// A request without its own top-N takes the configured one.
    pub fn run<S>(
        &mut self,
        source: &mut S,
        request: &ReportRequest,
    ) -> Result<RunOutput, PipelineError>
    where
        S: RowSource + ?Sized,
    {
        let request = request
            .clone()
            .with_top_n(request.top_n.or(self.config.top_n));
        request.validate()?;

        let mut stats = Stats::default();
        let fetches = self.resolver.fetches();

        let rows = source.fetch_rows()?;
        info!("Fetched {} raw rows", rows.len());

        let normalized = Normalizer::new(self.config.strict).normalize(&mut stats, rows)?;

        if self.config.prefetch {
            debug!("Prefetching rates in {}", self.resolver.base());
            self.resolver
                .prefetch(report::rate_keys(&normalized.records, &request))?;
        }

        let result = ReportEngine::new(&mut self.resolver).compute(&normalized.records, &request)?;
        let response = response::assemble(&result)?;
        stats.add_rate_fetches(self.resolver.fetches() - fetches);

        Ok(RunOutput {
            response,
            records: normalized.records,
            skipped: normalized.skipped,
            stats,
        })
    }
}
