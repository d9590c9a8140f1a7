use crate::model::Currency;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

pub mod db;
pub mod http;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error")]
    Http(#[from] ureq::Error),

    #[error("Rates API error: {0}")]
    Api(String),

    #[error("Rate for {0} is zero and cannot be inverted")]
    ZeroRate(Currency),
}

/// Rate lookup failure for a single `(currency, date)` key.
#[derive(Debug, Error)]
#[error("No {currency} rate available for {date}")]
pub struct RateUnavailableError {
    pub currency: Currency,
    pub date: NaiveDate,
    #[source]
    pub source: Option<ProviderError>,
}

/// A resolved rate: one unit of `currency` is worth `rate` units of the base currency.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RateEntry {
    pub currency: Currency,
    pub date: NaiveDate,
    pub rate: Decimal,
}

/// External source of exchange rates.
///
/// Exists as a trait so that unit tests can mock the provider responses.
pub trait RateProvider {
    /// Fetch the value of one unit of `currency` in `base` on `date`. `Ok(None)` means the
    /// provider has no data for the key.
    fn fetch_rate(
        &self,
        currency: Currency,
        base: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError>;
}

impl<P: RateProvider + ?Sized> RateProvider for &P {
    fn fetch_rate(
        &self,
        currency: Currency,
        base: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError> {
        (**self).fetch_rate(currency, base, date)
    }
}

/// Every supported rate provider backend.
pub enum RateSource {
    Db(db::RatesDb),
    Http(http::HttpRateProvider),
}

impl From<db::RatesDb> for RateSource {
    fn from(value: db::RatesDb) -> Self {
        Self::Db(value)
    }
}

impl From<http::HttpRateProvider> for RateSource {
    fn from(value: http::HttpRateProvider) -> Self {
        Self::Http(value)
    }
}

impl RateProvider for RateSource {
    fn fetch_rate(
        &self,
        currency: Currency,
        base: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError> {
        match self {
            Self::Db(db) => db.fetch_rate(currency, base, date),
            Self::Http(http) => http.fetch_rate(currency, base, date),
        }
    }
}

/// Memoizing rate resolver for a single base currency.
///
/// The cache is append-only: each `(currency, date)` key is fetched at most once. Failed lookups
/// are not cached.
pub struct RateResolver<P> {
    base: Currency,
    provider: P,
    cache: BTreeMap<(Currency, NaiveDate), Decimal>,
    fetches: usize,
}

impl<P: RateProvider> RateResolver<P> {
    pub fn new(base: Currency, provider: P) -> Self {
        Self {
            base,
            provider,
            cache: BTreeMap::new(),
            fetches: 0,
        }
    }

    /// Seed the cache with previously resolved rates. Entries for other base currencies must not
    /// be mixed in; the caller keeps memos per base.
    pub fn with_entries<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = RateEntry>,
    {
        for entry in entries {
            self.cache
                .entry((entry.currency, entry.date))
                .or_insert(entry.rate);
        }

        self
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    /// Number of provider calls made so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn resolve(
        &mut self,
        currency: Currency,
        date: NaiveDate,
    ) -> Result<Decimal, RateUnavailableError> {
        if currency == self.base {
            return Ok(Decimal::ONE);
        }

        let base = self.base;
        if let Some(rate) = self.cache.get(&(currency, date)) {
            debug!("Rate cache hit for {currency}{base} on {date}");
            return Ok(*rate);
        }

        info!("Fetching {currency}{base} rate for {date}");
        self.fetches += 1;
        let rate = self
            .provider
            .fetch_rate(currency, base, date)
            .map_err(|err| RateUnavailableError {
                currency,
                date,
                source: Some(err),
            })?
            .ok_or(RateUnavailableError {
                currency,
                date,
                source: None,
            })?;
        self.cache.insert((currency, date), rate);

        Ok(rate)
    }

    /// Resolve every key up front. Stops at the first unavailable rate.
    pub fn prefetch<I>(&mut self, keys: I) -> Result<(), RateUnavailableError>
    where
        I: IntoIterator<Item = (Currency, NaiveDate)>,
    {
        for (currency, date) in keys {
            self.resolve(currency, date)?;
        }

        Ok(())
    }

    /// Every cached rate, ordered by currency then date.
    pub fn entries(&self) -> Vec<RateEntry> {
        self.cache
            .iter()
            .map(|(&(currency, date), &rate)| RateEntry {
                currency,
                date,
                rate,
            })
            .collect()
    }
}
