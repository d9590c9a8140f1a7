use super::{ProviderError, RateProvider};
use crate::model::Currency;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use std::{collections::BTreeMap, ffi::OsStr, fs, path::Path, path::PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Weekends and bank holidays leave gaps in daily rates. Rates older than this are not used.
pub const DEFAULT_MAX_STALENESS_DAYS: u64 = 4;

#[derive(Debug, Error)]
pub enum RatesDbError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("RON parsing error in {0:?}")]
    Parse(PathBuf, #[source] ron::de::SpannedError),

    #[error("File name {0:?} does not end with a currency pair like `-eurusd`")]
    InvalidPair(PathBuf),
}

/// Daily rates for one pair, keyed by date.
pub type RateMap = BTreeMap<NaiveDate, Decimal>;

/// On-disk exchange rates DB.
///
/// A directory of RON files named `<anything>-<ccy><quote>.ron`, each holding a map from date to
/// the value of one `ccy` in `quote`. Files for the same pair are merged.
#[derive(Debug)]
pub struct RatesDb {
    max_staleness: u64,
    pairs: BTreeMap<(Currency, Currency), RateMap>,
}

impl RatesDb {
    /// Create a RatesDb from the given directory path.
    pub fn new<P>(path: P) -> Result<Self, RatesDbError>
    where
        P: AsRef<Path>,
    {
        let mut db = Self {
            max_staleness: DEFAULT_MAX_STALENESS_DAYS,
            pairs: BTreeMap::new(),
        };

        for entry in fs::read_dir(path.as_ref())? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && path.extension() == Some(OsStr::new("ron")) {
                let Some(name) = path.file_stem().and_then(OsStr::to_str) else {
                    continue;
                };
                let pair =
                    parse_pair(name).ok_or_else(|| RatesDbError::InvalidPair(path.clone()))?;

                debug!("Reading {}{} rates from {path:?}", pair.0, pair.1);
                db.pairs.entry(pair).or_default().extend(read_ron(&path)?);
            }
        }

        if db.pairs.is_empty() {
            warn!("No exchange rates found in {:?}", path.as_ref());
        }

        Ok(db)
    }

    pub fn with_max_staleness(mut self, days: u64) -> Self {
        self.max_staleness = days;
        self
    }

    /// Every `(ccy, quote)` pair in the DB.
    pub fn pairs(&self) -> impl Iterator<Item = (Currency, Currency)> + '_ {
        self.pairs.keys().copied()
    }

    /// Latest `ccy`/`quote` rate on or before `date`, within the staleness window.
    ///
    /// Falls back to inverting the `quote`/`ccy` pair.
    pub fn get(
        &self,
        currency: Currency,
        quote: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError> {
        if let Some(rate) = self.lookup(currency, quote, date) {
            return Ok(Some(rate));
        }

        match self.lookup(quote, currency, date) {
            Some(rate) if rate.is_zero() => Err(ProviderError::ZeroRate(quote)),
            Some(rate) => Ok(Some(Decimal::ONE / rate)),
            None => Ok(None),
        }
    }

    fn lookup(&self, currency: Currency, quote: Currency, date: NaiveDate) -> Option<Decimal> {
        let map = self.pairs.get(&(currency, quote))?;
        let start = date
            .checked_sub_days(Days::new(self.max_staleness))
            .unwrap_or(NaiveDate::MIN);

        map.range(start..=date).next_back().map(|(_k, v)| *v)
    }
}

impl RateProvider for RatesDb {
    fn fetch_rate(
        &self,
        currency: Currency,
        base: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError> {
        self.get(currency, base, date)
    }
}

/// `"2024-eurusd"` -> `(EUR, USD)`
fn parse_pair(name: &str) -> Option<(Currency, Currency)> {
    let (_, pair) = name.rsplit_once('-')?;
    if pair.len() != 6 || !pair.is_ascii() {
        return None;
    }
    let (currency, quote) = pair.split_at(3);

    Some((currency.parse().ok()?, quote.parse().ok()?))
}

fn read_ron(path: &Path) -> Result<RateMap, RatesDbError> {
    let data = fs::read_to_string(path)?;
    let rates =
        ron::from_str::<RateMap>(&data).map_err(|err| RatesDbError::Parse(path.into(), err))?;

    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::constants::DEFAULT_PATH_RATES_DB;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("2024-eurusd"),
            Some((Currency::EUR, Currency::USD))
        );
        assert_eq!(
            parse_pair("daily-2024-USDRUB"),
            Some((Currency::USD, Currency::RUB))
        );
        assert_eq!(parse_pair("eurusd"), None);
        assert_eq!(parse_pair("2024-eur"), None);
        assert_eq!(parse_pair("2024-eur$sd"), None);
    }

    #[test]
    fn test_rates_db() {
        let db = RatesDb::new(DEFAULT_PATH_RATES_DB).unwrap();
        let pairs: Vec<_> = db.pairs().collect();
        assert_eq!(
            pairs,
            [(Currency::EUR, Currency::USD), (Currency::USD, Currency::RUB)]
        );

        // Exact date
        let rate = db.get(Currency::EUR, Currency::USD, date("2024-01-05"));
        assert_eq!(rate.unwrap(), Some(dec("1.0945")));

        // Saturday uses Friday's rate
        let rate = db.get(Currency::EUR, Currency::USD, date("2024-01-06"));
        assert_eq!(rate.unwrap(), Some(dec("1.0945")));

        // Inverse pair
        let rate = db.get(Currency::RUB, Currency::USD, date("2024-01-05"));
        assert_eq!(rate.unwrap(), Some(Decimal::ONE / dec("90")));

        // Before the first rate and past the staleness window
        let rate = db.get(Currency::EUR, Currency::USD, date("2023-12-31"));
        assert_eq!(rate.unwrap(), None);
        let rate = db.get(Currency::EUR, Currency::USD, date("2024-02-20"));
        assert_eq!(rate.unwrap(), None);

        // Unknown pair
        let rate = db.get(Currency::EUR, Currency::RUB, date("2024-01-05"));
        assert_eq!(rate.unwrap(), None);
    }

    #[test]
    fn test_staleness_window() {
        let db = RatesDb::new(DEFAULT_PATH_RATES_DB)
            .unwrap()
            .with_max_staleness(0);
        let rate = db.get(Currency::EUR, Currency::USD, date("2024-01-06"));
        assert_eq!(rate.unwrap(), None);
    }
}
