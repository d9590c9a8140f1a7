use crate::config::ConfigurationError;
use crate::model::{Amount, Currency, ReportRequest, TransactionRecord};
use crate::rates::{RateProvider, RateResolver, RateUnavailableError};
use chrono::NaiveDate;
use std::{collections::HashMap, fmt};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid report request")]
    Configuration(#[from] ConfigurationError),

    #[error("Currency conversion failed")]
    RateUnavailable(#[from] RateUnavailableError),

    #[error("Amount overflow in {0}")]
    Overflow(OverflowSite),
}

/// Where an amount stopped fitting in a `Decimal`.
#[derive(Debug, Eq, PartialEq)]
pub enum OverflowSite {
    /// Converting the record with this id into the base currency.
    Conversion(String),
    /// Summing the group with this key.
    Group(String),
    Total,
}

impl fmt::Display for OverflowSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion(id) => write!(f, "conversion of record `{id}`"),
            Self::Group(key) => write!(f, "group `{key}`"),
            Self::Total => f.write_str("report total"),
        }
    }
}

/// Aggregate for one breakdown key, in the base currency.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupTotal {
    pub key: String,
    pub amount: Amount,
    pub count: usize,
}

/// Report output. Only the engine constructs it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportResult {
    base: Currency,
    total: Amount,
    count: usize,
    breakdown: Vec<GroupTotal>,
}

impl ReportResult {
    #[cfg(test)]
    pub(crate) fn from_parts(
        base: Currency,
        total: Amount,
        count: usize,
        breakdown: Vec<GroupTotal>,
    ) -> Self {
        Self {
            base,
            total,
            count,
            breakdown,
        }
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    /// Sum of every breakdown amount.
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Number of records aggregated into the breakdown.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Groups in first-occurrence order, or largest first when trimmed to top-N.
    pub fn breakdown(&self) -> &[GroupTotal] {
        &self.breakdown
    }
}

/// Computes reports, converting amounts through an injected [`RateResolver`].
pub struct ReportEngine<'r, P> {
    resolver: &'r mut RateResolver<P>,
}

impl<'r, P: RateProvider> ReportEngine<'r, P> {
    pub fn new(resolver: &'r mut RateResolver<P>) -> Self {
        Self { resolver }
    }

    /// Filter, convert, group and sum.
    ///
    /// Converted amounts are rounded to cents before summing. The request is validated before any
    /// record is looked at. A single unavailable rate aborts the whole computation.
    pub fn compute(
        &mut self,
        records: &[TransactionRecord],
        request: &ReportRequest,
    ) -> Result<ReportResult, ReportError> {
        request.validate()?;

        let mut breakdown: Vec<GroupTotal> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records.iter().filter(|record| request.matches(record)) {
            let rate = self.resolver.resolve(record.currency, record.date())?;
            let amount = record
                .amount
                .checked_convert(rate)
                .ok_or_else(|| {
                    ReportError::Overflow(OverflowSite::Conversion(record.id.clone()))
                })?
                .normalized();

            let i = *index
                .entry(request.group_by.key(record))
                .or_insert_with_key(|key| {
                    breakdown.push(GroupTotal {
                        key: key.clone(),
                        amount: Amount::ZERO,
                        count: 0,
                    });
                    breakdown.len() - 1
                });
            let group = &mut breakdown[i];
            group.amount = group
                .amount
                .checked_add(amount)
                .ok_or_else(|| ReportError::Overflow(OverflowSite::Group(group.key.clone())))?;
            group.count += 1;
        }

        if let Some(top_n) = request.top_n {
            // Stable sort: equal totals keep first-occurrence order.
            breakdown.sort_by(|a, b| b.amount.abs().cmp(&a.amount.abs()));
            breakdown.truncate(top_n);
        }

        let total = breakdown
            .iter()
            .try_fold(Amount::ZERO, |total, group| total.checked_add(group.amount))
            .ok_or(ReportError::Overflow(OverflowSite::Total))?;
        let count = breakdown.iter().map(|group| group.count).sum();
        debug!(
            "Report by {}: {count} records in {} groups",
            request.group_by,
            breakdown.len()
        );

        Ok(ReportResult {
            base: self.resolver.base(),
            total,
            count,
            breakdown,
        })
    }
}

/// The `(currency, date)` rate keys a report over `records` will need.
pub fn rate_keys<'a>(
    records: &'a [TransactionRecord],
    request: &'a ReportRequest,
) -> impl Iterator<Item = (Currency, NaiveDate)> + 'a {
    records
        .iter()
        .filter(|record| request.matches(record))
        .map(|record| (record.currency, record.date()))
}

/// Records whose category, counterparty or description contains `query`, ignoring case.
pub fn search<'a>(records: &'a [TransactionRecord], query: &str) -> Vec<&'a TransactionRecord> {
    let query = query.to_lowercase();

    records
        .iter()
        .filter(|record| {
            [&record.category, &record.counterparty, &record.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
        })
        .collect()
}

/// The `n` records with the largest absolute amount. Ties keep input order.
pub fn top_transactions(records: &[TransactionRecord], n: usize) -> Vec<&TransactionRecord> {
    let mut top: Vec<_> = records.iter().collect();
    top.sort_by(|a, b| b.amount.abs().cmp(&a.amount.abs()));
    top.truncate(n);

    top
}
