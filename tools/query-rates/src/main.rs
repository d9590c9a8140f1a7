#![forbid(unsafe_code)]

use bankcount::model::{constants::DEFAULT_PATH_RATES_DB, Currency};
use bankcount::rates::db::RatesDb;
use chrono::NaiveDate;
use error_iter::ErrorIter as _;
use onlyargs::{CliError, OnlyArgs as _};
use onlyargs_derive::OnlyArgs;
use std::{path::PathBuf, process::ExitCode};
use thiserror::Error;

#[derive(Debug, Error)]
enum Error {
    #[error("CLI error")]
    Cli(#[from] CliError),

    #[error("Date parsing error")]
    Date(#[from] chrono::ParseError),

    #[error("Currency error")]
    Currency(#[from] bankcount::errors::CurrencyError),

    #[error("Exchange rates DB error")]
    RatesDb(#[from] bankcount::errors::RatesDbError),

    #[error("Exchange rate error")]
    Provider(#[from] bankcount::errors::ProviderError),

    #[error("No {0}{1} rate on or shortly before {2}")]
    NotFound(Currency, Currency, NaiveDate),
}

/// Query the bankcount exchange rates DB.
#[derive(Debug, OnlyArgs)]
struct Args {
    /// Currency to price.
    #[default("EUR")]
    currency: String,

    /// Currency to quote the price in.
    #[default("USD")]
    quote: String,

    /// Lookup date, YYYY-MM-DD.
    date: String,

    /// Path to exchange rates DB.
    rates_db: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if matches!(err, Error::Cli(_)) {
                eprintln!("{}", Args::HELP);
            }

            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let args: Args = onlyargs::parse()?;

    let currency: Currency = args.currency.parse()?;
    let quote: Currency = args.quote.parse()?;
    let date: NaiveDate = args.date.parse()?;
    let rates_db = RatesDb::new(
        args.rates_db
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH_RATES_DB)),
    )?;
    let rate = rates_db
        .get(currency, quote, date)?
        .ok_or(Error::NotFound(currency, quote, date))?;

    println!("pair:\t{currency}{quote}");
    println!("date:\t{date}");
    println!("rate:\t{rate}");

    Ok(())
}
