#![forbid(unsafe_code)]

use bankcount::config::{Config, ConfigurationError};
use bankcount::imports::{json::JsonSource, statement::StatementSource, RowSource};
use bankcount::model::constants::{self, DEFAULT_WINDOW_DAYS};
use bankcount::model::{Currency, DateRange, GroupBy, ReportRequest, TransactionRecord};
use bankcount::pipeline::{Pipeline, PipelineError};
use bankcount::rates::{db::RatesDb, http::HttpRateProvider, RateEntry, RateSource};
use bankcount::report::{search, top_transactions};
use bankcount::response::{default_report_path, greeting};
use chrono::{Local, NaiveDate};
use directories::ProjectDirs;
use error_iter::ErrorIter as _;
use is_terminal::IsTerminal as _;
use onlyargs::CliError;
use onlyargs_derive::OnlyArgs;
use ron::ser::PrettyConfig;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::{env, process::ExitCode};
use thiserror::Error;
use tracing::{debug, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

const RATES_MEMO: &str = "rates_memo";
const TEMP_MEMO: &str = ".temp_memo.ron";

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - RATES_API_KEY selects the HTTP rates provider instead of the rates DB"]
#[footer = "  - RATES_API_URL accepts a http: or https: URL"]
#[footer = "      default is \"https://api.apilayer.com/exchangerates_data\""]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read bank statement CSV from a file.
    #[long]
    input_csv: Vec<PathBuf>,

    /// Read a JSON array of transactions from a file.
    #[long]
    input_json: Vec<PathBuf>,

    /// Read settings JSON from a file.
    #[short('s')]
    settings: Option<PathBuf>,

    /// First day of the report, YYYY-MM-DD.
    ///   Default is 90 days before the end date.
    #[long]
    start: Option<String>,

    /// Last day of the report, YYYY-MM-DD. Default is today.
    end: Option<String>,

    /// Only include transactions in this category.
    category: Option<String>,

    /// Only include transactions with this counterparty.
    #[long]
    counterparty: Option<String>,

    /// Breakdown key: {category (default), counterparty, currency, month}
    #[short('g')]
    group_by: Option<String>,

    /// Keep only the N largest groups. Overrides the settings file.
    #[short('n')]
    top_n: Option<usize>,

    /// Abort on the first invalid row. Overrides the settings file.
    #[long]
    strict: bool,

    /// Convert all amounts into this currency. Overrides the settings file.
    #[short('b')]
    base_currency: Option<String>,

    /// Override default exchange rates database directory.
    ///   Default is "./references/rates-db/".
    ///
    rates_db: Option<PathBuf>,

    /// Write the JSON report to this file.
    #[short('o')]
    output: Option<PathBuf>,

    /// Write the JSON report to `report_YYYYMMDD_HHMMSS.json`.
    #[long]
    save: bool,

    /// Print transactions whose category, counterparty or description
    ///   contains this text.
    #[long]
    search: Option<String>,

    /// Print the N transactions with the largest amounts.
    top: Option<usize>,

    /// Enable verbose output.
    /// Prints the report table and run statistics.
    verbose: bool,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Invalid date {0:?}")]
    Date(String, #[source] chrono::ParseError),

    #[error("Configuration error")]
    Configuration(#[from] ConfigurationError),

    #[error("Unable to load exchange rates DB")]
    RatesDb(#[from] bankcount::errors::RatesDbError),

    #[error("Reporting run failed")]
    Pipeline(#[from] PipelineError),

    #[error("Unable to serialize report")]
    Json(#[from] serde_json::Error),

    #[error("No input files; use --input-csv or --input-json")]
    NoInput,

    #[error("Unable to locate user cache directory")]
    CacheDir,

    #[error("Unable to write rates memo: `{0:?}`")]
    RatesMemoRon(PathBuf, #[source] ron::Error),

    #[error("Unable to rename rates memo: `{0:?}`")]
    RatesMemoRename(PathBuf, #[source] std::io::Error),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;

    // Settings file first, then command line overrides.
    let mut config = args
        .settings
        .as_ref()
        .map(Config::load)
        .transpose()?
        .unwrap_or_default();
    if args.strict {
        config.strict = true;
    }
    if let Some(base_currency) = &args.base_currency {
        config.base_currency = base_currency.parse().map_err(ConfigurationError::from)?;
    }
    if args.top_n.is_some() {
        config.top_n = args.top_n;
    }
    debug!("{config:?}");

    let request = build_request(&args)?;

    let mut sources: Vec<Box<dyn RowSource>> = Vec::new();
    if !args.input_csv.is_empty() {
        sources.push(Box::new(StatementSource::new(args.input_csv.iter().cloned())));
    }
    if !args.input_json.is_empty() {
        sources.push(Box::new(JsonSource::new(args.input_json.iter().cloned())));
    }
    if sources.is_empty() {
        return Err(Error::NoInput);
    }

    // The HTTP provider is memoized in the user's cache directory.
    let (provider, memo_path) = match env::var("RATES_API_KEY") {
        Ok(api_key) => {
            let api_url = env::var("RATES_API_URL")
                .unwrap_or_else(|_| constants::DEFAULT_RATES_API_URL.to_string());

            let project_dir =
                ProjectDirs::from("design.contract", "DCD", "bankcount").ok_or(Error::CacheDir)?;
            let cache_dir = project_dir.cache_dir().to_path_buf();
            fs::create_dir_all(&cache_dir)?;

            let provider = RateSource::from(HttpRateProvider::new(&api_url, &api_key));
            (provider, Some(cache_dir))
        }
        Err(_) => {
            let path = args
                .rates_db
                .clone()
                .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_PATH_RATES_DB));
            debug!("Loading exchange rates DB from {path:?}");

            (RateSource::from(RatesDb::new(path)?), None)
        }
    };

    let mut pipeline = Pipeline::new(config, provider)?;
    let base = pipeline.config().base_currency;
    if let Some(cache_dir) = &memo_path {
        pipeline = pipeline.with_memo(read_memo(rates_memo_path(cache_dir, base)));
    }
    if !pipeline.config().user_stocks.is_empty() {
        warn!("Stock prices are not supported; ignoring `user_stocks`");
    }

    let output = pipeline.run(&mut sources, &request)?;
    let currency_rates = pipeline.currency_rates(request.range.end)?;

    // Write memo
    if let Some(cache_dir) = &memo_path {
        write_memo(cache_dir, base, &pipeline.memo())?;
    }

    println!("{}!", greeting(Local::now().time()));
    println!();

    if !output.skipped.is_empty() {
        println!("Skipped Rows");
        println!("======= ====");
        println!();
        for err in &output.skipped {
            println!("  - {err}");
        }
        println!();
    }

    let json = output.response.to_json_pretty()?;
    let path = args
        .output
        .clone()
        .or_else(|| args.save.then(|| default_report_path(Local::now().naive_local())));
    if let Some(path) = path {
        fs::write(&path, &json)?;

        let path = path.display();
        let underline = "=".repeat(path.to_string().len());
        println!("Report in {base} written to {path}");
        println!("====== == === ======= == {underline}");
        println!();
    } else {
        println!("{json}");
        println!();
    }

    if !currency_rates.is_empty() {
        let date = request.range.end;
        println!("Currency Rates on {date}");
        println!("======== ===== == ==========");
        println!();
        for entry in &currency_rates {
            println!("  {}: {} {base}", entry.currency, entry.rate);
        }
        println!();
    }

    if args.verbose {
        println!("Report by {}", request.group_by);
        println!("====== == {}", "=".repeat(request.group_by.to_string().len()));
        println!();
        println!("{}", output.response);
    }

    if let Some(query) = &args.search {
        let found = search(&output.records, query);
        println!("Search results for {query:?}: {}", found.len());
        println!();
        print_records(found);
    }

    if let Some(n) = args.top {
        println!("Top {n} Transactions");
        println!("=== {} ============", "=".repeat(n.to_string().len()));
        println!();
        print_records(top_transactions(&output.records, n));
    }

    if args.verbose {
        output.stats.pretty_print();
    }

    Ok(())
}

fn build_request(args: &Args) -> Result<ReportRequest, Error> {
    let end = match &args.end {
        Some(end) => parse_date(end)?,
        None => Local::now().date_naive(),
    };
    let range = match &args.start {
        Some(start) => DateRange::new(parse_date(start)?, end)?,
        None => DateRange::trailing_days(end, DEFAULT_WINDOW_DAYS),
    };
    let group_by = args
        .group_by
        .as_deref()
        .map(str::parse::<GroupBy>)
        .transpose()?
        .unwrap_or_default();

    let mut request = ReportRequest::new(range, group_by).with_top_n(args.top_n);
    if let Some(category) = &args.category {
        request = request.with_category(category.as_str());
    }
    if let Some(counterparty) = &args.counterparty {
        request = request.with_counterparty(counterparty.as_str());
    }

    Ok(request)
}

fn parse_date(value: &str) -> Result<NaiveDate, Error> {
    value
        .parse()
        .map_err(|err| Error::Date(value.to_string(), err))
}

fn print_records(records: Vec<&TransactionRecord>) {
    for record in records {
        println!(
            "  {date}  {amount:>12} {currency}  {category}  {description}",
            date = record.timestamp.format("%F %T"),
            amount = record.amount,
            currency = record.currency,
            category = record.category,
            description = if record.description.is_empty() {
                &record.counterparty
            } else {
                &record.description
            },
        );
    }
    println!();
}

fn rates_memo_path<P: AsRef<Path>>(cache_dir: P, base: Currency) -> PathBuf {
    cache_dir.as_ref().join(format!("{RATES_MEMO}_{base}.ron"))
}

fn read_memo(path: PathBuf) -> Vec<RateEntry> {
    debug!("Reading rates memo from {path:?}");
    if let Ok(file) = File::open(path) {
        match ron::de::from_reader(file) {
            Ok(memo) => return memo,
            Err(_) => {
                warn!("Corrupt rates memo detected! A new one will be created.");
            }
        }
    }

    Vec::new()
}

fn write_memo(cache_dir: &Path, base: Currency, memo: &[RateEntry]) -> Result<(), Error> {
    let temp = cache_dir.join(TEMP_MEMO);
    debug!("Writing temporary rates memo to {temp:?}");
    let mut file = BufWriter::new(File::create(&temp)?);
    ron::ser::to_writer_pretty(&mut file, memo, PrettyConfig::default())
        .map_err(|err| Error::RatesMemoRon(temp.clone(), err))?;
    file.flush()?;

    let path = rates_memo_path(cache_dir, base);
    debug!("Renaming temporary rates memo to {path:?}");
    fs::rename(temp, &path).map_err(|err| Error::RatesMemoRename(path, err))?;

    Ok(())
}
