use super::{ProviderError, RateProvider};
use crate::model::Currency;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration, time::Instant};
use tracing::{info, trace};
use ureq::tls::{TlsConfig, TlsProvider};
use ureq::Agent;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Historical rates body of an exchangerates_data compatible API.
#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    success: Option<bool>,

    #[serde(default)]
    rates: BTreeMap<String, Decimal>,

    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default, alias = "info")]
    message: String,
}

/// Blocking HTTP rate provider.
///
/// Asks for `GET {api_server}/{date}?base={base}&symbols={ccy}`, which quotes one unit of `base`
/// in `ccy`. The rate is inverted to get the value of one `ccy` in `base`.
pub struct HttpRateProvider {
    agent: Agent,
    api_server: String,
    api_key: String,
}

impl HttpRateProvider {
    pub fn new(api_server: &str, api_key: &str) -> Self {
        let agent = Agent::from(
            Agent::config_builder()
                .timeout_global(Some(TIMEOUT))
                .tls_config(
                    TlsConfig::builder()
                        .provider(TlsProvider::NativeTls)
                        .build(),
                )
                .build(),
        );

        Self {
            agent,
            api_server: api_server.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.api_server, date.format("%F"))
    }
}

impl RateProvider for HttpRateProvider {
    fn fetch_rate(
        &self,
        currency: Currency,
        base: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError> {
        info!("Requesting {currency}{base} for {date}");

        let start = Instant::now();
        let mut resp = self
            .agent
            .get(self.url(date))
            .query("base", base.as_str())
            .query("symbols", currency.as_str())
            .header("apikey", &self.api_key)
            .call()?;
        let body: RatesResponse = resp.body_mut().read_json()?;
        let dur = start.elapsed();

        info!("{currency}{base} for {date} received in {dur:?}");
        trace!("{body:#?}");

        rate_from_response(currency, body)
    }
}

fn rate_from_response(
    currency: Currency,
    body: RatesResponse,
) -> Result<Option<Decimal>, ProviderError> {
    if let Some(error) = body.error {
        return Err(ProviderError::Api(error.message));
    }
    if body.success == Some(false) {
        return Err(ProviderError::Api("request was not successful".to_string()));
    }

    match body.rates.get(currency.as_str()) {
        Some(rate) if rate.is_zero() => Err(ProviderError::ZeroRate(currency)),
        Some(rate) => Ok(Some(Decimal::ONE / *rate)),
        None => Ok(None),
    }
}
