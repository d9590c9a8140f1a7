pub const DEFAULT_PATH_RATES_DB: &str = "./references/rates-db/";
pub const DEFAULT_PATH_SAMPLE_CSV: &str = "./references/sample/operations.csv";
pub const DEFAULT_PATH_SAMPLE_JSON: &str = "./references/sample/operations.json";
pub const DEFAULT_PATH_SETTINGS: &str = "./references/sample/settings.json";

pub const DEFAULT_RATES_API_URL: &str = "https://api.apilayer.com/exchangerates_data";

/// Default lookback for reports without an explicit start date.
pub const DEFAULT_WINDOW_DAYS: u64 = 90;
