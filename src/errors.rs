pub use crate::config::ConfigurationError;
pub use crate::imports::FetchError;
pub use crate::model::{CurrencyError, ParseAmountError};
pub use crate::normalize::ValidationError;
pub use crate::pipeline::PipelineError;
pub use crate::rates::{db::RatesDbError, ProviderError, RateUnavailableError};
pub use crate::report::ReportError;
pub use crate::response::AssembleError;
