pub use self::{amount::*, currency::*, record::*, request::*, stats::*};

mod amount;
pub mod constants;
mod currency;
mod record;
mod request;
mod stats;
