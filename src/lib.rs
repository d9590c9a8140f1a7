#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod imports;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod rates;
pub mod report;
pub mod response;
