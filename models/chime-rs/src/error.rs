use chime_mrp::MrpError;
use chrono::NaiveDate;
use thiserror::Error;

/// Inputs that cannot produce a projection. Never retried; the run stops and
/// the message is shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error(
        "hospitalized rate ({hospitalized_rate}) times market share ({market_share}) is zero, \
         initial infections are undefined"
    )]
    UndefinedInitialInfected {
        hospitalized_rate: f64,
        market_share: f64,
    },

    #[error("initial infected ({infected}) leaves no one susceptible in a population of {population}")]
    InfectedExceedsPopulation { infected: u64, population: u64 },

    #[error("either doubling_time or date_first_hospitalized is required")]
    MissingAnchor,

    #[error("date_first_hospitalized {anchor} is after current_date {current}")]
    AnchorAfterCurrentDate { anchor: NaiveDate, current: NaiveDate },

    #[error(
        "cannot infer a doubling time from {current_hospitalized} hospitalized over {days} days"
    )]
    CannotInferDoublingTime { current_hospitalized: u64, days: i64 },

    #[error("no region selected")]
    NoRegionSelected,

    #[error("region '{0}' not found")]
    RegionNotFound(String),

    #[error("no region source configured")]
    NoRegionSource,
}

#[derive(Error, Debug)]
pub enum ChimeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Mrp(#[from] MrpError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
