use chrono::{Days, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::disposition::{Category, Disposition, Dispositions};
use crate::error::ConfigurationError;
use crate::presentation::Labels;
use crate::sir::{self, PolicySegment, SirState};

pub const DEFAULT_INFECTIOUS_DAYS: u32 = 14;
pub const DEFAULT_MARKET_SHARE: f64 = 0.15;
pub const DEFAULT_N_DAYS: u32 = 100;
pub const MAX_N_DAYS: u32 = 3650;

fn default_infectious_days() -> u32 {
    DEFAULT_INFECTIOUS_DAYS
}

fn default_market_share() -> f64 {
    DEFAULT_MARKET_SHARE
}

fn default_n_days() -> u32 {
    DEFAULT_N_DAYS
}

/// Unvalidated values for one region, as read from a region table and the
/// run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInputs {
    pub population: u64,
    pub current_hospitalized: u64,
    #[serde(default)]
    pub doubling_time: Option<f64>,
    pub relative_contact_rate: f64,
    #[serde(default = "default_infectious_days")]
    pub infectious_days: u32,
    #[serde(default = "default_market_share")]
    pub market_share: f64,
    pub hospitalized: Disposition,
    pub icu: Disposition,
    pub ventilated: Disposition,
    pub current_date: NaiveDate,
    #[serde(default)]
    pub date_first_hospitalized: Option<NaiveDate>,
    #[serde(default)]
    pub mitigation_date: Option<NaiveDate>,
    #[serde(default = "default_n_days")]
    pub n_days: u32,
    #[serde(default)]
    pub max_y_axis: Option<u64>,
}

/// Where the start of the epidemic timeline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Back-dated from the doubling time and the current census.
    DoublingTime,
    /// Given explicitly; the doubling time was inferred from it.
    DateFirstHospitalized,
}

/// Validated model configuration with every derived quantity resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    population: u64,
    current_hospitalized: u64,
    doubling_time: f64,
    relative_contact_rate: f64,
    infectious_days: u32,
    market_share: f64,
    dispositions: Dispositions,
    current_date: NaiveDate,
    date_first_hospitalized: NaiveDate,
    mitigation_date: Option<NaiveDate>,
    n_days: u32,
    max_y_axis: Option<u64>,

    anchor: Anchor,
    i_day: u32,
    initial_infected: u64,
    initial_susceptible: u64,
    intrinsic_growth_rate: f64,
    gamma: f64,
    beta: f64,
    beta_t: f64,
}

fn check(
    field: &'static str,
    value: f64,
    valid: bool,
    expected: &'static str,
) -> Result<(), ConfigurationError> {
    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

fn check_disposition(
    category: Category,
    disposition: &Disposition,
) -> Result<(), ConfigurationError> {
    let (rate_field, stay_field) = match category {
        Category::Hospitalized => ("hospitalized.rate", "hospitalized.length_of_stay"),
        Category::Icu => ("icu.rate", "icu.length_of_stay"),
        Category::Ventilated => ("ventilated.rate", "ventilated.length_of_stay"),
    };
    check(
        rate_field,
        disposition.rate,
        (0.0..=1.0).contains(&disposition.rate),
        "a rate in [0, 1]",
    )?;
    check(
        stay_field,
        disposition.length_of_stay as f64,
        disposition.length_of_stay > 0,
        "a positive number of days",
    )
}

impl Parameters {
    pub fn new(inputs: ParameterInputs) -> Result<Parameters, ConfigurationError> {
        check(
            "population",
            inputs.population as f64,
            inputs.population > 0,
            "a positive population",
        )?;
        if let Some(doubling_time) = inputs.doubling_time {
            check(
                "doubling_time",
                doubling_time,
                doubling_time.is_finite() && doubling_time > 0.0,
                "a positive number of days",
            )?;
        }
        check(
            "relative_contact_rate",
            inputs.relative_contact_rate,
            (0.0..1.0).contains(&inputs.relative_contact_rate),
            "a rate in [0, 1)",
        )?;
        check(
            "infectious_days",
            inputs.infectious_days as f64,
            inputs.infectious_days > 0,
            "a positive number of days",
        )?;
        check(
            "market_share",
            inputs.market_share,
            inputs.market_share > 0.0 && inputs.market_share <= 1.0,
            "a share in (0, 1]",
        )?;
        check(
            "n_days",
            inputs.n_days as f64,
            inputs.n_days > 0 && inputs.n_days <= MAX_N_DAYS,
            "a horizon between 1 and 3650 days",
        )?;
        let dispositions = Dispositions {
            hospitalized: inputs.hospitalized,
            icu: inputs.icu,
            ventilated: inputs.ventilated,
        };
        for (category, disposition) in dispositions.iter() {
            check_disposition(category, disposition)?;
        }

        let hospitalized_share = dispositions.hospitalized.rate * inputs.market_share;
        if hospitalized_share == 0.0 {
            return Err(ConfigurationError::UndefinedInitialInfected {
                hospitalized_rate: dispositions.hospitalized.rate,
                market_share: inputs.market_share,
            });
        }
        let initial_infected = (inputs.current_hospitalized as f64 / hospitalized_share).round();
        if initial_infected >= inputs.population as f64 {
            return Err(ConfigurationError::InfectedExceedsPopulation {
                infected: initial_infected as u64,
                population: inputs.population,
            });
        }
        let initial_infected = initial_infected as u64;
        let initial_susceptible = inputs.population - initial_infected;

        let (anchor, doubling_time, i_day) = resolve_anchor(&inputs)?;
        if i_day > MAX_N_DAYS {
            let (field, value) = match anchor {
                Anchor::DoublingTime => ("doubling_time", doubling_time),
                Anchor::DateFirstHospitalized => ("date_first_hospitalized", i_day as f64),
            };
            return Err(ConfigurationError::OutOfRange {
                field,
                value,
                expected: "at most 3650 days between first hospitalization and current_date",
            });
        }
        let date_first_hospitalized = inputs
            .current_date
            .checked_sub_days(Days::new(i_day as u64))
            .ok_or(ConfigurationError::OutOfRange {
                field: "doubling_time",
                value: doubling_time,
                expected: "a doubling time whose history fits the calendar",
            })?;

        let intrinsic_growth_rate = sir::growth_rate(doubling_time);
        let gamma = 1.0 / inputs.infectious_days as f64;
        let susceptible = initial_susceptible as f64;
        let population = inputs.population as f64;
        let beta = sir::beta(intrinsic_growth_rate, gamma, susceptible, population, 0.0);
        let beta_t = sir::beta(
            intrinsic_growth_rate,
            gamma,
            susceptible,
            population,
            inputs.relative_contact_rate,
        );
        debug!(
            "initial infected {initial_infected}, susceptible {initial_susceptible}, \
             doubling time {doubling_time:.3} ({anchor:?}), i_day {i_day}, \
             growth {intrinsic_growth_rate:.5}, beta {beta:.5}, beta_t {beta_t:.5}"
        );

        Ok(Parameters {
            population: inputs.population,
            current_hospitalized: inputs.current_hospitalized,
            doubling_time,
            relative_contact_rate: inputs.relative_contact_rate,
            infectious_days: inputs.infectious_days,
            market_share: inputs.market_share,
            dispositions,
            current_date: inputs.current_date,
            date_first_hospitalized,
            mitigation_date: inputs.mitigation_date,
            n_days: inputs.n_days,
            max_y_axis: inputs.max_y_axis,
            anchor,
            i_day,
            initial_infected,
            initial_susceptible,
            intrinsic_growth_rate,
            gamma,
            beta,
            beta_t,
        })
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn current_hospitalized(&self) -> u64 {
        self.current_hospitalized
    }

    /// Pre-mitigation doubling time, given or inferred.
    pub fn doubling_time(&self) -> f64 {
        self.doubling_time
    }

    pub fn relative_contact_rate(&self) -> f64 {
        self.relative_contact_rate
    }

    pub fn infectious_days(&self) -> u32 {
        self.infectious_days
    }

    pub fn market_share(&self) -> f64 {
        self.market_share
    }

    pub fn dispositions(&self) -> &Dispositions {
        &self.dispositions
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn date_first_hospitalized(&self) -> NaiveDate {
        self.date_first_hospitalized
    }

    pub fn mitigation_date(&self) -> Option<NaiveDate> {
        self.mitigation_date
    }

    pub fn n_days(&self) -> u32 {
        self.n_days
    }

    pub fn max_y_axis(&self) -> Option<u64> {
        self.max_y_axis
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Days from the first hospitalization to `current_date`.
    pub fn i_day(&self) -> u32 {
        self.i_day
    }

    pub fn initial_infected(&self) -> u64 {
        self.initial_infected
    }

    pub fn initial_susceptible(&self) -> u64 {
        self.initial_susceptible
    }

    pub fn initial_recovered(&self) -> u64 {
        0
    }

    pub fn intrinsic_growth_rate(&self) -> f64 {
        self.intrinsic_growth_rate
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Contact rate before mitigation.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Contact rate after mitigation.
    pub fn beta_t(&self) -> f64 {
        self.beta_t
    }

    pub fn labels(&self) -> Labels {
        Labels::default()
    }

    /// First and last calendar day covered by the projection.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let end = self
            .current_date
            .checked_add_days(Days::new(self.n_days as u64))
            .unwrap_or(NaiveDate::MAX);
        (self.date_first_hospitalized, end)
    }

    pub fn initial_state(&self) -> SirState {
        SirState::new(
            self.initial_susceptible as f64,
            self.initial_infected as f64,
            self.initial_recovered() as f64,
        )
    }

    /// Unmitigated contacts until the mitigation date (if it is in the
    /// future), mitigated contacts afterwards.
    pub fn policy(&self) -> Vec<PolicySegment> {
        let mitigation_day = self
            .mitigation_date
            .map(|date| (date - self.current_date).num_days().clamp(0, self.n_days as i64) as u32)
            .unwrap_or(0);
        vec![
            PolicySegment {
                beta: self.beta,
                days: mitigation_day,
            },
            PolicySegment {
                beta: self.beta_t,
                days: self.n_days - mitigation_day,
            },
        ]
    }
}

/// Returns the anchor source, the doubling time and the number of days between
/// the first hospitalization and `current_date`.
fn resolve_anchor(inputs: &ParameterInputs) -> Result<(Anchor, f64, u32), ConfigurationError> {
    let census = inputs.current_hospitalized as f64;
    match (inputs.doubling_time, inputs.date_first_hospitalized) {
        (Some(doubling_time), first) => {
            if let Some(first) = first {
                warn!("doubling_time is set, ignoring date_first_hospitalized {first}");
            }
            let i_day = if census > 1.0 {
                (doubling_time * census.log2()).round() as u32
            } else {
                0
            };
            Ok((Anchor::DoublingTime, doubling_time, i_day))
        }
        (None, Some(first)) => {
            let days = (inputs.current_date - first).num_days();
            if days < 0 {
                return Err(ConfigurationError::AnchorAfterCurrentDate {
                    anchor: first,
                    current: inputs.current_date,
                });
            }
            if days == 0 || census <= 1.0 {
                return Err(ConfigurationError::CannotInferDoublingTime {
                    current_hospitalized: inputs.current_hospitalized,
                    days,
                });
            }
            let doubling_time = days as f64 / census.log2();
            Ok((Anchor::DateFirstHospitalized, doubling_time, days as u32))
        }
        (None, None) => Err(ConfigurationError::MissingAnchor),
    }
}
