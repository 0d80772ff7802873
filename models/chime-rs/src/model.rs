use chrono::{NaiveDate, TimeDelta};
use log::info;
use serde::{Deserialize, Serialize};

use crate::disposition::{Category, Disposition, patients};
use crate::parameters::{Anchor, Parameters};
use crate::presentation::Labels;
use crate::sir::{SirDay, SirSimulation};

/// How admissions before `current_date` are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciliation {
    /// Start at `current_date` with no patients in beds.
    Raw,
    /// Back-project admissions to the first hospitalization so that the
    /// census at `current_date` matches the observed census.
    #[default]
    Adjusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SirRow {
    pub day: i64,
    pub date: NaiveDate,
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionsRow {
    pub day: i64,
    pub date: NaiveDate,
    pub hospitalized: u64,
    pub icu: u64,
    pub ventilated: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CensusRow {
    pub day: i64,
    pub date: NaiveDate,
    pub hospitalized: u64,
    pub icu: u64,
    pub ventilated: u64,
    pub total: u64,
}

/// A dated row with one patient count per disposition category.
pub trait CategoryCounts {
    fn day(&self) -> i64;
    fn date(&self) -> NaiveDate;
    fn count(&self, category: Category) -> u64;
    fn total(&self) -> u64;
}

macro_rules! impl_category_counts {
    ($row:ty) => {
        impl $row {
            fn from_counts(day: i64, date: NaiveDate, counts: [u64; 3]) -> Self {
                let [hospitalized, icu, ventilated] = counts;
                Self {
                    day,
                    date,
                    hospitalized,
                    icu,
                    ventilated,
                    total: hospitalized + icu + ventilated,
                }
            }
        }

        impl CategoryCounts for $row {
            fn day(&self) -> i64 {
                self.day
            }

            fn date(&self) -> NaiveDate {
                self.date
            }

            fn count(&self, category: Category) -> u64 {
                match category {
                    Category::Hospitalized => self.hospitalized,
                    Category::Icu => self.icu,
                    Category::Ventilated => self.ventilated,
                }
            }

            fn total(&self) -> u64 {
                self.total
            }
        }
    };
}

impl_category_counts!(AdmissionsRow);
impl_category_counts!(CensusRow);

/// Headline rates of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub r_naught: f64,
    pub r_t: f64,
    pub doubling_time: f64,
    /// Doubling time under mitigation; negative is a halving time, `None` when
    /// mitigated growth is exactly zero.
    pub doubling_time_t: Option<f64>,
    pub daily_growth_rate: f64,
    pub daily_growth_rate_t: f64,
    pub anchor: Anchor,
    pub i_day: u32,
    pub date_first_hospitalized: NaiveDate,
    pub initial_infected: u64,
    pub initial_susceptible: u64,
}

impl ModelSummary {
    fn new(p: &Parameters) -> Self {
        let susceptible_share = p.initial_susceptible() as f64 / p.population() as f64;
        let daily_growth_rate_t = p.beta_t() * susceptible_share - p.gamma();
        let doubling_time_t = if daily_growth_rate_t == 0.0 {
            None
        } else {
            Some(std::f64::consts::LN_2 / daily_growth_rate_t.ln_1p())
        };
        ModelSummary {
            r_naught: p.beta() * susceptible_share / p.gamma(),
            r_t: p.beta_t() * susceptible_share / p.gamma(),
            doubling_time: p.doubling_time(),
            doubling_time_t,
            daily_growth_rate: p.intrinsic_growth_rate(),
            daily_growth_rate_t,
            anchor: p.anchor(),
            i_day: p.i_day(),
            date_first_hospitalized: p.date_first_hospitalized(),
            initial_infected: p.initial_infected(),
            initial_susceptible: p.initial_susceptible(),
        }
    }
}

/// One complete projection for a set of parameters. Everything is computed
/// on construction.
#[derive(Debug, Clone)]
pub struct SimSirModel {
    parameters: Parameters,
    reconciliation: Reconciliation,
    sim_sir_w_date: Vec<SirRow>,
    admits: Vec<AdmissionsRow>,
    census: Vec<CensusRow>,
    summary: ModelSummary,
}

fn offset_date(current_date: NaiveDate, day: i64) -> NaiveDate {
    current_date
        .checked_add_signed(TimeDelta::days(day))
        .unwrap_or(if day < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Rounds `values` to whole patients summing to `total`. Leftover units go
/// to the largest fractional parts, later days first on ties.
fn apportion(values: &[f64], total: u64) -> Vec<u64> {
    let mut counts: Vec<u64> = values.iter().map(|value| patients(value.floor())).collect();
    let deficit = total.saturating_sub(counts.iter().sum()) as usize;
    let fraction = |index: usize| values[index] - values[index].floor();
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| fraction(b).total_cmp(&fraction(a)).then(b.cmp(&a)));
    for &index in order.iter().take(deficit) {
        counts[index] += 1;
    }
    counts
}

/// Admissions for day offsets `-i_day..=0`, growing at the pre-mitigation
/// rate and scaled so the hospitalized census on day 0 equals the observed
/// census. The days inside each category's census window are rounded
/// together so the window keeps its exact total.
fn back_projected_admissions(p: &Parameters, disposition: &Disposition) -> Vec<u64> {
    let factor = 1.0 + p.intrinsic_growth_rate();
    let hospitalized = p.dispositions().hospitalized;
    let window = (hospitalized.length_of_stay - 1).min(p.i_day());
    let weight: f64 = (0..=window).map(|k| factor.powf(-(k as f64))).sum();
    let admissions_today =
        p.current_hospitalized() as f64 / weight * disposition.rate / hospitalized.rate;
    let exact: Vec<f64> = (0..=p.i_day())
        .map(|k| admissions_today * factor.powf(k as f64 - p.i_day() as f64))
        .collect();

    let own_window = (disposition.length_of_stay.saturating_sub(1)).min(p.i_day()) as usize;
    let (older, recent) = exact.split_at(exact.len() - own_window - 1);
    let mut series: Vec<u64> = older.iter().map(|&value| patients(value)).collect();
    series.extend(apportion(recent, patients(recent.iter().sum())));
    series
}

impl SimSirModel {
    pub fn new(parameters: Parameters) -> Self {
        Self::with_reconciliation(parameters, Reconciliation::default())
    }

    pub fn with_reconciliation(parameters: Parameters, reconciliation: Reconciliation) -> Self {
        let p = &parameters;
        let simulation = SirSimulation::new(p.initial_state(), p.gamma(), p.policy());
        let current_date = p.current_date();

        let sim_sir_w_date: Vec<SirRow> = simulation
            .iter()
            .map(|SirDay { day, state }| SirRow {
                day: day as i64,
                date: offset_date(current_date, day as i64),
                susceptible: state.susceptible,
                infected: state.infected,
                recovered: state.recovered,
            })
            .collect();

        let new_infections = simulation.new_infections();
        let history_days = match reconciliation {
            Reconciliation::Raw => 0,
            Reconciliation::Adjusted => p.i_day() as i64,
        };

        let mut admissions: [Vec<u64>; 3] = Default::default();
        let mut census: [Vec<u64>; 3] = Default::default();
        for (index, (_, disposition)) in p.dispositions().iter().enumerate() {
            let projected = disposition.admissions(&new_infections, p.market_share());
            let series = match reconciliation {
                Reconciliation::Raw => projected,
                Reconciliation::Adjusted => {
                    let mut series = back_projected_admissions(p, disposition);
                    series.extend_from_slice(&projected[1..]);
                    series
                }
            };
            census[index] = disposition.census(&series);
            admissions[index] = series;
        }

        let rows = admissions[0].len();
        let row_day = |index: usize| index as i64 - history_days;
        let admits = (0..rows)
            .map(|index| {
                let day = row_day(index);
                AdmissionsRow::from_counts(
                    day,
                    offset_date(current_date, day),
                    [admissions[0][index], admissions[1][index], admissions[2][index]],
                )
            })
            .collect();
        let census = (0..rows)
            .map(|index| {
                let day = row_day(index);
                CensusRow::from_counts(
                    day,
                    offset_date(current_date, day),
                    [census[0][index], census[1][index], census[2][index]],
                )
            })
            .collect();

        let summary = ModelSummary::new(p);
        info!(
            "projected {} days from {current_date} ({reconciliation:?}, {history_days} days of history), r_t {:.2}",
            p.n_days(),
            summary.r_t
        );

        SimSirModel {
            parameters,
            reconciliation,
            sim_sir_w_date,
            admits,
            census,
            summary,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn reconciliation(&self) -> Reconciliation {
        self.reconciliation
    }

    /// Susceptible, infected and recovered from `current_date` on.
    pub fn sim_sir_w_date(&self) -> &[SirRow] {
        &self.sim_sir_w_date
    }

    pub fn admits(&self) -> &[AdmissionsRow] {
        &self.admits
    }

    pub fn census(&self) -> &[CensusRow] {
        &self.census
    }

    pub fn summary(&self) -> &ModelSummary {
        &self.summary
    }

    pub fn current_date(&self) -> NaiveDate {
        self.parameters.current_date()
    }

    pub fn max_y_axis(&self) -> Option<u64> {
        self.parameters.max_y_axis()
    }

    pub fn labels(&self) -> Labels {
        self.parameters.labels()
    }
}
